use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
};
use std::rc::Rc;
use tracing::debug;

#[derive(Default)]
struct Inner {
	open: Cell<bool>,
	listeners: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// A one-time gate that holds back all readiness until the application signals that it has started.
///
/// Clones share the same gate.
#[derive(Clone, Default)]
pub struct BootstrapGate(Rc<Inner>);

impl BootstrapGate {
	#[must_use]
	pub fn new(open: bool) -> Self {
		let gate = Self::default();
		gate.0.open.set(open);
		gate
	}

	#[must_use]
	pub fn is_open(&self) -> bool {
		self.0.open.get()
	}

	/// Opens the gate and notifies everyone waiting on it. Later calls do nothing.
	pub fn complete(&self) {
		if self.0.open.replace(true) {
			return;
		}
		let listeners = self.0.listeners.take();
		debug!("Bootstrap complete. Notifying {} waiting context(s).", listeners.len());
		for listener in listeners {
			listener();
		}
	}

	/// Runs `listener` once the gate is open, right away if it already is.
	pub fn on_open(&self, listener: impl 'static + FnOnce()) {
		if self.is_open() {
			listener();
		} else {
			self.0.listeners.borrow_mut().push(Box::new(listener));
		}
	}
}

impl Debug for BootstrapGate {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("BootstrapGate").field("open", &self.is_open()).field("waiting", &self.0.listeners.borrow().len()).finish()
	}
}
