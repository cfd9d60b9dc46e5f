use super::busy_context::Shared;
use crate::error::BusyError;
use core::{
	fmt::{self, Debug, Display, Formatter},
	sync::atomic::{AtomicU64, Ordering},
	time::Duration,
};
use std::rc::{Rc, Weak};
use tracing::trace;

/// What a busy state is waiting for. Only rendered when someone asks (timeouts, [`BusyContext::dump`](`super::BusyContext::dump`)).
#[derive(Clone)]
pub enum Description {
	Text(String),
	/// Computed each time the description is rendered.
	Lazy(Rc<dyn Fn() -> String>),
	Display(Rc<dyn Display>),
}

impl Description {
	pub fn lazy(describe: impl 'static + Fn() -> String) -> Self {
		Self::Lazy(Rc::new(describe))
	}

	pub fn display(value: impl 'static + Display) -> Self {
		Self::Display(Rc::new(value))
	}

	#[must_use]
	pub fn render(&self) -> String {
		match self {
			Description::Text(text) => text.clone(),
			Description::Lazy(describe) => describe(),
			Description::Display(value) => value.to_string(),
		}
	}
}

impl From<&str> for Description {
	fn from(text: &str) -> Self {
		Self::Text(text.to_owned())
	}
}
impl From<String> for Description {
	fn from(text: String) -> Self {
		Self::Text(text)
	}
}

impl Debug for Description {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		if cfg!(feature = "dangerous-logging") {
			f.debug_tuple("Description").field(&self.render()).finish()
		} else {
			f.write_str("Description(..)")
		}
	}
}

/// One outstanding asynchronous operation. Immutable once created.
#[derive(Debug, Clone)]
pub(crate) struct BusyState {
	pub(crate) id: String,
	pub(crate) description: Description,
	pub(crate) added: Duration,
}

impl BusyState {
	pub(crate) fn new(description: Description, now: Duration) -> Self {
		Self { id: next_id(now), description, added: now }
	}

	pub(crate) fn info(&self) -> BusyStateInfo {
		BusyStateInfo { id: self.id.clone(), description: self.description.render(), added: self.added }
	}
}

/// A snapshot of a busy state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusyStateInfo {
	pub id: String,
	pub description: String,
	/// Scheduler time at which the state was added.
	pub added: Duration,
}

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Base-36 timestamp (milliseconds) and base-36 sequence number.
fn next_id(now: Duration) -> String {
	let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
	format!("{}-{}", base36(u64::try_from(now.as_millis()).unwrap_or(u64::MAX)), base36(sequence))
}

fn base36(mut n: u64) -> String {
	const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
	let mut digits = Vec::new();
	loop {
		digits.push(DIGITS[(n % 36) as usize]);
		n /= 36;
		if n == 0 {
			break;
		}
	}
	digits.iter().rev().map(|&digit| char::from(digit)).collect()
}

/// Resolves the busy state it was returned for.
///
/// Resolving twice is an error. After the context was [cleared](`super::BusyContext::clear`),
/// the first call does nothing instead.
/// If the context is gone, resolving does nothing.
#[must_use = "a busy state that is never resolved keeps its context busy until it is cleared"]
pub struct BusyStateResolver {
	context: Weak<Shared>,
	id: String,
}

impl BusyStateResolver {
	pub(crate) fn new(context: Weak<Shared>, id: String) -> Self {
		Self { context, id }
	}

	#[must_use]
	pub fn id(&self) -> &str {
		&self.id
	}

	/// # Errors
	///
	/// [`BusyError::AlreadyResolved`] on a second call.
	pub fn resolve(&self) -> Result<(), BusyError> {
		match self.context.upgrade() {
			Some(context) => Shared::resolve(&context, &self.id),
			None => {
				trace!("Resolving busy state {} of a dropped context.", self.id);
				Ok(())
			}
		}
	}
}

impl Debug for BusyStateResolver {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("BusyStateResolver").field("id", &self.id).finish_non_exhaustive()
	}
}
