use super::{
	gate::BootstrapGate,
	scheduler::{Scheduler, TimerHandle},
	state::{BusyState, BusyStateInfo, BusyStateResolver, Description},
};
use crate::error::{BusyError, ReadyError};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	future::Future,
	pin::Pin,
	task::{Context as TaskContext, Poll},
	time::Duration,
};
use futures::{channel::oneshot, FutureExt as _};
use hashbrown::HashSet;
use indexmap::IndexMap;
use std::rc::{Rc, Weak};
use tracing::{debug, error, info, instrument, trace};

struct Waiter {
	sender: oneshot::Sender<Result<(), ReadyError>>,
	timer: Option<TimerHandle>,
}

#[derive(Default)]
struct State {
	states: IndexMap<String, BusyState>,
	/// Ids force-resolved by [`BusyContext::clear`] whose resolvers haven't been called yet.
	dead: HashSet<String>,
	/// The token this context holds in its parent while busy.
	parent_resolver: Option<BusyStateResolver>,
	recheck_pending: bool,
	waiting_for_gate: bool,
	waiters: IndexMap<u64, Waiter>,
	next_waiter: u64,
}

pub(crate) struct Shared {
	label: String,
	scheduler: Rc<dyn Scheduler>,
	gate: BootstrapGate,
	default_timeout: Rc<Cell<Option<Duration>>>,
	parent: Option<BusyContext>,
	state: RefCell<State>,
}

/// The busy states of one scope, and with that of all scopes nested in it.
///
/// While it has busy states, a context holds exactly one busy state in its parent.
/// Clones share the same context.
#[derive(Clone)]
pub struct BusyContext(Rc<Shared>);

impl BusyContext {
	pub(crate) fn new(label: String, scheduler: Rc<dyn Scheduler>, gate: BootstrapGate, default_timeout: Rc<Cell<Option<Duration>>>, parent: Option<BusyContext>) -> Self {
		Self(Rc::new(Shared { label, scheduler, gate, default_timeout, parent, state: RefCell::default() }))
	}

	/// A context without parent or bootstrap gate.
	pub fn standalone(label: impl Into<String>, scheduler: Rc<dyn Scheduler>) -> Self {
		Self::new(label.into(), scheduler, BootstrapGate::new(true), Rc::default(), None)
	}

	#[must_use]
	pub fn label(&self) -> &str {
		&self.0.label
	}

	#[must_use]
	pub fn parent(&self) -> Option<&BusyContext> {
		self.0.parent.as_ref()
	}

	/// Registers a busy state. The context stays busy until the returned resolver is called.
	#[instrument(skip(self, description), fields(context = %self.0.label))]
	pub fn add_busy_state(&self, description: impl Into<Description>) -> BusyStateResolver {
		let state = BusyState::new(description.into(), self.0.scheduler.now());
		let id = state.id.clone();
		trace!(id = %id, description = ?state.description, "Adding busy state.");

		let register_with_parent = {
			let mut inner = self.0.state.borrow_mut();
			inner.states.insert(id.clone(), state);
			inner.parent_resolver.is_none()
		};
		if let (true, Some(parent)) = (register_with_parent, &self.0.parent) {
			debug!("Becoming busy. Registering with parent context {:?}.", parent.label());
			let context = Rc::downgrade(&self.0);
			let label = self.0.label.clone();
			let resolver = parent.add_busy_state(Description::lazy(move || match context.upgrade() {
				Some(context) => context.describe(),
				None => format!("Busy context [{}]", label),
			}));
			self.0.state.borrow_mut().parent_resolver = Some(resolver);
		}

		BusyStateResolver::new(Rc::downgrade(&self.0), id)
	}

	/// Resolves once this context and all contexts nested in it have no busy states left for a full tick,
	/// and the bootstrap gate is open.
	///
	/// `timeout` overrides the registry-wide default. On timeout, the future fails with the busy states outstanding then.
	#[instrument(skip(self), fields(context = %self.0.label))]
	pub fn when_ready(&self, timeout: Option<Duration>) -> ReadyFuture {
		let (sender, receiver) = oneshot::channel();
		if self.is_ready() {
			trace!("Already ready.");
			let _ = sender.send(Ok(()));
			return ReadyFuture(receiver);
		}

		let timeout = timeout.or_else(|| self.0.default_timeout.get());
		let waiter_id = {
			let mut state = self.0.state.borrow_mut();
			state.next_waiter += 1;
			state.next_waiter
		};
		let timer = timeout.map(|timeout| {
			let context = Rc::downgrade(&self.0);
			self.0.scheduler.set_timeout(
				timeout,
				Box::new(move || {
					if let Some(context) = context.upgrade() {
						context.time_out(waiter_id, timeout);
					}
				}),
			)
		});
		self.0.state.borrow_mut().waiters.insert(waiter_id, Waiter { sender, timer });

		if !self.0.gate.is_open() {
			self.0.wait_for_gate();
		}
		ReadyFuture(receiver)
	}

	/// Whether the bootstrap gate is open, no re-check is pending and there are no busy states.
	#[must_use]
	pub fn is_ready(&self) -> bool {
		let state = self.0.state.borrow();
		self.0.gate.is_open() && !state.recheck_pending && state.states.is_empty()
	}

	/// The outstanding busy states in the order they were added.
	#[must_use]
	pub fn get_busy_states(&self) -> Vec<BusyStateInfo> {
		self.0.busy_states()
	}

	/// Force-resolves all busy states. Their resolvers become no-ops.
	#[instrument(skip(self), fields(context = %self.0.label))]
	pub fn clear(&self) {
		let cleared = {
			let mut state = self.0.state.borrow_mut();
			let ids: Vec<_> = state.states.drain(..).map(|(id, _)| id).collect();
			state.dead.extend(ids.iter().cloned());
			ids.len()
		};
		debug!("Cleared {} busy state(s).", cleared);
		if cleared > 0 {
			self.0.schedule_recheck();
		}
	}

	/// Logs the outstanding busy states at `INFO` level.
	pub fn dump(&self, message: Option<&str>) {
		let states = self.0.busy_states();
		info!("{} [{}]: {} busy state(s)", message.unwrap_or("Busy context dump"), self.0.label, states.len());
		for state in states {
			if cfg!(feature = "dangerous-logging") {
				info!("  {} (since {:?}): {}", state.id, state.added, state.description);
			} else {
				info!("  {} (since {:?})", state.id, state.added);
			}
		}
	}

	/// Sets the timeout [`BusyContext::when_ready`] uses by default. Shared with every context of the same registry.
	pub fn set_default_timeout(&self, timeout: Option<Duration>) {
		self.0.default_timeout.set(timeout);
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl Debug for BusyContext {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let state = self.0.state.borrow();
		f.debug_struct("BusyContext")
			.field("label", &self.0.label)
			.field("busy_states", &state.states.len())
			.field("recheck_pending", &state.recheck_pending)
			.field("waiters", &state.waiters.len())
			.finish_non_exhaustive()
	}
}

impl Shared {
	pub(crate) fn resolve(self: &Rc<Self>, id: &str) -> Result<(), BusyError> {
		let emptied = {
			let mut state = self.state.borrow_mut();
			if state.states.shift_remove(id).is_none() {
				if state.dead.remove(id) {
					trace!("Ignoring resolution of cleared busy state {}.", id);
					return Ok(());
				}
				return Err(BusyError::AlreadyResolved { id: id.to_owned() });
			}
			state.states.is_empty()
		};
		trace!("Resolved busy state {} in {}.", id, self.label);
		if emptied {
			self.schedule_recheck();
		}
		Ok(())
	}

	fn busy_states(&self) -> Vec<BusyStateInfo> {
		self.state.borrow().states.values().map(BusyState::info).collect()
	}

	/// Label and outstanding descriptions, as seen through the token held in the parent.
	fn describe(&self) -> String {
		let descriptions = match self.state.try_borrow() {
			Ok(state) => state.states.values().map(|state| state.description.render()).collect::<Vec<_>>(),
			Err(_) => return format!("Busy context [{}]", self.label),
		};
		format!("Busy context [{}]: {}", self.label, descriptions.join(", "))
	}

	/// Defers the idle decision by one tick, so that states added in reaction to the last resolution are seen.
	fn schedule_recheck(self: &Rc<Self>) {
		{
			let mut state = self.state.borrow_mut();
			if state.recheck_pending {
				return;
			}
			state.recheck_pending = true;
		}
		let context = Rc::downgrade(self);
		self.scheduler.next_tick(Box::new(move || {
			if let Some(context) = context.upgrade() {
				context.recheck();
			}
		}));
	}

	fn recheck(self: &Rc<Self>) {
		let parent_resolver = {
			let mut state = self.state.borrow_mut();
			state.recheck_pending = false;
			if !state.states.is_empty() {
				trace!("{} became busy again before the re-check.", self.label);
				return;
			}
			state.parent_resolver.take()
		};
		debug!("{} is idle.", self.label);
		if let Some(parent_resolver) = parent_resolver {
			if let Err(error) = parent_resolver.resolve() {
				error!("Could not release the parent busy state of {}: {}", self.label, error);
			}
		}
		self.settle();
	}

	/// Resolves all waiters if ready, or arranges to be called again once the bootstrap gate opens.
	fn settle(self: &Rc<Self>) {
		if !self.gate.is_open() {
			self.wait_for_gate();
			return;
		}
		let waiters: Vec<_> = {
			let mut state = self.state.borrow_mut();
			if state.recheck_pending || !state.states.is_empty() {
				return;
			}
			state.waiters.drain(..).map(|(_, waiter)| waiter).collect()
		};
		if !waiters.is_empty() {
			trace!("Waking {} waiter(s) of {}.", waiters.len(), self.label);
		}
		for waiter in waiters {
			if let Some(timer) = waiter.timer {
				self.scheduler.clear_timeout(timer);
			}
			let _ = waiter.sender.send(Ok(()));
		}
	}

	fn wait_for_gate(self: &Rc<Self>) {
		{
			let mut state = self.state.borrow_mut();
			if state.waiting_for_gate {
				return;
			}
			state.waiting_for_gate = true;
		}
		let context: Weak<Self> = Rc::downgrade(self);
		self.gate.on_open(move || {
			if let Some(context) = context.upgrade() {
				context.state.borrow_mut().waiting_for_gate = false;
				context.settle();
			}
		});
	}

	fn time_out(&self, waiter_id: u64, timeout: Duration) {
		let waiter = self.state.borrow_mut().waiters.shift_remove(&waiter_id);
		let Some(waiter) = waiter else { return };
		let error = if self.gate.is_open() {
			ReadyError::Timeout { timeout, busy_states: self.busy_states() }
		} else {
			ReadyError::BootstrapPending { timeout }
		};
		if cfg!(feature = "dangerous-logging") {
			debug!("when_ready on {} timed out: {}", self.label, error);
		} else {
			debug!("when_ready on {} timed out after {:?} with {} busy state(s).", self.label, timeout, error.busy_states().len());
		}
		let _ = waiter.sender.send(Err(error));
	}
}

/// Completes with `Ok(())` once a [`BusyContext`] is ready. See [`BusyContext::when_ready`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct ReadyFuture(oneshot::Receiver<Result<(), ReadyError>>);

impl Future for ReadyFuture {
	type Output = Result<(), ReadyError>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
		self.0.poll_unpin(cx).map(|result| result.unwrap_or(Err(ReadyError::Abandoned)))
	}
}
