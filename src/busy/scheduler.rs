use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	time::Duration,
};
use std::{
	collections::{BTreeMap, VecDeque},
	rc::Rc,
};
use tracing::trace;

pub type Task = Box<dyn FnOnce()>;

/// Identifies a pending [`Scheduler::set_timeout`] task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

/// The event loop readiness tracking runs on.
///
/// Tasks always run later, never from inside the call that scheduled them.
pub trait Scheduler {
	/// Time since an arbitrary but fixed epoch.
	fn now(&self) -> Duration;

	/// Runs `task` on the next tick, before any timer that is due later.
	fn next_tick(&self, task: Task);

	fn set_timeout(&self, delay: Duration, task: Task) -> TimerHandle;

	/// Cancels a timer. Unknown or already-fired handles are ignored.
	fn clear_timeout(&self, handle: TimerHandle);
}

#[derive(Default)]
struct Inner {
	now: Cell<Duration>,
	ticks: RefCell<VecDeque<Task>>,
	/// Keyed by due time, then handle, so that timers due at the same time fire in the order they were set.
	timers: RefCell<BTreeMap<(Duration, u64), Task>>,
	due: RefCell<BTreeMap<u64, Duration>>,
	next_handle: Cell<u64>,
}

/// A deterministic single-threaded event loop. Time only moves through [`ManualScheduler::advance`].
///
/// Clones drive the same loop.
#[derive(Clone, Default)]
pub struct ManualScheduler(Rc<Inner>);

impl ManualScheduler {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Runs queued ticks, including ones they queue, until none are left.
	///
	/// Returns how many ran.
	pub fn run_until_idle(&self) -> usize {
		let mut count = 0;
		loop {
			let task = self.0.ticks.borrow_mut().pop_front();
			match task {
				Some(task) => {
					task();
					count += 1;
				}
				None => break count,
			}
		}
	}

	/// Moves time forward by `delay`, firing due timers in order and draining ticks after each of them.
	pub fn advance(&self, delay: Duration) {
		let target = self.0.now.get() + delay;
		self.run_until_idle();
		loop {
			let next = {
				let mut timers = self.0.timers.borrow_mut();
				match timers.keys().next().copied() {
					Some(key) if key.0 <= target => timers.remove(&key).map(|task| (key, task)),
					_ => None,
				}
			};
			let Some(((due, handle), task)) = next else { break };
			self.0.due.borrow_mut().remove(&handle);
			self.0.now.set(due);
			trace!("Firing timer {} at {:?}.", handle, due);
			task();
			self.run_until_idle();
		}
		self.0.now.set(target);
	}

	#[must_use]
	pub fn pending_ticks(&self) -> usize {
		self.0.ticks.borrow().len()
	}

	#[must_use]
	pub fn pending_timers(&self) -> usize {
		self.0.timers.borrow().len()
	}
}

impl Debug for ManualScheduler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ManualScheduler")
			.field("now", &self.0.now.get())
			.field("pending_ticks", &self.pending_ticks())
			.field("pending_timers", &self.pending_timers())
			.finish()
	}
}

impl Scheduler for ManualScheduler {
	fn now(&self) -> Duration {
		self.0.now.get()
	}

	fn next_tick(&self, task: Task) {
		self.0.ticks.borrow_mut().push_back(task);
	}

	fn set_timeout(&self, delay: Duration, task: Task) -> TimerHandle {
		let handle = self.0.next_handle.get() + 1;
		self.0.next_handle.set(handle);
		let due = self.0.now.get() + delay;
		self.0.timers.borrow_mut().insert((due, handle), task);
		self.0.due.borrow_mut().insert(handle, due);
		TimerHandle(handle)
	}

	fn clear_timeout(&self, handle: TimerHandle) {
		if let Some(due) = self.0.due.borrow_mut().remove(&handle.0) {
			self.0.timers.borrow_mut().remove(&(due, handle.0));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::{ManualScheduler, Scheduler};
	use core::{cell::RefCell, time::Duration};
	use std::rc::Rc;

	#[test]
	fn ticks_run_before_later_timers() {
		let scheduler = ManualScheduler::new();
		let log = Rc::new(RefCell::new(Vec::new()));

		let l = log.clone();
		scheduler.set_timeout(Duration::from_millis(10), Box::new(move || l.borrow_mut().push("timer")));
		let l = log.clone();
		let s = scheduler.clone();
		scheduler.next_tick(Box::new(move || {
			l.borrow_mut().push("tick");
			let l = l.clone();
			s.next_tick(Box::new(move || l.borrow_mut().push("nested tick")));
		}));

		assert_eq!(scheduler.run_until_idle(), 2);
		assert_eq!(*log.borrow(), ["tick", "nested tick"]);

		scheduler.advance(Duration::from_millis(9));
		assert_eq!(log.borrow().len(), 2);
		scheduler.advance(Duration::from_millis(1));
		assert_eq!(*log.borrow(), ["tick", "nested tick", "timer"]);
		assert_eq!(scheduler.now(), Duration::from_millis(10));
	}

	#[test]
	fn cleared_timers_never_fire() {
		let scheduler = ManualScheduler::new();
		let fired = Rc::new(RefCell::new(false));
		let f = fired.clone();
		let handle = scheduler.set_timeout(Duration::from_millis(1), Box::new(move || *f.borrow_mut() = true));
		scheduler.clear_timeout(handle);
		scheduler.clear_timeout(handle);
		scheduler.advance(Duration::from_secs(1));
		assert!(!*fired.borrow());
		assert_eq!(scheduler.pending_timers(), 0);
	}
}
