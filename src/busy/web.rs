use super::scheduler::{Scheduler, Task, TimerHandle};
use core::time::Duration;
use js_sys::{Date, Function};
use tracing::warn;
use wasm_bindgen::{closure::Closure, JsCast};

/// Schedules on the browser event loop through `window.setTimeout`.
///
/// A cleared timer's closure is not freed until the page unloads.
#[derive(Debug, Clone)]
pub struct WebScheduler {
	window: web_sys::Window,
}

impl WebScheduler {
	#[must_use]
	pub fn new(window: web_sys::Window) -> Self {
		Self { window }
	}

	#[must_use]
	pub fn from_window() -> Option<Self> {
		web_sys::window().map(Self::new)
	}

	fn schedule(&self, delay: Duration, task: Task) -> Option<i32> {
		let callback = Closure::once_into_js(task);
		let delay = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
		match self.window.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref::<Function>(), delay) {
			Ok(handle) => Some(handle),
			Err(error) => {
				warn!("setTimeout failed: {:?}", error);
				None
			}
		}
	}
}

impl Scheduler for WebScheduler {
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn now(&self) -> Duration {
		Duration::from_millis(Date::now() as u64)
	}

	fn next_tick(&self, task: Task) {
		self.schedule(Duration::ZERO, task);
	}

	#[allow(clippy::cast_sign_loss)]
	fn set_timeout(&self, delay: Duration, task: Task) -> TimerHandle {
		TimerHandle(self.schedule(delay, task).map_or(0, |handle| handle as u64))
	}

	#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
	fn clear_timeout(&self, handle: TimerHandle) {
		if handle.0 != 0 {
			self.window.clear_timeout_with_handle(handle.0 as i32);
		}
	}
}
