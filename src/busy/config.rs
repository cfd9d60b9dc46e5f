use core::time::Duration;

/// Settings shared by all contexts of a [`ContextRegistry`](`super::ContextRegistry`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusyConfig {
	/// Used by [`BusyContext::when_ready`](`super::BusyContext::when_ready`) when no timeout is passed. [`None`] waits forever.
	pub default_timeout: Option<Duration>,
	/// Whether readiness is held back until [`BootstrapGate::complete`](`super::BootstrapGate::complete`) is called.
	pub await_bootstrap: bool,
}

impl BusyConfig {
	#[must_use]
	pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
		self.default_timeout = Some(timeout);
		self
	}

	#[must_use]
	pub fn await_bootstrap(mut self, await_bootstrap: bool) -> Self {
		self.await_bootstrap = await_bootstrap;
		self
	}
}
