//! Hierarchical readiness tracking.
//!
//! Asynchronous work registers a busy state with the [`BusyContext`] of the [`Context`] (scope) it belongs to.
//! A busy context stays busy while it or any context nested in it has outstanding busy states,
//! and [`BusyContext::when_ready`] completes once the whole subtree has been idle for a tick.
//!
//! Scheduling goes through a [`Scheduler`]: [`ManualScheduler`] for tests and headless use,
//! [`WebScheduler`] in the browser.

mod busy_context;
mod config;
mod context;
mod gate;
mod scheduler;
mod state;
mod web;

pub use busy_context::{BusyContext, ReadyFuture};
pub use config::BusyConfig;
pub use context::{Context, ContextRegistry, CONTEXT_ATTRIBUTE};
pub use gate::BootstrapGate;
pub use scheduler::{ManualScheduler, Scheduler, Task, TimerHandle};
pub use state::{BusyStateInfo, BusyStateResolver, Description};
pub use web::WebScheduler;
