//! Error types of the renderer and the busy-state subsystem.

use crate::busy::BusyStateInfo;
use core::time::Duration;
use thiserror::Error;

/// Failures of a mount or patch pass.
///
/// These are never swallowed by the renderer: A pass that fails leaves the host tree in whatever state it reached,
/// and the caller decides whether to retry with a fresh mount.
#[derive(Debug, Error)]
pub enum Error {
	/// [`Renderer::mount`](`crate::Renderer::mount`) was called on a [`VNode`](`crate::VNode`) that already owns a host node.
	///
	/// Mounting is not idempotent. Use [`VNode::shallow_copy`](`crate::VNode::shallow_copy`) to place the same description twice.
	#[error("VNode is already mounted")]
	AlreadyMounted,

	/// A patch or removal reached a [`VNode`](`crate::VNode`) that was never mounted.
	#[error("VNode has no host node")]
	NotMounted,

	/// The node description could not be resolved into a host node.
	#[error("unknown node type {0:?}")]
	UnknownNodeType(String),

	/// A host platform call failed.
	#[error("host operation failed: {0}")]
	Host(String),
}

/// Misuse of a busy state resolver.
#[derive(Debug, Error)]
pub enum BusyError {
	/// The busy state was resolved twice without an intermediate [`BusyContext::clear`](`crate::busy::BusyContext::clear`).
	#[error("busy state {id} was already resolved")]
	AlreadyResolved { id: String },
}

/// Why a [`ReadyFuture`](`crate::busy::ReadyFuture`) did not resolve successfully.
#[derive(Debug, Clone, Error)]
pub enum ReadyError {
	/// Busy states were still outstanding when the timeout elapsed.
	#[error("when_ready timed out after {timeout:?}; busy states: {}", describe(busy_states))]
	Timeout { timeout: Duration, busy_states: Vec<BusyStateInfo> },

	/// The application bootstrap gate never opened within the timeout.
	#[error("when_ready timed out after {timeout:?} while the application bootstrap was still pending")]
	BootstrapPending { timeout: Duration },

	/// The busy context was dropped before it became ready.
	#[error("busy context was dropped before it became ready")]
	Abandoned,
}

impl ReadyError {
	/// The busy states outstanding at the time of the timeout, if any.
	#[must_use]
	pub fn busy_states(&self) -> &[BusyStateInfo] {
		match self {
			ReadyError::Timeout { busy_states, .. } => busy_states,
			ReadyError::BootstrapPending { .. } | ReadyError::Abandoned => &[],
		}
	}
}

fn describe(busy_states: &[BusyStateInfo]) -> String {
	if busy_states.is_empty() {
		return "none".to_owned();
	}
	busy_states.iter().map(|state| format!("[{}] {}", state.id, state.description)).collect::<Vec<_>>().join(", ")
}
