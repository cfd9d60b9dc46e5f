use super::{busy_context::BusyContext, config::BusyConfig, gate::BootstrapGate, scheduler::Scheduler};
use crate::host::{Host, NodeId};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	time::Duration,
};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{debug, instrument};

/// Attribute that marks a host node as the root of its own busy scope.
pub const CONTEXT_ATTRIBUTE: &str = "data-oj-context";

/// A busy scope: either a marked host node or the page.
#[derive(Debug, Clone)]
pub struct Context {
	node: Option<NodeId>,
	busy_context: BusyContext,
}

impl Context {
	#[must_use]
	pub fn busy_context(&self) -> &BusyContext {
		&self.busy_context
	}

	/// The marked node, or [`None`] for the page context.
	#[must_use]
	pub fn node_id(&self) -> Option<NodeId> {
		self.node
	}

	#[must_use]
	pub fn is_page_context(&self) -> bool {
		self.node.is_none()
	}
}

/// Finds and caches the [`Context`] of host nodes.
///
/// Each scope is created once, with its [`BusyContext`] pointing at the nearest enclosing scope's.
/// Moving a marked node to another scope afterwards does not change that parent.
pub struct ContextRegistry {
	scheduler: Rc<dyn Scheduler>,
	gate: BootstrapGate,
	default_timeout: Rc<Cell<Option<Duration>>>,
	page: Context,
	scopes: RefCell<HashMap<NodeId, Context>>,
}

impl ContextRegistry {
	pub fn new(scheduler: Rc<dyn Scheduler>, config: BusyConfig) -> Self {
		let gate = BootstrapGate::new(!config.await_bootstrap);
		let default_timeout = Rc::new(Cell::new(config.default_timeout));
		let page = Context {
			node: None,
			busy_context: BusyContext::new("page".to_owned(), Rc::clone(&scheduler), gate.clone(), Rc::clone(&default_timeout), None),
		};
		Self { scheduler, gate, default_timeout, page, scopes: RefCell::default() }
	}

	#[must_use]
	pub fn page_context(&self) -> &Context {
		&self.page
	}

	#[must_use]
	pub fn bootstrap_gate(&self) -> &BootstrapGate {
		&self.gate
	}

	pub fn set_default_timeout(&self, timeout: Option<Duration>) {
		self.default_timeout.set(timeout);
	}

	/// The context of the nearest node at or above `node` that carries [`CONTEXT_ATTRIBUTE`], or the page context.
	#[instrument(skip(self, host))]
	pub fn get_context<H: Host>(&self, host: &H, node: &H::Node) -> Context {
		let mut current = Some(node.clone());
		while let Some(candidate) = current {
			if host.get_attribute(&candidate, CONTEXT_ATTRIBUTE).is_some() {
				return self.scope(host, &candidate);
			}
			current = host.parent(&candidate);
		}
		self.page.clone()
	}

	fn scope<H: Host>(&self, host: &H, node: &H::Node) -> Context {
		let node_id = host.node_id(node);
		if let Some(context) = self.scopes.borrow().get(&node_id) {
			return context.clone();
		}

		let parent = match host.parent(node) {
			Some(parent) => self.get_context(host, &parent),
			None => self.page.clone(),
		};
		debug!("Creating busy scope for {:?} below {:?}.", node, parent.busy_context().label());
		let context = Context {
			node: Some(node_id),
			busy_context: BusyContext::new(
				format!("{:?}", node),
				Rc::clone(&self.scheduler),
				self.gate.clone(),
				Rc::clone(&self.default_timeout),
				Some(parent.busy_context.clone()),
			),
		};
		self.scopes.borrow_mut().insert(node_id, context.clone());
		context
	}

	/// Drops the cached scope of a node, for example after it was removed from the document.
	///
	/// Returns whether there was one.
	pub fn forget(&self, node_id: NodeId) -> bool {
		self.scopes.borrow_mut().remove(&node_id).is_some()
	}
}

impl Debug for ContextRegistry {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ContextRegistry")
			.field("gate", &self.gate)
			.field("default_timeout", &self.default_timeout.get())
			.field("scopes", &self.scopes.borrow().len())
			.finish_non_exhaustive()
	}
}
