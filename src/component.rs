//! Stateful render units and stateless render functions.

use crate::{
	host::Host,
	props::{is_global_attribute, is_listener_name, listener_event_name, Props, Value},
	vnode::VNode,
	Error, Renderer,
};
use core::cell::RefCell;
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::warn;

/// The contract a component implements.
///
/// The renderer applies uncontrolled props (global, ARIA and `data-*` attributes and DOM listeners)
/// to the returned root node itself. They are passed in for reference only.
pub trait Component<H: Host> {
	fn mount(&mut self, renderer: &Renderer<H>, props: &Props<H>, content: &[VNode<H>], uncontrolled: &Props<H>) -> Result<H::Node, Error>;

	fn patch(&mut self, renderer: &Renderer<H>, props: &Props<H>, content: &[VNode<H>], uncontrolled: &Props<H>, old_uncontrolled: &Props<H>) -> Result<(), Error>;

	fn notify_mounted(&mut self) {}

	fn notify_unmounted(&mut self) {}
}

pub type ComponentHandle<H> = Rc<RefCell<Box<dyn Component<H>>>>;

/// Which props a component claims.
pub struct ComponentMetadata<H: Host> {
	properties: IndexMap<String, Option<Value<H>>>,
	events: Vec<String>,
}

impl<H: Host> ComponentMetadata<H> {
	#[must_use]
	pub fn new() -> Self {
		Self { properties: IndexMap::new(), events: Vec::new() }
	}

	#[must_use]
	pub fn property(mut self, name: impl Into<String>) -> Self {
		self.properties.insert(name.into(), None);
		self
	}

	/// Declares a property with a static default, used when the prop is absent.
	#[must_use]
	pub fn property_with_default(mut self, name: impl Into<String>, default: impl Into<Value<H>>) -> Self {
		self.properties.insert(name.into(), Some(default.into()));
		self
	}

	#[must_use]
	pub fn event(mut self, name: impl Into<String>) -> Self {
		self.events.push(name.into());
		self
	}

	#[must_use]
	pub fn declares_property(&self, name: &str) -> bool {
		self.properties.contains_key(name)
	}

	#[must_use]
	pub fn declares_event(&self, event: &str) -> bool {
		self.events.iter().any(|declared| declared == event)
	}
}

impl<H: Host> Default for ComponentMetadata<H> {
	fn default() -> Self {
		Self::new()
	}
}

/// A component type. Two component nodes have the same type iff they share the same definition allocation.
pub struct ComponentDef<H: Host> {
	name: String,
	metadata: ComponentMetadata<H>,
	factory: Box<dyn Fn() -> Box<dyn Component<H>>>,
}

impl<H: Host> ComponentDef<H> {
	pub fn new(name: impl Into<String>, metadata: ComponentMetadata<H>, factory: impl 'static + Fn() -> Box<dyn Component<H>>) -> Rc<Self> {
		Rc::new(Self { name: name.into(), metadata, factory: Box::new(factory) })
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn metadata(&self) -> &ComponentMetadata<H> {
		&self.metadata
	}

	pub(crate) fn instantiate(&self) -> Box<dyn Component<H>> {
		(self.factory)()
	}
}

type RenderClosure<H> = dyn Fn(&Props<H>, &[VNode<H>]) -> VNode<H>;
type ShouldUpdate<H> = dyn Fn(&Props<H>, &Props<H>, &[VNode<H>], &[VNode<H>]) -> bool;

/// A stateless render function.
pub struct RenderFn<H: Host> {
	name: String,
	render: Box<RenderClosure<H>>,
	should_update: Option<Box<ShouldUpdate<H>>>,
}

impl<H: Host> RenderFn<H> {
	pub fn new(name: impl Into<String>, render: impl 'static + Fn(&Props<H>, &[VNode<H>]) -> VNode<H>) -> Rc<Self> {
		Rc::new(Self { name: name.into(), render: Box::new(render), should_update: None })
	}

	/// Like [`RenderFn::new`], but consults `should_update(new_props, old_props, new_content, old_content)` before re-rendering.
	pub fn with_should_update(
		name: impl Into<String>,
		render: impl 'static + Fn(&Props<H>, &[VNode<H>]) -> VNode<H>,
		should_update: impl 'static + Fn(&Props<H>, &Props<H>, &[VNode<H>], &[VNode<H>]) -> bool,
	) -> Rc<Self> {
		Rc::new(Self { name: name.into(), render: Box::new(render), should_update: Some(Box::new(should_update)) })
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	pub(crate) fn render(&self, props: &Props<H>, content: &[VNode<H>]) -> VNode<H> {
		(self.render)(props, content)
	}

	pub(crate) fn should_update(&self, new_props: &Props<H>, old_props: &Props<H>, new_content: &[VNode<H>], old_content: &[VNode<H>]) -> bool {
		match &self.should_update {
			Some(should_update) => should_update(new_props, old_props, new_content, old_content),
			None => default_should_update(new_props, old_props, new_content, old_content),
		}
	}
}

/// Shallow inequality of props and content.
#[must_use]
pub fn default_should_update<H: Host>(new_props: &Props<H>, old_props: &Props<H>, new_content: &[VNode<H>], old_content: &[VNode<H>]) -> bool {
	!new_props.shallow_eq(old_props) || new_content.len() != old_content.len() || new_content.iter().zip(old_content).any(|(new, old)| !new.ptr_eq(old))
}

/// Splits `props` into the ones `metadata` claims (merged over its static defaults) and the uncontrolled ones.
///
/// Listener props are controlled if their event is declared. Undeclared props that are neither global attributes
/// nor listeners are dropped.
#[must_use]
pub fn partition_props<H: Host>(metadata: &ComponentMetadata<H>, props: &Props<H>) -> (Props<H>, Props<H>) {
	partition(metadata, props, true)
}

pub(crate) fn partition<H: Host>(metadata: &ComponentMetadata<H>, props: &Props<H>, report_undeclared: bool) -> (Props<H>, Props<H>) {
	let mut controlled = Props::new();
	for (name, default) in &metadata.properties {
		if let Some(default) = default {
			controlled.insert(name.clone(), default.clone());
		}
	}
	let mut uncontrolled = Props::new();

	for (name, value) in props.iter() {
		if metadata.declares_property(name) || listener_event_name(name).map_or(false, |event| metadata.declares_event(&event)) {
			controlled.insert(name, value.clone());
		} else if is_global_attribute(name) || is_listener_name(name) {
			uncontrolled.insert(name, value.clone());
		} else if report_undeclared {
			warn!("Dropping undeclared component property {:?}", name);
		}
	}
	(controlled, uncontrolled)
}
