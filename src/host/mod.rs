//! The live node platform a [`Renderer`](`crate::Renderer`) mutates.
//!
//! [`memory::MemoryHost`] is an in-process document that records every mutation,
//! [`web::WebHost`] binds to the browser DOM through [`web_sys`].

use crate::{
	props::{Listener, Value},
	Error,
};
use core::fmt::Debug;

pub mod memory;
pub mod web;

/// Namespace of SVG elements.
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
/// Namespace of `xlink:`-prefixed attributes.
pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

/// Stable identity of a host node, used as side table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// A document-like node factory and mutator.
///
/// All methods take `&self`: A host is shared by the whole render pass and by components mounting their own subtrees.
pub trait Host: Sized {
	/// A handle to a live node. Cloning the handle does not clone the node.
	type Node: Clone + Debug;
	/// The payload handed to event listeners.
	type Event;

	fn create_element(&self, tag: &str, namespace: Option<&str>) -> Result<Self::Node, Error>;
	fn create_text(&self, text: &str) -> Result<Self::Node, Error>;
	fn set_text(&self, node: &Self::Node, text: &str) -> Result<(), Error>;

	/// Inserts `child` before `reference`, or appends it if `reference` is [`None`].
	///
	/// If `child` is already attached somewhere, it is moved.
	fn insert_before(&self, parent: &Self::Node, child: &Self::Node, reference: Option<&Self::Node>) -> Result<(), Error>;
	fn remove_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<(), Error>;

	/// Removes all children of `parent` at once (`textContent = ''`).
	fn clear_children(&self, parent: &Self::Node) -> Result<(), Error>;
	fn child_count(&self, parent: &Self::Node) -> usize;
	fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
	fn same_node(&self, a: &Self::Node, b: &Self::Node) -> bool;
	fn node_id(&self, node: &Self::Node) -> NodeId;

	/// The content fragment of a `<template>` element.
	fn template_content(&self, template: &Self::Node) -> Option<Self::Node>;

	fn get_attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
	fn set_attribute(&self, node: &Self::Node, namespace: Option<&str>, name: &str, value: &str) -> Result<(), Error>;
	fn remove_attribute(&self, node: &Self::Node, namespace: Option<&str>, name: &str) -> Result<(), Error>;

	/// Assigns a host object property. [`Value::Null`] unsets it.
	fn set_property(&self, node: &Self::Node, name: &str, value: &Value<Self>) -> Result<(), Error>;

	/// Sets (or with [`None`], unsets) a single style property.
	fn set_style(&self, node: &Self::Node, name: &str, value: Option<&str>) -> Result<(), Error>;
	fn set_class_name(&self, node: &Self::Node, class_name: &str) -> Result<(), Error>;
	fn add_class(&self, node: &Self::Node, token: &str) -> Result<(), Error>;
	fn remove_class(&self, node: &Self::Node, token: &str) -> Result<(), Error>;

	fn add_listener(&self, node: &Self::Node, event: &str, listener: &Listener<Self>) -> Result<(), Error>;

	/// Removes a listener previously added with the same `event`, callback and options.
	fn remove_listener(&self, node: &Self::Node, event: &str, listener: &Listener<Self>) -> Result<(), Error>;
}
