//! An in-process document.
//!
//! Every mutation is counted in [`MutationStats`], which makes it possible to check
//! how much host work a patch caused, not just its result.

use super::{Host, NodeId};
use crate::{
	props::{Listener, Value},
	Error,
};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter, Write as _},
};
use std::{
	collections::BTreeMap,
	rc::{Rc, Weak},
};
use tracing::trace;

/// Host mutation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationStats {
	pub created: usize,
	pub inserted: usize,
	pub removed: usize,
	/// Calls to [`Host::clear_children`].
	pub cleared: usize,
	pub text_updates: usize,
	pub attribute_writes: usize,
	pub property_writes: usize,
}

/// Handle to an in-memory document. Clones share the same document and counters.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
	next_id: Rc<Cell<u64>>,
	stats: Rc<Cell<MutationStats>>,
}

impl MemoryHost {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn stats(&self) -> MutationStats {
		self.stats.get()
	}

	pub fn reset_stats(&self) {
		self.stats.set(MutationStats::default());
	}

	fn count(&self, f: impl FnOnce(&mut MutationStats)) {
		let mut stats = self.stats.get();
		f(&mut stats);
		self.stats.set(stats);
	}

	fn new_node(&self, kind: MemoryNodeKind, content: Option<MemoryNode>) -> MemoryNode {
		let id = self.next_id.get() + 1;
		self.next_id.set(id);
		MemoryNode(Rc::new(NodeData {
			id: NodeId(id),
			kind,
			parent: RefCell::new(Weak::new()),
			children: RefCell::new(Vec::new()),
			text: RefCell::new(String::new()),
			attributes: RefCell::new(BTreeMap::new()),
			styles: RefCell::new(BTreeMap::new()),
			properties: RefCell::new(BTreeMap::new()),
			listeners: RefCell::new(Vec::new()),
			content,
		}))
	}

	/// A detached `<body>` to render into.
	#[must_use]
	pub fn create_root(&self) -> MemoryNode {
		self.new_node(MemoryNodeKind::Element { tag: "body".to_owned(), namespace: None }, None)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MemoryNodeKind {
	Element { tag: String, namespace: Option<String> },
	Text,
	Fragment,
}

struct NodeData {
	id: NodeId,
	kind: MemoryNodeKind,
	parent: RefCell<Weak<NodeData>>,
	children: RefCell<Vec<MemoryNode>>,
	text: RefCell<String>,
	attributes: RefCell<BTreeMap<String, String>>,
	styles: RefCell<BTreeMap<String, String>>,
	properties: RefCell<BTreeMap<String, Value<MemoryHost>>>,
	listeners: RefCell<Vec<(String, Listener<MemoryHost>)>>,
	content: Option<MemoryNode>,
}

/// A node in a [`MemoryHost`] document.
#[derive(Clone)]
pub struct MemoryNode(Rc<NodeData>);

/// What [`MemoryNode::dispatch`] hands to listeners.
#[derive(Debug, Clone)]
pub struct MemoryEvent {
	pub event_type: String,
	pub target: MemoryNode,
}

impl MemoryNode {
	#[must_use]
	pub fn id(&self) -> NodeId {
		self.0.id
	}

	#[must_use]
	pub fn tag(&self) -> Option<&str> {
		match &self.0.kind {
			MemoryNodeKind::Element { tag, .. } => Some(tag),
			_ => None,
		}
	}

	#[must_use]
	pub fn namespace(&self) -> Option<String> {
		match &self.0.kind {
			MemoryNodeKind::Element { namespace, .. } => namespace.clone(),
			_ => None,
		}
	}

	#[must_use]
	pub fn is_text(&self) -> bool {
		self.0.kind == MemoryNodeKind::Text
	}

	#[must_use]
	pub fn children(&self) -> Vec<MemoryNode> {
		self.0.children.borrow().clone()
	}

	#[must_use]
	pub fn parent(&self) -> Option<MemoryNode> {
		self.0.parent.borrow().upgrade().map(MemoryNode)
	}

	/// Concatenated text of this node and its descendants.
	#[must_use]
	pub fn text_content(&self) -> String {
		match self.0.kind {
			MemoryNodeKind::Text => self.0.text.borrow().clone(),
			_ => self.0.children.borrow().iter().map(MemoryNode::text_content).collect(),
		}
	}

	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<String> {
		if name == "style" {
			return self.style_attribute();
		}
		self.0.attributes.borrow().get(name).cloned()
	}

	#[must_use]
	pub fn property(&self, name: &str) -> Option<Value<MemoryHost>> {
		self.0.properties.borrow().get(name).cloned()
	}

	#[must_use]
	pub fn style(&self, name: &str) -> Option<String> {
		self.0.styles.borrow().get(name).cloned()
	}

	#[must_use]
	pub fn has_class(&self, token: &str) -> bool {
		self.0.attributes.borrow().get("class").map_or(false, |class| class.split_whitespace().any(|t| t == token))
	}

	#[must_use]
	pub fn listener_count(&self, event: &str) -> usize {
		self.0.listeners.borrow().iter().filter(|(e, _)| e == event).count()
	}

	/// Calls the listeners for `event` on this node in registration order, dropping `once` ones.
	///
	/// Returns how many listeners ran.
	pub fn dispatch(&self, event: &str) -> usize {
		let listeners: Vec<_> = self.0.listeners.borrow().iter().filter(|(e, _)| e == event).map(|(_, l)| l.clone()).collect();
		self.0.listeners.borrow_mut().retain(|(e, l)| !(e == event && l.options.once));

		let payload = MemoryEvent { event_type: event.to_owned(), target: self.clone() };
		for listener in &listeners {
			listener.call(&payload);
		}
		listeners.len()
	}

	/// The content fragment of a `<template>`.
	#[must_use]
	pub fn content(&self) -> Option<MemoryNode> {
		self.0.content.clone()
	}

	#[must_use]
	pub fn inner_html(&self) -> String {
		let mut html = String::new();
		for child in self.0.children.borrow().iter() {
			child.write_html(&mut html);
		}
		html
	}

	#[must_use]
	pub fn outer_html(&self) -> String {
		let mut html = String::new();
		self.write_html(&mut html);
		html
	}

	fn write_html(&self, html: &mut String) {
		match &self.0.kind {
			MemoryNodeKind::Text => html.push_str(&self.0.text.borrow()),
			MemoryNodeKind::Fragment => html.push_str(&self.inner_html()),
			MemoryNodeKind::Element { tag, .. } => {
				html.push('<');
				html.push_str(tag);
				let mut attributes = self.0.attributes.borrow().clone();
				if let Some(style) = self.style_attribute() {
					attributes.insert("style".to_owned(), style);
				}
				for (name, value) in attributes {
					let _ = write!(html, " {}=\"{}\"", name, value);
				}
				html.push('>');
				html.push_str(&self.inner_html());
				let _ = write!(html, "</{}>", tag);
			}
		}
	}

	fn style_attribute(&self) -> Option<String> {
		let styles = self.0.styles.borrow();
		if styles.is_empty() {
			return None;
		}
		Some(styles.iter().map(|(name, value)| format!("{}: {};", name, value)).collect::<Vec<_>>().join(" "))
	}

	fn position_of(&self, child: &MemoryNode) -> Option<usize> {
		self.0.children.borrow().iter().position(|c| Rc::ptr_eq(&c.0, &child.0))
	}

	fn detach(&self) {
		if let Some(parent) = self.parent() {
			if let Some(index) = parent.position_of(self) {
				parent.0.children.borrow_mut().remove(index);
			}
		}
		*self.0.parent.borrow_mut() = Weak::new();
	}
}

impl Debug for MemoryNode {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match &self.0.kind {
			MemoryNodeKind::Element { tag, .. } => write!(f, "<{}>#{}", tag, self.0.id.0),
			MemoryNodeKind::Text => write!(f, "#text#{}", self.0.id.0),
			MemoryNodeKind::Fragment => write!(f, "#fragment#{}", self.0.id.0),
		}
	}
}

impl PartialEq for MemoryNode {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}
impl Eq for MemoryNode {}

fn host_error(message: &str, node: &MemoryNode) -> Error {
	Error::Host(format!("{} ({:?})", message, node))
}

impl Host for MemoryHost {
	type Node = MemoryNode;
	type Event = MemoryEvent;

	fn create_element(&self, tag: &str, namespace: Option<&str>) -> Result<MemoryNode, Error> {
		self.count(|stats| stats.created += 1);
		let kind = MemoryNodeKind::Element { tag: tag.to_owned(), namespace: namespace.map(ToOwned::to_owned) };
		let content = (tag == "template" && namespace.is_none()).then(|| self.new_node(MemoryNodeKind::Fragment, None));
		Ok(self.new_node(kind, content))
	}

	fn create_text(&self, text: &str) -> Result<MemoryNode, Error> {
		self.count(|stats| stats.created += 1);
		let node = self.new_node(MemoryNodeKind::Text, None);
		*node.0.text.borrow_mut() = text.to_owned();
		Ok(node)
	}

	fn set_text(&self, node: &MemoryNode, text: &str) -> Result<(), Error> {
		if !node.is_text() {
			return Err(host_error("not a text node", node));
		}
		self.count(|stats| stats.text_updates += 1);
		*node.0.text.borrow_mut() = text.to_owned();
		Ok(())
	}

	fn insert_before(&self, parent: &MemoryNode, child: &MemoryNode, reference: Option<&MemoryNode>) -> Result<(), Error> {
		if reference == Some(child) {
			trace!("Inserting {:?} before itself.", child);
			return Ok(());
		}
		if parent.is_text() {
			return Err(host_error("text nodes have no children", parent));
		}
		if reference.map_or(false, |reference| parent.position_of(reference).is_none()) {
			return Err(host_error("reference node is not a child of the parent", parent));
		}

		child.detach();
		let index = match reference {
			Some(reference) => parent.position_of(reference).ok_or_else(|| host_error("reference node vanished", parent))?,
			None => parent.0.children.borrow().len(),
		};
		parent.0.children.borrow_mut().insert(index, child.clone());
		*child.0.parent.borrow_mut() = Rc::downgrade(&parent.0);
		self.count(|stats| stats.inserted += 1);
		Ok(())
	}

	fn remove_child(&self, parent: &MemoryNode, child: &MemoryNode) -> Result<(), Error> {
		if parent.position_of(child).is_none() {
			return Err(host_error("not a child of the parent", child));
		}
		child.detach();
		self.count(|stats| stats.removed += 1);
		Ok(())
	}

	fn clear_children(&self, parent: &MemoryNode) -> Result<(), Error> {
		for child in parent.0.children.take() {
			*child.0.parent.borrow_mut() = Weak::new();
		}
		self.count(|stats| stats.cleared += 1);
		Ok(())
	}

	fn child_count(&self, parent: &MemoryNode) -> usize {
		parent.0.children.borrow().len()
	}

	fn parent(&self, node: &MemoryNode) -> Option<MemoryNode> {
		node.parent()
	}

	fn same_node(&self, a: &MemoryNode, b: &MemoryNode) -> bool {
		a == b
	}

	fn node_id(&self, node: &MemoryNode) -> NodeId {
		node.id()
	}

	fn template_content(&self, template: &MemoryNode) -> Option<MemoryNode> {
		template.content()
	}

	fn get_attribute(&self, node: &MemoryNode, name: &str) -> Option<String> {
		node.attribute(name)
	}

	fn set_attribute(&self, node: &MemoryNode, _namespace: Option<&str>, name: &str, value: &str) -> Result<(), Error> {
		self.count(|stats| stats.attribute_writes += 1);
		if name == "style" {
			let mut styles = node.0.styles.borrow_mut();
			styles.clear();
			for declaration in value.split(';') {
				if let Some((name, value)) = declaration.split_once(':') {
					styles.insert(name.trim().to_owned(), value.trim().to_owned());
				}
			}
		} else {
			node.0.attributes.borrow_mut().insert(name.to_owned(), value.to_owned());
		}
		Ok(())
	}

	fn remove_attribute(&self, node: &MemoryNode, _namespace: Option<&str>, name: &str) -> Result<(), Error> {
		self.count(|stats| stats.attribute_writes += 1);
		if name == "style" {
			node.0.styles.borrow_mut().clear();
		} else {
			node.0.attributes.borrow_mut().remove(name);
		}
		Ok(())
	}

	fn set_property(&self, node: &MemoryNode, name: &str, value: &Value<Self>) -> Result<(), Error> {
		self.count(|stats| stats.property_writes += 1);
		let mut properties = node.0.properties.borrow_mut();
		match value {
			Value::Null => properties.remove(name),
			value => properties.insert(name.to_owned(), value.clone()),
		};
		Ok(())
	}

	fn set_style(&self, node: &MemoryNode, name: &str, value: Option<&str>) -> Result<(), Error> {
		let mut styles = node.0.styles.borrow_mut();
		match value {
			Some(value) => styles.insert(name.to_owned(), value.to_owned()),
			None => styles.remove(name),
		};
		Ok(())
	}

	fn set_class_name(&self, node: &MemoryNode, class_name: &str) -> Result<(), Error> {
		self.set_attribute(node, None, "class", class_name)
	}

	fn add_class(&self, node: &MemoryNode, token: &str) -> Result<(), Error> {
		if node.has_class(token) {
			return Ok(());
		}
		let class = match node.attribute("class") {
			Some(class) if !class.trim().is_empty() => format!("{} {}", class.trim(), token),
			_ => token.to_owned(),
		};
		self.set_attribute(node, None, "class", &class)
	}

	fn remove_class(&self, node: &MemoryNode, token: &str) -> Result<(), Error> {
		if let Some(class) = node.attribute("class") {
			let class = class.split_whitespace().filter(|t| *t != token).collect::<Vec<_>>().join(" ");
			self.set_attribute(node, None, "class", &class)?;
		}
		Ok(())
	}

	fn add_listener(&self, node: &MemoryNode, event: &str, listener: &Listener<Self>) -> Result<(), Error> {
		let mut listeners = node.0.listeners.borrow_mut();
		let duplicate = listeners.iter().any(|(e, l)| e == event && l.callback_address() == listener.callback_address() && l.options.capture == listener.options.capture);
		if !duplicate {
			listeners.push((event.to_owned(), listener.clone()));
		}
		Ok(())
	}

	fn remove_listener(&self, node: &MemoryNode, event: &str, listener: &Listener<Self>) -> Result<(), Error> {
		let mut listeners = node.0.listeners.borrow_mut();
		if let Some(index) = listeners.iter().position(|(e, l)| e == event && l.callback_address() == listener.callback_address() && l.options.capture == listener.options.capture) {
			listeners.remove(index);
		}
		Ok(())
	}
}
