//! Property values and the policy deciding how each property reaches a host node.

use crate::host::Host;
use core::{
	any::Any,
	fmt::{self, Debug, Formatter},
	hash::Hash,
};
use indexmap::IndexMap;
use std::{collections::BTreeMap, rc::Rc};

/// Sibling-local identity of a [`VNode`](`crate::VNode`) across renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
	Int(i64),
	Str(Rc<str>),
}

impl From<i64> for Key {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}
impl From<i32> for Key {
	fn from(value: i32) -> Self {
		Self::Int(value.into())
	}
}
impl From<&str> for Key {
	fn from(value: &str) -> Self {
		Self::Str(value.into())
	}
}
impl From<String> for Key {
	fn from(value: String) -> Self {
		Self::Str(value.into())
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ListenerOptions {
	pub capture: bool,
	pub once: bool,
	pub passive: bool,
}

/// An event callback plus the options it was registered with.
///
/// Two listeners are equal if they share the same callback allocation and options.
pub struct Listener<H: Host> {
	callback: Rc<dyn Fn(&H::Event)>,
	pub options: ListenerOptions,
}

impl<H: Host> Listener<H> {
	pub fn new(callback: impl 'static + Fn(&H::Event)) -> Self {
		Self { callback: Rc::new(callback), options: ListenerOptions::default() }
	}

	#[must_use]
	pub fn with_options(mut self, options: ListenerOptions) -> Self {
		self.options = options;
		self
	}

	pub fn call(&self, event: &H::Event) {
		(self.callback)(event);
	}

	/// Address of the callback allocation. Shared by all clones of this listener.
	#[must_use]
	pub fn callback_address(&self) -> usize {
		Rc::as_ptr(&self.callback).cast::<()>() as usize
	}

	#[must_use]
	pub fn callback(&self) -> &Rc<dyn Fn(&H::Event)> {
		&self.callback
	}
}

impl<H: Host> Clone for Listener<H> {
	fn clone(&self) -> Self {
		Self { callback: Rc::clone(&self.callback), options: self.options }
	}
}

impl<H: Host> PartialEq for Listener<H> {
	fn eq(&self, other: &Self) -> bool {
		self.callback_address() == other.callback_address() && self.options == other.options
	}
}

impl<H: Host> Debug for Listener<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Listener").field("callback", &format_args!("{:#x}", self.callback_address())).field("options", &self.options).finish()
	}
}

/// Callback receiving the mounted host node, and [`None`] on unmount or replacement.
pub struct NodeRef<H: Host>(Rc<dyn Fn(Option<&H::Node>)>);

impl<H: Host> NodeRef<H> {
	pub fn new(callback: impl 'static + Fn(Option<&H::Node>)) -> Self {
		Self(Rc::new(callback))
	}

	pub fn call(&self, node: Option<&H::Node>) {
		(self.0)(node);
	}

	pub(crate) fn same(&self, other: &Self) -> bool {
		Rc::as_ptr(&self.0).cast::<()>() == Rc::as_ptr(&other.0).cast::<()>()
	}
}

impl<H: Host> Clone for NodeRef<H> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<H: Host> Debug for NodeRef<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "NodeRef({:p})", Rc::as_ptr(&self.0).cast::<()>())
	}
}

/// A property value.
pub enum Value<H: Host> {
	Null,
	Bool(bool),
	Number(f64),
	Text(Rc<str>),
	/// Individual style properties, merged into the host node's inline style.
	Style(Rc<BTreeMap<String, String>>),
	/// Class tokens mapped to whether they are present.
	Classes(Rc<BTreeMap<String, bool>>),
	Listener(Listener<H>),
	/// Anything else, compared by allocation.
	Opaque(Rc<dyn Any>),
}

impl<H: Host> Value<H> {
	pub fn style<K: Into<String>, V: Into<String>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
		Self::Style(Rc::new(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect()))
	}

	pub fn classes<K: Into<String>>(entries: impl IntoIterator<Item = (K, bool)>) -> Self {
		Self::Classes(Rc::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()))
	}

	#[must_use]
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Value::Text(text) => Some(text),
			_ => None,
		}
	}

	/// Renders the value the way it appears in an attribute, or [`None`] if the attribute should be absent.
	#[must_use]
	pub fn to_attribute(&self) -> Option<String> {
		match self {
			Value::Null | Value::Bool(false) => None,
			Value::Bool(true) => Some(String::new()),
			Value::Number(number) => Some(number.to_string()),
			Value::Text(text) => Some(text.to_string()),
			Value::Style(style) => Some(style.iter().map(|(k, v)| format!("{}: {};", k, v)).collect::<Vec<_>>().join(" ")),
			Value::Classes(_) => Some(class_tokens(self).join(" ")),
			Value::Listener(_) | Value::Opaque(_) => None,
		}
	}
}

impl<H: Host> Clone for Value<H> {
	fn clone(&self) -> Self {
		match self {
			Value::Null => Value::Null,
			Value::Bool(value) => Value::Bool(*value),
			Value::Number(value) => Value::Number(*value),
			Value::Text(value) => Value::Text(Rc::clone(value)),
			Value::Style(value) => Value::Style(Rc::clone(value)),
			Value::Classes(value) => Value::Classes(Rc::clone(value)),
			Value::Listener(value) => Value::Listener(value.clone()),
			Value::Opaque(value) => Value::Opaque(Rc::clone(value)),
		}
	}
}

impl<H: Host> PartialEq for Value<H> {
	#[allow(clippy::float_cmp)]
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Number(a), Value::Number(b)) => a == b,
			(Value::Text(a), Value::Text(b)) => a == b,
			(Value::Style(a), Value::Style(b)) => Rc::ptr_eq(a, b) || a == b,
			(Value::Classes(a), Value::Classes(b)) => Rc::ptr_eq(a, b) || a == b,
			(Value::Listener(a), Value::Listener(b)) => a == b,
			(Value::Opaque(a), Value::Opaque(b)) => Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>(),
			_ => false,
		}
	}
}

impl<H: Host> Debug for Value<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("Null"),
			Value::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
			Value::Number(value) => f.debug_tuple("Number").field(value).finish(),
			Value::Text(value) => f.debug_tuple("Text").field(value).finish(),
			Value::Style(value) => f.debug_tuple("Style").field(value).finish(),
			Value::Classes(value) => f.debug_tuple("Classes").field(value).finish(),
			Value::Listener(value) => value.fmt(f),
			Value::Opaque(value) => write!(f, "Opaque({:p})", Rc::as_ptr(value).cast::<()>()),
		}
	}
}

impl<H: Host> From<bool> for Value<H> {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}
impl<H: Host> From<f64> for Value<H> {
	fn from(value: f64) -> Self {
		Self::Number(value)
	}
}
impl<H: Host> From<i32> for Value<H> {
	fn from(value: i32) -> Self {
		Self::Number(value.into())
	}
}
impl<H: Host> From<&str> for Value<H> {
	fn from(value: &str) -> Self {
		Self::Text(value.into())
	}
}
impl<H: Host> From<String> for Value<H> {
	fn from(value: String) -> Self {
		Self::Text(value.into())
	}
}
impl<H: Host> From<Listener<H>> for Value<H> {
	fn from(value: Listener<H>) -> Self {
		Self::Listener(value)
	}
}

/// The properties of a [`VNode`](`crate::VNode`), including its reserved `key` and `ref`.
pub struct Props<H: Host> {
	pub(crate) key: Option<Key>,
	pub(crate) node_ref: Option<NodeRef<H>>,
	entries: IndexMap<String, Value<H>>,
}

impl<H: Host> Props<H> {
	#[must_use]
	pub fn new() -> Self {
		Self { key: None, node_ref: None, entries: IndexMap::new() }
	}

	#[must_use]
	pub fn key(mut self, key: impl Into<Key>) -> Self {
		self.key = Some(key.into());
		self
	}

	#[must_use]
	pub fn node_ref(mut self, node_ref: NodeRef<H>) -> Self {
		self.node_ref = Some(node_ref);
		self
	}

	#[must_use]
	pub fn with(mut self, name: impl Into<String>, value: impl Into<Value<H>>) -> Self {
		self.insert(name, value);
		self
	}

	/// Binds `listener` to `event` through the `on`-prefixed property name.
	#[must_use]
	pub fn on(self, event: &str, listener: Listener<H>) -> Self {
		let mut chars = event.chars();
		let name = match chars.next() {
			Some(first) => format!("on{}{}", first.to_ascii_uppercase(), chars.as_str()),
			None => "on".to_owned(),
		};
		self.with(name, listener)
	}

	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value<H>>) -> Option<Value<H>> {
		self.entries.insert(name.into(), value.into())
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<&Value<H>> {
		self.entries.get(name)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value<H>)> {
		self.entries.iter().map(|(name, value)| (name.as_str(), value))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	#[must_use]
	pub fn get_key(&self) -> Option<&Key> {
		self.key.as_ref()
	}

	/// Shallow equality of the DOM-settable entries, ignoring `key` and `ref`.
	#[must_use]
	pub fn shallow_eq(&self, other: &Self) -> bool {
		self.entries.len() == other.entries.len() && self.entries.iter().all(|(name, value)| other.entries.get(name) == Some(value))
	}
}

impl<H: Host> Default for Props<H> {
	fn default() -> Self {
		Self::new()
	}
}

impl<H: Host> Clone for Props<H> {
	fn clone(&self) -> Self {
		Self { key: self.key.clone(), node_ref: self.node_ref.clone(), entries: self.entries.clone() }
	}
}

impl<H: Host> Debug for Props<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut map = f.debug_map();
		if let Some(key) = &self.key {
			map.entry(&"key", key);
		}
		if let Some(node_ref) = &self.node_ref {
			map.entry(&"ref", node_ref);
		}
		map.entries(self.entries.iter()).finish()
	}
}

/// How an element's properties are expressed on its host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementCategory {
	Html,
	Svg,
	/// Tag names containing a hyphen.
	Custom,
	/// `<template>`, whose content belongs to the template contract.
	Template,
}

/// Where a single property lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyTarget {
	/// Never set on the host node.
	Ignored,
	Style,
	Class,
	Listener,
	Attribute,
	Property,
}

/// Properties that must stay live JS properties even though they also exist as attributes.
const LIVE_PROPERTIES: &[&str] = &["value", "checked", "selected", "indeterminate", "muted", "textContent", "innerHTML"];

const GLOBAL_ATTRIBUTES: &[&str] = &[
	"accesskey",
	"autocapitalize",
	"autofocus",
	"class",
	"contenteditable",
	"dir",
	"draggable",
	"enterkeyhint",
	"hidden",
	"id",
	"inert",
	"inputmode",
	"is",
	"lang",
	"nonce",
	"part",
	"popover",
	"role",
	"slot",
	"spellcheck",
	"style",
	"tabindex",
	"title",
	"translate",
];

/// Global, ARIA and `data-*` attributes. These belong to the element rather than to a component.
#[must_use]
pub fn is_global_attribute(name: &str) -> bool {
	name.starts_with("aria-") || name.starts_with("data-") || GLOBAL_ATTRIBUTES.contains(&name)
}

/// `on` followed by an uppercase letter, as in `onClick`.
#[must_use]
pub fn is_listener_name(name: &str) -> bool {
	name.len() > 2 && name.starts_with("on") && name.as_bytes()[2].is_ascii_uppercase()
}

/// `onClick` → `click`, `onOjAction` → `ojAction`.
#[must_use]
pub fn listener_event_name(name: &str) -> Option<String> {
	if !is_listener_name(name) {
		return None;
	}
	let rest = &name[2..];
	let mut chars = rest.chars();
	chars.next().map(|first| format!("{}{}", first.to_ascii_lowercase(), chars.as_str()))
}

/// The property policy table.
#[must_use]
pub fn classify(category: ElementCategory, name: &str) -> PropertyTarget {
	match name {
		"key" | "ref" | "children" | "content" => return PropertyTarget::Ignored,
		"style" => return PropertyTarget::Style,
		"class" => return PropertyTarget::Class,
		_ => (),
	}
	if is_listener_name(name) {
		return PropertyTarget::Listener;
	}

	match category {
		ElementCategory::Svg => PropertyTarget::Attribute,
		ElementCategory::Template if name == "render" => PropertyTarget::Property,
		ElementCategory::Html | ElementCategory::Template => {
			if LIVE_PROPERTIES.contains(&name) || name.bytes().any(|b| b.is_ascii_uppercase()) {
				PropertyTarget::Property
			} else {
				PropertyTarget::Attribute
			}
		}
		ElementCategory::Custom => {
			if is_global_attribute(name) {
				PropertyTarget::Attribute
			} else {
				PropertyTarget::Property
			}
		}
	}
}

/// The namespace of a prefixed attribute name such as `xlink:href`, or [`None`] for plain names.
#[must_use]
pub fn attribute_namespace(name: &str) -> Option<&'static str> {
	name.starts_with("xlink:").then(|| crate::host::XLINK_NAMESPACE)
}

/// The class tokens a value stands for.
#[must_use]
pub fn class_tokens<H: Host>(value: &Value<H>) -> Vec<&str> {
	match value {
		Value::Text(text) => text.split_whitespace().collect(),
		Value::Classes(classes) => classes.iter().filter(|(_, &present)| present).map(|(token, _)| token.as_str()).collect(),
		_ => Vec::new(),
	}
}
