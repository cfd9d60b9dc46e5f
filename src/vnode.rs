use crate::{
	component::{ComponentDef, ComponentHandle, RenderFn},
	host::Host,
	props::{ElementCategory, Key, NodeRef, Props},
	Error,
};
use core::{
	cell::{OnceCell, Ref, RefCell, RefMut},
	fmt::{self, Debug, Formatter},
};
use std::rc::Rc;

/// What a [`VNode`] renders as.
pub enum NodeKind<H: Host> {
	Text(Rc<str>),
	Element { tag: Rc<str>, category: ElementCategory },
	Component(Rc<ComponentDef<H>>),
	Render(Rc<RenderFn<H>>),
	/// A host node owned by someone else, placed as-is.
	Wrapped,
}

impl<H: Host> NodeKind<H> {
	/// Classifies a tag name. `svg` starts an SVG subtree, hyphenated names are custom elements.
	#[must_use]
	pub fn element(tag: &str) -> Self {
		let category = match tag {
			"svg" => ElementCategory::Svg,
			"template" => ElementCategory::Template,
			_ if tag.contains('-') => ElementCategory::Custom,
			_ => ElementCategory::Html,
		};
		Self::Element { tag: tag.into(), category }
	}

	/// Whether a node of `self` can be patched in place from a node of `other`.
	#[must_use]
	pub fn same_type(&self, other: &Self) -> bool {
		match (self, other) {
			(NodeKind::Text(_), NodeKind::Text(_)) | (NodeKind::Wrapped, NodeKind::Wrapped) => true,
			(NodeKind::Element { tag: t_1, category: c_1 }, NodeKind::Element { tag: t_2, category: c_2 }) => t_1 == t_2 && c_1 == c_2,
			(NodeKind::Component(d_1), NodeKind::Component(d_2)) => Rc::ptr_eq(d_1, d_2),
			(NodeKind::Render(r_1), NodeKind::Render(r_2)) => Rc::ptr_eq(r_1, r_2),
			_ => false,
		}
	}
}

impl<H: Host> Clone for NodeKind<H> {
	fn clone(&self) -> Self {
		match self {
			NodeKind::Text(text) => NodeKind::Text(Rc::clone(text)),
			NodeKind::Element { tag, category } => NodeKind::Element { tag: Rc::clone(tag), category: *category },
			NodeKind::Component(def) => NodeKind::Component(Rc::clone(def)),
			NodeKind::Render(def) => NodeKind::Render(Rc::clone(def)),
			NodeKind::Wrapped => NodeKind::Wrapped,
		}
	}
}

impl<H: Host> Debug for NodeKind<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			#[cfg(feature = "dangerous-logging")]
			NodeKind::Text(text) => f.debug_tuple("Text").field(text).finish(),
			#[cfg(not(feature = "dangerous-logging"))]
			NodeKind::Text(text) => write!(f, "Text({} bytes)", text.len()),
			NodeKind::Element { tag, category } => write!(f, "<{}> ({:?})", tag, category),
			NodeKind::Component(def) => write!(f, "Component({})", def.name()),
			NodeKind::Render(def) => write!(f, "Render({})", def.name()),
			NodeKind::Wrapped => f.write_str("Wrapped"),
		}
	}
}

impl<H: Host> From<&str> for NodeKind<H> {
	fn from(tag: &str) -> Self {
		Self::element(tag)
	}
}
impl<H: Host> From<Rc<ComponentDef<H>>> for NodeKind<H> {
	fn from(def: Rc<ComponentDef<H>>) -> Self {
		Self::Component(def)
	}
}
impl<H: Host> From<Rc<RenderFn<H>>> for NodeKind<H> {
	fn from(def: Rc<RenderFn<H>>) -> Self {
		Self::Render(def)
	}
}

struct VNodeData<H: Host> {
	kind: NodeKind<H>,
	props: Props<H>,
	children: RefCell<Vec<VNode<H>>>,
	node: OnceCell<H::Node>,
	instance: OnceCell<ComponentHandle<H>>,
	rendered: OnceCell<VNode<H>>,
}

/// A description of a renderable unit, before and after it owns a live host node.
///
/// Cloning a [`VNode`] clones the handle: Both handles refer to the same description and share its host node.
/// The host node is bound at most once per description. To place the same description twice, use [`VNode::shallow_copy`].
pub struct VNode<H: Host>(Rc<VNodeData<H>>);

impl<H: Host> VNode<H> {
	fn from_parts(kind: NodeKind<H>, props: Props<H>, children: Vec<VNode<H>>) -> Self {
		Self(Rc::new(VNodeData {
			kind,
			props,
			children: RefCell::new(children),
			node: OnceCell::new(),
			instance: OnceCell::new(),
			rendered: OnceCell::new(),
		}))
	}

	pub fn text(text: impl Into<Rc<str>>) -> Self {
		Self::from_parts(NodeKind::Text(text.into()), Props::new(), Vec::new())
	}

	/// Wraps an externally owned host node.
	///
	/// Wrapped nodes are matched by node identity, moved but never recreated, and skipped by lifecycle hooks.
	pub fn wrap(node: H::Node) -> Self {
		let vnode = Self::from_parts(NodeKind::Wrapped, Props::new(), Vec::new());
		let _ = vnode.0.node.set(node);
		vnode
	}

	/// A copy with the same kind, props and children, but without host node.
	#[must_use]
	pub fn shallow_copy(&self) -> Self {
		if self.is_wrapped() {
			return self.clone();
		}
		Self::from_parts(self.0.kind.clone(), self.0.props.clone(), self.0.children.borrow().clone())
	}

	#[must_use]
	pub fn kind(&self) -> &NodeKind<H> {
		&self.0.kind
	}

	#[must_use]
	pub fn props(&self) -> &Props<H> {
		&self.0.props
	}

	#[must_use]
	pub fn key(&self) -> Option<&Key> {
		self.0.props.key.as_ref()
	}

	#[must_use]
	pub fn node_ref(&self) -> Option<&NodeRef<H>> {
		self.0.props.node_ref.as_ref()
	}

	/// # Panics
	///
	/// Iff the children are currently being diffed.
	#[must_use]
	pub fn children(&self) -> Ref<'_, Vec<VNode<H>>> {
		self.0.children.borrow()
	}

	pub(crate) fn children_mut(&self) -> RefMut<'_, Vec<VNode<H>>> {
		self.0.children.borrow_mut()
	}

	pub(crate) fn replace_children(&self, children: Vec<VNode<H>>) {
		*self.0.children.borrow_mut() = children;
	}

	/// The host node this description owns, once mounted.
	#[must_use]
	pub fn host_node(&self) -> Option<&H::Node> {
		self.0.node.get()
	}

	pub(crate) fn expect_node(&self) -> Result<&H::Node, Error> {
		self.host_node().ok_or(Error::NotMounted)
	}

	pub(crate) fn bind(&self, node: H::Node) -> Result<(), Error> {
		self.0.node.set(node).map_err(|_| Error::AlreadyMounted)
	}

	#[must_use]
	pub fn is_mounted(&self) -> bool {
		self.0.node.get().is_some()
	}

	/// The text of a text node.
	#[must_use]
	pub fn as_text(&self) -> Option<&str> {
		match &self.0.kind {
			NodeKind::Text(text) => Some(text),
			_ => None,
		}
	}

	#[must_use]
	pub fn tag(&self) -> Option<&str> {
		match &self.0.kind {
			NodeKind::Element { tag, .. } => Some(tag),
			_ => None,
		}
	}

	#[must_use]
	pub fn is_component(&self) -> bool {
		matches!(self.0.kind, NodeKind::Component(_))
	}

	#[must_use]
	pub fn is_custom_element(&self) -> bool {
		matches!(self.0.kind, NodeKind::Element { category: ElementCategory::Custom, .. })
	}

	#[must_use]
	pub fn is_svg(&self) -> bool {
		matches!(self.0.kind, NodeKind::Element { category: ElementCategory::Svg, .. })
	}

	#[must_use]
	pub fn is_wrapped(&self) -> bool {
		matches!(self.0.kind, NodeKind::Wrapped)
	}

	/// The live component instance of a mounted component node.
	#[must_use]
	pub fn instance(&self) -> Option<&ComponentHandle<H>> {
		self.0.instance.get()
	}

	pub(crate) fn set_instance(&self, instance: ComponentHandle<H>) -> Result<(), Error> {
		self.0.instance.set(instance).map_err(|_| Error::AlreadyMounted)
	}

	/// What a render function node rendered to, once mounted.
	#[must_use]
	pub fn rendered(&self) -> Option<&VNode<H>> {
		self.0.rendered.get()
	}

	pub(crate) fn set_rendered(&self, rendered: VNode<H>) -> Result<(), Error> {
		self.0.rendered.set(rendered).map_err(|_| Error::AlreadyMounted)
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	/// This node, or a shallow copy of it if it's already bound elsewhere.
	pub(crate) fn fresh(&self) -> Self {
		if self.is_mounted() && !self.is_wrapped() {
			self.shallow_copy()
		} else {
			self.clone()
		}
	}

	/// Rebuilds an HTML or custom element subtree as SVG, stopping below `foreignObject`.
	fn into_svg(self) -> Self {
		match &self.0.kind {
			NodeKind::Element { tag, .. } if !self.is_mounted() => {
				let tag = Rc::clone(tag);
				let children = self.svg_children(&tag);
				Self::from_parts(NodeKind::Element { tag, category: ElementCategory::Svg }, self.0.props.clone(), children)
			}
			_ => self,
		}
	}

	fn svg_children(&self, tag: &str) -> Vec<VNode<H>> {
		let children = self.0.children.borrow();
		if tag == "foreignObject" {
			children.clone()
		} else {
			children.iter().cloned().map(VNode::into_svg).collect()
		}
	}
}

impl<H: Host> Clone for VNode<H> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<H: Host> Debug for VNode<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut debug = f.debug_struct("VNode");
		debug.field("kind", &self.0.kind);
		if let Some(key) = self.key() {
			debug.field("key", key);
		}
		debug.field("mounted", &self.is_mounted()).field("children", &self.0.children.try_borrow().map_or(0, |children| children.len())).finish()
	}
}

/// An unflattened child: Nested sequences are spliced in, [`Child::Empty`] (from `bool` or `None`) is discarded
/// and text becomes a text node.
pub enum Child<H: Host> {
	Node(VNode<H>),
	Text(Rc<str>),
	Many(Vec<Child<H>>),
	Empty,
}

impl<H: Host> From<VNode<H>> for Child<H> {
	fn from(node: VNode<H>) -> Self {
		Self::Node(node)
	}
}
impl<H: Host> From<&str> for Child<H> {
	fn from(text: &str) -> Self {
		Self::Text(text.into())
	}
}
impl<H: Host> From<String> for Child<H> {
	fn from(text: String) -> Self {
		Self::Text(text.into())
	}
}
impl<H: Host> From<i64> for Child<H> {
	fn from(number: i64) -> Self {
		Self::Text(number.to_string().into())
	}
}
impl<H: Host> From<f64> for Child<H> {
	fn from(number: f64) -> Self {
		Self::Text(number.to_string().into())
	}
}
impl<H: Host> From<bool> for Child<H> {
	fn from(_: bool) -> Self {
		Self::Empty
	}
}
impl<H: Host, T: Into<Child<H>>> From<Option<T>> for Child<H> {
	fn from(child: Option<T>) -> Self {
		child.map_or(Self::Empty, Into::into)
	}
}
impl<H: Host, T: Into<Child<H>>> From<Vec<T>> for Child<H> {
	fn from(children: Vec<T>) -> Self {
		Self::Many(children.into_iter().map(Into::into).collect())
	}
}

/// Flattens nested children in order.
pub fn flatten<H: Host>(children: impl IntoIterator<Item = Child<H>>) -> Vec<VNode<H>> {
	fn push<H: Host>(flat: &mut Vec<VNode<H>>, child: Child<H>) {
		match child {
			Child::Node(node) => flat.push(node),
			Child::Text(text) => flat.push(VNode::text(text)),
			Child::Many(children) => {
				for child in children {
					push(flat, child);
				}
			}
			Child::Empty => (),
		}
	}

	let mut flat = Vec::new();
	for child in children {
		push(&mut flat, child);
	}
	flat
}

/// Creates a [`VNode`]. See also the [`h!`](`crate::h!`) macro.
pub fn h<H: Host>(kind: impl Into<NodeKind<H>>, props: impl Into<Option<Props<H>>>, children: impl IntoIterator<Item = Child<H>>) -> VNode<H> {
	let kind = kind.into();
	let props = props.into().unwrap_or_default();
	let children = flatten(children);
	let vnode = VNode::from_parts(kind, props, children);
	if vnode.is_svg() {
		vnode.into_svg()
	} else {
		vnode
	}
}

/// `h!(kind, props, child...)`, with each child converted through [`Child::from`].
#[macro_export]
macro_rules! h {
	($kind:expr) => {
		$crate::h($kind, ::core::option::Option::None, ::std::vec::Vec::<$crate::Child<_>>::new())
	};
	($kind:expr, $props:expr $(, $child:expr)* $(,)?) => {
		$crate::h($kind, $props, ::std::vec![$($crate::Child::from($child)),*])
	};
}
