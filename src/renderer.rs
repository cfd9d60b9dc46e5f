use crate::{
	component::partition,
	host::{Host, SVG_NAMESPACE},
	list_diff::DEFAULT_OND_BUDGET,
	patch_dom::{patch_dom, release_listeners},
	props::ElementCategory,
	vnode::{NodeKind, VNode},
	Error,
};
use core::cell::RefCell;
use std::rc::Rc;
use tracing::{instrument, trace, trace_span};

/// Tunables of the children diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
	/// Edit distance after which the O(ND) diff gives up in favour of key-map matching.
	pub ond_budget: usize,
}

impl Default for DiffOptions {
	fn default() -> Self {
		Self { ond_budget: DEFAULT_OND_BUDGET }
	}
}

/// Mounts, patches and unmounts [`VNode`] trees on a [`Host`].
///
/// # Correct Use
///
/// Renders must be serialized: Don't patch a subtree from within a patch of the same subtree
/// (for example from a listener that is invoked synchronously by the host during a mutation).
#[derive(Debug)]
pub struct Renderer<H: Host> {
	host: H,
	options: DiffOptions,
}

impl<H: Host> Renderer<H> {
	pub fn new(host: H) -> Self {
		Self::with_options(host, DiffOptions::default())
	}

	pub fn with_options(host: H, options: DiffOptions) -> Self {
		Self { host, options }
	}

	pub fn host(&self) -> &H {
		&self.host
	}

	pub fn options(&self) -> DiffOptions {
		self.options
	}

	/// Creates the host node tree for `vnode` and runs its mount hooks.
	///
	/// # Errors
	///
	/// [`Error::AlreadyMounted`] if `vnode` already owns a host node, or whatever the host or a component fails with.
	#[instrument(skip(self))]
	pub fn mount(&self, vnode: &VNode<H>) -> Result<H::Node, Error> {
		let node = self.mount_node(vnode)?;
		self.after_mount_hooks(vnode);
		Ok(node)
	}

	/// Mounts `vnode` (or a copy of it, if it's already mounted elsewhere) as last child of `container`.
	///
	/// Returns the mounted description, which is what the next render should be patched against.
	#[instrument(skip(self))]
	pub fn render(&self, vnode: &VNode<H>, container: &H::Node) -> Result<VNode<H>, Error> {
		let vnode = vnode.fresh();
		let node = self.mount_node(&vnode)?;
		self.host.insert_before(container, &node, None)?;
		self.after_mount_hooks(&vnode);
		Ok(vnode)
	}

	/// Mounts without running hooks. Callers run [`Renderer::after_mount_hooks`] once the node is attached.
	pub(crate) fn mount_node(&self, vnode: &VNode<H>) -> Result<H::Node, Error> {
		if let NodeKind::Wrapped = vnode.kind() {
			return vnode.expect_node().cloned();
		}
		if vnode.is_mounted() {
			return Err(Error::AlreadyMounted);
		}

		let node = match vnode.kind() {
			NodeKind::Text(text) => {
				let span = trace_span!("Creating text node", ?vnode);
				let _enter = span.enter();
				self.host.create_text(text)?
			}

			NodeKind::Element { tag, category } => {
				let span = trace_span!("Creating element", tag = &**tag, ?category);
				let _enter = span.enter();
				if tag.is_empty() || tag.contains(char::is_whitespace) {
					return Err(Error::UnknownNodeType(tag.to_string()));
				}

				let namespace = (*category == ElementCategory::Svg).then(|| SVG_NAMESPACE);
				let element = self.host.create_element(tag, namespace)?;
				patch_dom(&self.host, &element, *category, vnode.props(), None, false)?;

				if *category == ElementCategory::Template {
					self.append_children_for_template(&element, vnode)?;
				} else {
					self.append_children(&element, &mut vnode.children_mut())?;
				}
				element
			}

			NodeKind::Component(def) => {
				let span = trace_span!("Creating component", name = def.name());
				let _enter = span.enter();
				let (controlled, uncontrolled) = partition(def.metadata(), vnode.props(), true);
				let mut component = def.instantiate();
				let root = component.mount(self, &controlled, &vnode.children(), &uncontrolled)?;
				patch_dom(&self.host, &root, ElementCategory::Custom, &uncontrolled, None, true)?;
				vnode.set_instance(Rc::new(RefCell::new(component)))?;
				root
			}

			NodeKind::Render(def) => {
				let span = trace_span!("Rendering", name = def.name());
				let _enter = span.enter();
				let rendered = def.render(vnode.props(), &vnode.children()).fresh();
				let node = self.mount_node(&rendered)?;
				vnode.set_rendered(rendered)?;
				node
			}

			NodeKind::Wrapped => unreachable!(),
		};

		vnode.bind(node.clone())?;
		Ok(node)
	}

	fn append_children(&self, parent: &H::Node, children: &mut [VNode<H>]) -> Result<(), Error> {
		for child in children {
			*child = child.fresh();
			let node = self.mount_node(child)?;
			self.host.insert_before(parent, &node, None)?;
		}
		Ok(())
	}

	/// `<template>` children go into the content fragment, not the element.
	fn append_children_for_template(&self, template: &H::Node, vnode: &VNode<H>) -> Result<(), Error> {
		let content = self.host.template_content(template).ok_or_else(|| Error::Host("<template> without content fragment".to_owned()))?;
		self.append_children(&content, &mut vnode.children_mut())
	}

	/// Fires ref callbacks and component mount notifications, children first. Wrapped nodes are skipped.
	pub fn after_mount_hooks(&self, vnode: &VNode<H>) {
		match vnode.kind() {
			NodeKind::Wrapped | NodeKind::Text(_) => (),
			NodeKind::Element { .. } => {
				for child in vnode.children().iter() {
					self.after_mount_hooks(child);
				}
				if let (Some(node_ref), Some(node)) = (vnode.node_ref(), vnode.host_node()) {
					node_ref.call(Some(node));
				}
			}
			NodeKind::Component(_) => {
				if let Some(instance) = vnode.instance() {
					instance.borrow_mut().notify_mounted();
				}
				if let (Some(node_ref), Some(node)) = (vnode.node_ref(), vnode.host_node()) {
					node_ref.call(Some(node));
				}
			}
			NodeKind::Render(_) => {
				if let Some(rendered) = vnode.rendered() {
					self.after_mount_hooks(rendered);
				}
			}
		}
	}

	/// Runs unmount notifications, clears refs and releases listeners of `vnode` and its content,
	/// without touching the host tree.
	///
	/// # Errors
	///
	/// Whatever the host fails with while releasing listeners.
	pub fn unmount(&self, vnode: &VNode<H>) -> Result<(), Error> {
		match vnode.kind() {
			NodeKind::Wrapped | NodeKind::Text(_) => (),
			NodeKind::Element { category, .. } => {
				if let Some(node_ref) = vnode.node_ref() {
					node_ref.call(None);
				}
				if let Some(node) = vnode.host_node() {
					release_listeners(&self.host, node, *category, vnode.props())?;
				}
				for child in vnode.children().iter() {
					self.unmount(child)?;
				}
			}
			NodeKind::Component(def) => {
				trace!("Unmounting component {}", def.name());
				if let Some(node_ref) = vnode.node_ref() {
					node_ref.call(None);
				}
				if let Some(instance) = vnode.instance() {
					instance.borrow_mut().notify_unmounted();
				}
				if let Some(node) = vnode.host_node() {
					let (_, uncontrolled) = partition(def.metadata(), vnode.props(), false);
					release_listeners(&self.host, node, ElementCategory::Custom, &uncontrolled)?;
				}
				// Content is only ours to unmount where the component actually mounted it.
				for child in vnode.children().iter().filter(|child| child.is_mounted()) {
					self.unmount(child)?;
				}
			}
			NodeKind::Render(_) => {
				if let Some(rendered) = vnode.rendered() {
					self.unmount(rendered)?;
				}
			}
		}
		Ok(())
	}

	/// Detaches the host node of `vnode` from `parent` and unmounts it.
	pub fn remove(&self, vnode: &VNode<H>, parent: &H::Node) -> Result<(), Error> {
		self.host.remove_child(parent, vnode.expect_node()?)?;
		self.unmount(vnode)
	}
}
