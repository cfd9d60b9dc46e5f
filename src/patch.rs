use crate::{
	component::partition,
	host::Host,
	patch_dom::patch_dom,
	props::{ElementCategory, Value},
	vnode::{NodeKind, VNode},
	Error, Renderer,
};
use core::ptr;
use tracing::{instrument, trace, trace_span, warn};

impl<H: Host> Renderer<H> {
	/// Converges the host node of `old` (a child of `parent`) to the description `new`.
	///
	/// Returns the description that now owns the host node. That's `new` unless `new` was already bound elsewhere,
	/// in which case nothing happens and `new` is returned as-is.
	#[instrument(skip(self))]
	pub fn patch(&self, new: &VNode<H>, old: &VNode<H>, parent: &H::Node) -> Result<VNode<H>, Error> {
		if new.ptr_eq(old) || new.is_mounted() {
			trace!("Nothing to do.");
			return Ok(new.clone());
		}

		match (new.kind(), old.kind()) {
			(NodeKind::Text(t_2), NodeKind::Text(t_1)) => {
				let span = trace_span!("Diffing text node", ?old, ?new);
				let _enter = span.enter();
				let node = old.expect_node()?;
				if t_1 != t_2 {
					self.host().set_text(node, t_2)?;
				}
				new.bind(node.clone())?;
				Ok(new.clone())
			}

			(NodeKind::Element { tag: n_2, category: c_2 }, NodeKind::Element { tag: n_1, category: c_1 }) if n_1 == n_2 && c_1 == c_2 => {
				let span = trace_span!("Diffing element", tag = &**n_1, category = ?c_1);
				let _enter = span.enter();
				match *c_1 {
					ElementCategory::Template => self.patch_template(new, old),
					ElementCategory::Custom if slot_composition_changed(new, old) => {
						trace!("Slotted content changed. Replacing custom element.");
						self.replace(new, old, parent)
					}
					category => self.patch_element(new, old, category),
				}
			}

			(NodeKind::Component(d_2), NodeKind::Component(d_1)) if ptr::eq(&**d_1, &**d_2) => {
				let span = trace_span!("Diffing component", name = d_1.name());
				let _enter = span.enter();
				let instance = old.instance().ok_or(Error::NotMounted)?.clone();
				let node = old.expect_node()?.clone();
				new.set_instance(instance.clone())?;
				new.bind(node.clone())?;

				let (controlled, uncontrolled) = partition(d_2.metadata(), new.props(), true);
				let (_, old_uncontrolled) = partition(d_1.metadata(), old.props(), false);
				instance.borrow_mut().patch(self, &controlled, &new.children(), &uncontrolled, &old_uncontrolled)?;
				patch_dom(self.host(), &node, ElementCategory::Custom, &uncontrolled, Some(&old_uncontrolled), true)?;
				swap_refs(old, new, &node);
				Ok(new.clone())
			}

			(NodeKind::Render(d_2), NodeKind::Render(d_1)) if ptr::eq(&**d_1, &**d_2) => {
				let span = trace_span!("Diffing render function", name = d_1.name());
				let _enter = span.enter();
				let old_rendered = old.rendered().ok_or(Error::NotMounted)?;

				let rendered = if d_2.should_update(new.props(), old.props(), &new.children(), &old.children()) {
					let rendered = d_2.render(new.props(), &new.children());
					let rendered = if rendered.is_mounted() && !rendered.ptr_eq(old_rendered) { rendered.shallow_copy() } else { rendered };
					self.patch(&rendered, old_rendered, parent)?
				} else {
					trace!("Skipping re-render.");
					old_rendered.clone()
				};

				new.bind(rendered.expect_node()?.clone())?;
				new.set_rendered(rendered)?;
				Ok(new.clone())
			}

			_ => {
				let span = trace_span!("Replace mismatching", ?old, ?new);
				let _enter = span.enter();
				self.replace(new, old, parent)
			}
		}
	}

	fn patch_element(&self, new: &VNode<H>, old: &VNode<H>, category: ElementCategory) -> Result<VNode<H>, Error> {
		let node = old.expect_node()?.clone();
		new.bind(node.clone())?;
		patch_dom(self.host(), &node, category, new.props(), Some(old.props()), false)?;
		self.diff_children(&node, &mut new.children_mut(), &old.children())?;
		swap_refs(old, new, &node);
		Ok(new.clone())
	}

	/// Only `render` is swapped. The content fragment belongs to the template contract and is never diffed.
	fn patch_template(&self, new: &VNode<H>, old: &VNode<H>) -> Result<VNode<H>, Error> {
		let node = old.expect_node()?.clone();
		new.bind(node.clone())?;
		let render = new.props().get("render");
		if render != old.props().get("render") {
			self.host().set_property(&node, "render", render.unwrap_or(&Value::Null))?;
		}
		new.replace_children(old.children().clone());
		Ok(new.clone())
	}

	/// Mounts `new` in place of `old` and unmounts `old`. This is the only path that loses host node identity.
	fn replace(&self, new: &VNode<H>, old: &VNode<H>, parent: &H::Node) -> Result<VNode<H>, Error> {
		let old_node = old.expect_node()?.clone();
		if old.is_wrapped() {
			warn!("Replacing a wrapped node. It is detached, not destroyed.");
		}
		let node = self.mount_node(new)?;
		self.host().insert_before(parent, &node, Some(&old_node))?;
		self.host().remove_child(parent, &old_node)?;
		self.unmount(old)?;
		self.after_mount_hooks(new);
		Ok(new.clone())
	}
}

/// Clears `old`'s ref and binds `new`'s, unless it's the same ref.
fn swap_refs<H: Host>(old: &VNode<H>, new: &VNode<H>, node: &H::Node) {
	match (old.node_ref(), new.node_ref()) {
		(Some(r_1), Some(r_2)) if r_1.same(r_2) => (),
		(r_1, r_2) => {
			if let Some(r_1) = r_1 {
				r_1.call(None);
			}
			if let Some(r_2) = r_2 {
				r_2.call(Some(node));
			}
		}
	}
}

/// Whether a custom element's slotted content changed in a way that requires redistribution.
fn slot_composition_changed<H: Host>(new: &VNode<H>, old: &VNode<H>) -> bool {
	let new_children = new.children();
	let old_children = old.children();
	new_children.len() != old_children.len()
		|| new_children
			.iter()
			.zip(old_children.iter())
			.any(|(n, o)| !n.kind().same_type(o.kind()) || n.props().get("slot") != o.props().get("slot"))
}
