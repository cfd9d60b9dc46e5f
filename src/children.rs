use crate::{
	host::Host,
	list_diff::{diff_ond, diff_with_map, find_contiguous, EditOp, Identity},
	props::Key,
	vnode::VNode,
	Error, Renderer,
};
use hashbrown::HashMap;
use tracing::{debug, instrument, trace};

/// Where an old child is during [`Renderer::apply_diff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
	Present,
	/// Deleted by the script but taken over by an insertion later on. Still in the host tree until then.
	PendingMove,
	Moved,
	Removed,
}

impl<H: Host> Renderer<H> {
	/// Converges the children of `parent` from `old` to `new`.
	///
	/// Entries of `new` that are already bound elsewhere are swapped for shallow copies,
	/// so afterwards each entry of `new` owns exactly the host node at its position.
	///
	/// # Errors
	///
	/// Whatever the host or a component fails with. The host tree is left partially patched in that case.
	#[instrument(skip(self, new, old), fields(old = old.len(), new = new.len()))]
	pub fn diff_children(&self, parent: &H::Node, new: &mut [VNode<H>], old: &[VNode<H>]) -> Result<(), Error> {
		let (mut os, mut ns) = (0, 0);
		let (mut oe, mut ne) = (old.len(), new.len());

		while os < oe && ns < ne && self.can_patch(&new[ns], &old[os]) {
			new[ns] = self.patch(&new[ns], &old[os], parent)?;
			os += 1;
			ns += 1;
		}
		while os < oe && ns < ne && self.can_patch(&new[ne - 1], &old[oe - 1]) {
			new[ne - 1] = self.patch(&new[ne - 1], &old[oe - 1], parent)?;
			oe -= 1;
			ne -= 1;
		}
		trace!("Common prefix {}, common suffix {}.", os, old.len() - oe);

		let after = new.get(ne).and_then(VNode::host_node).cloned();
		if os == oe {
			return self.insert_range(parent, &mut new[ns..ne], after.as_ref());
		}
		if ns == ne {
			return self.remove_range(parent, &old[os..oe]);
		}

		let (old_len, new_len) = (oe - os, ne - ns);
		if new_len > old_len {
			if let Some(offset) = find_contiguous(new_len, old_len, |h, n| self.can_patch(&new[ns + h], &old[os + n])) {
				trace!("Pure insertion around offset {}.", offset);
				let reference = old[os].expect_node()?.clone();
				self.insert_range(parent, &mut new[ns..ns + offset], Some(&reference))?;
				for t in 0..old_len {
					new[ns + offset + t] = self.patch(&new[ns + offset + t], &old[os + t], parent)?;
				}
				return self.insert_range(parent, &mut new[ns + offset + old_len..ne], after.as_ref());
			}
		} else if old_len > new_len {
			if let Some(offset) = find_contiguous(old_len, new_len, |h, n| self.can_patch(&new[ns + n], &old[os + h])) {
				trace!("Pure deletion around offset {}.", offset);
				self.remove_range(parent, &old[os..os + offset])?;
				self.remove_range(parent, &old[os + offset + new_len..oe])?;
				for t in 0..new_len {
					new[ns + t] = self.patch(&new[ns + t], &old[os + offset + t], parent)?;
				}
				return Ok(());
			}
		}

		// Past the checks above, a side with a single child has no match on the other side.
		if old_len == 1 || new_len == 1 {
			trace!("Nothing to reuse. Replacing the range.");
			let reference = old[os].expect_node()?.clone();
			self.insert_range(parent, &mut new[ns..ne], Some(&reference))?;
			return self.remove_range(parent, &old[os..oe]);
		}

		let (new, old) = (&mut new[ns..ne], &old[os..oe]);
		let script = diff_ond(old_len, new_len, self.options().ond_budget, |i, j| self.can_patch(&new[j], &old[i])).unwrap_or_else(|| {
			debug!("Children differ by more than {} edits. Matching by identity.", self.options().ond_budget);
			let old_identities: Vec<_> = old.iter().map(|child| self.identity(child)).collect();
			let new_identities: Vec<_> = new.iter().map(|child| self.identity(child)).collect();
			diff_with_map(&old_identities, &new_identities, |i, j| self.can_patch(&new[j], &old[i]))
		});
		self.apply_diff(parent, new, old, &script, after.as_ref())
	}

	/// Applies an edit script over `new` and `old`, turning deletion/insertion pairs of the same child into moves.
	///
	/// `after` is the host node following the diffed range, if any.
	fn apply_diff(&self, parent: &H::Node, new: &mut [VNode<H>], old: &[VNode<H>], script: &[EditOp], after: Option<&H::Node>) -> Result<(), Error> {
		let mut slots = vec![Slot::Present; old.len()];
		let mut deleted = vec![false; old.len()];
		let mut keyed = HashMap::<Key, usize>::new();
		let mut wrapped = HashMap::new();
		for op in script {
			if let EditOp::Deletion { old: i } = *op {
				deleted[i] = true;
				match self.identity(&old[i]) {
					Identity::Keyed(key) => {
						keyed.insert(key.clone(), i);
					}
					Identity::Wrapped(node_id) => {
						wrapped.insert(node_id, i);
					}
					Identity::Unkeyed => (),
				}
			}
		}

		let mut moves = vec![None; new.len()];
		for op in script {
			if let EditOp::Insertion { new: j } = *op {
				let candidate = match self.identity(&new[j]) {
					Identity::Keyed(key) => keyed.remove(key),
					Identity::Wrapped(node_id) => wrapped.remove(&node_id),
					Identity::Unkeyed => None,
				};
				if let Some(i) = candidate.filter(|&i| self.can_patch(&new[j], &old[i])) {
					slots[i] = Slot::PendingMove;
					moves[j] = Some(i);
				}
			}
		}

		for i in (0..old.len()).rev() {
			if deleted[i] && slots[i] == Slot::Present {
				self.remove(&old[i], parent)?;
				slots[i] = Slot::Removed;
			}
		}

		// Everything before `cursor` in `old` was either patched in place or is about to be moved away.
		let mut cursor = 0;
		for op in script {
			match *op {
				EditOp::Patch { old: i, new: j } => {
					new[j] = self.patch(&new[j], &old[i], parent)?;
					cursor = i + 1;
				}
				EditOp::Deletion { old: i } => cursor = i + 1,
				EditOp::Insertion { new: j } => {
					let reference = old[cursor..]
						.iter()
						.zip(&slots[cursor..])
						.find(|(_, slot)| matches!(slot, Slot::Present | Slot::PendingMove))
						.and_then(|(child, _)| child.host_node())
						.or(after)
						.cloned();

					if let Some(i) = moves[j] {
						trace!("Moving old child {} to {}.", i, j);
						let node = old[i].expect_node()?.clone();
						self.host().insert_before(parent, &node, reference.as_ref())?;
						slots[i] = Slot::Moved;
						new[j] = self.patch(&new[j], &old[i], parent)?;
					} else {
						new[j] = new[j].fresh();
						let node = self.mount_node(&new[j])?;
						self.host().insert_before(parent, &node, reference.as_ref())?;
						self.after_mount_hooks(&new[j]);
					}
				}
			}
		}
		Ok(())
	}

	fn insert_range(&self, parent: &H::Node, new: &mut [VNode<H>], reference: Option<&H::Node>) -> Result<(), Error> {
		for child in new {
			*child = child.fresh();
			let node = self.mount_node(child)?;
			self.host().insert_before(parent, &node, reference)?;
			self.after_mount_hooks(child);
		}
		Ok(())
	}

	/// Removes `old`, clearing `parent` in one go if that's all of its children.
	fn remove_range(&self, parent: &H::Node, old: &[VNode<H>]) -> Result<(), Error> {
		if old.is_empty() {
			return Ok(());
		}
		if self.host().child_count(parent) == old.len() {
			trace!("Clearing all {} children at once.", old.len());
			self.host().clear_children(parent)?;
			for child in old {
				self.unmount(child)?;
			}
		} else {
			for child in old {
				self.remove(child, parent)?;
			}
		}
		Ok(())
	}

	/// Whether `old`'s host node may be reused for `new`. Node types may still differ, in which case the patch replaces.
	fn can_patch(&self, new: &VNode<H>, old: &VNode<H>) -> bool {
		if new.key() != old.key() || new.is_wrapped() != old.is_wrapped() {
			return false;
		}
		if new.is_wrapped() {
			return match (new.host_node(), old.host_node()) {
				(Some(a), Some(b)) => self.host().same_node(a, b),
				_ => false,
			};
		}
		!new.is_mounted() || new.ptr_eq(old)
	}

	fn identity<'a>(&self, child: &'a VNode<H>) -> Identity<'a> {
		if let Some(key) = child.key() {
			Identity::Keyed(key)
		} else if let (true, Some(node)) = (child.is_wrapped(), child.host_node()) {
			Identity::Wrapped(self.host().node_id(node))
		} else {
			Identity::Unkeyed
		}
	}
}
