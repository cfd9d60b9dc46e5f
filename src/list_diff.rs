//! Edit scripts between two child lists.
//!
//! Both algorithms only see indices and a `can_patch(old, new)` predicate, so they can be tested without a host.
//! Indices in the resulting [`EditOp`]s are relative to the slices that were diffed.
//!
//! An edit script is read with two cursors: [`EditOp::Patch`] advances both, [`EditOp::Insertion`] only the new one
//! and [`EditOp::Deletion`] only the old one.

use crate::{host::NodeId, props::Key};
use hashbrown::HashMap;
use std::collections::VecDeque;

/// Default diagonal distance after which [`diff_ond`] gives up.
pub const DEFAULT_OND_BUDGET: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
	Patch { old: usize, new: usize },
	Insertion { new: usize },
	Deletion { old: usize },
}

/// How a child is recognised across renders, in order of priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity<'a> {
	Keyed(&'a Key),
	Wrapped(NodeId),
	/// Matched by position among the other unkeyed children.
	Unkeyed,
}

/// Myers' O(ND) difference algorithm, bounded to `budget` edits.
///
/// Returns [`None`] if the lists are further apart than `budget`, which keeps pathological inputs from taking quadratic time and memory.
#[must_use]
pub fn diff_ond(old_len: usize, new_len: usize, budget: usize, can_patch: impl Fn(usize, usize) -> bool) -> Option<Vec<EditOp>> {
	#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

	let n = old_len as isize;
	let m = new_len as isize;
	let limit = budget.min(old_len + new_len);
	let offset = limit as isize + 1;

	// `v[k + offset]` is the furthest `x` reached on diagonal `k`.
	let mut v = vec![0_isize; 2 * limit + 3];
	let mut trace = Vec::new();

	for d in 0..=limit as isize {
		trace.push(v.clone());
		let mut k = -d;
		while k <= d {
			let index = (k + offset) as usize;
			let mut x = if k == -d || (k != d && v[index - 1] < v[index + 1]) { v[index + 1] } else { v[index - 1] + 1 };
			let mut y = x - k;
			while x < n && y < m && can_patch(x as usize, y as usize) {
				x += 1;
				y += 1;
			}
			v[index] = x;

			if x >= n && y >= m {
				return Some(backtrack(&trace, n, m, offset));
			}
			k += 2;
		}
	}
	None
}

fn backtrack(trace: &[Vec<isize>], n: isize, m: isize, offset: isize) -> Vec<EditOp> {
	#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

	let mut script = Vec::new();
	let (mut x, mut y) = (n, m);
	for (d, v) in trace.iter().enumerate().rev() {
		let d = d as isize;
		let k = x - y;
		let index = (k + offset) as usize;
		let previous_k = if k == -d || (k != d && v[index - 1] < v[index + 1]) { k + 1 } else { k - 1 };
		let previous_x = v[(previous_k + offset) as usize];
		let previous_y = previous_x - previous_k;

		while x > previous_x && y > previous_y {
			script.push(EditOp::Patch { old: (x - 1) as usize, new: (y - 1) as usize });
			x -= 1;
			y -= 1;
		}

		if d > 0 {
			if x == previous_x {
				script.push(EditOp::Insertion { new: (y - 1) as usize });
			} else {
				script.push(EditOp::Deletion { old: (x - 1) as usize });
			}
		}

		x = previous_x;
		y = previous_y;
	}
	script.reverse();
	script
}

/// Greedy matching through a key/identity map, followed by a longest increasing subsequence over the matches.
///
/// Keyed children match by key, wrapped ones by node identity and unkeyed ones by their order among the other unkeyed children.
/// Matches outside the longest increasing subsequence show up as a [`EditOp::Deletion`] and an [`EditOp::Insertion`],
/// which the applier turns into a move.
#[must_use]
pub fn diff_with_map(old: &[Identity<'_>], new: &[Identity<'_>], can_patch: impl Fn(usize, usize) -> bool) -> Vec<EditOp> {
	let mut keyed = HashMap::new();
	let mut wrapped = HashMap::new();
	let mut unkeyed = VecDeque::new();
	for (j, identity) in new.iter().enumerate() {
		match *identity {
			Identity::Keyed(key) => {
				keyed.insert(key, j);
			}
			Identity::Wrapped(node_id) => {
				wrapped.insert(node_id, j);
			}
			Identity::Unkeyed => unkeyed.push_back(j),
		}
	}

	// (old, new) pairs in old order.
	let mut matches = Vec::new();
	let mut taken = vec![false; new.len()];
	for (i, identity) in old.iter().enumerate() {
		let candidate = match *identity {
			Identity::Keyed(key) => keyed.get(key).copied(),
			Identity::Wrapped(node_id) => wrapped.get(&node_id).copied(),
			Identity::Unkeyed => unkeyed.pop_front(),
		};
		if let Some(j) = candidate {
			if !taken[j] && can_patch(i, j) {
				taken[j] = true;
				matches.push((i, j));
			}
		}
	}

	let chain = longest_increasing_chain(&matches);

	let mut script = Vec::with_capacity(old.len().max(new.len()));
	let (mut i, mut j) = (0, 0);
	for &(old_index, new_index) in &chain {
		script.extend((i..old_index).map(|old| EditOp::Deletion { old }));
		script.extend((j..new_index).map(|new| EditOp::Insertion { new }));
		script.push(EditOp::Patch { old: old_index, new: new_index });
		i = old_index + 1;
		j = new_index + 1;
	}
	script.extend((i..old.len()).map(|old| EditOp::Deletion { old }));
	script.extend((j..new.len()).map(|new| EditOp::Insertion { new }));
	script
}

/// Patience sorting over the new indices of `matches`, which are ordered by old index.
fn longest_increasing_chain(matches: &[(usize, usize)]) -> Vec<(usize, usize)> {
	// `thresholds[l]` is the index into `matches` ending the best chain of length `l + 1`.
	let mut thresholds: Vec<usize> = Vec::new();
	let mut predecessors = vec![None; matches.len()];

	for (position, &(_, new_index)) in matches.iter().enumerate() {
		let length = thresholds.partition_point(|&threshold| matches[threshold].1 < new_index);
		if length > 0 {
			predecessors[position] = Some(thresholds[length - 1]);
		}
		if length == thresholds.len() {
			thresholds.push(position);
		} else {
			thresholds[length] = position;
		}
	}

	let mut chain = Vec::with_capacity(thresholds.len());
	let mut cursor = thresholds.last().copied();
	while let Some(position) = cursor {
		chain.push(matches[position]);
		cursor = predecessors[position];
	}
	chain.reverse();
	chain
}

/// Finds `needle_len` consecutive matches, returning the offset into the haystack.
///
/// `matches(haystack_index, needle_index)` compares single elements.
#[must_use]
pub fn find_contiguous(haystack_len: usize, needle_len: usize, matches: impl Fn(usize, usize) -> bool) -> Option<usize> {
	if needle_len > haystack_len {
		return None;
	}
	(0..=haystack_len - needle_len).find(|&offset| (0..needle_len).all(|t| matches(offset + t, t)))
}
