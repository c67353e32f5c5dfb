//! Tree nodes and in-node search.
//!
//! Unlike a B+ tree, every node stores entries: internal nodes hold the
//! separator entries themselves rather than copies of leaf keys. A node with
//! `s` entries is either a leaf (no children) or internal (exactly `s + 1`
//! children):
//!
//! ```text
//!            keys:     [ k0 ,  k1 ,  k2 ]
//!            values:   [ v0 ,  v1 ,  v2 ]
//!            children: c0   c1    c2    c3
//!
//!   every key in c0 < k0 < every key in c1 < k1 < ... < k2 < every key in c3
//! ```

use smallvec::SmallVec;
use std::fmt;

use crate::arena::NodeId;
use crate::compare::Comparator;

/// Entries kept inline before a node spills to the heap.
///
/// Sized for small orders. Larger orders still work, the arrays just live on
/// the heap.
pub(crate) const INLINE_ENTRIES: usize = 8;

pub(crate) struct Node<K, V> {
	/// Sorted keys, `keys.len() == values.len()`.
	pub(crate) keys: SmallVec<[K; INLINE_ENTRIES]>,
	pub(crate) values: SmallVec<[V; INLINE_ENTRIES]>,
	/// Empty for leaves, `keys.len() + 1` handles otherwise.
	pub(crate) children: SmallVec<[NodeId; INLINE_ENTRIES + 1]>,
	/// Back-reference used to walk upward during fixups. `None` for the root.
	pub(crate) parent: Option<NodeId>,
}

impl<K: fmt::Debug, V> fmt::Debug for Node<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Node")
			.field("keys", &self.keys)
			.field("children", &self.children)
			.field("parent", &self.parent)
			.finish()
	}
}

impl<K, V> Node<K, V> {
	/// Creates an empty leaf.
	pub(crate) fn leaf(parent: Option<NodeId>) -> Self {
		Node {
			keys: SmallVec::new(),
			values: SmallVec::new(),
			children: SmallVec::new(),
			parent,
		}
	}

	/// Creates a root holding one entry and two children.
	pub(crate) fn root(key: K, value: V, left: NodeId, right: NodeId) -> Self {
		let mut node = Node::leaf(None);
		node.keys.push(key);
		node.values.push(value);
		node.children.push(left);
		node.children.push(right);
		node
	}

	#[inline]
	pub(crate) fn is_leaf(&self) -> bool {
		self.children.is_empty()
	}

	/// Number of entries.
	#[inline]
	pub(crate) fn len(&self) -> usize {
		self.keys.len()
	}

	#[inline]
	pub(crate) fn entry(&self, pos: usize) -> (&K, &V) {
		(&self.keys[pos], &self.values[pos])
	}

	/// Binary search for `key` among this node's entries.
	///
	/// # Returns
	///
	/// `(position, found)` where:
	/// - `found == true`: `keys[position]` compares equal to `key`
	/// - `found == false`: `position` is where `key` would be inserted, which
	///   for an internal node is also the index of the child to descend into
	pub(crate) fn search<C>(&self, key: &K, cmp: &C) -> (usize, bool)
	where
		C: Comparator<K> + ?Sized,
	{
		let mut lower = 0;
		let mut upper = self.keys.len();

		while lower < upper {
			let mid = lower + (upper - lower) / 2;
			match cmp.compare(key, &self.keys[mid]) {
				std::cmp::Ordering::Less => upper = mid,
				std::cmp::Ordering::Greater => lower = mid + 1,
				std::cmp::Ordering::Equal => return (mid, true),
			}
		}

		(lower, false)
	}

	/// Inserts an entry at `pos`, shifting later entries right.
	pub(crate) fn insert_at(&mut self, pos: usize, key: K, value: V) {
		self.keys.insert(pos, key);
		self.values.insert(pos, value);
	}

	/// Removes and returns the entry at `pos`.
	pub(crate) fn remove_at(&mut self, pos: usize) -> (K, V) {
		(self.keys.remove(pos), self.values.remove(pos))
	}

	/// Swaps the entry at `pos` for `(key, value)`, returning the old one.
	pub(crate) fn replace_at(&mut self, pos: usize, key: K, value: V) -> (K, V) {
		(std::mem::replace(&mut self.keys[pos], key), std::mem::replace(&mut self.values[pos], value))
	}

	/// Splits this node around the entry at `mid`.
	///
	/// ```text
	/// Before: keys [k0 .. k(mid-1), k(mid), k(mid+1) .. kn]
	///
	/// After:  self  [k0 .. k(mid-1)]          children [c0 .. c(mid)]
	///         k(mid) is returned for promotion
	///         right [k(mid+1) .. kn]          children [c(mid+1) .. c(n+1)]
	/// ```
	///
	/// The new right node inherits this node's parent. The parent handles of
	/// the children that moved still point here and must be fixed by the
	/// caller.
	pub(crate) fn split_off(&mut self, mid: usize) -> (K, V, Node<K, V>) {
		assert!(mid < self.len(), "split position must be within node bounds");

		let mut right = Node::leaf(self.parent);
		right.keys.extend(self.keys.drain(mid + 1..));
		right.values.extend(self.values.drain(mid + 1..));
		if !self.is_leaf() {
			right.children.extend(self.children.drain(mid + 1..));
		}

		let (key, value) = self.remove_at(mid);
		(key, value, right)
	}

	/// Appends the separator and then every entry and child of `right`.
	///
	/// `self` must be the left neighbour of `right` and `key` the parent entry
	/// that separated them. The absorbed children still name `right` as their
	/// parent and must be fixed by the caller.
	pub(crate) fn merge(&mut self, key: K, value: V, right: Node<K, V>) {
		debug_assert_eq!(self.is_leaf(), right.is_leaf(), "merging nodes from different levels");

		self.keys.push(key);
		self.values.push(value);
		self.keys.extend(right.keys);
		self.values.extend(right.values);
		self.children.extend(right.children);
	}
}
