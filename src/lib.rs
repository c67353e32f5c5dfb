//! # Arbor: An Ordered B-Tree Key-Value Store
//!
//! This crate provides a generic, ordered map built on a classic B-tree: a
//! multiway search tree in which every node holds a variable number of sorted
//! entries and every leaf sits at the same depth. Lookups, insertions and
//! removals all take O(log n) node visits.
//!
//! ## Design Overview
//!
//! **Order**: A tree of order `m` allows at most `m` children per internal
//! node, so every node holds at most `m - 1` entries and every node other
//! than the root holds at least `ceil(m / 2) - 1`. The order is chosen at
//! construction time and must be at least [`MIN_ORDER`].
//!
//! **Comparators**: Keys are ordered by a [`Comparator`] fixed when the tree is
//! built. [`Natural`] (the default) uses `Ord`; any `Fn(&K, &K) -> Ordering`
//! closure works as well.
//!
//! **Arena Storage**: The tree owns its nodes through an arena and links them
//! with index handles. Each node also records its parent's handle, which is
//! how splits and merges walk back up the tree without recursion.
//!
//! ### Tree Structure
//!
//! ```text
//!                       ┌──────────────┐
//!                       │  [ 20 , 40 ] │   <- internal node: 2 entries, 3 children
//!                       └──┬────┬────┬─┘
//!              ┌───────────┘    │    └───────────┐
//!              ▼                ▼                ▼
//!       ┌────────────┐   ┌────────────┐   ┌────────────┐
//!       │ [ 5 , 10 ] │   │ [ 25, 30 ] │   │ [ 45, 50 ] │   <- leaves, all at equal depth
//!       └────────────┘   └────────────┘   └────────────┘
//! ```
//!
//! Growth only ever adds a level at the top (a root split) and shrinkage only
//! ever removes one at the top (a root collapse), so leaves can never end up
//! at different depths.
//!
//! ## Basic Usage
//!
//! ```
//! use arbor::Tree;
//!
//! let mut tree = Tree::new(4);
//!
//! tree.insert("b", 2);
//! tree.insert("a", 1);
//! tree.insert("c", 3);
//!
//! assert_eq!(tree.get(&"a"), Some(&1));
//! assert_eq!(tree.keys().copied().collect::<Vec<_>>(), ["a", "b", "c"]);
//!
//! assert_eq!(tree.remove(&"b"), Some(2));
//! assert_eq!(tree.len(), 2);
//! ```
//!
//! ## Thread Safety
//!
//! The tree is a single-threaded structure. Mutation takes `&mut self`, so the
//! borrow checker rules out mutation while an iterator is alive. Wrap the tree
//! in a lock if it has to be shared.

use std::fmt;

mod arena;
pub mod compare;
pub mod error;
pub mod iter;
mod json;
mod node;
#[cfg(test)]
mod util;

use arena::{Arena, NodeId};
use node::Node;

pub use compare::{Comparator, Natural, Reverse};
pub use error::{Error, Result};
pub use iter::{Iter, Keys, RawIter, Values};

// ---------------------------------------------------------------------------
// Configuration Constants
// ---------------------------------------------------------------------------

/// Smallest order accepted by [`Tree::try_new`].
///
/// With two children per node a split would leave one half empty.
pub const MIN_ORDER: usize = 3;

/// Order used by [`Tree::default`] and when decoding a tree from JSON.
pub const DEFAULT_ORDER: usize = 32;

// ---------------------------------------------------------------------------
// Core Tree Structure
// ---------------------------------------------------------------------------

/// An ordered map backed by a B-tree of configurable order.
///
/// # Type Parameters
///
/// - `K`: The key type. Keys are unique under the comparator.
/// - `V`: The value type.
/// - `C`: The [`Comparator`] ordering the keys. Defaults to [`Natural`].
pub struct Tree<K, V, C = Natural> {
	/// Owns every node. Handles are only valid for this arena.
	nodes: Arena<Node<K, V>>,

	/// The root node, or `None` when the tree is empty.
	root: Option<NodeId>,

	/// Maximum number of children per internal node.
	order: usize,

	/// Number of entries, kept in sync by insert and remove.
	len: usize,

	/// The current height of the tree.
	/// - Height 0: Empty tree
	/// - Height 1: A single leaf root
	/// - Height N: N-1 levels of internal nodes above the leaves
	height: usize,

	cmp: C,
}

impl<K: Ord, V> Default for Tree<K, V> {
	fn default() -> Self {
		Self::new(DEFAULT_ORDER)
	}
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl<K: Ord, V> Tree<K, V, Natural> {
	/// Creates an empty tree ordered by `K`'s [`Ord`] implementation.
	///
	/// No node is allocated until the first insertion.
	///
	/// # Panics
	///
	/// Panics if `order` is below [`MIN_ORDER`]. A tree with such an order can
	/// never hold a valid shape, so this fails immediately instead of on first
	/// use. Use [`Tree::try_new`] to get an error instead.
	///
	/// # Example
	///
	/// ```
	/// use arbor::Tree;
	///
	/// let tree: Tree<u32, String> = Tree::new(3);
	/// assert!(tree.is_empty());
	/// assert_eq!(tree.height(), 0);
	/// ```
	pub fn new(order: usize) -> Self {
		Self::with_comparator(order, Natural)
	}

	/// Creates an empty tree, or returns [`Error::InvalidOrder`] if `order` is
	/// below [`MIN_ORDER`].
	///
	/// ```
	/// use arbor::{Error, Tree};
	///
	/// assert!(matches!(Tree::<i32, i32>::try_new(2), Err(Error::InvalidOrder { order: 2 })));
	/// ```
	pub fn try_new(order: usize) -> Result<Self> {
		Self::try_with_comparator(order, Natural)
	}
}

impl<K, V, C: Comparator<K>> Tree<K, V, C> {
	/// Creates an empty tree ordered by `cmp`.
	///
	/// # Panics
	///
	/// Panics if `order` is below [`MIN_ORDER`].
	///
	/// # Example
	///
	/// ```
	/// use arbor::Tree;
	///
	/// let mut tree = Tree::with_comparator(3, |a: &i32, b: &i32| b.cmp(a));
	/// tree.extend([(1, ()), (3, ()), (2, ())]);
	/// assert_eq!(tree.keys().copied().collect::<Vec<_>>(), [3, 2, 1]);
	/// ```
	pub fn with_comparator(order: usize, cmp: C) -> Self {
		match Self::try_with_comparator(order, cmp) {
			Ok(tree) => tree,
			Err(err) => panic!("{err}"),
		}
	}

	/// Creates an empty tree ordered by `cmp`, or returns
	/// [`Error::InvalidOrder`] if `order` is below [`MIN_ORDER`].
	pub fn try_with_comparator(order: usize, cmp: C) -> Result<Self> {
		if order < MIN_ORDER {
			return Err(Error::InvalidOrder {
				order,
			});
		}

		Ok(Tree {
			nodes: Arena::new(),
			root: None,
			order,
			len: 0,
			height: 0,
			cmp,
		})
	}
}

// ---------------------------------------------------------------------------
// Tree Metadata and Ordered Access
// ---------------------------------------------------------------------------

impl<K, V, C> Tree<K, V, C> {
	/// Returns the order (maximum children per internal node).
	#[inline]
	pub fn order(&self) -> usize {
		self.order
	}

	/// Maximum entries any node may hold: `order - 1`.
	#[inline]
	pub fn max_entries(&self) -> usize {
		self.order - 1
	}

	/// Minimum entries any non-root node must hold: `ceil(order / 2) - 1`.
	#[inline]
	pub fn min_entries(&self) -> usize {
		self.order.div_ceil(2) - 1
	}

	/// Returns the comparator ordering this tree's keys.
	#[inline]
	pub fn comparator(&self) -> &C {
		&self.cmp
	}

	/// Returns the number of entries. This is O(1).
	#[inline]
	pub fn len(&self) -> usize {
		self.len
	}

	/// Returns `true` if the tree holds no entries.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Returns the number of levels in the tree.
	///
	/// - Height 0: Empty tree
	/// - Height 1: Only a single leaf (the root)
	/// - Height N: N-1 levels of internal nodes plus leaves
	///
	/// Every leaf sits at the same depth, so this is also the length of any
	/// root-to-leaf path.
	#[inline]
	pub fn height(&self) -> usize {
		self.height
	}

	/// Removes every entry, releasing all nodes.
	pub fn clear(&mut self) {
		self.nodes.clear();
		self.root = None;
		self.len = 0;
		self.height = 0;
	}

	/// Returns the entry with the smallest key.
	pub fn first_key_value(&self) -> Option<(&K, &V)> {
		let leaf = self.leftmost_leaf(self.root?);
		Some(self.nodes[leaf].entry(0))
	}

	/// Returns the entry with the largest key.
	pub fn last_key_value(&self) -> Option<(&K, &V)> {
		let leaf = self.rightmost_leaf(self.root?);
		let node = &self.nodes[leaf];
		Some(node.entry(node.len() - 1))
	}

	/// Removes and returns the entry with the smallest key.
	pub fn pop_first(&mut self) -> Option<(K, V)> {
		let leaf = self.leftmost_leaf(self.root?);
		Some(self.remove_at_node(leaf, 0))
	}

	/// Removes and returns the entry with the largest key.
	pub fn pop_last(&mut self) -> Option<(K, V)> {
		let leaf = self.rightmost_leaf(self.root?);
		let last = self.nodes[leaf].len() - 1;
		Some(self.remove_at_node(leaf, last))
	}

	// -----------------------------------------------------------------------
	// Iteration
	// -----------------------------------------------------------------------

	/// Returns a lazy in-order iterator over the entries.
	///
	/// The iterator is double-ended: `tree.iter().rev()` walks the entries
	/// from the largest key down. Creating it only descends to the two edge
	/// leaves, and dropping it early does no further work.
	///
	/// # Example
	///
	/// ```
	/// use arbor::Tree;
	///
	/// let tree: Tree<i32, char> = [(2, 'b'), (1, 'a'), (3, 'c')].into_iter().collect();
	/// let forward: Vec<_> = tree.iter().map(|(k, _)| *k).collect();
	/// let backward: Vec<_> = tree.iter().rev().map(|(_, v)| *v).collect();
	/// assert_eq!(forward, [1, 2, 3]);
	/// assert_eq!(backward, ['c', 'b', 'a']);
	/// ```
	pub fn iter(&self) -> Iter<'_, K, V, C> {
		Iter::new(self)
	}

	/// Returns a lazy in-order iterator over the keys.
	pub fn keys(&self) -> Keys<'_, K, V, C> {
		Keys::new(self.iter())
	}

	/// Returns a lazy iterator over the values, in key order.
	pub fn values(&self) -> Values<'_, K, V, C> {
		Values::new(self.iter())
	}

	/// Returns an unpositioned cursor over the tree.
	///
	/// The cursor must be positioned with one of the `seek` methods before
	/// [`RawIter::next`] or [`RawIter::prev`] yields anything.
	pub fn raw_iter(&self) -> RawIter<'_, K, V, C> {
		RawIter::new(self)
	}

	// -----------------------------------------------------------------------
	// Node Navigation Helpers
	// -----------------------------------------------------------------------

	pub(crate) fn leftmost_leaf(&self, mut id: NodeId) -> NodeId {
		while let Some(&child) = self.nodes[id].children.first() {
			id = child;
		}
		id
	}

	pub(crate) fn rightmost_leaf(&self, mut id: NodeId) -> NodeId {
		while let Some(&child) = self.nodes[id].children.last() {
			id = child;
		}
		id
	}

	/// Position of `child` within `parent`'s child list.
	fn index_in_parent(&self, parent: NodeId, child: NodeId) -> usize {
		self.nodes[parent]
			.children
			.iter()
			.position(|&c| c == child)
			.expect("node must be listed among its parent's children")
	}

	/// Points the parent handle of every child of `id` back at `id`.
	fn adopt_children(&mut self, id: NodeId) {
		for i in 0..self.nodes[id].children.len() {
			let child = self.nodes[id].children[i];
			self.nodes[child].parent = Some(id);
		}
	}

	/// Counts the entries in the subtree rooted at `id` by walking it.
	#[cfg(any(test, feature = "test-utils"))]
	pub(crate) fn subtree_len(&self, id: NodeId) -> usize {
		let node = &self.nodes[id];
		node.len() + node.children.iter().map(|&child| self.subtree_len(child)).sum::<usize>()
	}

	// -----------------------------------------------------------------------
	// Node Splitting
	// -----------------------------------------------------------------------

	/// Splits `id` while it holds more than `max_entries`, walking upward.
	///
	/// ```text
	/// Before split (order 4, node overflowed to 4 entries):
	///   Parent: [ P1 ,            P2 ]
	///                      │
	///                      ▼
	///   Node:    [ K1 , K2 , K3 , K4 ]
	///
	/// After split (mid = (order - 1) / 2 = 1):
	///   Parent: [ P1 ,      K2 ,      P2 ]
	///                  │          │
	///                  ▼          ▼
	///   Left:   [ K1 ]       Right: [ K3 , K4 ]
	/// ```
	///
	/// The promoted entry may overflow the parent in turn, so the check
	/// repeats one level up. When the root itself splits a new root is
	/// created above it. This is the only operation that increases height.
	fn split_overflow(&mut self, mut id: NodeId) {
		let mid = (self.order - 1) / 2;

		while self.nodes[id].len() > self.max_entries() {
			let (key, value, right) = self.nodes[id].split_off(mid);
			let parent = right.parent;
			let right_id = self.nodes.alloc(right);
			self.adopt_children(right_id);

			tracing::trace!(
				target: "arbor::split",
				node = id.index(),
				sibling = right_id.index(),
				mid,
				"split overfull node"
			);

			match parent {
				Some(parent_id) => {
					// The promoted key sorts right after everything in `id`
					let pos = self.index_in_parent(parent_id, id);
					let parent = &mut self.nodes[parent_id];
					parent.insert_at(pos, key, value);
					parent.children.insert(pos + 1, right_id);
					id = parent_id;
				}
				None => {
					let root = self.nodes.alloc(Node::root(key, value, id, right_id));
					self.nodes[id].parent = Some(root);
					self.nodes[right_id].parent = Some(root);
					self.root = Some(root);
					self.height += 1;
					tracing::trace!(target: "arbor::root", height = self.height, "root split");
					return;
				}
			}
		}
	}

	// -----------------------------------------------------------------------
	// Removal and Rebalancing
	// -----------------------------------------------------------------------

	/// Removes the entry at `pos` of node `id` and restores the invariants.
	///
	/// Removing from an internal node would leave its children without a
	/// separator, so the entry is first swapped with its in-order predecessor
	/// (the last entry of the rightmost leaf under `children[pos]`). Every
	/// removal therefore physically happens in a leaf.
	fn remove_at_node(&mut self, id: NodeId, pos: usize) -> (K, V) {
		let (leaf, removed) = if self.nodes[id].is_leaf() {
			(id, self.nodes[id].remove_at(pos))
		} else {
			let leaf = self.rightmost_leaf(self.nodes[id].children[pos]);
			let last = self.nodes[leaf].len() - 1;
			let (key, value) = self.nodes[leaf].remove_at(last);
			(leaf, self.nodes[id].replace_at(pos, key, value))
		};

		self.len -= 1;
		self.rebalance_underflow(leaf);
		removed
	}

	/// Restores minimum occupancy starting at `id`, walking upward.
	///
	/// For an underfull non-root node the options are tried in order:
	///
	/// 1. Borrow from the left sibling if it has an entry to spare
	/// 2. Borrow from the right sibling if it has an entry to spare
	/// 3. Merge with a sibling (the left one when it exists), which takes an
	///    entry away from the parent and may leave the parent underfull
	///
	/// Only a merge continues upward. Reaching the root ends the walk, after
	/// collapsing it if a merge left it without entries.
	fn rebalance_underflow(&mut self, mut id: NodeId) {
		let min = self.min_entries();

		loop {
			let Some(parent_id) = self.nodes[id].parent else {
				self.collapse_root(id);
				return;
			};

			if self.nodes[id].len() >= min {
				return;
			}

			let pos = self.index_in_parent(parent_id, id);
			let parent = &self.nodes[parent_id];
			let left = pos.checked_sub(1).map(|p| parent.children[p]);
			let right = parent.children.get(pos + 1).copied();

			if let Some(left) = left {
				if self.nodes[left].len() > min {
					self.borrow_from_left(parent_id, pos);
					return;
				}
			}

			if let Some(right) = right {
				if self.nodes[right].len() > min {
					self.borrow_from_right(parent_id, pos);
					return;
				}
			}

			match left {
				Some(_) => self.merge_children(parent_id, pos - 1),
				None => self.merge_children(parent_id, pos),
			}

			id = parent_id;
		}
	}

	/// Rotates one entry from the left sibling through the parent into the
	/// node at child position `pos`.
	///
	/// ```text
	/// Before:   Parent: [ .. S .. ]          After:   Parent: [ .. L2 .. ]
	///                    /      \                              /       \
	///      Left: [L1, L2]   Node: [N1]          Left: [L1]   Node: [S, N1]
	/// ```
	///
	/// For internal nodes the left sibling's last child moves along and
	/// becomes the node's first child.
	fn borrow_from_left(&mut self, parent_id: NodeId, pos: usize) {
		let parent = &self.nodes[parent_id];
		let (left_id, node_id) = (parent.children[pos - 1], parent.children[pos]);

		let left = &mut self.nodes[left_id];
		let last = left.len() - 1;
		let (key, value) = left.remove_at(last);
		let child = left.children.pop();

		let (key, value) = self.nodes[parent_id].replace_at(pos - 1, key, value);

		let node = &mut self.nodes[node_id];
		node.insert_at(0, key, value);
		if let Some(child) = child {
			node.children.insert(0, child);
			self.nodes[child].parent = Some(node_id);
		}

		tracing::trace!(
			target: "arbor::rebalance",
			node = node_id.index(),
			sibling = left_id.index(),
			"borrowed from left sibling"
		);
	}

	/// Mirror image of [`Self::borrow_from_left`]: the right sibling's first
	/// entry moves up into the parent and the separator moves down to the end
	/// of the node at child position `pos`.
	fn borrow_from_right(&mut self, parent_id: NodeId, pos: usize) {
		let parent = &self.nodes[parent_id];
		let (node_id, right_id) = (parent.children[pos], parent.children[pos + 1]);

		let right = &mut self.nodes[right_id];
		let (key, value) = right.remove_at(0);
		let child = if right.is_leaf() {
			None
		} else {
			Some(right.children.remove(0))
		};

		let (key, value) = self.nodes[parent_id].replace_at(pos, key, value);

		let node = &mut self.nodes[node_id];
		let end = node.len();
		node.insert_at(end, key, value);
		if let Some(child) = child {
			node.children.push(child);
			self.nodes[child].parent = Some(node_id);
		}

		tracing::trace!(
			target: "arbor::rebalance",
			node = node_id.index(),
			sibling = right_id.index(),
			"borrowed from right sibling"
		);
	}

	/// Merges the children at positions `left_pos` and `left_pos + 1`.
	///
	/// ```text
	/// Before:   Parent: [ P1 , S , P2 ]        After:   Parent: [ P1 , P2 ]
	///                        /   \                                  │
	///            Left: [L1]       Right: [R1]            Left: [L1, S, R1]
	/// ```
	///
	/// The separator moves down, the right node's contents are appended to
	/// the left node, and the right node's slot is freed.
	fn merge_children(&mut self, parent_id: NodeId, left_pos: usize) {
		let parent = &mut self.nodes[parent_id];
		let (key, value) = parent.remove_at(left_pos);
		let right_id = parent.children.remove(left_pos + 1);
		let left_id = parent.children[left_pos];

		let right = self.nodes.free(right_id);
		self.nodes[left_id].merge(key, value, right);
		self.adopt_children(left_id);

		tracing::trace!(
			target: "arbor::rebalance",
			node = left_id.index(),
			absorbed = right_id.index(),
			"merged siblings"
		);
	}

	/// Replaces a root left without entries.
	///
	/// An empty internal root has exactly one child, which becomes the new
	/// root. This is the only operation that decreases height. An empty leaf
	/// root means the tree is now empty.
	fn collapse_root(&mut self, root: NodeId) {
		if self.nodes[root].len() > 0 {
			return;
		}

		let old = self.nodes.free(root);
		match old.children.first() {
			Some(&child) => {
				self.nodes[child].parent = None;
				self.root = Some(child);
				self.height -= 1;
				tracing::trace!(target: "arbor::root", height = self.height, "root collapsed");
			}
			None => {
				self.root = None;
				self.height = 0;
			}
		}
	}
}

// ---------------------------------------------------------------------------
// Keyed Operations
// ---------------------------------------------------------------------------

impl<K, V, C: Comparator<K>> Tree<K, V, C> {
	/// Locates `key`, returning the node holding it and the entry position.
	fn find(&self, key: &K) -> Option<(NodeId, usize)> {
		let mut id = self.root?;
		loop {
			let node = &self.nodes[id];
			let (pos, found) = node.search(key, &self.cmp);
			if found {
				return Some((id, pos));
			}
			if node.is_leaf() {
				return None;
			}
			id = node.children[pos];
		}
	}

	/// Returns a reference to the value stored under `key`.
	pub fn get(&self, key: &K) -> Option<&V> {
		let (id, pos) = self.find(key)?;
		Some(&self.nodes[id].values[pos])
	}

	/// Returns the stored key and value for `key`.
	pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
		let (id, pos) = self.find(key)?;
		Some(self.nodes[id].entry(pos))
	}

	/// Returns a mutable reference to the value stored under `key`.
	pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
		let (id, pos) = self.find(key)?;
		Some(&mut self.nodes[id].values[pos])
	}

	/// Returns `true` if the tree contains `key`.
	pub fn contains_key(&self, key: &K) -> bool {
		self.find(key).is_some()
	}

	/// Inserts a key-value pair.
	///
	/// If the key is already present, anywhere in the tree, its value is
	/// replaced in place and the old value returned. The structure is not
	/// touched in that case.
	///
	/// Otherwise the entry goes into the leaf where the search ended, and any
	/// resulting overflow is resolved by splitting upward.
	///
	/// # Example
	///
	/// ```
	/// use arbor::Tree;
	///
	/// let mut tree = Tree::new(3);
	/// assert_eq!(tree.insert(1, "one"), None);
	/// assert_eq!(tree.insert(1, "uno"), Some("one"));
	/// assert_eq!(tree.len(), 1);
	/// ```
	pub fn insert(&mut self, key: K, value: V) -> Option<V> {
		let Some(mut id) = self.root else {
			let mut leaf = Node::leaf(None);
			leaf.insert_at(0, key, value);
			self.root = Some(self.nodes.alloc(leaf));
			self.len = 1;
			self.height = 1;
			return None;
		};

		loop {
			let node = &mut self.nodes[id];
			let (pos, found) = node.search(&key, &self.cmp);
			if found {
				return Some(std::mem::replace(&mut node.values[pos], value));
			}
			if node.is_leaf() {
				node.insert_at(pos, key, value);
				break;
			}
			id = node.children[pos];
		}

		self.len += 1;
		self.split_overflow(id);
		None
	}

	/// Removes `key`, returning its value if it was present.
	pub fn remove(&mut self, key: &K) -> Option<V> {
		self.remove_entry(key).map(|(_, value)| value)
	}

	/// Removes `key`, returning the stored key and value if it was present.
	pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
		let (id, pos) = self.find(key)?;
		Some(self.remove_at_node(id, pos))
	}
}

impl<K: Clone, V: Clone, C> Tree<K, V, C> {
	/// Returns a snapshot of every entry in key order.
	pub fn entries(&self) -> Vec<(K, V)> {
		self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
	}
}

// ---------------------------------------------------------------------------
// Trait Implementations
// ---------------------------------------------------------------------------

impl<K: Clone, V: Clone, C: Clone> Clone for Tree<K, V, C> {
	/// Deep-copies every node into a fresh, compacted arena.
	///
	/// Parent handles are rebuilt for the copy, so the clone shares nothing
	/// with the original.
	fn clone(&self) -> Self {
		let mut nodes = Arena::with_capacity(self.nodes.live());
		let root = self.root.map(|root| copy_subtree(&self.nodes, &mut nodes, root, None));

		Tree {
			nodes,
			root,
			order: self.order,
			len: self.len,
			height: self.height,
			cmp: self.cmp.clone(),
		}
	}
}

fn copy_subtree<K: Clone, V: Clone>(
	src: &Arena<Node<K, V>>,
	dst: &mut Arena<Node<K, V>>,
	id: NodeId,
	parent: Option<NodeId>,
) -> NodeId {
	let node = &src[id];
	let mut copy = Node::leaf(parent);
	copy.keys = node.keys.clone();
	copy.values = node.values.clone();
	let copy_id = dst.alloc(copy);

	for &child in &node.children {
		let child_copy = copy_subtree(src, dst, child, Some(copy_id));
		dst[copy_id].children.push(child_copy);
	}

	copy_id
}

impl<K: PartialEq, V: PartialEq, C> PartialEq for Tree<K, V, C> {
	/// Two trees are equal when they hold the same entries in the same order,
	/// regardless of their order parameter or internal shape.
	fn eq(&self, other: &Self) -> bool {
		self.len == other.len && self.iter().eq(other.iter())
	}
}

impl<K: Eq, V: Eq, C> Eq for Tree<K, V, C> {}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for Tree<K, V, C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.iter()).finish()
	}
}

/// Dumps the node structure, one node per line.
///
/// ```text
/// Tree(order=3, len=4, height=2)
/// └── [2]
///     ├── [1]
///     └── [3, 4]
/// ```
impl<K: fmt::Debug, V, C> fmt::Display for Tree<K, V, C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "Tree(order={}, len={}, height={})", self.order, self.len, self.height)?;
		match self.root {
			Some(root) => self.fmt_subtree(f, root, "", true),
			None => Ok(()),
		}
	}
}

impl<K: fmt::Debug, V, C> Tree<K, V, C> {
	fn fmt_subtree(
		&self,
		f: &mut fmt::Formatter<'_>,
		id: NodeId,
		prefix: &str,
		last: bool,
	) -> fmt::Result {
		let node = &self.nodes[id];
		let (branch, indent) = if last {
			("└── ", "    ")
		} else {
			("├── ", "│   ")
		};
		writeln!(f, "{prefix}{branch}{:?}", node.keys.as_slice())?;

		let child_prefix = format!("{prefix}{indent}");
		for (i, &child) in node.children.iter().enumerate() {
			self.fmt_subtree(f, child, &child_prefix, i + 1 == node.children.len())?;
		}
		Ok(())
	}
}

impl<K: Ord, V> FromIterator<(K, V)> for Tree<K, V> {
	/// Builds a tree of [`DEFAULT_ORDER`]. Later duplicates overwrite earlier
	/// ones.
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut tree = Tree::default();
		tree.extend(iter);
		tree
	}
}

impl<K, V, C: Comparator<K>> Extend<(K, V)> for Tree<K, V, C> {
	fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
		for (key, value) in iter {
			self.insert(key, value);
		}
	}
}

impl<'t, K, V, C> IntoIterator for &'t Tree<K, V, C> {
	type Item = (&'t K, &'t V);
	type IntoIter = Iter<'t, K, V, C>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

// ===========================================================================
// Test-Only Validation Module
// ===========================================================================

/// Structural validation for tests. Enabled by `cfg(test)` and by the
/// `test-utils` feature for integration tests.
#[cfg(any(test, feature = "test-utils"))]
impl<K: fmt::Debug, V, C: Comparator<K>> Tree<K, V, C> {
	/// Validates all tree invariants. Panics with diagnostic info if any
	/// invariant is violated.
	///
	/// # Invariants Checked
	///
	/// 1. Key ordering: keys strictly increase within each node
	/// 2. Separation: every key in `children[i]` lies strictly between the
	///    parent's entries `i - 1` and `i`
	/// 3. Occupancy: at most `max_entries` everywhere, at least `min_entries`
	///    below the root, and a non-empty root
	/// 4. Fan-out: internal nodes have exactly `len + 1` children
	/// 5. Balance: every leaf sits at depth `height()`
	/// 6. Back-references: each child's parent handle names its parent
	/// 7. Bookkeeping: cached `len()` matches a full count, and every live
	///    arena slot is reachable from the root
	pub fn assert_invariants(&self) {
		let Some(root) = self.root else {
			assert_eq!(self.len, 0, "Empty tree reports len {}", self.len);
			assert_eq!(self.height, 0, "Empty tree reports height {}", self.height);
			assert_eq!(self.nodes.live(), 0, "Empty tree still owns {} nodes", self.nodes.live());
			return;
		};

		assert!(self.nodes[root].parent.is_none(), "Root {root:?} has a parent");
		assert!(self.nodes[root].len() > 0, "Non-empty tree has an empty root");

		let mut visited = 0;
		self.validate_node_recursive(root, 1, None, None, &mut visited);

		assert_eq!(
			visited,
			self.nodes.live(),
			"Arena holds {} live nodes but only {} are reachable",
			self.nodes.live(),
			visited
		);
		assert_eq!(self.subtree_len(root), self.len, "Cached len {} does not match entry count", self.len);
	}

	fn validate_node_recursive(
		&self,
		id: NodeId,
		depth: usize,
		lower: Option<&K>,
		upper: Option<&K>,
		visited: &mut usize,
	) {
		*visited += 1;
		let node = &self.nodes[id];

		assert_eq!(
			node.keys.len(),
			node.values.len(),
			"Node {id:?} has {} keys but {} values",
			node.keys.len(),
			node.values.len()
		);

		// Invariant 3: Occupancy
		assert!(
			node.len() <= self.max_entries(),
			"Node {id:?} holds {} entries, max is {}",
			node.len(),
			self.max_entries()
		);
		if node.parent.is_some() {
			assert!(
				node.len() >= self.min_entries(),
				"Node {id:?} holds {} entries, min is {}",
				node.len(),
				self.min_entries()
			);
		}

		// Invariant 1: Key ordering
		for pair in node.keys.windows(2) {
			assert_eq!(
				self.cmp.compare(&pair[0], &pair[1]),
				std::cmp::Ordering::Less,
				"Keys not sorted in {id:?}: {:?} >= {:?}",
				pair[0],
				pair[1]
			);
		}

		// Invariant 2: Separation against the parent's bounds
		for key in &node.keys {
			if let Some(lower) = lower {
				assert_eq!(
					self.cmp.compare(lower, key),
					std::cmp::Ordering::Less,
					"Key {key:?} not greater than parent bound {lower:?}"
				);
			}
			if let Some(upper) = upper {
				assert_eq!(
					self.cmp.compare(key, upper),
					std::cmp::Ordering::Less,
					"Key {key:?} not less than parent bound {upper:?}"
				);
			}
		}

		if node.is_leaf() {
			// Invariant 5: Balance
			assert_eq!(depth, self.height, "Leaf {id:?} at depth {depth} but height is {}", self.height);
			return;
		}

		// Invariant 4: Fan-out
		assert_eq!(
			node.children.len(),
			node.len() + 1,
			"Internal node {id:?} has {} entries but {} children",
			node.len(),
			node.children.len()
		);

		for (i, &child) in node.children.iter().enumerate() {
			// Invariant 6: Back-references
			assert_eq!(
				self.nodes[child].parent,
				Some(id),
				"Child {child:?} does not point back to parent {id:?}"
			);

			let child_lower = if i == 0 {
				lower
			} else {
				Some(&node.keys[i - 1])
			};
			let child_upper = if i == node.len() {
				upper
			} else {
				Some(&node.keys[i])
			};
			self.validate_node_recursive(child, depth + 1, child_lower, child_upper, visited);
		}
	}
}

#[cfg(any(test, feature = "test-utils"))]
impl<K: Clone, V, C> Tree<K, V, C> {
	/// Returns the keys of every node, level by level from the root, left to
	/// right within a level.
	///
	/// ```text
	/// order 3, keys 1..=3  =>  [[[2]], [[1], [3]]]
	/// ```
	pub fn shape(&self) -> Vec<Vec<Vec<K>>> {
		let mut levels = Vec::new();
		let mut frontier: Vec<NodeId> = self.root.into_iter().collect();

		while !frontier.is_empty() {
			levels.push(frontier.iter().map(|&id| self.nodes[id].keys.to_vec()).collect());
			frontier =
				frontier.iter().flat_map(|&id| self.nodes[id].children.iter().copied()).collect();
		}

		levels
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::util::sample_tree;

	fn tree_with(order: usize, keys: impl IntoIterator<Item = i32>) -> Tree<i32, i32> {
		let mut tree = Tree::new(order);
		for k in keys {
			tree.insert(k, k * 10);
			tree.assert_invariants();
		}
		tree
	}

	fn keys_of(tree: &Tree<i32, i32>) -> Vec<i32> {
		tree.keys().copied().collect()
	}

	// -----------------------------------------------------------------------
	// Construction
	// -----------------------------------------------------------------------

	#[test]
	#[should_panic(expected = "invalid tree order 2")]
	fn new_rejects_order_two() {
		let _tree: Tree<i32, i32> = Tree::new(2);
	}

	#[test]
	fn try_new_reports_invalid_order() {
		for order in 0..MIN_ORDER {
			let result = Tree::<i32, i32>::try_new(order);
			assert!(matches!(result, Err(Error::InvalidOrder { order: o }) if o == order));
		}
		assert!(Tree::<i32, i32>::try_new(MIN_ORDER).is_ok());
	}

	#[test]
	fn occupancy_bounds_follow_order() {
		let bounds = |order| {
			let tree: Tree<i32, i32> = Tree::new(order);
			(tree.min_entries(), tree.max_entries())
		};
		assert_eq!(bounds(3), (1, 2));
		assert_eq!(bounds(4), (1, 3));
		assert_eq!(bounds(5), (2, 4));
		assert_eq!(bounds(6), (2, 5));
		assert_eq!(bounds(7), (3, 6));
	}

	#[test]
	fn default_uses_default_order() {
		let tree: Tree<i32, i32> = Tree::default();
		assert_eq!(tree.order(), DEFAULT_ORDER);
		assert!(tree.is_empty());
	}

	// -----------------------------------------------------------------------
	// Basic Tree Operation Tests
	// -----------------------------------------------------------------------

	#[test]
	fn basic_insert_and_lookup() {
		let mut tree: Tree<i32, &str> = Tree::new(3);

		assert_eq!(tree.insert(1, "one"), None);
		assert_eq!(tree.insert(2, "two"), None);
		assert_eq!(tree.insert(3, "three"), None);

		tree.assert_invariants();

		assert_eq!(tree.get(&1), Some(&"one"));
		assert_eq!(tree.get(&2), Some(&"two"));
		assert_eq!(tree.get(&3), Some(&"three"));
		assert_eq!(tree.get(&4), None);
		assert!(tree.contains_key(&2));
		assert!(!tree.contains_key(&4));
	}

	#[test]
	fn insert_update_in_internal_node() {
		let mut tree = tree_with(3, 1..=3);

		// 2 lives in the root after the first split
		assert_eq!(tree.shape()[0], vec![vec![2]]);
		assert_eq!(tree.insert(2, 99), Some(20));
		assert_eq!(tree.get(&2), Some(&99));
		assert_eq!(tree.len(), 3);
		assert_eq!(tree.shape()[0], vec![vec![2]]);

		tree.assert_invariants();
	}

	#[test]
	fn get_mut_and_get_key_value() {
		let mut tree = tree_with(4, 0..20);

		*tree.get_mut(&7).unwrap() += 1;
		assert_eq!(tree.get(&7), Some(&71));
		assert_eq!(tree.get_key_value(&7), Some((&7, &71)));
		assert!(tree.get_mut(&99).is_none());
	}

	#[test]
	fn len_and_is_empty() {
		let mut tree: Tree<i32, i32> = Tree::new(3);

		assert!(tree.is_empty());
		assert_eq!(tree.len(), 0);
		assert_eq!(tree.height(), 0);

		tree.insert(1, 10);
		assert!(!tree.is_empty());
		assert_eq!(tree.len(), 1);
		assert_eq!(tree.height(), 1);

		tree.insert(2, 20);
		assert_eq!(tree.len(), 2);

		tree.remove(&1);
		assert_eq!(tree.len(), 1);

		tree.assert_invariants();
	}

	#[test]
	fn first_and_last() {
		let mut tree = tree_with(3, [5, 1, 9, 3, 7]);

		assert_eq!(tree.first_key_value(), Some((&1, &10)));
		assert_eq!(tree.last_key_value(), Some((&9, &90)));

		assert_eq!(tree.pop_first(), Some((1, 10)));
		assert_eq!(tree.pop_last(), Some((9, 90)));
		tree.assert_invariants();
		assert_eq!(keys_of(&tree), [3, 5, 7]);

		tree.clear();
		assert_eq!(tree.first_key_value(), None);
		assert_eq!(tree.pop_first(), None);
		assert_eq!(tree.pop_last(), None);
	}

	#[test]
	fn pop_first_drains_in_order() {
		let mut tree = tree_with(4, (0..100).rev());

		for i in 0..100 {
			assert_eq!(tree.pop_first(), Some((i, i * 10)));
			tree.assert_invariants();
		}
		assert!(tree.is_empty());
	}

	#[test]
	fn clear_resets_everything() {
		let mut tree = tree_with(3, 0..50);
		tree.clear();

		tree.assert_invariants();
		assert_eq!(tree.len(), 0);
		assert_eq!(tree.height(), 0);
		assert_eq!(tree.iter().next(), None);

		tree.insert(1, 1);
		tree.assert_invariants();
	}

	// -----------------------------------------------------------------------
	// Split Tests
	// -----------------------------------------------------------------------

	#[test]
	fn order_three_first_split() {
		let tree = tree_with(3, [1, 2, 3]);

		assert_eq!(tree.shape(), vec![vec![vec![2]], vec![vec![1], vec![3]]]);
		assert_eq!(tree.height(), 2);
	}

	#[test]
	fn order_three_append_after_split() {
		let tree = tree_with(3, [1, 2, 3, 4]);

		assert_eq!(tree.shape(), vec![vec![vec![2]], vec![vec![1], vec![3, 4]]]);
	}

	#[test]
	fn split_propagates_to_root() {
		// 1..=7 in order 3 fills a perfect three-level tree
		let tree = tree_with(3, 1..=7);

		assert_eq!(
			tree.shape(),
			vec![
				vec![vec![4]],
				vec![vec![2], vec![6]],
				vec![vec![1], vec![3], vec![5], vec![7]],
			]
		);
		assert_eq!(tree.height(), 3);
	}

	#[test]
	fn split_midpoint_even_order() {
		// order 4: mid = 1, so [1, 2, 3, 4] splits into [1] | 2 | [3, 4]
		let tree = tree_with(4, 1..=4);

		assert_eq!(tree.shape(), vec![vec![vec![2]], vec![vec![1], vec![3, 4]]]);
	}

	#[test]
	fn split_midpoint_odd_order() {
		// order 5: mid = 2, so [1, 2, 3, 4, 5] splits into [1, 2] | 3 | [4, 5]
		let tree = tree_with(5, 1..=5);

		assert_eq!(tree.shape(), vec![vec![vec![3]], vec![vec![1, 2], vec![4, 5]]]);
	}

	// -----------------------------------------------------------------------
	// Delete and Rebalance Tests
	// -----------------------------------------------------------------------

	#[test]
	fn order_three_delete_borrows_from_right() {
		let mut tree = tree_with(3, [1, 2, 3, 4]);

		assert_eq!(tree.remove(&1), Some(10));
		tree.assert_invariants();

		assert_eq!(tree.len(), 3);
		assert_eq!(keys_of(&tree), [2, 3, 4]);
		assert_eq!(tree.shape(), vec![vec![vec![3]], vec![vec![2], vec![4]]]);
	}

	#[test]
	fn delete_borrows_from_left_first() {
		let mut tree = sample_tree(
			r#"{
				"order": 3,
				"root": {
					"keys": [3, 6],
					"children": [{"keys": [1, 2]}, {"keys": [4]}, {"keys": [7, 8]}]
				}
			}"#,
		);
		tree.assert_invariants();

		// Both siblings can spare an entry; the left one is preferred
		tree.remove(&4);
		tree.assert_invariants();

		assert_eq!(tree.shape(), vec![vec![vec![2, 6]], vec![vec![1], vec![3], vec![7, 8]]]);
	}

	#[test]
	fn delete_merges_when_siblings_are_minimal() {
		let mut tree = sample_tree(
			r#"{
				"order": 3,
				"root": {
					"keys": [2, 4],
					"children": [{"keys": [1]}, {"keys": [3]}, {"keys": [5]}]
				}
			}"#,
		);

		tree.remove(&3);
		tree.assert_invariants();

		// The emptied leaf merges into its left sibling with the separator
		assert_eq!(tree.shape(), vec![vec![vec![4]], vec![vec![1, 2], vec![5]]]);
	}

	#[test]
	fn delete_leftmost_merges_with_right() {
		let mut tree = sample_tree(
			r#"{
				"order": 3,
				"root": {
					"keys": [2, 4],
					"children": [{"keys": [1]}, {"keys": [3]}, {"keys": [5]}]
				}
			}"#,
		);

		tree.remove(&1);
		tree.assert_invariants();

		assert_eq!(tree.shape(), vec![vec![vec![4]], vec![vec![2, 3], vec![5]]]);
	}

	#[test]
	fn delete_internal_entry_uses_predecessor() {
		let mut tree = tree_with(3, 1..=7);

		// 4 is the root separator; its predecessor is 3
		assert_eq!(tree.remove(&4), Some(40));
		tree.assert_invariants();

		assert_eq!(tree.get(&4), None);
		assert_eq!(keys_of(&tree), [1, 2, 3, 5, 6, 7]);
		assert_eq!(tree.height(), 2);
		assert_eq!(tree.shape(), vec![vec![vec![3, 6]], vec![vec![1, 2], vec![5], vec![7]]]);
	}

	#[test]
	fn internal_borrow_moves_child() {
		let mut tree = sample_tree(
			r#"{
				"order": 3,
				"root": {
					"keys": [10],
					"children": [
						{"keys": [4, 7], "children": [{"keys": [2]}, {"keys": [5]}, {"keys": [8]}]},
						{"keys": [12], "children": [{"keys": [11]}, {"keys": [13]}]}
					]
				}
			}"#,
		);
		tree.assert_invariants();

		// Removing 13 merges its leaf into [11] and empties the [12] node, which
		// then takes 10 from the root and child [8] from its left sibling.
		tree.remove(&13);
		tree.assert_invariants();

		assert_eq!(
			tree.shape(),
			vec![
				vec![vec![7]],
				vec![vec![4], vec![10]],
				vec![vec![2], vec![5], vec![8], vec![11, 12]],
			]
		);
	}

	#[test]
	fn internal_borrow_from_right_moves_child() {
		let mut tree = sample_tree(
			r#"{
				"order": 3,
				"root": {
					"keys": [4],
					"children": [
						{"keys": [2], "children": [{"keys": [1]}, {"keys": [3]}]},
						{"keys": [7, 10], "children": [{"keys": [5]}, {"keys": [8]}, {"keys": [11]}]}
					]
				}
			}"#,
		);
		tree.assert_invariants();

		// Removing 1 merges its leaf into [3] and empties the [2] node. It has
		// no left sibling, so it takes 4 from the root and child [5] from the right.
		tree.remove(&1);
		tree.assert_invariants();

		assert_eq!(
			tree.shape(),
			vec![
				vec![vec![7]],
				vec![vec![4], vec![10]],
				vec![vec![2, 3], vec![5], vec![8], vec![11]],
			]
		);

		let (moved, _) = tree.find(&5).unwrap();
		let (adopter, _) = tree.find(&4).unwrap();
		assert_eq!(tree.nodes[moved].parent, Some(adopter));
		assert_eq!(tree.nodes[adopter].children.last(), Some(&moved));
	}

	#[test]
	fn root_collapse_reduces_height() {
		let mut tree = tree_with(3, 1..=3);
		assert_eq!(tree.height(), 2);

		tree.remove(&1);
		tree.assert_invariants();

		assert_eq!(tree.height(), 1);
		assert_eq!(tree.shape(), vec![vec![vec![2, 3]]]);
	}

	#[test]
	fn removing_last_entry_empties_tree() {
		let mut tree = tree_with(3, [1]);

		assert_eq!(tree.remove(&1), Some(10));
		tree.assert_invariants();
		assert!(tree.is_empty());
		assert_eq!(tree.height(), 0);
		assert_eq!(tree.remove(&1), None);
	}

	#[test]
	fn delete_nonexistent_returns_none() {
		let mut tree = tree_with(3, 0..10);

		assert_eq!(tree.remove(&999), None);
		assert_eq!(tree.remove_entry(&-1), None);
		assert_eq!(tree.len(), 10);
		tree.assert_invariants();
	}

	#[test]
	fn delete_all_entries_every_order() {
		for order in 3..=9 {
			let mut tree = tree_with(order, 0..200);
			for i in 0..200 {
				assert_eq!(tree.remove(&i), Some(i * 10), "order {order}, key {i}");
				tree.assert_invariants();
			}
			assert!(tree.is_empty());
		}
	}

	#[test]
	fn delete_random_order() {
		use rand::prelude::*;

		let mut rng = StdRng::seed_from_u64(7);
		let mut keys: Vec<i32> = (0..300).collect();
		keys.shuffle(&mut rng);
		let mut tree = tree_with(4, keys.iter().copied());

		keys.shuffle(&mut rng);
		for k in keys {
			assert_eq!(tree.remove_entry(&k), Some((k, k * 10)));
			tree.assert_invariants();
			assert_eq!(tree.get(&k), None);
		}
		assert!(tree.is_empty());
	}

	// -----------------------------------------------------------------------
	// Clone / Equality / Formatting
	// -----------------------------------------------------------------------

	#[test]
	fn clone_is_independent() {
		let mut original = tree_with(3, 0..30);
		let mut copy = original.clone();
		copy.assert_invariants();
		assert_eq!(copy, original);

		copy.insert(100, 0);
		copy.remove(&0);
		original.remove(&15);

		original.assert_invariants();
		copy.assert_invariants();
		assert_eq!(original.get(&100), None);
		assert_eq!(original.get(&0), Some(&0));
		assert_eq!(copy.get(&15), Some(&150));
	}

	#[test]
	fn clone_compacts_arena() {
		let mut tree = tree_with(3, 0..100);
		for i in 0..90 {
			tree.remove(&i);
		}

		let copy = tree.clone();
		copy.assert_invariants();
		assert_eq!(copy.shape(), tree.shape());
	}

	#[test]
	fn equality_ignores_shape() {
		let a = tree_with(3, 0..20);
		let b = tree_with(8, (0..20).rev());

		assert_ne!(a.shape(), b.shape());
		assert_eq!(a, b);
	}

	#[test]
	fn display_dumps_structure() {
		let tree = tree_with(3, 1..=4);

		assert_eq!(
			tree.to_string(),
			"Tree(order=3, len=4, height=2)\n└── [2]\n    ├── [1]\n    └── [3, 4]\n"
		);

		let empty: Tree<i32, i32> = Tree::new(3);
		assert_eq!(empty.to_string(), "Tree(order=3, len=0, height=0)\n");
	}

	#[test]
	fn debug_formats_as_map() {
		let tree = tree_with(3, [2, 1]);
		assert_eq!(format!("{tree:?}"), "{1: 10, 2: 20}");
	}

	#[test]
	fn entries_snapshot() {
		let tree = tree_with(3, [3, 1, 2]);
		assert_eq!(tree.entries(), vec![(1, 10), (2, 20), (3, 30)]);
	}

	#[test]
	fn custom_comparator_orders_keys() {
		let mut tree: Tree<i32, (), Reverse> = Tree::with_comparator(3, Reverse);
		for k in 0..50 {
			tree.insert(k, ());
		}
		tree.assert_invariants();

		let keys: Vec<i32> = tree.keys().copied().collect();
		assert_eq!(keys, (0..50).rev().collect::<Vec<_>>());
		assert_eq!(tree.first_key_value(), Some((&49, &())));
	}
}
