//! Iterators over the entries of a [`Tree`].
//!
//! [`RawIter`] is a seekable cursor. Its position is always a gap between two
//! adjacent entries (or before the first, or after the last): [`RawIter::next`]
//! yields the entry after the gap and [`RawIter::prev`] the one before it,
//! moving the gap past it.
//!
//! The cursor keeps the path from the root down to the leaf holding the gap.
//! Each frame is `(node, index)`: in a leaf, `index` is the gap position; in an
//! internal node, it is the child the path descends into, so the gap lies
//! between that node's entries `index - 1` and `index`.
//!
//! ```text
//!                  [ 20 ]              path: ([20], 1) -> ([25, 30], 1)
//!                 /      \
//!        [ 5, 10 ]        [ 25 ^ 30 ]  next() = 30, prev() = 25
//! ```
//!
//! Stepping past the end of a leaf climbs to the nearest ancestor with an
//! entry on that side, yields it, then descends to the edge of the adjacent
//! subtree. Every step is amortized O(1) and worst-case O(height).

use std::iter::FusedIterator;

use crate::arena::NodeId;
use crate::compare::Comparator;
use crate::node::Node;
use crate::Tree;

/// Seekable cursor over the entries of a tree.
///
/// A fresh cursor is unpositioned and yields nothing until one of the `seek`
/// methods is called.
///
/// # Example
///
/// ```
/// use arbor::Tree;
///
/// let tree: Tree<i32, i32> = (0..10).map(|i| (i * 10, i)).collect();
/// let mut iter = tree.raw_iter();
///
/// iter.seek(&35);
/// assert_eq!(iter.next(), Some((&40, &4)));
/// assert_eq!(iter.prev(), Some((&40, &4)));
/// assert_eq!(iter.prev(), Some((&30, &3)));
/// ```
pub struct RawIter<'t, K, V, C> {
	tree: &'t Tree<K, V, C>,
	stack: Vec<(NodeId, usize)>,
}

impl<K, V, C> Clone for RawIter<'_, K, V, C> {
	fn clone(&self) -> Self {
		RawIter {
			tree: self.tree,
			stack: self.stack.clone(),
		}
	}
}

impl<'t, K, V, C> RawIter<'t, K, V, C> {
	pub(crate) fn new(tree: &'t Tree<K, V, C>) -> Self {
		RawIter {
			tree,
			stack: Vec::with_capacity(tree.height()),
		}
	}

	#[inline]
	fn node(&self, id: NodeId) -> &'t Node<K, V> {
		let tree: &'t Tree<K, V, C> = self.tree;
		&tree.nodes[id]
	}

	/// Pushes the path to the gap before the first entry under `id`.
	fn descend_first(&mut self, mut id: NodeId) {
		loop {
			let node = self.node(id);
			self.stack.push((id, 0));
			match node.children.first() {
				Some(&child) => id = child,
				None => return,
			}
		}
	}

	/// Pushes the path to the gap after the last entry under `id`.
	fn descend_last(&mut self, mut id: NodeId) {
		loop {
			let node = self.node(id);
			self.stack.push((id, node.len()));
			match node.children.last() {
				Some(&child) => id = child,
				None => return,
			}
		}
	}

	/// Positions the cursor before the first entry.
	pub fn seek_to_first(&mut self) {
		self.stack.clear();
		if let Some(root) = self.tree.root {
			self.descend_first(root);
		}
	}

	/// Positions the cursor after the last entry.
	pub fn seek_to_last(&mut self) {
		self.stack.clear();
		if let Some(root) = self.tree.root {
			self.descend_last(root);
		}
	}

	/// Returns the entry after the cursor and advances past it.
	///
	/// At the end, returns `None` and leaves the cursor where it is.
	pub fn next(&mut self) -> Option<(&'t K, &'t V)> {
		let &(leaf, gap) = self.stack.last()?;
		let node = self.node(leaf);
		if gap < node.len() {
			self.stack.last_mut()?.1 = gap + 1;
			return Some(node.entry(gap));
		}

		// Climb to the nearest ancestor with an entry to the right of the path
		let tree = self.tree;
		let depth = self.stack[..self.stack.len() - 1]
			.iter()
			.rposition(|&(id, i)| i < tree.nodes[id].len())?;
		self.stack.truncate(depth + 1);

		let (id, i) = self.stack[depth];
		self.stack[depth].1 = i + 1;
		let node = self.node(id);
		self.descend_first(node.children[i + 1]);
		Some(node.entry(i))
	}

	/// Returns the entry before the cursor and moves back past it.
	///
	/// At the start, returns `None` and leaves the cursor where it is.
	pub fn prev(&mut self) -> Option<(&'t K, &'t V)> {
		let &(leaf, gap) = self.stack.last()?;
		if gap > 0 {
			self.stack.last_mut()?.1 = gap - 1;
			return Some(self.node(leaf).entry(gap - 1));
		}

		let depth = self.stack[..self.stack.len() - 1].iter().rposition(|&(_, i)| i > 0)?;
		self.stack.truncate(depth + 1);

		let (id, i) = self.stack[depth];
		self.stack[depth].1 = i - 1;
		let node = self.node(id);
		self.descend_last(node.children[i - 1]);
		Some(node.entry(i - 1))
	}
}

impl<K, V, C: Comparator<K>> RawIter<'_, K, V, C> {
	/// Positions the cursor before the first entry whose key is not less
	/// than `key`.
	pub fn seek(&mut self, key: &K) {
		self.seek_exact(key);
	}

	/// Positions the cursor like [`Self::seek`], returning `true` if the next
	/// entry's key equals `key`.
	pub fn seek_exact(&mut self, key: &K) -> bool {
		self.stack.clear();
		let Some(mut id) = self.tree.root else {
			return false;
		};

		loop {
			let node = self.node(id);
			let (pos, found) = node.search(key, &self.tree.cmp);
			self.stack.push((id, pos));
			if node.is_leaf() {
				return found;
			}
			if found {
				// The gap before an internal entry is the end of its left subtree
				self.descend_last(node.children[pos]);
				return true;
			}
			id = node.children[pos];
		}
	}

	/// Positions the cursor after the last entry whose key is not greater
	/// than `key`, so that [`Self::prev`] yields it.
	pub fn seek_for_prev(&mut self, key: &K) {
		self.stack.clear();
		let Some(mut id) = self.tree.root else {
			return;
		};

		loop {
			let node = self.node(id);
			let (pos, found) = node.search(key, &self.tree.cmp);
			match (found, node.is_leaf()) {
				(true, true) => {
					self.stack.push((id, pos + 1));
					return;
				}
				(true, false) => {
					self.stack.push((id, pos + 1));
					self.descend_first(node.children[pos + 1]);
					return;
				}
				(false, true) => {
					self.stack.push((id, pos));
					return;
				}
				(false, false) => {
					self.stack.push((id, pos));
					id = node.children[pos];
				}
			}
		}
	}
}

// ---------------------------------------------------------------------------
// Standard Iterators
// ---------------------------------------------------------------------------

/// In-order iterator over the entries of a tree. Created by [`Tree::iter`].
///
/// Two cursors walk in from either end and a countdown of remaining entries
/// stops them from crossing.
pub struct Iter<'t, K, V, C> {
	front: RawIter<'t, K, V, C>,
	back: RawIter<'t, K, V, C>,
	remaining: usize,
}

impl<'t, K, V, C> Iter<'t, K, V, C> {
	pub(crate) fn new(tree: &'t Tree<K, V, C>) -> Self {
		let mut front = RawIter::new(tree);
		front.seek_to_first();
		let mut back = RawIter::new(tree);
		back.seek_to_last();
		Iter {
			front,
			back,
			remaining: tree.len(),
		}
	}
}

impl<K, V, C> Clone for Iter<'_, K, V, C> {
	fn clone(&self) -> Self {
		Iter {
			front: self.front.clone(),
			back: self.back.clone(),
			remaining: self.remaining,
		}
	}
}

impl<'t, K, V, C> Iterator for Iter<'t, K, V, C> {
	type Item = (&'t K, &'t V);

	fn next(&mut self) -> Option<Self::Item> {
		if self.remaining == 0 {
			return None;
		}
		self.remaining -= 1;
		self.front.next()
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		(self.remaining, Some(self.remaining))
	}
}

impl<K, V, C> DoubleEndedIterator for Iter<'_, K, V, C> {
	fn next_back(&mut self) -> Option<Self::Item> {
		if self.remaining == 0 {
			return None;
		}
		self.remaining -= 1;
		self.back.prev()
	}
}

impl<K, V, C> ExactSizeIterator for Iter<'_, K, V, C> {}

impl<K, V, C> FusedIterator for Iter<'_, K, V, C> {}

/// Iterator over the keys of a tree. Created by [`Tree::keys`].
pub struct Keys<'t, K, V, C> {
	inner: Iter<'t, K, V, C>,
}

impl<'t, K, V, C> Keys<'t, K, V, C> {
	pub(crate) fn new(inner: Iter<'t, K, V, C>) -> Self {
		Keys {
			inner,
		}
	}
}

impl<'t, K, V, C> Iterator for Keys<'t, K, V, C> {
	type Item = &'t K;

	fn next(&mut self) -> Option<&'t K> {
		self.inner.next().map(|(k, _)| k)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.inner.size_hint()
	}
}

impl<K, V, C> DoubleEndedIterator for Keys<'_, K, V, C> {
	fn next_back(&mut self) -> Option<Self::Item> {
		self.inner.next_back().map(|(k, _)| k)
	}
}

impl<K, V, C> ExactSizeIterator for Keys<'_, K, V, C> {}

impl<K, V, C> FusedIterator for Keys<'_, K, V, C> {}

/// Iterator over the values of a tree, in key order. Created by
/// [`Tree::values`].
pub struct Values<'t, K, V, C> {
	inner: Iter<'t, K, V, C>,
}

impl<'t, K, V, C> Values<'t, K, V, C> {
	pub(crate) fn new(inner: Iter<'t, K, V, C>) -> Self {
		Values {
			inner,
		}
	}
}

impl<'t, K, V, C> Iterator for Values<'t, K, V, C> {
	type Item = &'t V;

	fn next(&mut self) -> Option<&'t V> {
		self.inner.next().map(|(_, v)| v)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.inner.size_hint()
	}
}

impl<K, V, C> DoubleEndedIterator for Values<'_, K, V, C> {
	fn next_back(&mut self) -> Option<Self::Item> {
		self.inner.next_back().map(|(_, v)| v)
	}
}

impl<K, V, C> ExactSizeIterator for Values<'_, K, V, C> {}

impl<K, V, C> FusedIterator for Values<'_, K, V, C> {}
