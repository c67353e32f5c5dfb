//! Slot arena owning every node of a tree.
//!
//! Nodes refer to each other through [`NodeId`] handles rather than pointers.
//! A handle stays valid until its slot is released with [`Arena::free`], after
//! which the slot goes onto a free list and is handed out again by the next
//! [`Arena::alloc`]. Parent back-references are plain handles too, so the node
//! graph never forms an ownership cycle.

use std::fmt;
use std::ops::{Index, IndexMut};

/// A stable handle to a node slot inside an [`Arena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
	/// Returns the raw slot index, for diagnostics.
	#[inline]
	pub(crate) fn index(self) -> u32 {
		self.0
	}

	#[cfg(test)]
	pub(crate) fn from_raw(raw: u32) -> Self {
		NodeId(raw)
	}
}

impl fmt::Debug for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

pub(crate) struct Arena<T> {
	slots: Vec<Option<T>>,
	/// Vacant slots, reused last-freed first.
	free: Vec<NodeId>,
	live: usize,
}

impl<T> Arena<T> {
	pub(crate) fn new() -> Self {
		Arena {
			slots: Vec::new(),
			free: Vec::new(),
			live: 0,
		}
	}

	pub(crate) fn with_capacity(capacity: usize) -> Self {
		Arena {
			slots: Vec::with_capacity(capacity),
			free: Vec::new(),
			live: 0,
		}
	}

	/// Stores `value` in a vacant slot, growing the arena if none is free.
	pub(crate) fn alloc(&mut self, value: T) -> NodeId {
		self.live += 1;
		if let Some(id) = self.free.pop() {
			self.slots[id.0 as usize] = Some(value);
			return id;
		}
		let id = NodeId(u32::try_from(self.slots.len()).expect("arena exceeded u32::MAX slots"));
		self.slots.push(Some(value));
		id
	}

	/// Releases the slot behind `id` and returns its value.
	///
	/// # Panics
	///
	/// Panics if the slot is already vacant.
	pub(crate) fn free(&mut self, id: NodeId) -> T {
		let value = self.slots[id.0 as usize].take().expect("double free of arena slot");
		self.free.push(id);
		self.live -= 1;
		value
	}

	/// Number of occupied slots.
	#[inline]
	pub(crate) fn live(&self) -> usize {
		self.live
	}

	/// Drops every value and forgets all slots.
	pub(crate) fn clear(&mut self) {
		self.slots.clear();
		self.free.clear();
		self.live = 0;
	}
}

impl<T> Index<NodeId> for Arena<T> {
	type Output = T;

	#[inline]
	fn index(&self, id: NodeId) -> &T {
		match self.slots.get(id.0 as usize) {
			Some(Some(value)) => value,
			_ => unreachable!("dangling node handle {id:?} - this indicates a tree bookkeeping bug"),
		}
	}
}

impl<T> IndexMut<NodeId> for Arena<T> {
	#[inline]
	fn index_mut(&mut self, id: NodeId) -> &mut T {
		match self.slots.get_mut(id.0 as usize) {
			Some(Some(value)) => value,
			_ => unreachable!("dangling node handle {id:?} - this indicates a tree bookkeeping bug"),
		}
	}
}
