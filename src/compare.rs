//! Key ordering.
//!
//! A [`Tree`](crate::Tree) never calls `Ord` directly. Every key comparison
//! goes through the tree's [`Comparator`], which is fixed when the tree is
//! built. Any `Fn(&K, &K) -> Ordering` closure is a comparator, and
//! [`Natural`] and [`Reverse`] cover the common cases for `Ord` keys.
//!
//! A comparator must describe a strict total order over every key that will
//! ever be stored: it must be consistent across calls, antisymmetric and
//! transitive. The tree does not check this. A comparator that breaks these
//! rules leaves the tree unable to find its own keys, and one that panics
//! aborts the operation midway and leaves the tree in an unspecified state.

use std::cmp::Ordering;

/// A total order over keys of type `K`.
pub trait Comparator<K: ?Sized> {
	/// Compares two keys.
	fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Orders keys by their [`Ord`] implementation. This is the default.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Natural;

impl<K: Ord + ?Sized> Comparator<K> for Natural {
	#[inline]
	fn compare(&self, a: &K, b: &K) -> Ordering {
		a.cmp(b)
	}
}

/// Orders keys by the reverse of their [`Ord`] implementation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Reverse;

impl<K: Ord + ?Sized> Comparator<K> for Reverse {
	#[inline]
	fn compare(&self, a: &K, b: &K) -> Ordering {
		b.cmp(a)
	}
}

impl<K: ?Sized, F> Comparator<K> for F
where
	F: Fn(&K, &K) -> Ordering,
{
	#[inline]
	fn compare(&self, a: &K, b: &K) -> Ordering {
		self(a, b)
	}
}
