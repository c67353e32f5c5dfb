//! # Error Types for the B-Tree
//!
//! Only two things can go wrong from the caller's point of view:
//!
//! - Constructing a tree with an order below [`MIN_ORDER`](crate::MIN_ORDER).
//!   [`Tree::try_new`](crate::Tree::try_new) reports this as
//!   [`Error::InvalidOrder`]; [`Tree::new`](crate::Tree::new) panics with the
//!   same message, because a tree with a bad order can never be used.
//! - Decoding a malformed JSON document. The document is parsed in full
//!   before the target tree is touched, so on [`Error::Json`] the tree is
//!   left exactly as it was.
//!
//! Looking up, or removing, a key that is not present is not an error. Those
//! operations return `None` or `false`.

use thiserror::Error;

/// Errors that can occur when building or decoding a tree.
#[derive(Error, Debug)]
pub enum Error {
	/// The requested order cannot form a valid B-tree.
	///
	/// An order of `m` allows up to `m` children per internal node. With fewer
	/// than three children a split would leave one of the halves empty.
	#[error("invalid tree order {order}: order must be at least {min}", min = crate::MIN_ORDER)]
	InvalidOrder {
		/// The rejected order.
		order: usize,
	},

	/// The input was not a JSON object of the expected key and value types.
	#[error("malformed JSON document: {0}")]
	Json(#[from] serde_json::Error),
}

/// A Result type alias using our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;
