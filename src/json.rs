//! JSON import and export.
//!
//! A tree serializes as a single map from key to value, in key order:
//!
//! ```text
//! {"apple": 3, "banana": 7, "cherry": 1}
//! ```
//!
//! serde_json renders string keys as-is and integer keys as decimal strings.
//! The node layout is not part of the format. A decoded tree is rebuilt by
//! plain insertion, so its shape depends only on the order it is decoded into.

use serde::de::{Deserialize, DeserializeOwned, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

use crate::compare::Comparator;
use crate::error::Result;
use crate::{Natural, Tree, DEFAULT_ORDER};

impl<K: Serialize, V: Serialize, C> Serialize for Tree<K, V, C> {
	fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		serializer.collect_map(self.iter())
	}
}

/// Upper bound on the entries reserved up front from a format's length hint.
const MAX_PREALLOCATED_ENTRIES: usize = 4096;

/// The entries of a JSON object in document order, duplicates included.
struct EntryList<K, V>(Vec<(K, V)>);

struct EntryListVisitor<K, V>(PhantomData<(K, V)>);

impl<'de, K: Deserialize<'de>, V: Deserialize<'de>> Visitor<'de> for EntryListVisitor<K, V> {
	type Value = EntryList<K, V>;

	fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("a map of keys to values")
	}

	fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
		// Length prefixes of binary formats are untrusted input
		let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0).min(MAX_PREALLOCATED_ENTRIES));
		while let Some(entry) = map.next_entry()? {
			entries.push(entry);
		}
		Ok(EntryList(entries))
	}
}

impl<'de, K: Deserialize<'de>, V: Deserialize<'de>> Deserialize<'de> for EntryList<K, V> {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
		deserializer.deserialize_map(EntryListVisitor(PhantomData))
	}
}

/// Decodes into a tree of [`DEFAULT_ORDER`] ordered by [`Natural`]. When a
/// key appears more than once the last value wins.
impl<'de, K, V> Deserialize<'de> for Tree<K, V, Natural>
where
	K: Ord + Deserialize<'de>,
	V: Deserialize<'de>,
{
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
		let EntryList(entries) = EntryList::deserialize(deserializer)?;

		tracing::trace!(target: "arbor::json", entries = entries.len(), "decoded tree");

		let mut tree = Tree::new(DEFAULT_ORDER);
		tree.extend(entries);
		Ok(tree)
	}
}

impl<K: Serialize, V: Serialize, C> Tree<K, V, C> {
	/// Encodes the tree as a JSON object.
	///
	/// # Example
	///
	/// ```
	/// use arbor::Tree;
	///
	/// let mut tree = Tree::new(3);
	/// tree.insert("b", 2);
	/// tree.insert("a", 1);
	/// assert_eq!(tree.to_json().unwrap(), r#"{"a":1,"b":2}"#);
	/// ```
	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string(self)?)
	}
}

impl<K: DeserializeOwned, V: DeserializeOwned, C: Comparator<K>> Tree<K, V, C> {
	/// Replaces the contents of this tree with the entries of a JSON object.
	///
	/// The order and comparator are kept. The document is decoded in full
	/// before the tree is touched, so on error the tree is unchanged.
	pub fn load_json(&mut self, json: &str) -> Result<()> {
		let EntryList(entries) = serde_json::from_str(json)?;

		tracing::trace!(target: "arbor::json", entries = entries.len(), "loading tree from JSON");

		self.clear();
		self.extend(entries);
		Ok(())
	}
}

impl<K: Ord + DeserializeOwned, V: DeserializeOwned> Tree<K, V, Natural> {
	/// Decodes a JSON object into a new tree of [`DEFAULT_ORDER`].
	///
	/// ```
	/// use arbor::Tree;
	///
	/// let tree: Tree<u32, String> = Tree::from_json(r#"{"2": "two", "1": "one"}"#).unwrap();
	/// assert_eq!(tree.keys().copied().collect::<Vec<_>>(), [1, 2]);
	/// ```
	pub fn from_json(json: &str) -> Result<Self> {
		Ok(serde_json::from_str(json)?)
	}
}
