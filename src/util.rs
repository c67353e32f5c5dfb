//! Test utilities for building exact tree shapes from JSON fixtures.
//!
//! Inserting keys only ever produces the shapes the split policy creates, so
//! tests that need a specific arrangement (a sibling with a spare entry, a
//! chain of minimal nodes) describe the nodes directly:
//!
//! ```text
//! { "order": 3, "root": { "keys": [3], "children": [{ "keys": [1, 2] }, { "keys": [4] }] } }
//! ```
//!
//! Every value is its key times ten.
use serde::Deserialize;

use crate::arena::{Arena, NodeId};
use crate::node::Node;
use crate::Tree;

#[derive(Deserialize, Debug)]
struct FixtureNode {
	keys: Vec<i32>,
	#[serde(default)]
	children: Vec<FixtureNode>,
}

#[derive(Deserialize, Debug)]
struct Fixture {
	order: usize,
	root: Option<FixtureNode>,
}

/// Allocates `fixture` and its subtree, returning the node handle, the
/// subtree height and its entry count.
fn translate_node(
	nodes: &mut Arena<Node<i32, i32>>,
	fixture: FixtureNode,
	parent: Option<NodeId>,
) -> (NodeId, usize, usize) {
	let mut node = Node::leaf(parent);
	for (pos, key) in fixture.keys.iter().enumerate() {
		node.insert_at(pos, *key, key * 10);
	}
	let mut len = node.len();
	let id = nodes.alloc(node);

	let mut height = 0;
	for child in fixture.children {
		let (child_id, child_height, child_len) = translate_node(nodes, child, Some(id));
		nodes[id].children.push(child_id);
		height = child_height;
		len += child_len;
	}

	(id, height + 1, len)
}

/// Builds a tree with exactly the node layout described by `json`.
///
/// The layout is taken as given. Call
/// [`Tree::assert_invariants`] to check it is a valid B-tree.
pub fn sample_tree(json: &str) -> Tree<i32, i32> {
	let fixture: Fixture = serde_json::from_str(json).expect("malformed tree fixture");

	let mut nodes = Arena::new();
	let (root, height, len) = match fixture.root {
		Some(root) => {
			let (id, height, len) = translate_node(&mut nodes, root, None);
			(Some(id), height, len)
		}
		None => (None, 0, 0),
	};

	Tree {
		nodes,
		root,
		order: fixture.order,
		len,
		height,
		cmp: crate::Natural,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn loads_nested_fixture() {
		let tree = sample_tree(
			r#"{
				"order": 4,
				"root": {"keys": [5], "children": [{"keys": [1, 2]}, {"keys": [7, 8, 9]}]}
			}"#,
		);
		tree.assert_invariants();

		assert_eq!(tree.len(), 6);
		assert_eq!(tree.height(), 2);
		assert_eq!(tree.get(&8), Some(&80));
	}

	#[test]
	fn loads_empty_fixture() {
		let tree = sample_tree(r#"{"order": 3, "root": null}"#);
		tree.assert_invariants();
		assert!(tree.is_empty());
	}
}
