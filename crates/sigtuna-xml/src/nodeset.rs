#![forbid(unsafe_code)]

//! NodeSet type for XML canonicalization.
//!
//! A `NodeSet` is the document subset a Reference or SignedInfo selects,
//! identified by `NodeId`. Only the operations same-document references need
//! are supported: a subtree without comments, minus another subtree.

use roxmltree::{Node, NodeId};
use std::collections::HashSet;

/// A set of XML document nodes identified by `NodeId`.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: HashSet<NodeId>,
}

impl NodeSet {
    /// The subtree rooted at `root`, without comment nodes.
    ///
    /// This is what a `#id` reference selects.
    pub fn tree_without_comments(root: Node<'_, '_>) -> Self {
        let mut nodes = HashSet::new();
        collect_subtree(root, &mut nodes);
        Self { nodes }
    }

    /// Remove `root` and all of its descendants (enveloped-signature transform).
    pub fn remove_subtree(&mut self, root: Node<'_, '_>) {
        for n in root.descendants() {
            self.nodes.remove(&n.id());
        }
    }

    /// Check if a node is in this set.
    pub fn contains(&self, node: Node<'_, '_>) -> bool {
        self.nodes.contains(&node.id())
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

fn collect_subtree(root: Node<'_, '_>, nodes: &mut HashSet<NodeId>) {
    for n in root.descendants() {
        if !n.is_comment() {
            nodes.insert(n.id());
        }
    }
}
