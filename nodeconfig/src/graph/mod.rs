//! The live node-graph.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. A slot
//! stores the id of its single child, or of the head of a sibling chain;
//! chain members point at their successor through `next`.

use std::{collections::HashSet, fmt};

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{MappingError, Result};

/// Raw field values as stored on nodes.
pub mod value;

pub use value::{FieldValue, Mismatch};

/// Index of a node in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Position in the arena.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Operations the mapping engine needs from whatever hosts the graph.
///
/// Canvas hosts implement this over their own node storage; [`NodeGraph`]
/// is the in-memory implementation.
pub trait GraphHost {
    /// Drop every node.
    fn clear(&mut self);

    /// Create an unconnected node stamped with `type_id`.
    fn create_node(&mut self, type_id: &str) -> NodeId;

    fn node_type(&self, node: NodeId) -> Option<&str>;

    fn field(&self, node: NodeId, name: &str) -> Option<&FieldValue>;

    fn set_field(&mut self, node: NodeId, name: &str, value: FieldValue) -> Result<()>;

    /// Bind `child` (a single child or a chain head) to `slot` of `parent`.
    fn connect(&mut self, parent: NodeId, slot: &str, child: NodeId) -> Result<()>;

    /// Unbind a slot, returning what was bound.
    fn disconnect(&mut self, parent: NodeId, slot: &str) -> Result<Option<NodeId>>;

    fn slot(&self, node: NodeId, slot: &str) -> Option<NodeId>;

    /// Make `next` the successor of `prev` in a sibling chain.
    fn link_next(&mut self, prev: NodeId, next: NodeId) -> Result<()>;

    fn next(&self, node: NodeId) -> Option<NodeId>;

    /// Every node stamped with `type_id`, in creation order.
    fn nodes_of_type(&self, type_id: &str) -> Vec<NodeId>;
}

/// A sibling chain walked from its head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain {
    pub nodes: Vec<NodeId>,
    /// The walk stopped because a link pointed back into the chain.
    pub looped: bool,
}

/// Follow `next` links from `head` until the terminating empty link.
pub fn walk_chain(host: &dyn GraphHost, head: Option<NodeId>) -> Chain {
    let mut chain = Chain::default();
    let mut seen = HashSet::new();
    let mut cursor = head;
    while let Some(id) = cursor {
        if !seen.insert(id) {
            chain.looped = true;
            break;
        }
        chain.nodes.push(id);
        cursor = host.next(id);
    }
    chain
}

/// One node in a [`NodeGraph`].
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: NodeId,
    /// Node type this node was created with.
    pub type_id: String,
    pub fields: IndexMap<String, FieldValue>,
    pub slots: IndexMap<String, NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<NodeId>,
}

/// In-memory arena implementation of [`GraphHost`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeGraph {
    nodes: Vec<Node>,
}

impl NodeGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node `id`, `None` when it was never created.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .ok_or(MappingError::UnknownNode(id))
    }

    fn ensure(&self, id: NodeId) -> Result<()> {
        self.node(id).map(|_| ()).ok_or(MappingError::UnknownNode(id))
    }
}

impl GraphHost for NodeGraph {
    fn clear(&mut self) {
        self.nodes.clear();
    }

    fn create_node(&mut self, type_id: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            type_id: type_id.to_string(),
            fields: IndexMap::new(),
            slots: IndexMap::new(),
            next: None,
        });
        id
    }

    fn node_type(&self, node: NodeId) -> Option<&str> {
        self.node(node).map(|n| n.type_id.as_str())
    }

    fn field(&self, node: NodeId, name: &str) -> Option<&FieldValue> {
        self.node(node).and_then(|n| n.fields.get(name))
    }

    fn set_field(&mut self, node: NodeId, name: &str, value: FieldValue) -> Result<()> {
        self.node_mut(node)?.fields.insert(name.to_string(), value);
        Ok(())
    }

    fn connect(&mut self, parent: NodeId, slot: &str, child: NodeId) -> Result<()> {
        self.ensure(child)?;
        self.node_mut(parent)?.slots.insert(slot.to_string(), child);
        Ok(())
    }

    fn disconnect(&mut self, parent: NodeId, slot: &str) -> Result<Option<NodeId>> {
        Ok(self.node_mut(parent)?.slots.shift_remove(slot))
    }

    fn slot(&self, node: NodeId, slot: &str) -> Option<NodeId> {
        self.node(node).and_then(|n| n.slots.get(slot).copied())
    }

    fn link_next(&mut self, prev: NodeId, next: NodeId) -> Result<()> {
        self.ensure(next)?;
        self.node_mut(prev)?.next = Some(next);
        Ok(())
    }

    fn next(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.next)
    }

    fn nodes_of_type(&self, type_id: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.type_id == type_id)
            .map(|n| n.id)
            .collect()
    }
}
