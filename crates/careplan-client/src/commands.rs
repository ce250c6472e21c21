//! Graph mutation commands
//!
//! Every command maps a snapshot and its arguments to a new snapshot and
//! never touches the input. Commands naming a node or edge that does not
//! exist return an unchanged copy.

use careplan_core::domain::graph::{self, derive_edge_id, placeholder_label};
use careplan_core::{
    EdgeId, GraphDocument, GraphEdge, GraphNode, NodeId, Position, DEFAULT_NODE_COLOR,
};
use rand::Rng;

/// Side of the square new nodes are scattered over
pub const PLACEMENT_EXTENT: f64 = 400.0;

/// Random position in `[0, PLACEMENT_EXTENT)` on both axes
pub fn random_position() -> Position {
    let mut rng = rand::thread_rng();
    Position::new(
        rng.gen_range(0.0..PLACEMENT_EXTENT),
        rng.gen_range(0.0..PLACEMENT_EXTENT),
    )
}

/// Id for the next node: the smallest `n >= len + 1` not already in use
pub fn next_node_id(doc: &GraphDocument) -> (usize, NodeId) {
    graph::next_free_node_id(doc.nodes.len(), |id| doc.contains_node(id))
}

/// Append a node with empty notes
pub fn add_node(doc: &GraphDocument, label: &str, color: &str, position: Position) -> GraphDocument {
    let (n, id) = next_node_id(doc);
    let label = if label.trim().is_empty() {
        placeholder_label(n)
    } else {
        label.to_string()
    };
    let color = if color.trim().is_empty() {
        DEFAULT_NODE_COLOR
    } else {
        color
    };

    let mut next = doc.clone();
    next.nodes.push(GraphNode::new(id, label, color, position));
    next
}

/// Remove a node together with every edge touching it
pub fn delete_node(doc: &GraphDocument, id: &NodeId) -> GraphDocument {
    GraphDocument {
        nodes: doc.nodes.iter().filter(|node| &node.id != id).cloned().collect(),
        edges: doc.edges.iter().filter(|edge| !edge.touches(id)).cloned().collect(),
    }
}

fn update_node(doc: &GraphDocument, id: &NodeId, change: impl FnOnce(&mut GraphNode)) -> GraphDocument {
    let mut next = doc.clone();
    if let Some(node) = next.nodes.iter_mut().find(|node| &node.id == id) {
        change(node);
    }
    next
}

/// Replace a node's label
pub fn rename_node(doc: &GraphDocument, id: &NodeId, label: &str) -> GraphDocument {
    update_node(doc, id, |node| node.data.label = label.to_string())
}

/// Replace a node's primary notes
pub fn set_notes(doc: &GraphDocument, id: &NodeId, notes: &str) -> GraphDocument {
    update_node(doc, id, |node| node.data.notes = notes.to_string())
}

/// Replace a node's secondary notes
pub fn set_additional_notes(doc: &GraphDocument, id: &NodeId, notes: &str) -> GraphDocument {
    update_node(doc, id, |node| node.data.additional_notes = notes.to_string())
}

/// Replace a node's color
pub fn set_color(doc: &GraphDocument, id: &NodeId, color: &str) -> GraphDocument {
    update_node(doc, id, |node| node.data.color = color.to_string())
}

/// Move a node
pub fn move_node(doc: &GraphDocument, id: &NodeId, position: Position) -> GraphDocument {
    update_node(doc, id, |node| node.position = position)
}

/// Link `source` to `target`.
///
/// No-op unless both nodes exist and the directed pair is not linked yet.
/// Self-links are allowed.
pub fn connect(doc: &GraphDocument, source: &NodeId, target: &NodeId) -> GraphDocument {
    let linked = doc
        .edges
        .iter()
        .any(|edge| &edge.source == source && &edge.target == target);

    if linked || !doc.contains_node(source) || !doc.contains_node(target) {
        return doc.clone();
    }

    let id = derive_edge_id(source, target, |id| doc.contains_edge(id));
    let mut next = doc.clone();
    next.edges.push(GraphEdge::new(id, source.clone(), target.clone()));
    next
}

/// Remove an edge
pub fn disconnect(doc: &GraphDocument, id: &EdgeId) -> GraphDocument {
    GraphDocument {
        nodes: doc.nodes.clone(),
        edges: doc.edges.iter().filter(|edge| &edge.id != id).cloned().collect(),
    }
}

/// A single user edit
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddNode {
        label: String,
        color: String,
        position: Position,
    },
    DeleteNode(NodeId),
    RenameNode { id: NodeId, label: String },
    SetNotes { id: NodeId, notes: String },
    SetAdditionalNotes { id: NodeId, notes: String },
    SetColor { id: NodeId, color: String },
    MoveNode { id: NodeId, position: Position },
    Connect { source: NodeId, target: NodeId },
    Disconnect(EdgeId),
}

impl Command {
    /// Add a node at a random position
    pub fn add_node(label: impl Into<String>, color: impl Into<String>) -> Self {
        Command::AddNode {
            label: label.into(),
            color: color.into(),
            position: random_position(),
        }
    }

    /// Connect two nodes
    pub fn connect(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Command::Connect {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::AddNode { .. } => "add_node",
            Command::DeleteNode(_) => "delete_node",
            Command::RenameNode { .. } => "rename_node",
            Command::SetNotes { .. } => "set_notes",
            Command::SetAdditionalNotes { .. } => "set_additional_notes",
            Command::SetColor { .. } => "set_color",
            Command::MoveNode { .. } => "move_node",
            Command::Connect { .. } => "connect",
            Command::Disconnect(_) => "disconnect",
        }
    }

    /// Snapshot after this command
    pub fn apply(&self, doc: &GraphDocument) -> GraphDocument {
        match self {
            Command::AddNode {
                label,
                color,
                position,
            } => add_node(doc, label, color, *position),
            Command::DeleteNode(id) => delete_node(doc, id),
            Command::RenameNode { id, label } => rename_node(doc, id, label),
            Command::SetNotes { id, notes } => set_notes(doc, id, notes),
            Command::SetAdditionalNotes { id, notes } => set_additional_notes(doc, id, notes),
            Command::SetColor { id, color } => set_color(doc, id, color),
            Command::MoveNode { id, position } => move_node(doc, id, *position),
            Command::Connect { source, target } => connect(doc, source, target),
            Command::Disconnect(id) => disconnect(doc, id),
        }
    }
}
