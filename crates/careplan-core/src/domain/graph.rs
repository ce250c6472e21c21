//! Treatment plan graph model
//!
//! Nodes and edges exactly as they are persisted. Editor wiring (change
//! callbacks, selection and drag flags, inline styles) never enters these
//! types: [`deserialize`] reads only the persisted fields and drops
//! everything else.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use crate::PlanError;

/// Neutral tone used when a node has no color
pub const DEFAULT_NODE_COLOR: &str = "#e2e8f0";

/// Fixed palette offered by the plan editor
pub const NODE_PALETTE: [&str; 6] = [
    "#ffcce6", "#cce6ff", "#ccffcc", "#ffffcc", "#e6ccff", "#ffebcc",
];

/// Value object: Node ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a node id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Value object: Edge ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    /// Create an edge id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Node kind tag. Only one kind exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Free-form annotated node
    #[default]
    Custom,
}

/// Canvas coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal offset
    pub x: f64,
    /// Vertical offset
    pub y: f64,
}

impl Position {
    /// Create a position
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Persisted, user-editable fields of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Display label
    #[serde(default)]
    pub label: String,

    /// Primary annotation
    #[serde(default)]
    pub notes: String,

    /// Secondary annotation, shown when the node is expanded
    #[serde(default)]
    pub additional_notes: String,

    /// Color token
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    DEFAULT_NODE_COLOR.to_string()
}

impl Default for NodeData {
    fn default() -> Self {
        Self {
            label: String::new(),
            notes: String::new(),
            additional_notes: String::new(),
            color: default_color(),
        }
    }
}

/// A node in a treatment plan graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique within a plan, assigned by the editor
    pub id: NodeId,

    /// Node kind
    #[serde(rename = "type", default)]
    pub kind: NodeKind,

    /// Canvas position
    #[serde(default)]
    pub position: Position,

    /// Persisted fields
    #[serde(default)]
    pub data: NodeData,
}

impl GraphNode {
    /// Create a custom node with empty annotations
    pub fn new(
        id: impl Into<NodeId>,
        label: impl Into<String>,
        color: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Custom,
            position,
            data: NodeData {
                label: label.into(),
                color: color.into(),
                ..NodeData::default()
            },
        }
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A directed link between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Unique within a plan
    pub id: EdgeId,
    /// Source node
    pub source: NodeId,
    /// Target node (arrow end)
    pub target: NodeId,
}

impl GraphEdge {
    /// Create an edge
    pub fn new(id: impl Into<EdgeId>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
        }
    }

    /// Whether the edge has `node` at either end
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }
}

impl From<String> for EdgeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Validated graph of a treatment plan
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Nodes in insertion order
    pub nodes: Vec<GraphNode>,
    /// Edges in insertion order
    pub edges: Vec<GraphEdge>,
}

impl GraphDocument {
    /// Document with no nodes and no edges
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when there are no nodes and no edges
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Look up a node
    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    /// Whether a node with `id` exists
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.iter().any(|node| &node.id == id)
    }

    /// Whether an edge with `id` exists
    pub fn contains_edge(&self, id: &EdgeId) -> bool {
        self.edges.iter().any(|edge| &edge.id == id)
    }

    /// Edges that reference a node missing from this document
    pub fn dangling_edges(&self) -> Vec<&GraphEdge> {
        let ids: HashSet<&NodeId> = self.nodes.iter().map(|node| &node.id).collect();
        self.edges
            .iter()
            .filter(|edge| !ids.contains(&edge.source) || !ids.contains(&edge.target))
            .collect()
    }
}

/// Placeholder label for the node at 1-based position `n`
pub fn placeholder_label(n: usize) -> String {
    format!("Node {}", n)
}

/// Derive an edge id from its endpoints.
///
/// Yields `e{source}-{target}`, or `e{source}-{target}-{k}` with the
/// smallest `k >= 1` for which `is_taken` is false.
pub fn derive_edge_id(
    source: &NodeId,
    target: &NodeId,
    is_taken: impl Fn(&EdgeId) -> bool,
) -> EdgeId {
    let base = format!("e{}-{}", source, target);
    let candidate = EdgeId(base.clone());
    if !is_taken(&candidate) {
        return candidate;
    }

    let mut suffix = 1usize;
    loop {
        let candidate = EdgeId(format!("{}-{}", base, suffix));
        if !is_taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Smallest `n >= len + 1` whose id is not taken
pub fn next_free_node_id(len: usize, is_taken: impl Fn(&NodeId) -> bool) -> (usize, NodeId) {
    let mut n = len + 1;
    loop {
        let candidate = NodeId(n.to_string());
        if !is_taken(&candidate) {
            return (n, candidate);
        }
        n += 1;
    }
}

/// Give every later copy of a repeated node id a fresh numeric id.
///
/// Editors that numbered nodes by count could repeat an id after a delete.
/// Edges keep pointing at the first node carrying the id. Returns how many
/// nodes were renamed.
pub fn repair_node_ids(nodes: &mut [GraphNode]) -> usize {
    let mut taken: HashSet<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
    let mut seen: HashSet<NodeId> = HashSet::with_capacity(nodes.len());
    let len = nodes.len();
    let mut renamed = 0;

    for node in nodes.iter_mut() {
        if node.id.as_str().trim().is_empty() || seen.insert(node.id.clone()) {
            continue;
        }

        let (_, fresh) = next_free_node_id(len, |id| taken.contains(id));
        debug!(from = %node.id, to = %fresh, "Renaming repeated node id");
        taken.insert(fresh.clone());
        seen.insert(fresh.clone());
        node.id = fresh;
        renamed += 1;
    }

    renamed
}

/// Validate and normalize a graph.
///
/// Node ids must be non-empty and unique. Blank labels become
/// `"Node {n}"`, blank colors become [`DEFAULT_NODE_COLOR`] and non-finite
/// coordinates become zero. Edges pointing at a missing node are dropped,
/// edges without an id get one derived from their endpoints, and later
/// edges repeating an earlier id are dropped.
pub fn validate(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Result<GraphDocument, PlanError> {
    let mut node_ids: HashSet<NodeId> = HashSet::with_capacity(nodes.len());
    let mut normalized = Vec::with_capacity(nodes.len());

    for (index, mut node) in nodes.into_iter().enumerate() {
        if node.id.as_str().trim().is_empty() {
            return Err(PlanError::MalformedDocument(format!(
                "node at index {} has an empty id",
                index
            )));
        }
        if !node_ids.insert(node.id.clone()) {
            return Err(PlanError::Validation(format!(
                "duplicate node id '{}'",
                node.id
            )));
        }

        if node.data.label.trim().is_empty() {
            node.data.label = placeholder_label(index + 1);
        }
        if node.data.color.trim().is_empty() {
            node.data.color = default_color();
        }
        if !node.position.x.is_finite() {
            node.position.x = 0.0;
        }
        if !node.position.y.is_finite() {
            node.position.y = 0.0;
        }

        normalized.push(node);
    }

    let edges: Vec<GraphEdge> = edges
        .into_iter()
        .filter(|edge| {
            let attached = node_ids.contains(&edge.source) && node_ids.contains(&edge.target);
            if !attached {
                debug!(
                    edge_id = %edge.id,
                    source = %edge.source,
                    target = %edge.target,
                    "Pruning dangling edge"
                );
            }
            attached
        })
        .collect();

    // Derived ids must not shadow an explicit id appearing later in the list
    let explicit: HashSet<EdgeId> = edges
        .iter()
        .filter(|edge| !edge.id.as_str().trim().is_empty())
        .map(|edge| edge.id.clone())
        .collect();

    let mut edge_ids: HashSet<EdgeId> = HashSet::with_capacity(edges.len());
    let mut kept = Vec::with_capacity(edges.len());

    for mut edge in edges {
        if edge.id.as_str().trim().is_empty() {
            edge.id = derive_edge_id(&edge.source, &edge.target, |id| {
                edge_ids.contains(id) || explicit.contains(id)
            });
        }

        if !edge_ids.insert(edge.id.clone()) {
            debug!(edge_id = %edge.id, "Dropping edge with duplicate id");
            continue;
        }

        kept.push(edge);
    }

    Ok(GraphDocument {
        nodes: normalized,
        edges: kept,
    })
}

/// Encode a document as two independent JSON arrays (nodes, edges)
pub fn serialize(document: &GraphDocument) -> Result<(Value, Value), PlanError> {
    let nodes = serde_json::to_value(&document.nodes)?;
    let edges = serde_json::to_value(&document.edges)?;
    Ok((nodes, edges))
}

/// Decode and validate a document from its two JSON payloads.
///
/// Tolerates missing annotations and reads a color from the legacy
/// `style.backgroundColor` slot. Anything that is not a persisted field is
/// discarded. Either payload not being an array, or a node without an id,
/// fails the whole document.
pub fn deserialize(nodes: &Value, edges: &Value) -> Result<GraphDocument, PlanError> {
    let (nodes, edges) = parse(nodes, edges)?;
    validate(nodes, edges)
}

/// Decode a document read back from storage.
///
/// Same as [`deserialize`], except repeated node ids are renamed with
/// [`repair_node_ids`] instead of failing the plan.
pub fn deserialize_stored(nodes: &Value, edges: &Value) -> Result<GraphDocument, PlanError> {
    let (mut nodes, edges) = parse(nodes, edges)?;
    repair_node_ids(&mut nodes);
    validate(nodes, edges)
}

fn parse(nodes: &Value, edges: &Value) -> Result<(Vec<GraphNode>, Vec<GraphEdge>), PlanError> {
    let raw_nodes = nodes
        .as_array()
        .ok_or_else(|| malformed("nodes payload must be an array"))?;
    let raw_edges = edges
        .as_array()
        .ok_or_else(|| malformed("edges payload must be an array"))?;

    let nodes = raw_nodes
        .iter()
        .enumerate()
        .map(|(index, value)| node_from_value(index, value))
        .collect::<Result<Vec<_>, _>>()?;

    let edges = raw_edges
        .iter()
        .enumerate()
        .map(|(index, value)| edge_from_value(index, value))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((nodes, edges))
}

fn malformed(message: impl Into<String>) -> PlanError {
    PlanError::MalformedDocument(message.into())
}

fn id_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn coordinate(object: &Map<String, Value>, key: &str) -> f64 {
    object.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn node_from_value(index: usize, value: &Value) -> Result<GraphNode, PlanError> {
    let object = value
        .as_object()
        .ok_or_else(|| malformed(format!("node at index {} is not an object", index)))?;

    let id = id_field(object, "id")
        .ok_or_else(|| malformed(format!("node at index {} is missing an id", index)))?;

    let data = object.get("data").and_then(Value::as_object);
    let style = object.get("style").and_then(Value::as_object);

    let color = data
        .and_then(|d| text_field(d, "color"))
        .filter(|c| !c.trim().is_empty())
        .or_else(|| style.and_then(|s| text_field(s, "backgroundColor")))
        .unwrap_or_default();

    let position = object
        .get("position")
        .and_then(Value::as_object)
        .map(|p| Position::new(coordinate(p, "x"), coordinate(p, "y")))
        .unwrap_or_default();

    Ok(GraphNode {
        id: NodeId(id),
        kind: NodeKind::Custom,
        position,
        data: NodeData {
            label: data.and_then(|d| text_field(d, "label")).unwrap_or_default(),
            notes: data.and_then(|d| text_field(d, "notes")).unwrap_or_default(),
            additional_notes: data
                .and_then(|d| text_field(d, "additionalNotes"))
                .unwrap_or_default(),
            color,
        },
    })
}

fn edge_from_value(index: usize, value: &Value) -> Result<GraphEdge, PlanError> {
    let object = value
        .as_object()
        .ok_or_else(|| malformed(format!("edge at index {} is not an object", index)))?;

    let source = id_field(object, "source")
        .ok_or_else(|| malformed(format!("edge at index {} is missing a source", index)))?;
    let target = id_field(object, "target")
        .ok_or_else(|| malformed(format!("edge at index {} is missing a target", index)))?;

    Ok(GraphEdge {
        id: EdgeId(id_field(object, "id").unwrap_or_default()),
        source: NodeId(source),
        target: NodeId(target),
    })
}
