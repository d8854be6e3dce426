//! Ecosystem graph engine: classification, node/edge synthesis, 3D
//! force-directed layout and type clustering.
//!
//! One build is a self-contained computation: fetch active products,
//! synthesize nodes and edges (virtual nodes for unresolved targets),
//! simulate positions, partition into clusters. Nothing is retained
//! between builds.

pub mod classify;
pub mod cluster;
pub mod layout;
pub mod style;
pub mod synthesize;

mod builder;

pub use builder::{GraphBuilder, NodeDetails, ProductDetails, VirtualStub};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A positioned graph node. Real nodes mirror a product (id = SKU);
/// virtual nodes stand in for relationship targets with no product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub size: f64,
    /// Hex color keyed by type, `#95a5a6` for unknown types.
    pub color: String,
    pub is_virtual: bool,
    /// Product attributes plus `relationship_count`; empty for virtual nodes.
    pub metadata: serde_json::Map<String, Value>,
}

/// A directed relationship edge. The layout treats it as undirected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relationship_type: String,
    /// Constant 1.0 today; reserved for future weighting.
    pub strength: f64,
}

/// Mean position of a cluster's members.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Post-layout grouping of nodes sharing one type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(rename = "type")]
    pub cluster_type: String,
    pub nodes: Vec<String>,
    pub count: usize,
    pub centroid: Centroid,
    /// Representative color, taken from the first member.
    pub color: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_clusters: usize,
}

/// Complete graph structure, ready for the 3D frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphPayload {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub clusters: Vec<Cluster>,
    pub stats: GraphStats,
}

impl GraphNode {
    pub fn position(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }
}
