//! Node/edge synthesis: one node per product, one edge per relationship
//! target, plus virtual nodes for targets that are not products.

use super::style::{self, VirtualRule};
use super::{GraphEdge, GraphNode};
use crate::store::ProductRecord;
use serde_json::Value;
use std::collections::BTreeMap;

/// Category tag for products without categories.
pub const DEFAULT_PRODUCT_TYPE: &str = "produto";

/// Size of synthesized virtual nodes.
const VIRTUAL_NODE_SIZE: f64 = 0.7;

/// Convert product records into the node map and edge list.
///
/// Guarantees that every edge endpoint resolves to a key of the returned
/// map: any target without a product gets a virtual node, typed through
/// the rule table. The layout engine depends on this closure.
pub fn synthesize(
    products: &[ProductRecord],
    rules: &[VirtualRule],
    size_step: f64,
) -> (BTreeMap<String, GraphNode>, Vec<GraphEdge>) {
    let mut nodes = BTreeMap::new();
    let mut edges = Vec::new();

    for product in products {
        nodes.insert(product.sku.clone(), product_node(product, size_step));

        for (relationship_type, targets) in &product.relationships {
            for target in targets {
                edges.push(GraphEdge {
                    source: product.sku.clone(),
                    target: target.clone(),
                    relationship_type: relationship_type.clone(),
                    strength: 1.0,
                });
            }
        }
    }

    for edge in &edges {
        if !nodes.contains_key(&edge.target) {
            let node = virtual_node(&edge.target, &edge.relationship_type, rules);
            nodes.insert(edge.target.clone(), node);
        }
    }

    (nodes, edges)
}

fn product_node(product: &ProductRecord, size_step: f64) -> GraphNode {
    let node_type = product
        .categories
        .first()
        .cloned()
        .unwrap_or_else(|| DEFAULT_PRODUCT_TYPE.to_string());

    let relationship_count = product.relationship_count();

    let mut metadata = product.attributes.clone();
    metadata.insert(
        "relationship_count".to_string(),
        Value::from(relationship_count),
    );

    GraphNode {
        id: product.sku.clone(),
        label: product.sku.clone(),
        color: style::product_color(&node_type).to_string(),
        node_type,
        x: 0.0,
        y: 0.0,
        z: 0.0,
        // More connected products render larger
        size: 1.0 + size_step * relationship_count as f64,
        is_virtual: false,
        metadata,
    }
}

/// Placeholder node for a relationship target with no product record.
pub fn virtual_node(target_id: &str, relationship_type: &str, rules: &[VirtualRule]) -> GraphNode {
    let (node_type, color) = style::resolve_virtual_type(rules, target_id, relationship_type);

    GraphNode {
        id: target_id.to_string(),
        label: display_label(target_id),
        node_type: node_type.to_string(),
        x: 0.0,
        y: 0.0,
        z: 0.0,
        size: VIRTUAL_NODE_SIZE,
        color: color.to_string(),
        is_virtual: true,
        metadata: serde_json::Map::new(),
    }
}

/// `mdc_gateway` -> `MDC GATEWAY`
pub fn display_label(id: &str) -> String {
    id.replace('_', " ").to_uppercase()
}
