//! Graph facade: orchestrates classification output, synthesis, layout
//! and clustering into one build, plus the single-node detail lookup.

use super::layout::{run_layout, LayoutParams};
use super::style::VirtualRule;
use super::{cluster, synthesize, GraphPayload, GraphStats};
use crate::config::Config;
use crate::error::{EcographError, Result};
use crate::store::{ProductRecord, ProductStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Full product view returned for real nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetails {
    pub id: String,
    pub sku: String,
    pub title: String,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub status: String,
    pub attributes: serde_json::Map<String, Value>,
    pub relationships: BTreeMap<String, Vec<String>>,
    pub categories: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Minimal descriptor for ids that are not products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualStub {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
}

/// Detail lookup result. Absence of a product is a normal outcome, so the
/// two shapes share one payload type instead of signaling an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeDetails {
    Product(Box<ProductDetails>),
    Virtual(VirtualStub),
}

/// Builds the complete ecosystem graph from the product store.
#[derive(Clone)]
pub struct GraphBuilder {
    store: ProductStore,
    layout: LayoutParams,
    virtual_rules: Vec<VirtualRule>,
    size_step: f64,
}

impl GraphBuilder {
    pub fn new(store: ProductStore, config: &Config) -> Self {
        Self {
            store,
            layout: LayoutParams::from(&config.layout),
            virtual_rules: super::style::default_virtual_rules(),
            size_step: config.classifier.size_step,
        }
    }

    /// Replace the virtual-node typing table.
    pub fn with_virtual_rules(mut self, rules: Vec<VirtualRule>) -> Self {
        self.virtual_rules = rules;
        self
    }

    /// Build the complete graph from the current active products.
    ///
    /// Structurally idempotent; coordinates differ per call unless a layout
    /// seed is configured. The O(n²) simulation runs on a blocking task so
    /// it never stalls the request executor.
    pub async fn build_complete_graph(&self) -> Result<GraphPayload> {
        log::info!("[GRAPH] Building complete graph structure");

        let products = self.store.find_active().await?;
        log::info!("[GRAPH] Found {} active products", products.len());

        let rules = self.virtual_rules.clone();
        let layout = self.layout.clone();
        let size_step = self.size_step;

        let payload = tokio::task::spawn_blocking(move || {
            build_graph_blocking(&products, &rules, size_step, &layout)
        })
        .await
        .map_err(|e| EcographError::Config(format!("Graph build task panicked: {}", e)))?;

        log::info!(
            "[GRAPH] Built graph: {} nodes, {} edges, {} clusters",
            payload.stats.total_nodes,
            payload.stats.total_edges,
            payload.stats.total_clusters
        );
        Ok(payload)
    }

    /// Detailed view of one node. Unknown ids yield a virtual stub, never
    /// an error; only store failures propagate.
    pub async fn node_details(&self, node_id: &str) -> Result<NodeDetails> {
        log::debug!("[GRAPH] Getting node details for: {}", node_id);

        match self.store.find_by_sku(node_id).await? {
            Some(product) => Ok(NodeDetails::Product(Box::new(product_details(product)))),
            None => {
                log::debug!("[GRAPH] Node {} is virtual (not a product)", node_id);
                Ok(NodeDetails::Virtual(VirtualStub {
                    id: node_id.to_string(),
                    node_type: "virtual".to_string(),
                    label: synthesize::display_label(node_id),
                }))
            }
        }
    }
}

/// Synchronous build pipeline: synthesize, lay out, cluster.
fn build_graph_blocking(
    products: &[ProductRecord],
    rules: &[VirtualRule],
    size_step: f64,
    layout: &LayoutParams,
) -> GraphPayload {
    let (node_map, edges) = synthesize::synthesize(products, rules, size_step);

    let mut nodes: Vec<_> = node_map.into_values().collect();
    run_layout(&mut nodes, &edges, layout);

    let clusters = cluster::extract_clusters(&nodes);

    let stats = GraphStats {
        total_nodes: nodes.len(),
        total_edges: edges.len(),
        total_clusters: clusters.len(),
    };

    GraphPayload {
        nodes,
        edges,
        clusters,
        stats,
    }
}

fn product_details(product: ProductRecord) -> ProductDetails {
    ProductDetails {
        id: product.sku.clone(),
        sku: product.sku,
        title: product.title,
        product_type: product.product_type,
        status: product.status,
        attributes: product.attributes,
        relationships: product.relationships,
        categories: product.categories,
        updated_at: product.updated_at,
    }
}
