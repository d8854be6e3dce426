//! Cluster extraction: a pure type partition of the positioned nodes,
//! run after layout so centroids reflect final coordinates.

use super::{Centroid, Cluster, GraphNode};
use crate::graph::style::DEFAULT_COLOR;
use std::collections::HashMap;

/// Group nodes by type, computing member list, count, centroid and a
/// representative color (first member encountered).
pub fn extract_clusters(nodes: &[GraphNode]) -> Vec<Cluster> {
    // First-encounter order keeps the legend stable across identical inputs
    let mut order: Vec<String> = Vec::new();
    let mut members: HashMap<String, Vec<usize>> = HashMap::new();

    for (i, node) in nodes.iter().enumerate() {
        let entry = members.entry(node.node_type.clone()).or_default();
        if entry.is_empty() {
            order.push(node.node_type.clone());
        }
        entry.push(i);
    }

    order
        .into_iter()
        .map(|cluster_type| {
            let indices = &members[&cluster_type];
            let count = indices.len();

            let (mut cx, mut cy, mut cz) = (0.0, 0.0, 0.0);
            for &i in indices {
                cx += nodes[i].x;
                cy += nodes[i].y;
                cz += nodes[i].z;
            }
            let n = count as f64;

            Cluster {
                cluster_type,
                nodes: indices.iter().map(|&i| nodes[i].id.clone()).collect(),
                count,
                centroid: Centroid {
                    x: cx / n,
                    y: cy / n,
                    z: cz / n,
                },
                color: indices
                    .first()
                    .map(|&i| nodes[i].color.clone())
                    .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn node(id: &str, node_type: &str, pos: (f64, f64, f64)) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            label: id.to_string(),
            node_type: node_type.to_string(),
            x: pos.0,
            y: pos.1,
            z: pos.2,
            size: 1.0,
            color: format!("#{}", node_type),
            is_virtual: false,
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_empty_input_yields_no_clusters() {
        assert!(extract_clusters(&[]).is_empty());
    }

    #[test]
    fn test_groups_by_type() {
        let nodes = vec![
            node("a", "medidores", (0.0, 0.0, 0.0)),
            node("b", "medidores", (2.0, 0.0, 0.0)),
            node("c", "remotas", (5.0, 5.0, 5.0)),
        ];
        let clusters = extract_clusters(&nodes);
        assert_eq!(clusters.len(), 2);

        let medidores = &clusters[0];
        assert_eq!(medidores.cluster_type, "medidores");
        assert_eq!(medidores.count, 2);
        assert_eq!(medidores.nodes, vec!["a", "b"]);
        assert_eq!(medidores.color, "#medidores");
    }

    #[test]
    fn test_centroid_is_member_mean() {
        let nodes = vec![
            node("a", "medidores", (0.0, 0.0, 0.0)),
            node("b", "medidores", (4.0, 2.0, -6.0)),
        ];
        let clusters = extract_clusters(&nodes);
        let centroid = clusters[0].centroid;
        assert_eq!(centroid, Centroid { x: 2.0, y: 1.0, z: -3.0 });
    }

    #[test]
    fn test_single_node_centroid_equals_position() {
        let nodes = vec![node("a", "medidores", (1.5, -2.5, 3.0))];
        let clusters = extract_clusters(&nodes);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].centroid, Centroid { x: 1.5, y: -2.5, z: 3.0 });
    }

    #[test]
    fn test_clusters_partition_nodes_exactly() {
        let nodes = vec![
            node("a", "medidores", (0.0, 0.0, 0.0)),
            node("b", "remotas", (1.0, 0.0, 0.0)),
            node("c", "medidores", (2.0, 0.0, 0.0)),
            node("d", "protocolo", (3.0, 0.0, 0.0)),
        ];
        let clusters = extract_clusters(&nodes);

        let mut seen = HashSet::new();
        let mut total = 0;
        for cluster in &clusters {
            assert_eq!(cluster.count, cluster.nodes.len());
            for id in &cluster.nodes {
                assert!(seen.insert(id.clone()), "duplicate member {}", id);
                total += 1;
            }
        }
        assert_eq!(total, nodes.len());
        for n in &nodes {
            assert!(seen.contains(&n.id));
        }
    }
}
