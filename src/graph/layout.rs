//! Force-directed 3D layout: inverse-square repulsion between all node
//! pairs, linear spring attraction along edges, damped Euler integration
//! over a fixed number of passes.
//!
//! Pairwise repulsion is O(n²) per pass, which is fine for the hundreds
//! of nodes a product ecosystem produces. Larger graphs would need a
//! spatial-partitioning variant behind this same function.

use super::{GraphEdge, GraphNode};
use crate::config::LayoutConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Guard added to every distance so coincident nodes never divide by zero.
const EPSILON: f64 = 0.01;

/// Simulation parameters. See [`LayoutConfig`] for the tunable defaults.
#[derive(Debug, Clone)]
pub struct LayoutParams {
    pub iterations: usize,
    pub repulsion: f64,
    pub attraction: f64,
    pub damping: f64,
    pub init_extent: f64,
    pub seed: Option<u64>,
}

impl From<&LayoutConfig> for LayoutParams {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            iterations: config.iterations,
            repulsion: config.repulsion,
            attraction: config.attraction,
            damping: config.damping,
            init_extent: config.init_extent,
            seed: config.seed,
        }
    }
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self::from(&LayoutConfig::default())
    }
}

/// Assign every node a position by iterative physical simulation.
/// Positions are mutated in place; edges are treated as undirected.
///
/// Unseeded runs place nodes at fresh random positions each call, so two
/// builds of the same graph differ in coordinates but not in structure.
pub fn run_layout(nodes: &mut [GraphNode], edges: &[GraphEdge], params: &LayoutParams) {
    if nodes.is_empty() {
        return;
    }

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let extent = params.init_extent;
    for node in nodes.iter_mut() {
        node.x = rng.gen_range(-extent..=extent);
        node.y = rng.gen_range(-extent..=extent);
        node.z = rng.gen_range(-extent..=extent);
    }

    let index: HashMap<String, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.clone(), i))
        .collect();

    for _ in 0..params.iterations {
        let mut forces = vec![[0.0f64; 3]; nodes.len()];

        // Coulomb-like repulsion between every unordered pair
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let (dx, dy, dz) = displacement(&nodes[i], &nodes[j]);
                let dist = (dx * dx + dy * dy + dz * dz).sqrt() + EPSILON;
                let force = params.repulsion / (dist * dist);

                let fx = (dx / dist) * force;
                let fy = (dy / dist) * force;
                let fz = (dz / dist) * force;

                forces[i][0] -= fx;
                forces[i][1] -= fy;
                forces[i][2] -= fz;
                forces[j][0] += fx;
                forces[j][1] += fy;
                forces[j][2] += fz;
            }
        }

        // Hooke-like spring attraction along edges
        for edge in edges {
            let (Some(&i), Some(&j)) = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            ) else {
                continue;
            };
            if i == j {
                continue;
            }

            let (dx, dy, dz) = displacement(&nodes[i], &nodes[j]);
            let dist = (dx * dx + dy * dy + dz * dz).sqrt() + EPSILON;
            let force = params.attraction * dist;

            let fx = (dx / dist) * force;
            let fy = (dy / dist) * force;
            let fz = (dz / dist) * force;

            forces[i][0] += fx;
            forces[i][1] += fy;
            forces[i][2] += fz;
            forces[j][0] -= fx;
            forces[j][1] -= fy;
            forces[j][2] -= fz;
        }

        // Damped Euler step; per-pass forces are not carried over
        for (node, force) in nodes.iter_mut().zip(&forces) {
            node.x += force[0] * params.damping;
            node.y += force[1] * params.damping;
            node.z += force[2] * params.damping;
        }
    }
}

fn displacement(a: &GraphNode, b: &GraphNode) -> (f64, f64, f64) {
    (b.x - a.x, b.y - a.y, b.z - a.z)
}
