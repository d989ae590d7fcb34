//! Initial tour construction.
//!
//! Every population-based solver (and the local searches, with a population of
//! one) seeds itself through an [`Initializer`] chosen at construction time.

use std::fmt;
use std::str::FromStr;

use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::graph::Graph;

/// Strategy used to build initial tours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Initializer {
    /// Uniformly random permutation.
    #[default]
    Random,
    /// Greedy nearest neighbor from a uniformly random start.
    NearestNeighbor,
}

impl Initializer {
    /// Build `count` independent tours over every vertex of `graph`.
    pub fn construct_initial_population(
        &self,
        graph: &Graph,
        count: usize,
        rng: &mut ChaCha8Rng,
    ) -> Vec<Vec<usize>> {
        if graph.is_empty() {
            return vec![Vec::new(); count];
        }
        (0..count)
            .map(|_| match self {
                Initializer::Random => random_tour(graph, rng),
                Initializer::NearestNeighbor => {
                    let start = rng.gen_range(0..graph.len());
                    nearest_neighbor_tour(graph, start)
                }
            })
            .collect()
    }

    pub fn name(&self) -> &str {
        match self {
            Initializer::Random => "random",
            Initializer::NearestNeighbor => "nearest-neighbor",
        }
    }
}

impl fmt::Display for Initializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Initializer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(Initializer::Random),
            "nearest" | "nearest-neighbor" | "nearest_neighbor" | "nn" => Ok(Initializer::NearestNeighbor),
            other => Err(format!("unknown initializer '{other}' (expected random or nearest-neighbor)")),
        }
    }
}

pub fn random_tour(graph: &Graph, rng: &mut ChaCha8Rng) -> Vec<usize> {
    let mut tour: Vec<usize> = graph.vertex_indices().collect();
    tour.shuffle(rng);
    tour
}

/// Repeatedly append the cheapest unvisited vertex; ties go to the lowest position.
pub fn nearest_neighbor_tour(graph: &Graph, start: usize) -> Vec<usize> {
    let n = graph.len();
    let mut tour = Vec::with_capacity(n);
    let mut visited = vec![false; n];

    tour.push(start);
    visited[start] = true;
    let mut current = start;

    while tour.len() < n {
        let next = (0..n)
            .filter(|&v| !visited[v])
            .min_by_key(|&v| OrderedFloat(graph.cost(current, v)));

        match next {
            Some(v) => {
                tour.push(v);
                visited[v] = true;
                current = v;
            }
            None => break,
        }
    }

    tour
}
