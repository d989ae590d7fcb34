//! Complete weighted graph used by every solver.
//!
//! A graph is built once, either as a random Euclidean instance, from an explicit
//! vertex list, or from a symmetric cost matrix. Topology and costs never change
//! afterwards; only the per-edge pheromone scalar mutates, and only during an
//! ant colony run on a graph that run owns.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TspError};

/// A vertex of the graph. Equality and ordering only look at the id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Vertex {
    pub id: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl Vertex {
    pub fn new(id: usize, x: f64, y: f64) -> Self {
        Vertex { id, x: Some(x), y: Some(y) }
    }

    /// A vertex without planar coordinates (costs come from a matrix).
    pub fn unplaced(id: usize) -> Self {
        Vertex { id, x: None, y: None }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Vertex {}

impl PartialOrd for Vertex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Vertex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

/// Directed edge between two vertex positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub origin: usize,
    pub destination: usize,
    pub cost: f64,
    /// Only read and written by the ant colony solver.
    pub pheromone: f64,
}

/// On-disk layout. `costs` is only present when some vertex has no coordinates.
#[derive(Debug, Serialize, Deserialize)]
struct GraphFile {
    vertices: Vec<Vertex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    costs: Option<Vec<Vec<f64>>>,
}

/// Complete directed graph with symmetric costs.
///
/// Vertices are stored sorted by id and tours refer to them by position
/// (`0..len()`), not by id.
#[derive(Debug, Clone)]
pub struct Graph {
    vertices: Vec<Vertex>,
    /// Row-major `n * n` lookup, `None` on the diagonal.
    edges: Vec<Option<Edge>>,
}

impl Graph {
    /// Random Euclidean instance: `n` distinct integer points in `[0, 2n]^2`.
    pub fn random(n: usize, seed: u64) -> Result<Self> {
        if n == 0 {
            return Err(TspError::InvalidGraph("a graph needs at least one vertex".into()));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let upper = 2 * n as i64;
        let mut used: HashSet<(i64, i64)> = HashSet::with_capacity(n);
        let mut vertices = Vec::with_capacity(n);

        for id in 0..n {
            let (x, y) = loop {
                let candidate = (rng.gen_range(0..=upper), rng.gen_range(0..=upper));
                if used.insert(candidate) {
                    break candidate;
                }
            };
            vertices.push(Vertex::new(id, x as f64, y as f64));
        }

        Self::from_vertices(vertices)
    }

    /// Build the complete Euclidean graph over an explicit vertex list.
    pub fn from_vertices(mut vertices: Vec<Vertex>) -> Result<Self> {
        Self::validate_ids(&mut vertices)?;

        let mut points = Vec::with_capacity(vertices.len());
        for v in &vertices {
            match v.coordinates() {
                Some((x, y)) if x.is_finite() && y.is_finite() => points.push((x, y)),
                Some(_) => {
                    return Err(TspError::InvalidGraph(format!(
                        "vertex {} has non-finite coordinates",
                        v.id
                    )))
                }
                None => {
                    return Err(TspError::InvalidGraph(format!(
                        "vertex {} has no coordinates and no cost matrix was given",
                        v.id
                    )))
                }
            }
        }

        let n = vertices.len();
        let mut edges = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    edges.push(None);
                } else {
                    // Computed from the unordered pair so cost(i, j) == cost(j, i) bit for bit.
                    let (a, b) = if i < j { (i, j) } else { (j, i) };
                    let cost = euclidean(points[a], points[b]);
                    edges.push(Some(Edge { origin: i, destination: j, cost, pheromone: 0.0 }));
                }
            }
        }

        Ok(Graph { vertices, edges })
    }

    /// Build a graph from an explicit symmetric cost matrix; vertices get ids `0..n`.
    pub fn from_cost_matrix(costs: &[Vec<f64>]) -> Result<Self> {
        let vertices = (0..costs.len()).map(Vertex::unplaced).collect();
        Self::with_costs(vertices, costs)
    }

    fn with_costs(mut vertices: Vec<Vertex>, costs: &[Vec<f64>]) -> Result<Self> {
        // Matrix rows follow the file order, so remember it before sorting by id.
        let order: Vec<usize> = vertices.iter().map(|v| v.id).collect();
        Self::validate_ids(&mut vertices)?;

        let n = vertices.len();
        if costs.len() != n || costs.iter().any(|row| row.len() != n) {
            return Err(TspError::InvalidGraph(format!(
                "cost matrix must be {n}x{n}"
            )));
        }

        let row_of: Vec<usize> = vertices
            .iter()
            .map(|v| order.iter().position(|&id| id == v.id).unwrap_or(0))
            .collect();

        let mut edges = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    edges.push(None);
                    continue;
                }
                let cost = costs[row_of[i]][row_of[j]];
                let back = costs[row_of[j]][row_of[i]];
                if !cost.is_finite() || cost < 0.0 {
                    return Err(TspError::InvalidGraph(format!(
                        "cost {} -> {} must be finite and non-negative",
                        vertices[i].id, vertices[j].id
                    )));
                }
                if cost != back {
                    return Err(TspError::InvalidGraph(format!(
                        "cost matrix is not symmetric between {} and {}",
                        vertices[i].id, vertices[j].id
                    )));
                }
                edges.push(Some(Edge { origin: i, destination: j, cost, pheromone: 0.0 }));
            }
        }

        Ok(Graph { vertices, edges })
    }

    fn validate_ids(vertices: &mut [Vertex]) -> Result<()> {
        if vertices.is_empty() {
            return Err(TspError::InvalidGraph("a graph needs at least one vertex".into()));
        }
        vertices.sort();
        if let Some(pair) = vertices.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(TspError::InvalidGraph(format!("duplicate vertex id {}", pair[0].id)));
        }
        Ok(())
    }

    /// Load a graph from `{"vertices": [{"id", "x", "y"}, ...], "costs": [[...]]?}`.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let file: GraphFile = serde_json::from_reader(reader)?;
        match file.costs {
            Some(costs) => Self::with_costs(file.vertices, &costs),
            None => Self::from_vertices(file.vertices),
        }
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let placed = self.vertices.iter().all(|v| v.coordinates().is_some());
        let file = GraphFile {
            vertices: self.vertices.clone(),
            costs: if placed { None } else { Some(self.distance_matrix()) },
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &file)?;
        Ok(())
    }

    /// Number of vertices (always at least one).
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex(&self, index: usize) -> &Vertex {
        &self.vertices[index]
    }

    /// Positions `0..len()`, in id order.
    pub fn vertex_indices(&self) -> std::ops::Range<usize> {
        0..self.vertices.len()
    }

    /// Iterate over every directed edge.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().flatten()
    }

    /// Directed edge lookup.
    ///
    /// # Panics
    /// If `u == v` or either position is out of range: the graph is complete,
    /// so asking for any other pair is a programming error.
    #[inline]
    pub fn edge(&self, u: usize, v: usize) -> &Edge {
        let n = self.len();
        if u < n && v < n {
            if let Some(edge) = &self.edges[u * n + v] {
                return edge;
            }
        }
        panic!("no edge {u} -> {v} in a graph of {n} vertices")
    }

    #[inline]
    fn edge_mut(&mut self, u: usize, v: usize) -> &mut Edge {
        let n = self.len();
        if u < n && v < n {
            if let Some(edge) = &mut self.edges[u * n + v] {
                return edge;
            }
        }
        panic!("no edge {u} -> {v} in a graph of {n} vertices")
    }

    #[inline]
    pub fn cost(&self, u: usize, v: usize) -> f64 {
        self.edge(u, v).cost
    }

    /// Cost of a closed tour: consecutive edges plus the wraparound edge.
    pub fn tour_cost(&self, tour: &[usize]) -> f64 {
        if tour.len() < 2 {
            return 0.0;
        }

        let mut cost = 0.0;
        for pair in tour.windows(2) {
            cost += self.cost(pair[0], pair[1]);
        }
        cost + self.cost(tour[tour.len() - 1], tour[0])
    }

    /// Dense cost matrix with zeros on the diagonal.
    pub fn distance_matrix(&self) -> Vec<Vec<f64>> {
        let n = self.len();
        let mut matrix = vec![vec![0.0; n]; n];
        for edge in self.edges() {
            matrix[edge.origin][edge.destination] = edge.cost;
        }
        matrix
    }

    pub fn is_symmetric(&self) -> bool {
        self.edges().all(|e| self.cost(e.destination, e.origin) == e.cost)
    }

    /// Set every pheromone scalar to `value`.
    pub fn reset_pheromone(&mut self, value: f64) {
        for edge in self.edges.iter_mut().flatten() {
            edge.pheromone = value;
        }
    }

    #[inline]
    pub fn pheromone(&self, u: usize, v: usize) -> f64 {
        self.edge(u, v).pheromone
    }

    /// Multiply every pheromone scalar by `1 - rho`.
    pub fn evaporate(&mut self, rho: f64) {
        let keep = 1.0 - rho;
        for edge in self.edges.iter_mut().flatten() {
            edge.pheromone *= keep;
        }
    }

    #[inline]
    pub fn deposit(&mut self, u: usize, v: usize, amount: f64) {
        self.edge_mut(u, v).pheromone += amount;
    }
}

fn euclidean(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
pub(crate) fn unit_square() -> Graph {
    Graph::from_vertices(vec![
        Vertex::new(0, 0.0, 0.0),
        Vertex::new(1, 1.0, 0.0),
        Vertex::new(2, 1.0, 1.0),
        Vertex::new(3, 0.0, 1.0),
    ])
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_calculation() {
        let graph = Graph::from_vertices(vec![Vertex::new(0, 0.0, 0.0), Vertex::new(1, 3.0, 4.0)]).unwrap();

        assert!((graph.cost(0, 1) - 5.0).abs() < 1e-10);
        assert!((graph.cost(1, 0) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_random_graph_is_complete_and_symmetric() {
        let graph = Graph::random(30, 7).unwrap();
        assert_eq!(graph.len(), 30);
        assert_eq!(graph.edges().count(), 30 * 29);
        assert!(graph.is_symmetric());

        let points: HashSet<(i64, i64)> = graph
            .vertices()
            .iter()
            .map(|v| {
                let (x, y) = v.coordinates().unwrap();
                assert!((0.0..=60.0).contains(&x) && (0.0..=60.0).contains(&y));
                (x as i64, y as i64)
            })
            .collect();
        assert_eq!(points.len(), 30);
    }

    #[test]
    fn test_random_graph_is_reproducible() {
        let a = Graph::random(12, 3).unwrap();
        let b = Graph::random(12, 3).unwrap();
        assert_eq!(a.distance_matrix(), b.distance_matrix());
    }

    #[test]
    fn test_unit_square_perimeter() {
        let graph = unit_square();
        assert!((graph.tour_cost(&[0, 1, 2, 3]) - 4.0).abs() < 1e-12);
        let crossing = 2.0 + 2.0 * 2f64.sqrt();
        assert!((graph.tour_cost(&[0, 2, 1, 3]) - crossing).abs() < 1e-12);
    }

    #[test]
    fn test_vertices_sorted_by_id() {
        let graph = Graph::from_vertices(vec![
            Vertex::new(7, 0.0, 0.0),
            Vertex::new(2, 1.0, 0.0),
            Vertex::new(5, 2.0, 0.0),
        ])
        .unwrap();
        let ids: Vec<usize> = graph.vertices().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![2, 5, 7]);
        assert!((graph.cost(0, 2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_graphs_rejected() {
        assert!(Graph::from_vertices(Vec::new()).is_err());
        assert!(Graph::random(0, 1).is_err());
        assert!(Graph::from_vertices(vec![Vertex::new(1, 0.0, 0.0), Vertex::new(1, 1.0, 1.0)]).is_err());
        assert!(Graph::from_vertices(vec![Vertex::unplaced(0), Vertex::new(1, 1.0, 1.0)]).is_err());
        assert!(Graph::from_cost_matrix(&[vec![0.0, 1.0], vec![2.0, 0.0]]).is_err());
        assert!(Graph::from_cost_matrix(&[vec![0.0, -1.0], vec![-1.0, 0.0]]).is_err());
    }

    #[test]
    #[should_panic]
    fn test_self_loop_lookup_panics() {
        unit_square().cost(2, 2);
    }

    #[test]
    fn test_json_round_trip() {
        let graph = Graph::random(15, 11).unwrap();
        let path = std::env::temp_dir().join(format!("tsp_graph_rt_{}.json", std::process::id()));
        graph.save_json(&path).unwrap();
        let loaded = Graph::load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        for (a, b) in graph.vertices().iter().zip(loaded.vertices()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.coordinates(), b.coordinates());
        }
        assert_eq!(graph.distance_matrix(), loaded.distance_matrix());
    }

    #[test]
    fn test_matrix_graph_round_trip() {
        let costs = vec![
            vec![0.0, 2.0, 9.0],
            vec![2.0, 0.0, 4.0],
            vec![9.0, 4.0, 0.0],
        ];
        let graph = Graph::from_cost_matrix(&costs).unwrap();
        let path = std::env::temp_dir().join(format!("tsp_matrix_rt_{}.json", std::process::id()));
        graph.save_json(&path).unwrap();
        let loaded = Graph::load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.distance_matrix(), costs);
    }

    #[test]
    fn test_pheromone_field() {
        let mut graph = unit_square();
        graph.reset_pheromone(1.0);
        graph.evaporate(0.25);
        graph.deposit(0, 1, 0.5);

        assert!((graph.pheromone(0, 1) - 1.25).abs() < 1e-12);
        assert!((graph.pheromone(1, 0) - 0.75).abs() < 1e-12);
    }
}
