//! Error type shared by graph I/O, result logging and the exact solvers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TspError>;

#[derive(Debug, Error)]
pub enum TspError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The vertex set cannot form a valid complete graph.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// Instance exceeds what a given method accepts.
    #[error("{method} accepts at most {limit} vertices, got {size}")]
    TooLarge {
        method: &'static str,
        limit: usize,
        size: usize,
    },

    /// Binary program backend failure (not infeasibility, which is an outcome).
    #[error("solver backend error: {0}")]
    Solver(String),
}
