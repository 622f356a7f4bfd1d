//! A minimal multi-layer feed-forward network trainer and predictor:
//! dense matrix primitives, sigmoid/tanh activations, per-sample SGD
//! training, weight persistence, and best-run selection for inference.
//!
//! - Networks of 3+ dense layers with one activation shared across layers
//! - Online backpropagation (batch size 1, no shuffling)
//! - Binary weight artifacts per layer, keyed by name and run timestamp
//! - CSV analysis log ranking runs by measured accuracy
//!
//! Command-line parsing and dataset-specific preprocessing are left to
//! callers; this crate consumes already-normalized numeric records.

pub mod activations;
pub mod analysis;
pub mod matrix;
pub mod network;
pub mod records;
pub mod store;

pub use activations::Activation;
pub use analysis::{append_run, best_run, RunRecord};
pub use matrix::{random_array, Matrix};
pub use network::{Config, Network};
pub use records::{read_records, Record};
pub use store::Store;
