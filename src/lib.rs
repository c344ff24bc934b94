//! Crate root: module orchestration and public re-exports.
//!
//! Computes the hybridization number of two rooted, possibly multifurcating
//! trees: the minimum number of reticulations a network needs to display both.
//!
//! Modules:
//! - `bitset`, `taxa`: taxon sets as bitsets over a shared universe.
//! - `rooted`: the arena-backed rooted tree used inside the search.
//! - `preprocess`: conversion from `phylotree` trees, unshared-taxon removal.
//! - `refine`, `subtree`, `cluster`: the reductions applied between branches.
//! - `cache`, `bound`, `progress`: state shared by all branches of one search.
//! - `heuristic`: greedy upper bound seeding the search.
//! - `search`: the branch-and-bound engine.
//! - `hybrid`: configuration and the public entry points.
//! - `io`: reading Newick and BEAST/NEXUS files, writing TSV matrices.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod bitset;
pub mod bound;
pub mod cache;
pub mod cluster;
pub mod errors;
pub mod heuristic;
pub mod hybrid;
pub mod io;
pub mod preprocess;
pub mod progress;
pub mod refine;
pub mod rooted;
pub mod search;
pub mod subtree;
pub mod taxa;

#[cfg(feature = "python")]
pub mod api;

pub use bitset::Bitset;
pub use errors::{HybridError, Result};
pub use hybrid::{HybridizationNumber, SearchConfig, compute_hybridization_number, from_newick};
pub use io::{read_trees, write_matrix_tsv};
pub use progress::{CancelFlag, NoProgress, Progress};
pub use rooted::RootedTree;
