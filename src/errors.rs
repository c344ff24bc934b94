//! Error types for hybridization-number computations.

use phylotree::tree::TreeError;
use thiserror::Error;

/// Everything that can stop a computation.
///
/// Input problems are reported before any search starts. `Cancelled` is the
/// normal outcome of a caller-requested abort. `Invariant` means the reduction
/// or bound bookkeeping is broken; it aborts the whole computation.
#[derive(Error, Debug)]
pub enum HybridError {
    /// A tree has no nodes (or lost all of its taxa).
    #[error("tree {0} is empty")]
    EmptyTree(usize),
    /// A leaf without a name cannot be mapped to a taxon.
    #[error("tree {0} has a leaf without a name")]
    UnnamedLeaf(usize),
    /// The same taxon labels two leaves of one tree.
    #[error("taxon `{name}` occurs more than once in tree {tree}")]
    DuplicateTaxon { tree: usize, name: String },
    /// The two trees do not share a single taxon.
    #[error("the two trees have disjoint taxon sets")]
    DisjointTaxa,
    /// The taxon sets still differ after unshared taxa were removed.
    #[error("taxon sets differ after removing unshared taxa")]
    TaxaMismatch,
    /// The caller's upper bound is below the hybridization number.
    #[error("the given upper bound {0} is below the hybridization number")]
    BoundTooLow(u32),
    /// A Newick string could not be parsed.
    #[error("could not parse Newick tree: {0}")]
    Newick(String),
    /// A [`TreeError`] raised while reading an input tree.
    #[error("invalid input tree: {0}")]
    Tree(#[from] TreeError),
    /// Reading or writing a file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The worker pool could not be started.
    #[error("could not build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// The caller asked the computation to stop.
    #[error("computation cancelled")]
    Cancelled,
    /// An internal consistency check failed.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, HybridError>;
