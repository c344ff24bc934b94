//! Python binding layer for hybridization-number computations.
//!
//! Exposes a single-pair function working on Newick strings and a pairwise
//! function working on tree files.

use phylotree::tree::Tree as PhyloTree;
use pyo3::exceptions::{PyKeyboardInterrupt, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::errors::HybridError;
use crate::hybrid::{HybridizationNumber, SearchConfig};
use crate::io::read_trees;
use crate::preprocess::parse_newick;

fn to_py_err(err: HybridError) -> PyErr {
    match err {
        HybridError::Cancelled => PyKeyboardInterrupt::new_err(err.to_string()),
        HybridError::Invariant(_) | HybridError::ThreadPool(_) => PyRuntimeError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

fn config(upper_bound: Option<u32>, threads: Option<usize>) -> SearchConfig {
    let defaults = SearchConfig::default();
    SearchConfig { upper_bound, threads: threads.unwrap_or(defaults.threads), ..defaults }
}

/// Compute the hybridization number of two rooted trees.
///
/// Args:
///     newick1: First tree in Newick format
///     newick2: Second tree in Newick format
///     upper_bound: A known achievable value, skips the heuristic (default: None)
///     threads: Worker threads for the search (default: all cores)
///
/// Returns:
///     The minimum number of reticulations displaying both trees.
///
/// Raises:
///     ValueError: If a tree cannot be parsed or the trees share no taxa
#[pyfunction]
#[pyo3(signature = (newick1, newick2, upper_bound=None, threads=None))]
fn hybridization_number(
    py: Python<'_>,
    newick1: &str,
    newick2: &str,
    upper_bound: Option<u32>,
    threads: Option<usize>,
) -> PyResult<u32> {
    let tree1 = parse_newick(newick1).map_err(to_py_err)?;
    let tree2 = parse_newick(newick2).map_err(to_py_err)?;
    let runner = HybridizationNumber::new(config(upper_bound, threads));
    py.detach(|| runner.run(&tree1, &tree2)).map_err(to_py_err)
}

/// Compute pairwise hybridization numbers for all trees of the given files.
///
/// Args:
///     paths: List of Newick or BEAST/NEXUS tree files (optionally .gz)
///     burnin_trees: Number of trees to skip at the beginning of each file (default: 0)
///     use_real_taxa: Use TRANSLATE block for taxon names when available (default: True)
///     threads: Worker threads for each search (default: all cores)
///
/// Returns:
///     A tuple of (tree_names, matrix) where matrix[i][j] is the
///     hybridization number of trees i and j.
///
/// Raises:
///     ValueError: If fewer than two trees are found or a pair shares no taxa
#[pyfunction]
#[pyo3(signature = (paths, burnin_trees=0, use_real_taxa=true, threads=None))]
fn pairwise_hybridization(
    py: Python<'_>,
    paths: Vec<String>,
    burnin_trees: usize,
    use_real_taxa: bool,
    threads: Option<usize>,
) -> PyResult<(Vec<String>, Vec<Vec<u32>>)> {
    let (tree_names, trees) = read_all_trees(&paths, burnin_trees, use_real_taxa)?;
    if trees.len() < 2 {
        return Err(PyValueError::new_err(
            "Need at least 2 trees to compute pairwise hybridization numbers",
        ));
    }

    let runner = HybridizationNumber::new(config(None, threads));
    let n = trees.len();
    let mut matrix = vec![vec![0u32; n]; n];
    py.detach(|| -> Result<(), HybridError> {
        for i in 0..n {
            for j in i + 1..n {
                let h = runner.run(&trees[i], &trees[j])?;
                matrix[i][j] = h;
                matrix[j][i] = h;
            }
        }
        Ok(())
    })
    .map_err(to_py_err)?;

    Ok((tree_names, matrix))
}

/// Helper function to read trees from multiple files
fn read_all_trees(
    paths: &[String],
    burnin_trees: usize,
    use_real_taxa: bool,
) -> PyResult<(Vec<String>, Vec<PhyloTree>)> {
    let mut all_tree_names = Vec::new();
    let mut all_trees = Vec::new();

    for (file_idx, path) in paths.iter().enumerate() {
        let named_trees = read_trees(path, burnin_trees, use_real_taxa).map_err(to_py_err)?;
        if named_trees.is_empty() {
            return Err(PyValueError::new_err(format!(
                "No trees found in file '{path}' after burnin removal"
            )));
        }
        for (name, tree) in named_trees {
            all_tree_names.push(format!("file{file_idx}_{name}"));
            all_trees.push(tree);
        }
    }

    Ok((all_tree_names, all_trees))
}

/// Python module definition
#[pymodule]
#[pyo3(name = "hybridization_number")]
fn python_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(hybridization_number, m)?)?;
    m.add_function(wrap_pyfunction!(pairwise_hybridization, m)?)?;
    Ok(())
}
