//! Conversion of input trees into the internal [`RootedTree`] form.
//!
//! # Steps
//! 1. Collect leaf names of both trees and build one [`TaxonSet`] over their
//!    union (names sorted alphabetically, see [`crate::taxa`]).
//! 2. Walk each `phylotree` tree from its root and mirror it as a
//!    [`RootedTree`], contracting unary nodes on the way.
//! 3. Strip taxa that occur in only one tree, one taxon at a time.
//!
//! # Why names and not node ids
//! Node ids are assigned during parsing and differ between trees. Only leaf
//! names identify the same taxon across the two inputs.

use crate::bitset::Bitset;
use crate::errors::{HybridError, Result};
use crate::rooted::RootedTree;
use crate::taxa::TaxonSet;
use log::{debug, warn};
use phylotree::tree::Tree as PhyloTree;
use rustc_hash::FxHashSet;

/// Leaf names of a tree, failing on unnamed leaves.
fn leaf_names(tree: &PhyloTree, index: usize) -> Result<Vec<String>> {
    tree.get_leaves()
        .iter()
        .map(|leaf_id| {
            let node = tree.get(leaf_id)?;
            node.name
                .clone()
                .filter(|name| !name.is_empty())
                .ok_or(HybridError::UnnamedLeaf(index))
        })
        .collect()
}

/// Mirrors a `phylotree` tree as a [`RootedTree`] over `taxa`.
///
/// `index` only labels errors (1 for the first input tree, 2 for the second).
pub fn rooted_from_phylo(tree: &PhyloTree, taxa: &TaxonSet, index: usize) -> Result<RootedTree> {
    if tree.get_leaves().is_empty() {
        return Err(HybridError::EmptyTree(index));
    }
    let phylo_root = tree.get_root()?;
    let words = taxa.words();
    let mut seen: FxHashSet<usize> = FxHashSet::default();

    let mut leaf_taxon = |phylo_id: usize| -> Result<Bitset> {
        let name = tree
            .get(&phylo_id)?
            .name
            .clone()
            .ok_or(HybridError::UnnamedLeaf(index))?;
        let id = taxa.id_of(&name).ok_or(HybridError::UnnamedLeaf(index))?;
        if !seen.insert(id) {
            return Err(HybridError::DuplicateTaxon { tree: index, name });
        }
        Ok(Bitset::from_indices(words, [id]))
    };

    let root_node = tree.get(&phylo_root)?;
    if root_node.children.is_empty() {
        return Ok(RootedTree::leaf(leaf_taxon(phylo_root)?));
    }

    let mut rooted = RootedTree::new(words);
    let mut stack = vec![(phylo_root, rooted.root())];
    while let Some((phylo_id, parent)) = stack.pop() {
        for &child_id in &tree.get(&phylo_id)?.children {
            let child = tree.get(&child_id)?;
            if child.children.is_empty() {
                let leaf = leaf_taxon(child_id)?;
                rooted.add_child(parent, leaf);
            } else {
                let inner = rooted.add_child(parent, Bitset::zeros(words));
                stack.push((child_id, inner));
            }
        }
    }
    rooted.update_taxa();

    // Unary nodes from the input are contracted by the compacting copy.
    Ok(rooted.compact())
}

/// Converts both input trees and removes every taxon they do not share.
///
/// # Errors
/// - [`HybridError::EmptyTree`] if a tree has no leaves,
/// - [`HybridError::UnnamedLeaf`] / [`HybridError::DuplicateTaxon`] for bad labels,
/// - [`HybridError::DisjointTaxa`] if the trees share no taxon,
/// - [`HybridError::TaxaMismatch`] if the taxon sets still differ afterwards.
pub fn preprocess(tree1: &PhyloTree, tree2: &PhyloTree) -> Result<(TaxonSet, RootedTree, RootedTree)> {
    let names1 = leaf_names(tree1, 1)?;
    let names2 = leaf_names(tree2, 2)?;
    if names1.is_empty() {
        return Err(HybridError::EmptyTree(1));
    }
    if names2.is_empty() {
        return Err(HybridError::EmptyTree(2));
    }

    let taxa = TaxonSet::from_names(names1.into_iter().chain(names2));
    let mut rooted1 = rooted_from_phylo(tree1, &taxa, 1)?;
    let mut rooted2 = rooted_from_phylo(tree2, &taxa, 2)?;

    if !rooted1.taxa().intersects(rooted2.taxa()) {
        return Err(HybridError::DisjointTaxa);
    }

    rooted1 = remove_unshared(rooted1, rooted2.taxa(), &taxa, 1);
    rooted2 = remove_unshared(rooted2, rooted1.taxa(), &taxa, 2);

    if rooted1.is_empty() || rooted2.is_empty() {
        return Err(HybridError::DisjointTaxa);
    }
    if rooted1.taxa() != rooted2.taxa() {
        return Err(HybridError::TaxaMismatch);
    }
    debug!(
        "preprocessed trees over {} shared taxa ({} in universe)",
        rooted1.taxa().count_ones(),
        taxa.len()
    );
    Ok((taxa, rooted1, rooted2))
}

/// Removes the taxa of `tree` missing from `keep`, one taxon per copy so
/// every intermediate tree stays valid.
fn remove_unshared(mut tree: RootedTree, keep: &Bitset, taxa: &TaxonSet, index: usize) -> RootedTree {
    let mut unshared = tree.taxa().clone();
    unshared.and_not_assign(keep);
    for id in unshared.iter_ones() {
        warn!(
            "taxon `{}` only occurs in tree {index}; removing it",
            taxa.name_of(id).unwrap_or("?")
        );
        tree = tree.copy_with_taxa_removed(&Bitset::from_indices(tree.words(), [id]));
    }
    tree
}

/// Parses a single Newick string with `phylotree`.
pub fn parse_newick(newick: &str) -> Result<PhyloTree> {
    PhyloTree::from_newick(newick).map_err(|e| HybridError::Newick(e.to_string()))
}

/// Convenience wrapper: parse two Newick strings and preprocess them.
pub fn from_newick_pair(newick1: &str, newick2: &str) -> Result<(TaxonSet, RootedTree, RootedTree)> {
    let tree1 = parse_newick(newick1)?;
    let tree2 = parse_newick(newick2)?;
    preprocess(&tree1, &tree2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirrors_structure() {
        let (taxa, t1, t2) = from_newick_pair("((a,b),(c,d));", "((d,c),(b,a));").unwrap();
        assert_eq!(taxa.len(), 4);
        assert_eq!(t1.canonical_string(), "((0,1),(2,3))");
        assert_eq!(t1.canonical_string(), t2.canonical_string());
        assert!(t1.check_taxa());
    }

    #[test]
    fn test_unshared_taxa_are_removed() {
        let (taxa, t1, t2) = from_newick_pair("((a,b),(c,(d,e)));", "((a,c),(b,d));").unwrap();
        assert_eq!(taxa.len(), 5);
        assert_eq!(t1.taxa(), t2.taxa());
        assert_eq!(t1.to_newick(&taxa), "((a,b),(c,d));");
    }

    #[test]
    fn test_disjoint_taxa_rejected() {
        let err = from_newick_pair("((a,b),c);", "((d,e),f);").unwrap_err();
        assert!(matches!(err, HybridError::DisjointTaxa));
    }

    #[test]
    fn test_duplicate_taxon_rejected() {
        let err = from_newick_pair("((a,b),a);", "((a,b),c);").unwrap_err();
        assert!(matches!(err, HybridError::DuplicateTaxon { tree: 1, .. }));
    }
}
