//! Greedy upper bound for the hybridization number.
//!
//! Removing a set of leaves until the two trees agree costs one reticulation
//! per removed leaf, and a common cluster splits the cost additively. The
//! greedy walk below only ever performs such steps, so whatever it counts is
//! achievable and may seed the search bound. It never needs to be tight.

use crate::cluster::cluster_reduce;
use crate::errors::Result;
use crate::refine::refine;
use crate::rooted::RootedTree;
use crate::subtree::{ReductionOutcome, reduce_subtrees};
use log::trace;

/// Counts the leaf removals of a greedy reconciliation of the two trees.
///
/// At each step the trees are refined and subtree-reduced; common clusters
/// are split off and handled on their own. Otherwise the leaf whose removal
/// leaves the smallest reduced pair is removed.
pub fn estimate_upper_bound(tree1: &RootedTree, tree2: &RootedTree) -> Result<u32> {
    let mut pending = vec![(tree1.clone(), tree2.clone())];
    let mut removals = 0u32;

    while let Some((mut t1, mut t2)) = pending.pop() {
        loop {
            refine(&mut t1, &mut t2);
            if reduce_subtrees(&mut t1, &mut t2)?.outcome == ReductionOutcome::Isomorphic {
                break;
            }
            if let Some(split) = cluster_reduce(&t1, &t2) {
                pending.push(split.cluster);
                (t1, t2) = split.remainder;
                continue;
            }
            (t1, t2) = greedy_removal(&t1, &t2)?;
            removals += 1;
        }
    }
    trace!("greedy reconciliation removed {removals} leaves");
    Ok(removals)
}

/// The reduced pair left after removing the most helpful leaf.
fn greedy_removal(t1: &RootedTree, t2: &RootedTree) -> Result<(RootedTree, RootedTree)> {
    let mut best: Option<(usize, RootedTree, RootedTree)> = None;
    for leaf in t1.all_leaves() {
        let removed = t1.taxa_of(leaf);
        let mut c1 = t1.copy_with_taxa_removed(removed);
        let mut c2 = t2.copy_with_taxa_removed(removed);
        refine(&mut c1, &mut c2);
        let remaining = match reduce_subtrees(&mut c1, &mut c2)?.outcome {
            ReductionOutcome::Isomorphic => 0,
            _ => c1.leaf_count(),
        };
        if best.as_ref().is_none_or(|(size, _, _)| remaining < *size) {
            best = Some((remaining, c1, c2));
        }
    }
    // A tree pair that is not isomorphic has at least three leaves.
    Ok(best.map(|(_, c1, c2)| (c1, c2)).unwrap_or_else(|| (t1.clone(), t2.clone())))
}
