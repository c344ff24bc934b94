//! Subtree reduction.
//!
//! # Overview
//! Pendant subtrees that look exactly the same in both trees carry no
//! information about reticulation. They are collapsed into a single leaf in
//! each tree before the search branches, which shrinks the problem without
//! changing its hybridization number.
//!
//! # Algorithm
//! 1. Pair up isomorphic nodes bottom-up. Leaves pair with the leaf carrying
//!    the same taxa. An internal node `v1` pairs with the node `v2` carrying
//!    the same cluster iff both have the same number of children and every
//!    child of `v1` pairs with a child of `v2`. Clusters are unique within a
//!    tree, so every node is compared with at most one partner.
//! 2. For each node `v1` without a partner, group its paired children by the
//!    parent `v2` of their partners. A group of two or more children, or a
//!    single child that is not a bare leaf, is a common pendant subtree: in
//!    both trees it is replaced by one leaf carrying the union of its taxa and
//!    a copy is kept in [`SubtreeReduction::extracted`].
//! 3. If the roots pair up, the trees are isomorphic and need no reticulation.

use crate::errors::{HybridError, Result};
use crate::rooted::{NodeId, RootedTree};
use itertools::Itertools;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionOutcome {
    /// The two trees are identical: hybridization number 0.
    Isomorphic,
    /// At least one common subtree was collapsed.
    Reduced,
    /// Nothing to collapse.
    Irreducible,
}

#[derive(Debug, Clone)]
pub struct SubtreeReduction {
    pub outcome: ReductionOutcome,
    /// One copy of every collapsed subtree, taken from the first tree.
    pub extracted: Vec<RootedTree>,
}

/// Maps every node of `tree1` that has an isomorphic counterpart in `tree2`
/// to that counterpart.
pub fn isomorphic_partners(tree1: &RootedTree, tree2: &RootedTree) -> FxHashMap<NodeId, NodeId> {
    let index2 = tree2.cluster_index();
    let mut partner: FxHashMap<NodeId, NodeId> = FxHashMap::default();

    for v1 in tree1.post_order() {
        let Some(&v2) = index2.get(tree1.taxa_of(v1)) else {
            continue;
        };
        let paired = if tree1.is_leaf(v1) {
            tree2.is_leaf(v2)
        } else {
            !tree2.is_leaf(v2)
                && tree1.children(v1).len() == tree2.children(v2).len()
                && tree1.children(v1).iter().all(|u1| {
                    partner
                        .get(u1)
                        .is_some_and(|&u2| tree2.parent(u2) == Some(v2))
                })
        };
        if paired {
            partner.insert(v1, v2);
        }
    }
    partner
}

/// True if the two trees are the same rooted tree over the same taxa.
pub fn is_isomorphic(tree1: &RootedTree, tree2: &RootedTree) -> bool {
    tree1.taxa() == tree2.taxa() && isomorphic_partners(tree1, tree2).contains_key(&tree1.root())
}

/// A common subtree found under `(v1, v2)`, not yet collapsed.
struct Collapse {
    v1: NodeId,
    v2: NodeId,
    group1: Vec<NodeId>,
    group2: Vec<NodeId>,
}

/// Collapses all maximal common pendant subtrees of the two trees in place.
///
/// # Errors
/// [`HybridError::Invariant`] if the trees do not carry the same taxa before
/// or after the reduction.
pub fn reduce_subtrees(tree1: &mut RootedTree, tree2: &mut RootedTree) -> Result<SubtreeReduction> {
    if tree1.taxa() != tree2.taxa() {
        return Err(HybridError::Invariant("subtree reduction on trees with different taxa".into()));
    }

    let partner = isomorphic_partners(tree1, tree2);
    if partner.contains_key(&tree1.root()) {
        return Ok(SubtreeReduction { outcome: ReductionOutcome::Isomorphic, extracted: Vec::new() });
    }

    let mut plans = Vec::new();
    for v1 in tree1.post_order() {
        if tree1.is_leaf(v1) || partner.contains_key(&v1) {
            continue;
        }
        let groups = tree1
            .children(v1)
            .iter()
            .filter_map(|u1| {
                let u2 = *partner.get(u1)?;
                Some((tree2.parent(u2)?, *u1))
            })
            .into_group_map();

        for (v2, group1) in groups.into_iter().sorted_by_key(|(v2, _)| *v2) {
            let collapsible = group1.len() >= 2 || (group1.len() == 1 && !tree1.is_leaf(group1[0]));
            if !collapsible {
                continue;
            }
            let group2 = group1.iter().filter_map(|u1| partner.get(u1).copied()).collect();
            plans.push(Collapse { v1, v2, group1, group2 });
        }
    }

    if plans.is_empty() {
        return Ok(SubtreeReduction { outcome: ReductionOutcome::Irreducible, extracted: Vec::new() });
    }

    let mut extracted = Vec::with_capacity(plans.len());
    for plan in &plans {
        let collapsed1 = pendant_root(tree1, plan.v1, &plan.group1);
        extracted.push(tree1.extract_subtree(collapsed1));
        tree1.contract_to_leaf(collapsed1);

        let collapsed2 = pendant_root(tree2, plan.v2, &plan.group2);
        tree2.contract_to_leaf(collapsed2);
    }

    if tree1.taxa() != tree2.taxa() || !tree1.check_taxa() || !tree2.check_taxa() {
        return Err(HybridError::Invariant("subtree reduction broke the taxon sets".into()));
    }

    // Collapsing sibling groups inside polytomies can make the trees equal.
    let outcome = if is_isomorphic(tree1, tree2) {
        ReductionOutcome::Isomorphic
    } else {
        ReductionOutcome::Reduced
    };
    Ok(SubtreeReduction { outcome, extracted })
}

/// The node whose subtree is exactly `group` under `parent`, creating it if
/// the group is a strict subset of several children.
fn pendant_root(tree: &mut RootedTree, parent: NodeId, group: &[NodeId]) -> NodeId {
    if group.len() == tree.children(parent).len() {
        parent
    } else if group.len() == 1 {
        group[0]
    } else {
        tree.group_children(parent, group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::from_newick_pair;

    fn reduce(a: &str, b: &str) -> (SubtreeReduction, RootedTree, RootedTree) {
        let (_, mut t1, mut t2) = from_newick_pair(a, b).unwrap();
        let r = reduce_subtrees(&mut t1, &mut t2).unwrap();
        (r, t1, t2)
    }

    #[test]
    fn test_identical_trees_are_isomorphic() {
        let (r, _, _) = reduce("((a,b),(c,d));", "((d,c),(b,a));");
        assert_eq!(r.outcome, ReductionOutcome::Isomorphic);
    }

    #[test]
    fn test_crossing_cherries_are_irreducible() {
        let (r, t1, _) = reduce("((a,b),(c,d));", "((a,c),(b,d));");
        assert_eq!(r.outcome, ReductionOutcome::Irreducible);
        assert!(r.extracted.is_empty());
        assert_eq!(t1.canonical_string(), "((0,1),(2,3))");
    }

    #[test]
    fn test_common_cherry_collapses() {
        let (r, t1, t2) = reduce("((a,b),(c,(d,e)));", "((a,b),((c,d),e));");
        assert_eq!(r.outcome, ReductionOutcome::Reduced);
        assert_eq!(r.extracted.len(), 1);
        assert_eq!(r.extracted[0].canonical_string(), "(0,1)");
        assert_eq!(t1.canonical_string(), "((2,(3,4)),0+1)");
        assert_eq!(t2.canonical_string(), "(((2,3),4),0+1)");
    }

    #[test]
    fn test_sibling_group_in_polytomy_collapses() {
        let (r, t1, t2) = reduce("((a,b,c),(d,e));", "((a,b,d),(c,e));");
        assert_eq!(r.outcome, ReductionOutcome::Reduced);
        assert_eq!(r.extracted[0].canonical_string(), "(0,1)");
        assert_eq!(t1.canonical_string(), "((0+1,2),(3,4))");
        assert_eq!(t2.canonical_string(), "((0+1,3),(2,4))");
    }

    #[test]
    fn test_collapse_can_reveal_isomorphism() {
        let (r, _, _) = reduce("(((a,b),c),d);", "((a,b,c),d);");
        assert_eq!(r.outcome, ReductionOutcome::Isomorphic);
    }

    #[test]
    fn test_partners_on_shared_subtrees() {
        let (_, t1, t2) = from_newick_pair("((a,b),(c,d));", "((a,b),c,d);").unwrap();
        let partner = isomorphic_partners(&t1, &t2);
        let cherry = t1.children(t1.root())[0];
        assert!(partner.contains_key(&cherry));
        assert!(!partner.contains_key(&t1.root()));
        assert!(!is_isomorphic(&t1, &t2));
    }
}
