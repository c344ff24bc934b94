//! Common refinement of two multifurcating trees.
//!
//! Polytomies are treated as unresolved. When a cluster of one tree is
//! compatible with every cluster of the other tree, the other tree can be
//! resolved to contain it without loss of information, so both trees end up
//! sharing as much resolution as they can. Binary trees are left untouched.

use crate::bitset::Bitset;
use crate::rooted::RootedTree;

/// Two clusters are compatible if they are nested or disjoint.
#[inline]
fn compatible(a: &Bitset, b: &Bitset) -> bool {
    !a.intersects(b) || a.is_subset(b) || b.is_subset(a)
}

/// Refines both trees with each other's compatible clusters.
///
/// Returns true if either tree changed.
pub fn refine(tree1: &mut RootedTree, tree2: &mut RootedTree) -> bool {
    let changed1 = refine_into(tree1, tree2);
    let changed2 = refine_into(tree2, tree1);
    changed1 || changed2
}

/// Inserts into `target` every cluster of `source` that `target` is missing
/// and is compatible with.
fn refine_into(target: &mut RootedTree, source: &RootedTree) -> bool {
    let mut clusters: Vec<Bitset> = target
        .post_order()
        .into_iter()
        .map(|id| target.taxa_of(id).clone())
        .collect();

    let candidates: Vec<Bitset> = source
        .post_order()
        .into_iter()
        .filter(|&id| !source.is_leaf(id) && id != source.root())
        .map(|id| source.taxa_of(id).clone())
        .collect();

    let mut changed = false;
    for cluster in candidates {
        if clusters.contains(&cluster) || !clusters.iter().all(|c| compatible(c, &cluster)) {
            continue;
        }
        let Some(host) = lowest_containing(target, &cluster) else {
            continue;
        };
        let group: Vec<_> = target
            .children(host)
            .iter()
            .copied()
            .filter(|&c| target.taxa_of(c).is_subset(&cluster))
            .collect();
        if group.len() < 2 || group.len() == target.children(host).len() {
            continue;
        }
        target.group_children(host, &group);
        clusters.push(cluster);
        changed = true;
    }
    changed
}

/// The node with the smallest cluster that contains `cluster`.
fn lowest_containing(tree: &RootedTree, cluster: &Bitset) -> Option<usize> {
    tree.post_order()
        .into_iter()
        .filter(|&id| !tree.is_leaf(id) && cluster.is_subset(tree.taxa_of(id)))
        .min_by_key(|&id| tree.taxa_of(id).count_ones())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::from_newick_pair;

    #[test]
    fn test_polytomy_takes_compatible_cluster() {
        let (_, mut t1, mut t2) = from_newick_pair("(a,b,c,d);", "((a,b),(c,d));").unwrap();
        assert!(refine(&mut t1, &mut t2));
        assert_eq!(t1.canonical_string(), "((0,1),(2,3))");
        assert_eq!(t2.canonical_string(), "((0,1),(2,3))");
        assert!(t1.check_taxa());
    }

    #[test]
    fn test_incompatible_cluster_is_skipped() {
        let (_, mut t1, mut t2) = from_newick_pair("((a,b),c,d);", "((a,c),b,d);").unwrap();
        assert!(!refine(&mut t1, &mut t2));
        assert_eq!(t1.canonical_string(), "((0,1),2,3)");
        assert_eq!(t2.canonical_string(), "((0,2),1,3)");
    }

    #[test]
    fn test_binary_trees_unchanged() {
        let (_, mut t1, mut t2) = from_newick_pair("((a,b),(c,d));", "((a,c),(b,d));").unwrap();
        assert!(!refine(&mut t1, &mut t2));
        assert_eq!(t1.canonical_string(), "((0,1),(2,3))");
    }

    #[test]
    fn test_refinement_goes_both_ways() {
        let (_, mut t1, mut t2) = from_newick_pair("((a,b),c,d,e);", "(a,b,(c,d),e);").unwrap();
        assert!(refine(&mut t1, &mut t2));
        assert_eq!(t1.canonical_string(), "((0,1),(2,3),4)");
        assert_eq!(t2.canonical_string(), "((0,1),(2,3),4)");
    }
}
