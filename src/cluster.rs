//! Cluster reduction.
//!
//! A common cluster is a set of taxa that forms a clade in both trees. The
//! hybridization number splits over it: the cost of the cluster itself plus
//! the cost of the rest of the trees with the cluster shrunk to one leaf.

use crate::rooted::{NodeId, RootedTree};

/// Two independent subproblems produced by splitting on a common cluster.
#[derive(Debug, Clone)]
pub struct ClusterSplit {
    /// The subtrees of both trees below the common cluster.
    pub cluster: (RootedTree, RootedTree),
    /// Both trees with the common cluster contracted to a single leaf.
    pub remainder: (RootedTree, RootedTree),
}

/// Finds a minimal common cluster that is neither a single leaf nor the
/// whole taxon set. Returns the node carrying it in each tree.
pub fn find_common_cluster(tree1: &RootedTree, tree2: &RootedTree) -> Option<(NodeId, NodeId)> {
    let index2 = tree2.cluster_index();
    tree1
        .post_order()
        .into_iter()
        .filter(|&v1| v1 != tree1.root() && !tree1.is_leaf(v1))
        .find_map(|v1| {
            let &v2 = index2.get(tree1.taxa_of(v1))?;
            (v2 != tree2.root() && !tree2.is_leaf(v2)).then_some((v1, v2))
        })
}

/// Splits the pair of trees on a common cluster, if there is one.
pub fn cluster_reduce(tree1: &RootedTree, tree2: &RootedTree) -> Option<ClusterSplit> {
    let (v1, v2) = find_common_cluster(tree1, tree2)?;

    let cluster = (tree1.extract_subtree(v1), tree2.extract_subtree(v2));

    let mut rest1 = tree1.clone();
    rest1.contract_to_leaf(v1);
    let mut rest2 = tree2.clone();
    rest2.contract_to_leaf(v2);

    Some(ClusterSplit { cluster, remainder: (rest1.compact(), rest2.compact()) })
}
