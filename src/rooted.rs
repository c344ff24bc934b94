//! The rooted-tree representation used inside the search.
//!
//! # Overview
//! A [`RootedTree`] is an arena of [`Node`]s addressed by [`NodeId`]. Every
//! node caches the [`Bitset`] of taxa below it, so comparing clusters between
//! two trees is a bitset comparison.
//!
//! Leaves usually carry a single taxon. Subtree and cluster reduction replace
//! whole subtrees by one leaf carrying the union of their taxa, so a leaf may
//! stand for several taxa.
//!
//! # Lifetime
//! Each search branch owns its trees outright. Deleting a subtree marks its
//! nodes `deleted` and unhooks it from the parent; the memory goes away in one
//! piece when the branch drops its tree (or when [`RootedTree::compact`]
//! rebuilds the arena).
//!
//! # Invariants
//! - `taxa(v)` equals the union of the children's taxa for internal nodes.
//! - No live internal node has exactly one child.

use crate::bitset::Bitset;
use crate::taxa::TaxonSet;
use itertools::Itertools;
use rustc_hash::FxHashMap;

pub type NodeId = usize;

/// blake3 digest of a tree shape, see [`RootedTree::structural_hash`].
pub type TreeDigest = [u8; 32];

#[derive(Debug, Clone)]
pub struct Node {
    /// Taxa in the subtree rooted here.
    pub taxa: Bitset,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub deleted: bool,
}

impl Node {
    fn new(taxa: Bitset, parent: Option<NodeId>) -> Self {
        Node { taxa, children: Vec::new(), parent, deleted: false }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RootedTree {
    nodes: Vec<Node>,
    root: NodeId,
    words: usize,
}

impl RootedTree {
    /// A tree consisting of a bare root with no taxa, ready for children.
    pub fn new(words: usize) -> Self {
        RootedTree { nodes: vec![Node::new(Bitset::zeros(words), None)], root: 0, words }
    }

    /// A single-leaf tree carrying `taxa`.
    pub fn leaf(taxa: Bitset) -> Self {
        let words = taxa.0.len();
        RootedTree { nodes: vec![Node::new(taxa, None)], root: 0, words }
    }

    /// Appends a node under `parent`. Call [`RootedTree::update_taxa`] once the
    /// tree is complete to propagate taxa upwards.
    pub fn add_child(&mut self, parent: NodeId, taxa: Bitset) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(taxa, Some(parent)));
        self.nodes[parent].children.push(id);
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn words(&self) -> usize {
        self.words
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Taxa of the whole tree.
    #[inline]
    pub fn taxa(&self) -> &Bitset {
        &self.nodes[self.root].taxa
    }

    #[inline]
    pub fn taxa_of(&self, id: NodeId) -> &Bitset {
        &self.nodes[id].taxa
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    #[inline]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id].is_leaf()
    }

    pub fn is_empty(&self) -> bool {
        self.taxa().is_empty()
    }

    /// Live nodes, children before parents, root last.
    pub fn post_order(&self) -> Vec<NodeId> {
        self.post_order_from(self.root)
    }

    fn post_order_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(start, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for &child in self.nodes[id].children.iter().rev() {
                stack.push((child, false));
            }
        }
        order
    }

    /// All live leaves, in post-order.
    pub fn all_leaves(&self) -> Vec<NodeId> {
        self.post_order().into_iter().filter(|&id| self.is_leaf(id)).collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.post_order().into_iter().filter(|&id| self.is_leaf(id)).count()
    }

    /// Recomputes every internal node's taxa from its children.
    pub fn update_taxa(&mut self) {
        for id in self.post_order() {
            if self.nodes[id].is_leaf() {
                continue;
            }
            let mut taxa = Bitset::zeros(self.words);
            for &child in &self.nodes[id].children {
                taxa.or_assign(&self.nodes[child].taxa);
            }
            self.nodes[id].taxa = taxa;
        }
    }

    /// True if every internal node's taxa is exactly the union of its
    /// children's taxa and no internal node is unary.
    pub fn check_taxa(&self) -> bool {
        self.post_order().into_iter().all(|id| {
            let node = &self.nodes[id];
            if node.is_leaf() {
                return true;
            }
            let mut taxa = Bitset::zeros(self.words);
            for &child in &node.children {
                taxa.or_assign(&self.nodes[child].taxa);
            }
            node.children.len() > 1 && taxa == node.taxa
        })
    }

    /// Map from cluster to the node carrying it.
    pub fn cluster_index(&self) -> FxHashMap<&Bitset, NodeId> {
        self.post_order()
            .into_iter()
            .map(|id| (&self.nodes[id].taxa, id))
            .collect()
    }

    /// Copies the tree with the given taxa deleted.
    ///
    /// Leaves that lose all their taxa disappear, internal nodes left with no
    /// children disappear and nodes left with one child are contracted.
    pub fn copy_with_taxa_removed(&self, removed: &Bitset) -> RootedTree {
        self.copy_subtree(self.root, removed)
    }

    /// Copies the subtree below `start` into a new, compact tree.
    pub fn extract_subtree(&self, start: NodeId) -> RootedTree {
        self.copy_subtree(start, &Bitset::zeros(self.words))
    }

    /// Rebuilds the arena without deleted nodes.
    pub fn compact(&self) -> RootedTree {
        self.extract_subtree(self.root)
    }

    fn copy_subtree(&self, start: NodeId, removed: &Bitset) -> RootedTree {
        let mut out = RootedTree { nodes: Vec::new(), root: 0, words: self.words };
        let mut mapped: FxHashMap<NodeId, NodeId> = FxHashMap::default();

        for id in self.post_order_from(start) {
            let node = &self.nodes[id];
            if node.is_leaf() {
                let mut taxa = node.taxa.clone();
                taxa.and_not_assign(removed);
                if !taxa.is_empty() {
                    mapped.insert(id, out.push_detached(taxa, Vec::new()));
                }
                continue;
            }

            let kept: Vec<NodeId> = node.children.iter().filter_map(|c| mapped.get(c).copied()).collect();
            match kept.len() {
                0 => {}
                1 => {
                    mapped.insert(id, kept[0]);
                }
                _ => {
                    let mut taxa = Bitset::zeros(self.words);
                    for &k in &kept {
                        taxa.or_assign(&out.nodes[k].taxa);
                    }
                    mapped.insert(id, out.push_detached(taxa, kept));
                }
            }
        }

        match mapped.get(&start) {
            Some(&root) => out.root = root,
            None => {
                out.nodes.clear();
                out.nodes.push(Node::new(Bitset::zeros(self.words), None));
                out.root = 0;
            }
        }
        out
    }

    fn push_detached(&mut self, taxa: Bitset, children: Vec<NodeId>) -> NodeId {
        let id = self.nodes.len();
        for &child in &children {
            self.nodes[child].parent = Some(id);
        }
        self.nodes.push(Node { taxa, children, parent: None, deleted: false });
        id
    }

    /// Unhooks `id` from its parent and marks the whole subtree deleted.
    pub fn delete_subtree(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
        self.mark_deleted(id);
    }

    fn mark_deleted(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(v) = stack.pop() {
            self.nodes[v].deleted = true;
            stack.extend(self.nodes[v].children.iter().copied());
        }
    }

    /// Turns `id` into a leaf carrying all of its taxa.
    pub fn contract_to_leaf(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id].children);
        for child in children {
            self.nodes[child].parent = None;
            self.mark_deleted(child);
        }
    }

    /// Inserts a new internal node under `parent` adopting the children in
    /// `group`. Returns the new node.
    pub fn group_children(&mut self, parent: NodeId, group: &[NodeId]) -> NodeId {
        let mut taxa = Bitset::zeros(self.words);
        for &child in group {
            taxa.or_assign(&self.nodes[child].taxa);
        }
        self.nodes[parent].children.retain(|c| !group.contains(c));
        let id = self.add_child(parent, taxa);
        for &child in group {
            self.nodes[child].parent = Some(id);
        }
        self.nodes[id].children = group.to_vec();
        id
    }

    /// Sorts every child list by smallest taxon id, so that equal trees lay
    /// out their children identically.
    pub fn reorder(&mut self) {
        for id in self.post_order() {
            let mut children = std::mem::take(&mut self.nodes[id].children);
            children.sort_by_key(|&c| self.nodes[c].taxa.first_one());
            self.nodes[id].children = children;
        }
    }

    /// Order-independent encoding of the tree.
    ///
    /// Leaves print their taxon ids joined by `+`, internal nodes print their
    /// children's encodings sorted and wrapped in parentheses.
    pub fn canonical_string(&self) -> String {
        let mut encoded: FxHashMap<NodeId, String> = FxHashMap::default();
        for id in self.post_order() {
            let node = &self.nodes[id];
            let s = if node.is_leaf() {
                node.taxa.iter_ones().join("+")
            } else {
                let inner = node
                    .children
                    .iter()
                    .filter_map(|c| encoded.remove(c))
                    .sorted()
                    .join(",");
                format!("({inner})")
            };
            encoded.insert(id, s);
        }
        encoded.remove(&self.root).unwrap_or_default()
    }

    /// Merkle-style blake3 digest over the canonical child order.
    ///
    /// Isomorphic trees (same taxa arranged the same way) always get the same
    /// digest. Subproblem scores are cached under it, so it has to be
    /// collision resistant rather than just fast.
    pub fn structural_hash(&self) -> TreeDigest {
        let mut digests: FxHashMap<NodeId, TreeDigest> = FxHashMap::default();
        for id in self.post_order() {
            let node = &self.nodes[id];
            let mut hasher = blake3::Hasher::new();
            if node.is_leaf() {
                hasher.update(&[0]);
                for word in &node.taxa.0 {
                    hasher.update(&word.to_le_bytes());
                }
            } else {
                hasher.update(&[1]);
                let child_digests = node
                    .children
                    .iter()
                    .filter_map(|c| digests.remove(c))
                    .sorted_unstable();
                for digest in child_digests {
                    hasher.update(&digest);
                }
            }
            digests.insert(id, *hasher.finalize().as_bytes());
        }
        digests.remove(&self.root).unwrap_or_default()
    }

    /// Writes the tree as a Newick string. Multi-taxon leaves print their
    /// names joined by `+`.
    pub fn to_newick(&self, taxa: &TaxonSet) -> String {
        let mut encoded: FxHashMap<NodeId, String> = FxHashMap::default();
        for id in self.post_order() {
            let node = &self.nodes[id];
            let s = if node.is_leaf() {
                taxa.names_in(&node.taxa).join("+")
            } else {
                let inner = node.children.iter().filter_map(|c| encoded.remove(c)).join(",");
                format!("({inner})")
            };
            encoded.insert(id, s);
        }
        format!("{};", encoded.remove(&self.root).unwrap_or_default())
    }
}
