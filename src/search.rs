//! Recursive branch-and-bound search for the hybridization number.
//!
//! # Overview
//! One call of [`SearchEngine::solve`] handles one pair of trees:
//! 1. Poll for cancellation and probe the [`ScoreCache`].
//! 2. Check that both trees carry the same taxa.
//! 3. Subtree-reduce the pair unless the caller already did. Isomorphic trees
//!    cost nothing. A structural change drops the ordering constraint.
//! 4. If the trees share a non-trivial cluster, solve the cluster and the
//!    remainder in parallel and add the results up.
//! 5. Trees with at most two leaves cost nothing.
//! 6. Otherwise branch over the leaves of the first tree: remove the leaf's
//!    taxa from both trees, refine, recurse, and add one.
//!
//! # Pruning
//! Every branch knows what has been spent on the path above it and a lower
//! estimate for every sibling subproblem it is joined with. A branch that
//! cannot get below the shared [`BestScore`] is not entered. Only the
//! top-level call lowers the bound since its scores are complete solutions.
//!
//! # Ordering constraint
//! Removing the same set of leaves in a different order leads to the same
//! subproblem. Below a removal of rank `r` only leaves of rank above `r` are
//! tried. Results found under a constraint are cached under their own key.
//!
//! # Scores
//! A [`Score`] is exact when its floor meets its best value. When a call is
//! pruned it still reports the floor it proved, which is always enough for
//! the caller to know it cannot improve the bound either.

use crate::bitset::Bitset;
use crate::bound::BestScore;
use crate::cache::{Score, ScoreCache, SearchKey};
use crate::cluster::{ClusterSplit, cluster_reduce};
use crate::errors::{HybridError, Result};
use crate::progress::Poller;
use crate::refine::refine;
use crate::rooted::RootedTree;
use crate::subtree::{ReductionOutcome, is_isomorphic, reduce_subtrees};
use log::{debug, trace};
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Lower estimate of a subproblem running next to the current one.
///
/// Starts at 1 and is raised to the proven floor once that subproblem is done.
pub type Estimate = Arc<AtomicU32>;

/// Where a call sits in the search.
#[derive(Debug, Clone, Copy)]
struct Frame {
    /// The pair was already subtree-reduced by the caller.
    already_reduced: bool,
    /// Rank of the last removed leaf; only larger ranks may be removed.
    after_rank: Option<u32>,
    top_level: bool,
    /// Reticulations spent on the path from the root of the search.
    above: u32,
}

/// Shared state of one top-level computation.
pub struct SearchEngine {
    cache: ScoreCache,
    bound: BestScore,
    poller: Poller,
    pool: rayon::ThreadPool,
}

impl SearchEngine {
    pub fn new(cache: ScoreCache, bound: BestScore, poller: Poller, pool: rayon::ThreadPool) -> Self {
        SearchEngine { cache, bound, poller, pool }
    }

    pub fn bound(&self) -> &BestScore {
        &self.bound
    }

    pub fn cache(&self) -> &ScoreCache {
        &self.cache
    }

    /// Runs the top-level search on the worker pool.
    ///
    /// `best` of the result only counts what the search itself found; when
    /// nothing beats the starting bound it stays [`Score::UNKNOWN`] and the
    /// floor proves the bound instead.
    pub fn run(&self, tree1: RootedTree, tree2: RootedTree) -> Result<Score> {
        let top = Frame { already_reduced: false, after_rank: None, top_level: true, above: 0 };
        self.pool.install(|| self.solve(tree1, tree2, top, &[]))
    }

    fn solve(
        &self,
        mut tree1: RootedTree,
        mut tree2: RootedTree,
        frame: Frame,
        estimates: &[Estimate],
    ) -> Result<Score> {
        self.poller.check(&self.bound)?;

        let key = SearchKey {
            tree1: tree1.structural_hash(),
            tree2: tree2.structural_hash(),
            after_rank: frame.after_rank,
        };
        if let Some(cached) = self.cache.get(&key) {
            let spent = frame.above.saturating_add(estimate_sum(estimates));
            if cached.is_exact() || !self.bound.can_improve(spent.saturating_add(cached.floor)) {
                return Ok(cached);
            }
        }

        if tree1.taxa() != tree2.taxa() {
            return Err(HybridError::Invariant("subproblem trees carry different taxa".into()));
        }

        let mut after_rank = frame.after_rank;
        if !frame.already_reduced {
            match reduce_subtrees(&mut tree1, &mut tree2)?.outcome {
                ReductionOutcome::Isomorphic => {
                    if frame.top_level {
                        self.bound.lower_to(0);
                    }
                    return Ok(self.cache.insert(key, Score::ZERO));
                }
                ReductionOutcome::Reduced => after_rank = None,
                ReductionOutcome::Irreducible => {}
            }
        }

        if let Some(split) = cluster_reduce(&tree1, &tree2) {
            let score = self.solve_split(split, frame, estimates)?;
            if frame.top_level && self.bound.lower_to(score.best) {
                debug!("bound lowered to {} by cluster split", score.best);
            }
            return Ok(self.cache.insert(key, score));
        }

        if tree1.leaf_count() <= 2 {
            return Ok(self.cache.insert(key, Score::ZERO));
        }

        let score = self.branch_on_leaves(&tree1, &tree2, Frame { after_rank, ..frame }, estimates)?;
        Ok(self.cache.insert(key, score))
    }

    /// Solves the two halves of a cluster split, each pruning with the other
    /// half's estimate.
    fn solve_split(&self, split: ClusterSplit, frame: Frame, estimates: &[Estimate]) -> Result<Score> {
        let ClusterSplit { cluster: (c1, c2), remainder: (r1, r2) } = split;
        let cluster_frame = Frame { already_reduced: true, after_rank: None, top_level: false, ..frame };
        let rest_frame = Frame { already_reduced: false, ..cluster_frame };

        // An isomorphic half costs nothing, so it cannot be assumed to cost 1.
        match (is_isomorphic(&c1, &c2), is_isomorphic(&r1, &r2)) {
            (true, true) => return Ok(Score::ZERO),
            (false, true) => return self.solve(c1, c2, cluster_frame, estimates),
            (true, false) => return self.solve(r1, r2, rest_frame, estimates),
            (false, false) => {}
        }

        let cluster_estimate: Estimate = Arc::new(AtomicU32::new(1));
        let rest_estimate: Estimate = Arc::new(AtomicU32::new(1));
        let with = |other: &Estimate| -> Vec<Estimate> {
            estimates.iter().cloned().chain([Arc::clone(other)]).collect()
        };
        let cluster_estimates = with(&rest_estimate);
        let rest_estimates = with(&cluster_estimate);

        let (cluster, rest) = rayon::join(
            || {
                let score = self.solve(c1, c2, cluster_frame, &cluster_estimates)?;
                cluster_estimate.fetch_max(score.floor, Ordering::SeqCst);
                Ok::<_, HybridError>(score)
            },
            || {
                let score = self.solve(r1, r2, rest_frame, &rest_estimates)?;
                rest_estimate.fetch_max(score.floor, Ordering::SeqCst);
                Ok::<_, HybridError>(score)
            },
        );
        Ok(cluster?.sum(rest?))
    }

    /// Tries every admissible leaf removal and keeps the cheapest.
    fn branch_on_leaves(
        &self,
        tree1: &RootedTree,
        tree2: &RootedTree,
        frame: Frame,
        estimates: &[Estimate],
    ) -> Result<Score> {
        let candidates: Vec<(u32, Bitset)> = tree1
            .all_leaves()
            .into_iter()
            .filter_map(|leaf| {
                let rank = u32::try_from(tree1.taxa_of(leaf).first_one()?).ok()?;
                frame
                    .after_rank
                    .is_none_or(|after| rank > after)
                    .then(|| (rank, tree1.taxa_of(leaf).clone()))
            })
            .collect();
        trace!("{} candidate removals at depth {}", candidates.len(), frame.above);

        let scores = candidates
            .into_par_iter()
            .map(|(rank, removed)| {
                let spent = frame.above.saturating_add(estimate_sum(estimates));
                if !self.bound.can_improve(spent.saturating_add(1)) {
                    // Pruned: this branch would cost at least the removal itself.
                    return Ok(Score { best: Score::UNKNOWN, floor: 1 });
                }

                let mut c1 = tree1.copy_with_taxa_removed(&removed);
                let mut c2 = tree2.copy_with_taxa_removed(&removed);
                refine(&mut c1, &mut c2);

                let child = Frame {
                    already_reduced: false,
                    after_rank: Some(rank),
                    top_level: false,
                    above: frame.above + 1,
                };
                let score = self.solve(c1, c2, child, estimates)?;
                let score = Score::exact(1).sum(score);

                if frame.top_level && self.bound.lower_to(score.best) {
                    debug!("bound lowered to {} by removing rank {rank}", score.best);
                }
                Ok(score)
            })
            .collect::<Result<Vec<Score>>>()?;

        Ok(scores
            .into_iter()
            .reduce(|a, b| Score { best: a.best.min(b.best), floor: a.floor.min(b.floor) })
            .unwrap_or(Score::exact(Score::UNKNOWN)))
    }
}

fn estimate_sum(estimates: &[Estimate]) -> u32 {
    estimates
        .iter()
        .fold(0u32, |sum, e| sum.saturating_add(e.load(Ordering::SeqCst)))
}
