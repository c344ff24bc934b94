//! Hybridization number of two rooted trees: configuration and driver.
//!
//! # Example
//! ```
//! use hybridization_number::hybrid::from_newick;
//!
//! let h = from_newick("(((a,b),c),d);", "(((a,c),b),d);").unwrap();
//! assert_eq!(h, 1);
//! ```

use crate::bound::BestScore;
use crate::cache::{DEFAULT_CAPACITY, ScoreCache};
use crate::errors::{HybridError, Result};
use crate::heuristic::estimate_upper_bound;
use crate::preprocess::{parse_newick, preprocess};
use crate::progress::{NoProgress, Poller, Progress};
use crate::refine::refine;
use crate::search::SearchEngine;
use log::{debug, info};
use phylotree::tree::Tree as PhyloTree;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Knobs of one computation.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Worker threads of the search pool.
    pub threads: usize,
    /// Entries kept in the score cache.
    pub cache_capacity: usize,
    /// Minimum time between two polls of the progress sink.
    pub poll_interval: Duration,
    /// A hybridization number known to be achievable. When unset the greedy
    /// heuristic provides the starting bound.
    pub upper_bound: Option<u32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            threads: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            cache_capacity: DEFAULT_CAPACITY,
            poll_interval: Duration::from_millis(100),
            upper_bound: None,
        }
    }
}

/// Computes hybridization numbers with a fixed configuration and sink.
pub struct HybridizationNumber {
    config: SearchConfig,
    progress: Arc<dyn Progress>,
}

impl HybridizationNumber {
    pub fn new(config: SearchConfig) -> Self {
        HybridizationNumber { config, progress: Arc::new(NoProgress) }
    }

    /// Reports pulses to `sink` and stops when it asks to.
    pub fn with_progress(mut self, sink: Arc<dyn Progress>) -> Self {
        self.progress = sink;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Hybridization number of `tree1` and `tree2` over their shared taxa.
    ///
    /// # Errors
    /// - input errors from [`preprocess`],
    /// - [`HybridError::BoundTooLow`] if a caller bound is below the answer,
    /// - [`HybridError::Cancelled`] if the progress sink cancelled,
    /// - [`HybridError::Invariant`] if the search contradicts its own bound.
    pub fn run(&self, tree1: &PhyloTree, tree2: &PhyloTree) -> Result<u32> {
        let start = Instant::now();
        let (taxa, mut t1, mut t2) = preprocess(tree1, tree2)?;
        refine(&mut t1, &mut t2);
        t1.reorder();
        t2.reorder();

        // A caller bound is only trusted to be an upper limit: starting one
        // above it lets the search find that value itself.
        let initial = match self.config.upper_bound {
            Some(known) => known.saturating_add(1),
            None => estimate_upper_bound(&t1, &t2)?,
        };
        debug!(
            "searching {} taxa with initial bound {initial} on {} threads",
            taxa.len(),
            self.config.threads
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads.max(1))
            .build()?;
        let engine = SearchEngine::new(
            ScoreCache::new(self.config.cache_capacity),
            BestScore::new(initial),
            Poller::new(Arc::clone(&self.progress), self.config.poll_interval),
            pool,
        );
        let score = engine.run(t1, t2)?;
        let bound = engine.bound().get();

        // Seeded at `known + 1`: finding nothing at or below `known` proves
        // the answer is above it, whatever floor the pruned halves reported.
        if let Some(known) = self.config.upper_bound.filter(|&known| score.best > known) {
            return Err(HybridError::BoundTooLow(known));
        }
        if score.best < bound {
            return Err(HybridError::Invariant(format!(
                "search found {} but the shared bound is {bound}",
                score.best
            )));
        }
        if score.floor != bound {
            return Err(HybridError::Invariant(format!(
                "search proved {} but the shared bound is {bound}",
                score.floor
            )));
        }

        info!(
            "hybridization number {bound} ({} cached subproblems, {:.2?})",
            engine.cache().len(),
            start.elapsed()
        );
        Ok(bound)
    }
}

/// Hybridization number with the default configuration.
///
/// `upper_bound`, when given, must be achievable or at least the answer.
pub fn compute_hybridization_number(
    tree1: &PhyloTree,
    tree2: &PhyloTree,
    upper_bound: Option<u32>,
) -> Result<u32> {
    let config = SearchConfig { upper_bound, ..SearchConfig::default() };
    HybridizationNumber::new(config).run(tree1, tree2)
}

/// Parses two Newick strings and computes their hybridization number.
pub fn from_newick(newick1: &str, newick2: &str) -> Result<u32> {
    let tree1 = parse_newick(newick1)?;
    let tree2 = parse_newick(newick2)?;
    compute_hybridization_number(&tree1, &tree2, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CancelFlag;
    use itertools::Itertools;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_log::test;

    fn number(a: &str, b: &str, threads: usize) -> Result<u32> {
        let config = SearchConfig { threads, ..SearchConfig::default() };
        HybridizationNumber::new(config).run(&parse_newick(a)?, &parse_newick(b)?)
    }

    const FORWARD8: &str = "(a,(b,(c,(d,(e,(f,(g,h)))))));";
    const REVERSE8: &str = "(h,(g,(f,(e,(d,(c,(b,a)))))));";

    #[test]
    fn test_identical_topology_is_zero() {
        assert_eq!(from_newick("((a,b),(c,d));", "((c,d),(b,a));").unwrap(), 0);
    }

    #[test]
    fn test_crossing_cherries() {
        // No single prune and regraft turns one into the other.
        assert_eq!(from_newick("((a,b),(c,d));", "((a,c),(b,d));").unwrap(), 2);
    }

    #[test]
    fn test_one_moved_leaf() {
        assert_eq!(from_newick("((((a,b),c),d),e);", "((((a,d),b),c),e);").unwrap(), 1);
    }

    #[test]
    fn test_unshared_taxon_is_ignored() {
        let with_extra = from_newick("(((a,b),x),(c,d));", "((a,c),(b,d));").unwrap();
        let restricted = from_newick("((a,b),(c,d));", "((a,c),(b,d));").unwrap();
        assert_eq!(with_extra, restricted);
    }

    #[test]
    fn test_multifurcations_are_refined() {
        // The polytomy can be resolved to match the other tree.
        assert_eq!(from_newick("((a,b,c),d);", "(((a,c),b),d);").unwrap(), 0);
    }

    #[test]
    fn test_disjoint_taxa_rejected() {
        let err = from_newick("((a,b),c);", "((d,e),f);").unwrap_err();
        assert!(matches!(err, HybridError::DisjointTaxa));
    }

    #[test]
    fn test_caller_bound() {
        let t1 = parse_newick("((a,b),(c,d));").unwrap();
        let t2 = parse_newick("((a,c),(b,d));").unwrap();
        assert_eq!(compute_hybridization_number(&t1, &t2, Some(5)).unwrap(), 2);
        assert_eq!(compute_hybridization_number(&t1, &t2, Some(2)).unwrap(), 2);
        let err = compute_hybridization_number(&t1, &t2, Some(1)).unwrap_err();
        assert!(matches!(err, HybridError::BoundTooLow(1)));
    }

    #[test]
    fn test_caller_bound_below_cluster_split() {
        let t1 = parse_newick("(((a,b),c),((d,e),f));").unwrap();
        let t2 = parse_newick("(((a,c),b),((d,f),e));").unwrap();
        for known in [0, 1] {
            let err = compute_hybridization_number(&t1, &t2, Some(known)).unwrap_err();
            assert!(matches!(err, HybridError::BoundTooLow(k) if k == known), "{known}: {err:?}");
        }
        assert_eq!(compute_hybridization_number(&t1, &t2, Some(2)).unwrap(), 2);
        assert_eq!(compute_hybridization_number(&t1, &t2, None).unwrap(), 2);
    }

    #[test]
    fn test_symmetric_on_fixed_trees() {
        let trees = [
            "((((a,b),c),d),(e,f));",
            "(((a,c),(b,d)),(e,f));",
            "((a,(b,(c,d))),(e,f));",
            "(((e,a),b),((c,f),d));",
        ];
        for (x, y) in trees.iter().tuple_combinations() {
            assert_eq!(number(x, y, 2).unwrap(), number(y, x, 2).unwrap(), "{x} vs {y}");
        }
    }

    #[test]
    fn test_thread_count_does_not_change_result() {
        let single = number(FORWARD8, REVERSE8, 1).unwrap();
        let many = number(FORWARD8, REVERSE8, 4).unwrap();
        assert_eq!(single, many);
    }

    /// Records every pulse and cancels after a given number of polls.
    #[derive(Default)]
    struct Recorder {
        pulses: Mutex<Vec<u32>>,
        polls: AtomicUsize,
        cancel_after: Option<usize>,
    }

    impl Progress for Recorder {
        fn pulse(&self, best: u32) {
            self.pulses.lock().unwrap().push(best);
        }

        fn is_cancelled(&self) -> bool {
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            self.cancel_after.is_some_and(|limit| polls >= limit)
        }
    }

    #[test]
    fn test_bound_never_increases() {
        let recorder = Arc::new(Recorder::default());
        let config = SearchConfig { threads: 4, poll_interval: Duration::ZERO, ..SearchConfig::default() };
        let h = HybridizationNumber::new(config)
            .with_progress(recorder.clone())
            .run(&parse_newick(FORWARD8).unwrap(), &parse_newick(REVERSE8).unwrap())
            .unwrap();

        let pulses = recorder.pulses.lock().unwrap();
        assert!(!pulses.is_empty());
        assert!(pulses.iter().tuple_windows().all(|(a, b)| b <= a));
        assert!(pulses.iter().all(|&p| p >= h));
    }

    #[test]
    fn test_cancellation_stops_search() {
        let recorder = Arc::new(Recorder { cancel_after: Some(3), ..Recorder::default() });
        let config = SearchConfig { threads: 2, poll_interval: Duration::ZERO, ..SearchConfig::default() };
        let err = HybridizationNumber::new(config)
            .with_progress(recorder)
            .run(&parse_newick(FORWARD8).unwrap(), &parse_newick(REVERSE8).unwrap())
            .unwrap_err();
        assert!(matches!(err, HybridError::Cancelled));
    }

    #[test]
    fn test_cancel_flag_before_start() {
        let flag = CancelFlag::new();
        flag.cancel();
        let config = SearchConfig { poll_interval: Duration::ZERO, ..SearchConfig::default() };
        let err = HybridizationNumber::new(config)
            .with_progress(Arc::new(flag))
            .run(&parse_newick(FORWARD8).unwrap(), &parse_newick(REVERSE8).unwrap())
            .unwrap_err();
        assert!(matches!(err, HybridError::Cancelled));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::preprocess::from_newick_pair;
    use proptest::prelude::*;

    fn number(a: &str, b: &str) -> u32 {
        let config = SearchConfig { threads: 2, ..SearchConfig::default() };
        HybridizationNumber::new(config)
            .run(&parse_newick(a).unwrap(), &parse_newick(b).unwrap())
            .unwrap()
    }

    /// Builds a binary tree on `n` taxa by repeatedly joining two of the
    /// remaining subtrees picked by `picks`.
    fn random_newick(n: usize, picks: &[(usize, usize)]) -> String {
        let mut parts: Vec<String> = (0..n).map(|i| format!("t{i}")).collect();
        for &(i, j) in picks.iter().take(n - 1) {
            let first = parts.swap_remove(i % parts.len());
            let second = parts.swap_remove(j % parts.len());
            parts.push(format!("({first},{second})"));
        }
        format!("{};", parts[0])
    }

    fn tree_pair() -> impl Strategy<Value = (String, String)> {
        let picks = || proptest::collection::vec((any::<usize>(), any::<usize>()), 6);
        (4usize..=7, picks(), picks())
            .prop_map(|(n, p1, p2)| (random_newick(n, &p1), random_newick(n, &p2)))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn identity_is_zero((t1, _) in tree_pair()) {
            prop_assert_eq!(from_newick(&t1, &t1).unwrap(), 0);
        }

        #[test]
        fn symmetric((t1, t2) in tree_pair()) {
            prop_assert_eq!(number(&t1, &t2), number(&t2, &t1));
        }

        #[test]
        fn never_above_heuristic((t1, t2) in tree_pair()) {
            let (_, r1, r2) = from_newick_pair(&t1, &t2).unwrap();
            let greedy = estimate_upper_bound(&r1, &r2).unwrap();
            prop_assert!(number(&t1, &t2) <= greedy);
        }
    }
}
