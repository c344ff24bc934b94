//! Memoisation of subproblem scores.
//!
//! Subproblems are keyed by the structural hashes of both trees, so two
//! subproblems that are the same pair of trees share one entry no matter how
//! they were built. The cache is capacity-bounded with least-recently-used
//! eviction; losing an entry only costs recomputation.

use crate::rooted::TreeDigest;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Default number of entries kept before the least recently used is evicted.
pub const DEFAULT_CAPACITY: usize = 5_000_000;

/// What is known about the hybridization number of one subproblem.
///
/// `best` is a value some removal sequence achieves ([`Score::UNKNOWN`] if
/// none was found below the bound). `floor` is proven: no answer is smaller.
/// The score is exact when the two meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub best: u32,
    pub floor: u32,
}

impl Score {
    /// Stand-in for "larger than anything worth tracking".
    pub const UNKNOWN: u32 = u32::MAX / 4;

    pub const ZERO: Score = Score { best: 0, floor: 0 };

    pub fn exact(value: u32) -> Self {
        Score { best: value, floor: value }
    }

    pub fn is_exact(&self) -> bool {
        self.best == self.floor
    }

    /// Combines two facts about the same subproblem.
    pub fn merge(self, other: Score) -> Score {
        Score { best: self.best.min(other.best), floor: self.floor.max(other.floor) }
    }

    /// Score of two independent halves solved one after the other.
    pub fn sum(self, other: Score) -> Score {
        Score {
            best: self.best.saturating_add(other.best).min(Score::UNKNOWN),
            floor: self.floor.saturating_add(other.floor),
        }
    }
}

/// Cache key: both trees plus the ordering constraint the subproblem was
/// searched under. Results found under a constraint only cover part of the
/// removal orders, so they must not answer an unconstrained lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub tree1: TreeDigest,
    pub tree2: TreeDigest,
    pub after_rank: Option<u32>,
}

struct Entry {
    score: Score,
    stamp: u64,
}

/// LRU map with lazy deletion: the order queue may hold stale stamps, which
/// are skipped when evicting.
struct Lru {
    map: FxHashMap<SearchKey, Entry>,
    order: VecDeque<(SearchKey, u64)>,
    capacity: usize,
    counter: u64,
}

impl Lru {
    fn new(capacity: usize) -> Self {
        Lru { map: FxHashMap::default(), order: VecDeque::new(), capacity, counter: 0 }
    }

    fn next_stamp(&mut self) -> u64 {
        let stamp = self.counter;
        self.counter = self.counter.wrapping_add(1);
        stamp
    }

    fn get(&mut self, key: &SearchKey) -> Option<Score> {
        let stamp = self.next_stamp();
        let entry = self.map.get_mut(key)?;
        entry.stamp = stamp;
        let score = entry.score;
        self.order.push_back((*key, stamp));
        self.trim_order();
        Some(score)
    }

    fn insert(&mut self, key: SearchKey, score: Score) -> Score {
        let stamp = self.next_stamp();
        let merged = match self.map.get(&key) {
            Some(old) => old.score.merge(score),
            None => score,
        };
        self.map.insert(key, Entry { score: merged, stamp });
        self.order.push_back((key, stamp));
        self.evict();
        self.trim_order();
        merged
    }

    fn evict(&mut self) {
        while self.map.len() > self.capacity {
            let Some((key, stamp)) = self.order.pop_front() else {
                break;
            };
            if self.map.get(&key).is_some_and(|e| e.stamp == stamp) {
                self.map.remove(&key);
            }
        }
    }

    /// Drops stale queue entries once they outnumber the live ones.
    fn trim_order(&mut self) {
        if self.order.len() <= 2 * self.map.len() + 1024 {
            return;
        }
        let map = &self.map;
        self.order.retain(|(key, stamp)| map.get(key).is_some_and(|e| e.stamp == *stamp));
    }
}

/// Thread-safe score cache shared by every branch of one computation.
pub struct ScoreCache {
    inner: Mutex<Lru>,
}

impl ScoreCache {
    pub fn new(capacity: usize) -> Self {
        ScoreCache { inner: Mutex::new(Lru::new(capacity.max(1))) }
    }

    /// Looks up a subproblem and marks it recently used.
    pub fn get(&self, key: &SearchKey) -> Option<Score> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).get(key)
    }

    /// Stores a score, merged with whatever is already known, so a slower
    /// branch never overwrites a better result. Returns the stored value.
    pub fn insert(&self, key: SearchKey, score: Score) -> Score {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).insert(key, score)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ScoreCache {
    fn default() -> Self {
        ScoreCache::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(n: u64) -> TreeDigest {
        let mut d = [0u8; 32];
        d[..8].copy_from_slice(&n.to_le_bytes());
        d
    }

    fn key(n: u64) -> SearchKey {
        SearchKey { tree1: digest(n), tree2: digest(n + 1), after_rank: None }
    }

    #[test]
    fn test_merge_keeps_better_facts() {
        let a = Score { best: 5, floor: 2 };
        let b = Score { best: 7, floor: 4 };
        assert_eq!(a.merge(b), Score { best: 5, floor: 4 });
        assert!(Score::exact(3).is_exact());
        assert_eq!(a.sum(b), Score { best: 12, floor: 6 });
        assert_eq!(Score::exact(Score::UNKNOWN).sum(a).best, Score::UNKNOWN);
    }

    #[test]
    fn test_insert_never_worsens_entry() {
        let cache = ScoreCache::new(16);
        cache.insert(key(1), Score::exact(2));
        let stored = cache.insert(key(1), Score { best: Score::UNKNOWN, floor: 1 });
        assert_eq!(stored, Score::exact(2));
        assert_eq!(cache.get(&key(1)), Some(Score::exact(2)));
    }

    #[test]
    fn test_constraint_is_part_of_key() {
        let cache = ScoreCache::new(16);
        let constrained = SearchKey { after_rank: Some(3), ..key(1) };
        cache.insert(constrained, Score::exact(4));
        assert_eq!(cache.get(&key(1)), None);
        assert_eq!(cache.get(&constrained), Some(Score::exact(4)));
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let cache = ScoreCache::new(2);
        cache.insert(key(1), Score::exact(1));
        cache.insert(key(2), Score::exact(2));
        // Touch 1 so that 2 becomes the oldest.
        assert!(cache.get(&key(1)).is_some());
        cache.insert(key(3), Score::exact(3));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key(2)), None);
        assert_eq!(cache.get(&key(1)), Some(Score::exact(1)));
        assert_eq!(cache.get(&key(3)), Some(Score::exact(3)));
    }

    #[test]
    fn test_many_reads_stay_bounded() {
        let cache = ScoreCache::new(4);
        cache.insert(key(1), Score::exact(1));
        for _ in 0..10_000 {
            cache.get(&key(1));
        }
        let order_len = cache.inner.lock().unwrap().order.len();
        assert!(order_len <= 1027);
    }
}
