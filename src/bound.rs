//! The best hybridization number found so far in one computation.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Shared, monotonically non-increasing upper bound.
///
/// Every value stored here is achievable. Pruning decisions read it under the
/// lock and improvements are written under the lock, so a branch never prunes
/// against a bound that another thread is halfway through lowering.
#[derive(Debug)]
pub struct BestScore {
    value: Mutex<u32>,
}

impl BestScore {
    pub fn new(initial: u32) -> Self {
        BestScore { value: Mutex::new(initial) }
    }

    fn lock(&self) -> MutexGuard<'_, u32> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> u32 {
        *self.lock()
    }

    /// Lowers the bound to `value` if that improves it. Returns true if it did.
    pub fn lower_to(&self, value: u32) -> bool {
        let mut best = self.lock();
        if value < *best {
            *best = value;
            true
        } else {
            false
        }
    }

    /// True if a partial solution costing `cost` could still beat the bound.
    pub fn can_improve(&self, cost: u32) -> bool {
        cost < *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_bound_only_decreases() {
        let bound = BestScore::new(10);
        assert!(bound.lower_to(7));
        assert!(!bound.lower_to(9));
        assert!(!bound.lower_to(7));
        assert_eq!(bound.get(), 7);
        assert!(bound.can_improve(6));
        assert!(!bound.can_improve(7));
    }

    #[test]
    fn test_concurrent_lowering_keeps_minimum() {
        let bound = BestScore::new(1000);
        (0..500u32).into_par_iter().for_each(|v| {
            bound.lower_to(1000 - v);
        });
        assert_eq!(bound.get(), 501);
    }
}
