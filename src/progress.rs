//! Progress reporting and cancellation.
//!
//! The caller owns a [`Progress`] sink. The search never calls it on every
//! step; a [`Poller`] samples it at most once per poll interval and latches a
//! cancellation request so that every running branch sees it on its next
//! check.

use crate::bound::BestScore;
use crate::errors::{HybridError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Callbacks from a running computation to whoever started it.
pub trait Progress: Send + Sync {
    /// Still-running heartbeat carrying the current best bound.
    fn pulse(&self, _best: u32) {}

    /// Polled periodically; returning true aborts the computation.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Sink that ignores pulses and never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// Cancellation switch that can be flipped from another thread.
#[derive(Debug, Default, Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Progress for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Time-sampled access to a [`Progress`] sink.
pub struct Poller {
    sink: Arc<dyn Progress>,
    interval: Duration,
    last: Mutex<Instant>,
    cancelled: AtomicBool,
}

impl Poller {
    pub fn new(sink: Arc<dyn Progress>, interval: Duration) -> Self {
        Poller {
            sink,
            interval,
            last: Mutex::new(Instant::now()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Fails with [`HybridError::Cancelled`] once the sink asked to stop.
    ///
    /// Only one thread polls the sink per interval; the others return
    /// straight away unless cancellation has already been latched. The bound
    /// is read while polling so pulses arrive in bound order.
    pub fn check(&self, bound: &BestScore) -> Result<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(HybridError::Cancelled);
        }
        if let Ok(mut last) = self.last.try_lock() {
            if last.elapsed() >= self.interval {
                *last = Instant::now();
                self.sink.pulse(bound.get());
                if self.sink.is_cancelled() {
                    self.cancelled.store(true, Ordering::Relaxed);
                    return Err(HybridError::Cancelled);
                }
            }
        }
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_progress_never_cancels() {
        let poller = Poller::new(Arc::new(NoProgress), Duration::ZERO);
        let bound = BestScore::new(3);
        for _ in 0..10 {
            assert!(poller.check(&bound).is_ok());
        }
        assert!(!poller.is_cancelled());
    }

    #[test]
    fn test_cancel_is_latched() {
        let flag = CancelFlag::new();
        let poller = Poller::new(Arc::new(flag.clone()), Duration::ZERO);
        let bound = BestScore::new(1);
        assert!(poller.check(&bound).is_ok());
        flag.cancel();
        assert!(matches!(poller.check(&bound), Err(HybridError::Cancelled)));
        assert!(poller.is_cancelled());
    }

    #[test]
    fn test_sink_not_polled_before_interval() {
        let flag = CancelFlag::new();
        flag.cancel();
        let poller = Poller::new(Arc::new(flag), Duration::from_secs(3600));
        assert!(poller.check(&BestScore::new(1)).is_ok());
    }
}
