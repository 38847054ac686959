//! Skip policy and the per-step skip counter.
//!
//! The policy only classifies an error as skippable or not. The limit is
//! enforced separately by [`SkipCounter`], whose check and increment happen
//! in one atomic step so concurrent workers can never overshoot it.

use std::error::Error as StdError;
use std::num::{ParseFloatError, ParseIntError};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ItemError;

/// Decides whether a per-item failure may be skipped.
pub trait SkipPolicy: Send + Sync {
    /// `skip_count` is the number of skips already recorded for the step.
    fn should_skip(&self, error: &ItemError, skip_count: u64) -> bool;
}

/// Skippable iff a numeric parse failure appears in the error's cause chain.
///
/// Any other cause, including ones this policy has never seen, is
/// non-skippable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberFormatSkipPolicy;

impl NumberFormatSkipPolicy {
    fn is_number_format(error: &(dyn StdError + 'static)) -> bool {
        let mut current = Some(error);
        while let Some(err) = current {
            if err.is::<ParseIntError>() || err.is::<ParseFloatError>() {
                return true;
            }
            current = err.source();
        }
        false
    }
}

impl SkipPolicy for NumberFormatSkipPolicy {
    fn should_skip(&self, error: &ItemError, _skip_count: u64) -> bool {
        Self::is_number_format(error)
    }
}

/// Every failure is skippable (the counter still applies the limit).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSkip;

impl SkipPolicy for AlwaysSkip {
    fn should_skip(&self, _error: &ItemError, _skip_count: u64) -> bool {
        true
    }
}

/// No failure is skippable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSkip;

impl SkipPolicy for NeverSkip {
    fn should_skip(&self, _error: &ItemError, _skip_count: u64) -> bool {
        false
    }
}

// ─── SkipCounter ──────────────────────────────────────────────────────────────

/// Running tally of skips for one step execution, bounded by `limit`.
#[derive(Debug)]
pub struct SkipCounter {
    count: AtomicU64,
    limit: u64,
}

impl SkipCounter {
    pub fn new(limit: u64) -> Self {
        Self {
            count: AtomicU64::new(0),
            limit,
        }
    }

    /// Record one skip if the limit allows it.
    ///
    /// Returns the new count, or `None` if the limit is already reached.
    pub fn try_acquire(&self) -> Option<u64> {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.limit).then_some(current + 1)
            })
            .ok()
            .map(|previous| previous + 1)
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}
