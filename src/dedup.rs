//! Enclosed-occurrence suppression.
//!
//! Under [`DedupPolicy::KeepMaximal`] an occurrence whose byte span lies
//! strictly inside another occurrence's span is dropped. Occurrences with
//! identical spans are all kept unless they also share a label, in which case
//! only the first (lowest miner index) survives.
//!
//! Candidates are ordered by start ascending, end descending, miner index
//! ascending. In that order every potential encloser of a candidate comes
//! before it, so one pass with a running frontier decides each candidate,
//! and the frontier carries over from one scan window to the next.

use crate::miner::Hit;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// What to do with occurrences nested inside other occurrences
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Report everything
    #[default]
    KeepAll,
    /// Drop strictly enclosed occurrences and exact duplicates
    KeepMaximal,
}

impl DedupPolicy {
    /// `KeepMaximal` when `suppress` is set
    pub fn from_suppress_enclosed(suppress: bool) -> Self {
        if suppress {
            DedupPolicy::KeepMaximal
        } else {
            DedupPolicy::KeepAll
        }
    }
}

/// A raw hit placed in the stream
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub(crate) start: usize,
    pub(crate) end: usize,
    /// Registration index of the producing miner
    pub(crate) miner: usize,
    pub(crate) hit: Hit,
}

/// Put candidates in presentation order
pub(crate) fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_unstable_by_key(|c| (c.start, Reverse(c.end), c.miner));
}

/// True if `inner` lies strictly inside `outer`
pub fn is_enclosed(inner: (usize, usize), outer: (usize, usize)) -> bool {
    outer.0 <= inner.0 && inner.1 <= outer.1 && outer != inner
}

/// Streaming filter state
#[derive(Debug, Default)]
pub(crate) struct EnclosedFilter {
    /// Largest end seen so far, with the smallest start reaching it
    frontier: Option<(usize, usize)>,
    suppressed: u64,
}

impl EnclosedFilter {
    /// Filter one window's sorted candidates.
    pub(crate) fn apply(&mut self, policy: DedupPolicy, candidates: Vec<Candidate>) -> Vec<Candidate> {
        if policy == DedupPolicy::KeepAll {
            for c in &candidates {
                self.advance(c);
            }
            return candidates;
        }

        let mut seen: FxHashSet<(usize, usize, String)> = FxHashSet::default();
        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let enclosed = match self.frontier {
                Some((max_end, start_at_max)) => {
                    max_end > candidate.end
                        || (max_end == candidate.end && start_at_max < candidate.start)
                }
                None => false,
            };
            self.advance(&candidate);

            if enclosed
                || !seen.insert((candidate.start, candidate.end, candidate.hit.label.clone()))
            {
                self.suppressed += 1;
                continue;
            }
            kept.push(candidate);
        }
        kept
    }

    /// Number of candidates dropped so far
    pub(crate) fn suppressed(&self) -> u64 {
        self.suppressed
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    fn advance(&mut self, c: &Candidate) {
        self.frontier = match self.frontier {
            Some((max_end, start)) if max_end >= c.end => Some((max_end, start)),
            _ => Some((c.end, c.start)),
        };
    }
}
