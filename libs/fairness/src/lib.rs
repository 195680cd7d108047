//! Fairness-bounded scheduling policy primitives.
//!
//! This library provides the pure decision logic for pairing waiting queue
//! tokens with free service counters. Key concepts:
//!
//! - **Fairness window**: a token may only be served if its number is within
//!   a configured threshold of the earliest still-waiting token.
//! - **Counter ranking**: free counters are offered work oldest-idle-first.
//!
//! # Invariants
//!
//! - Decisions are deterministic given the same inputs
//! - No token outside the fairness window is ever selected
//! - Candidate scans are bounded by the threshold, not the queue length

use chrono::{DateTime, Duration, Utc};

/// Default maximum number of tokens a counter may skip ahead.
pub const DEFAULT_FAIRNESS_THRESHOLD: u32 = 3;

/// Default interval between automatic assignment cycles.
pub const DEFAULT_AUTO_ASSIGN_INTERVAL_SECS: u64 = 5;

/// Default maximum serving time before a token is force-completed.
pub const DEFAULT_MAX_SERVING_TIME_SECS: u64 = 600;

/// Default per-token minutes used for estimated-wait display.
pub const DEFAULT_PER_TOKEN_MINUTES: u32 = 2;

/// Fairness policy for token selection.
///
/// Pure token-number order would idle every other counter whenever the
/// earliest token cannot be served yet; the threshold trades a small,
/// bounded fairness slack for counter throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FairnessPolicy {
    /// Maximum allowed gap between the earliest waiting token and one
    /// served ahead of it.
    pub threshold: u32,
}

impl Default for FairnessPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_FAIRNESS_THRESHOLD,
        }
    }
}

impl FairnessPolicy {
    /// Create a policy with the given threshold.
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    /// Check whether a candidate token number is inside the fairness window.
    ///
    /// `earliest_waiting` is the smallest token number still waiting across
    /// the whole queue. With nothing waiting, every candidate qualifies.
    pub fn is_within_window(&self, candidate: i64, earliest_waiting: Option<i64>) -> bool {
        match earliest_waiting {
            Some(earliest) => candidate <= earliest + i64::from(self.threshold),
            None => true,
        }
    }

    /// Select the next servable token number from an ascending waiting list.
    ///
    /// Scans at most `threshold + 1` candidates: only tokens within the
    /// window of the earliest waiting token can ever qualify, so the search
    /// is O(threshold) rather than O(queue length).
    pub fn next_servable(&self, waiting_ascending: &[i64]) -> Option<i64> {
        let earliest = waiting_ascending.first().copied();
        waiting_ascending
            .iter()
            .take(self.threshold as usize + 1)
            .copied()
            .find(|&candidate| self.is_within_window(candidate, earliest))
    }
}

/// Sort key ranking free counters for assignment.
///
/// Never-used counters (no completion yet) come first, then oldest
/// `last_completed_at` first, with the counter id as a deterministic
/// tie-break. `Option`'s ordering places `None` before any timestamp.
pub fn counter_rank_key(
    last_completed_at: Option<DateTime<Utc>>,
    counter_id: i64,
) -> (Option<DateTime<Utc>>, i64) {
    (last_completed_at, counter_id)
}

/// Rank free counters into assignment order.
///
/// Returns the counters sorted so the one idle longest is offered work
/// first.
pub fn rank_free_counters<T, F>(counters: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> (Option<DateTime<Utc>>, i64),
{
    let mut with_key: Vec<_> = counters
        .into_iter()
        .map(|c| {
            let k = key(&c);
            (k, c)
        })
        .collect();
    with_key.sort_by_key(|(k, _)| *k);
    with_key.into_iter().map(|(_, c)| c).collect()
}

/// Serving-time backstop against a counter operator forgetting to mark
/// completion.
#[derive(Debug, Clone, Copy)]
pub struct ServingDeadline {
    max_serving: Duration,
}

impl ServingDeadline {
    /// Create a deadline from a maximum serving time in seconds.
    pub fn from_secs(max_serving_secs: u64) -> Self {
        Self {
            max_serving: Duration::seconds(max_serving_secs as i64),
        }
    }

    /// A serving session is overdue once it has run strictly longer than
    /// the maximum serving time.
    pub fn is_overdue(&self, started_serving: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - started_serving > self.max_serving
    }
}

/// Estimated wait in minutes for a token with `tokens_ahead` active tokens
/// before it. A freshly issued token waits at least one slot.
pub fn estimated_wait_minutes(tokens_ahead: u64, per_token_minutes: u32) -> u64 {
    (tokens_ahead + 1) * u64::from(per_token_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[rstest]
    #[case(1, Some(1), true)]
    #[case(4, Some(1), true)]
    #[case(5, Some(1), false)]
    #[case(2, Some(2), true)]
    #[case(5, Some(2), true)]
    #[case(6, Some(2), false)]
    #[case(100, None, true)]
    fn window_bounds(#[case] candidate: i64, #[case] earliest: Option<i64>, #[case] ok: bool) {
        let policy = FairnessPolicy::new(3);
        assert_eq!(policy.is_within_window(candidate, earliest), ok);
    }

    #[test]
    fn zero_threshold_allows_only_the_earliest() {
        let policy = FairnessPolicy::new(0);
        assert!(policy.is_within_window(7, Some(7)));
        assert!(!policy.is_within_window(8, Some(7)));
    }

    #[test]
    fn next_servable_empty_queue() {
        let policy = FairnessPolicy::default();
        assert_eq!(policy.next_servable(&[]), None);
    }

    #[test]
    fn next_servable_returns_earliest() {
        let policy = FairnessPolicy::new(3);
        assert_eq!(policy.next_servable(&[1, 2, 3, 4, 5, 6]), Some(1));
    }

    #[test]
    fn window_advances_as_earliest_moves() {
        // Tokens #1..#6, threshold 3. Once #1 is serving the waiting set
        // starts at #2, so #3..#5 are within 2+3=5 but #6 is not.
        let policy = FairnessPolicy::new(3);
        let waiting = [2i64, 3, 4, 5, 6];
        assert_eq!(policy.next_servable(&waiting), Some(2));
        for candidate in [3i64, 4, 5] {
            assert!(policy.is_within_window(candidate, waiting.first().copied()));
        }
        assert!(!policy.is_within_window(6, waiting.first().copied()));
    }

    #[test]
    fn next_servable_never_exceeds_window() {
        let policy = FairnessPolicy::new(3);
        for len in 0..20usize {
            let waiting: Vec<i64> = (10..10 + len as i64).collect();
            if let Some(picked) = policy.next_servable(&waiting) {
                let earliest = waiting[0];
                assert!(picked <= earliest + 3);
            } else {
                assert!(waiting.is_empty());
            }
        }
    }

    #[test]
    fn counters_ranked_never_used_first_then_oldest() {
        let counters = vec![
            (1i64, Some(ts(500))),
            (2, None),
            (3, Some(ts(100))),
            (4, None),
        ];
        let ranked = rank_free_counters(counters, |(id, last)| counter_rank_key(*last, *id));
        let ids: Vec<i64> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 4, 3, 1]);
    }

    #[test]
    fn deadline_boundary() {
        let deadline = ServingDeadline::from_secs(600);
        let now = ts(10_000);
        assert!(deadline.is_overdue(ts(10_000 - 601), now));
        assert!(!deadline.is_overdue(ts(10_000 - 599), now));
        // Exactly at the limit is not yet overdue.
        assert!(!deadline.is_overdue(ts(10_000 - 600), now));
    }

    #[rstest]
    #[case(0, 2, 2)]
    #[case(3, 2, 8)]
    #[case(5, 1, 6)]
    fn wait_estimate(#[case] ahead: u64, #[case] per_token: u32, #[case] expected: u64) {
        assert_eq!(estimated_wait_minutes(ahead, per_token), expected);
    }
}
