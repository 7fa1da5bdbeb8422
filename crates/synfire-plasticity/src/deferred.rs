// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The deferred-update merge walk.
//!
//! Runs once per row per DMA fetch, per plastic synapse: both event streams
//! are walked forward in time from the row's last-update time to the current
//! pre-spike, applying the rule at each crossing. Ties between a pre and a
//! post event at the same time break in favour of the pre event, so
//! back-to-back identical timestamps process deterministically.

use crate::rule::{PlasticityRule, WeightUpdate};
use synfire_core::event_history::EventHistory;

/// Merge the pre/post histories over `(last_update_time, current_time]` and
/// produce the updated clamped weight for one synapse.
///
/// An empty window returns `old_weight` untouched (idempotence: fetching a
/// row twice without intervening events must not drift its weights).
pub fn deferred_weight_update<R, const PRE_CAP: usize, const POST_CAP: usize>(
    rule: &R,
    pre_history: &EventHistory<R::PreTrace, PRE_CAP>,
    post_history: &EventHistory<R::PostTrace, POST_CAP>,
    last_update_time: u32,
    current_time: u32,
    old_weight: u16,
) -> WeightUpdate
where
    R: PlasticityRule,
{
    let pre_window = pre_history.window(last_update_time, current_time);
    let post_window = post_history.window(last_update_time, current_time);

    let mut last_pre_time = pre_window.prev_time;
    let mut last_pre_trace = pre_window.prev_trace.copied().unwrap_or(rule.initial_pre_trace());
    let mut last_post_time = post_window.prev_time;
    let mut last_post_trace = post_window
        .prev_trace
        .copied()
        .unwrap_or(rule.initial_post_trace());

    let mut state = rule.initial_update_state();
    let mut pre_at = 0;
    let mut post_at = 0;

    while pre_at < pre_window.times.len() || post_at < post_window.times.len() {
        let next_pre = pre_window.times.get(pre_at).copied();
        let next_post = post_window.times.get(post_at).copied();

        // Tie-break: the pre event goes first.
        let take_pre = match (next_pre, next_post) {
            (Some(p), Some(q)) => p <= q,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if take_pre {
            let time = pre_window.times[pre_at];
            state = rule.apply_pre_event(
                state,
                time,
                last_pre_time,
                last_pre_trace,
                last_post_time,
                last_post_trace,
            );
            last_pre_time = time;
            last_pre_trace = pre_window.traces[pre_at];
            pre_at += 1;
        } else {
            let time = post_window.times[post_at];
            state = rule.apply_post_event(
                state,
                time,
                last_pre_time,
                last_pre_trace,
                last_post_time,
                last_post_trace,
            );
            last_post_time = time;
            last_post_trace = post_window.traces[post_at];
            post_at += 1;
        }
    }

    rule.finalize(state, old_weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::FIXED_ONE;
    use crate::pair::{PairRule, PairRuleConfig};
    use crate::weight_dependence::{AdditiveWeightDependence, WeightDependenceRecord};

    type Pre = EventHistory<u16, 4>;
    type Post = EventHistory<u16, 16>;

    fn rule() -> PairRule {
        let dependence = AdditiveWeightDependence::from_global_record(WeightDependenceRecord {
            min_weight: 0,
            max_weight: u16::MAX,
            a2_plus: FIXED_ONE,
            a2_minus: FIXED_ONE,
        })
        .unwrap();
        PairRule::new(PairRuleConfig::default(), dependence)
    }

    fn history_with(rule: &PairRule, times: &[u32], pre: bool) -> (Vec<u32>, Vec<u16>) {
        let mut trace = 0u16;
        let mut last = 0u32;
        let mut traces = Vec::new();
        for &t in times {
            trace = if pre {
                rule.add_pre_spike(t, last, trace)
            } else {
                rule.add_post_spike(t, last, trace)
            };
            last = t;
            traces.push(trace);
        }
        (times.to_vec(), traces)
    }

    fn fill<const CAP: usize>(h: &mut EventHistory<u16, CAP>, times: &[u32], traces: &[u16]) {
        for (&t, &v) in times.iter().zip(traces) {
            h.push(t, v).unwrap();
        }
    }

    #[test]
    fn empty_window_is_idempotent() {
        let r = rule();
        let pre = Pre::new();
        let post = Post::new();
        let update = deferred_weight_update(&r, &pre, &post, 100, 200, 4242);
        assert_eq!(update.weight, 4242);
        assert!(!update.saturated);
    }

    #[test]
    fn post_after_pre_raises_weight() {
        let r = rule();
        let mut pre = Pre::new();
        let mut post = Post::new();
        let (pt, px) = history_with(&r, &[10], true);
        fill(&mut pre, &pt, &px);
        let (qt, qx) = history_with(&r, &[14], false);
        fill(&mut post, &qt, &qx);

        let update = deferred_weight_update(&r, &pre, &post, 0, 20, 1000);
        assert!(update.weight > 1000);
    }

    #[test]
    fn pre_after_post_lowers_weight() {
        let r = rule();
        let mut pre = Pre::new();
        let mut post = Post::new();
        let (qt, qx) = history_with(&r, &[10], false);
        fill(&mut post, &qt, &qx);
        let (pt, px) = history_with(&r, &[14], true);
        fill(&mut pre, &pt, &px);

        let update = deferred_weight_update(&r, &pre, &post, 0, 20, 1000);
        assert!(update.weight < 1000);
    }

    #[test]
    fn identical_back_to_back_pre_spikes_walk_deterministically() {
        let r = rule();
        let mut pre = Pre::new();
        let mut post = Post::new();
        // Two pre-spikes at the same time, plus a post at that same time.
        let (pt, px) = history_with(&r, &[10, 10], true);
        fill(&mut pre, &pt, &px);
        let (qt, qx) = history_with(&r, &[10], false);
        fill(&mut post, &qt, &qx);

        let a = deferred_weight_update(&r, &pre, &post, 0, 20, 1000);
        let b = deferred_weight_update(&r, &pre, &post, 0, 20, 1000);
        assert_eq!(a, b, "tie order is fixed, the walk is deterministic");
    }

    #[test]
    fn events_outside_window_are_ignored() {
        let r = rule();
        let mut pre = Pre::new();
        let post = Post::new();
        let (pt, px) = history_with(&r, &[5, 30], true);
        fill(&mut pre, &pt, &px);

        // Window (10, 20] excludes both pre events; nothing should change.
        let update = deferred_weight_update(&r, &pre, &post, 10, 20, 555);
        assert_eq!(update.weight, 555);
    }
}
