// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Structural-rewiring seam.
//!
//! Rewiring policy (which synapses form or retract, and when) lives outside
//! this crate. The scheduler only drains a bounded channel of requests at
//! the top of each continuation and hands them to whatever trigger was
//! installed, counting the successes.

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use synfire_core::types::SpikeKey;

/// One requested structural change: connect `pre_key`'s source neuron to the
/// local neuron at `post_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewiringRequest {
    pub pre_key: SpikeKey,
    pub post_index: u32,
}

/// The pluggable rewiring policy. `attempt` returns whether the change was
/// actually made.
pub trait RewiringTrigger {
    fn attempt(&mut self, request: RewiringRequest) -> bool;
}

/// Trigger that rejects every request. Default for runs without structural
/// plasticity and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRewiring;

impl RewiringTrigger for NoRewiring {
    fn attempt(&mut self, _request: RewiringRequest) -> bool {
        false
    }
}

impl<F: FnMut(RewiringRequest) -> bool> RewiringTrigger for F {
    fn attempt(&mut self, request: RewiringRequest) -> bool {
        self(request)
    }
}

/// Bounded request channel between the external rewiring source and the
/// scheduler. Senders that find the channel full drop the request; rewiring
/// is best-effort by design of the seam.
pub fn rewiring_channel(capacity: usize) -> (RewiringSender, Receiver<RewiringRequest>) {
    let (tx, rx) = bounded(capacity);
    (RewiringSender { tx }, rx)
}

#[derive(Debug, Clone)]
pub struct RewiringSender {
    tx: Sender<RewiringRequest>,
}

impl RewiringSender {
    /// Returns false when the channel is full or disconnected.
    pub fn request(&self, request: RewiringRequest) -> bool {
        match self.tx.try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_is_bounded_and_best_effort() {
        let (tx, rx) = rewiring_channel(2);
        let req = RewiringRequest { pre_key: SpikeKey(0x10), post_index: 3 };
        assert!(tx.request(req));
        assert!(tx.request(req));
        assert!(!tx.request(req), "third request must be dropped");
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn closure_triggers_work() {
        let mut seen = Vec::new();
        let mut trigger = |r: RewiringRequest| {
            seen.push(r.post_index);
            r.post_index % 2 == 0
        };
        assert!(trigger.attempt(RewiringRequest { pre_key: SpikeKey(1), post_index: 4 }));
        assert!(!trigger.attempt(RewiringRequest { pre_key: SpikeKey(1), post_index: 5 }));
        assert_eq!(seen, vec![4, 5]);
    }

    #[test]
    fn no_rewiring_rejects() {
        let mut trigger = NoRewiring;
        assert!(!trigger.attempt(RewiringRequest { pre_key: SpikeKey(0), post_index: 0 }));
    }
}
