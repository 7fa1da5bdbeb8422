// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bounded circular spike history.
//!
//! One instance lives in every synaptic row (pre-synaptic side, capacity 4)
//! and one per post-synaptic neuron (capacity 16). Key semantics:
//! - Fixed capacity: inserting past capacity evicts the oldest entry, it
//!   never grows.
//! - Monotonic: stored times are non-decreasing; a regression is an error.
//! - Window queries return the events in `(start, end]` plus the most recent
//!   event at or before `start`, which plasticity rules need as the trace
//!   baseline for the merge walk.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("non-monotonic event time: last={last}, attempted={attempted}")]
    TimeRegression { last: u32, attempted: u32 },
}

/// Fixed-capacity circular history of `(time, trace)` pairs.
///
/// `CAP` is a compile-time bound; the container itself is a flat pair of
/// arrays so it can be rebuilt from (and written back into) the packed row
/// format without allocation.
#[derive(Debug, Clone, Copy)]
pub struct EventHistory<T, const CAP: usize> {
    times: [u32; CAP],
    traces: [T; CAP],
    len: usize,
}

/// Result of a window query: the events in `(start, end]` in time order,
/// plus the last event at or before `start` (if any) as the baseline.
#[derive(Debug)]
pub struct HistoryWindow<'a, T> {
    pub prev_time: u32,
    pub prev_trace: Option<&'a T>,
    pub times: &'a [u32],
    pub traces: &'a [T],
}

impl<T: Copy + Default, const CAP: usize> Default for EventHistory<T, CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default, const CAP: usize> EventHistory<T, CAP> {
    pub fn new() -> Self {
        Self {
            times: [0; CAP],
            traces: [T::default(); CAP],
            len: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        CAP
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Time of the most recent event, or 0 when empty.
    pub fn last_time(&self) -> u32 {
        if self.len == 0 {
            0
        } else {
            self.times[self.len - 1]
        }
    }

    /// Most recent `(time, trace)` pair.
    pub fn last(&self) -> Option<(u32, &T)> {
        if self.len == 0 {
            None
        } else {
            Some((self.times[self.len - 1], &self.traces[self.len - 1]))
        }
    }

    /// Append an event. Evicts the oldest entry when full (shift, not grow).
    ///
    /// Back-to-back events at the same time are legal; an earlier time is
    /// not.
    pub fn push(&mut self, time: u32, trace: T) -> Result<(), HistoryError> {
        if self.len > 0 && time < self.times[self.len - 1] {
            return Err(HistoryError::TimeRegression {
                last: self.times[self.len - 1],
                attempted: time,
            });
        }
        if self.len == CAP {
            self.times.copy_within(1.., 0);
            self.traces.copy_within(1.., 0);
            self.len -= 1;
        }
        self.times[self.len] = time;
        self.traces[self.len] = trace;
        self.len += 1;
        Ok(())
    }

    /// Stored event times, oldest first.
    pub fn times(&self) -> &[u32] {
        &self.times[..self.len]
    }

    /// Stored traces, oldest first.
    pub fn traces(&self) -> &[T] {
        &self.traces[..self.len]
    }

    /// Events with `start < time <= end`, plus the baseline event at or
    /// before `start`.
    pub fn window(&self, start: u32, end: u32) -> HistoryWindow<'_, T> {
        let times = self.times();
        // First index strictly inside the window.
        let begin = times.partition_point(|&t| t <= start);
        // One past the last index still inside the window.
        let finish = times.partition_point(|&t| t <= end);

        let (prev_time, prev_trace) = if begin == 0 {
            (0, None)
        } else {
            (self.times[begin - 1], Some(&self.traces[begin - 1]))
        };

        HistoryWindow {
            prev_time,
            prev_trace,
            times: &times[begin..finish],
            traces: &self.traces[begin..finish],
        }
    }
}
