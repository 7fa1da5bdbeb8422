// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Free-running timer abstraction.
//!
//! The flush-deadline logic only needs a monotonically advancing tick
//! counter it can sample; the trait keeps the scheduler testable against a
//! scripted clock and portable to a hardware counter register.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub trait FreeRunningTimer {
    /// Current tick count. Wraps; callers compare with wrapping subtraction.
    fn ticks(&self) -> u32;
}

/// Host clock: one tick per microsecond since construction.
#[derive(Debug)]
pub struct HostTimer {
    start: Instant,
}

impl HostTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for HostTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FreeRunningTimer for HostTimer {
    fn ticks(&self) -> u32 {
        self.start.elapsed().as_micros() as u32
    }
}

/// Manually advanced timer for deterministic simulation and tests.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    ticks: Arc<AtomicU32>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ticks: u32) {
        self.ticks.fetch_add(ticks, Ordering::Relaxed);
    }

    pub fn set(&self, ticks: u32) {
        self.ticks.store(ticks, Ordering::Relaxed);
    }
}

impl FreeRunningTimer for ManualTimer {
    fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_advances_on_demand() {
        let timer = ManualTimer::new();
        assert_eq!(timer.ticks(), 0);
        timer.advance(10);
        assert_eq!(timer.ticks(), 10);
        let handle = timer.clone();
        handle.advance(5);
        assert_eq!(timer.ticks(), 15, "clones share the counter");
    }

    #[test]
    fn host_timer_is_monotonic() {
        let timer = HostTimer::new();
        let a = timer.ticks();
        let b = timer.ticks();
        assert!(b >= a);
    }
}
