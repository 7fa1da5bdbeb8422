// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Synfire Observability
//!
//! Logging initialization for host-side runs of the pipeline. On the real
//! core there is no console; everything user-visible flows through the
//! provenance counters. Host simulation and tests use `tracing` and this
//! crate wires up the subscriber.

pub mod init;

pub use init::{init_logging, init_logging_default, LoggingGuard};
