// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Synfire Config
//!
//! TOML-based configuration for the synaptic delivery pipeline, with
//! environment-variable overrides and validation. The loading order is:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)

pub mod loader;
pub mod types;
pub mod validation;

use thiserror::Error;

pub use loader::{find_config_file, load_config};
pub use types::{
    DeadlinePolicy, DmaConfig, FlushConfig, GeometryConfig, PlasticityConfig, QueueConfig,
    SynfireConfig, WeightDependenceMode,
};
pub use validation::validate;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
