// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support.
//!
//! Loading order:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)

use crate::{ConfigError, ConfigResult, SynfireConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "synfire_configuration.toml";

/// Find the synfire configuration file.
///
/// Search order:
/// 1. `SYNFIRE_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Parent directories (up to 5 levels, for workspace roots)
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("SYNFIRE_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "config file specified by SYNFIRE_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd;
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent.to_path_buf();
                }
                None => break,
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ConfigError::FileNotFound(format!(
        "'{CONFIG_FILE_NAME}' not found in any of these locations:\n{search_list}\n\n\
         Set SYNFIRE_CONFIG_PATH to specify a custom location."
    )))
}

/// Load, override, and validate the configuration.
///
/// With `config_path == None` the file is searched for via
/// [`find_config_file`].
pub fn load_config(config_path: Option<&Path>) -> ConfigResult<SynfireConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: SynfireConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config)?;
    crate::validation::validate(&config)?;
    Ok(config)
}

/// Apply `SYNFIRE_*` environment-variable overrides.
fn apply_environment_overrides(config: &mut SynfireConfig) -> ConfigResult<()> {
    if let Ok(value) = env::var("SYNFIRE_QUEUE_CAPACITY") {
        config.queue.capacity = value.parse().map_err(|_| {
            ConfigError::Validation(format!("SYNFIRE_QUEUE_CAPACITY is not a number: {value}"))
        })?;
    }
    if let Ok(value) = env::var("SYNFIRE_DEADLINE_POLICY") {
        config.queue.deadline_policy = match value.as_str() {
            "carry_over" => crate::DeadlinePolicy::CarryOver,
            "drop" => crate::DeadlinePolicy::Drop,
            other => {
                return Err(ConfigError::Validation(format!(
                    "SYNFIRE_DEADLINE_POLICY must be 'carry_over' or 'drop', got '{other}'"
                )))
            }
        };
    }
    if let Ok(value) = env::var("SYNFIRE_PLASTICITY_ENABLED") {
        config.plasticity.enabled = value == "1" || value.eq_ignore_ascii_case("true");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[queue]\ncapacity = 128\n\n[dma]\npoll_limit = 500"
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.queue.capacity, 128);
        assert_eq!(config.dma.poll_limit, 500);
        // Defaults fill the rest.
        assert_eq!(config.geometry.delay_bits, 4);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "queue = 'not a table'").unwrap();
        assert!(matches!(
            load_config(Some(file.path())),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[queue]\ncapacity = 100").unwrap(); // not a power of two
        assert!(matches!(
            load_config(Some(file.path())),
            Err(ConfigError::Validation(_))
        ));
    }
}
