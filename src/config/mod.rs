//=====================================================
// File: config/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Engine configuration loading
// Objective: Read gas, depth and execution-mode settings from TOML with
//            defaults, then layer VERBSCRIPT_* environment overrides
//=====================================================

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILE: &str = "engine.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Compiled,
    Interpreted,
}

impl FromStr for ExecutionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compiled" | "compile" => Ok(ExecutionMode::Compiled),
            "interpreted" | "interpret" => Ok(ExecutionMode::Interpreted),
            other => Err(ConfigError::Invalid {
                key: "mode",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading configuration from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Engine limits and defaults. Every field is optional in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Gas granted to a top-level invocation when the host passes none.
    pub gas_budget: u64,
    pub max_prototype_depth: usize,
    /// Bound on nested verb calls and closure applications.
    pub max_call_depth: usize,
    pub mode: ExecutionMode,
    /// Seed for the engine's random generator; entropy when absent.
    pub random_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gas_budget: 100_000,
            max_prototype_depth: 64,
            max_call_depth: 128,
            mode: ExecutionMode::Compiled,
            random_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// `<config dir>/verbscript/engine.toml`, when a config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("verbscript").join(CONFIG_FILE))
    }

    /// Load the default file if present, otherwise defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(gas) = lookup("VERBSCRIPT_GAS") {
            self.gas_budget = parse_env("VERBSCRIPT_GAS", &gas)?;
        }
        if let Some(mode) = lookup("VERBSCRIPT_MODE") {
            self.mode = mode.parse()?;
        }
        if let Some(seed) = lookup("VERBSCRIPT_SEED") {
            self.random_seed = Some(parse_env("VERBSCRIPT_SEED", &seed)?);
        }
        Ok(self)
    }
}

fn parse_env<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str("gas_budget = 500\nmode = \"interpreted\"\n")
            .expect("valid toml");
        assert_eq!(config.gas_budget, 500);
        assert_eq!(config.mode, ExecutionMode::Interpreted);
        assert_eq!(config.max_prototype_depth, 64);
        assert_eq!(config.random_seed, None);
    }

    #[test]
    fn env_overrides_apply_on_top() {
        let config = EngineConfig::default()
            .with_overrides(|key| match key {
                "VERBSCRIPT_GAS" => Some("42".into()),
                "VERBSCRIPT_SEED" => Some("7".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.gas_budget, 42);
        assert_eq!(config.random_seed, Some(7));
        assert_eq!(config.mode, ExecutionMode::Compiled);
    }

    #[test]
    fn bad_override_is_rejected() {
        let err = EngineConfig::default()
            .with_overrides(|key| (key == "VERBSCRIPT_MODE").then(|| "jit".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "mode", .. }));
    }

    #[test]
    fn file_loading_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "max_call_depth = 8\n").unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap().max_call_depth, 8);
    }
}
