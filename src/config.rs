//! Configuration file support for the signaling system.
//!
//! TOML-based configuration for easier deployment: tree shape, proof file
//! limits, prover timeout, and the verifier's root-staleness policy.

use crate::merkle::MAX_TREE_DEPTH;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_TREE_DEPTH: usize = 20;
const DEFAULT_MAX_GROUP_FILE_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_PROOF_FILE_SIZE: u64 = 1024 * 1024;
const DEFAULT_MAX_PROOF_BYTES: usize = 512 * 1024;
const DEFAULT_PROVER_TIMEOUT_SECS: u64 = 300;
const DEFAULT_ROOT_HISTORY: usize = 8;
const DEFAULT_TIMESTAMP_TOLERANCE_SECS: u64 = 30;
const DEFAULT_TIMESTAMP_MAX_AGE_SECS: u64 = 86400;

/// Configuration for the anonymous signaling system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub group: GroupConfig,
    #[serde(default)]
    pub proof: ProofConfig,
    #[serde(default)]
    pub prover: ProverConfig,
    #[serde(default)]
    pub verifier: VerifierConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Fixed depth of the membership tree; capacity is `2^depth`.
    #[serde(default = "default_tree_depth")]
    pub tree_depth: usize,
    #[serde(default = "default_max_group_file_size")]
    pub max_file_size: u64,
    #[serde(default)]
    pub member_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofConfig {
    #[serde(default = "default_max_proof_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_max_proof_bytes")]
    pub max_proof_bytes: usize,
    #[serde(default = "default_proof_output_file")]
    pub output_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProverConfig {
    /// Backend timeout in seconds; `None` disables the bound.
    #[serde(default = "default_prover_timeout_secs")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// How many recent roots stay trusted. 1 means "latest only".
    #[serde(default = "default_root_history")]
    pub root_history: usize,
    /// Persisted nullifier ledger; defaults to a sidecar of the proof file.
    #[serde(default)]
    pub nullifier_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_timestamp_tolerance_secs")]
    pub timestamp_tolerance_secs: u64,
    #[serde(default = "default_timestamp_max_age_secs")]
    pub timestamp_max_age_secs: u64,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            tree_depth: DEFAULT_TREE_DEPTH,
            max_file_size: DEFAULT_MAX_GROUP_FILE_SIZE,
            member_file: None,
        }
    }
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_PROOF_FILE_SIZE,
            max_proof_bytes: DEFAULT_MAX_PROOF_BYTES,
            output_file: PathBuf::from("proof.json"),
        }
    }
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Some(DEFAULT_PROVER_TIMEOUT_SECS),
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            root_history: DEFAULT_ROOT_HISTORY,
            nullifier_file: None,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            timestamp_tolerance_secs: DEFAULT_TIMESTAMP_TOLERANCE_SECS,
            timestamp_max_age_secs: DEFAULT_TIMESTAMP_MAX_AGE_SECS,
        }
    }
}

fn default_tree_depth() -> usize {
    DEFAULT_TREE_DEPTH
}

fn default_max_group_file_size() -> u64 {
    DEFAULT_MAX_GROUP_FILE_SIZE
}

fn default_max_proof_file_size() -> u64 {
    DEFAULT_MAX_PROOF_FILE_SIZE
}

fn default_max_proof_bytes() -> usize {
    DEFAULT_MAX_PROOF_BYTES
}

fn default_proof_output_file() -> PathBuf {
    PathBuf::from("proof.json")
}

fn default_prover_timeout_secs() -> Option<u64> {
    Some(DEFAULT_PROVER_TIMEOUT_SECS)
}

fn default_root_history() -> usize {
    DEFAULT_ROOT_HISTORY
}

fn default_timestamp_tolerance_secs() -> u64 {
    DEFAULT_TIMESTAMP_TOLERANCE_SECS
}

fn default_timestamp_max_age_secs() -> u64 {
    DEFAULT_TIMESTAMP_MAX_AGE_SECS
}

impl Config {
    /// Rejects values the library treats as programmer error, so a bad
    /// config file surfaces as a contextual error instead of a panic.
    ///
    /// # Errors
    /// Returns an error naming the offending config field.
    pub fn validate(&self) -> Result<()> {
        if self.group.tree_depth < 1 || self.group.tree_depth > MAX_TREE_DEPTH {
            return Err(anyhow::anyhow!(
                "group.tree_depth must be in 1..={MAX_TREE_DEPTH}, got {}",
                self.group.tree_depth
            ));
        }
        Ok(())
    }

    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn load_from_file_or_default(path: &PathBuf) -> Self {
        Self::load_from_file(path).unwrap_or_default()
    }

    pub fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.group.tree_depth, DEFAULT_TREE_DEPTH);
        assert_eq!(config.verifier.root_history, DEFAULT_ROOT_HISTORY);
        assert_eq!(
            config.prover.timeout_secs,
            Some(DEFAULT_PROVER_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_serialize_deserialize_config() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.group.tree_depth, deserialized.group.tree_depth);
        assert_eq!(config.proof.output_file, deserialized.proof.output_file);
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let mut config = Config::default();
        config.group.tree_depth = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("group.tree_depth"));
    }

    #[test]
    fn test_validate_rejects_oversized_depth() {
        let mut config = Config::default();
        config.group.tree_depth = MAX_TREE_DEPTH + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.group.tree_depth = 12;
        config.verifier.root_history = 5;
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.group.tree_depth, 12);
        assert_eq!(loaded.verifier.root_history, 5);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_default() {
        let path = PathBuf::from("/nonexistent/anon-signals-config.toml");
        let config = Config::load_from_file_or_default(&path);
        assert_eq!(config.group.tree_depth, DEFAULT_TREE_DEPTH);
    }

    #[test]
    fn test_custom_config() {
        let config_toml = r#"
            [group]
            tree_depth = 16

            [proof]
            output_file = "custom_proof.json"

            [verifier]
            root_history = 3
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert_eq!(config.group.tree_depth, 16);
        assert_eq!(config.proof.output_file, PathBuf::from("custom_proof.json"));
        assert_eq!(config.verifier.root_history, 3);
        // Untouched sections keep their defaults.
        assert_eq!(
            config.security.timestamp_tolerance_secs,
            DEFAULT_TIMESTAMP_TOLERANCE_SECS
        );
    }
}
