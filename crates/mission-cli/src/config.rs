//! Configuration file management for mission.
//!
//! Provides a TOML-based config file at `~/.config/mission/config.toml` and a
//! resolution chain for the known-agent list: CLI flag > env var > config
//! file > empty.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use mission_engine::models::CircuitBreakerConfig;

/// Comma-separated agent ids, overriding the config file.
pub const AGENTS_ENV: &str = "MISSION_AGENTS";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub agents: AgentsSection,
    /// Breaker applied to plans whose planner output does not set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentsSection {
    #[serde(default)]
    pub known: Vec<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the mission config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/mission` or `~/.config/mission`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("mission");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("mission")
}

/// Return the path to the mission config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the config file, or `None` if there is none.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;
    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct MissionConfig {
    pub agents: BTreeSet<String>,
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl MissionConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Agents: `cli_agents` (if any) > `MISSION_AGENTS` env > `agents.known` > empty
    /// - Circuit breaker: `circuit_breaker` section > none
    pub fn resolve(cli_agents: &[String]) -> Result<Self> {
        let file_config = load_config()?;

        let agents: BTreeSet<String> = if !cli_agents.is_empty() {
            cli_agents.iter().cloned().collect()
        } else if let Ok(list) = std::env::var(AGENTS_ENV) {
            split_agents(&list)
        } else if let Some(ref cfg) = file_config {
            cfg.agents.known.iter().cloned().collect()
        } else {
            BTreeSet::new()
        };

        if agents.is_empty() {
            tracing::warn!(
                "no known agents configured; every task will fail agent checks \
                 (pass --agent, set {AGENTS_ENV}, or run `mission init`)"
            );
        }

        Ok(Self {
            agents,
            circuit_breaker: file_config.and_then(|cfg| cfg.circuit_breaker),
        })
    }
}

fn split_agents(list: &str) -> BTreeSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_owned)
        .collect()
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
