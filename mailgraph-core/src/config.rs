//! Configuration system for Mailgraph.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/mailgraph/config.toml` and/or `.mailgraph/config.toml`
//! in the workspace directory.

use chrono::{DateTime, Utc};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::temporal::default_domain_start;

/// Top-level configuration for the explorer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    pub data: DataConfig,
    pub filter: FilterConfig,
    pub render: RenderConfig,
}

/// Where the dataset files live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub entity_path: PathBuf,
    pub event_path: PathBuf,
    /// Optional named-entity overlay merged on top of the base dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_entity_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_event_path: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            entity_path: PathBuf::from("JSON/entityData_small.json"),
            event_path: PathBuf::from("JSON/eventData_small.json"),
            overlay_entity_path: None,
            overlay_event_path: None,
        }
    }
}

impl DataConfig {
    /// Both overlay paths, if both are configured.
    pub fn overlay(&self) -> Option<(&Path, &Path)> {
        match (&self.overlay_entity_path, &self.overlay_event_path) {
            (Some(entities), Some(events)) => Some((entities.as_path(), events.as_path())),
            _ => None,
        }
    }
}

/// Filter defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Relations dated before this day are discarded.
    pub domain_start: DateTime<Utc>,
    /// Degree threshold applied at startup.
    pub initial_degree: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            domain_start: default_domain_start(),
            initial_degree: 0,
        }
    }
}

/// Node sizing and labelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    pub min_node_size: f64,
    pub max_node_size: f64,
    /// Labels longer than this are truncated with `...`.
    pub label_max_len: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            min_node_size: 40.0,
            max_node_size: 240.0,
            label_max_len: 20,
        }
    }
}

impl ExplorerConfig {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let render = &self.render;
        if !(render.min_node_size.is_finite() && render.max_node_size.is_finite()) {
            return Err(ConfigError::Invalid {
                message: "node sizes must be finite".into(),
            });
        }
        if render.min_node_size > render.max_node_size {
            return Err(ConfigError::Invalid {
                message: format!(
                    "min_node_size ({}) exceeds max_node_size ({})",
                    render.min_node_size, render.max_node_size
                ),
            });
        }
        if render.label_max_len < 4 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "label_max_len must be at least 4, got {}",
                    render.label_max_len
                ),
            });
        }
        Ok(())
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "mailgraph", "mailgraph")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `MAILGRAPH_`)
/// 3. Workspace-local config (`.mailgraph/config.toml`)
/// 4. User config (`~/.config/mailgraph/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ExplorerConfig>,
) -> Result<ExplorerConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(ExplorerConfig::default()));

    // User-level config
    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".mailgraph").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (MAILGRAPH_FILTER__INITIAL_DEGREE, MAILGRAPH_DATA__EVENT_PATH, etc.)
    figment = figment.merge(Env::prefixed("MAILGRAPH_").split("__"));

    // Explicit overrides
    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: ExplorerConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}

/// Check whether any Mailgraph configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| ws.join(".mailgraph").join("config.toml").exists())
}
