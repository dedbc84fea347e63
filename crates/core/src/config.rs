//! Configuration loading and validation for harbinger.
//!
//! The configuration lives in a YAML file (`~/.harbinger.yaml` by default).
//! Every field is optional; missing fields take the defaults below.
//!
//! ```yaml
//! poll_interval: 30s
//! editor: code --wait
//! notifications: true
//! ignore_branches: [gh-pages]
//! auto_resolve: true
//! auto_sync: false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::git::validate_ref_name;

/// File name of the default configuration in the home directory.
pub const DEFAULT_CONFIG_FILE: &str = ".harbinger.yaml";

/// Runtime configuration, passed explicitly to the monitor and session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarbingerConfig {
    /// Time between polling ticks, as a humantime string (`30s`, `2m`).
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Editor command for manual edits; falls back to `$VISUAL`/`$EDITOR`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,

    /// Deliver desktop notifications.
    #[serde(default = "default_true")]
    pub notifications: bool,

    /// Branches the monitor never evaluates.
    #[serde(default)]
    pub ignore_branches: Vec<String>,

    /// Integrate remote changes automatically when no conflicts are predicted.
    #[serde(default = "default_true")]
    pub auto_resolve: bool,

    /// Pull automatically when the current branch is behind its remote.
    #[serde(default)]
    pub auto_sync: bool,

    /// Deprecated spelling of `auto_sync`; read but never written.
    #[serde(default, skip_serializing)]
    pub auto_pull: bool,

    /// Allow the scratch-merge strategy when no merge preview is available.
    #[serde(default)]
    pub scratch_merge_fallback: bool,

    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HarbingerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            editor: None,
            notifications: true,
            ignore_branches: Vec::new(),
            auto_resolve: true,
            auto_sync: false,
            auto_pull: false,
            scratch_merge_fallback: false,
            log_level: default_log_level(),
        }
    }
}

impl HarbingerConfig {
    /// `~/.harbinger.yaml`, or `None` without a home directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_FILE))
    }

    /// Parse YAML text; an empty document yields the defaults.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: HarbingerConfig =
            serde_yaml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        if config.auto_pull && !config.auto_sync {
            config.auto_sync = true;
        }
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "configuration file not found, using defaults");
            return Ok(Self::default());
        }

        info!(path = %path.display(), "loading configuration");
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&contents)?;
        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Load `explicit` if given, otherwise the default file, writing the
    /// defaults there first if it does not exist.
    /// The result is validated.
    pub fn load_or_init(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::default_path() {
                Some(path) if !path.exists() => {
                    let config = Self::default();
                    config.save(&path)?;
                    info!(path = %path.display(), "wrote default configuration");
                    config
                }
                Some(path) => Self::load_from_file(path)?,
                None => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as YAML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path.as_ref(), yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval".into(),
                detail: "poll interval must be > 0".into(),
            });
        }
        if matches!(&self.editor, Some(editor) if editor.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "editor".into(),
                detail: "editor must not be blank; remove it to use $EDITOR".into(),
            });
        }
        for branch in &self.ignore_branches {
            validate_ref_name(branch).map_err(|e| ConfigError::InvalidValue {
                field: "ignore_branches".into(),
                detail: e.to_string(),
            })?;
        }
        Ok(())
    }

    pub fn is_ignored(&self, branch: &str) -> bool {
        self.ignore_branches.iter().any(|b| b == branch)
    }
}
