//! Configuration loading and typed config structures for the Timeline
//! simulation.
//!
//! The configuration lives in `timeline-config.yaml` next to the binary's
//! working directory. Every field has a default, so a missing or empty
//! file yields a runnable configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use timeline_types::SlotStatus;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The selected slot is not one of the configured slots.
    #[error("slot {slot} is not one of the configured slots {slots:?}")]
    UnknownSlot {
        /// The selected slot.
        slot: String,
        /// The configured slots.
        slots: Vec<String>,
    },

    /// An environment override held an unusable value.
    #[error("invalid value for {variable}: {value}")]
    InvalidOverride {
        /// The environment variable name.
        variable: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TimelineConfig {
    /// Where the content documents live.
    #[serde(default)]
    pub content: ContentConfig,

    /// Save slot and event log location.
    #[serde(default)]
    pub session: SessionConfig,

    /// Observer HTTP server settings.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TimelineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `DATABASE_URL` overrides `session.database_url`
    /// - `TIMELINE_SLOT` overrides `session.slot`
    /// - `TIMELINE_OBSERVER_PORT` overrides `observer.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidOverride`] if an override cannot be parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// the errors of [`TimelineConfig::apply_env_overrides`] and
    /// [`TimelineConfig::validate`].
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_without_env(yaml)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string without consulting the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse_without_env(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yml rejects an empty document; treat it as all defaults.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownSlot`] if `session.slot` is not listed
    /// in `session.slots`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.session.slots.contains(&self.session.slot) {
            return Err(ConfigError::UnknownSlot {
                slot: self.session.slot.clone(),
                slots: self.session.slots.clone(),
            });
        }
        Ok(())
    }

    /// Override fields with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if `TIMELINE_OBSERVER_PORT`
    /// is not a valid port number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("DATABASE_URL") {
            self.session.database_url = Some(val);
        }
        if let Ok(val) = std::env::var("TIMELINE_SLOT") {
            self.session.slot = val;
        }
        if let Ok(val) = std::env::var("TIMELINE_OBSERVER_PORT") {
            self.observer.port = val.parse().map_err(|_err| ConfigError::InvalidOverride {
                variable: "TIMELINE_OBSERVER_PORT",
                value: val.clone(),
            })?;
        }
        Ok(())
    }
}

/// Locations of the three content documents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContentConfig {
    /// Path to `values.json`.
    #[serde(default = "default_values_path")]
    pub values_path: PathBuf,

    /// Path to `policies.json`.
    #[serde(default = "default_policies_path")]
    pub policies_path: PathBuf,

    /// Path to `scenario.json`.
    #[serde(default = "default_scenario_path")]
    pub scenario_path: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            values_path: default_values_path(),
            policies_path: default_policies_path(),
            scenario_path: default_scenario_path(),
        }
    }
}

/// Save-slot configuration.
///
/// Each slot is one event log file in `save_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Directory holding the slot databases.
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,

    /// Slot to open.
    #[serde(default = "default_slot")]
    pub slot: String,

    /// Slots offered to the player.
    #[serde(default = "default_slots")]
    pub slots: Vec<String>,

    /// Delete the slot's log before opening it.
    #[serde(default)]
    pub remake: bool,

    /// Explicit database URL; when unset it is derived from the slot.
    #[serde(default)]
    pub database_url: Option<String>,
}

impl SessionConfig {
    /// Path of the slot's database file.
    pub fn slot_path(&self) -> PathBuf {
        self.path_of(&self.slot)
    }

    fn path_of(&self, slot: &str) -> PathBuf {
        self.save_dir.join(format!("{slot}.db"))
    }

    /// The database URL to connect to.
    pub fn database_url(&self) -> String {
        self.database_url.clone().unwrap_or_else(|| {
            format!("sqlite://{}?mode=rwc", self.slot_path().display())
        })
    }

    /// Whether the slot already holds a saved game.
    pub fn slot_exists(&self) -> bool {
        self.slot_path().exists()
    }

    /// Every configured slot, flagged with whether it holds a saved game.
    pub fn slot_statuses(&self) -> Vec<SlotStatus> {
        self.slots
            .iter()
            .map(|name| SlotStatus {
                name: name.clone(),
                exists: self.path_of(name).exists(),
                active: *name == self.slot,
            })
            .collect()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            slot: default_slot(),
            slots: default_slots(),
            remake: false,
            database_url: None,
        }
    }
}

/// Observer server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Address to bind.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: default_observer_host(),
            port: default_observer_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_values_path() -> PathBuf {
    PathBuf::from("data/values.json")
}

fn default_policies_path() -> PathBuf {
    PathBuf::from("data/policies.json")
}

fn default_scenario_path() -> PathBuf {
    PathBuf::from("data/scenario.json")
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("save")
}

fn default_slot() -> String {
    "Game1".to_owned()
}

fn default_slots() -> Vec<String> {
    vec![
        "Game1".to_owned(),
        "Game2".to_owned(),
        "Game3".to_owned(),
        "Game4".to_owned(),
    ]
}

fn default_observer_host() -> String {
    "127.0.0.1".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TimelineConfig::default();
        assert_eq!(config.session.slot, "Game1");
        assert_eq!(config.session.slots.len(), 4);
        assert_eq!(config.observer.port, 8080);
        assert_eq!(config.content.values_path, PathBuf::from("data/values.json"));
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
content:
  values_path: "scenarios/a/values.json"
  policies_path: "scenarios/a/policies.json"
  scenario_path: "scenarios/a/scenario.json"

session:
  save_dir: "saves"
  slot: "Game3"
  remake: true

observer:
  host: "0.0.0.0"
  port: 9090

logging:
  level: "debug"
"#;
        let config = TimelineConfig::parse_without_env(yaml);
        assert!(config.is_ok());
        let config = config.unwrap_or_default();

        assert_eq!(config.session.slot, "Game3");
        assert!(config.session.remake);
        assert_eq!(config.session.slot_path(), PathBuf::from("saves/Game3.db"));
        assert_eq!(config.observer.port, 9090);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.content.scenario_path,
            PathBuf::from("scenarios/a/scenario.json")
        );
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = TimelineConfig::parse_without_env("session:\n  slot: Game2\n");
        assert!(config.is_ok());
        let config = config.unwrap_or_default();
        assert_eq!(config.session.slot, "Game2");
        assert_eq!(config.session.save_dir, PathBuf::from("save"));
        assert_eq!(config.observer.host, "127.0.0.1");
    }

    #[test]
    fn parse_empty_yaml() {
        let config = TimelineConfig::parse_without_env("");
        assert_eq!(config.ok(), Some(TimelineConfig::default()));
    }

    #[test]
    fn database_url_derives_from_slot() {
        let session = SessionConfig::default();
        assert_eq!(session.database_url(), "sqlite://save/Game1.db?mode=rwc");

        let explicit = SessionConfig {
            database_url: Some("sqlite::memory:".to_owned()),
            ..SessionConfig::default()
        };
        assert_eq!(explicit.database_url(), "sqlite::memory:");
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        let config = TimelineConfig::parse_without_env("observer: [unterminated");
        assert!(matches!(config, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn slot_outside_the_list_is_rejected() {
        let config = TimelineConfig::parse_without_env("session:\n  slot: Game9\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownSlot { slot, .. }) if slot == "Game9"
        ));

        let listed = TimelineConfig::parse_without_env(
            "session:\n  slot: Extra\n  slots: [Game1, Extra]\n",
        )
        .unwrap();
        assert!(listed.validate().is_ok());
    }

    #[test]
    fn slot_statuses_report_saved_games() {
        let save_dir = std::env::temp_dir().join(format!("timeline-slots-{}", std::process::id()));
        std::fs::create_dir_all(&save_dir).unwrap();
        std::fs::write(save_dir.join("Game2.db"), b"").unwrap();
        let session = SessionConfig {
            save_dir: save_dir.clone(),
            ..SessionConfig::default()
        };

        let statuses = session.slot_statuses();
        std::fs::remove_dir_all(&save_dir).unwrap();

        let names: Vec<&str> = statuses.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Game1", "Game2", "Game3", "Game4"]);
        let game1 = statuses.first().unwrap();
        assert!(game1.active);
        assert!(!game1.exists);
        let game2 = statuses.get(1).unwrap();
        assert!(!game2.active);
        assert!(game2.exists);
    }
}
