// File: ./src/config.rs
// Handles configuration loading and defaults.
use crate::context::AppContext;
use crate::model::Property;
use anyhow::{Context, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

fn default_sync_interval() -> u32 {
    10
}
fn default_window_secs() -> u64 {
    300
}
fn default_max_concurrent_fetches() -> usize {
    5
}
fn default_fetch_timeout() -> u64 {
    30
}
fn default_batch_size() -> usize {
    500
}
fn default_max_redirects() -> usize {
    5
}
/// `None` when the value does not fit a `chrono::Duration`.
fn window_from_secs(secs: u64) -> Option<chrono::Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
}

fn default_user_agent() -> String {
    format!("staysync/{}", env!("CARGO_PKG_VERSION"))
}
fn default_booking_store() -> String {
    "bookings.json".to_string()
}

/// Where the mission automation hooks live. Both are optional; a missing
/// URL means that hook is only logged.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AutomationConfig {
    #[serde(default)]
    pub upcoming_url: Option<String>,
    #[serde(default)]
    pub ended_url: Option<String>,
}

impl AutomationConfig {
    pub fn is_configured(&self) -> bool {
        self.upcoming_url.is_some() || self.ended_url.is_some()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    #[serde(default = "default_sync_interval")]
    pub sync_interval_mins: u32,
    #[serde(default = "default_window_secs")]
    pub debounce_window_secs: u64,
    #[serde(default = "default_window_secs")]
    pub stability_window_secs: u64,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Keep reconciliation history across restarts.
    #[serde(default)]
    pub persist_sync_state: bool,
    /// File name (relative to the data dir) or absolute path.
    #[serde(default = "default_booking_store")]
    pub booking_store: String,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_interval_mins: 10,
            debounce_window_secs: 300,
            stability_window_secs: 300,
            max_concurrent_fetches: 5,
            fetch_timeout_secs: 30,
            batch_size: 500,
            max_redirects: 5,
            user_agent: default_user_agent(),
            persist_sync_state: false,
            booking_store: default_booking_store(),
            automation: AutomationConfig::default(),
            properties: Vec::new(),
        }
    }
}

/// The subset of the configuration the sync engine runs with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncSettings {
    pub debounce_window: chrono::Duration,
    pub stability_window: chrono::Duration,
    pub max_concurrent_fetches: usize,
    pub fetch_timeout: std::time::Duration,
    pub batch_size: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Config::default().sync_settings()
    }
}

impl Config {
    /// Load the configuration from the context's config directory.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;

        // Explicitly detect a missing file so the binary can print a useful hint.
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Config file not found") {
            return true;
        }
        err.chain().any(|cause| {
            cause
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
        })
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_fetches == 0 {
            anyhow::bail!("max_concurrent_fetches must be at least 1");
        }
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be at least 1");
        }
        if self.sync_interval_mins == 0 {
            anyhow::bail!("sync_interval_mins must be at least 1");
        }
        for (name, secs) in [
            ("debounce_window_secs", self.debounce_window_secs),
            ("stability_window_secs", self.stability_window_secs),
        ] {
            if window_from_secs(secs).is_none() {
                anyhow::bail!("{} is out of range: {}", name, secs);
            }
        }

        let mut ids = HashSet::new();
        for property in &self.properties {
            if property.id.trim().is_empty() {
                anyhow::bail!("a property has an empty id");
            }
            if !ids.insert(property.id.as_str()) {
                anyhow::bail!("duplicate property id '{}'", property.id);
            }
            // Labels key the debounce ledger and the booking source field.
            let mut labels = HashSet::new();
            for source in &property.sources {
                if !labels.insert(source.label.as_str()) {
                    anyhow::bail!(
                        "property '{}' has two sources labelled '{}'",
                        property.id,
                        source.label
                    );
                }
            }
        }
        Ok(())
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            // Out-of-range values are rejected by `validate`; an unvalidated
            // config falls back to the defaults rather than wrapping.
            debounce_window: window_from_secs(self.debounce_window_secs)
                .unwrap_or_else(|| chrono::Duration::seconds(300)),
            stability_window: window_from_secs(self.stability_window_secs)
                .unwrap_or_else(|| chrono::Duration::seconds(300)),
            max_concurrent_fetches: self.max_concurrent_fetches,
            fetch_timeout: std::time::Duration::from_secs(self.fetch_timeout_secs),
            batch_size: self.batch_size,
        }
    }

    pub fn sync_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.sync_interval_mins) * 60)
    }

    /// Resolve the booking file against the data directory.
    pub fn booking_store_path(&self, ctx: &dyn AppContext) -> Result<std::path::PathBuf> {
        let configured = Path::new(&self.booking_store);
        if configured.is_absolute() {
            return Ok(configured.to_path_buf());
        }
        Ok(ctx.get_data_dir()?.join(configured))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;

    const SAMPLE: &str = r#"
sync_interval_mins = 15
batch_size = 100

[automation]
ended_url = "https://ops.example/hooks/ended"

[[properties]]
id = "villa-1"
name = "Villa One"

  [[properties.sources]]
  url = "https://airbnb.example/ical/1.ics"
  label = "Airbnb"

  [[properties.sources]]
  url = "https://vrbo.example/ical/1.ics"
  label = "Vrbo"
  active = false
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.sync_interval_mins, 15);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_concurrent_fetches, 5);
        assert_eq!(config.debounce_window_secs, 300);
        assert_eq!(config.properties.len(), 1);
        assert_eq!(config.properties[0].sources.len(), 2);
        assert!(!config.properties[0].sources[1].active);
        assert!(config.automation.is_configured());
        assert_eq!(config.automation.upcoming_url, None);

        let settings = config.sync_settings();
        assert_eq!(settings.stability_window, chrono::Duration::minutes(5));
        assert_eq!(settings.fetch_timeout, std::time::Duration::from_secs(30));
    }

    #[test]
    fn empty_file_matches_default() {
        let parsed = Config::from_toml_str("").unwrap();
        let default = Config::default();
        assert_eq!(parsed.sync_settings(), default.sync_settings());
        assert_eq!(parsed.user_agent, default.user_agent);
        assert_eq!(parsed.booking_store, default.booking_store);
    }

    #[test]
    fn rejects_duplicate_property_ids() {
        let toml = r#"
[[properties]]
id = "p"
[[properties]]
id = "p"
"#;
        let err = Config::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate property id"));
    }

    #[test]
    fn rejects_duplicate_source_labels() {
        let toml = r#"
[[properties]]
id = "p"
  [[properties.sources]]
  url = "https://a.example/1.ics"
  label = "Airbnb"
  [[properties.sources]]
  url = "https://a.example/2.ics"
  label = "Airbnb"
"#;
        assert!(Config::from_toml_str(toml).is_err());
    }

    #[test]
    fn rejects_zero_concurrency() {
        assert!(Config::from_toml_str("max_concurrent_fetches = 0").is_err());
    }

    #[test]
    fn rejects_out_of_range_windows() {
        let err = Config::from_toml_str("stability_window_secs = 10000000000000000").unwrap_err();
        assert!(err.to_string().contains("stability_window_secs"));
        assert!(Config::from_toml_str("debounce_window_secs = 10000000000000000").is_err());

        let config = Config {
            stability_window_secs: u64::MAX,
            ..Config::default()
        };
        assert!(config.validate().is_err());
        // Never a negative window, even without validation.
        assert!(config.sync_settings().stability_window > chrono::Duration::zero());

        let one_day = Config::from_toml_str("stability_window_secs = 86400").unwrap();
        assert_eq!(
            one_day.sync_settings().stability_window,
            chrono::Duration::days(1)
        );
    }

    #[test]
    fn missing_file_is_detected() {
        let ctx = TestContext::new();
        let err = Config::load(&ctx).unwrap_err();
        assert!(Config::is_missing_config_error(&err));
    }

    #[test]
    fn loads_from_context() {
        let ctx = TestContext::new();
        let path = ctx.get_config_file_path().unwrap();
        fs::write(&path, SAMPLE).unwrap();
        let config = Config::load(&ctx).unwrap();
        assert_eq!(config.properties[0].id, "villa-1");

        let store = config.booking_store_path(&ctx).unwrap();
        assert!(store.starts_with(ctx.get_data_dir().unwrap()));
    }
}
