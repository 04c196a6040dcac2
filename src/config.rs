//! Configuration system for rulesr with validation and default generation.
//!
//! Handles the TOML-based `rulesr.toml` configuration file: path resolution
//! (XDG config dir with a `--config-dir` override), default file creation on
//! first run, range validation, and the clock-zone abstraction the rest of
//! the engine uses for "now".
//!
//! ## Configuration structure
//!
//! ```toml
//! #[Location]
//! latitude = 34.1939770    # Geographic latitude (-90 to +90)
//! longitude = -84.2247560  # Geographic longitude (-180 to +180)
//! twilight = "standard"    # Select: "standard", "civil", "nautical", "astronomical"
//! timezone = "America/New_York"  # IANA zone; omit to use the system zone
//!
//! #[Engine]
//! rule_path = "/etc/rulesr/rules.json"  # Rule file (JSON)
//! run_interval = 3         # Seconds between evaluation cycles (1-3600)
//! debug = false            # Verbose per-cycle logging
//!
//! #[Device bridge]
//! bridge_url = "http://127.0.0.1:8800"  # Device bridge base URL
//! io_timeout = 5           # Per-request HTTP timeout in seconds (1-120)
//! ```
//!
//! Invalid values produce errors that name the offending field and its
//! accepted range; a missing file is replaced with a commented default
//! template so there is something concrete to edit.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::solar::Twilight;

/// Default seconds between evaluation cycles.
pub const DEFAULT_RUN_INTERVAL: u64 = 3;
/// Default per-request HTTP timeout in seconds.
pub const DEFAULT_IO_TIMEOUT: u64 = 5;

/// Global configuration directory override, set once at startup.
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for the current process.
/// This can only be called once, typically at startup.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow!("Configuration directory already set"))
}

/// The wall clock the engine runs against.
///
/// Either the system local zone or a fixed IANA zone from configuration.
/// Centralizing this keeps timezone conversions out of the matchers and
/// makes "today" unambiguous for solar resolution.
#[derive(Debug, Clone)]
pub enum ClockZone {
    Local,
    Fixed(Tz),
}

impl ClockZone {
    /// Build a fixed zone from an IANA name such as `America/New_York`.
    pub fn fixed(name: &str) -> Result<Self> {
        let tz: Tz = name
            .parse()
            .map_err(|_| anyhow!("Unknown timezone '{name}' (expected an IANA name)"))?;
        Ok(ClockZone::Fixed(tz))
    }

    /// Current wall-clock date and time in this zone.
    pub fn now(&self) -> NaiveDateTime {
        match self {
            ClockZone::Local => chrono::Local::now().naive_local(),
            ClockZone::Fixed(tz) => Utc::now().with_timezone(tz).naive_local(),
        }
    }

    /// Today's date in this zone.
    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// Convert a UTC instant to a clock time in this zone.
    pub fn local_time(&self, utc: DateTime<Utc>) -> NaiveTime {
        match self {
            ClockZone::Local => utc.with_timezone(&chrono::Local).time(),
            ClockZone::Fixed(tz) => utc.with_timezone(tz).time(),
        }
    }
}

/// Configuration structure for rulesr application settings.
///
/// All fields are optional in the file; accessors apply defaults where a
/// sensible default exists, and validation rejects out-of-range values.
/// `rule_path` and `bridge_url` have no default and are required to run.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Geographic latitude for sunrise/sunset resolution.
    pub latitude: Option<f64>,
    /// Geographic longitude for sunrise/sunset resolution.
    pub longitude: Option<f64>,
    /// Twilight definition used for SUNRISE/SUNSET anchors.
    pub twilight: Option<Twilight>,
    /// IANA timezone name; system local zone when unset.
    pub timezone: Option<String>,
    /// Path to the JSON rule file.
    pub rule_path: Option<String>,
    /// Seconds between evaluation cycles.
    pub run_interval: Option<u64>,
    /// Verbose per-cycle logging.
    pub debug: Option<bool>,
    /// Device bridge base URL, e.g. `http://127.0.0.1:8800`.
    pub bridge_url: Option<String>,
    /// Per-request HTTP timeout in seconds (media query and device commands).
    pub io_timeout: Option<u64>,
}

impl Config {
    /// Load configuration using automatic path detection.
    ///
    /// Creates a default configuration file if none exists.
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;

        if !config_path.exists() {
            create_default_config(&config_path)?;
            log_block_start!("Created default configuration");
            log_indented!("{}", config_path.display());
        }

        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path without default creation.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    pub fn run_interval(&self) -> u64 {
        self.run_interval.unwrap_or(DEFAULT_RUN_INTERVAL)
    }

    pub fn io_timeout(&self) -> u64 {
        self.io_timeout.unwrap_or(DEFAULT_IO_TIMEOUT)
    }

    pub fn twilight(&self) -> Twilight {
        self.twilight.unwrap_or_default()
    }

    pub fn debug(&self) -> bool {
        self.debug.unwrap_or(false)
    }

    /// Rule file path; required to run.
    pub fn rule_path(&self) -> Result<&str> {
        self.rule_path
            .as_deref()
            .ok_or_else(|| anyhow!("Configuration is missing 'rule_path'"))
    }

    /// Device bridge base URL; required to run.
    pub fn bridge_url(&self) -> Result<&str> {
        self.bridge_url
            .as_deref()
            .ok_or_else(|| anyhow!("Configuration is missing 'bridge_url'"))
    }

    /// Build the wall clock from the optional timezone setting.
    pub fn clock_zone(&self) -> Result<ClockZone> {
        match self.timezone.as_deref() {
            Some(name) => ClockZone::fixed(name),
            None => Ok(ClockZone::Local),
        }
    }

    /// Log the effective configuration at startup.
    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => {
                log_indented!("Location: {lat:.4}°, {lon:.4}° ({})", self.twilight().as_str())
            }
            _ => log_indented!("Location: not set (solar anchors unavailable)"),
        }
        log_indented!(
            "Timezone: {}",
            self.timezone.as_deref().unwrap_or("system local")
        );
        if let Some(path) = self.rule_path.as_deref() {
            log_indented!("Rule file: {path}");
        }
        if let Some(url) = self.bridge_url.as_deref() {
            log_indented!("Device bridge: {url}");
        }
        log_indented!("Run interval: {}s", self.run_interval());
        log_indented!("I/O timeout: {}s", self.io_timeout());
    }
}

/// Validate all configuration values that are present.
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(lat) = config.latitude
        && !(-90.0..=90.0).contains(&lat)
    {
        anyhow::bail!("latitude must be between -90 and 90, got {lat}");
    }
    if let Some(lon) = config.longitude
        && !(-180.0..=180.0).contains(&lon)
    {
        anyhow::bail!("longitude must be between -180 and 180, got {lon}");
    }
    if config.latitude.is_some() != config.longitude.is_some() {
        anyhow::bail!("latitude and longitude must be set together");
    }
    if let Some(interval) = config.run_interval
        && !(1..=3600).contains(&interval)
    {
        anyhow::bail!("run_interval must be between 1 and 3600 seconds, got {interval}");
    }
    if let Some(timeout) = config.io_timeout
        && !(1..=120).contains(&timeout)
    {
        anyhow::bail!("io_timeout must be between 1 and 120 seconds, got {timeout}");
    }
    if let Some(name) = config.timezone.as_deref() {
        ClockZone::fixed(name)?;
    }
    if let Some(url) = config.bridge_url.as_deref()
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        anyhow::bail!("bridge_url must be an http(s) URL, got '{url}'");
    }
    Ok(())
}

/// Get the configuration file path, honoring a custom config directory.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = CONFIG_DIR.get().and_then(|d| d.clone()) {
        return Ok(custom_dir.join("rulesr.toml"));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?;
    Ok(config_dir.join("rulesr").join("rulesr.toml"))
}

/// Write a commented default configuration template.
fn create_default_config(path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }

    let template = r#"#[Location]
#latitude = 34.1939770    # Geographic latitude (-90 to +90)
#longitude = -84.2247560  # Geographic longitude (-180 to +180)
twilight = "standard"     # Select: "standard", "civil", "nautical", "astronomical"
#timezone = "America/New_York"  # IANA zone; omit to use the system zone

#[Engine]
rule_path = "rules.json"  # Rule file (JSON), relative paths resolve from the working directory
run_interval = 3          # Seconds between evaluation cycles (1-3600)
debug = false             # Verbose per-cycle logging

#[Device bridge]
bridge_url = "http://127.0.0.1:8800"  # Device bridge base URL
io_timeout = 5            # Per-request HTTP timeout in seconds (1-120)
"#;

    fs::write(path, template)
        .with_context(|| format!("Failed to write default config to {}", path.display()))
}
