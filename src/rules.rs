//! Rule file loading, validation, and normalization.
//!
//! The rule file is a JSON array of rule records:
//!
//! ```json
//! [
//!   {
//!     "device": ["porchLight", "garageLight"],
//!     "control": {
//!       "day": ["Sat", "Sun"],
//!       "time": { "on": "SUNSET", "off": "23:00" },
//!       "plex": { "host": "10.0.0.2", "player": "Living Room", "dim_on_pause": 40 }
//!     }
//!   }
//! ]
//! ```
//!
//! `device` and `day` accept either a single string or an array. Time specs
//! are 24-hour `HH:MM` clock times or the symbolic anchors `SUNRISE` and
//! `SUNSET`. Loading validates every rule up front so a malformed rule is a
//! startup failure, never a surprise mid-cycle; normalization then resolves
//! the solar anchors into literal clock times for the given date, producing
//! the `ResolvedRule` list the engine evaluates.

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::config::{ClockZone, Config};
use crate::schedule::parse_weekday;
use crate::solar::{self, SolarTimes};

/// Symbolic sunrise anchor, matched exactly.
pub const SUNRISE: &str = "SUNRISE";
/// Symbolic sunset anchor, matched exactly.
pub const SUNSET: &str = "SUNSET";

/// Default dim level applied while playback is paused.
pub const DEFAULT_DIM_ON_PAUSE: u8 = 40;

/// A field that may be written as one value or a list of values.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// Raw rule record as written in the rule file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Rule {
    pub device: OneOrMany<String>,
    pub control: Option<Control>,
}

/// The optional control block of a rule.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Control {
    pub day: Option<OneOrMany<String>>,
    pub time: Option<TimeControl>,
    pub plex: Option<MediaConfig>,
}

/// A time window given as two specs, literal or symbolic.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TimeControl {
    pub on: String,
    pub off: String,
}

/// Media-server gate configuration for one rule.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MediaConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_api")]
    pub api: String,
    pub token: Option<String>,
    /// Player (client) title to match in the session list.
    pub player: String,
    pub dim_on_pause: Option<u8>,
}

fn default_port() -> u16 {
    32400
}

fn default_api() -> String {
    "status/sessions".to_string()
}

impl MediaConfig {
    /// Session endpoint URL, with the auth token appended when present.
    pub fn url(&self) -> String {
        let base = format!("http://{}:{}/{}", self.host, self.port, self.api);
        match self.token.as_deref() {
            Some(token) => format!("{base}?X-Plex-Token={token}"),
            None => base,
        }
    }

    pub fn dim_on_pause(&self) -> u8 {
        self.dim_on_pause.unwrap_or(DEFAULT_DIM_ON_PAUSE)
    }
}

/// A parsed time spec: a literal clock time or a solar anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    Literal(NaiveTime),
    Sunrise,
    Sunset,
}

impl TimeSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        match spec {
            "" => bail!("Empty time spec"),
            SUNRISE => Ok(TimeSpec::Sunrise),
            SUNSET => Ok(TimeSpec::Sunset),
            literal => NaiveTime::parse_from_str(literal, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(literal, "%H:%M:%S"))
                .map(TimeSpec::Literal)
                .with_context(|| format!("Invalid time spec '{literal}' (expected HH:MM, SUNRISE, or SUNSET)")),
        }
    }

    fn resolve(self, solar: Option<&SolarTimes>) -> Result<NaiveTime> {
        match (self, solar) {
            (TimeSpec::Literal(time), _) => Ok(time),
            (TimeSpec::Sunrise, Some(times)) => Ok(times.sunrise),
            (TimeSpec::Sunset, Some(times)) => Ok(times.sunset),
            (_, None) => bail!(
                "Rule uses a solar time anchor but no coordinates are configured"
            ),
        }
    }
}

/// A rule normalized for evaluation: weekdays parsed, solar anchors resolved
/// to literal clock times for one specific date.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRule {
    /// Stable identity used in logs and for runtime-state lookup.
    pub id: String,
    pub devices: Vec<String>,
    /// Allowed weekdays; empty means every day.
    pub days: Vec<Weekday>,
    /// On/off window; `None` means every time of day.
    pub window: Option<(NaiveTime, NaiveTime)>,
    pub media: Option<MediaConfig>,
}

/// Load the raw rule list from a JSON file.
///
/// A missing or unparsable file, or an empty rule list, is a fatal startup
/// error: the daemon must not run with nothing to evaluate.
pub fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    if !path.is_file() {
        bail!("Cannot find the rule file at {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read rule file {}", path.display()))?;
    let rules: Vec<Rule> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid or bad rules in {}", path.display()))?;

    if rules.is_empty() {
        bail!("Rule file {} contains no rules", path.display());
    }

    for (index, rule) in rules.iter().enumerate() {
        validate_rule(rule).with_context(|| format!("Invalid rule at index {index}"))?;
    }

    Ok(rules)
}

/// Structural validation of a single raw rule.
fn validate_rule(rule: &Rule) -> Result<()> {
    if rule.device.clone().into_vec().is_empty() {
        bail!("Rule has an empty device list");
    }

    let Some(control) = &rule.control else {
        return Ok(());
    };

    if let Some(day) = &control.day {
        for name in day.clone().into_vec() {
            if parse_weekday(&name).is_none() {
                bail!("Unknown weekday '{name}'");
            }
        }
    }

    if let Some(time) = &control.time {
        if time.on.trim().is_empty() || time.off.trim().is_empty() {
            bail!("Invalid time configuration: both 'on' and 'off' are required");
        }
        TimeSpec::parse(&time.on)?;
        TimeSpec::parse(&time.off)?;
    }

    if let Some(media) = &control.plex {
        if media.host.trim().is_empty() {
            bail!("Media config is missing 'host'");
        }
        if media.player.trim().is_empty() {
            bail!("Media config is missing 'player'");
        }
        if let Some(dim) = media.dim_on_pause
            && !(1..=100).contains(&dim)
        {
            bail!("dim_on_pause must be between 1 and 100, got {dim}");
        }
    }

    Ok(())
}

/// Normalize raw rules for `date`, resolving solar anchors into clock times.
///
/// Sunrise/sunset is computed once per call, and only when at least one rule
/// actually references an anchor; rule files without solar anchors never
/// require coordinates.
pub fn resolve_rules(
    rules: &[Rule],
    config: &Config,
    zone: &ClockZone,
    date: NaiveDate,
) -> Result<Vec<ResolvedRule>> {
    let needs_solar = rules.iter().any(rule_uses_solar);
    let solar = if needs_solar {
        let (Some(lat), Some(lon)) = (config.latitude, config.longitude) else {
            bail!("Rules use SUNRISE/SUNSET but latitude/longitude are not configured");
        };
        Some(solar::solar_times(lat, lon, config.twilight(), date, zone)?)
    } else {
        None
    };

    rules
        .iter()
        .enumerate()
        .map(|(index, rule)| resolve_rule(rule, index, solar.as_ref()))
        .collect()
}

fn rule_uses_solar(rule: &Rule) -> bool {
    rule.control
        .as_ref()
        .and_then(|control| control.time.as_ref())
        .is_some_and(|time| {
            matches!(time.on.trim(), SUNRISE | SUNSET) || matches!(time.off.trim(), SUNRISE | SUNSET)
        })
}

fn resolve_rule(rule: &Rule, index: usize, solar: Option<&SolarTimes>) -> Result<ResolvedRule> {
    let id = format!("rule {index}");
    let devices = rule.device.clone().into_vec();

    let (days, window, media) = match &rule.control {
        None => (Vec::new(), None, None),
        Some(control) => {
            let days = control
                .day
                .clone()
                .map(|day| {
                    day.into_vec()
                        .iter()
                        .map(|name| {
                            parse_weekday(name)
                                .with_context(|| format!("Unknown weekday '{name}' in {id}"))
                        })
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?
                .unwrap_or_default();

            let window = control
                .time
                .as_ref()
                .map(|time| -> Result<(NaiveTime, NaiveTime)> {
                    let on = TimeSpec::parse(&time.on)?.resolve(solar)?;
                    let off = TimeSpec::parse(&time.off)?.resolve(solar)?;
                    Ok((on, off))
                })
                .transpose()
                .with_context(|| format!("Invalid time configuration in {id}"))?;

            (days, window, control.plex.clone())
        }
    };

    Ok(ResolvedRule {
        id,
        devices,
        days,
        window,
        media,
    })
}
