//! Rule evaluation and device-state reconciliation engine.
//!
//! One [`Engine`] owns everything mutable: the resolved rule list, a per-rule
//! playback latch, and the per-device last-known on/off cache. Each call to
//! [`Engine::run_cycle`] walks the rules in order and reconciles every
//! device toward its desired state, issuing a physical command only when the
//! cache disagrees (or a forced transition demands it).
//!
//! ## Playback transition policy
//!
//! For a schedule-passing rule with a media gate, the observed
//! [`PlaybackStatus`] drives a small state machine per rule:
//!
//! | current | previous            | action   | force                    |
//! |---------|---------------------|----------|--------------------------|
//! | Playing | any                 | turn off | previous was Stopped     |
//! | Paused  | any                 | dim      | n/a                      |
//! | Stopped | armed               | turn on  | previous was Paused      |
//! | Stopped | unarmed             | nothing  |                          |
//!
//! `armed` latches once Playing or Paused has been observed and clears on the
//! Stopped-driven turn-on, so a rule that begins life in Stopped never fires
//! a spurious turn-on. `force` bypasses the device cache on the two edges
//! where the cache may be lying: entering Playing from Stopped (intermediate
//! states may have been missed) and returning to Stopped from Paused (the dim
//! left the cache "on" even though the lights are at partial brightness).
//!
//! All per-cycle failures (unknown device, transport error, media outage)
//! are logged and skipped; nothing recoverable ever unwinds past the device
//! or rule being processed.

use anyhow::Result;
use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::config::{ClockZone, Config};
use crate::device::{DeviceDriver, DeviceError};
use crate::media::{MediaStatusProvider, PlaybackStatus};
use crate::rules::{MediaConfig, ResolvedRule, Rule, resolve_rules};
use crate::schedule::{day_matches, window_matches};

/// Builds a media status provider for one rule's media gate.
pub type MediaProviderFactory = Box<dyn Fn(&MediaConfig) -> Box<dyn MediaStatusProvider>>;

/// One rule plus its runtime state, lifetime = process lifetime.
struct EngineRule {
    rule: ResolvedRule,
    media: Option<Box<dyn MediaStatusProvider>>,
    /// Last observed playback status; only meaningful while the schedule
    /// gate is open. Initially `Stopped`.
    last_status: PlaybackStatus,
    /// True once Playing or Paused has been observed since the last
    /// Stopped-driven turn-on.
    armed: bool,
}

impl EngineRule {
    fn new(rule: ResolvedRule, media_factory: &MediaProviderFactory) -> Self {
        let media = rule
            .media
            .as_ref()
            .map(|media_config| media_factory(media_config));
        Self {
            rule,
            media,
            last_status: PlaybackStatus::Stopped,
            armed: false,
        }
    }
}

/// The rule evaluation engine.
pub struct Engine {
    config: Config,
    zone: ClockZone,
    raw_rules: Vec<Rule>,
    rules: Vec<EngineRule>,
    /// Per-device last-known on/off state. Absent means unknown, which is
    /// treated as off: a turn-on is issued, a turn-off is skipped unless
    /// forced.
    devices: std::collections::HashMap<String, bool>,
    driver: Box<dyn DeviceDriver>,
    media_factory: MediaProviderFactory,
    /// The date the rule windows were resolved for. Solar anchors go stale
    /// at midnight, so the first cycle of a new day re-resolves.
    resolved_for: NaiveDate,
    debug: bool,
}

impl Engine {
    pub fn new(
        config: Config,
        zone: ClockZone,
        raw_rules: Vec<Rule>,
        driver: Box<dyn DeviceDriver>,
        media_factory: MediaProviderFactory,
    ) -> Result<Self> {
        let resolved_for = zone.today();
        let resolved = resolve_rules(&raw_rules, &config, &zone, resolved_for)?;
        let debug = config.debug();
        let rules = resolved
            .into_iter()
            .map(|rule| EngineRule::new(rule, &media_factory))
            .collect();

        Ok(Self {
            config,
            zone,
            raw_rules,
            rules,
            devices: std::collections::HashMap::new(),
            driver,
            media_factory,
            resolved_for,
            debug,
        })
    }

    /// Query the live on/off state of every referenced device once, seeding
    /// the cache before the first cycle. Unknown or unreachable devices are
    /// skipped and stay absent from the cache.
    pub fn prime_devices(&mut self) {
        let mut names: Vec<String> = self
            .rules
            .iter()
            .flat_map(|er| er.rule.devices.iter().cloned())
            .collect();
        names.sort();
        names.dedup();

        for name in names {
            if self.devices.contains_key(&name) {
                continue;
            }
            match self.driver.get_state(&name) {
                Ok(on) => {
                    self.devices.insert(name, on);
                }
                Err(DeviceError::NotFound) => {
                    log_warning!("Device [{name}] not found, skipping state query");
                }
                Err(e) => {
                    log_warning!("Failed to query state of [{name}]: {e}");
                }
            }
        }
        log_decorated!("Initialized {} device state(s)", self.devices.len());
    }

    /// Replace the rule set in place after a reload signal.
    ///
    /// Per-rule playback state resets; the device cache is preserved and any
    /// newly referenced device is primed.
    pub fn reload_rules(&mut self, raw_rules: Vec<Rule>) -> Result<()> {
        let resolved_for = self.zone.today();
        let resolved = resolve_rules(&raw_rules, &self.config, &self.zone, resolved_for)?;

        self.raw_rules = raw_rules;
        self.rules = resolved
            .into_iter()
            .map(|rule| EngineRule::new(rule, &self.media_factory))
            .collect();
        self.resolved_for = resolved_for;
        self.prime_devices();
        Ok(())
    }

    /// Run one evaluation pass over all rules at the given wall-clock time.
    pub fn run_cycle(&mut self, now: NaiveDateTime) {
        self.refresh_windows_if_stale(now.date());

        for index in 0..self.rules.len() {
            self.evaluate_rule(index, now);
        }
    }

    /// Re-resolve solar anchors on the first cycle of a new day.
    ///
    /// Failure keeps yesterday's windows; slightly stale sunrise/sunset
    /// times beat killing the loop.
    fn refresh_windows_if_stale(&mut self, today: NaiveDate) {
        if today == self.resolved_for {
            return;
        }

        match resolve_rules(&self.raw_rules, &self.config, &self.zone, today) {
            Ok(resolved) => {
                for (er, rule) in self.rules.iter_mut().zip(resolved) {
                    er.rule = rule;
                }
                self.resolved_for = today;
                if self.debug {
                    log_debug!("Re-resolved rule windows for {today}");
                }
            }
            Err(e) => {
                log_warning!("Failed to re-resolve rule windows for {today}: {e:#}");
            }
        }
    }

    fn evaluate_rule(&mut self, index: usize, now: NaiveDateTime) {
        let er = &self.rules[index];
        let rule_id = er.rule.id.clone();
        let devices = er.rule.devices.clone();

        let day_pass = day_matches(now.weekday(), &er.rule.days);
        let time_pass = match er.rule.window {
            Some((on, off)) => window_matches(now.time(), on, off),
            None => true,
        };

        if !(day_pass && time_pass) {
            if self.debug {
                log_debug!("Day and time do not pass for {rule_id}");
            }
            // Schedule gate closed: desired state is off, playback tracking
            // is skipped and the latch stays untouched.
            self.turn_off_devices(&devices, false);
            return;
        }

        if self.debug {
            log_debug!("Day and time passed for {rule_id}");
        }

        let Some(media) = &self.rules[index].media else {
            self.turn_on_devices(&devices, false);
            return;
        };

        let player = self.rules[index]
            .rule
            .media
            .as_ref()
            .map(|m| m.player.clone())
            .unwrap_or_default();
        let status = media.player_status(&player);
        let previous = self.rules[index].last_status;

        match status {
            PlaybackStatus::Playing => {
                let force = previous == PlaybackStatus::Stopped;
                if force && self.debug {
                    log_debug!("{rule_id}: playback went STOPPED -> PLAYING, forcing turn off");
                }
                self.rules[index].armed = true;
                self.turn_off_devices(&devices, force);
            }
            PlaybackStatus::Paused => {
                let dim_level = self.rules[index]
                    .rule
                    .media
                    .as_ref()
                    .map(|m| m.dim_on_pause())
                    .unwrap_or(crate::rules::DEFAULT_DIM_ON_PAUSE);
                self.rules[index].armed = true;
                self.dim_devices(&devices, dim_level);
            }
            PlaybackStatus::Stopped => {
                if self.rules[index].armed {
                    let force = previous == PlaybackStatus::Paused;
                    if force && self.debug {
                        log_debug!("{rule_id}: playback went PAUSED -> STOPPED, forcing turn on");
                    }
                    self.rules[index].armed = false;
                    self.turn_on_devices(&devices, force);
                }
            }
        }

        self.rules[index].last_status = status;
    }

    /// Turn on all listed devices, skipping those the cache already records
    /// as on unless forced. Dimmable devices are restored to full brightness
    /// before switching on.
    fn turn_on_devices(&mut self, devices: &[String], force: bool) {
        for device in devices {
            let cached_on = self.devices.get(device).copied().unwrap_or(false);
            if cached_on && !force {
                continue;
            }

            match self.issue_on(device) {
                Ok(()) => {
                    log_decorated!("Turning on [{device}]");
                    self.devices.insert(device.clone(), true);
                }
                Err(DeviceError::NotFound) => {
                    log_warning!("Device [{device}] not found, skipping turn on");
                }
                Err(e) => {
                    log_warning!("Failed to turn on [{device}]: {e}");
                }
            }
        }
    }

    fn issue_on(&mut self, device: &str) -> Result<(), DeviceError> {
        if self.driver.is_dimmable(device)? {
            self.driver.dim(device, 100)?;
        }
        self.driver.turn_on(device)
    }

    /// Turn off all listed devices, skipping those the cache records as off
    /// (or unknown) unless forced.
    fn turn_off_devices(&mut self, devices: &[String], force: bool) {
        for device in devices {
            let cached_on = self.devices.get(device).copied().unwrap_or(false);
            if !cached_on && !force {
                continue;
            }

            match self.driver.turn_off(device) {
                Ok(()) => {
                    log_decorated!("Turning off [{device}]");
                    self.devices.insert(device.clone(), false);
                }
                Err(DeviceError::NotFound) => {
                    log_warning!("Device [{device}] not found, skipping turn off");
                }
                Err(e) => {
                    log_warning!("Failed to turn off [{device}]: {e}");
                }
            }
        }
    }

    /// Dim all listed devices that the cache records as off. Non-dimmable
    /// devices are turned fully on instead. Either way a success records the
    /// device as on.
    fn dim_devices(&mut self, devices: &[String], percent: u8) {
        for device in devices {
            let cached_on = self.devices.get(device).copied().unwrap_or(false);
            if cached_on {
                continue;
            }

            let outcome = match self.driver.is_dimmable(device) {
                Ok(true) => {
                    log_decorated!("Dimming [{device}] at {percent}%");
                    self.driver.dim(device, percent)
                }
                Ok(false) => {
                    log_decorated!("Dimming not supported, turning on [{device}]");
                    self.driver.turn_on(device)
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => {
                    self.devices.insert(device.clone(), true);
                }
                Err(DeviceError::NotFound) => {
                    log_warning!("Device [{device}] not found, skipping dim");
                }
                Err(e) => {
                    log_warning!("Failed to dim [{device}]: {e}");
                }
            }
        }
    }

    #[cfg(test)]
    fn cached_state(&self, device: &str) -> Option<bool> {
        self.devices.get(device).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceResult;
    use chrono::{NaiveDate, NaiveTime};
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Command {
        On(String),
        Off(String),
        Dim(String, u8),
    }

    /// In-memory driver that records every issued command.
    struct FakeDriver {
        state: HashMap<String, bool>,
        dimmable: HashSet<String>,
        missing: HashSet<String>,
        failing: HashSet<String>,
        commands: Rc<RefCell<Vec<Command>>>,
    }

    impl FakeDriver {
        fn check(&self, name: &str) -> DeviceResult<()> {
            if self.missing.contains(name) {
                return Err(DeviceError::NotFound);
            }
            if self.failing.contains(name) {
                return Err(DeviceError::Transport("connection refused".into()));
            }
            Ok(())
        }
    }

    impl DeviceDriver for FakeDriver {
        fn get_state(&mut self, name: &str) -> DeviceResult<bool> {
            self.check(name)?;
            Ok(self.state.get(name).copied().unwrap_or(false))
        }

        fn is_dimmable(&mut self, name: &str) -> DeviceResult<bool> {
            self.check(name)?;
            Ok(self.dimmable.contains(name))
        }

        fn turn_on(&mut self, name: &str) -> DeviceResult<()> {
            self.check(name)?;
            self.state.insert(name.to_string(), true);
            self.commands.borrow_mut().push(Command::On(name.to_string()));
            Ok(())
        }

        fn turn_off(&mut self, name: &str) -> DeviceResult<()> {
            self.check(name)?;
            self.state.insert(name.to_string(), false);
            self.commands.borrow_mut().push(Command::Off(name.to_string()));
            Ok(())
        }

        fn dim(&mut self, name: &str, percent: u8) -> DeviceResult<()> {
            self.check(name)?;
            self.state.insert(name.to_string(), true);
            self.commands
                .borrow_mut()
                .push(Command::Dim(name.to_string(), percent));
            Ok(())
        }
    }

    /// Media provider that replays a scripted status sequence, holding the
    /// last value once the script runs out.
    struct ScriptedMedia {
        script: Rc<RefCell<VecDeque<PlaybackStatus>>>,
        last: RefCell<PlaybackStatus>,
    }

    impl MediaStatusProvider for ScriptedMedia {
        fn player_status(&self, _player: &str) -> PlaybackStatus {
            if let Some(next) = self.script.borrow_mut().pop_front() {
                *self.last.borrow_mut() = next;
            }
            *self.last.borrow()
        }
    }

    struct Harness {
        engine: Engine,
        commands: Rc<RefCell<Vec<Command>>>,
        script: Rc<RefCell<VecDeque<PlaybackStatus>>>,
    }

    impl Harness {
        fn commands(&self) -> Vec<Command> {
            self.commands.borrow().clone()
        }

        fn clear(&self) {
            self.commands.borrow_mut().clear();
        }

        fn push_status(&self, status: PlaybackStatus) {
            self.script.borrow_mut().push_back(status);
        }
    }

    fn build_harness(
        rules_json: &str,
        initial_on: &[&str],
        dimmable: &[&str],
        missing: &[&str],
    ) -> Harness {
        crate::logger::Log::set_enabled(false);

        let raw_rules: Vec<Rule> = serde_json::from_str(rules_json).unwrap();
        let commands = Rc::new(RefCell::new(Vec::new()));
        let script: Rc<RefCell<VecDeque<PlaybackStatus>>> =
            Rc::new(RefCell::new(VecDeque::new()));

        let driver = FakeDriver {
            state: initial_on.iter().map(|d| (d.to_string(), true)).collect(),
            dimmable: dimmable.iter().map(|d| d.to_string()).collect(),
            missing: missing.iter().map(|d| d.to_string()).collect(),
            failing: HashSet::new(),
            commands: Rc::clone(&commands),
        };

        let script_for_factory = Rc::clone(&script);
        let factory: MediaProviderFactory = Box::new(move |_media| {
            Box::new(ScriptedMedia {
                script: Rc::clone(&script_for_factory),
                last: RefCell::new(PlaybackStatus::Stopped),
            })
        });

        let config: Config = toml::from_str("").unwrap();
        let zone = ClockZone::fixed("UTC").unwrap();
        let mut engine = Engine::new(config, zone, raw_rules, Box::new(driver), factory).unwrap();
        engine.prime_devices();

        Harness {
            engine,
            commands,
            script,
        }
    }

    // 2024-06-01 is a Saturday
    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    const SCHEDULE_ONLY: &str = r#"[{
        "device": "porchLight",
        "control": {"day": ["Sat", "Sun"], "time": {"on": "19:45", "off": "23:00"}}
    }]"#;

    const MEDIA_GATED: &str = r#"[{
        "device": ["lamp"],
        "control": {"plex": {"host": "10.0.0.2", "player": "Living Room"}}
    }]"#;

    #[test]
    fn schedule_pass_turns_on_once_and_stays_idempotent() {
        let mut h = build_harness(SCHEDULE_ONLY, &[], &[], &[]);

        h.engine.run_cycle(at(20, 0));
        assert_eq!(h.commands(), vec![Command::On("porchLight".into())]);
        assert_eq!(h.engine.cached_state("porchLight"), Some(true));

        // Second cycle with no external change: zero additional commands
        h.clear();
        h.engine.run_cycle(at(20, 5));
        assert!(h.commands().is_empty());
    }

    #[test]
    fn schedule_fail_turns_off_and_is_idempotent() {
        let mut h = build_harness(SCHEDULE_ONLY, &["porchLight"], &[], &[]);

        h.engine.run_cycle(at(12, 0));
        assert_eq!(h.commands(), vec![Command::Off("porchLight".into())]);

        h.clear();
        h.engine.run_cycle(at(12, 5));
        assert!(h.commands().is_empty());
    }

    #[test]
    fn wrong_day_fails_schedule() {
        let mut h = build_harness(SCHEDULE_ONLY, &["porchLight"], &[], &[]);

        // 2024-06-03 is a Monday, inside the time window
        let monday = NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(20, 0, 0).unwrap());
        h.engine.run_cycle(monday);
        assert_eq!(h.commands(), vec![Command::Off("porchLight".into())]);
    }

    #[test]
    fn dimmable_device_restores_full_brightness_on_turn_on() {
        let mut h = build_harness(SCHEDULE_ONLY, &[], &["porchLight"], &[]);

        h.engine.run_cycle(at(20, 0));
        assert_eq!(
            h.commands(),
            vec![
                Command::Dim("porchLight".into(), 100),
                Command::On("porchLight".into())
            ]
        );
    }

    #[test]
    fn unarmed_stopped_rule_is_a_no_op() {
        let mut h = build_harness(MEDIA_GATED, &[], &[], &[]);

        h.push_status(PlaybackStatus::Stopped);
        h.engine.run_cycle(at(20, 0));
        assert!(h.commands().is_empty());
        assert_eq!(h.engine.cached_state("lamp"), Some(false));
    }

    #[test]
    fn playing_turns_off_with_force_on_stopped_to_playing_edge() {
        // Lamp starts off, so without force the turn-off would be skipped.
        let mut h = build_harness(MEDIA_GATED, &[], &[], &[]);

        h.push_status(PlaybackStatus::Playing);
        h.engine.run_cycle(at(20, 0));
        // previous == Stopped: forced off even though cache says off
        assert_eq!(h.commands(), vec![Command::Off("lamp".into())]);

        // Still playing: no force, cache says off, nothing issued
        h.clear();
        h.engine.run_cycle(at(20, 1));
        assert!(h.commands().is_empty());
    }

    #[test]
    fn stopped_after_playing_turns_on_without_force() {
        let mut h = build_harness(MEDIA_GATED, &["lamp"], &[], &[]);

        h.push_status(PlaybackStatus::Playing);
        h.engine.run_cycle(at(20, 0));
        h.clear();

        h.push_status(PlaybackStatus::Stopped);
        h.engine.run_cycle(at(20, 5));
        // Armed and previous == Playing: plain turn-on, cache shows off
        assert_eq!(h.commands(), vec![Command::On("lamp".into())]);

        // Stopped again, latch cleared: no further commands
        h.clear();
        h.engine.run_cycle(at(20, 10));
        assert!(h.commands().is_empty());
    }

    #[test]
    fn paused_dims_then_stop_forces_full_on() {
        let mut h = build_harness(MEDIA_GATED, &["lamp"], &["lamp"], &[]);

        h.push_status(PlaybackStatus::Playing);
        h.engine.run_cycle(at(20, 0));
        assert_eq!(h.commands(), vec![Command::Off("lamp".into())]);
        h.clear();

        h.push_status(PlaybackStatus::Paused);
        h.engine.run_cycle(at(20, 5));
        assert_eq!(h.commands(), vec![Command::Dim("lamp".into(), 40)]);
        assert_eq!(h.engine.cached_state("lamp"), Some(true));
        h.clear();

        h.push_status(PlaybackStatus::Stopped);
        h.engine.run_cycle(at(20, 10));
        // previous == Paused: forced on despite the cache reading on,
        // restoring full brightness first
        assert_eq!(
            h.commands(),
            vec![Command::Dim("lamp".into(), 100), Command::On("lamp".into())]
        );
    }

    #[test]
    fn paused_dim_skips_devices_already_recorded_on() {
        let mut h = build_harness(MEDIA_GATED, &["lamp"], &[], &[]);

        h.push_status(PlaybackStatus::Paused);
        h.engine.run_cycle(at(20, 0));
        // Cache says on: dim gate mirrors the turn-on gate and skips
        assert!(h.commands().is_empty());
    }

    #[test]
    fn dim_fallback_turns_on_non_dimmable_device() {
        let mut h = build_harness(MEDIA_GATED, &[], &[], &[]);

        h.push_status(PlaybackStatus::Paused);
        h.engine.run_cycle(at(20, 0));
        assert_eq!(h.commands(), vec![Command::On("lamp".into())]);
        assert_eq!(h.engine.cached_state("lamp"), Some(true));
    }

    #[test]
    fn custom_dim_level_is_used() {
        let rules = r#"[{
            "device": "lamp",
            "control": {"plex": {"host": "h", "player": "p", "dim_on_pause": 25}}
        }]"#;
        let mut h = build_harness(rules, &[], &["lamp"], &[]);

        h.push_status(PlaybackStatus::Paused);
        h.engine.run_cycle(at(20, 0));
        assert_eq!(h.commands(), vec![Command::Dim("lamp".into(), 25)]);
    }

    #[test]
    fn schedule_gate_closed_skips_playback_tracking() {
        let rules = r#"[{
            "device": "lamp",
            "control": {
                "time": {"on": "19:00", "off": "23:00"},
                "plex": {"host": "h", "player": "p"}
            }
        }]"#;
        let mut h = build_harness(rules, &["lamp"], &[], &[]);

        // Outside the window: devices off, media never queried
        h.push_status(PlaybackStatus::Playing);
        h.engine.run_cycle(at(12, 0));
        assert_eq!(h.commands(), vec![Command::Off("lamp".into())]);
        // The scripted status is still queued because no query consumed it
        assert_eq!(h.script.borrow().len(), 1);
    }

    #[test]
    fn missing_device_is_skipped_without_cache_update() {
        let rules = r#"[{"device": ["ghost", "porchLight"]}]"#;
        let mut h = build_harness(rules, &[], &[], &["ghost"]);

        // No schedule and no media gate: always-on rule
        h.engine.run_cycle(at(10, 0));
        assert_eq!(h.commands(), vec![Command::On("porchLight".into())]);
        assert_eq!(h.engine.cached_state("ghost"), None);
        assert_eq!(h.engine.cached_state("porchLight"), Some(true));
    }

    #[test]
    fn transport_failure_does_not_update_cache_and_retries_next_cycle() {
        let mut h = build_harness(SCHEDULE_ONLY, &[], &[], &[]);
        h.engine.driver = Box::new(FakeDriver {
            state: HashMap::new(),
            dimmable: HashSet::new(),
            missing: HashSet::new(),
            failing: ["porchLight".to_string()].into_iter().collect(),
            commands: Rc::clone(&h.commands),
        });

        h.engine.run_cycle(at(20, 0));
        assert!(h.commands().is_empty());
        // Cache still reads off, so the next cycle retries
        assert_eq!(h.engine.cached_state("porchLight"), Some(false));
    }

    #[test]
    fn reload_resets_playback_latch_but_keeps_device_cache() {
        let mut h = build_harness(MEDIA_GATED, &[], &[], &[]);

        h.push_status(PlaybackStatus::Playing);
        h.engine.run_cycle(at(20, 0));
        h.clear();

        let raw_rules: Vec<Rule> = serde_json::from_str(MEDIA_GATED).unwrap();
        h.engine.reload_rules(raw_rules).unwrap();

        // Latch is unarmed again: Stopped produces no turn-on
        h.push_status(PlaybackStatus::Stopped);
        h.engine.run_cycle(at(20, 5));
        assert!(h.commands().is_empty());
    }
}
