//! Main application entry point and high-level flow coordination.
//!
//! This module orchestrates the application lifecycle after command-line
//! argument parsing is complete. It coordinates between the modules:
//!
//! - `args`: Command-line argument parsing and help/version display
//! - `config`: Configuration loading and validation
//! - `rules`: Rule file loading and per-date normalization
//! - `engine`: The evaluation loop state, playback latch, and device cache
//! - `device` / `media`: HTTP drivers for the device bridge and media server
//! - `signals`: Signal handling and process management
//! - `logger`: Centralized logging functionality
//!
//! The main flow consists of:
//! 1. Argument parsing and early exit for help/version/check
//! 2. Lock file management (one instance per machine)
//! 3. Configuration and rule file loading
//! 4. Device state priming
//! 5. The evaluation loop with signal-aware sleeps between cycles
//! 6. Graceful cleanup on shutdown

use anyhow::{Context, Result, anyhow};
use fs2::FileExt;
use std::{
    fs::File,
    path::Path,
    sync::atomic::Ordering,
    time::Duration,
};

// Import macros from logger module for use in all submodules
#[macro_use]
mod logger;

mod args;
mod config;
mod device;
mod engine;
mod media;
mod rules;
mod schedule;
mod signals;
mod solar;

use args::{CliAction, ParsedArgs, display_help, display_version_info};
use config::Config;
use device::BridgeDriver;
use engine::{Engine, MediaProviderFactory};
use media::PlexClient;
use signals::{SignalMessage, setup_signal_handler};

fn main() {
    let parsed = ParsedArgs::from_env();

    let result = match parsed.action {
        CliAction::ShowHelp => {
            display_help();
            Ok(())
        }
        CliAction::ShowVersion => {
            display_version_info();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            display_help();
            std::process::exit(1);
        }
        CliAction::Check {
            debug_enabled,
            config_dir,
        } => config::set_config_dir(config_dir).and_then(|_| run_check(debug_enabled)),
        CliAction::Run {
            debug_enabled,
            config_dir,
        } => config::set_config_dir(config_dir).and_then(|_| run_daemon(debug_enabled)),
    };

    if let Err(e) = result {
        log_error_exit!("{e:#}");
        std::process::exit(1);
    }
}

/// Run the evaluation loop until a shutdown signal arrives.
fn run_daemon(debug_enabled: bool) -> Result<()> {
    log_version!();

    let signal_state = setup_signal_handler()?;

    let mut config = Config::load()?;
    if debug_enabled {
        config.debug = Some(true);
    }
    config.log_config();

    let _lock = acquire_lock()?;

    let zone = config.clock_zone()?;
    let rule_path = config.rule_path()?.to_string();
    let raw_rules = rules::load_rules(Path::new(&rule_path))?;
    log_block_start!("Loaded {} rule(s) from {rule_path}", raw_rules.len());

    let timeout = Duration::from_secs(config.io_timeout());
    let driver = BridgeDriver::new(config.bridge_url()?, timeout);
    let media_factory: MediaProviderFactory =
        Box::new(move |media| Box::new(PlexClient::new(media, timeout)));

    let debug = config.debug();
    let run_interval = config.run_interval();
    let mut engine = Engine::new(
        config,
        zone.clone(),
        raw_rules,
        Box::new(driver),
        media_factory,
    )?;
    engine.prime_devices();

    log_block_start!("Starting evaluation loop ({run_interval}s interval)");

    while signal_state.running.load(Ordering::SeqCst) {
        let now = zone.now();
        if debug {
            log_block_start!("Evaluation cycle at {}", now.format("%Y-%m-%d %H:%M:%S"));
        }
        engine.run_cycle(now);

        // Sleep until the next cycle, waking early for signals
        match signal_state
            .signal_receiver
            .recv_timeout(Duration::from_secs(run_interval))
        {
            Ok(SignalMessage::Shutdown) => break,
            Ok(SignalMessage::Reload) => reload_rules(&mut engine, &rule_path),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    log_block_start!("Shutting down rulesr...");
    log_end!();
    Ok(())
}

/// Re-read the rule file after SIGUSR2; a bad file keeps the previous rules.
fn reload_rules(engine: &mut Engine, rule_path: &str) {
    match rules::load_rules(Path::new(rule_path)) {
        Ok(raw_rules) => {
            let count = raw_rules.len();
            match engine.reload_rules(raw_rules) {
                Ok(()) => log_info!("Reloaded {count} rule(s) from {rule_path}"),
                Err(e) => {
                    log_pipe!();
                    log_error!("Failed to apply reloaded rules, keeping previous set: {e:#}");
                }
            }
        }
        Err(e) => {
            log_pipe!();
            log_error!("Failed to reload rule file, keeping previous set: {e:#}");
        }
    }
}

/// Resolve and print today's rule table, then exit without touching devices.
fn run_check(debug_enabled: bool) -> Result<()> {
    log_version!();

    let mut config = Config::load()?;
    if debug_enabled {
        config.debug = Some(true);
    }
    config.log_config();

    let zone = config.clock_zone()?;
    let rule_path = config.rule_path()?.to_string();
    let raw_rules = rules::load_rules(Path::new(&rule_path))?;

    let today = zone.today();
    let resolved = rules::resolve_rules(&raw_rules, &config, &zone, today)?;

    log_block_start!("Resolved {} rule(s) for {today}", resolved.len());
    for rule in &resolved {
        log_block_start!("{} -> {}", rule.id, rule.devices.join(", "));
        if rule.days.is_empty() {
            log_indented!("Days: every day");
        } else {
            let names: Vec<String> = rule.days.iter().map(|d| d.to_string()).collect();
            log_indented!("Days: {}", names.join(", "));
        }
        match rule.window {
            Some((on, off)) => log_indented!(
                "Window: {} - {}{}",
                on.format("%H:%M"),
                off.format("%H:%M"),
                if on > off { " (overnight)" } else { "" }
            ),
            None => log_indented!("Window: all day"),
        }
        match &rule.media {
            Some(media) => log_indented!(
                "Media gate: player '{}' on {} (dim {}% on pause)",
                media.player,
                media.host,
                media.dim_on_pause()
            ),
            None => log_indented!("Media gate: none"),
        }
    }
    log_end!();
    Ok(())
}

/// Single-instance lock file holding the daemon PID.
///
/// The flock is dropped by the OS when the process exits, so a leftover file
/// from a crash never blocks the next start; a live holder does.
fn acquire_lock() -> Result<File> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    let lock_path = format!("{runtime_dir}/rulesr.lock");

    // Open without truncating so a conflicting holder's PID stays readable
    let mut lock_file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("Failed to open lock file {lock_path}"))?;

    match lock_file.try_lock_exclusive() {
        Ok(()) => {
            use std::io::{Seek, SeekFrom, Write};

            lock_file.set_len(0)?;
            lock_file.seek(SeekFrom::Start(0))?;
            writeln!(&lock_file, "{}", std::process::id())?;
            lock_file.flush()?;

            log_block_start!("Lock acquired, starting rulesr...");
            Ok(lock_file)
        }
        Err(_) => {
            use std::io::Read;

            let mut holder = String::new();
            let _ = lock_file.read_to_string(&mut holder);
            let pid = holder.lines().next().unwrap_or("unknown").to_string();
            Err(anyhow!("rulesr is already running (PID {pid})"))
        }
    }
}
