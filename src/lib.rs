//! # Rulesr Library
//!
//! Internal library for the rulesr binary application.
//!
//! This library exists to enable testing of the evaluation internals and
//! provide clean separation between CLI dispatch (main.rs) and the engine.
//!
//! ## Architecture
//!
//! - **Configuration**: `config` module for TOML-based settings and the
//!   clock-zone abstraction
//! - **Rules**: `rules` module for the JSON rule file, validation, and
//!   per-date normalization of solar anchors
//! - **Matching**: `schedule` for day/time-window predicates, `solar` for
//!   sunrise/sunset resolution
//! - **I/O**: `device` for the device-bridge driver, `media` for the
//!   media-server session query
//! - **Core Logic**: `engine` owns the evaluation loop state, the playback
//!   latch, and the device cache
//! - **Infrastructure**: signal handling and logging

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod config;
pub mod device;
pub mod engine;
pub mod media;
pub mod rules;
pub mod schedule;
pub mod signals;
pub mod solar;
