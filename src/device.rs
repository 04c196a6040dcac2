//! Device driver seam and the HTTP bridge implementation.
//!
//! The engine never talks a discovery or control protocol itself; it issues
//! on/off/dim commands through the [`DeviceDriver`] trait. Production wires
//! in [`BridgeDriver`], a blocking client for a small REST bridge that fronts
//! the actual smart devices:
//!
//! - `GET  {base}/devices/{name}`      → `{"on": bool, "dimmable": bool}`, 404 when unknown
//! - `POST {base}/devices/{name}/on`   → 2xx on success
//! - `POST {base}/devices/{name}/off`  → 2xx on success
//! - `POST {base}/devices/{name}/dim`  → body `{"level": <1-100>}`, 2xx on success
//!
//! "Device not found" is a first-class outcome, not a string-matched error:
//! the engine skips unknown devices without touching its state cache, while
//! transport failures are logged and skipped per cycle.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use ureq::Agent;

/// Outcome of a device operation that must distinguish "no such device"
/// from a transport failure.
#[derive(Debug)]
pub enum DeviceError {
    /// The bridge does not know this device name.
    NotFound,
    /// Anything else: connection refused, timeout, bad response.
    Transport(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NotFound => write!(f, "device not found"),
            DeviceError::Transport(message) => write!(f, "transport error: {message}"),
        }
    }
}

impl std::error::Error for DeviceError {}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Control interface the engine depends on.
pub trait DeviceDriver {
    /// Current on/off state of a device.
    fn get_state(&mut self, name: &str) -> DeviceResult<bool>;
    /// Whether the device supports brightness control.
    fn is_dimmable(&mut self, name: &str) -> DeviceResult<bool>;
    fn turn_on(&mut self, name: &str) -> DeviceResult<()>;
    fn turn_off(&mut self, name: &str) -> DeviceResult<()>;
    /// Set brightness to `percent` (1-100). Implies the device is on.
    fn dim(&mut self, name: &str, percent: u8) -> DeviceResult<()>;
}

#[derive(Debug, Deserialize)]
struct BridgeDeviceState {
    on: bool,
    dimmable: bool,
}

/// Blocking HTTP client for the device bridge.
pub struct BridgeDriver {
    base: String,
    agent: Agent,
}

impl BridgeDriver {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            agent: Agent::config_builder()
                .timeout_global(Some(timeout))
                .build()
                .into(),
        }
    }

    fn device_url(&self, name: &str) -> String {
        format!("{}/devices/{}", self.base, name)
    }

    fn fetch_device(&self, name: &str) -> DeviceResult<BridgeDeviceState> {
        let mut response = self
            .agent
            .get(&self.device_url(name))
            .call()
            .map_err(map_ureq_error)?;

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| DeviceError::Transport(format!("failed to read bridge response: {e}")))?;

        serde_json::from_str(&body)
            .map_err(|e| DeviceError::Transport(format!("malformed bridge response: {e}")))
    }

    fn post_empty(&self, name: &str, action: &str) -> DeviceResult<()> {
        let url = format!("{}/{}", self.device_url(name), action);
        self.agent
            .post(&url)
            .send_empty()
            .map_err(map_ureq_error)?;
        Ok(())
    }
}

fn map_ureq_error(error: ureq::Error) -> DeviceError {
    match error {
        ureq::Error::StatusCode(404) => DeviceError::NotFound,
        other => DeviceError::Transport(other.to_string()),
    }
}

impl DeviceDriver for BridgeDriver {
    fn get_state(&mut self, name: &str) -> DeviceResult<bool> {
        Ok(self.fetch_device(name)?.on)
    }

    fn is_dimmable(&mut self, name: &str) -> DeviceResult<bool> {
        Ok(self.fetch_device(name)?.dimmable)
    }

    fn turn_on(&mut self, name: &str) -> DeviceResult<()> {
        self.post_empty(name, "on")
    }

    fn turn_off(&mut self, name: &str) -> DeviceResult<()> {
        self.post_empty(name, "off")
    }

    fn dim(&mut self, name: &str, percent: u8) -> DeviceResult<()> {
        let url = format!("{}/dim", self.device_url(name));
        let body = serde_json::json!({ "level": percent });
        self.agent
            .post(&url)
            .header("content-type", "application/json")
            .send(serde_json::to_vec(&body).map_err(|e| {
                DeviceError::Transport(format!("failed to encode dim payload: {e}"))
            })?)
            .map_err(map_ureq_error)?;
        Ok(())
    }
}
