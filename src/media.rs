//! Media-server playback state tracking.
//!
//! One rule may gate its devices on what a named player (client) is doing on
//! a Plex-style media server. This module owns the session query: an HTTP GET
//! against `/status/sessions`, a session-list parse (the server answers with
//! the legacy XML document or JSON depending on deployment), and the
//! reduction of the matching session to a three-state `PlaybackStatus`.
//!
//! The tracker holds no state of its own. Any transport failure or malformed
//! response reduces to `Stopped`: a media-server outage must read as "no
//! media constraint", never crash the evaluation loop.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::time::Duration;
use ureq::Agent;

use crate::rules::MediaConfig;

/// Observed playback state of a player, reduced from the session list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    /// No session for the player, or an unrecognized state.
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Query seam between the engine and the media server.
///
/// The engine only ever asks "what is this player doing right now"; tests
/// script the answers, production uses [`PlexClient`].
pub trait MediaStatusProvider {
    fn player_status(&self, player: &str) -> PlaybackStatus;
}

/// Title and state of one player as reported by the session list.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub title: String,
    pub state: String,
}

/// Blocking HTTP client for the media server's session endpoint.
pub struct PlexClient {
    url: String,
    agent: Agent,
}

impl PlexClient {
    pub fn new(media: &MediaConfig, timeout: Duration) -> Self {
        Self {
            url: media.url(),
            agent: build_agent(timeout),
        }
    }

    fn fetch_players(&self) -> Result<Vec<PlayerState>> {
        let mut response = self
            .agent
            .get(&self.url)
            .call()
            .with_context(|| format!("Media server request failed for {}", self.url))?;

        let body = response
            .body_mut()
            .read_to_string()
            .context("Failed to read media server response body")?;

        parse_sessions(&body)
    }
}

impl MediaStatusProvider for PlexClient {
    /// Reduce the session list to the named player's playback status.
    ///
    /// Fails open: any query or parse error is logged and reported as
    /// `Stopped` so a transient outage cannot take down the cycle.
    fn player_status(&self, player: &str) -> PlaybackStatus {
        let players = match self.fetch_players() {
            Ok(players) => players,
            Err(e) => {
                log_warning!("Media status query failed, treating as stopped: {e:#}");
                return PlaybackStatus::Stopped;
            }
        };

        reduce_status(&players, player)
    }
}

/// Shared agent construction with a bounded global timeout.
fn build_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// First matching session with a playing or paused state wins; everything
/// else (no match, empty list, unknown state) is `Stopped`.
pub fn reduce_status(players: &[PlayerState], player: &str) -> PlaybackStatus {
    for candidate in players {
        if candidate.title != player {
            continue;
        }
        match candidate.state.as_str() {
            "playing" => return PlaybackStatus::Playing,
            "paused" => return PlaybackStatus::Paused,
            _ => {}
        }
    }
    PlaybackStatus::Stopped
}

/// Parse a session document into player states.
///
/// The legacy endpoint answers with XML; newer deployments answer with JSON.
/// Both carry the same logical shape, so the first non-whitespace byte
/// decides the parser.
pub fn parse_sessions(body: &str) -> Result<Vec<PlayerState>> {
    match body.trim_start().chars().next() {
        Some('<') => parse_xml_sessions(body),
        Some('{') => parse_json_sessions(body),
        _ => bail!("Unrecognized session document (neither XML nor JSON)"),
    }
}

// Legacy XML shape:
//   <MediaContainer size="1">
//     <Video ...><Player title="Living Room" state="playing"/></Video>
//     <Track ...><Player .../></Track>
//   </MediaContainer>
#[derive(Debug, Deserialize)]
struct XmlContainer {
    #[serde(rename = "Video", default)]
    videos: Vec<XmlSession>,
    #[serde(rename = "Track", default)]
    tracks: Vec<XmlSession>,
}

#[derive(Debug, Deserialize)]
struct XmlSession {
    #[serde(rename = "Player")]
    player: Option<XmlPlayer>,
}

#[derive(Debug, Deserialize)]
struct XmlPlayer {
    #[serde(rename = "@title")]
    title: String,
    #[serde(rename = "@state")]
    state: String,
}

fn parse_xml_sessions(body: &str) -> Result<Vec<PlayerState>> {
    let container: XmlContainer =
        quick_xml::de::from_str(body).context("Failed to parse XML session document")?;

    Ok(container
        .videos
        .into_iter()
        .chain(container.tracks)
        .filter_map(|session| session.player)
        .map(|player| PlayerState {
            title: player.title,
            state: player.state,
        })
        .collect())
}

// JSON shape:
//   {"MediaContainer": {"Metadata": [{"Player": {"title": "...", "state": "..."}}]}}
#[derive(Debug, Deserialize)]
struct JsonEnvelope {
    #[serde(rename = "MediaContainer")]
    container: JsonContainer,
}

#[derive(Debug, Deserialize, Default)]
struct JsonContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<JsonSession>,
}

#[derive(Debug, Deserialize)]
struct JsonSession {
    #[serde(rename = "Player")]
    player: Option<JsonPlayer>,
}

#[derive(Debug, Deserialize)]
struct JsonPlayer {
    title: String,
    state: String,
}

fn parse_json_sessions(body: &str) -> Result<Vec<PlayerState>> {
    let envelope: JsonEnvelope =
        serde_json::from_str(body).context("Failed to parse JSON session document")?;

    Ok(envelope
        .container
        .metadata
        .into_iter()
        .filter_map(|session| session.player)
        .map(|player| PlayerState {
            title: player.title,
            state: player.state,
        })
        .collect())
}
