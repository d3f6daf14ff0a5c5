//! Response envelopes
//!
//! Builders used by the agent to assemble envelopes, and serde views used by
//! the controller to read them back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{Table, Value};

/// Machine-readable failure reasons
pub mod reasons {
    pub const UNKNOWN_COMMAND: &str = "unknown_command";
    pub const BAD_PAYLOAD: &str = "bad_payload";
    pub const HANDLER_ERROR: &str = "handler_error";
    pub const RESPONSE_TOO_LARGE: &str = "response_too_large";
    pub const MUST_BE_ON_SELECT_MUSIC_SCREEN: &str = "must_be_on_select_music_screen";
    pub const NO_PLAYER_JOINED: &str = "no_player_joined";
    pub const SONG_NOT_FOUND: &str = "song_not_found";
    pub const STEPS_NOT_FOUND: &str = "steps_not_found";
    pub const NO_PAUSE_CAPABILITY: &str = "no_pause_capability";
    pub const NOT_CANCELLABLE: &str = "not_cancellable";
}

/// Starts a successful envelope
pub fn ok() -> Table {
    Table::new().with("ok", true)
}

/// Starts a failed envelope carrying `reason`
pub fn failure(reason: &str) -> Table {
    Table::new().with("ok", false).with("reason", reason)
}

/// Envelope sent on `0xFF`
pub fn error_envelope(reason: &str, command: u8, detail: Option<&str>) -> Value {
    failure(reason)
        .with("command", command)
        .with_opt("detail", detail)
        .into()
}

/// Fields shared by every envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Body of a `0xFF` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub reason: String,

    /// Command id the failure belongs to
    #[serde(default)]
    pub command: Option<u8>,

    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloInfo {
    pub name: String,
    pub version: String,
    pub protocol_version: u32,
    pub session_id: String,

    #[serde(default)]
    pub screen: Option<String>,

    #[serde(default)]
    pub commands: Vec<u8>,

    #[serde(default)]
    pub pause_method: Option<String>,
}

/// Snapshot returned by the status command
///
/// Everything beyond the screen and play flags is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSnapshot {
    pub screen: String,
    pub is_playing: bool,
    pub players: Vec<String>,
    pub paused_known: bool,
    pub paused: Option<bool>,

    pub current_song_dir: Option<String>,
    pub current_title: Option<String>,
    pub current_group: Option<String>,
    pub current_difficulty_p1: Option<String>,
    pub current_difficulty_p2: Option<String>,

    pub score_p1: Option<f64>,
    pub score_p2: Option<f64>,
    pub current_combo_p1: Option<f64>,
    pub current_combo_p2: Option<f64>,
    pub percent_dp_p1: Option<f64>,
    pub percent_dp_p2: Option<f64>,
    pub judgments_p1: Option<BTreeMap<String, f64>>,
    pub judgments_p2: Option<BTreeMap<String, f64>>,
}

impl StatusSnapshot {
    /// Whether gameplay is running, by flag or by screen name
    pub fn inferred_playing(&self) -> bool {
        self.is_playing || is_gameplay_screen(&self.screen)
    }

    /// Sum of all judgment counters for player 1
    pub fn judgment_total_p1(&self) -> f64 {
        self.judgments_p1
            .as_ref()
            .map(|j| j.values().sum())
            .unwrap_or(0.0)
    }
}

/// Wrapper matching the `{ok, status}` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub ok: bool,

    #[serde(default)]
    pub status: StatusSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongEntry {
    pub song_dir: String,
    pub title: String,
    pub group: String,

    #[serde(default)]
    pub difficulties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongList {
    pub ok: bool,

    #[serde(default)]
    pub songs: Vec<SongEntry>,

    #[serde(default)]
    pub count: usize,

    #[serde(default)]
    pub total: usize,

    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupList {
    pub ok: bool,

    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(default)]
    pub count: usize,

    #[serde(default)]
    pub total: usize,

    #[serde(default)]
    pub truncated: bool,
}

/// Screens on which a song may be started
pub const SELECT_MUSIC_SCREENS: [&str; 2] = ["ScreenSelectMusic", "ScreenSelectMusicCasual"];

pub fn is_select_music_screen(screen: &str) -> bool {
    SELECT_MUSIC_SCREENS.contains(&screen)
}

pub fn is_gameplay_screen(screen: &str) -> bool {
    screen.starts_with("ScreenGameplay")
}
