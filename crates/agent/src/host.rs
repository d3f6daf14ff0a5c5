//! Host interface
//!
//! The agent never reaches into the game directly. Everything it reads or
//! changes goes through [`Host`], so the same dispatcher runs against the
//! real client bindings and against [`crate::sim::SimHost`] in tests.

use std::collections::BTreeMap;
use std::fmt;

use crate::pause::{PauseProbe, PauseSurfaces};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlayerSlot {
    P1,
    P2,
}

impl PlayerSlot {
    pub const ALL: [PlayerSlot; 2] = [PlayerSlot::P1, PlayerSlot::P2];

    pub fn name(self) -> &'static str {
        match self {
            PlayerSlot::P1 => "P1",
            PlayerSlot::P2 => "P2",
        }
    }

    /// Suffix used on per-player status fields, e.g. `score_p1`
    pub fn field_suffix(self) -> &'static str {
        match self {
            PlayerSlot::P1 => "p1",
            PlayerSlot::P2 => "p2",
        }
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A song as the host's library reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongInfo {
    /// Unique directory, e.g. `/Songs/Pack/Song/`
    pub song_dir: String,
    pub title: String,
    pub group: String,

    /// Difficulty names with steps for the current style
    pub difficulties: Vec<String>,
}

impl SongInfo {
    pub fn has_difficulty(&self, difficulty: &str) -> bool {
        self.difficulties.iter().any(|d| d == difficulty)
    }
}

/// Live statistics for one player; each field is best-effort
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerStats {
    pub score: Option<f64>,
    pub combo: Option<f64>,
    pub percent_dp: Option<f64>,
    pub judgments: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("No screen is active")]
    NoScreen,

    #[error("Host rejected the operation: {0}")]
    Rejected(String),

    #[error("Host call failed: {0}")]
    Failed(String),
}

/// The game application as seen by the dispatcher
///
/// Reads never fail; values the host cannot supply come back as `None` or
/// empty. Mutations report failures through [`HostError`].
pub trait Host {
    /// Product name reported by hello
    fn name(&self) -> String;

    fn version(&self) -> String;

    /// Class name of the top screen
    fn top_screen(&self) -> Option<String>;

    fn is_playing(&self) -> bool;

    fn joined_players(&self) -> Vec<PlayerSlot>;

    /// Song group names in the host's order
    fn song_groups(&self) -> Vec<String>;

    /// Every song, in the host's scan order
    fn songs(&self) -> Vec<SongInfo>;

    /// Exact, case-sensitive lookup by song directory
    fn find_song(&self, song_dir: &str) -> Option<SongInfo> {
        self.songs().into_iter().find(|s| s.song_dir == song_dir)
    }

    fn current_song(&self) -> Option<SongInfo>;

    fn current_difficulty(&self, player: PlayerSlot) -> Option<String>;

    fn player_stats(&self, _player: PlayerSlot) -> PlayerStats {
        PlayerStats::default()
    }

    /// Whether the game is paused, if the host can tell
    fn paused(&self) -> Option<bool>;

    fn pause_surfaces(&self) -> PauseSurfaces;

    fn set_paused(&mut self, probe: PauseProbe, paused: bool) -> Result<(), HostError>;

    /// Selects `song` at `difficulty` for every player in `players` and
    /// leaves the select-music screen for gameplay
    fn start_song(
        &mut self,
        song: &SongInfo,
        difficulty: &str,
        players: &[PlayerSlot],
    ) -> Result<(), HostError>;

    /// Whether the top screen accepts a cancel
    fn can_cancel(&self) -> bool;

    fn cancel(&mut self) -> Result<(), HostError>;
}
