//! In-memory host
//!
//! [`SimHost`] models the small part of the game the dispatcher touches: a
//! screen stack reduced to one screen name, joined players, a song library,
//! and per-player stats during gameplay. Clones share state, so a test can
//! keep a handle while the agent owns another.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::host::{Host, HostError, PlayerSlot, PlayerStats, SongInfo};
use crate::pause::{PauseProbe, PauseSurfaces};

pub const SCREEN_TITLE: &str = "ScreenTitleMenu";
pub const SCREEN_SELECT_MUSIC: &str = "ScreenSelectMusic";
pub const SCREEN_GAMEPLAY: &str = "ScreenGameplay";

/// Mutation fault armed for the next host call
#[derive(Debug, Clone)]
enum Fault {
    Error(String),
    #[cfg(any(test, feature = "sim-faults"))]
    Panic(String),
}

#[derive(Debug)]
struct SimState {
    screen: String,
    players: Vec<PlayerSlot>,
    library: Vec<SongInfo>,
    current_song: Option<SongInfo>,
    difficulties: BTreeMap<PlayerSlot, String>,
    stats: BTreeMap<PlayerSlot, PlayerStats>,
    paused: bool,
    surfaces: Option<PauseSurfaces>,
    fault: Option<Fault>,
    pause_calls: Vec<(PauseProbe, bool)>,
}

#[derive(Debug, Clone)]
pub struct SimHost {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                screen: SCREEN_TITLE.to_string(),
                players: Vec::new(),
                library: Vec::new(),
                current_song: None,
                difficulties: BTreeMap::new(),
                stats: BTreeMap::new(),
                paused: false,
                surfaces: None,
                fault: None,
                pause_calls: Vec::new(),
            })),
        }
    }

    /// A host sitting on the music wheel with P1 joined and a small library
    pub fn ready() -> Self {
        let host = Self::new();
        host.add_song(
            "/Songs/Starter Pack/First Steps/",
            "First Steps",
            &["Difficulty_Beginner", "Difficulty_Easy"],
        );
        host.add_song(
            "/Songs/Starter Pack/Second Wind/",
            "Second Wind",
            &["Difficulty_Medium", "Difficulty_Hard"],
        );
        host.add_song(
            "/Songs/Club Mix/Night Drive/",
            "Night Drive",
            &["Difficulty_Easy", "Difficulty_Challenge"],
        );
        host.join(PlayerSlot::P1);
        host.set_screen(SCREEN_SELECT_MUSIC);
        host
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a song; its group is the directory's parent
    pub fn add_song(&self, song_dir: &str, title: &str, difficulties: &[&str]) {
        let group = song_dir
            .trim_matches('/')
            .split('/')
            .rev()
            .nth(1)
            .unwrap_or_default()
            .to_string();

        self.lock().library.push(SongInfo {
            song_dir: song_dir.to_string(),
            title: title.to_string(),
            group,
            difficulties: difficulties.iter().map(|d| d.to_string()).collect(),
        });
    }

    pub fn set_screen(&self, screen: &str) {
        self.lock().screen = screen.to_string();
    }

    pub fn screen(&self) -> String {
        self.lock().screen.clone()
    }

    pub fn join(&self, player: PlayerSlot) {
        let mut state = self.lock();
        if !state.players.contains(&player) {
            state.players.push(player);
            state.players.sort();
        }
    }

    pub fn unjoin_all(&self) {
        self.lock().players.clear();
    }

    /// Replaces the pause surfaces derived from the screen
    pub fn set_pause_surfaces(&self, surfaces: Option<PauseSurfaces>) {
        self.lock().surfaces = surfaces;
    }

    /// Makes the next mutation fail with `message`
    pub fn fail_next(&self, message: &str) {
        self.lock().fault = Some(Fault::Error(message.to_string()));
    }

    /// Makes the next mutation panic with `message`
    #[cfg(any(test, feature = "sim-faults"))]
    pub fn panic_next(&self, message: &str) {
        self.lock().fault = Some(Fault::Panic(message.to_string()));
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn pause_calls(&self) -> Vec<(PauseProbe, bool)> {
        self.lock().pause_calls.clone()
    }

    /// Simulates `notes` hit notes for every joined player
    pub fn play_notes(&self, notes: u32) {
        let mut state = self.lock();
        if state.current_song.is_none() || state.paused {
            return;
        }

        let players = state.players.clone();
        for player in players {
            let stats = state.stats.entry(player).or_default();
            let n = f64::from(notes);
            stats.score = Some(stats.score.unwrap_or(0.0) + 1000.0 * n);
            stats.combo = Some(stats.combo.unwrap_or(0.0) + n);
            stats.percent_dp = Some((stats.percent_dp.unwrap_or(0.0) + 0.5 * n).min(100.0));
            *stats
                .judgments
                .get_or_insert_with(BTreeMap::new)
                .entry("W1".to_string())
                .or_insert(0.0) += n;
        }
    }

    /// Consumes an armed fault; panics happen after the lock is released
    fn check_fault(&self) -> Result<(), HostError> {
        let fault = self.lock().fault.take();
        match fault {
            None => Ok(()),
            Some(Fault::Error(message)) => Err(HostError::Failed(message)),
            #[cfg(any(test, feature = "sim-faults"))]
            Some(Fault::Panic(message)) => panic!("{}", message),
        }
    }
}

fn in_gameplay(state: &SimState) -> bool {
    state.screen.starts_with(SCREEN_GAMEPLAY)
}

impl Host for SimHost {
    fn name(&self) -> String {
        "ITGmania".to_string()
    }

    fn version(&self) -> String {
        "sim".to_string()
    }

    fn top_screen(&self) -> Option<String> {
        Some(self.lock().screen.clone())
    }

    fn is_playing(&self) -> bool {
        let state = self.lock();
        in_gameplay(&state) && state.current_song.is_some()
    }

    fn joined_players(&self) -> Vec<PlayerSlot> {
        self.lock().players.clone()
    }

    fn song_groups(&self) -> Vec<String> {
        let state = self.lock();
        let mut groups: Vec<String> = Vec::new();
        for song in &state.library {
            if !groups.contains(&song.group) {
                groups.push(song.group.clone());
            }
        }
        groups
    }

    fn songs(&self) -> Vec<SongInfo> {
        self.lock().library.clone()
    }

    fn current_song(&self) -> Option<SongInfo> {
        self.lock().current_song.clone()
    }

    fn current_difficulty(&self, player: PlayerSlot) -> Option<String> {
        self.lock().difficulties.get(&player).cloned()
    }

    fn player_stats(&self, player: PlayerSlot) -> PlayerStats {
        let state = self.lock();
        if !in_gameplay(&state) {
            return PlayerStats::default();
        }
        state.stats.get(&player).cloned().unwrap_or_default()
    }

    fn paused(&self) -> Option<bool> {
        let state = self.lock();
        in_gameplay(&state).then_some(state.paused)
    }

    fn pause_surfaces(&self) -> PauseSurfaces {
        let state = self.lock();
        if let Some(surfaces) = state.surfaces {
            return surfaces;
        }

        if in_gameplay(&state) {
            PauseSurfaces::all()
        } else if state.screen == SCREEN_SELECT_MUSIC {
            PauseSurfaces::MUSIC_SOUND
        } else {
            PauseSurfaces::empty()
        }
    }

    fn set_paused(&mut self, probe: PauseProbe, paused: bool) -> Result<(), HostError> {
        self.check_fault()?;
        let mut state = self.lock();
        state.paused = paused;
        state.pause_calls.push((probe, paused));
        Ok(())
    }

    fn start_song(
        &mut self,
        song: &SongInfo,
        difficulty: &str,
        players: &[PlayerSlot],
    ) -> Result<(), HostError> {
        self.check_fault()?;
        let mut state = self.lock();
        state.screen = SCREEN_GAMEPLAY.to_string();
        state.current_song = Some(song.clone());
        state.paused = false;
        state.difficulties = players
            .iter()
            .map(|p| (*p, difficulty.to_string()))
            .collect();
        state.stats = players
            .iter()
            .map(|p| {
                let stats = PlayerStats {
                    score: Some(0.0),
                    combo: Some(0.0),
                    percent_dp: Some(0.0),
                    judgments: Some(BTreeMap::new()),
                };
                (*p, stats)
            })
            .collect();
        Ok(())
    }

    fn can_cancel(&self) -> bool {
        let state = self.lock();
        in_gameplay(&state) || state.screen == SCREEN_SELECT_MUSIC
    }

    fn cancel(&mut self) -> Result<(), HostError> {
        self.check_fault()?;
        let mut state = self.lock();
        if in_gameplay(&state) {
            state.screen = SCREEN_SELECT_MUSIC.to_string();
            state.current_song = None;
            state.difficulties.clear();
            state.stats.clear();
            state.paused = false;
        } else if state.screen == SCREEN_SELECT_MUSIC {
            state.screen = SCREEN_TITLE.to_string();
        } else {
            return Err(HostError::Rejected(format!(
                "{} cannot be cancelled",
                state.screen
            )));
        }
        Ok(())
    }
}
