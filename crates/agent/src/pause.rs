use bitflags::bitflags;

bitflags! {
    /// Pause mechanisms the host currently exposes
    ///
    /// - bit 0: GAMEPLAY_SCREEN - the gameplay screen's own pause routine
    /// - bit 1: TOP_SCREEN - a generic pause on whatever screen is on top
    /// - bit 2: GAME_STATE - the global game-state pause flag
    /// - bit 3: MUSIC_SOUND - pausing the music sound object
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PauseSurfaces: u8 {
        const GAMEPLAY_SCREEN = 0b0000_0001;
        const TOP_SCREEN = 0b0000_0010;
        const GAME_STATE = 0b0000_0100;
        const MUSIC_SOUND = 0b0000_1000;
    }
}

/// One way of pausing the host, tried most specific first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PauseProbe {
    GameplayScreen,
    TopScreen,
    GameState,
    MusicSound,
}

impl PauseProbe {
    pub const PRIORITY: [PauseProbe; 4] = [
        PauseProbe::GameplayScreen,
        PauseProbe::TopScreen,
        PauseProbe::GameState,
        PauseProbe::MusicSound,
    ];

    /// Picks the first probe in priority order that `surfaces` supports
    pub fn select(surfaces: PauseSurfaces) -> Option<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|probe| surfaces.contains(probe.surface()))
    }

    pub fn surface(self) -> PauseSurfaces {
        match self {
            PauseProbe::GameplayScreen => PauseSurfaces::GAMEPLAY_SCREEN,
            PauseProbe::TopScreen => PauseSurfaces::TOP_SCREEN,
            PauseProbe::GameState => PauseSurfaces::GAME_STATE,
            PauseProbe::MusicSound => PauseSurfaces::MUSIC_SOUND,
        }
    }

    /// Tag reported as `method` in pause responses
    pub fn tag(self) -> &'static str {
        match self {
            PauseProbe::GameplayScreen => "screen_gameplay_pause_game",
            PauseProbe::TopScreen => "top_screen_pause",
            PauseProbe::GameState => "gamestate_pause",
            PauseProbe::MusicSound => "sound_pause_music",
        }
    }
}
