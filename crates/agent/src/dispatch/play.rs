use itg_remote_protocol::response::{failure, is_select_music_screen, ok, reasons};
use itg_remote_protocol::{StartSong, Table};

use crate::host::{Host, HostError};
use crate::pause::PauseProbe;
use crate::session::Session;

pub(super) fn start_song<H: Host + ?Sized>(
    host: &mut H,
    start: &StartSong,
) -> Result<Table, HostError> {
    let screen = host.top_screen().unwrap_or_default();
    if !is_select_music_screen(&screen) {
        return Ok(failure(reasons::MUST_BE_ON_SELECT_MUSIC_SCREEN).with("screen", screen));
    }

    let players = host.joined_players();
    if players.is_empty() {
        return Ok(failure(reasons::NO_PLAYER_JOINED));
    }

    let Some(song) = host.find_song(&start.song_dir) else {
        return Ok(failure(reasons::SONG_NOT_FOUND).with("song_dir", start.song_dir.as_str()));
    };

    if !song.has_difficulty(&start.difficulty) {
        return Ok(failure(reasons::STEPS_NOT_FOUND)
            .with("song_dir", song.song_dir)
            .with("difficulty", start.difficulty.as_str()));
    }

    tracing::info!(song_dir = %song.song_dir, difficulty = %start.difficulty, "Starting song");
    host.start_song(&song, &start.difficulty, &players)?;

    Ok(ok()
        .with("song_dir", song.song_dir)
        .with("title", song.title)
        .with("difficulty", start.difficulty.as_str()))
}

pub(super) fn set_paused<H: Host + ?Sized>(
    session: &mut Session,
    host: &mut H,
    paused: bool,
) -> Result<Table, HostError> {
    let Some(probe) = PauseProbe::select(host.pause_surfaces()) else {
        return Ok(failure(reasons::NO_PAUSE_CAPABILITY));
    };

    host.set_paused(probe, paused)?;
    if session.pause_probe != Some(probe) {
        tracing::debug!(
            previous = ?session.pause_probe.map(PauseProbe::tag),
            method = probe.tag(),
            "Pause method changed"
        );
    }
    session.pause_probe = Some(probe);
    tracing::info!(paused, method = probe.tag(), "Pause state changed");

    Ok(ok().with("paused", paused).with("method", probe.tag()))
}

pub(super) fn stop<H: Host + ?Sized>(host: &mut H) -> Result<Table, HostError> {
    let screen = host.top_screen().unwrap_or_default();
    if !host.can_cancel() {
        return Ok(failure(reasons::NOT_CANCELLABLE).with("screen", screen));
    }

    tracing::info!(screen = %screen, "Cancelling screen");
    host.cancel()?;
    Ok(ok().with("screen", screen))
}
