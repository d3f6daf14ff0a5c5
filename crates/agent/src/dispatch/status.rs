use itg_remote_protocol::response::ok;
use itg_remote_protocol::{Command, Table, Value, PROTOCOL_VERSION};

use crate::host::{Host, PlayerSlot};
use crate::pause::PauseProbe;
use crate::session::Session;

pub(super) fn hello<H: Host + ?Sized>(session: &Session, host: &H) -> Table {
    let commands: Vec<u8> = Command::ALL.iter().map(|c| c.id()).collect();
    let pause_method = PauseProbe::select(host.pause_surfaces()).map(PauseProbe::tag);

    ok().with("name", host.name())
        .with("version", host.version())
        .with("protocol_version", PROTOCOL_VERSION)
        .with("session_id", session.id().to_string())
        .with_opt("screen", host.top_screen())
        .with("commands", commands)
        .with_opt("pause_method", pause_method)
}

pub(super) fn status<H: Host + ?Sized>(host: &H) -> Table {
    let players = host.joined_players();
    let paused = host.paused();

    let mut snapshot = Table::new()
        .with("screen", host.top_screen().unwrap_or_default())
        .with("is_playing", host.is_playing())
        .with(
            "players",
            players.iter().map(|p| p.name()).collect::<Vec<_>>(),
        )
        .with("paused_known", paused.is_some())
        .with_opt("paused", paused);

    if let Some(song) = host.current_song() {
        snapshot.insert("current_song_dir", song.song_dir);
        snapshot.insert("current_title", song.title);
        snapshot.insert("current_group", song.group);
    }

    for player in PlayerSlot::ALL {
        insert_player_fields(&mut snapshot, host, player);
    }

    ok().with("status", snapshot)
}

fn insert_player_fields<H: Host + ?Sized>(snapshot: &mut Table, host: &H, player: PlayerSlot) {
    let suffix = player.field_suffix();

    if let Some(difficulty) = host.current_difficulty(player) {
        snapshot.insert(format!("current_difficulty_{}", suffix), difficulty);
    }

    let stats = host.player_stats(player);
    if let Some(score) = stats.score {
        snapshot.insert(format!("score_{}", suffix), score);
    }
    if let Some(combo) = stats.combo {
        snapshot.insert(format!("current_combo_{}", suffix), combo);
    }
    if let Some(percent) = stats.percent_dp {
        snapshot.insert(format!("percent_dp_{}", suffix), percent);
    }
    if let Some(judgments) = stats.judgments {
        let table: Table = judgments.into_iter().collect();
        snapshot.insert(format!("judgments_{}", suffix), Value::from(table));
    }
}
