use bytes::Bytes;
use itg_remote_agent::{dispatch, PauseProbe, PauseSurfaces, PlayerSlot, Session, SimHost};
use itg_remote_agent::sim::{SCREEN_GAMEPLAY, SCREEN_SELECT_MUSIC, SCREEN_TITLE};
use itg_remote_protocol::{
    decode_envelope, expected_response_id, ListQuery, Packet, Request, SetPaused, StartSong,
    ERROR_RESPONSE_ID, MAX_PAYLOAD_LEN,
};
use serde_json::Value as Json;

fn send(session: &mut Session, host: &mut SimHost, request: Request) -> (u8, Json) {
    let packet = request.to_packet().unwrap();
    let response = dispatch(session, host, &packet);
    (response.command(), decode_envelope(response.payload()).unwrap())
}

fn start(song_dir: &str, difficulty: &str) -> Request {
    Request::StartSong(StartSong::new(song_dir, difficulty))
}

#[test]
fn test_every_command_id_gets_exactly_one_response() {
    let mut session = Session::new();
    let mut host = SimHost::ready();

    for id in 0..=u8::MAX {
        let response = dispatch(&mut session, &mut host, &Packet::empty(id));

        assert_ne!(response.command(), 0, "command {:#04x}", id);
        assert!(
            response.command() == expected_response_id(id) || response.command() == ERROR_RESPONSE_ID,
            "command {:#04x} answered on {:#04x}",
            id,
            response.command()
        );
        assert!(decode_envelope(response.payload()).is_ok());

        // Undo whatever the command changed
        host.set_screen(SCREEN_SELECT_MUSIC);
    }
}

#[test]
fn test_unknown_command_echoed_on_error_id() {
    let mut session = Session::new();
    let mut host = SimHost::ready();

    let response = dispatch(&mut session, &mut host, &Packet::empty(0x7F));
    assert_eq!(response.command(), ERROR_RESPONSE_ID);

    let envelope = decode_envelope(response.payload()).unwrap();
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["reason"], "unknown_command");
    assert_eq!(envelope["command"], 0x7F);
}

#[test]
fn test_hello_reports_session_and_commands() {
    let mut session = Session::new();
    let mut host = SimHost::ready();

    let (id, envelope) = send(&mut session, &mut host, Request::Hello);
    assert_eq!(id, 0x81);
    assert_eq!(envelope["ok"], true);
    assert_eq!(envelope["protocol_version"], 1);
    assert_eq!(envelope["session_id"], session.id().to_string());
    assert_eq!(envelope["screen"], SCREEN_SELECT_MUSIC);
    assert_eq!(
        envelope["commands"],
        serde_json::json!([0x01, 0x10, 0x11, 0x12, 0x20, 0x21, 0x22])
    );
}

#[test]
fn test_song_listing_clamps_count() {
    let mut session = Session::new();
    let mut host = SimHost::new();
    for i in 0..600 {
        host.add_song(&format!("/Songs/Bulk/S{}/", i), "S", &["Difficulty_Easy"]);
    }

    let (id, envelope) = send(&mut session, &mut host, Request::ListSongs(ListQuery::new(0, "")));
    assert_eq!(id, 0x92);
    assert_eq!(envelope["count"], 1);
    assert_eq!(envelope["songs"].as_array().unwrap().len(), 1);
    assert_eq!(envelope["truncated"], true);

    let (_, envelope) = send(&mut session, &mut host, Request::ListSongs(ListQuery::new(10000, "")));
    assert_eq!(envelope["count"], 500);
    assert_eq!(envelope["total"], 600);
    assert_eq!(envelope["songs"].as_array().unwrap().len(), 500);
}

#[test]
fn test_song_listing_filters_by_group() {
    let mut session = Session::new();
    let mut host = SimHost::ready();

    let query = ListQuery::new(50, "Club Mix");
    let (_, envelope) = send(&mut session, &mut host, Request::ListSongs(query));
    let songs = envelope["songs"].as_array().unwrap();
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0]["title"], "Night Drive");
    assert_eq!(songs[0]["difficulties"], serde_json::json!(["Difficulty_Easy", "Difficulty_Challenge"]));
}

#[test]
fn test_group_listing() {
    let mut session = Session::new();
    let mut host = SimHost::ready();

    let (id, envelope) = send(&mut session, &mut host, Request::ListGroups(ListQuery::default()));
    assert_eq!(id, 0x91);
    assert_eq!(envelope["groups"], serde_json::json!(["Starter Pack", "Club Mix"]));

    let (_, envelope) = send(&mut session, &mut host, Request::ListGroups(ListQuery::new(10, "club")));
    assert_eq!(envelope["groups"], serde_json::json!(["Club Mix"]));
    assert_eq!(envelope["total"], 1);

    // An empty payload lists everything
    let response = dispatch(&mut session, &mut host, &Packet::empty(0x11));
    let envelope = decode_envelope(response.payload()).unwrap();
    assert_eq!(envelope["count"], 2);
}

#[test]
fn test_group_listing_fits_one_packet() {
    let mut session = Session::new();
    let mut host = SimHost::new();
    for i in 0..400 {
        let group = format!("{:03}{}", i, "x".repeat(250));
        host.add_song(&format!("/Songs/{}/Song/", group), "Song", &["Difficulty_Easy"]);
    }

    let packet = Request::ListGroups(ListQuery::new(500, "")).to_packet().unwrap();
    let response = dispatch(&mut session, &mut host, &packet);
    assert_eq!(response.command(), 0x91);
    assert!(response.payload().len() <= MAX_PAYLOAD_LEN);

    let envelope = decode_envelope(response.payload()).unwrap();
    assert_eq!(envelope["ok"], true);
    assert_eq!(envelope["total"], 400);
    assert_eq!(envelope["truncated"], true);
    let count = envelope["count"].as_u64().unwrap();
    assert!(count > 0 && count < 400);
    assert_eq!(envelope["groups"].as_array().unwrap().len() as u64, count);
}

#[test]
fn test_truncated_payload_is_bad_payload_on_own_id() {
    let mut session = Session::new();
    let mut host = SimHost::ready();

    let packet = Packet::new(0x12, Bytes::from_static(&[0x00])).unwrap();
    let response = dispatch(&mut session, &mut host, &packet);
    assert_eq!(response.command(), 0x92);

    let envelope = decode_envelope(response.payload()).unwrap();
    assert_eq!(envelope["reason"], "bad_payload");
    assert!(envelope["detail"].is_string());

    let packet = Packet::new(0x20, Bytes::from_static(b"only-one-field\0")).unwrap();
    let response = dispatch(&mut session, &mut host, &packet);
    assert_eq!(response.command(), 0xA0);
    assert_eq!(host.screen(), SCREEN_SELECT_MUSIC);
}

#[test]
fn test_start_off_select_screen_changes_nothing() {
    let mut session = Session::new();
    let mut host = SimHost::ready();
    host.set_screen(SCREEN_TITLE);

    let (id, envelope) = send(&mut session, &mut host, start("/Songs/Club Mix/Night Drive/", "Difficulty_Easy"));
    assert_eq!(id, 0xA0);
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["reason"], "must_be_on_select_music_screen");
    assert_eq!(envelope["screen"], SCREEN_TITLE);

    assert_eq!(host.screen(), SCREEN_TITLE);
    let (_, status) = send(&mut session, &mut host, Request::Status);
    assert!(status["status"].get("current_song_dir").is_none());
}

#[test]
fn test_start_precondition_reasons() {
    let mut session = Session::new();
    let mut host = SimHost::ready();

    let (_, envelope) = send(&mut session, &mut host, start("/Songs/Nowhere/", "Difficulty_Easy"));
    assert_eq!(envelope["reason"], "song_not_found");
    assert_eq!(envelope["song_dir"], "/Songs/Nowhere/");

    let (_, envelope) = send(&mut session, &mut host, start("/Songs/Club Mix/Night Drive/", "Difficulty_Beginner"));
    assert_eq!(envelope["reason"], "steps_not_found");
    assert_eq!(envelope["difficulty"], "Difficulty_Beginner");

    host.unjoin_all();
    let (_, envelope) = send(&mut session, &mut host, start("/Songs/Club Mix/Night Drive/", "Difficulty_Easy"));
    assert_eq!(envelope["reason"], "no_player_joined");
    assert_eq!(host.screen(), SCREEN_SELECT_MUSIC);
}

#[test]
fn test_start_then_status_reports_gameplay() {
    let mut session = Session::new();
    let mut host = SimHost::ready();
    host.join(PlayerSlot::P2);

    let (_, envelope) = send(&mut session, &mut host, start("/Songs/Club Mix/Night Drive/", "Difficulty_Easy"));
    assert_eq!(envelope["ok"], true);
    assert_eq!(envelope["title"], "Night Drive");
    assert_eq!(host.screen(), SCREEN_GAMEPLAY);

    host.play_notes(4);
    let (id, envelope) = send(&mut session, &mut host, Request::Status);
    assert_eq!(id, 0x90);

    let status = &envelope["status"];
    assert_eq!(status["is_playing"], true);
    assert_eq!(status["players"], serde_json::json!(["P1", "P2"]));
    assert_eq!(status["current_group"], "Club Mix");
    assert_eq!(status["current_difficulty_p2"], "Difficulty_Easy");
    assert_eq!(status["score_p1"], 4000);
    assert_eq!(status["current_combo_p1"], 4);
    assert_eq!(status["percent_dp_p1"], 2);
    assert_eq!(status["judgments_p1"]["W1"], 4);
    assert_eq!(status["paused_known"], true);
    assert_eq!(status["paused"], false);
}

#[test]
fn test_status_outside_gameplay_omits_stats() {
    let mut session = Session::new();
    let mut host = SimHost::ready();

    let (_, envelope) = send(&mut session, &mut host, Request::Status);
    let status = envelope["status"].as_object().unwrap();
    assert_eq!(status["screen"], SCREEN_SELECT_MUSIC);
    assert_eq!(status["is_playing"], false);
    assert_eq!(status["paused_known"], false);
    assert!(!status.contains_key("paused"));
    assert!(!status.contains_key("score_p1"));
}

#[test]
fn test_pause_with_only_generic_capability() {
    let mut session = Session::new();
    let mut host = SimHost::ready();
    send(&mut session, &mut host, start("/Songs/Starter Pack/First Steps/", "Difficulty_Easy"));
    host.set_pause_surfaces(Some(PauseSurfaces::MUSIC_SOUND));

    let (id, envelope) = send(&mut session, &mut host, Request::SetPaused(SetPaused { paused: true }));
    assert_eq!(id, 0xA1);
    assert_eq!(envelope["ok"], true);
    assert_eq!(envelope["paused"], true);
    assert_eq!(envelope["method"], "sound_pause_music");
    assert_eq!(session.pause_probe(), Some(PauseProbe::MusicSound));
}

#[test]
fn test_pause_prefers_gameplay_screen() {
    let mut session = Session::new();
    let mut host = SimHost::ready();
    send(&mut session, &mut host, start("/Songs/Starter Pack/First Steps/", "Difficulty_Easy"));

    let (_, envelope) = send(&mut session, &mut host, Request::SetPaused(SetPaused { paused: true }));
    assert_eq!(envelope["method"], "screen_gameplay_pause_game");
    assert!(host.is_paused());

    let (_, envelope) = send(&mut session, &mut host, Request::SetPaused(SetPaused { paused: false }));
    assert_eq!(envelope["paused"], false);
    assert!(!host.is_paused());
    assert_eq!(
        host.pause_calls(),
        vec![(PauseProbe::GameplayScreen, true), (PauseProbe::GameplayScreen, false)]
    );

    // The last method used is gone; the next one in line takes over
    host.set_pause_surfaces(Some(PauseSurfaces::GAME_STATE));
    let (_, envelope) = send(&mut session, &mut host, Request::SetPaused(SetPaused { paused: true }));
    assert_eq!(envelope["method"], "gamestate_pause");
    assert_eq!(session.pause_probe(), Some(PauseProbe::GameState));
}

#[test]
fn test_menu_pause_does_not_stick_into_gameplay() {
    let mut session = Session::new();
    let mut host = SimHost::ready();

    let resume = Request::SetPaused(SetPaused { paused: false });
    let (_, envelope) = send(&mut session, &mut host, resume);
    assert_eq!(envelope["method"], "sound_pause_music");
    assert_eq!(session.pause_probe(), Some(PauseProbe::MusicSound));

    send(&mut session, &mut host, start("/Songs/Starter Pack/First Steps/", "Difficulty_Easy"));

    let (_, hello) = send(&mut session, &mut host, Request::Hello);
    assert_eq!(hello["pause_method"], "screen_gameplay_pause_game");

    let pause = Request::SetPaused(SetPaused { paused: true });
    let (_, envelope) = send(&mut session, &mut host, pause);
    assert_eq!(envelope["method"], "screen_gameplay_pause_game");
    assert_eq!(session.pause_probe(), Some(PauseProbe::GameplayScreen));
    assert_eq!(
        host.pause_calls(),
        vec![(PauseProbe::MusicSound, false), (PauseProbe::GameplayScreen, true)]
    );
}

#[test]
fn test_pause_without_capability() {
    let mut session = Session::new();
    let mut host = SimHost::ready();
    host.set_screen(SCREEN_TITLE);

    let response = dispatch(&mut session, &mut host, &Packet::empty(0x21));
    assert_eq!(response.command(), 0xA1);

    let envelope = decode_envelope(response.payload()).unwrap();
    assert_eq!(envelope["reason"], "no_pause_capability");
    assert!(host.pause_calls().is_empty());
}

#[test]
fn test_stop_cancels_gameplay() {
    let mut session = Session::new();
    let mut host = SimHost::ready();
    send(&mut session, &mut host, start("/Songs/Starter Pack/Second Wind/", "Difficulty_Hard"));

    let (id, envelope) = send(&mut session, &mut host, Request::Stop);
    assert_eq!(id, 0xA2);
    assert_eq!(envelope["ok"], true);
    assert_eq!(envelope["screen"], SCREEN_GAMEPLAY);
    assert_eq!(host.screen(), SCREEN_SELECT_MUSIC);
}

#[test]
fn test_stop_on_title_not_cancellable() {
    let mut session = Session::new();
    let mut host = SimHost::ready();
    host.set_screen(SCREEN_TITLE);

    let (id, envelope) = send(&mut session, &mut host, Request::Stop);
    assert_eq!(id, 0xA2);
    assert_eq!(envelope["reason"], "not_cancellable");
    assert_eq!(envelope["screen"], SCREEN_TITLE);
}

#[test]
fn test_host_failure_reported_on_error_id() {
    let mut session = Session::new();
    let mut host = SimHost::ready();
    host.fail_next("wheel locked");

    let (id, envelope) = send(&mut session, &mut host, start("/Songs/Club Mix/Night Drive/", "Difficulty_Easy"));
    assert_eq!(id, ERROR_RESPONSE_ID);
    assert_eq!(envelope["reason"], "handler_error");
    assert_eq!(envelope["command"], 0x20);
    assert!(envelope["detail"].as_str().unwrap().contains("wheel locked"));
}

#[test]
fn test_host_panic_is_contained() {
    let mut session = Session::new();
    let mut host = SimHost::ready();
    send(&mut session, &mut host, start("/Songs/Club Mix/Night Drive/", "Difficulty_Easy"));
    host.panic_next("engine exploded");

    let (id, envelope) = send(&mut session, &mut host, Request::Stop);
    assert_eq!(id, ERROR_RESPONSE_ID);
    assert_eq!(envelope["reason"], "handler_error");
    assert_eq!(envelope["command"], 0x22);
    assert_eq!(envelope["detail"], "engine exploded");

    // The dispatcher keeps working afterwards
    let (id, envelope) = send(&mut session, &mut host, Request::Stop);
    assert_eq!(id, 0xA2);
    assert_eq!(envelope["ok"], true);
}
