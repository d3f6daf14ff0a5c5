use std::time::Duration;

use bytes::Bytes;
use itg_remote_controller::{Controller, ControllerConfig, ControllerError};
use itg_remote_protocol::response::{error_envelope, reasons};
use itg_remote_protocol::{encode_envelope, Frame, Packet, Reassembler, Table, TransportEvent, Value};
use tokio::sync::mpsc;

struct Harness {
    controller: Controller,
    events: mpsc::Sender<TransportEvent>,
    outgoing: mpsc::Receiver<Frame>,
}

impl Harness {
    fn new() -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(64);
        let controller = Controller::new(&ControllerConfig::default(), events_rx, outgoing_tx);
        Self {
            controller,
            events: events_tx,
            outgoing: outgoing_rx,
        }
    }

    async fn reply(&self, response_id: u8, envelope: impl Into<Value>) {
        let payload = encode_envelope(&envelope.into()).unwrap();
        let bytes = Packet::new(response_id, payload).unwrap().encode();
        self.events
            .send(TransportEvent::Frame(Frame::Binary(bytes)))
            .await
            .unwrap();
    }

    async fn next_command(&mut self) -> u8 {
        match self.outgoing.recv().await {
            Some(Frame::Binary(bytes)) => Reassembler::new().push(&bytes)[0].command(),
            other => panic!("unexpected frame {:?}", other),
        }
    }
}

fn body(n: u32) -> Table {
    Table::new().with("ok", true).with("n", n)
}

#[tokio::test(start_paused = true)]
async fn test_distinct_ids_do_not_block_each_other() {
    let mut h = Harness::new();

    let status = h.controller.send(0x10, Bytes::new()).await.unwrap();
    let songs = h.controller.send(0x12, Bytes::new()).await.unwrap();
    assert_eq!(h.next_command().await, 0x10);
    assert_eq!(h.next_command().await, 0x12);

    // Only the song listing is answered
    h.reply(0x92, body(2)).await;
    let envelope = songs.await_response(Duration::from_secs(1)).await.unwrap();
    assert_eq!(envelope.body["n"], 2);

    let err = status
        .await_response(Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_resolve_independently() {
    let h = Harness::new();

    let controller = h.controller.clone();
    let stop = tokio::spawn(async move { controller.stop().await });
    let controller = h.controller.clone();
    let hello = tokio::spawn(async move { controller.hello().await });

    while h.controller.pending_requests() < 2 {
        tokio::task::yield_now().await;
    }

    h.reply(0x81, body(1)).await;
    let hello = hello.await.unwrap().unwrap();
    assert_eq!(hello.response_id, 0x81);
    assert!(!stop.is_finished());

    h.reply(0xA2, body(3)).await;
    let stop = stop.await.unwrap().unwrap();
    assert_eq!(stop.body["n"], 3);
}

#[tokio::test(start_paused = true)]
async fn test_same_id_resolves_in_send_order() {
    let h = Harness::new();

    let first = h.controller.send(0x10, Bytes::new()).await.unwrap();
    let second = h.controller.send(0x10, Bytes::new()).await.unwrap();

    h.reply(0x90, body(1)).await;
    h.reply(0x90, body(2)).await;

    let wait = Duration::from_secs(1);
    assert_eq!(first.await_response(wait).await.unwrap().body["n"], 1);
    assert_eq!(second.await_response(wait).await.unwrap().body["n"], 2);
}

#[tokio::test(start_paused = true)]
async fn test_late_response_is_dropped() {
    let h = Harness::new();

    let pending = h.controller.send(0x22, Bytes::new()).await.unwrap();
    let err = pending
        .await_response(Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::Timeout { response_id: 0xA2, .. }));

    // Arrives after the waiter gave up; nobody receives it
    h.reply(0xA2, body(9)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.controller.pending_requests(), 0);

    let next = h.controller.send(0x22, Bytes::new()).await.unwrap();
    h.reply(0xA2, body(10)).await;
    let envelope = next.await_response(Duration::from_secs(1)).await.unwrap();
    assert_eq!(envelope.body["n"], 10);
}

#[tokio::test(start_paused = true)]
async fn test_error_response_fails_matching_request() {
    let h = Harness::new();

    let start = h.controller.send(0x20, Bytes::from_static(b"a\0b\0")).await.unwrap();
    let status = h.controller.send(0x10, Bytes::new()).await.unwrap();

    h.reply(0xFF, error_envelope(reasons::HANDLER_ERROR, 0x20, Some("boom"))).await;

    let err = start
        .await_response(Duration::from_secs(1))
        .await
        .unwrap_err();
    assert_eq!(err.remote_reason(), Some("handler_error"));

    let err = status
        .await_response(Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_typed_helpers_decode() {
    let h = Harness::new();

    let controller = h.controller.clone();
    let songs = tokio::spawn(async move {
        controller
            .songs(itg_remote_protocol::ListQuery::new(5, ""))
            .await
    });
    while h.controller.pending_requests() < 1 {
        tokio::task::yield_now().await;
    }

    let song = Table::new()
        .with("song_dir", "/Songs/Pack/A/")
        .with("title", "A")
        .with("group", "Pack")
        .with("difficulties", vec!["Difficulty_Easy"]);
    let envelope = Table::new()
        .with("ok", true)
        .with("songs", vec![song])
        .with("count", 1)
        .with("total", 4)
        .with("truncated", true);
    h.reply(0x92, envelope).await;

    let list = songs.await.unwrap().unwrap();
    assert_eq!(list.count, 1);
    assert_eq!(list.total, 4);
    assert!(list.truncated);
    assert_eq!(list.songs[0].difficulties, vec!["Difficulty_Easy".to_string()]);
}
