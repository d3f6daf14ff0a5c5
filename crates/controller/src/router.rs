//! Routes transport events to waiters and link status
//!
//! Binary frames are reassembled into packets and handed to the
//! [`Correlator`]. Text frames are beacon lines; they update the published
//! [`LinkStatus`] and are logged, never correlated.

use std::sync::Arc;

use itg_remote_protocol::response::ErrorEnvelope;
use itg_remote_protocol::{
    decode_envelope, decode_envelope_as, expected_response_id, Beacon, Frame, Packet,
    Reassembler, TransportEvent, ERROR_RESPONSE_ID,
};
use tokio::sync::{mpsc, watch};

use crate::correlator::Correlator;
use crate::error::ControllerError;
use crate::link::{LinkState, LinkStatus};
use crate::Envelope;

pub struct ResponseRouter {
    correlator: Arc<Correlator>,
    link: watch::Sender<LinkStatus>,
    reassembler: Reassembler,
}

impl ResponseRouter {
    pub fn new(correlator: Arc<Correlator>, link: watch::Sender<LinkStatus>) -> Self {
        Self {
            correlator,
            link,
            reassembler: Reassembler::new(),
        }
    }

    /// Routes events until the transport side closes
    pub async fn run(mut self, mut events_rx: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events_rx.recv().await {
            self.handle_event(event);
        }

        tracing::info!("Router shutting down: transport closed");
        self.link.send_modify(|status| {
            status.transition(LinkState::Closed);
        });
    }

    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.reassembler.clear();
                self.link.send_modify(|status| {
                    status.transition(LinkState::Connected);
                });
                tracing::info!("Agent connected");
            }

            TransportEvent::Disconnected => {
                self.reassembler.clear();
                self.link.send_modify(|status| {
                    status.transition(LinkState::Closed);
                });
                tracing::warn!(
                    pending = self.correlator.total_pending(),
                    "Agent disconnected"
                );
            }

            TransportEvent::Frame(Frame::Binary(bytes)) => {
                for packet in self.reassembler.push(&bytes) {
                    self.route_packet(packet);
                }
            }

            TransportEvent::Frame(Frame::Text(line)) => self.handle_beacon(&line),
        }
    }

    fn handle_beacon(&mut self, line: &str) {
        match Beacon::parse(line) {
            Some(Beacon::Heartbeat {
                session,
                uptime_ms,
                screen,
            }) => {
                tracing::info!(session = %session, uptime_ms, screen = %screen, "Heartbeat");
                self.link.send_modify(|status| {
                    status.transition(LinkState::Ready);
                    status.session = Some(session);
                    status.screen = Some(screen);
                });
            }
            Some(Beacon::Screen { name }) => {
                tracing::info!(screen = %name, "Screen changed");
                self.link.send_modify(|status| status.screen = Some(name));
            }
            None => {
                tracing::debug!(line = %line, "Unrecognized text frame");
            }
        }
    }

    fn route_packet(&self, packet: Packet) {
        let response_id = packet.command();

        if response_id == ERROR_RESPONSE_ID {
            self.route_error(&packet);
            return;
        }

        let delivery = decode_envelope(packet.payload())
            .map(|body| Envelope::new(response_id, body))
            .map_err(|e| ControllerError::Decode(e.to_string()));

        tracing::debug!(response_id, len = packet.payload().len(), "Response received");
        if self.correlator.resolve(response_id, delivery).is_some() {
            tracing::warn!(response_id, "Dropping unmatched response");
        }
    }

    /// Routes a `0xFF` envelope to the waiter of the command it names
    fn route_error(&self, packet: &Packet) {
        let error = match decode_envelope_as::<ErrorEnvelope>(packet.payload()) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Undecodable error response");
                let delivery = Err(ControllerError::Decode(e.to_string()));
                if self.correlator.resolve(ERROR_RESPONSE_ID, delivery).is_some() {
                    tracing::warn!("Dropping unmatched error response");
                }
                return;
            }
        };

        tracing::warn!(
            reason = %error.reason,
            command = ?error.command,
            detail = ?error.detail,
            "Agent reported failure"
        );

        let remote = || ControllerError::Remote {
            reason: error.reason.clone(),
            command: error.command,
            detail: error.detail.clone(),
        };

        let target = error
            .command
            .map(expected_response_id)
            .unwrap_or(ERROR_RESPONSE_ID);

        let unclaimed = self.correlator.resolve(target, Err(remote()));
        let unclaimed = match unclaimed {
            Some(delivery) if target != ERROR_RESPONSE_ID => {
                self.correlator.resolve(ERROR_RESPONSE_ID, delivery)
            }
            other => other,
        };

        if unclaimed.is_some() {
            tracing::warn!(reason = %error.reason, "Dropping unmatched error response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itg_remote_protocol::response::{error_envelope, reasons};
    use itg_remote_protocol::{encode_envelope, Table, Value};

    fn router() -> (ResponseRouter, Arc<Correlator>, watch::Receiver<LinkStatus>) {
        let correlator = Arc::new(Correlator::new());
        let (link_tx, link_rx) = watch::channel(LinkStatus::default());
        (ResponseRouter::new(correlator.clone(), link_tx), correlator, link_rx)
    }

    fn frame(command: u8, envelope: Value) -> TransportEvent {
        let packet = Packet::new(command, encode_envelope(&envelope).unwrap()).unwrap();
        TransportEvent::Frame(Frame::Binary(packet.encode()))
    }

    #[test]
    fn test_response_resolves_waiter() {
        let (mut router, correlator, _link) = router();
        let (_, mut rx) = correlator.register(0x81);

        router.handle_event(frame(0x81, Table::new().with("ok", true).into()));
        let envelope = rx.try_recv().unwrap().unwrap();
        assert!(envelope.is_ok());
        assert_eq!(envelope.response_id, 0x81);
    }

    #[test]
    fn test_error_routed_to_command_waiter() {
        let (mut router, correlator, _link) = router();
        let (_, mut start) = correlator.register(0xA0);

        router.handle_event(frame(
            ERROR_RESPONSE_ID,
            error_envelope(reasons::HANDLER_ERROR, 0x20, Some("boom")),
        ));

        let err = start.try_recv().unwrap().unwrap_err();
        assert_eq!(err.remote_reason(), Some("handler_error"));
    }

    #[test]
    fn test_error_for_unknown_command_goes_to_error_waiter() {
        let (mut router, correlator, _link) = router();
        let (_, mut generic) = correlator.register(ERROR_RESPONSE_ID);

        router.handle_event(frame(
            ERROR_RESPONSE_ID,
            error_envelope(reasons::UNKNOWN_COMMAND, 0x7E, None),
        ));

        let err = generic.try_recv().unwrap().unwrap_err();
        assert_eq!(err.remote_reason(), Some("unknown_command"));
    }

    #[test]
    fn test_undecodable_response() {
        let (mut router, correlator, _link) = router();
        let (_, mut rx) = correlator.register(0x90);

        let packet = Packet::new(0x90, &b"not json\0"[..]).unwrap();
        router.handle_event(TransportEvent::Frame(Frame::Binary(packet.encode())));

        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(ControllerError::Decode(_))
        ));
    }

    #[test]
    fn test_beacons_update_link() {
        let (mut router, _correlator, link) = router();

        router.handle_event(TransportEvent::Connected);
        assert_eq!(link.borrow().state, LinkState::Connected);

        let line = Beacon::heartbeat("abc", 10, "ScreenTitleMenu").to_line();
        router.handle_event(TransportEvent::Frame(Frame::Text(line)));
        assert_eq!(link.borrow().state, LinkState::Ready);
        assert_eq!(link.borrow().session.as_deref(), Some("abc"));

        let line = Beacon::screen("ScreenSelectMusic").to_line();
        router.handle_event(TransportEvent::Frame(Frame::Text(line)));
        assert_eq!(link.borrow().screen.as_deref(), Some("ScreenSelectMusic"));

        router.handle_event(TransportEvent::Disconnected);
        assert_eq!(link.borrow().state, LinkState::Closed);
    }
}
