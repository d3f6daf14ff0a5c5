//! Command dispatch
//!
//! [`dispatch`] turns one inbound packet into exactly one response packet:
//!
//! | situation | response id | reason |
//! |---|---|---|
//! | unknown command | `0xFF` | `unknown_command` |
//! | malformed payload | own | `bad_payload` |
//! | failed precondition | own | named per command |
//! | host error or panic | `0xFF` | `handler_error` |
//! | envelope over the frame limit | own | `response_too_large` |

mod library;
mod play;
mod status;

use std::panic::{catch_unwind, AssertUnwindSafe};

use itg_remote_protocol::response::{error_envelope, failure, reasons};
use itg_remote_protocol::{
    encode_envelope, Command, Packet, Request, Table, Value, ERROR_RESPONSE_ID,
};

use crate::host::{Host, HostError};
use crate::session::Session;

/// What a handler produced
pub(crate) enum Outcome {
    /// An envelope for the command's own response id
    Reply(Table),

    /// The host failed; reported on `0xFF`
    Fault(HostError),
}

impl From<Table> for Outcome {
    fn from(table: Table) -> Self {
        Outcome::Reply(table)
    }
}

impl From<Result<Table, HostError>> for Outcome {
    fn from(result: Result<Table, HostError>) -> Self {
        match result {
            Ok(table) => Outcome::Reply(table),
            Err(e) => Outcome::Fault(e),
        }
    }
}

/// Handles one command packet and returns its response
pub fn dispatch<H: Host + ?Sized>(session: &mut Session, host: &mut H, packet: &Packet) -> Packet {
    let Some(command) = Command::from_id(packet.command()) else {
        tracing::warn!(command = packet.command(), "Unknown command");
        return error_packet(reasons::UNKNOWN_COMMAND, packet.command(), None);
    };

    let request = match Request::parse(command, packet.payload()) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(%command, error = %e, "Malformed payload");
            let envelope = failure(reasons::BAD_PAYLOAD).with("detail", e.to_string());
            return reply(command, envelope);
        }
    };

    tracing::debug!(%command, len = packet.payload().len(), "Dispatching");

    let outcome = catch_unwind(AssertUnwindSafe(|| handle(session, host, request)));
    match outcome {
        Ok(Outcome::Reply(envelope)) => reply(command, envelope),
        Ok(Outcome::Fault(e)) => {
            tracing::error!(%command, error = %e, "Handler failed");
            error_packet(reasons::HANDLER_ERROR, command.id(), Some(&e.to_string()))
        }
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            tracing::error!(%command, detail = %detail, "Handler panicked");
            error_packet(reasons::HANDLER_ERROR, command.id(), Some(&detail))
        }
    }
}

fn handle<H: Host + ?Sized>(session: &mut Session, host: &mut H, request: Request) -> Outcome {
    match request {
        Request::Hello => status::hello(session, host).into(),
        Request::Status => status::status(host).into(),
        Request::ListGroups(query) => library::list_groups(host, &query).into(),
        Request::ListSongs(query) => library::list_songs(host, &query).into(),
        Request::StartSong(start) => play::start_song(host, &start).into(),
        Request::SetPaused(pause) => play::set_paused(session, host, pause.paused).into(),
        Request::Stop => play::stop(host).into(),
    }
}

/// Frames `envelope` on the command's own response id
fn reply(command: Command, envelope: Table) -> Packet {
    let response_id = command.response_id();
    let framed = encode_envelope(&Value::from(envelope))
        .ok()
        .and_then(|body| Packet::new(response_id, body).ok());

    match framed {
        Some(packet) => packet,
        None => {
            tracing::warn!(%command, response_id, "Response does not fit in one packet");
            fallback_packet(response_id, failure(reasons::RESPONSE_TOO_LARGE).into())
        }
    }
}

fn error_packet(reason: &str, command: u8, detail: Option<&str>) -> Packet {
    fallback_packet(ERROR_RESPONSE_ID, error_envelope(reason, command, detail))
}

/// Frames an envelope that is known to be small
fn fallback_packet(response_id: u8, envelope: Value) -> Packet {
    match encode_envelope(&envelope) {
        Ok(body) => Packet::new(response_id, body).unwrap_or_else(|_| Packet::empty(response_id)),
        Err(_) => Packet::empty(response_id),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
