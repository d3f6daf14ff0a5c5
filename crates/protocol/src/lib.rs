//! # itg-remote protocol
//!
//! Wire-level definitions shared by the agent running inside the game client
//! and the controller driving it.
//!
//! This crate provides:
//! - `Packet`: the `[u16be size][u8 command][payload]` framing
//! - `Reassembler`: re-derives packets from arbitrarily chunked byte streams
//! - Payload primitives (null-terminated strings, big-endian integers)
//! - `Value`: structured response values with a deterministic JSON encoding
//! - The closed command table and typed requests
//! - Response envelope builders and serde views
//! - Liveness beacon lines
//! - The `Transport` trait and an in-memory transport
//!
//! ## Example
//!
//! ```
//! use itg_remote_protocol::{Reassembler, Request, StartSong};
//!
//! let request = Request::StartSong(StartSong::new("Songs/Pack/Song", "Difficulty_Easy"));
//! let wire = request.to_packet().unwrap().encode();
//!
//! // Deliver the packet one byte at a time
//! let mut reassembler = Reassembler::new();
//! let mut packets = Vec::new();
//! for byte in wire.iter() {
//!     packets.extend(reassembler.push(&[*byte]));
//! }
//!
//! assert_eq!(packets.len(), 1);
//! assert_eq!(packets[0].command(), 0x20);
//! ```

pub mod beacon;
pub mod codec;
pub mod commands;
pub mod error;
pub mod packet;
pub mod payload;
pub mod reassembler;
pub mod requests;
pub mod response;
pub mod transport;
pub mod value;

pub use beacon::Beacon;
pub use codec::{decode_envelope, decode_envelope_as, encode_envelope};
pub use commands::{expected_response_id, ids, Command, ERROR_RESPONSE_ID};
pub use error::{FrameError, PayloadError, ProtocolError, Result};
pub use packet::{encode, try_decode_one, Packet, LENGTH_PREFIX_SIZE, MAX_PAYLOAD_LEN};
pub use payload::{encode_nt_string, read_nt_string, PayloadReader, PayloadWriter};
pub use reassembler::Reassembler;
pub use requests::{ListQuery, Request, SetPaused, StartSong, MAX_LIST_COUNT};
pub use response::{reasons, StatusSnapshot};
pub use transport::{Frame, Transport, TransportEvent};
pub use value::{Key, Table, Value};

/// Protocol revision reported by the hello command
pub const PROTOCOL_VERSION: u32 = 1;
