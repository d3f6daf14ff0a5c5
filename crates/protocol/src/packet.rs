use crate::error::FrameError;
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the big-endian length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest payload that still fits the 16-bit size field (size = 1 + payload)
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - 1;

/// One framed unit on the wire
///
/// Wire format (big-endian):
/// ```text
/// ┌──────────┬──────┬──────────────┐
/// │ size     │ u16  │  2 bytes     │  size = 1 + payload length
/// ├──────────┼──────┼──────────────┤
/// │ command  │ u8   │  1 byte      │
/// ├──────────┼──────┼──────────────┤
/// │ payload  │ [u8] │  size-1 bytes│
/// └──────────┴──────┴──────────────┘
/// ```
///
/// Only [`Packet::new`] and [`Packet::empty`] build packets outside this
/// crate, so every packet fits the size field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    command: u8,
    payload: Bytes,
}

impl Packet {
    /// Creates a packet, rejecting payloads that cannot be framed
    pub fn new(command: u8, payload: impl Into<Bytes>) -> Result<Self, FrameError> {
        let payload = payload.into();
        check_payload_len(payload.len())?;
        Ok(Self { command, payload })
    }

    /// Creates a packet with no payload
    pub fn empty(command: u8) -> Self {
        Self {
            command,
            payload: Bytes::new(),
        }
    }

    /// Command or response identifier
    #[inline]
    pub fn command(&self) -> u8 {
        self.command
    }

    /// Raw payload, interpreted according to `command`
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Builds a packet from parts already known to fit
    pub(crate) fn from_parts(command: u8, payload: Bytes) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);
        Self { command, payload }
    }

    /// Value of the size field: command byte plus payload
    #[inline]
    pub fn size(&self) -> u16 {
        (1 + self.payload.len()) as u16
    }

    /// Total bytes on the wire, length prefix included
    #[inline]
    pub fn wire_len(&self) -> usize {
        LENGTH_PREFIX_SIZE + 1 + self.payload.len()
    }

    /// Serializes the packet to its wire representation
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        buf.put_u16(self.size());
        buf.put_u8(self.command);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

fn check_payload_len(len: usize) -> Result<(), FrameError> {
    if len > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge {
            len,
            max: MAX_PAYLOAD_LEN,
        });
    }
    Ok(())
}

/// Frames `command` and `payload` as `u16be(1 + len) ++ command ++ payload`
pub fn encode(command: u8, payload: &[u8]) -> Result<Bytes, FrameError> {
    check_payload_len(payload.len())?;

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + 1 + payload.len());
    buf.put_u16((1 + payload.len()) as u16);
    buf.put_u8(command);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Reads the size field at the start of `buf`, if present
#[inline]
pub fn peek_size(buf: &[u8]) -> Option<u16> {
    match buf {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

/// Attempts to decode exactly one packet from the front of `buf`
///
/// Returns the packet and the number of bytes it occupied. Nothing is
/// consumed (`(None, 0)`) until the whole packet is available. A header
/// announcing a size of zero has no command byte and cannot be a packet;
/// it is reported as `(None, 2)` so the caller can skip it.
pub fn try_decode_one(buf: &[u8]) -> (Option<Packet>, usize) {
    let Some(size) = peek_size(buf) else {
        return (None, 0);
    };

    if size == 0 {
        return (None, LENGTH_PREFIX_SIZE);
    }

    let total = LENGTH_PREFIX_SIZE + size as usize;
    if buf.len() < total {
        return (None, 0);
    }

    let packet = Packet::from_parts(
        buf[LENGTH_PREFIX_SIZE],
        Bytes::copy_from_slice(&buf[LENGTH_PREFIX_SIZE + 1..total]),
    );
    (Some(packet), total)
}
