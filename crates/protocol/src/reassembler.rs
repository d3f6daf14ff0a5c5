//! Stream reassembly for framed packets
//!
//! Transports deliver bytes in whatever chunks they like: one message may
//! carry several packets, and one packet may be spread over many messages.
//! The [`Reassembler`] buffers everything it is given and hands back whole
//! packets in arrival order.

use bytes::{Buf, BytesMut};

use crate::packet::{peek_size, Packet, LENGTH_PREFIX_SIZE};

/// Smallest complete packet: length prefix plus the command byte
const MIN_PACKET_LEN: usize = LENGTH_PREFIX_SIZE + 1;

/// Per-connection receive buffer that re-derives packets from a byte stream
#[derive(Debug, Default)]
pub struct Reassembler {
    buffer: BytesMut,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every packet completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Packet> {
        self.buffer.extend_from_slice(chunk);

        let mut packets = Vec::new();
        while let Some(packet) = self.next_packet() {
            packets.push(packet);
        }
        packets
    }

    /// Removes the next complete packet from the buffer, if any
    pub fn next_packet(&mut self) -> Option<Packet> {
        loop {
            if self.buffer.len() < MIN_PACKET_LEN {
                return None;
            }

            let size = peek_size(&self.buffer)? as usize;
            if size == 0 {
                tracing::warn!("Skipping frame header with zero size");
                self.buffer.advance(LENGTH_PREFIX_SIZE);
                continue;
            }

            let total = LENGTH_PREFIX_SIZE + size;
            if self.buffer.len() < total {
                return None;
            }

            let mut frame = self.buffer.split_to(total).freeze();
            frame.advance(LENGTH_PREFIX_SIZE);
            let command = frame.get_u8();

            return Some(Packet::from_parts(command, frame));
        }
    }

    /// Number of bytes waiting for the rest of their packet
    #[inline]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Discards any partially received packet
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
