//! Command payload primitives
//!
//! Command payloads are built from fixed-width big-endian header fields
//! followed by zero or more null-terminated UTF-8 strings in a fixed order.

use bytes::{BufMut, BytesMut};

use crate::error::PayloadError;

/// Encodes `text` as UTF-8 followed by a single zero byte
pub fn encode_nt_string(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 1);
    put_nt_string(&mut out, text);
    out
}

/// Appends `text` and its terminator to `buf`
pub fn put_nt_string<B: BufMut>(buf: &mut B, text: &str) {
    buf.put_slice(text.as_bytes());
    buf.put_u8(0);
}

/// Reads a null-terminated string starting at `offset`
///
/// Returns the text and the offset just past the terminator, or `None` when
/// no terminator exists in the rest of the buffer. Invalid UTF-8 is replaced
/// rather than rejected.
pub fn read_nt_string(buf: &[u8], offset: usize) -> Option<(String, usize)> {
    let rest = buf.get(offset..)?;
    let end = rest.iter().position(|&b| b == 0)?;
    let text = String::from_utf8_lossy(&rest[..end]).into_owned();
    Some((text, offset + end + 1))
}

/// Cursor over a command payload
///
/// Every read either succeeds and advances, or fails and leaves the cursor
/// where it was.
#[derive(Debug, Clone)]
pub struct PayloadReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.offset)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], PayloadError> {
        let have = self.remaining();
        if have < N {
            return Err(PayloadError::Truncated {
                offset: self.offset,
                need: N,
                have,
            });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.offset..self.offset + N]);
        self.offset += N;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, PayloadError> {
        self.take::<1>().map(|[b]| b)
    }

    pub fn read_u16_be(&mut self) -> Result<u16, PayloadError> {
        self.take::<2>().map(u16::from_be_bytes)
    }

    /// Reads one byte, or `None` if the payload is exhausted
    pub fn read_optional_u8(&mut self) -> Option<u8> {
        self.read_u8().ok()
    }

    pub fn read_nt_string(&mut self) -> Result<String, PayloadError> {
        let (text, next) = read_nt_string(self.buf, self.offset).ok_or(
            PayloadError::MissingTerminator {
                offset: self.offset,
            },
        )?;
        self.offset = next;
        Ok(text)
    }
}

/// Builder for command payloads
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.buf.put_u8(value);
        self
    }

    pub fn u16_be(mut self, value: u16) -> Self {
        self.buf.put_u16(value);
        self
    }

    pub fn nt_string(mut self, text: &str) -> Self {
        put_nt_string(&mut self.buf, text);
        self
    }

    pub fn finish(self) -> bytes::Bytes {
        self.buf.freeze()
    }
}
