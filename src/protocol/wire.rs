//! Byte-order-aware primitive codec.
//!
//! SLAP negotiates the byte order of all multi-byte integers during the
//! handshake; everything after that point reads and writes u32 values and
//! length-prefixed UTF-8 strings in the negotiated order. The only failure
//! mode is truncated input, which surfaces as a protocol error.
//!
//! # Example
//!
//! ```
//! use slap_client::protocol::{ByteOrder, WireReader, WireWriter};
//!
//! let mut w = WireWriter::new(ByteOrder::Little);
//! w.put_u32(42);
//! w.put_string("hello");
//! let bytes = w.into_bytes();
//!
//! let mut r = WireReader::new(&bytes, ByteOrder::Little);
//! assert_eq!(r.get_u32().unwrap(), 42);
//! assert_eq!(r.get_string().unwrap(), "hello");
//! ```

use crate::error::{Result, SlapError};

/// Byte order of all multi-byte wire integers, fixed at handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// Interpret the handshake endianness flag (byte 16 of the server hello).
    ///
    /// `1` selects little-endian; any other value selects big-endian.
    pub fn from_endian_flag(flag: u8) -> Self {
        if flag == 1 {
            Self::Little
        } else {
            Self::Big
        }
    }

    /// Read a u32 at `pos` in this byte order.
    pub fn read_u32(self, buf: &[u8], pos: usize) -> Result<u32> {
        let end = pos.checked_add(4).ok_or_else(|| truncated("u32", pos))?;
        let bytes = buf.get(pos..end).ok_or_else(|| truncated("u32", pos))?;
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        Ok(match self {
            Self::Big => u32::from_be_bytes(raw),
            Self::Little => u32::from_le_bytes(raw),
        })
    }

    /// Write a u32 at `pos` in this byte order.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than `pos + 4`.
    pub fn write_u32(self, buf: &mut [u8], pos: usize, value: u32) {
        let raw = match self {
            Self::Big => value.to_be_bytes(),
            Self::Little => value.to_le_bytes(),
        };
        buf[pos..pos + 4].copy_from_slice(&raw);
    }

    /// Encode a u32 to its 4-byte wire form.
    #[inline]
    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Self::Big => value.to_be_bytes(),
            Self::Little => value.to_le_bytes(),
        }
    }
}

fn truncated(what: &str, pos: usize) -> SlapError {
    SlapError::Protocol(format!("truncated {} read at offset {}", what, pos))
}

/// Cursor-style reader over a payload slice.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> WireReader<'a> {
    /// Create a reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8], order: ByteOrder) -> Self {
        Self {
            buf,
            pos: 0,
            order,
        }
    }

    /// Current cursor position.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Read the next u32 and advance the cursor.
    pub fn get_u32(&mut self) -> Result<u32> {
        let value = self.order.read_u32(self.buf, self.pos)?;
        self.pos += 4;
        Ok(value)
    }

    /// Read the next `len` raw bytes and advance the cursor.
    pub fn get_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or_else(|| truncated("bytes", self.pos))?;
        let bytes = self
            .buf
            .get(self.pos..end)
            .ok_or_else(|| truncated("bytes", self.pos))?;
        self.pos = end;
        Ok(bytes)
    }

    /// Read a length-prefixed UTF-8 string: `len:u32 | utf8Bytes:len`.
    pub fn get_string(&mut self) -> Result<String> {
        let len = self.get_u32()? as usize;
        let bytes = self.get_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| SlapError::Protocol(format!("invalid UTF-8 in wire string: {}", e)))
    }
}

/// Append-only writer producing wire bytes in a fixed byte order.
#[derive(Debug)]
pub struct WireWriter {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl WireWriter {
    /// Create an empty writer.
    pub fn new(order: ByteOrder) -> Self {
        Self {
            buf: Vec::new(),
            order,
        }
    }

    /// Create a writer with a pre-sized buffer.
    pub fn with_capacity(order: ByteOrder, capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            order,
        }
    }

    /// Bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if nothing has been written yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append a u32 in the writer's byte order.
    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&self.order.u32_bytes(value));
    }

    /// Append raw bytes unchanged.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a length-prefixed UTF-8 string: `len:u32 | utf8Bytes:len`.
    pub fn put_string(&mut self, s: &str) {
        self.put_u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Consume the writer and return the accumulated bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
