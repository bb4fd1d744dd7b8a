//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management and a small state
//! machine for fragmented frames:
//! - `WaitingForLength`: need the leading 4-byte length field
//! - `WaitingForBody`: length known, need the rest of the frame
//!
//! A frame is never surfaced until all `length` bytes have arrived; partial
//! frames are buffered, not errors. Because the length field is read in the
//! negotiated byte order, a buffer is created only after the handshake.

use bytes::BytesMut;

use super::frame::Frame;
use super::wire::ByteOrder;
use crate::error::{Result, SlapError};

/// Smallest well-formed frame: length + message class.
pub const MIN_FRAME_LEN: u32 = 8;

/// Default maximum accepted frame length (64 MiB).
///
/// A length outside `MIN_FRAME_LEN..=max` means the stream is corrupt; there
/// is no way to resynchronize a length-prefixed stream past a bad length.
pub const DEFAULT_MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
enum State {
    WaitingForLength,
    WaitingForBody { total: usize },
}

/// Buffer for incoming bytes, extracting complete frames as they fill in.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    order: ByteOrder,
    max_frame_len: u32,
}

impl FrameBuffer {
    /// Create a frame buffer reading lengths in `order`.
    pub fn new(order: ByteOrder) -> Self {
        Self::with_max_frame_len(order, DEFAULT_MAX_FRAME_LEN)
    }

    /// Create a frame buffer with a custom maximum frame length.
    pub fn with_max_frame_len(order: ByteOrder, max_frame_len: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            state: State::WaitingForLength,
            order,
            max_frame_len,
        }
    }

    /// Push freshly read bytes and extract every complete frame.
    ///
    /// Returns an empty vector while a frame is still incomplete. Returns an
    /// error only for an impossible declared length, which poisons the whole
    /// stream.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match self.state {
            State::WaitingForLength => {
                if self.buffer.len() < 4 {
                    return Ok(None);
                }

                // Peek only: the length field is part of the frame.
                let total = self.order.read_u32(&self.buffer, 0)?;
                if total < MIN_FRAME_LEN || total > self.max_frame_len {
                    return Err(SlapError::Protocol(format!(
                        "declared frame length {} outside {}..={}",
                        total, MIN_FRAME_LEN, self.max_frame_len
                    )));
                }

                self.state = State::WaitingForBody {
                    total: total as usize,
                };
                self.try_extract_one()
            }

            State::WaitingForBody { total } => {
                if self.buffer.len() < total {
                    return Ok(None);
                }

                let bytes = self.buffer.split_to(total).freeze();
                self.state = State::WaitingForLength;
                Ok(Some(Frame::new(bytes, self.order)))
            }
        }
    }

    /// Number of buffered bytes not yet part of a surfaced frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer holds no pending bytes.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
