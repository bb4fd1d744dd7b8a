//! Frame codec: outbound request encoding and inbound frame accessors.
//!
//! Every frame starts with a u32 total length that counts itself. Outbound
//! requests carry a fixed 16-byte header:
//!
//! ```text
//! ┌──────────┬─────────────┬──────────┬──────────┬─────────┐
//! │ length   │ requestKind │ param0   │ param1   │ payload │
//! │ 4 bytes  │ 4 bytes     │ 4 bytes  │ 4 bytes  │ rest    │
//! └──────────┴─────────────┴──────────┴──────────┴─────────┘
//! ```
//!
//! Inbound frames carry `length | messageClass | secondary | payload`, where
//! the secondary field is the request kind (Error/Reply) or event kind
//! (Event). Continuation frames of a streaming reply do not repeat the kind:
//! their element body starts at offset 8 and the terminator marker occupies
//! bytes 12..16. All multi-byte fields use the connection's negotiated byte
//! order, so a `Frame` keeps the order it was decoded with.

use bytes::Bytes;

use super::kinds::{MessageClass, RequestKind};
use super::wire::{ByteOrder, WireWriter};

/// Size of the outbound request header (length + kind + param0 + param1).
pub const REQUEST_HEADER_LEN: usize = 16;

/// Offset of the secondary field (request kind or event kind).
pub const SECONDARY_OFFSET: usize = 8;

/// Offset of an ordinary frame's payload.
pub const PAYLOAD_OFFSET: usize = 12;

/// Marker bytes of a stream terminator frame (frame bytes 12..16).
pub const STREAM_TERMINATOR: [u8; 4] = [0xFF; 4];

/// One complete inbound frame, exactly `length` bytes of wire data.
///
/// Constructed by the frame buffer once all `length` bytes have arrived;
/// never partially populated.
#[derive(Debug, Clone)]
pub struct Frame {
    bytes: Bytes,
    order: ByteOrder,
}

impl Frame {
    /// Wrap complete frame bytes. The caller guarantees `bytes` holds the
    /// whole frame, length field included, and is at least 8 bytes.
    pub(crate) fn new(bytes: Bytes, order: ByteOrder) -> Self {
        debug_assert!(bytes.len() >= 8);
        Self { bytes, order }
    }

    /// Byte order this frame was decoded with.
    #[inline]
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Total frame length as declared on the wire (counts itself).
    #[inline]
    pub fn total_len(&self) -> u32 {
        self.field(0)
    }

    /// Raw message class code (bytes 4..8).
    #[inline]
    pub fn class_code(&self) -> u32 {
        self.field(4)
    }

    /// Decoded message class, `None` for unknown codes.
    pub fn message_class(&self) -> Option<MessageClass> {
        MessageClass::from_u32(self.class_code())
    }

    /// Secondary field (bytes 8..12), absent on short continuation frames.
    pub fn secondary(&self) -> Option<u32> {
        self.order.read_u32(&self.bytes, SECONDARY_OFFSET).ok()
    }

    /// Secondary field read as a request kind.
    ///
    /// Only meaningful on the first frame of a logical reply or on an Error
    /// frame; continuation frames reuse these bytes for element data.
    pub fn request_kind(&self) -> RequestKind {
        self.secondary()
            .map(RequestKind::from_u32)
            .unwrap_or(RequestKind::Unknown)
    }

    /// Payload bytes of an ordinary frame (from offset 12).
    pub fn payload(&self) -> &[u8] {
        self.bytes.get(PAYLOAD_OFFSET..).unwrap_or(&[])
    }

    /// Body of a streaming continuation frame (from offset 8).
    ///
    /// Continuation frames do not repeat the request kind, so their element
    /// data begins where the secondary field would otherwise sit.
    pub fn stream_body(&self) -> &[u8] {
        self.bytes.get(SECONDARY_OFFSET..).unwrap_or(&[])
    }

    /// Whether this frame terminates a streaming reply: bytes 12..16 all 0xFF.
    pub fn is_stream_terminator(&self) -> bool {
        self.bytes
            .get(PAYLOAD_OFFSET..PAYLOAD_OFFSET + 4)
            .map(|marker| marker == STREAM_TERMINATOR)
            .unwrap_or(false)
    }

    /// The complete wire bytes of this frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn field(&self, pos: usize) -> u32 {
        // The frame buffer guarantees at least 8 bytes; a failed read past
        // that boundary degrades to 0 rather than panicking.
        self.order.read_u32(&self.bytes, pos).unwrap_or(0)
    }
}

/// Encode an outbound request frame.
///
/// `length = 16 + len(payload)`, inclusive of the length field itself.
/// Operations that need fewer than two parameters pass 0.
///
/// # Example
///
/// ```
/// use slap_client::protocol::{encode_request, ByteOrder, RequestKind};
///
/// let bytes = encode_request(ByteOrder::Big, RequestKind::ListThreads, 0, 0, &[]);
/// assert_eq!(bytes.len(), 16);
/// assert_eq!(&bytes[..4], &[0, 0, 0, 16]);
/// ```
pub fn encode_request(
    order: ByteOrder,
    kind: RequestKind,
    param0: u32,
    param1: u32,
    payload: &[u8],
) -> Vec<u8> {
    let total = REQUEST_HEADER_LEN + payload.len();
    let mut w = WireWriter::with_capacity(order, total);
    w.put_u32(total as u32);
    w.put_u32(kind.code());
    w.put_u32(param0);
    w.put_u32(param1);
    w.put_bytes(payload);
    w.into_bytes()
}
