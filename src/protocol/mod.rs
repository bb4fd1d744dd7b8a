//! Protocol module - wire primitives, framing, handshake, and kinds.
//!
//! This module implements the byte-level side of SLAP:
//! - byte-order-aware u32/string codec
//! - request frame encoding and inbound frame accessors
//! - frame buffer for accumulating partial reads
//! - handshake identifiers and server hello parsing
//! - the closed message/request/event kind enumerations

mod frame;
mod frame_buffer;
mod handshake;
mod kinds;
mod wire;

pub use frame::{
    encode_request, Frame, PAYLOAD_OFFSET, REQUEST_HEADER_LEN, SECONDARY_OFFSET,
    STREAM_TERMINATOR,
};
pub use frame_buffer::{FrameBuffer, DEFAULT_MAX_FRAME_LEN, MIN_FRAME_LEN};
pub use handshake::{parse_server_hello, Negotiated, CLIENT_ID, HELLO_LEN, SERVER_ID};
pub use kinds::{
    pack_step_param, BreakpointAction, EventKind, MessageClass, RequestKind, StepKind,
    STEP_UNTIL_MAGIK,
};
pub use wire::{ByteOrder, WireReader, WireWriter};
