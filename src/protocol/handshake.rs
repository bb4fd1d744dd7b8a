//! Handshake identifiers and server hello parsing.
//!
//! The client opens with a fixed 16-byte identifier and the server answers
//! with 32 bytes:
//!
//! ```text
//! ┌──────────────┬────────────┬──────────┬──────────┬──────────┐
//! │ serverId     │ endianFlag │ reserved │ version  │ reserved │
//! │ 16 bytes     │ 1 byte     │ 3 bytes  │ 4 bytes  │ 8 bytes  │
//! └──────────────┴────────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! The endian flag fixes the connection byte order for everything that
//! follows, including the version field of this same response. Until the
//! flag is read, only fixed byte sequences are exchanged.

use super::wire::ByteOrder;
use crate::error::{Result, SlapError};

/// Identifier the client sends to open the handshake.
pub const CLIENT_ID: [u8; 16] = *b"DuckOnATricycle\0";

/// Identifier the server must echo at the start of its response.
pub const SERVER_ID: [u8; 16] = *b"SwanOnAUnicycle\0";

/// Total size of the server hello.
pub const HELLO_LEN: usize = 32;

const ENDIAN_FLAG_OFFSET: usize = 16;
const VERSION_OFFSET: usize = 20;

/// Connection parameters fixed by the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    /// Byte order of every multi-byte integer after the endian flag.
    pub order: ByteOrder,
    /// Remote protocol version.
    pub version: u32,
}

/// Parse the 32-byte server hello.
///
/// An identifier mismatch is fatal; the connection never becomes usable.
/// Bytes 17..20 and 24..32 are reserved and ignored.
pub fn parse_server_hello(hello: &[u8; HELLO_LEN]) -> Result<Negotiated> {
    if hello[..16] != SERVER_ID {
        return Err(SlapError::Handshake(
            "server identifier mismatch".to_string(),
        ));
    }

    let order = ByteOrder::from_endian_flag(hello[ENDIAN_FLAG_OFFSET]);
    let version = order.read_u32(hello, VERSION_OFFSET)?;

    Ok(Negotiated { order, version })
}
