//! Async client for the SLAP binary debugger wire protocol.
//!
//! SLAP connects a debugger front-end to a remote interpreter over a byte
//! stream. This crate implements the client side:
//!
//! - handshake with byte-order negotiation
//! - length-prefixed frame encoding and decoding
//! - a background receive loop that correlates replies to requests
//!   positionally, oldest outstanding request of the same kind first
//! - reassembly of multi-frame streaming replies into one aggregate
//! - a pluggable [`DecoderRegistry`] turning raw payloads into domain values
//! - an event listener for asynchronous remote notifications
//!
//! # Quick start
//!
//! ```ignore
//! use slap_client::protocol::{RequestKind, WireReader};
//! use slap_client::{Client, DecoderRegistry};
//!
//! #[tokio::main]
//! async fn main() -> slap_client::Result<()> {
//!     let mut decoders = DecoderRegistry::new();
//!     decoders.register_reply(RequestKind::Evaluate, |payload, order| {
//!         WireReader::new(payload, order).get_string()
//!     });
//!
//!     let client = Client::connect(
//!         "127.0.0.1:4711",
//!         decoders,
//!         Box::new(|event| tracing::info!(?event, "debug event")),
//!     )
//!     .await?;
//!
//!     let value = client.evaluate(1, 0, "x + y")?.recv().await?;
//!     println!("{}", value.downcast::<String>().unwrap_or_default());
//!
//!     client.close();
//!     client.wait_for_disconnect().await;
//!     Ok(())
//! }
//! ```

mod client;
mod decoder;
mod error;
mod event;
mod pending;
pub mod protocol;
mod reassembly;

pub use client::Client;
pub use decoder::{DecodedValue, DecoderRegistry, StreamAggregate};
pub use error::{ErrorCode, RemoteError, Result, SlapError};
pub use event::{DebugEvent, EventListener};
pub use pending::ReplyHandle;
