//! Decoded debugger events and the listener callback.

use crate::decoder::DecodedValue;
use crate::protocol::EventKind;

/// An asynchronous notification delivered to the registered listener.
///
/// Remote events arrive in receive-loop order with their kind-specific
/// decoded payload. `Disconnected` is synthetic: it is emitted exactly once,
/// after the receive loop exits, and never carries a payload.
#[derive(Debug)]
pub enum DebugEvent {
    /// Event frame from the remote interpreter.
    Remote {
        kind: EventKind,
        payload: DecodedValue,
    },
    /// The connection ended (remote close, read failure, or local close).
    Disconnected,
}

impl DebugEvent {
    /// The remote event kind, if this is not the synthetic disconnect.
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::Remote { kind, .. } => Some(*kind),
            Self::Disconnected => None,
        }
    }
}

/// Callback receiving events on the receive-loop task.
///
/// Invoked synchronously from the loop; it must not block for long.
pub type EventListener = Box<dyn FnMut(DebugEvent) + Send + 'static>;
