//! Pending request registry: FIFO-per-kind correlation.
//!
//! SLAP carries no request identifier on the wire; a reply is matched to
//! the *oldest* outstanding request of the same kind. The registry makes
//! that ordering assumption explicit by keeping one queue per kind instead
//! of a generic id map. Registration happens under the engine's send lock,
//! before the frame can reach the wire; resolution happens on the receive
//! loop. The registry's own lock is separate so a slow resolution never
//! blocks new sends.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::decoder::DecodedValue;
use crate::error::{RemoteError, Result, SlapError};
use crate::protocol::RequestKind;

type ReplyResult = std::result::Result<DecodedValue, RemoteError>;

/// Completion handle for one in-flight request.
///
/// Returned immediately by every public operation; resolved exactly once by
/// the receive loop with the decoded reply value or the remote error.
/// Dropping the handle abandons interest: the eventual resolution is
/// discarded harmlessly.
#[derive(Debug)]
pub struct ReplyHandle {
    rx: oneshot::Receiver<ReplyResult>,
}

impl ReplyHandle {
    /// Wait for the reply.
    ///
    /// Yields the decoded value, the remote error as
    /// [`SlapError::Remote`], or [`SlapError::ConnectionClosed`] if the
    /// engine was dropped before the request resolved. The protocol itself
    /// has no timeout; callers that need one wrap this in
    /// `tokio::time::timeout`.
    pub async fn recv(self) -> Result<DecodedValue> {
        match self.rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(remote)) => Err(SlapError::Remote(remote)),
            Err(_) => Err(SlapError::ConnectionClosed),
        }
    }
}

/// Table of outstanding requests awaiting a reply or error.
pub(crate) struct PendingRegistry {
    queues: Mutex<HashMap<RequestKind, VecDeque<oneshot::Sender<ReplyResult>>>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Append a pending request for `kind` and return its handle.
    ///
    /// Must be called before the corresponding frame is allowed to reach
    /// the wire (the engine holds its send lock across register + enqueue).
    pub fn register(&self, kind: RequestKind) -> ReplyHandle {
        let (tx, rx) = oneshot::channel();
        self.lock().entry(kind).or_default().push_back(tx);
        ReplyHandle { rx }
    }

    /// Complete the oldest pending request of `kind` with a decoded value.
    ///
    /// An unmatched reply is logged and discarded; a caller may have
    /// legitimately abandoned its handle, or the remote may be confused.
    pub fn resolve_oldest(&self, kind: RequestKind, value: DecodedValue) {
        match self.take_oldest(kind) {
            Some(tx) => {
                if tx.send(Ok(value)).is_err() {
                    tracing::debug!(?kind, "reply for abandoned request discarded");
                }
            }
            None => tracing::warn!(?kind, "reply with no pending request, dropping"),
        }
    }

    /// Complete the oldest pending request of `kind` with a remote error.
    pub fn resolve_oldest_with_error(&self, kind: RequestKind, error: RemoteError) {
        match self.take_oldest(kind) {
            Some(tx) => {
                if tx.send(Err(error)).is_err() {
                    tracing::debug!(?kind, "error for abandoned request discarded");
                }
            }
            None => tracing::warn!(?kind, "error frame with no pending request, dropping"),
        }
    }

    /// Number of outstanding requests of `kind`.
    #[cfg(test)]
    pub fn pending_count(&self, kind: RequestKind) -> usize {
        self.lock().get(&kind).map_or(0, VecDeque::len)
    }

    fn take_oldest(&self, kind: RequestKind) -> Option<oneshot::Sender<ReplyResult>> {
        self.lock().get_mut(&kind).and_then(VecDeque::pop_front)
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<RequestKind, VecDeque<oneshot::Sender<ReplyResult>>>>
    {
        // A poisoned lock only means another thread panicked mid-update of
        // an always-consistent queue; carry on with the data.
        self.queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn test_register_and_resolve_fifo() {
        let registry = PendingRegistry::new();
        let first = registry.register(RequestKind::ThreadInfo);
        let second = registry.register(RequestKind::ThreadInfo);
        assert_eq!(registry.pending_count(RequestKind::ThreadInfo), 2);

        registry.resolve_oldest(RequestKind::ThreadInfo, DecodedValue::new(1u32));
        registry.resolve_oldest(RequestKind::ThreadInfo, DecodedValue::new(2u32));

        assert_eq!(first.recv().await.unwrap().downcast::<u32>().unwrap(), 1);
        assert_eq!(second.recv().await.unwrap().downcast::<u32>().unwrap(), 2);
        assert_eq!(registry.pending_count(RequestKind::ThreadInfo), 0);
    }

    #[tokio::test]
    async fn test_kinds_are_independent() {
        let registry = PendingRegistry::new();
        let info = registry.register(RequestKind::ThreadInfo);
        let eval = registry.register(RequestKind::Evaluate);

        registry.resolve_oldest(RequestKind::Evaluate, DecodedValue::new(9u32));

        assert_eq!(eval.recv().await.unwrap().downcast::<u32>().unwrap(), 9);
        assert_eq!(registry.pending_count(RequestKind::ThreadInfo), 1);
        drop(info);
    }

    #[tokio::test]
    async fn test_resolve_with_error() {
        let registry = PendingRegistry::new();
        let handle = registry.register(RequestKind::Evaluate);

        registry.resolve_oldest_with_error(
            RequestKind::Evaluate,
            RemoteError {
                kind: RequestKind::Evaluate,
                code: ErrorCode::EvaluationFailed,
            },
        );

        match handle.recv().await {
            Err(SlapError::Remote(remote)) => {
                assert_eq!(remote.code, ErrorCode::EvaluationFailed);
            }
            other => panic!("expected remote error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unmatched_resolution_is_discarded() {
        let registry = PendingRegistry::new();
        // Nothing pending: logged and dropped, no panic.
        registry.resolve_oldest(RequestKind::ListThreads, DecodedValue::new(0u32));
        registry.resolve_oldest_with_error(
            RequestKind::Step,
            RemoteError {
                kind: RequestKind::Step,
                code: ErrorCode::UnknownError,
            },
        );
    }

    #[tokio::test]
    async fn test_abandoned_handle_resolution_discarded() {
        let registry = PendingRegistry::new();
        let handle = registry.register(RequestKind::SourceFile);
        drop(handle);

        // Entry still resolves in FIFO position and is discarded.
        registry.resolve_oldest(RequestKind::SourceFile, DecodedValue::new(1u32));
        assert_eq!(registry.pending_count(RequestKind::SourceFile), 0);
    }

    #[tokio::test]
    async fn test_dropped_registry_closes_handles() {
        let registry = PendingRegistry::new();
        let handle = registry.register(RequestKind::ListThreads);
        drop(registry);

        assert!(matches!(
            handle.recv().await,
            Err(SlapError::ConnectionClosed)
        ));
    }
}
