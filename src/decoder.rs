//! Payload decoder registry.
//!
//! The engine itself never interprets payload bytes; decoding each
//! request/event kind into a domain object is supplied from outside through
//! a [`DecoderRegistry`]. Decoders are registered with their concrete output
//! type and stored type-erased, the same shape as a handler table keyed by
//! method id: the typed-to-erased conversion happens once at registration.
//!
//! # Example
//!
//! ```
//! use slap_client::protocol::{ByteOrder, RequestKind, WireReader};
//! use slap_client::DecoderRegistry;
//!
//! let mut registry = DecoderRegistry::new();
//! registry.register_reply(RequestKind::Evaluate, |payload, order| {
//!     WireReader::new(payload, order).get_string()
//! });
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, SlapError};
use crate::protocol::{ByteOrder, EventKind, RequestKind};

/// A type-erased decoded domain value.
///
/// Replies and events cross the engine boundary as `DecodedValue`; the
/// caller that registered the decoder knows the concrete type and downcasts.
pub struct DecodedValue(Box<dyn Any + Send>);

impl DecodedValue {
    /// Wrap a concrete value.
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Recover the concrete value, or get `self` back on a type mismatch.
    pub fn downcast<T: 'static>(self) -> std::result::Result<T, DecodedValue> {
        match self.0.downcast::<T>() {
            Ok(boxed) => Ok(*boxed),
            Err(other) => Err(Self(other)),
        }
    }

    /// Borrow the concrete value if the type matches.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Check the concrete type without consuming the value.
    pub fn is<T: 'static>(&self) -> bool {
        self.0.is::<T>()
    }
}

impl fmt::Debug for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DecodedValue(..)")
    }
}

/// The single aggregate value of a streaming reply.
///
/// Holds the decoded stream elements in arrival order. A streaming request
/// (thread stack, frame locals) resolves with a `DecodedValue` wrapping one
/// of these.
#[derive(Debug)]
pub struct StreamAggregate {
    elements: Vec<DecodedValue>,
}

impl StreamAggregate {
    pub(crate) fn new(elements: Vec<DecodedValue>) -> Self {
        Self { elements }
    }

    /// Number of stream elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if the stream carried no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Borrow the elements in arrival order.
    pub fn elements(&self) -> &[DecodedValue] {
        &self.elements
    }

    /// Consume the aggregate, yielding the elements in arrival order.
    pub fn into_elements(self) -> Vec<DecodedValue> {
        self.elements
    }
}

type DecodeFn = dyn Fn(&[u8], ByteOrder) -> Result<DecodedValue> + Send + Sync;

fn erase<T, F>(decode: F) -> Box<DecodeFn>
where
    T: Send + 'static,
    F: Fn(&[u8], ByteOrder) -> Result<T> + Send + Sync + 'static,
{
    // Whatever a decoder fails with surfaces as a decode error; the frame
    // itself was well-formed, only its payload was rejected.
    Box::new(move |payload, order| {
        decode(payload, order)
            .map(DecodedValue::new)
            .map_err(|e| match e {
                e @ SlapError::Decode(_) => e,
                other => SlapError::Decode(other.to_string()),
            })
    })
}

/// Registry mapping message kinds to payload decode functions.
///
/// One entry per reply kind and per event kind, plus element decoders for
/// the two streaming reply kinds. Kinds without an entry are logged and
/// dropped by the receive loop; they are not errors.
#[derive(Default)]
pub struct DecoderRegistry {
    replies: HashMap<RequestKind, Box<DecodeFn>>,
    elements: HashMap<RequestKind, Box<DecodeFn>>,
    events: HashMap<EventKind, Box<DecodeFn>>,
}

impl DecoderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the reply decoder for a non-streaming request kind.
    pub fn register_reply<T, F>(&mut self, kind: RequestKind, decode: F) -> &mut Self
    where
        T: Send + 'static,
        F: Fn(&[u8], ByteOrder) -> Result<T> + Send + Sync + 'static,
    {
        self.replies.insert(kind, erase(decode));
        self
    }

    /// Register the element decoder for a streaming request kind.
    ///
    /// The decoder sees one continuation frame's element body per call.
    pub fn register_stream_element<T, F>(&mut self, kind: RequestKind, decode: F) -> &mut Self
    where
        T: Send + 'static,
        F: Fn(&[u8], ByteOrder) -> Result<T> + Send + Sync + 'static,
    {
        self.elements.insert(kind, erase(decode));
        self
    }

    /// Register the payload decoder for an event kind.
    pub fn register_event<T, F>(&mut self, kind: EventKind, decode: F) -> &mut Self
    where
        T: Send + 'static,
        F: Fn(&[u8], ByteOrder) -> Result<T> + Send + Sync + 'static,
    {
        self.events.insert(kind, erase(decode));
        self
    }

    /// Decode a reply payload; `None` if no decoder is registered for `kind`.
    pub(crate) fn decode_reply(
        &self,
        kind: RequestKind,
        payload: &[u8],
        order: ByteOrder,
    ) -> Option<Result<DecodedValue>> {
        self.replies.get(&kind).map(|f| f(payload, order))
    }

    /// Decode one stream element body; `None` if no element decoder exists.
    pub(crate) fn decode_stream_element(
        &self,
        kind: RequestKind,
        body: &[u8],
        order: ByteOrder,
    ) -> Option<Result<DecodedValue>> {
        self.elements.get(&kind).map(|f| f(body, order))
    }

    /// Decode an event payload; `None` if no decoder is registered for `kind`.
    pub(crate) fn decode_event(
        &self,
        kind: EventKind,
        payload: &[u8],
        order: ByteOrder,
    ) -> Option<Result<DecodedValue>> {
        self.events.get(&kind).map(|f| f(payload, order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WireReader;

    #[test]
    fn test_decoded_value_downcast() {
        let value = DecodedValue::new(42u32);
        assert!(value.is::<u32>());
        assert_eq!(value.downcast_ref::<u32>(), Some(&42));
        assert_eq!(value.downcast::<u32>().unwrap(), 42);
    }

    #[test]
    fn test_decoded_value_wrong_type() {
        let value = DecodedValue::new("hello".to_string());
        let back = value.downcast::<u32>().unwrap_err();
        // Type mismatch hands the value back intact.
        assert_eq!(back.downcast::<String>().unwrap(), "hello");
    }

    #[test]
    fn test_register_and_decode_reply() {
        let mut registry = DecoderRegistry::new();
        registry.register_reply(RequestKind::ThreadInfo, |payload, order| {
            WireReader::new(payload, order).get_u32()
        });

        let payload = ByteOrder::Big.u32_bytes(7);
        let decoded = registry
            .decode_reply(RequestKind::ThreadInfo, &payload, ByteOrder::Big)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.downcast::<u32>().unwrap(), 7);
    }

    #[test]
    fn test_unregistered_kind_is_none() {
        let registry = DecoderRegistry::new();
        assert!(registry
            .decode_reply(RequestKind::Evaluate, &[], ByteOrder::Big)
            .is_none());
        assert!(registry
            .decode_event(EventKind::BreakpointHit, &[], ByteOrder::Big)
            .is_none());
    }

    #[test]
    fn test_decoder_failure_is_decode_error() {
        let mut registry = DecoderRegistry::new();
        registry.register_reply(RequestKind::Evaluate, |payload, order| {
            WireReader::new(payload, order).get_string()
        });

        let result = registry
            .decode_reply(RequestKind::Evaluate, &[0, 0], ByteOrder::Big)
            .unwrap();
        assert!(matches!(result, Err(SlapError::Decode(_))));
    }

    #[test]
    fn test_decode_error_not_double_wrapped() {
        let mut registry = DecoderRegistry::new();
        registry.register_reply(RequestKind::Evaluate, |_, _| -> Result<u32> {
            Err(SlapError::Decode("bad payload".to_string()))
        });

        let err = registry
            .decode_reply(RequestKind::Evaluate, &[], ByteOrder::Big)
            .unwrap()
            .unwrap_err();
        assert_eq!(err.to_string(), "payload decode error: bad payload");
    }

    #[test]
    fn test_element_and_event_registration() {
        let mut registry = DecoderRegistry::new();
        registry
            .register_stream_element(RequestKind::ThreadStack, |body, order| {
                WireReader::new(body, order).get_u32()
            })
            .register_event(EventKind::ThreadStarted, |payload, order| {
                WireReader::new(payload, order).get_u32()
            });

        let body = ByteOrder::Little.u32_bytes(9);
        let element = registry
            .decode_stream_element(RequestKind::ThreadStack, &body, ByteOrder::Little)
            .unwrap()
            .unwrap();
        assert_eq!(element.downcast::<u32>().unwrap(), 9);

        let event = registry
            .decode_event(EventKind::ThreadStarted, &body, ByteOrder::Little)
            .unwrap()
            .unwrap();
        assert_eq!(event.downcast::<u32>().unwrap(), 9);
    }

    #[test]
    fn test_stream_aggregate_order() {
        let aggregate =
            StreamAggregate::new(vec![DecodedValue::new(1u32), DecodedValue::new(2u32)]);
        assert_eq!(aggregate.len(), 2);
        let values: Vec<u32> = aggregate
            .into_elements()
            .into_iter()
            .map(|v| v.downcast::<u32>().unwrap())
            .collect();
        assert_eq!(values, vec![1, 2]);
    }
}
