//! Protocol engine: handshake, send path, and the receive loop.
//!
//! The [`Client`] owns one connection. Lifecycle:
//! 1. Send the 16-byte client identifier
//! 2. Read the 32-byte server hello (fixes byte order and version)
//! 3. Split the stream, spawn the writer task and the receive loop
//! 4. Public operations register a pending request and enqueue a frame
//! 5. The receive loop resolves pending requests and delivers events
//!
//! # Example
//!
//! ```ignore
//! use slap_client::{Client, DecoderRegistry};
//!
//! #[tokio::main]
//! async fn main() -> slap_client::Result<()> {
//!     let mut decoders = DecoderRegistry::new();
//!     // ... register payload decoders ...
//!     let client = Client::connect(
//!         "127.0.0.1:4711",
//!         decoders,
//!         Box::new(|event| println!("{event:?}")),
//!     )
//!     .await?;
//!
//!     let threads = client.list_threads()?.recv().await?;
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot, watch};

use crate::decoder::{DecodedValue, DecoderRegistry};
use crate::error::{ErrorCode, RemoteError, Result, SlapError};
use crate::event::{DebugEvent, EventListener};
use crate::pending::{PendingRegistry, ReplyHandle};
use crate::protocol::{
    encode_request, pack_step_param, parse_server_hello, BreakpointAction, ByteOrder, EventKind,
    Frame, FrameBuffer, MessageClass, RequestKind, StepKind, WireWriter, CLIENT_ID, HELLO_LEN,
    PAYLOAD_OFFSET,
};
use crate::reassembly::{Reassembler, StreamOutcome};

/// Shared state between the client handle and the receive loop.
struct Shared {
    pending: PendingRegistry,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    /// Held across register + enqueue so that wire order always matches
    /// registration order for concurrently sending callers.
    send_lock: Mutex<()>,
    connected: AtomicBool,
}

/// A connected SLAP protocol engine.
///
/// Cheap to share behind a reference; all public operations take `&self`,
/// return immediately with a [`ReplyHandle`], and never wait for their own
/// reply. Events flow to the listener registered at connect time.
pub struct Client {
    shared: Arc<Shared>,
    order: ByteOrder,
    version: u32,
    shutdown: watch::Sender<bool>,
    closed_rx: oneshot::Receiver<()>,
}

impl Client {
    /// Connect over TCP and perform the handshake.
    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
        decoders: DecoderRegistry,
        listener: EventListener,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let _ = stream.set_nodelay(true);
        Self::start(stream, decoders, listener).await
    }

    /// Perform the handshake on an already-open stream and start the engine.
    ///
    /// Fails without consuming further bytes if the server identifier does
    /// not match; the connection is then unusable.
    pub async fn start<S>(
        mut stream: S,
        decoders: DecoderRegistry,
        listener: EventListener,
    ) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        stream.write_all(&CLIENT_ID).await?;
        stream.flush().await?;

        let mut hello = [0u8; HELLO_LEN];
        stream.read_exact(&mut hello).await?;
        let negotiated = parse_server_hello(&hello)?;
        tracing::debug!(
            order = ?negotiated.order,
            version = negotiated.version,
            "handshake complete"
        );

        let (reader, writer) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (closed_tx, closed_rx) = oneshot::channel();

        let shared = Arc::new(Shared {
            pending: PendingRegistry::new(),
            outbound: outbound_tx,
            send_lock: Mutex::new(()),
            connected: AtomicBool::new(true),
        });

        tokio::spawn(write_loop(outbound_rx, writer, shutdown_rx.clone()));
        tokio::spawn(receive_loop(
            reader,
            negotiated.order,
            Arc::clone(&shared),
            decoders,
            listener,
            shutdown_rx,
            closed_tx,
        ));

        Ok(Self {
            shared,
            order: negotiated.order,
            version: negotiated.version,
            shutdown: shutdown_tx,
            closed_rx,
        })
    }

    /// Protocol version reported by the remote side.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Byte order negotiated at handshake.
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Whether the receive loop is still running.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Close the connection.
    ///
    /// The receive loop exits and delivers one synthetic disconnected event.
    /// Pending requests are not cancelled; they stay unresolved until the
    /// client is dropped (callers needing a bound apply their own timeout).
    pub fn close(&self) {
        self.shared.connected.store(false, Ordering::Release);
        let _ = self.shutdown.send(true);
    }

    /// Wait until the receive loop has exited (remote close or [`close`]).
    ///
    /// [`close`]: Client::close
    pub async fn wait_for_disconnect(self) {
        let _ = self.closed_rx.await;
    }

    // Public operations, one per request kind. Each returns a completion
    // handle immediately; resolution happens on the receive loop.

    /// Enumerate the interpreter's threads.
    pub fn list_threads(&self) -> Result<ReplyHandle> {
        self.send_request(RequestKind::ListThreads, 0, 0, &[])
    }

    /// Fetch information about one thread.
    pub fn thread_info(&self, thread_id: u32) -> Result<ReplyHandle> {
        self.send_request(RequestKind::ThreadInfo, thread_id, 0, &[])
    }

    /// Suspend a running thread.
    pub fn suspend_thread(&self, thread_id: u32) -> Result<ReplyHandle> {
        self.send_request(RequestKind::SuspendThread, thread_id, 0, &[])
    }

    /// Resume a suspended thread.
    pub fn resume_thread(&self, thread_id: u32) -> Result<ReplyHandle> {
        self.send_request(RequestKind::ResumeThread, thread_id, 0, &[])
    }

    /// Retrieve a thread's stack. The reply is a streaming aggregate of
    /// frame elements.
    pub fn thread_stack(&self, thread_id: u32) -> Result<ReplyHandle> {
        self.send_request(RequestKind::ThreadStack, thread_id, 0, &[])
    }

    /// Retrieve the locals of one stack frame. The reply is a streaming
    /// aggregate of variable elements.
    pub fn frame_locals(&self, thread_id: u32, level: u32) -> Result<ReplyHandle> {
        self.send_request(RequestKind::FrameLocals, thread_id, level, &[])
    }

    /// Set a breakpoint in `method` at `line`.
    pub fn set_breakpoint(&self, method: &str, line: u32) -> Result<ReplyHandle> {
        let mut w = WireWriter::new(self.order);
        w.put_string(method);
        self.send_request(RequestKind::SetBreakpoint, 0, line, &w.into_bytes())
    }

    /// Delete, disable, or enable an existing breakpoint.
    pub fn modify_breakpoint(
        &self,
        breakpoint_id: u32,
        action: BreakpointAction,
    ) -> Result<ReplyHandle> {
        self.send_request(
            RequestKind::ModifyBreakpoint,
            breakpoint_id,
            action.code(),
            &[],
        )
    }

    /// Evaluate `expression` in the context of a stack frame.
    pub fn evaluate(&self, thread_id: u32, level: u32, expression: &str) -> Result<ReplyHandle> {
        let mut w = WireWriter::new(self.order);
        w.put_string(expression);
        self.send_request(RequestKind::Evaluate, thread_id, level, &w.into_bytes())
    }

    /// Fetch the source file backing `method`.
    pub fn source_file(&self, method: &str) -> Result<ReplyHandle> {
        let mut w = WireWriter::new(self.order);
        w.put_string(method);
        self.send_request(RequestKind::SourceFile, 0, 0, &w.into_bytes())
    }

    /// Step a suspended thread `count` times.
    pub fn step(&self, thread_id: u32, kind: StepKind, count: u16) -> Result<ReplyHandle> {
        self.send_request(RequestKind::Step, thread_id, pack_step_param(kind, count), &[])
    }

    /// Build, register, and enqueue one request frame.
    ///
    /// Correlation is purely positional per kind, so register + enqueue must
    /// be atomic against other senders; the writer task then drains the
    /// channel in order, which keeps wire order equal to registration order.
    fn send_request(
        &self,
        kind: RequestKind,
        param0: u32,
        param1: u32,
        payload: &[u8],
    ) -> Result<ReplyHandle> {
        let bytes = encode_request(self.order, kind, param0, param1, payload);

        let _guard = self
            .shared
            .send_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !self.is_connected() {
            return Err(SlapError::ConnectionClosed);
        }

        let handle = self.shared.pending.register(kind);
        self.shared
            .outbound
            .send(bytes)
            .map_err(|_| SlapError::ConnectionClosed)?;

        tracing::trace!(?kind, param0, param1, "request enqueued");
        Ok(handle)
    }
}

/// Drains the outbound channel onto the write half of the stream.
async fn write_loop<W>(
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    mut writer: W,
    mut shutdown: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => break,
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        if let Err(e) = writer.write_all(&frame).await {
            tracing::warn!("write failed: {}", e);
            break;
        }
        if let Err(e) = writer.flush().await {
            tracing::warn!("flush failed: {}", e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// Reads bytes, extracts frames, and dispatches them until EOF or shutdown.
///
/// Everything mutable here (accumulation buffer, reassembler, listener) is
/// owned by this task; the only cross-thread surface is the pending
/// registry.
async fn receive_loop<R>(
    mut reader: R,
    order: ByteOrder,
    shared: Arc<Shared>,
    decoders: DecoderRegistry,
    mut listener: EventListener,
    mut shutdown: watch::Receiver<bool>,
    closed_tx: oneshot::Sender<()>,
) where
    R: AsyncRead + Unpin,
{
    let mut frame_buffer = FrameBuffer::new(order);
    let mut reassembler = Reassembler::new();
    let mut buf = vec![0u8; 64 * 1024];

    'outer: loop {
        let n = tokio::select! {
            _ = shutdown.changed() => break,
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    tracing::debug!("remote closed the connection");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!("read failed: {}", e);
                    break;
                }
            },
        };

        let frames = match frame_buffer.push(&buf[..n]) {
            Ok(frames) => frames,
            Err(e) => {
                // A corrupt length cannot be resynchronized.
                tracing::warn!("framing error, closing connection: {}", e);
                break 'outer;
            }
        };

        for frame in frames {
            dispatch_frame(&frame, &shared, &decoders, &mut reassembler, &mut listener);
        }
    }

    shared.connected.store(false, Ordering::Release);
    listener(DebugEvent::Disconnected);
    let _ = closed_tx.send(());
}

/// Route one complete frame by message class.
///
/// Any anomaly here is logged and the loop continues; only Error-class
/// frames propagate to a caller, through the pending registry.
fn dispatch_frame(
    frame: &Frame,
    shared: &Shared,
    decoders: &DecoderRegistry,
    reassembler: &mut Reassembler,
    listener: &mut EventListener,
) {
    match frame.message_class() {
        Some(MessageClass::Error) => {
            let kind = frame.request_kind();
            let code = frame
                .order()
                .read_u32(frame.as_bytes(), PAYLOAD_OFFSET)
                .map(ErrorCode::from_u32)
                .unwrap_or(ErrorCode::UnknownError);
            tracing::debug!(?kind, ?code, "error frame");
            shared
                .pending
                .resolve_oldest_with_error(kind, RemoteError { kind, code });
        }

        Some(MessageClass::Event) => {
            let Some(kind) = frame.secondary().and_then(EventKind::from_u32) else {
                tracing::warn!(code = ?frame.secondary(), "unknown event kind, dropping frame");
                return;
            };
            match decoders.decode_event(kind, frame.payload(), frame.order()) {
                Some(Ok(payload)) => listener(DebugEvent::Remote { kind, payload }),
                Some(Err(e)) => tracing::warn!(?kind, "event decode failed, dropping: {}", e),
                None => tracing::warn!(?kind, "no event decoder registered, dropping frame"),
            }
        }

        Some(MessageClass::Reply) => {
            if reassembler.is_accumulating() {
                // Continuation frames do not repeat the kind; the
                // reassembler supplies it.
                if let StreamOutcome::Complete { kind, aggregate } =
                    reassembler.feed(frame, decoders)
                {
                    shared
                        .pending
                        .resolve_oldest(kind, DecodedValue::new(aggregate));
                }
                return;
            }

            let kind = frame.request_kind();
            if kind.is_streaming() {
                // Start frame: announces the stream, carries no element.
                reassembler.begin(kind);
                return;
            }

            match decoders.decode_reply(kind, frame.payload(), frame.order()) {
                Some(Ok(value)) => shared.pending.resolve_oldest(kind, value),
                Some(Err(e)) => tracing::warn!(?kind, "reply decode failed, dropping: {}", e),
                None => tracing::warn!(?kind, "no reply decoder registered, dropping frame"),
            }
        }

        None => {
            tracing::warn!(class = frame.class_code(), "unknown message class, dropping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SERVER_ID;
    use tokio::io::duplex;

    fn hello_bytes(endian_flag: u8, version: u32) -> [u8; HELLO_LEN] {
        let order = ByteOrder::from_endian_flag(endian_flag);
        let mut buf = [0u8; HELLO_LEN];
        buf[..16].copy_from_slice(&SERVER_ID);
        buf[16] = endian_flag;
        order.write_u32(&mut buf, 20, version);
        buf
    }

    #[tokio::test]
    async fn test_handshake_negotiates_order_and_version() {
        let (client_io, mut server_io) = duplex(4096);

        let server = tokio::spawn(async move {
            let mut id = [0u8; 16];
            server_io.read_exact(&mut id).await.unwrap();
            assert_eq!(id, CLIENT_ID);
            server_io.write_all(&hello_bytes(1, 42)).await.unwrap();
            server_io
        });

        let client = Client::start(client_io, DecoderRegistry::new(), Box::new(|_| {}))
            .await
            .unwrap();

        assert_eq!(client.version(), 42);
        assert_eq!(client.byte_order(), ByteOrder::Little);
        assert!(client.is_connected());
        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_handshake_rejects_wrong_server_id() {
        let (client_io, mut server_io) = duplex(4096);

        tokio::spawn(async move {
            let mut id = [0u8; 16];
            server_io.read_exact(&mut id).await.unwrap();
            let mut bad = hello_bytes(1, 1);
            bad[..16].copy_from_slice(b"NotASwanAtAll\0\0\0");
            server_io.write_all(&bad).await.unwrap();
            server_io
        });

        let result = Client::start(client_io, DecoderRegistry::new(), Box::new(|_| {})).await;
        assert!(matches!(result, Err(SlapError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_request_frame_reaches_the_wire() {
        let (client_io, mut server_io) = duplex(4096);

        let server = tokio::spawn(async move {
            let mut id = [0u8; 16];
            server_io.read_exact(&mut id).await.unwrap();
            server_io.write_all(&hello_bytes(0, 1)).await.unwrap();

            // set breakpoint "foo" line 10: 16 header + 7 payload = 23.
            let mut frame = [0u8; 23];
            server_io.read_exact(&mut frame).await.unwrap();
            let order = ByteOrder::Big;
            assert_eq!(order.read_u32(&frame, 0).unwrap(), 23);
            assert_eq!(
                order.read_u32(&frame, 4).unwrap(),
                RequestKind::SetBreakpoint.code()
            );
            assert_eq!(order.read_u32(&frame, 8).unwrap(), 0);
            assert_eq!(order.read_u32(&frame, 12).unwrap(), 10);
            assert_eq!(order.read_u32(&frame, 16).unwrap(), 3);
            assert_eq!(&frame[20..23], b"foo");
        });

        let client = Client::start(client_io, DecoderRegistry::new(), Box::new(|_| {}))
            .await
            .unwrap();
        let _handle = client.set_breakpoint("foo", 10).unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (client_io, mut server_io) = duplex(4096);

        tokio::spawn(async move {
            let mut id = [0u8; 16];
            server_io.read_exact(&mut id).await.unwrap();
            server_io.write_all(&hello_bytes(1, 1)).await.unwrap();
            server_io
        });

        let client = Client::start(client_io, DecoderRegistry::new(), Box::new(|_| {}))
            .await
            .unwrap();
        client.close();

        assert!(matches!(
            client.list_threads(),
            Err(SlapError::ConnectionClosed)
        ));
    }
}
