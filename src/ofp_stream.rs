//! The concurrent OpenFlow message stream: a framer that recovers
//! self-delimited messages from an arbitrarily chunked byte stream, a pool
//! of parser workers keyed by transaction id, and the reader/writer pair
//! that owns the transport.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use bytes::BytesMut;
use log::{debug, error, info, trace};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

use crate::ofp_header::TYPE_EXPERIMENTER;
use crate::ofp_message::{MessageParser, OfpMessage};

/// Parser tasks multiplexing one connection. Frames are routed by
/// `xid % NUM_PARSER_WORKERS`, so replies sharing a transaction id are
/// parsed in arrival order while distinct transactions parse in parallel.
pub const NUM_PARSER_WORKERS: usize = 25;

/// Experimenter subtype of the OVS `PacketIn2` message.
const TYPE_PACKET_IN2: u32 = 30;
/// Property id of the packet payload, always first in a `PacketIn2`.
const NXPINT_PACKET: u16 = 0;
/// Value written over the vendor field of a frame whose 16-bit length
/// overflowed, telling the downstream parser the length was reconstructed.
/// Open vSwitch uses the same marking for payloads over 64 KiB.
const OVERSIZE_SENTINEL: u32 = 0x1000_2320;

const READ_CHUNK_SIZE: usize = 2048;
const CHANNEL_CAPACITY: usize = 1;

/// Fatal faults of a message stream. Exactly one is published on the error
/// channel before the stream tears itself down; per-message parse failures
/// are logged and dropped instead.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid message with length {0} received")]
    InvalidLength(usize),
    #[error("transport read failed: {0}")]
    TransportRead(#[source] io::Error),
    #[error("transport write failed: {0}")]
    TransportWrite(#[source] io::Error),
}

/// Recovers complete OpenFlow frames from a chunked byte stream.
///
/// Holds a single growing buffer; each frame is split off without copying.
/// The decoder only ever inspects the 8-byte header plus, for experimenter
/// messages, the prefix needed to detect an oversize `PacketIn2`.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    /// Length of the frame currently being collected; 0 while unknown.
    total_len: usize,
}

impl FrameDecoder {
    pub fn new() -> FrameDecoder {
        FrameDecoder::default()
    }

    /// Append freshly read bytes; drain completed frames with
    /// [`FrameDecoder::next_frame`].
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Split off the next complete frame, or `None` until more bytes arrive.
    pub fn next_frame(&mut self) -> Result<Option<BytesMut>, StreamError> {
        if self.buf.len() < 4 {
            return Ok(None);
        }
        if self.total_len == 0 {
            let msg_type = self.buf[1];
            let mut total_len = BigEndian::read_u16(&self.buf[2..4]) as usize;

            // An OVS PacketIn2 carrying more than 64 KiB of packet
            // overflows the 16-bit length field. When the declared length
            // is less than the length of the first packet property,
            // reconstruct the real frame length and mark the frame by
            // overwriting its vendor field. The length decision is
            // deferred until the experimenter prefix is buffered, so
            // fragmentation cannot hide the overflow; a declared length
            // too small to hold that prefix cannot be a PacketIn2 and
            // passes through untouched.
            if msg_type == TYPE_EXPERIMENTER && total_len >= 16 {
                if self.buf.len() < 16 {
                    return Ok(None);
                }
                let experimenter_type = BigEndian::read_u32(&self.buf[12..16]);
                if experimenter_type == TYPE_PACKET_IN2 && total_len >= 20 {
                    if self.buf.len() < 20 {
                        return Ok(None);
                    }
                    let prop = BigEndian::read_u16(&self.buf[16..18]);
                    if prop == NXPINT_PACKET {
                        let pkt_length = BigEndian::read_u16(&self.buf[18..20]) as usize;
                        if total_len < pkt_length {
                            total_len += 1 << 16;
                            info!(
                                "Oversize packet detected: PacketIn message length overflowed; message_length: {total_len}"
                            );
                            BigEndian::write_u32(&mut self.buf[8..12], OVERSIZE_SENTINEL);
                        }
                    }
                }
            }

            if total_len < 8 {
                error!("Buffer too small to parse OpenFlow messages");
                return Err(StreamError::InvalidLength(total_len));
            }
            trace!("Expected OpenFlow message; length: {total_len}");
            self.total_len = total_len;
        }

        if self.buf.len() < self.total_len {
            return Ok(None);
        }
        let frame = self.buf.split_to(self.total_len);
        self.total_len = 0;
        Ok(Some(frame))
    }

    /// Append freshly read bytes and return every frame they complete, in
    /// wire order.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<BytesMut>, StreamError> {
        self.extend(data);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

/// Worker a frame is routed to, fixed by its transaction id.
fn worker_key(xid: u32) -> usize {
    xid as usize % NUM_PARSER_WORKERS
}

async fn run_worker<P>(
    mut full: mpsc::Receiver<BytesMut>,
    parser: Arc<P>,
    inbound: mpsc::Sender<P::Message>,
    mut closed: watch::Receiver<bool>,
) where
    P: MessageParser,
{
    loop {
        tokio::select! {
            // Drain frames already handed to this worker before honoring
            // the closed latch.
            biased;
            frame = full.recv() => match frame {
                Some(frame) => match parser.parse(&frame) {
                    Ok(msg) => {
                        if inbound.send(msg).await.is_err() {
                            return;
                        }
                    }
                    // Framing already succeeded, so a parse failure is a
                    // per-message fault: log it and keep the stream alive.
                    Err(err) => {
                        error!("Failed to parse received message: {err}; bytes: {:02x?}", &frame[..]);
                    }
                },
                None => return,
            },
            _ = closed.changed() => return,
        }
    }
}

async fn run_reader<R>(
    mut rd: R,
    workers: Vec<mpsc::Sender<BytesMut>>,
    error_tx: mpsc::Sender<StreamError>,
    shutdown_tx: mpsc::Sender<()>,
    mut closed: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut decoder = FrameDecoder::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = tokio::select! {
            res = rd.read(&mut chunk) => match res {
                Ok(0) => {
                    if *closed.borrow() {
                        return;
                    }
                    // The peer hung up while we still expect frames.
                    let err = io::Error::from(io::ErrorKind::UnexpectedEof);
                    error!("InboundError: {err}");
                    publish_fatal(&error_tx, &shutdown_tx, StreamError::TransportRead(err)).await;
                    return;
                }
                Ok(n) => n,
                Err(err) => {
                    // A close we initiated surfaces here as a read error;
                    // leave without publishing.
                    if *closed.borrow() {
                        return;
                    }
                    error!("InboundError: {err}");
                    publish_fatal(&error_tx, &shutdown_tx, StreamError::TransportRead(err)).await;
                    return;
                }
            },
            _ = closed.changed() => return,
        };

        decoder.extend(&chunk[..n]);
        loop {
            let frame = match decoder.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    publish_fatal(&error_tx, &shutdown_tx, err).await;
                    return;
                }
            };
            let xid = BigEndian::read_u32(&frame[4..8]);
            let key = worker_key(xid);
            trace!("Received message; length: {}, xid: {xid}, worker: {key}", frame.len());
            if workers[key].send(frame).await.is_err() {
                return;
            }
        }
    }
}

async fn publish_fatal(
    error_tx: &mpsc::Sender<StreamError>,
    shutdown_tx: &mpsc::Sender<()>,
    err: StreamError,
) {
    let _ = error_tx.send(err).await;
    let _ = shutdown_tx.send(()).await;
}

async fn run_writer<M, W>(
    mut wr: W,
    mut outbound: mpsc::Receiver<M>,
    mut shutdown: mpsc::Receiver<()>,
    error_tx: mpsc::Sender<StreamError>,
    closed_tx: watch::Sender<bool>,
) where
    M: OfpMessage + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("Closing OpenFlow message stream.");
                close_transport(&mut wr, &closed_tx).await;
                return;
            }
            msg = outbound.recv() => match msg {
                Some(msg) => {
                    let mut data = Vec::with_capacity(msg.size_of());
                    if let Err(err) = msg.marshal(&mut data) {
                        error!("Failed to marshal outbound message: {err}");
                        continue;
                    }
                    if let Err(err) = wr.write_all(&data).await {
                        error!("OutboundError: {err}");
                        let _ = error_tx.send(StreamError::TransportWrite(err)).await;
                        close_transport(&mut wr, &closed_tx).await;
                        return;
                    }
                    debug!("Sent outbound message; dataLength: {}", data.len());
                }
                // Every outbound handle is gone; nothing more will be sent.
                None => {
                    close_transport(&mut wr, &closed_tx).await;
                    return;
                }
            }
        }
    }
}

/// Flip the closed-by-us latch, then shut the transport down. The order
/// keeps the reader from mistaking our own close for a transport fault.
async fn close_transport<W: AsyncWrite + Unpin>(wr: &mut W, closed_tx: &watch::Sender<bool>) {
    let _ = closed_tx.send(true);
    let _ = wr.shutdown().await;
}

/// A framed, concurrently parsed OpenFlow message stream over a transport.
///
/// Construction spawns one reader, one writer, and [`NUM_PARSER_WORKERS`]
/// parser tasks. The reader and writer are the only tasks touching the
/// transport, on disjoint directions. All channels are bounded at capacity
/// one so producers backpressure naturally.
///
/// Teardown: send on [`shutdown`](MessageStream::shutdown) (or drop the
/// stream and every cloned outbound handle). The writer closes the
/// transport and the reader and workers follow; `inbound` then yields
/// `None`. A fatal fault publishes one [`StreamError`] on `errors` and
/// triggers the same teardown.
pub struct MessageStream<P: MessageParser> {
    /// Parsed inbound messages. Same-xid messages arrive in wire order.
    pub inbound: mpsc::Receiver<P::Message>,
    /// Messages to serialize onto the transport, in submission order.
    pub outbound: mpsc::Sender<P::Message>,
    /// One-shot surface for fatal stream faults.
    pub errors: mpsc::Receiver<StreamError>,
    /// Send to tear the stream down.
    pub shutdown: mpsc::Sender<()>,
    remote_addr: Option<SocketAddr>,
}

impl<P: MessageParser> MessageStream<P> {
    /// Frame and parse OpenFlow messages from `conn`.
    pub fn new(conn: TcpStream, parser: P) -> MessageStream<P> {
        let remote_addr = conn.peer_addr().ok();
        Self::with_transport(conn, remote_addr, parser)
    }

    /// Like [`MessageStream::new`] over any bidirectional byte stream.
    pub fn with_transport<T>(
        transport: T,
        remote_addr: Option<SocketAddr>,
        parser: P,
    ) -> MessageStream<P>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (rd, wr) = tokio::io::split(transport);
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (closed_tx, closed_rx) = watch::channel(false);

        let parser = Arc::new(parser);
        let mut dispatch = Vec::with_capacity(NUM_PARSER_WORKERS);
        for _ in 0..NUM_PARSER_WORKERS {
            let (full_tx, full_rx) = mpsc::channel(CHANNEL_CAPACITY);
            dispatch.push(full_tx);
            tokio::spawn(run_worker(
                full_rx,
                parser.clone(),
                inbound_tx.clone(),
                closed_rx.clone(),
            ));
        }
        drop(inbound_tx);

        tokio::spawn(run_reader(
            rd,
            dispatch,
            error_tx.clone(),
            shutdown_tx.clone(),
            closed_rx,
        ));
        tokio::spawn(run_writer(wr, outbound_rx, shutdown_rx, error_tx, closed_tx));

        MessageStream {
            inbound: inbound_rx,
            outbound: outbound_tx,
            errors: error_rx,
            shutdown: shutdown_tx,
            remote_addr,
        }
    }

    /// Address of the connected switch, when the transport has one.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }
}
