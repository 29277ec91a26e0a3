//! Broker session management.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::{LinkError, ProtocolError, ProtocolErrorKind, Result};
use crate::frame::Frame;

/// How long close() waits for queued frames to reach the socket.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Which side of the relay a link serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkRole {
    /// Local feed carrying sensor channels
    Inbound,
    /// Upstream aggregator
    Outbound,
}

impl std::fmt::Display for LinkRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkRole::Inbound => write!(f, "inbound"),
            LinkRole::Outbound => write!(f, "outbound"),
        }
    }
}

/// Lifecycle state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
    Closed,
}

/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Identity of the publisher
    pub identifier: String,
    /// Channel the message was published on
    pub channel: String,
    /// Opaque payload
    pub payload: Bytes,
}

/// Connection settings for one link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub role: LinkRole,
    pub host: String,
    pub port: u16,
    pub ident: String,
    pub secret: String,

    /// TCP connect and INFO wait timeout
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Capacity of the outbound frame queue
    /// Default: 10000
    pub queue_capacity: usize,

    /// Capacity of the received message channel
    /// Default: 1000
    pub inbound_capacity: usize,
}

impl LinkConfig {
    pub fn new(
        role: LinkRole,
        host: impl Into<String>,
        port: u16,
        ident: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            role,
            host: host.into(),
            port,
            ident: ident.into(),
            secret: secret.into(),
            connect_timeout: Duration::from_secs(10),
            queue_capacity: 10_000,
            inbound_capacity: 1_000,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity.max(1);
        self
    }

    /// `host:port` of the broker
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One hpfeeds broker session.
///
/// A link starts out `Disconnected`. [`connect`](Self::connect) performs the
/// handshake and spawns a reader task (PUBLISH frames become [`RawMessage`]s,
/// ERROR frames and broken sessions become [`ProtocolError`] notifications)
/// and a writer task draining the outbound queue.
pub struct BrokerLink {
    config: LinkConfig,
    notifications: mpsc::UnboundedSender<ProtocolError>,
    state: Arc<Mutex<LinkState>>,
    closing: Arc<AtomicBool>,
    broker_name: Mutex<Option<String>>,
    outbound: Mutex<Option<mpsc::Sender<Bytes>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    dropped: AtomicU64,
}

impl BrokerLink {
    /// Create a disconnected link that reports session failures on `notifications`.
    pub fn new(config: LinkConfig, notifications: mpsc::UnboundedSender<ProtocolError>) -> Self {
        Self {
            config,
            notifications,
            state: Arc::new(Mutex::new(LinkState::Disconnected)),
            closing: Arc::new(AtomicBool::new(false)),
            broker_name: Mutex::new(None),
            outbound: Mutex::new(None),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn role(&self) -> LinkRole {
        self.config.role
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn state(&self) -> LinkState {
        *self.state.lock()
    }

    /// Name the broker announced in its INFO frame
    pub fn broker_name(&self) -> Option<String> {
        self.broker_name.lock().clone()
    }

    /// Number of publishes dropped because the outbound queue was full
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Connect and authenticate.
    ///
    /// Allowed from `Disconnected` and `Failed`, so callers can retry. Returns
    /// the receiver for messages on subscribed channels.
    pub async fn connect(&self) -> Result<mpsc::Receiver<RawMessage>> {
        {
            let mut state = self.state.lock();
            match *state {
                LinkState::Disconnected | LinkState::Failed => *state = LinkState::Connecting,
                LinkState::Closed => return Err(LinkError::Closed),
                LinkState::Connecting | LinkState::Connected => {
                    return Err(LinkError::AlreadyConnected)
                }
            }
        }

        tracing::info!(
            role = %self.config.role,
            ident = %self.config.ident,
            endpoint = %self.config.endpoint(),
            "Connecting to broker"
        );

        let (stream, buffer, broker_name) = match self.handshake().await {
            Ok(session) => session,
            Err(e) => {
                *self.state.lock() = LinkState::Failed;
                return Err(e);
            }
        };

        let (read_half, write_half) = stream.into_split();
        let (message_tx, message_rx) = mpsc::channel(self.config.inbound_capacity);
        let (frame_tx, frame_rx) = mpsc::channel(self.config.queue_capacity);

        let reader = tokio::spawn(run_reader(
            self.config.role,
            read_half,
            buffer,
            message_tx,
            self.notifications.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.closing),
        ));
        let writer = tokio::spawn(run_writer(
            self.config.role,
            write_half,
            frame_rx,
            self.notifications.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.closing),
        ));

        *self.reader.lock() = Some(reader);
        *self.writer.lock() = Some(writer);
        *self.outbound.lock() = Some(frame_tx);
        *self.broker_name.lock() = Some(broker_name.clone());
        *self.state.lock() = LinkState::Connected;

        tracing::info!(
            role = %self.config.role,
            broker = %broker_name,
            endpoint = %self.config.endpoint(),
            "Connected to broker"
        );

        Ok(message_rx)
    }

    async fn handshake(&self) -> Result<(TcpStream, BytesMut, String)> {
        let endpoint = self.config.endpoint();
        let connect_timeout = self.config.connect_timeout;

        let mut stream = timeout(
            connect_timeout,
            TcpStream::connect((self.config.host.as_str(), self.config.port)),
        )
        .await
        .map_err(|_| LinkError::ConnectTimeout {
            endpoint: endpoint.clone(),
            timeout: connect_timeout,
        })?
        .map_err(|source| LinkError::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;
        stream.set_nodelay(true)?;

        let mut buffer = BytesMut::with_capacity(4096);
        let first = timeout(connect_timeout, read_frame(&mut stream, &mut buffer))
            .await
            .map_err(|_| LinkError::ConnectTimeout {
                endpoint: endpoint.clone(),
                timeout: connect_timeout,
            })?
            .map_err(|e| LinkError::Handshake {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        match first {
            Some(Frame::Info { broker_name, nonce }) => {
                let auth = Frame::auth(&self.config.ident, &self.config.secret, &nonce);
                stream.write_all(&auth.to_bytes()?).await?;
                Ok((stream, buffer, broker_name))
            }
            Some(Frame::Error { message }) => Err(LinkError::Rejected { endpoint, message }),
            Some(other) => Err(LinkError::Handshake {
                endpoint,
                reason: format!("expected INFO, got {:?}", other.opcode()),
            }),
            None => Err(LinkError::Handshake {
                endpoint,
                reason: "broker closed the connection before INFO".to_string(),
            }),
        }
    }

    /// Subscribe to each channel.
    pub async fn subscribe<I, S>(&self, channels: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sender = self.outbound.lock().clone().ok_or(LinkError::NotConnected)?;

        for channel in channels {
            let channel = channel.as_ref();
            let frame = Frame::Subscribe {
                ident: self.config.ident.clone(),
                channel: channel.to_string(),
            };
            sender
                .send(frame.to_bytes()?)
                .await
                .map_err(|_| LinkError::NotConnected)?;
            tracing::debug!(role = %self.config.role, channel, "Subscribed");
        }

        Ok(())
    }

    /// Queue a PUBLISH frame.
    ///
    /// Fire-and-forget: nothing is reported back. A full queue drops the
    /// message with a warning; a link that is not connected ignores it.
    pub fn publish(&self, channel: &str, payload: Bytes) {
        let guard = self.outbound.lock();
        let Some(sender) = guard.as_ref() else {
            tracing::trace!(role = %self.config.role, channel, "Publish on inactive link ignored");
            return;
        };

        let frame = Frame::Publish {
            ident: self.config.ident.clone(),
            channel: channel.to_string(),
            payload,
        };
        let bytes = match frame.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(role = %self.config.role, channel, error = %e, "Dropping unencodable publish");
                return;
            }
        };

        match sender.try_send(bytes) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    role = %self.config.role,
                    channel,
                    dropped,
                    "Outbound queue full, dropping message"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(role = %self.config.role, channel, "Writer stopped, publish ignored");
            }
        }
    }

    /// Close the session.
    ///
    /// Idempotent. A never-connected link is left untouched. Queued frames
    /// get a short grace period to reach the socket. Closing never raises a
    /// protocol notification.
    pub async fn close(&self) {
        if self.state() == LinkState::Disconnected {
            return;
        }
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        // Dropping the sender lets the writer drain and exit
        self.outbound.lock().take();

        let reader = self.reader.lock().take();
        if let Some(reader) = reader {
            reader.abort();
            let _ = reader.await;
        }

        let writer = self.writer.lock().take();
        if let Some(mut writer) = writer {
            if timeout(FLUSH_TIMEOUT, &mut writer).await.is_err() {
                tracing::warn!(role = %self.config.role, "Outbound queue not flushed before close");
                writer.abort();
                let _ = writer.await;
            }
        }

        *self.state.lock() = LinkState::Closed;
        tracing::info!(role = %self.config.role, endpoint = %self.config.endpoint(), "Link closed");
    }
}

impl std::fmt::Debug for BrokerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerLink")
            .field("role", &self.config.role)
            .field("endpoint", &self.config.endpoint())
            .field("ident", &self.config.ident)
            .field("state", &self.state())
            .finish()
    }
}

/// Read until one complete frame is buffered. `Ok(None)` on clean EOF.
async fn read_frame<R>(reader: &mut R, buffer: &mut BytesMut) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(frame) = Frame::decode(buffer)? {
            return Ok(Some(frame));
        }

        if reader.read_buf(buffer).await? == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed mid-frame",
            )));
        }
    }
}

async fn run_reader(
    role: LinkRole,
    mut read_half: OwnedReadHalf,
    mut buffer: BytesMut,
    messages: mpsc::Sender<RawMessage>,
    notifications: mpsc::UnboundedSender<ProtocolError>,
    state: Arc<Mutex<LinkState>>,
    closing: Arc<AtomicBool>,
) {
    loop {
        let kind = match read_frame(&mut read_half, &mut buffer).await {
            Ok(Some(Frame::Publish {
                ident,
                channel,
                payload,
            })) => {
                let message = RawMessage {
                    identifier: ident,
                    channel,
                    payload,
                };
                if messages.send(message).await.is_err() {
                    tracing::trace!(%role, "No consumer for received message");
                }
                continue;
            }
            Ok(Some(Frame::Error { message })) => {
                tracing::error!(%role, error = %message, "Error message from broker");
                if !closing.load(Ordering::SeqCst) {
                    let _ = notifications.send(ProtocolError {
                        role,
                        kind: ProtocolErrorKind::Broker(message),
                    });
                }
                continue;
            }
            Ok(Some(other)) => {
                tracing::debug!(%role, opcode = ?other.opcode(), "Ignoring unexpected frame");
                continue;
            }
            Ok(None) => ProtocolErrorKind::Disconnected,
            Err(LinkError::Frame(e)) if e.is_body_error() => {
                tracing::warn!(%role, error = %e, "Dropping unreadable frame");
                continue;
            }
            Err(LinkError::Frame(e)) => ProtocolErrorKind::Malformed(e.to_string()),
            Err(e) => ProtocolErrorKind::Io(e.to_string()),
        };

        if closing.load(Ordering::SeqCst) {
            return;
        }

        tracing::error!(%role, error = %kind, "Broker session ended");
        *state.lock() = LinkState::Failed;
        let _ = notifications.send(ProtocolError { role, kind });
        return;
    }
}

async fn run_writer(
    role: LinkRole,
    mut write_half: OwnedWriteHalf,
    mut frames: mpsc::Receiver<Bytes>,
    notifications: mpsc::UnboundedSender<ProtocolError>,
    state: Arc<Mutex<LinkState>>,
    closing: Arc<AtomicBool>,
) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = write_half.write_all(&frame).await {
            if !closing.load(Ordering::SeqCst) {
                tracing::error!(%role, error = %e, "Failed to write to broker");
                *state.lock() = LinkState::Failed;
                let _ = notifications.send(ProtocolError {
                    role,
                    kind: ProtocolErrorKind::Io(e.to_string()),
                });
            }
            return;
        }
    }

    let _ = write_half.shutdown().await;
}
