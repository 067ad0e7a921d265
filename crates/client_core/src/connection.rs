//! Websocket channel to the scheduling server.
//!
//! [`ConnectionManager`] owns the socket, correlates create acknowledgements,
//! forwards snapshots and stats as [`ChannelEvent`]s, and reports exactly one
//! event per connectivity edge.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use shared::{
    domain::{ProcessStats, Schedule},
    protocol::{ClientCommand, ClientFrame, CommandAck, ServerEvent},
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{config::ClientSettings, error::TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    Snapshot(Vec<Schedule>),
    ProcessStats(ProcessStats),
}

/// Outbound half of the channel, as seen by the dispatcher.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Sends without expecting any reply.
    async fn emit(&self, command: ClientCommand) -> Result<(), TransportError>;

    /// Sends and waits for the correlated acknowledgement.
    async fn emit_with_ack(
        &self,
        command: ClientCommand,
        timeout: Duration,
    ) -> Result<CommandAck, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(1);

impl ReconnectPolicy {
    /// Delays are clamped so that `1ms <= initial_delay <= max_delay`.
    pub fn new(enabled: bool, initial_delay: Duration, max_delay: Duration) -> Self {
        let max_delay = max_delay.max(MIN_RECONNECT_DELAY);
        Self {
            enabled,
            initial_delay: initial_delay.clamp(MIN_RECONNECT_DELAY, max_delay),
            max_delay,
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self::new(
            settings.auto_reconnect,
            settings.reconnect_initial_delay,
            settings.reconnect_max_delay,
        )
    }

    pub fn disabled() -> Self {
        Self::new(false, Duration::from_millis(500), Duration::from_secs(5))
    }

    fn next_delay(&self, current: Duration) -> Duration {
        current
            .saturating_mul(2)
            .clamp(MIN_RECONNECT_DELAY, self.max_delay.max(MIN_RECONNECT_DELAY))
    }
}

pub struct ConnectionManager {
    ws_url: Url,
    reconnect: ReconnectPolicy,
    inner: Mutex<ConnectionInner>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    next_ack_id: AtomicU64,
}

struct ConnectionInner {
    connected: bool,
    /// Set by `connect`, cleared by `disconnect`; reconnects only while set.
    wanted: bool,
    /// Bumped on every install/teardown so a stale reader cannot tear down a
    /// newer socket.
    generation: u64,
    writer: Option<SplitSink<WsStream, Message>>,
    reader_task: Option<JoinHandle<()>>,
    pending_acks: HashMap<u64, oneshot::Sender<CommandAck>>,
}

impl ConnectionManager {
    pub fn new(
        server_url: &str,
        reconnect: ReconnectPolicy,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<ChannelEvent>), TransportError> {
        let ws_url = websocket_url(server_url)?;
        let (events, events_rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            ws_url,
            reconnect,
            inner: Mutex::new(ConnectionInner {
                connected: false,
                wanted: false,
                generation: 0,
                writer: None,
                reader_task: None,
                pending_acks: HashMap::new(),
            }),
            events,
            next_ack_id: AtomicU64::new(1),
        });
        Ok((manager, events_rx))
    }

    pub fn ws_url(&self) -> &Url {
        &self.ws_url
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.connected
    }

    /// Opens the socket. A no-op when already connected.
    pub async fn connect(self: &Arc<Self>) -> Result<(), TransportError> {
        {
            let mut guard = self.inner.lock().await;
            if guard.connected {
                return Ok(());
            }
            guard.wanted = true;
            if let Some(task) = guard.reader_task.take() {
                task.abort();
            }
        }

        let stream = match self.open_stream().await {
            Ok(stream) => stream,
            Err(err) => {
                self.inner.lock().await.wanted = false;
                return Err(err);
            }
        };
        let Some((reader, generation)) = self.install(stream).await else {
            return Ok(());
        };

        let manager = Arc::clone(self);
        let task = tokio::spawn(async move {
            manager.supervise(reader, generation).await;
        });
        let mut guard = self.inner.lock().await;
        if guard.wanted && guard.reader_task.is_none() {
            guard.reader_task = Some(task);
        } else {
            task.abort();
        }
        Ok(())
    }

    /// Closes the socket and stops reconnecting. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        let mut guard = self.inner.lock().await;
        guard.wanted = false;
        if let Some(task) = guard.reader_task.take() {
            task.abort();
        }
        if !guard.connected {
            return;
        }
        guard.connected = false;
        guard.generation += 1;
        if let Some(mut writer) = guard.writer.take() {
            if let Err(err) = writer.close().await {
                debug!(%err, "websocket close handshake failed");
            }
        }
        let dropped = guard.pending_acks.len();
        guard.pending_acks.clear();
        info!(url = %self.ws_url, dropped_acks = dropped, "disconnected from scheduling server");
        let _ = self.events.send(ChannelEvent::Disconnected);
    }

    async fn open_stream(&self) -> Result<WsStream, TransportError> {
        let (stream, _) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|err| TransportError::Connect {
                url: self.ws_url.to_string(),
                reason: err.to_string(),
            })?;
        Ok(stream)
    }

    async fn install(&self, stream: WsStream) -> Option<(SplitStream<WsStream>, u64)> {
        let (writer, reader) = stream.split();
        let mut guard = self.inner.lock().await;
        if guard.connected || !guard.wanted {
            debug!("discarding websocket opened after state changed");
            return None;
        }
        guard.generation += 1;
        guard.connected = true;
        guard.writer = Some(writer);
        info!(url = %self.ws_url, "connected to scheduling server");
        // Sent before the reader runs so Connected precedes any snapshot.
        let _ = self.events.send(ChannelEvent::Connected);
        Some((reader, guard.generation))
    }

    /// Reads frames for the lifetime of the wanted connection, reconnecting
    /// between sockets when the policy allows it.
    async fn supervise(self: Arc<Self>, mut reader: SplitStream<WsStream>, mut generation: u64) {
        loop {
            self.read_until_closed(&mut reader).await;
            if !self.handle_reader_exit(generation).await {
                return;
            }
            match self.reconnect().await {
                Some((next_reader, next_generation)) => {
                    reader = next_reader;
                    generation = next_generation;
                }
                None => return,
            }
        }
    }

    async fn read_until_closed(&self, reader: &mut SplitStream<WsStream>) {
        while let Some(msg) = reader.next().await {
            match msg {
                Ok(Message::Text(text)) => self.route_frame(&text).await,
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!(%err, "websocket receive failed");
                    break;
                }
            }
        }
    }

    async fn route_frame(&self, text: &str) {
        match serde_json::from_str::<ServerEvent>(text) {
            Ok(ServerEvent::Ack { ack_id, ack }) => {
                let waiter = self.inner.lock().await.pending_acks.remove(&ack_id);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(ack);
                    }
                    None => debug!(ack_id, "dropping acknowledgement with no pending command"),
                }
            }
            Ok(ServerEvent::BroadcastUpdate(schedules)) => {
                debug!(count = schedules.len(), "received schedule snapshot");
                let _ = self.events.send(ChannelEvent::Snapshot(schedules));
            }
            Ok(ServerEvent::ProcessStats(stats)) => {
                let _ = self.events.send(ChannelEvent::ProcessStats(stats));
            }
            Err(err) => warn!(%err, "ignoring malformed server frame"),
        }
    }

    /// Returns whether a reconnect should follow.
    async fn handle_reader_exit(&self, generation: u64) -> bool {
        let mut guard = self.inner.lock().await;
        if guard.generation != generation || !guard.connected {
            return false;
        }
        guard.connected = false;
        guard.generation += 1;
        guard.writer = None;
        // Dropping the senders fails every waiting create with ChannelClosed.
        guard.pending_acks.clear();
        warn!(url = %self.ws_url, "lost connection to scheduling server");
        let _ = self.events.send(ChannelEvent::Disconnected);
        guard.wanted && self.reconnect.enabled
    }

    async fn reconnect(&self) -> Option<(SplitStream<WsStream>, u64)> {
        let mut delay = self
            .reconnect
            .initial_delay
            .clamp(MIN_RECONNECT_DELAY, self.reconnect.max_delay.max(MIN_RECONNECT_DELAY));
        let mut attempt: u32 = 0;
        loop {
            tokio::time::sleep(delay).await;
            if !self.inner.lock().await.wanted || self.events.is_closed() {
                debug!("reconnect abandoned");
                return None;
            }
            attempt += 1;
            match self.open_stream().await {
                Ok(stream) => {
                    let installed = self.install(stream).await;
                    if installed.is_some() {
                        info!(attempt, "reconnected to scheduling server");
                    }
                    return installed;
                }
                Err(err) => {
                    debug!(attempt, %err, "reconnect attempt failed");
                    delay = self.reconnect.next_delay(delay);
                }
            }
        }
    }

    async fn send_frame(&self, frame: &ClientFrame) -> Result<(), TransportError> {
        let command = frame.command.name();
        let text = serde_json::to_string(frame)
            .map_err(|source| TransportError::Encode { command, source })?;
        let mut guard = self.inner.lock().await;
        let writer = guard.writer.as_mut().ok_or(TransportError::NotConnected)?;
        writer
            .send(Message::Text(text))
            .await
            .map_err(|err| TransportError::Send {
                command,
                reason: err.to_string(),
            })?;
        debug!(command, ack_id = ?frame.ack_id, "sent command");
        Ok(())
    }
}

#[async_trait]
impl CommandChannel for ConnectionManager {
    async fn emit(&self, command: ClientCommand) -> Result<(), TransportError> {
        self.send_frame(&ClientFrame {
            ack_id: None,
            command,
        })
        .await
    }

    async fn emit_with_ack(
        &self,
        command: ClientCommand,
        timeout: Duration,
    ) -> Result<CommandAck, TransportError> {
        let ack_id = self.next_ack_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut guard = self.inner.lock().await;
            if !guard.connected {
                return Err(TransportError::NotConnected);
            }
            guard.pending_acks.insert(ack_id, tx);
        }

        let frame = ClientFrame {
            ack_id: Some(ack_id),
            command,
        };
        if let Err(err) = self.send_frame(&frame).await {
            self.inner.lock().await.pending_acks.remove(&ack_id);
            return Err(err);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(_)) => Err(TransportError::ChannelClosed { ack_id }),
            Err(_) => {
                self.inner.lock().await.pending_acks.remove(&ack_id);
                warn!(ack_id, ?timeout, "acknowledgement timed out");
                Err(TransportError::AckTimeout { ack_id, timeout })
            }
        }
    }
}

/// `http(s)://host[/base]` becomes `ws(s)://host[/base]/ws`; `ws(s)://` URLs
/// are used as given.
pub fn websocket_url(server_url: &str) -> Result<Url, TransportError> {
    let invalid = |reason: String| TransportError::InvalidUrl {
        url: server_url.to_string(),
        reason,
    };
    let mut url = Url::parse(server_url.trim()).map_err(|err| invalid(err.to_string()))?;
    let scheme = match url.scheme() {
        "ws" | "wss" => return Ok(url),
        "http" => "ws",
        "https" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid(format!("cannot switch scheme to {scheme}")))?;
    let path = format!("{}/ws", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
