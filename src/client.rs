//! WebSocket connection manager for a room session.
//!
//! Owns one logical connection per (participant, room) and its whole
//! lifecycle:
//!
//! ```text
//! Idle ──connect()──► Connecting ──► Open
//!                        ▲            │ transport error /
//!                        │            │ unexpected close
//!                   backoff sleep ◄── Reconnecting
//!
//!                   close() from any state ──► Closed  (terminal)
//! ```
//!
//! Transport failures are non-fatal and always route back through
//! `Reconnecting`; only an explicit [`RoomClient::close`] reaches
//! `Closed`, which suppresses all further reconnection — "I hung up"
//! and "the network died" are different states.
//!
//! Every (re)connect re-runs the full join handshake. The room
//! authority answers a join with a `room_snapshot`, so a client that
//! was gone re-establishes ground truth instead of trusting whatever
//! it last saw.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, RwLock};
use tokio_tungstenite::tungstenite::Message;

use crate::model::{ChatMessage, DrawingStroke, Participant};
use crate::protocol::Envelope;

/// Connection lifecycle state, for UI banners and send gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    /// Terminal; reached only by owner intent.
    Closed,
}

/// Events delivered to the session's consumer.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// Transport (re)established and join handshake sent.
    Open,
    /// Transport lost; the client is backing off before retrying.
    Reconnecting,
    /// Closed by the owner. No more events follow.
    Closed,
    /// A decoded remote event, ready for `RoomStore::apply`.
    Envelope(Envelope),
}

/// Errors surfaced to senders. Transport-level failures inside the
/// reconnect loop are recovered internally and never escalate here.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// Send attempted while the connection is not `Open`.
    #[error("not connected to the room")]
    NotConnected,
    /// Locally invalid outbound event, rejected before any I/O.
    #[error("invalid outbound event: {0}")]
    Encoding(String),
    /// Socket-level failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the room authority, e.g. `ws://127.0.0.1:8000`.
    pub ws_base: String,
    /// First reconnect delay; doubles per consecutive failure.
    pub reconnect_initial: Duration,
    /// Upper bound on the reconnect delay.
    pub reconnect_max: Duration,
    /// Capacity of the outgoing and event channels.
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_base: "ws://127.0.0.1:8000".to_string(),
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
            channel_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Connection URL: `<ws_base>/ws/<room_id>/<participant_id>`.
    pub fn url(&self, room_id: &str, participant_id: &str) -> String {
        format!("{}/ws/{}/{}", self.ws_base, room_id, participant_id)
    }
}

/// Delay before reconnect attempt number `attempt` (0-based).
///
/// Bounded and non-zero: `initial * 2^attempt`, capped at `max`. The
/// attempt counter resets on every successful open, so a flaky link
/// recovers quickly while a dead one backs off.
pub fn backoff_delay(config: &ClientConfig, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.min(16);
    (config.reconnect_initial * factor).min(config.reconnect_max)
}

/// The connection manager. One per (participant, room).
pub struct RoomClient {
    config: ClientConfig,
    room_id: String,
    participant: Participant,
    status: Arc<RwLock<ConnectionStatus>>,
    /// Writer-channel slot; replaced each connection epoch, `None`
    /// while there is no live socket.
    outgoing: Arc<RwLock<Option<mpsc::Sender<Message>>>>,
    event_tx: mpsc::Sender<RoomEvent>,
    event_rx: Option<mpsc::Receiver<RoomEvent>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    supervisor: Option<tokio::task::JoinHandle<()>>,
}

impl RoomClient {
    /// Create a client for the given room and local participant.
    pub fn new(config: ClientConfig, room_id: impl Into<String>, participant: Participant) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            room_id: room_id.into(),
            participant,
            status: Arc::new(RwLock::new(ConnectionStatus::Idle)),
            outgoing: Arc::new(RwLock::new(None)),
            event_tx,
            event_rx: Some(event_rx),
            shutdown_tx,
            shutdown_rx,
            supervisor: None,
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<RoomEvent>> {
        self.event_rx.take()
    }

    /// Start the connection supervisor.
    ///
    /// Establishes the transport and keeps it alive across failures:
    /// every epoch re-runs the join handshake, and every loss schedules
    /// a bounded backoff before the next attempt. Idempotent — a second
    /// call is a logged no-op.
    pub fn connect(&mut self) {
        if self.supervisor.is_some() {
            log::warn!("connect() called twice for room {}", self.room_id);
            return;
        }

        let config = self.config.clone();
        let url = config.url(&self.room_id, &self.participant.id);
        let room_id = self.room_id.clone();
        let participant = self.participant.clone();
        let status = self.status.clone();
        let outgoing = self.outgoing.clone();
        let event_tx = self.event_tx.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();

        self.supervisor = Some(tokio::spawn(async move {
            let mut attempt: u32 = 0;

            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                *status.write().await = ConnectionStatus::Connecting;

                match tokio_tungstenite::connect_async(&url).await {
                    Ok((ws_stream, _)) => {
                        attempt = 0;
                        let (mut writer, mut reader) = ws_stream.split();

                        // Join handshake first: it doubles as the
                        // snapshot request on reconnect.
                        let join = Envelope::join(&room_id, &participant);
                        let handshake_ok = match join.encode() {
                            Ok(text) => writer.send(Message::Text(text.into())).await.is_ok(),
                            Err(e) => {
                                log::error!("join handshake failed to encode: {e}");
                                false
                            }
                        };
                        if !handshake_ok {
                            log::warn!("join handshake failed, retrying {url}");
                        } else {
                            log::info!("connected to {url}");
                            let (out_tx, mut out_rx) =
                                mpsc::channel::<Message>(config.channel_capacity);
                            *outgoing.write().await = Some(out_tx);
                            *status.write().await = ConnectionStatus::Open;
                            let _ = event_tx.send(RoomEvent::Open).await;

                            // Writer task: forward the outgoing channel
                            // to the socket until either side ends.
                            let writer_task = tokio::spawn(async move {
                                while let Some(frame) = out_rx.recv().await {
                                    if writer.send(frame).await.is_err() {
                                        break;
                                    }
                                }
                                let _ = writer.close().await;
                            });

                            // Reader loop for this epoch.
                            loop {
                                tokio::select! {
                                    _ = shutdown_rx.changed() => break,
                                    frame = reader.next() => match frame {
                                        Some(Ok(Message::Text(text))) => {
                                            match Envelope::decode(text.as_str()) {
                                                Ok(env) => {
                                                    let _ = event_tx
                                                        .send(RoomEvent::Envelope(env))
                                                        .await;
                                                }
                                                Err(e) => {
                                                    // Dropped, logged, connection stays up.
                                                    log::warn!("dropping bad frame: {e}");
                                                }
                                            }
                                        }
                                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                                        Some(Ok(Message::Binary(_))) => {
                                            log::warn!("dropping unexpected binary frame");
                                        }
                                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                        Some(Ok(_)) => {}
                                    }
                                }
                            }

                            // Epoch over: drop the writer channel so the
                            // writer task drains and exits; later sends
                            // observe NotConnected.
                            *outgoing.write().await = None;
                            let _ = writer_task.await;
                        }
                    }
                    Err(e) => {
                        log::warn!("connect to {url} failed: {e}");
                    }
                }

                if *shutdown_rx.borrow() {
                    break;
                }
                *status.write().await = ConnectionStatus::Reconnecting;
                let _ = event_tx.send(RoomEvent::Reconnecting).await;

                let delay = backoff_delay(&config, attempt);
                attempt += 1;
                log::info!("reconnecting to {url} in {delay:?} (attempt {attempt})");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    // close() cancels the pending reconnect timer.
                    _ = shutdown_rx.changed() => break,
                }
            }

            *outgoing.write().await = None;
            *status.write().await = ConnectionStatus::Closed;
            let _ = event_tx.send(RoomEvent::Closed).await;
            log::info!("connection to {url} closed by owner");
        }));
    }

    /// Send one envelope to the room authority.
    ///
    /// The envelope is validated and encoded before any socket I/O; a
    /// locally invalid event fails with [`SyncError::Encoding`] and
    /// nothing is sent. A send racing a socket that closed underneath
    /// it fails with [`SyncError::NotConnected`] — never silently
    /// dropped, never retried by the client itself.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), SyncError> {
        envelope.validate().map_err(SyncError::Encoding)?;
        if *self.status.read().await != ConnectionStatus::Open {
            return Err(SyncError::NotConnected);
        }
        let text = envelope
            .encode()
            .map_err(|e| SyncError::Encoding(e.to_string()))?;

        let guard = self.outgoing.read().await;
        let tx = guard.as_ref().ok_or(SyncError::NotConnected)?;
        tx.send(Message::Text(text.into()))
            .await
            .map_err(|_| SyncError::NotConnected)
    }

    /// Send a chat message.
    pub async fn send_chat(&self, message: ChatMessage) -> Result<(), SyncError> {
        self.send(&Envelope::chat(message)).await
    }

    /// Send a finished stroke.
    pub async fn send_stroke(&self, stroke: DrawingStroke) -> Result<(), SyncError> {
        self.send(&Envelope::draw(&self.room_id, stroke)).await
    }

    /// Send a canvas clear at the given sequence number.
    pub async fn send_clear(&self, seq: u64) -> Result<(), SyncError> {
        self.send(&Envelope::clear(&self.room_id, &self.participant.id, seq))
            .await
    }

    /// Close the connection for good.
    ///
    /// Terminal by owner intent: cancels any pending reconnect timer,
    /// sends a leave notice and a close frame if a socket is live, and
    /// suppresses all further automatic reconnection.
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(true);
        let guard = self.outgoing.read().await;
        if let Some(tx) = guard.as_ref() {
            if let Ok(text) = Envelope::leave(&self.room_id, &self.participant.id).encode() {
                let _ = tx.send(Message::Text(text.into())).await;
            }
            let _ = tx.send(Message::Close(None)).await;
        }
    }

    /// Current connection status.
    pub async fn status(&self) -> ConnectionStatus {
        *self.status.read().await
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
