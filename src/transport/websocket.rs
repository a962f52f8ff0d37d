//! WebSocket transport built on tokio-tungstenite.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{self, Interval, MissedTickBehavior},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};

use super::{ConnectionState, SignalReceiver, Transport, TransportSignal};
use crate::config::RealtimeConfig;
use crate::error::RealtimeError;

type RealtimeWebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum WsCommand {
    Send {
        text: String,
        tx_result: oneshot::Sender<Result<(), WsError>>,
    },
    Close {
        tx_result: oneshot::Sender<Result<(), WsError>>,
    },
}

/// A [`Transport`] over a single WebSocket connection.
///
/// One pump task owns the socket: it writes queued frames, answers pings,
/// sends heartbeats and forwards inbound text frames as signals. No
/// reconnects are attempted.
pub struct WebSocketTransport {
    url: String,
    api_key: Option<String>,
    heartbeat_interval: Option<Duration>,
    state: Arc<Mutex<ConnectionState>>,
    tx_command: Mutex<Option<mpsc::Sender<WsCommand>>>,
    pump_task: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            heartbeat_interval: None,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            tx_command: Mutex::new(None),
            pump_task: Mutex::new(None),
        }
    }

    /// Build a transport for `config.base_url` with the model query parameter.
    pub fn from_config(config: &RealtimeConfig) -> Result<Self, RealtimeError> {
        let url = build_realtime_url(&config.base_url, &config.model)?;
        let mut transport = Self::new(url).with_heartbeat(config.heartbeat_interval);
        transport.api_key = config.api_key.clone();
        Ok(transport)
    }

    /// Send `Authorization: Bearer <key>` during the handshake.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Ping the server at this interval; `None` or zero disables heartbeats.
    pub fn with_heartbeat(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat_interval = interval.filter(|interval| !interval.is_zero());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn set_state(&self, state: ConnectionState) {
        set_state(&self.state, state);
    }

    fn command_sender(&self) -> Option<mpsc::Sender<WsCommand>> {
        self.tx_command
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().cloned())
    }

    async fn request(
        sender: &mpsc::Sender<WsCommand>,
        make_command: impl FnOnce(oneshot::Sender<Result<(), WsError>>) -> WsCommand,
    ) -> Result<(), WsError> {
        let (tx_result, rx_result) = oneshot::channel();
        if sender.send(make_command(tx_result)).await.is_err() {
            return Err(WsError::ConnectionClosed);
        }
        rx_result.await.unwrap_or(Err(WsError::ConnectionClosed))
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self) -> Result<SignalReceiver, RealtimeError> {
        if self.state() != ConnectionState::Disconnected {
            return Err(RealtimeError::InvalidState(format!(
                "websocket transport already used (state: {})",
                self.state()
            )));
        }
        self.set_state(ConnectionState::Connecting);

        let socket = match connect_realtime_socket(&self.url, self.api_key.as_deref()).await {
            Ok(socket) => socket,
            Err(error) => {
                self.set_state(ConnectionState::Closed);
                return Err(error);
            }
        };

        let (tx_signal, rx_signal) = mpsc::unbounded_channel();
        let (tx_command, rx_command) = mpsc::channel(32);
        self.set_state(ConnectionState::Open);
        let _ = tx_signal.send(TransportSignal::Open);

        let task = tokio::spawn(run_pump(
            socket,
            rx_command,
            tx_signal,
            Arc::clone(&self.state),
            self.heartbeat_interval,
        ));
        if let Ok(mut slot) = self.tx_command.lock() {
            *slot = Some(tx_command);
        }
        if let Ok(mut slot) = self.pump_task.lock() {
            *slot = Some(task);
        }
        Ok(rx_signal)
    }

    async fn send(&self, text: String) -> Result<(), RealtimeError> {
        let Some(sender) = self.command_sender() else {
            return Err(RealtimeError::ConnectionNotOpen(self.state()));
        };
        Self::request(&sender, |tx_result| WsCommand::Send { text, tx_result })
            .await
            .map_err(|error| RealtimeError::Transport(format!("websocket send failed: {error}")))
    }

    async fn close(&self) -> Result<(), RealtimeError> {
        let sender = self.tx_command.lock().ok().and_then(|mut slot| slot.take());
        let Some(sender) = sender else {
            return Ok(());
        };
        if self.state() == ConnectionState::Open {
            self.set_state(ConnectionState::Closing);
        }
        match Self::request(&sender, |tx_result| WsCommand::Close { tx_result }).await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(error) => Err(RealtimeError::Transport(format!(
                "websocket close failed: {error}"
            ))),
        }
    }

    fn state(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(ConnectionState::Closed)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.pump_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

fn set_state(state: &Mutex<ConnectionState>, next: ConnectionState) {
    if let Ok(mut state) = state.lock() {
        *state = next;
    }
}

async fn run_pump(
    mut socket: RealtimeWebSocket,
    mut rx_command: mpsc::Receiver<WsCommand>,
    tx_signal: mpsc::UnboundedSender<TransportSignal>,
    state: Arc<Mutex<ConnectionState>>,
    heartbeat_interval: Option<Duration>,
) {
    let mut heartbeat = heartbeat_interval.map(|period| {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });
    if let Some(interval) = heartbeat.as_mut() {
        interval.tick().await;
    }

    loop {
        tokio::select! {
            command = rx_command.recv() => {
                let Some(command) = command else {
                    let _ = socket.close(None).await;
                    break;
                };
                match command {
                    WsCommand::Send { text, tx_result } => {
                        let result = socket.send(Message::Text(text.into())).await;
                        let failed = result.is_err();
                        let _ = tx_result.send(result);
                        if failed {
                            break;
                        }
                    }
                    WsCommand::Close { tx_result } => {
                        let _ = tx_result.send(socket.close(None).await);
                        break;
                    }
                }
            }
            _ = next_heartbeat(&mut heartbeat) => {
                if let Err(error) = socket.send(Message::Ping(Default::default())).await {
                    tracing::warn!(error = %error, "realtime heartbeat failed");
                    let _ = tx_signal.send(TransportSignal::Error(format!(
                        "heartbeat failed: {error}"
                    )));
                    break;
                }
            }
            frame = socket.next() => {
                match frame {
                    Some(Ok(message)) => {
                        if !handle_server_message(&mut socket, &tx_signal, message).await {
                            break;
                        }
                    }
                    Some(Err(error)) => {
                        let _ = tx_signal.send(TransportSignal::Error(format!(
                            "websocket receive failed: {error}"
                        )));
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    set_state(&state, ConnectionState::Closed);
    let _ = tx_signal.send(TransportSignal::Closed);
}

async fn next_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Returns `false` once the connection should stop.
async fn handle_server_message(
    socket: &mut RealtimeWebSocket,
    tx_signal: &mpsc::UnboundedSender<TransportSignal>,
    message: Message,
) -> bool {
    match message {
        Message::Text(text) => {
            let _ = tx_signal.send(TransportSignal::Message(text.to_string()));
        }
        Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => {
                let _ = tx_signal.send(TransportSignal::Message(text));
            }
            Err(_) => tracing::warn!("dropping non-utf8 binary realtime frame"),
        },
        Message::Ping(payload) => {
            if let Err(error) = socket.send(Message::Pong(payload)).await {
                let _ = tx_signal.send(TransportSignal::Error(format!(
                    "websocket pong failed: {error}"
                )));
                return false;
            }
        }
        Message::Pong(_) | Message::Frame(_) => {}
        Message::Close(_) => return false,
    }
    true
}

/// Append the model query parameter to the endpoint URL.
pub fn build_realtime_url(base_url: &str, model: &str) -> Result<String, RealtimeError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(RealtimeError::Configuration(
            "Realtime base URL cannot be empty".into(),
        ));
    }
    if model.trim().is_empty() {
        return Ok(trimmed.to_string());
    }
    let separator = if trimmed.contains('?') { "&" } else { "?" };
    Ok(format!("{trimmed}{separator}model={model}"))
}

async fn connect_realtime_socket(
    url: &str,
    api_key: Option<&str>,
) -> Result<RealtimeWebSocket, RealtimeError> {
    let mut request = url.into_client_request().map_err(|error| {
        RealtimeError::Configuration(format!("Invalid realtime websocket URL: {error}"))
    })?;
    if let Some(api_key) = api_key {
        let auth_value = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|error| {
            RealtimeError::Configuration(format!("Invalid realtime auth header: {error}"))
        })?;
        request.headers_mut().insert("Authorization", auth_value);
    }
    request
        .headers_mut()
        .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

    connect_async(request)
        .await
        .map(|(socket, _)| socket)
        .map_err(map_connect_error)
}

fn map_connect_error(error: WsError) -> RealtimeError {
    match error {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            if matches!(status, 401 | 403) {
                RealtimeError::Authentication(format!(
                    "Realtime websocket authentication failed with status {status}"
                ))
            } else {
                RealtimeError::connection_failed(format!(
                    "Realtime websocket handshake failed with status {status}"
                ))
            }
        }
        WsError::Url(error) => {
            RealtimeError::Configuration(format!("Invalid realtime websocket URL: {error}"))
        }
        other => RealtimeError::connection_failed_with("Realtime websocket connect failed", other),
    }
}
