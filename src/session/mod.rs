//! Realtime session: connection lifecycle, request correlation and the
//! inbound dispatch loop.

mod correlation;
pub mod updates;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use self::correlation::{Completion, Observer, PendingRegistry};
use crate::config::DEFAULT_EVENT_TIMEOUT;
use crate::error::{RealtimeError, Result};
use crate::events::{ClientEvent, ClientEventKind, RealtimeEvent, ServerEvent};
use crate::transport::{ConnectionState, SignalReceiver, Transport, TransportSignal};
use crate::types::{SessionOptions, Usage};

/// A live conversation with the realtime service.
///
/// Created with [`RealtimeSession::connect`]. Any number of [`send`] calls
/// may be in flight at once; one streaming reader at a time may consume
/// the event queue through [`receive_updates`] or [`updates`].
///
/// Call [`close`] when done. Dropping the session without closing fails
/// pending requests and stops the dispatch task, but does not wait for
/// the transport to shut down.
///
/// [`send`]: RealtimeSession::send
/// [`receive_updates`]: RealtimeSession::receive_updates
/// [`updates`]: RealtimeSession::updates
/// [`close`]: RealtimeSession::close
pub struct RealtimeSession {
    transport: Arc<dyn Transport>,
    shared: Arc<Shared>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

/// State shared between the session handle and its dispatch task.
pub(crate) struct Shared {
    state: Mutex<SharedState>,
    /// Wakes the streaming reader on new events and on closure.
    arrivals: Notify,
    event_timeout_ms: AtomicU64,
    debug: AtomicBool,
}

struct SharedState {
    connection: ConnectionState,
    options: SessionOptions,
    usage: Usage,
    pending: PendingRegistry,
    queue: VecDeque<RealtimeEvent>,
    collecting: bool,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(SharedState {
                connection: ConnectionState::Disconnected,
                options: SessionOptions::default(),
                usage: Usage::default(),
                pending: PendingRegistry::default(),
                queue: VecDeque::new(),
                collecting: false,
            }),
            arrivals: Notify::new(),
            event_timeout_ms: AtomicU64::new(DEFAULT_EVENT_TIMEOUT.as_millis() as u64),
            debug: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connection(&self) -> ConnectionState {
        self.lock().connection
    }

    fn set_connection(&self, connection: ConnectionState) {
        self.lock().connection = connection;
    }

    fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Fail every pending request and wake the reader.
    fn fail_pending(&self, reason: &str) {
        let pending = self.lock().pending.drain();
        for request in pending {
            tracing::debug!(
                event_type = request.kind().as_str(),
                event_id = request.event_id(),
                reason,
                "failing pending realtime request"
            );
            let waiting_for = request.kind().to_string();
            request.complete(Err(RealtimeError::ConnectionClosed(waiting_for)));
        }
        self.arrivals.notify_one();
    }

    /// Fail the request an unparseable frame was meant to complete, judged
    /// by the frame's `type` tag.
    fn fail_unreadable(&self, text: &str, error: RealtimeError) {
        let Some(event_type) = serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .and_then(|frame| frame.get("type")?.as_str().map(str::to_owned))
        else {
            return;
        };
        let request = self.lock().pending.take_unreadable(&event_type);
        if let Some(request) = request {
            tracing::debug!(
                event_type = request.kind().as_str(),
                event_id = request.event_id(),
                completed_by = %event_type,
                "realtime request failed by unreadable frame"
            );
            request.complete(Err(error));
        }
    }

    /// Handle one inbound text frame.
    fn dispatch_frame(&self, text: &str) {
        let event = match ServerEvent::from_json(text) {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(error = %error, "dropping unreadable realtime frame");
                self.fail_unreadable(text, error);
                return;
            }
        };

        if self.debug_enabled() && !matches!(event, ServerEvent::ResponseAudioDelta(_)) {
            tracing::debug!(event_type = event.event_type(), payload = %text, "realtime event received");
        } else {
            tracing::trace!(event_type = event.event_type(), "realtime event received");
        }

        let (dispatch, queued) = {
            let mut state = self.lock();
            match &event {
                ServerEvent::SessionCreated(payload) | ServerEvent::SessionUpdated(payload) => {
                    state.options = payload.session.clone();
                }
                ServerEvent::ResponseDone(payload) => {
                    if let Some(usage) = &payload.response.usage {
                        state.usage.merge(usage);
                    }
                }
                _ => {}
            }
            let dispatch = state.pending.dispatch(&event);
            let queued = state.collecting;
            if queued {
                state.queue.push_back(RealtimeEvent::Server(event.clone()));
            }
            (dispatch, queued)
        };

        for observer in &dispatch.observers {
            observer(&event);
        }
        for (request, outcome) in dispatch.resolved {
            tracing::debug!(
                event_type = request.kind().as_str(),
                event_id = request.event_id(),
                completed_by = event.event_type(),
                ok = outcome.is_ok(),
                "realtime request resolved"
            );
            request.complete(outcome);
        }
        if queued {
            self.arrivals.notify_one();
        }
    }
}

/// Removes a pending request when the waiting `send` goes away.
struct PendingGuard<'a> {
    shared: &'a Shared,
    id: u64,
}

impl PendingGuard<'_> {
    /// Withdraw the request. `false` means a resolution already claimed it.
    fn withdraw(&self) -> bool {
        self.shared.lock().pending.remove(self.id)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.withdraw();
    }
}

impl RealtimeSession {
    /// Open `transport` and wait for the connection to be established.
    pub async fn connect(transport: Arc<dyn Transport>) -> Result<Self> {
        let shared = Arc::new(Shared::new());
        shared.set_connection(ConnectionState::Connecting);
        tracing::debug!("connecting realtime session");

        let mut signals = match transport.open().await {
            Ok(signals) => signals,
            Err(error) => {
                shared.set_connection(ConnectionState::Closed);
                return Err(match error {
                    error @ RealtimeError::ConnectionFailed { .. } => error,
                    other => RealtimeError::connection_failed_with("transport failed to open", other),
                });
            }
        };

        let failure = match signals.recv().await {
            Some(TransportSignal::Open) => None,
            Some(TransportSignal::Error(cause)) => Some(cause),
            Some(TransportSignal::Message(_)) => Some("received a frame before the connection opened".into()),
            Some(TransportSignal::Closed) | None => Some("connection closed before it opened".into()),
        };
        if let Some(cause) = failure {
            shared.set_connection(ConnectionState::Closed);
            let _ = transport.close().await;
            return Err(RealtimeError::connection_failed(cause));
        }

        shared.set_connection(ConnectionState::Open);
        tracing::debug!("realtime session open");
        let dispatch_task = tokio::spawn(run_dispatch(Arc::clone(&shared), signals));

        Ok(Self {
            transport,
            shared,
            dispatch_task: Mutex::new(Some(dispatch_task)),
            closed: AtomicBool::new(false),
        })
    }

    /// Send `event` and wait for the server event that completes it.
    ///
    /// Returns `Ok(None)` for `input_audio_buffer.append`, which the server
    /// never acknowledges. Fails with [`RealtimeError::Timeout`] once the
    /// session event timeout elapses.
    pub async fn send(&self, event: ClientEvent) -> Result<Option<ServerEvent>> {
        self.send_inner(event, None, None).await
    }

    /// Like [`send`](Self::send), failing with [`RealtimeError::Cancelled`]
    /// when `cancel` fires first.
    pub async fn send_with_cancel(
        &self,
        event: ClientEvent,
        cancel: &CancellationToken,
    ) -> Result<Option<ServerEvent>> {
        self.send_inner(event, None, Some(cancel)).await
    }

    /// Like [`send`](Self::send), calling `observer` with every server event
    /// dispatched while the request is pending, including the one that
    /// completes it.
    pub async fn send_with_observer<F>(
        &self,
        event: ClientEvent,
        observer: F,
    ) -> Result<Option<ServerEvent>>
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.send_inner(event, Some(Arc::new(observer)), None).await
    }

    /// Transmit `event` without waiting for any completion.
    pub async fn emit(&self, mut event: ClientEvent) -> Result<()> {
        let payload = self.prepare(&mut event)?;
        self.log_outgoing(&event, &payload);
        self.transport.send(payload).await
    }

    async fn send_inner(
        &self,
        mut event: ClientEvent,
        observer: Option<Observer>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<ServerEvent>> {
        let kind = event.kind();
        if !kind.expects_completion() {
            self.emit(event).await?;
            return Ok(None);
        }

        let payload = encode_outgoing(&mut event)?;
        let (id, mut rx_completion, queued) = {
            let mut state = self.shared.lock();
            if state.connection != ConnectionState::Open {
                return Err(RealtimeError::ConnectionNotOpen(state.connection));
            }
            let queued = state.collecting;
            if queued {
                state.queue.push_back(RealtimeEvent::Client(event.clone()));
            }
            let (id, rx_completion) =
                state
                    .pending
                    .register(kind, event.event_id().unwrap_or_default(), observer);
            (id, rx_completion, queued)
        };
        if queued {
            self.shared.arrivals.notify_one();
        }
        let guard = PendingGuard {
            shared: &self.shared,
            id,
        };

        self.log_outgoing(&event, &payload);
        self.transport.send(payload).await?;

        let timeout = self.event_timeout();
        let deadline = time::sleep(timeout);
        tokio::pin!(deadline);

        tokio::select! {
            biased;
            outcome = &mut rx_completion => return finish(kind, outcome),
            _ = &mut deadline => {
                if guard.withdraw() {
                    tracing::debug!(event_type = kind.as_str(), ?timeout, "realtime request timed out");
                    return Err(RealtimeError::Timeout {
                        event_type: kind.to_string(),
                        after_ms: timeout.as_millis() as u64,
                    });
                }
            }
            _ = wait_cancelled(cancel) => {
                if guard.withdraw() {
                    return Err(RealtimeError::Cancelled(kind.to_string()));
                }
            }
        }

        // A resolution claimed the request first; its outcome is on the way.
        finish(kind, rx_completion.await)
    }

    /// Reject when not open, otherwise serialize and queue for the reader.
    fn prepare(&self, event: &mut ClientEvent) -> Result<String> {
        let payload = encode_outgoing(event)?;
        let mut state = self.shared.lock();
        if state.connection != ConnectionState::Open {
            return Err(RealtimeError::ConnectionNotOpen(state.connection));
        }
        if state.collecting {
            state.queue.push_back(RealtimeEvent::Client(event.clone()));
            drop(state);
            self.shared.arrivals.notify_one();
        }
        Ok(payload)
    }

    fn log_outgoing(&self, event: &ClientEvent, payload: &str) {
        if self.debug_enabled() && event.kind() != ClientEventKind::InputAudioBufferAppend {
            tracing::debug!(event_type = event.event_type(), payload = %payload, "realtime event sent");
        } else {
            tracing::trace!(
                event_type = event.event_type(),
                event_id = event.event_id(),
                "realtime event sent"
            );
        }
    }

    /// Stop the session. Pending requests fail with
    /// [`RealtimeError::ConnectionClosed`]. Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        {
            let mut state = self.shared.lock();
            if matches!(state.connection, ConnectionState::Open | ConnectionState::Connecting) {
                state.connection = ConnectionState::Closing;
            }
        }
        tracing::debug!("closing realtime session");
        self.shared.fail_pending("session closed");

        let result = self.transport.close().await;
        self.abort_dispatch();
        self.shared.set_connection(ConnectionState::Closed);
        self.shared.arrivals.notify_one();
        result
    }

    fn abort_dispatch(&self) {
        let task = self
            .dispatch_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }

    /// The latest configuration reported by the server.
    pub fn options(&self) -> SessionOptions {
        self.shared.lock().options.clone()
    }

    /// Token usage summed over every `response.done` seen so far.
    pub fn usage(&self) -> Usage {
        self.shared.lock().usage.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.connection()
    }

    /// Number of requests still waiting for a completion.
    pub fn pending_requests(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn event_timeout(&self) -> Duration {
        Duration::from_millis(self.shared.event_timeout_ms.load(Ordering::Relaxed))
    }

    /// Applies to requests sent after the call.
    pub fn set_event_timeout(&self, timeout: Duration) {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1);
        self.shared.event_timeout_ms.store(millis, Ordering::Relaxed);
    }

    /// Log frame payloads at debug level. Audio appends are never logged.
    pub fn set_debug(&self, enabled: bool) {
        self.shared.debug.store(enabled, Ordering::Relaxed);
    }

    pub fn debug_enabled(&self) -> bool {
        self.shared.debug_enabled()
    }
}

impl Drop for RealtimeSession {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.fail_pending("session dropped");
        self.abort_dispatch();
        self.shared.set_connection(ConnectionState::Closed);
    }
}

/// Assign an event id when the caller left it unset, then serialize.
fn encode_outgoing(event: &mut ClientEvent) -> Result<String> {
    event.ensure_event_id();
    event.to_json()
}

fn finish(
    kind: ClientEventKind,
    outcome: std::result::Result<Completion, oneshot::error::RecvError>,
) -> Result<Option<ServerEvent>> {
    match outcome {
        Ok(completion) => completion.map(Some),
        Err(_) => Err(RealtimeError::ConnectionClosed(kind.to_string())),
    }
}

async fn wait_cancelled(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(cancel) => cancel.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Consume transport signals in delivery order until the connection ends.
async fn run_dispatch(shared: Arc<Shared>, mut signals: SignalReceiver) {
    while let Some(signal) = signals.recv().await {
        match signal {
            TransportSignal::Message(text) => shared.dispatch_frame(&text),
            TransportSignal::Error(cause) => {
                tracing::warn!(error = %cause, "realtime transport error");
            }
            TransportSignal::Closed => break,
            TransportSignal::Open => tracing::debug!("ignoring repeated open signal"),
        }
    }

    {
        let mut state = shared.lock();
        if state.connection == ConnectionState::Open {
            state.connection = ConnectionState::Closed;
        }
    }
    tracing::debug!("realtime connection ended");
    shared.fail_pending("connection closed");
}
