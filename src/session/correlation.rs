//! Pending request registry and completion matching.
//!
//! Every completion-expecting client event registers a [`PendingRequest`]
//! before it is transmitted. Each inbound server event is then offered to
//! the registry, which decides which requests it resolves.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::RealtimeError;
use crate::events::{ClientEventKind, ServerEvent};
use crate::types::{RealtimeResponseResource, ResponseStatus};

/// Callback invoked with every server event seen while a request is pending.
pub(crate) type Observer = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

pub(crate) type Completion = Result<ServerEvent, RealtimeError>;

pub(crate) struct PendingRequest {
    id: u64,
    kind: ClientEventKind,
    event_id: String,
    tx_completion: oneshot::Sender<Completion>,
    observer: Option<Observer>,
}

impl PendingRequest {
    pub(crate) fn kind(&self) -> ClientEventKind {
        self.kind
    }

    pub(crate) fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Deliver the outcome. The waiter may already be gone.
    pub(crate) fn complete(self, outcome: Completion) {
        let _ = self.tx_completion.send(outcome);
    }
}

/// Result of offering one server event to the registry.
#[derive(Default)]
pub(crate) struct Dispatch {
    /// Requests removed from the registry with their outcome.
    pub resolved: Vec<(PendingRequest, Completion)>,
    /// Observers of requests that were pending when the event arrived.
    pub observers: Vec<Observer>,
}

/// Pending requests in registration order.
#[derive(Default)]
pub(crate) struct PendingRegistry {
    next_id: u64,
    requests: Vec<PendingRequest>,
}

impl PendingRegistry {
    pub(crate) fn register(
        &mut self,
        kind: ClientEventKind,
        event_id: impl Into<String>,
        observer: Option<Observer>,
    ) -> (u64, oneshot::Receiver<Completion>) {
        let (tx_completion, rx_completion) = oneshot::channel();
        self.next_id += 1;
        let id = self.next_id;
        self.requests.push(PendingRequest {
            id,
            kind,
            event_id: event_id.into(),
            tx_completion,
            observer,
        });
        (id, rx_completion)
    }

    /// Remove a request without resolving it. Returns `false` when it was
    /// already resolved by someone else.
    pub(crate) fn remove(&mut self, id: u64) -> bool {
        match self.requests.iter().position(|request| request.id == id) {
            Some(index) => {
                self.requests.remove(index);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: u64) -> bool {
        self.requests.iter().any(|request| request.id == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Remove every pending request, oldest first.
    pub(crate) fn drain(&mut self) -> Vec<PendingRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Remove the earliest request that a frame tagged `event_type` would
    /// have completed. Used when the frame itself could not be parsed.
    pub(crate) fn take_unreadable(&mut self, event_type: &str) -> Option<PendingRequest> {
        let index = self
            .requests
            .iter()
            .position(|request| completion_types(request.kind).contains(&event_type))?;
        Some(self.requests.remove(index))
    }

    /// Offer `event` to every pending request in registration order.
    ///
    /// Resolved requests leave the registry before this returns, so later
    /// events never see them. At most one request per client kind claims a
    /// given event.
    pub(crate) fn dispatch(&mut self, event: &ServerEvent) -> Dispatch {
        let mut dispatch = Dispatch {
            resolved: Vec::new(),
            observers: self
                .requests
                .iter()
                .filter_map(|request| request.observer.clone())
                .collect(),
        };

        if let ServerEvent::Error(error_event) = event {
            let error = &error_event.error;
            let failed = match error.event_id.as_deref() {
                None => self.drain(),
                Some(id) => match self.requests.iter().position(|r| r.event_id == id) {
                    Some(index) => vec![self.requests.remove(index)],
                    None => {
                        tracing::warn!(
                            event_id = id,
                            error = %error,
                            "realtime error names no pending request"
                        );
                        Vec::new()
                    }
                },
            };
            dispatch.resolved = failed
                .into_iter()
                .map(|request| (request, Err(RealtimeError::Protocol(error.clone()))))
                .collect();
            return dispatch;
        }

        let mut claimed: Vec<ClientEventKind> = Vec::new();
        let mut index = 0;
        while index < self.requests.len() {
            let kind = self.requests[index].kind;
            if claimed.contains(&kind) {
                index += 1;
                continue;
            }
            match completion_for(kind, event) {
                Some(outcome) => {
                    claimed.push(kind);
                    let request = self.requests.remove(index);
                    dispatch.resolved.push((request, outcome));
                }
                None => index += 1,
            }
        }
        dispatch
    }
}

/// Decide whether `event` completes a request of `kind`.
///
/// `None` means keep waiting.
pub(crate) fn completion_for(kind: ClientEventKind, event: &ServerEvent) -> Option<Completion> {
    use ClientEventKind as Client;
    use ServerEvent as Server;

    let matched = match (kind, event) {
        (Client::SessionUpdate, Server::SessionUpdated(_))
        | (Client::InputAudioBufferCommit, Server::InputAudioBufferCommitted(_))
        | (Client::InputAudioBufferClear, Server::InputAudioBufferCleared(_))
        | (Client::ConversationItemCreate, Server::ConversationItemCreated(_))
        | (Client::ConversationItemTruncate, Server::ConversationItemTruncated(_))
        | (Client::ConversationItemDelete, Server::ConversationItemDeleted(_))
        | (Client::ResponseCancel, Server::ResponseDone(_)) => true,
        (Client::ResponseCreate, Server::ResponseCreated(payload) | Server::ResponseDone(payload)) => {
            return response_outcome(event, &payload.response);
        }
        _ => false,
    };
    matched.then(|| Ok(event.clone()))
}

/// Tags that can complete a request of `kind`.
fn completion_types(kind: ClientEventKind) -> &'static [&'static str] {
    use ClientEventKind as Client;

    match kind {
        Client::SessionUpdate => &["session.updated"],
        Client::InputAudioBufferCommit => &["input_audio_buffer.committed"],
        Client::InputAudioBufferClear => &["input_audio_buffer.cleared"],
        Client::ConversationItemCreate => &["conversation.item.created"],
        Client::ConversationItemTruncate => &["conversation.item.truncated"],
        Client::ConversationItemDelete => &["conversation.item.deleted"],
        Client::ResponseCreate => &["response.created", "response.done"],
        Client::ResponseCancel => &["response.done"],
        Client::InputAudioBufferAppend => &[],
    }
}

fn response_outcome(event: &ServerEvent, response: &RealtimeResponseResource) -> Option<Completion> {
    match response.status {
        ResponseStatus::InProgress => None,
        ResponseStatus::Completed => Some(Ok(event.clone())),
        status => Some(Err(RealtimeError::ResponseFailed {
            response_id: response.id.clone(),
            status,
            reason: response.failure_reason(),
        })),
    }
}
