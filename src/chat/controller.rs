use std::collections::HashMap;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::{SearchMode, SidecarClient};
use crate::conversation::{ConversationStore, Message, MessageId};
use crate::error::{Result, ShellError};
use crate::session::SessionId;

use super::decode::Utf8StreamDecoder;

/// Event from a streaming invocation.
///
/// Every variant carries the originating session id captured when the
/// invocation started. The spawned task never re-reads "the current session",
/// so chunks land in the right log no matter how the UI focus moves while the
/// stream is draining.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// Response headers arrived; the body is now streaming.
    Opened { session_id: SessionId },
    /// One decoded chunk of assistant text.
    Delta {
        session_id: SessionId,
        message_id: MessageId,
        text: String,
    },
    /// Stream drained to completion.
    Completed {
        session_id: SessionId,
        message_id: MessageId,
    },
    /// User cancellation observed by the read loop. Not an error.
    Cancelled {
        session_id: SessionId,
        message_id: MessageId,
    },
    /// Transport failure or non-2xx status.
    Failed {
        session_id: SessionId,
        message_id: MessageId,
        error: String,
    },
}

impl ChatEvent {
    /// Originating session of this event.
    pub fn session_id(&self) -> SessionId {
        match self {
            ChatEvent::Opened { session_id }
            | ChatEvent::Delta { session_id, .. }
            | ChatEvent::Completed { session_id, .. }
            | ChatEvent::Cancelled { session_id, .. }
            | ChatEvent::Failed { session_id, .. } => *session_id,
        }
    }
}

/// Per-invocation state, keyed by originating session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Request issued, awaiting response headers
    Sending,
    /// Response body draining
    Streaming,
}

#[derive(Debug)]
struct InFlight {
    message_id: MessageId,
    cancel: CancellationToken,
    phase: StreamPhase,
}

/// Drives streaming invocations: `Idle → Sending → Streaming → Idle`.
///
/// Sends are single-flight per session; different sessions may stream
/// concurrently since they mutate disjoint store entries. Spawned tasks only
/// produce [`ChatEvent`]s; all store mutation happens on the owner's thread
/// through [`ChatController::apply`].
pub struct ChatController {
    client: Option<SidecarClient>,
    search_mode: SearchMode,
    event_tx: mpsc::UnboundedSender<ChatEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<ChatEvent>>,
    in_flight: HashMap<SessionId, InFlight>,
    last_error: Option<String>,
}

impl ChatController {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            client: None,
            search_mode: SearchMode::Off,
            event_tx,
            event_rx: Some(event_rx),
            in_flight: HashMap::new(),
            last_error: None,
        }
    }

    /// Install the sidecar client once its port is known.
    pub fn connect(&mut self, client: SidecarClient) {
        tracing::info!(base_url = client.base_url(), "sidecar connected");
        self.client = Some(client);
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn search_mode(&self) -> SearchMode {
        self.search_mode
    }

    pub fn set_search_mode(&mut self, mode: SearchMode) {
        self.search_mode = mode;
    }

    /// Receiver for stream events; the owner drains it and calls `apply`.
    pub fn take_event_rx(&mut self) -> Option<mpsc::UnboundedReceiver<ChatEvent>> {
        self.event_rx.take()
    }

    pub fn is_streaming(&self, session_id: SessionId) -> bool {
        self.in_flight.contains_key(&session_id)
    }

    pub fn phase(&self, session_id: SessionId) -> Option<StreamPhase> {
        self.in_flight.get(&session_id).map(|f| f.phase)
    }

    /// Most recent user-visible error, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Start a streaming invocation for `session_id`, captured here once and
    /// bound to the invocation for its whole lifetime.
    ///
    /// Appends the user message and a pending assistant placeholder to the
    /// store, then spawns the network task. Fails fast, with no partial
    /// state, when no backend is connected, and refuses a second in-flight
    /// send for the same session.
    pub fn send(
        &mut self,
        store: &mut ConversationStore,
        session_id: SessionId,
        text: &str,
    ) -> Result<MessageId> {
        let Some(client) = self.client.clone() else {
            let err = ShellError::BackendUnavailable;
            self.last_error = Some(err.to_string());
            return Err(err);
        };

        if self.in_flight.contains_key(&session_id) {
            return Err(ShellError::StreamInFlight(session_id));
        }

        self.last_error = None;

        store.append(session_id, Message::user(text));
        let message_id = store.append(session_id, Message::assistant_placeholder());

        let cancel = CancellationToken::new();
        self.in_flight.insert(
            session_id,
            InFlight {
                message_id,
                cancel: cancel.clone(),
                phase: StreamPhase::Sending,
            },
        );

        let event_tx = self.event_tx.clone();
        let search_mode = self.search_mode;
        let text = text.to_string();

        tracing::debug!(%session_id, %message_id, "starting streaming invocation");
        tokio::spawn(async move {
            run_stream(client, event_tx, cancel, session_id, message_id, text, search_mode).await;
        });

        Ok(message_id)
    }

    /// Cancel the in-flight stream for a session. Safe to call at any time:
    /// with nothing in flight (or after completion) this is a no-op.
    pub fn stop(&mut self, session_id: SessionId) {
        if let Some(in_flight) = self.in_flight.get(&session_id) {
            tracing::debug!(%session_id, "cancelling stream");
            in_flight.cancel.cancel();
        }
    }

    /// Cancel every in-flight stream.
    pub fn stop_all(&mut self) {
        for (session_id, in_flight) in &self.in_flight {
            tracing::debug!(%session_id, "cancelling stream");
            in_flight.cancel.cancel();
        }
    }

    /// Clear one session's conversation: truncate the local log (which is
    /// authoritative for the UI) and notify the backend best-effort. A failed
    /// notification is logged and swallowed.
    pub fn clear(&mut self, store: &mut ConversationStore, session_id: SessionId) {
        store.clear(session_id);

        if let Some(client) = self.client.clone() {
            tokio::spawn(async move {
                if let Err(err) = client.clear(session_id).await {
                    tracing::debug!(%session_id, %err, "backend clear notification failed");
                }
            });
        }
    }

    /// Apply one stream event to the store. Mutations target the event's
    /// originating session, never the currently visible one.
    pub fn apply(&mut self, store: &mut ConversationStore, event: ChatEvent) {
        match event {
            ChatEvent::Opened { session_id } => {
                if let Some(in_flight) = self.in_flight.get_mut(&session_id) {
                    in_flight.phase = StreamPhase::Streaming;
                }
            }
            ChatEvent::Delta {
                session_id,
                message_id,
                text,
            } => {
                store.append_text(session_id, message_id, &text);
            }
            ChatEvent::Completed {
                session_id,
                message_id,
            } => {
                store.finalize(session_id, message_id);
                self.in_flight.remove(&session_id);
                tracing::debug!(%session_id, %message_id, "stream completed");
            }
            ChatEvent::Cancelled {
                session_id,
                message_id,
            } => {
                // Partial content stays; cancellation is not an error.
                store.finalize(session_id, message_id);
                self.in_flight.remove(&session_id);
                tracing::debug!(%session_id, %message_id, "stream cancelled");
            }
            ChatEvent::Failed {
                session_id,
                message_id,
                error,
            } => {
                store.finalize(session_id, message_id);
                self.in_flight.remove(&session_id);
                tracing::warn!(%session_id, %message_id, %error, "stream failed");
                self.last_error = Some(error);
            }
        }
    }
}

impl Default for ChatController {
    fn default() -> Self {
        Self::new()
    }
}

/// The streaming read loop for one invocation.
///
/// `session_id` and `message_id` were bound at send time; every event emitted
/// here carries them. The cancellation token is checked before each pending
/// read (`biased` select), so no chunk is processed after cancellation is
/// observed.
async fn run_stream(
    client: SidecarClient,
    event_tx: mpsc::UnboundedSender<ChatEvent>,
    cancel: CancellationToken,
    session_id: SessionId,
    message_id: MessageId,
    text: String,
    search_mode: SearchMode,
) {
    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            let _ = event_tx.send(ChatEvent::Cancelled { session_id, message_id });
            return;
        }
        result = client.stream_chat(&text, session_id, search_mode) => match result {
            Ok(stream) => stream,
            Err(err) => {
                let _ = event_tx.send(ChatEvent::Failed {
                    session_id,
                    message_id,
                    error: err.to_string(),
                });
                return;
            }
        },
    };

    let _ = event_tx.send(ChatEvent::Opened { session_id });

    let mut decoder = Utf8StreamDecoder::new();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = event_tx.send(ChatEvent::Cancelled { session_id, message_id });
                return;
            }
            next = stream.next() => match next {
                Some(Ok(bytes)) => {
                    let text = decoder.decode(&bytes);
                    if !text.is_empty() {
                        let event = ChatEvent::Delta { session_id, message_id, text };
                        if event_tx.send(event).is_err() {
                            return;
                        }
                    }
                }
                Some(Err(err)) => {
                    let _ = event_tx.send(ChatEvent::Failed {
                        session_id,
                        message_id,
                        error: err.to_string(),
                    });
                    return;
                }
                None => {
                    let tail = decoder.finish();
                    if !tail.is_empty() {
                        let _ = event_tx.send(ChatEvent::Delta {
                            session_id,
                            message_id,
                            text: tail,
                        });
                    }
                    let _ = event_tx.send(ChatEvent::Completed { session_id, message_id });
                    return;
                }
            }
        }
    }
}
