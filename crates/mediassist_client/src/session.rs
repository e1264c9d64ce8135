//! Chat session: owns the conversation and gates the backend to one
//! exchange at a time.
//!
//! State transitions are `Idle -> Pending -> Idle`. A `submit` or `clear`
//! takes the gate; a second call while it is held is refused, not queued.
//! Every exchange is bounded by the configured timeout and can be
//! cancelled with [`ChatSession::cancel`].

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ClientError};
use crate::config::{QueryOptions, Settings};
use crate::conversation::{Conversation, Turn};

/// Whether an exchange is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Pending,
}

/// Why a `submit` was refused without touching the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyQuery,
    Busy,
}

/// Result of one `submit`.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The backend answered; this turn was appended.
    Answered(Turn),
    /// The exchange failed; `turn` is the fallback that was appended.
    Failed { error: ClientError, turn: Turn },
    /// Nothing was appended and no request was sent.
    Rejected(Rejection),
}

impl SubmitOutcome {
    /// The assistant turn appended by this call, if any.
    pub fn turn(&self) -> Option<&Turn> {
        match self {
            SubmitOutcome::Answered(turn) | SubmitOutcome::Failed { turn, .. } => Some(turn),
            SubmitOutcome::Rejected(_) => None,
        }
    }
}

/// Result of a `clear` that did not hard-fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearOutcome {
    /// Backend accepted; the local conversation is now empty.
    Cleared { status: Option<String> },
    /// An exchange was in flight; nothing changed.
    Busy,
}

#[derive(Debug, Default)]
struct SessionState {
    conversation: Conversation,
    in_flight: Option<CancellationToken>,
    options: QueryOptions,
    backend_memory_len: Option<usize>,
}

/// One user's conversation with the backend.
#[derive(Debug)]
pub struct ChatSession {
    api: ApiClient,
    timeout: Duration,
    state: Mutex<SessionState>,
}

/// Releases the gate if the owning future is dropped mid-flight.
struct PendingGuard<'a> {
    session: &'a ChatSession,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.session.lock().in_flight = None;
    }
}

impl ChatSession {
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        Ok(Self::with_client(
            ApiClient::new(settings)?,
            settings.timeout,
            settings.query,
        ))
    }

    pub fn with_client(api: ApiClient, timeout: Duration, options: QueryOptions) -> Self {
        Self {
            api,
            timeout,
            state: Mutex::new(SessionState {
                options,
                ..SessionState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the gate. `None` when another exchange holds it.
    fn begin(&self, state: &mut SessionState) -> Option<(PendingGuard<'_>, CancellationToken)> {
        if state.in_flight.is_some() {
            return None;
        }
        let token = CancellationToken::new();
        state.in_flight = Some(token.clone());
        Some((PendingGuard { session: self }, token))
    }

    /// Run `call` under the timeout and the cancellation token.
    async fn exchange<T>(
        &self,
        token: &CancellationToken,
        call: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        tokio::select! {
            _ = token.cancelled() => Err(ClientError::Cancelled),
            result = tokio::time::timeout(self.timeout, call) => {
                result.unwrap_or(Err(ClientError::Timeout(self.timeout)))
            }
        }
    }

    /// Send `query` and append the exchange to the conversation.
    ///
    /// The user turn is appended before the request goes out and is never
    /// retracted. Exactly one assistant turn follows: the answer, or the
    /// fallback when anything goes wrong. No retries.
    pub async fn submit(&self, query: &str) -> SubmitOutcome {
        let question = query.trim();
        if question.is_empty() {
            return SubmitOutcome::Rejected(Rejection::EmptyQuery);
        }

        let (guard, token, options) = {
            let mut state = self.lock();
            let Some((guard, token)) = self.begin(&mut state) else {
                debug!("submit refused: exchange already in flight");
                return SubmitOutcome::Rejected(Rejection::Busy);
            };
            state.conversation.push(Turn::user(question));
            (guard, token, state.options)
        };
        debug!(top_k = options.top_k, use_memory = options.use_memory, "request pending");

        let result = self.exchange(&token, self.api.ask(question, options)).await;

        let mut state = self.lock();
        let outcome = match result {
            Ok(reply) => {
                if reply.memory_length.is_some() {
                    state.backend_memory_len = reply.memory_length;
                }
                let turn = Turn::assistant(reply.answer, reply.sources, reply.confidence);
                state.conversation.push(turn.clone());
                SubmitOutcome::Answered(turn)
            }
            Err(error) => {
                warn!(error = %error, "chat request failed");
                let turn = Turn::fallback();
                state.conversation.push(turn.clone());
                SubmitOutcome::Failed { error, turn }
            }
        };
        drop(state);
        drop(guard);
        outcome
    }

    /// Fetch the backend's record of this session. Best-effort: any failure
    /// is logged and yields an empty conversation.
    pub async fn load_history(&self) -> Conversation {
        let call = self.api.history();
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(turns)) => Conversation::from(turns),
            Ok(Err(error)) => {
                warn!(error = %error, "history fetch failed");
                Conversation::new()
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "history fetch timed out");
                Conversation::new()
            }
        }
    }

    /// Seed an idle, empty session with the backend's history. Returns the
    /// number of turns installed.
    pub async fn hydrate(&self) -> usize {
        let history = self.load_history().await;
        let mut state = self.lock();
        if state.in_flight.is_some() || !state.conversation.is_empty() {
            return 0;
        }
        let count = history.len();
        state.conversation = history;
        info!(turns = count, "conversation restored from backend history");
        count
    }

    /// Ask the backend to drop its memory, then empty the conversation.
    ///
    /// On any error the conversation is left exactly as it was.
    pub async fn clear(&self) -> Result<ClearOutcome, ClientError> {
        let (guard, token) = {
            let mut state = self.lock();
            match self.begin(&mut state) {
                Some(taken) => taken,
                None => return Ok(ClearOutcome::Busy),
            }
        };

        let result = self.exchange(&token, self.api.clear_memory()).await;

        let outcome = match result {
            Ok(reply) => {
                let mut state = self.lock();
                state.conversation.clear();
                state.backend_memory_len = Some(0);
                info!(status = ?reply.status, "conversation cleared");
                Ok(ClearOutcome::Cleared {
                    status: reply.status,
                })
            }
            Err(error) => {
                warn!(error = %error, "clear request failed; conversation kept");
                Err(error)
            }
        };
        drop(guard);
        outcome
    }

    /// Cancel the in-flight exchange. Returns false when idle.
    pub fn cancel(&self) -> bool {
        match &self.lock().in_flight {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Snapshot of the conversation.
    pub fn conversation(&self) -> Conversation {
        self.lock().conversation.clone()
    }

    pub fn state(&self) -> RequestState {
        if self.lock().in_flight.is_some() {
            RequestState::Pending
        } else {
            RequestState::Idle
        }
    }

    pub fn options(&self) -> QueryOptions {
        self.lock().options
    }

    /// Ignored when `top_k` is 0.
    pub fn set_top_k(&self, top_k: u32) {
        if top_k > 0 {
            self.lock().options.top_k = top_k;
        }
    }

    pub fn set_use_memory(&self, use_memory: bool) {
        self.lock().options.use_memory = use_memory;
    }

    /// Size of the backend's memory as of the last reply that reported it.
    pub fn backend_memory_len(&self) -> Option<usize> {
        self.lock().backend_memory_len
    }
}
