//! Sessions: the append-only conversation log plus the tools offered with it.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use switchback_client::ModelClient;
use switchback_common::chat::{Conversation, ConversationItem};
use switchback_tools::ToolRegistry;

use crate::error::{CoreError, RespondResult, Result};
use crate::orchestrator::Orchestrator;

/// Where a session is in the orchestration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No request in flight.
    Idle,
    /// A request has been submitted.
    AwaitingModel,
    /// Tool calls from the last response are being dispatched.
    HandlingTools,
    /// The model produced a final answer.
    Done,
    /// The call ended with an error.
    Failed,
}

impl SessionState {
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::AwaitingModel | Self::HandlingTools)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingModel => "awaiting_model",
            Self::HandlingTools => "handling_tools",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A stored response the next request can continue from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationAnchor {
    /// Id of the stored response.
    pub response_id: String,
    /// Log length the server already knows about through that response.
    pub acknowledged_len: usize,
}

/// One logical chat between a user and the model.
///
/// The conversation log only grows. Items are appended by the orchestrator one
/// whole round at a time.
pub struct Session {
    id: Uuid,
    instructions: Option<String>,
    conversation: Conversation,
    tools: ToolRegistry,
    state: SessionState,
    last_response_id: Option<String>,
    anchor: Option<ContinuationAnchor>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("items", &self.conversation.len())
            .field("tools", &self.tools.tool_names())
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// An empty session with no instructions and no tools.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            instructions: None,
            conversation: Conversation::new(),
            tools: ToolRegistry::new(),
            state: SessionState::Idle,
            last_response_id: None,
            anchor: None,
        }
    }

    /// Creates a session with an optional system prompt and tool set.
    #[must_use]
    pub fn create(system_prompt: Option<String>, tools: Option<ToolRegistry>) -> Self {
        Self {
            instructions: system_prompt,
            tools: tools.unwrap_or_default(),
            ..Self::new()
        }
    }

    /// Sets the system prompt, sent as the request `instructions`.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[must_use]
    pub fn items(&self) -> &[ConversationItem] {
        self.conversation.items()
    }

    #[must_use]
    pub const fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Id of the most recent successful response.
    #[must_use]
    pub fn last_response_id(&self) -> Option<&str> {
        self.last_response_id.as_deref()
    }

    #[must_use]
    pub const fn anchor(&self) -> Option<&ContinuationAnchor> {
        self.anchor.as_ref()
    }

    pub(crate) const fn set_state(&mut self, state: SessionState) -> SessionState {
        std::mem::replace(&mut self.state, state)
    }

    /// Appends one item. Used for the user's turn, which is logged before the
    /// first round.
    pub(crate) fn append(&mut self, item: ConversationItem) {
        self.conversation.push(item);
    }

    /// Appends a completed round.
    pub(crate) fn commit(&mut self, round: StagedRound) {
        let base = self.conversation.len();
        self.last_response_id = Some(round.response_id.clone());
        self.anchor = round.stored.then(|| ContinuationAnchor {
            response_id: round.response_id,
            acknowledged_len: base + round.acknowledged,
        });
        self.conversation.extend(round.items);
    }

    /// A serializable copy of everything except the tools.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            instructions: self.instructions.clone(),
            items: self.conversation.items().to_vec(),
            last_response_id: self.last_response_id.clone(),
            anchor: self.anchor.clone(),
        }
    }

    /// Rebuilds a session from a snapshot and a tool set.
    #[must_use]
    pub fn restore(snapshot: SessionSnapshot, tools: ToolRegistry) -> Self {
        Self {
            id: snapshot.id,
            instructions: snapshot.instructions,
            conversation: Conversation::from_items(snapshot.id, snapshot.items),
            tools,
            state: SessionState::Idle,
            last_response_id: snapshot.last_response_id,
            anchor: snapshot.anchor,
        }
    }
}

/// Items produced by one round, held back until the round completes.
#[derive(Debug)]
pub(crate) struct StagedRound {
    pub response_id: String,
    pub stored: bool,
    pub items: Vec<ConversationItem>,
    /// Leading items of `items` that came from the response itself.
    pub acknowledged: usize,
}

impl StagedRound {
    pub(crate) const fn new(response_id: String, stored: bool) -> Self {
        Self {
            response_id,
            stored,
            items: Vec::new(),
            acknowledged: 0,
        }
    }

    /// Stages an item the server already knows about.
    pub(crate) fn push_acknowledged(&mut self, item: ConversationItem) {
        self.items.push(item);
        self.acknowledged = self.items.len();
    }

    pub(crate) fn push(&mut self, item: ConversationItem) {
        self.items.push(item);
    }
}

/// Caller-owned persistence form of a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub items: Vec<ConversationItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<ContinuationAnchor>,
}

/// A cloneable handle that runs at most one `respond` at a time.
///
/// A second `respond` while one is in flight fails fast with
/// [`CoreError::SessionBusy`]. [`SharedSession::cancel`] aborts the call in
/// flight.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<tokio::sync::Mutex<Session>>,
    cancel: Arc<Mutex<CancellationToken>>,
}

impl fmt::Debug for SharedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSession")
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

impl SharedSession {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(session)),
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// Runs one `respond` call on the wrapped session.
    ///
    /// The session is claimed when this is called, not when the future is
    /// first polled, so a [`SharedSession::cancel`] issued any time after this
    /// call applies to it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionBusy`] if another call is in flight, or any
    /// error from [`Orchestrator::respond_with_cancel`].
    pub fn respond<'a, C: ModelClient>(
        &'a self,
        orchestrator: &'a Orchestrator<C>,
        user_text: &'a str,
    ) -> impl Future<Output = RespondResult> + 'a {
        let claimed = self.claim();
        async move {
            let (mut session, token) = claimed?;
            orchestrator
                .respond_with_cancel(&mut session, user_text, &token)
                .await
        }
    }

    /// Runs one `retry` call on the wrapped session.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionBusy`] if another call is in flight, or any
    /// error from [`Orchestrator::retry_with_cancel`].
    pub fn retry<'a, C: ModelClient>(
        &'a self,
        orchestrator: &'a Orchestrator<C>,
    ) -> impl Future<Output = RespondResult> + 'a {
        let claimed = self.claim();
        async move {
            let (mut session, token) = claimed?;
            orchestrator.retry_with_cancel(&mut session, &token).await
        }
    }

    /// Locks the session and installs a fresh cancellation token for the call.
    fn claim(&self) -> Result<(OwnedMutexGuard<Session>, CancellationToken)> {
        let guard = Arc::clone(&self.inner)
            .try_lock_owned()
            .map_err(|_| CoreError::SessionBusy)?;

        let token = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        Ok((guard, token))
    }

    /// Cancels the call in flight, if any.
    pub fn cancel(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Snapshot of the wrapped session.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionBusy`] while a call is in flight.
    pub fn snapshot(&self) -> Result<SessionSnapshot> {
        self.inner
            .try_lock()
            .map(|session| session.snapshot())
            .map_err(|_| CoreError::SessionBusy)
    }

    /// Replaces the wrapped session.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionBusy`] while a call is in flight.
    pub fn replace(&self, session: Session) -> Result<Session> {
        let mut guard = self.inner.try_lock().map_err(|_| CoreError::SessionBusy)?;
        Ok(std::mem::replace(&mut *guard, session))
    }

    /// Runs `f` with read access to the wrapped session.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionBusy`] while a call is in flight.
    pub fn inspect<R>(&self, f: impl FnOnce(&Session) -> R) -> Result<R> {
        self.inner
            .try_lock()
            .map(|session| f(&session))
            .map_err(|_| CoreError::SessionBusy)
    }
}
