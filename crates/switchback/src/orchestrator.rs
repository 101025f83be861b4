//! The conversation orchestrator.
//!
//! One `respond` call drives a session through
//! `Idle -> AwaitingModel -> (HandlingTools -> AwaitingModel)* -> Done | Failed`
//! and back to `Idle`. Each round's items are staged and appended to the log
//! only once the round completes, so an error or cancellation never leaves a
//! partial round behind.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use typed_builder::TypedBuilder;

use switchback_client::{ApiError, ClientError, ModelClient, RequestBuilder, ResponsesRequest};
use switchback_common::chat::ConversationItem;
use switchback_common::client::{ToolChoice, Usage};
use switchback_common::response::{ModelResponse, OutputItem, ResponseStatus};
use switchback_tools::ToolDispatcher;

use crate::error::{CoreError, RespondError, RespondResult, Result};
use crate::events::{CoreEvent, EventCallback};
use crate::session::{Session, SessionState, StagedRound};

/// Default cap on tool rounds per `respond` call.
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;

/// How follow-up requests carry earlier context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuationStrategy {
    /// Resend the whole log on every request; nothing is stored server-side.
    #[default]
    FullHistory,
    /// Store responses and send only the items added since the last one,
    /// keyed by `previous_response_id`.
    PreviousResponse,
}

/// Orchestration settings.
#[derive(Debug, Clone, TypedBuilder)]
pub struct OrchestratorOptions {
    /// Tool rounds allowed per `respond` call before failing with
    /// [`CoreError::ToolLoopExceeded`].
    #[builder(default = DEFAULT_MAX_TOOL_ROUNDS)]
    pub max_tool_rounds: u32,
    /// Let the model request several calls per response and run them
    /// concurrently.
    #[builder(default)]
    pub parallel_tool_calls: bool,
    #[builder(default)]
    pub continuation: ContinuationStrategy,
    /// Skip tool declarations on requests that carry `previous_response_id`.
    #[builder(default)]
    pub omit_tools_on_continuation: bool,
    /// Bound on each tool handler invocation.
    #[builder(default, setter(strip_option))]
    pub tool_timeout: Option<Duration>,
    #[builder(default, setter(strip_option))]
    pub tool_choice: Option<ToolChoice>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Result of a successful `respond` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Assistant texts appended during the call, in order.
    pub assistant_turns: Vec<String>,
    /// Tool rounds completed.
    pub tool_rounds: u32,
    /// Usage summed over every response in the call.
    pub usage: Usage,
    /// Id of the last response.
    pub response_id: Option<String>,
}

impl Reply {
    /// The last assistant text, if any.
    #[must_use]
    pub fn final_text(&self) -> Option<&str> {
        self.assistant_turns.last().map(String::as_str)
    }
}

/// Drives sessions against a [`ModelClient`].
///
/// The orchestrator holds no per-session state; one instance can serve any
/// number of sessions concurrently.
pub struct Orchestrator<C: ModelClient> {
    client: C,
    options: OrchestratorOptions,
    event_callback: Option<EventCallback>,
}

impl<C: ModelClient> std::fmt::Debug for Orchestrator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("options", &self.options)
            .field("event_callback", &self.event_callback.is_some())
            .finish_non_exhaustive()
    }
}

impl<C: ModelClient> Orchestrator<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            options: OrchestratorOptions::default(),
            event_callback: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_event_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(CoreEvent) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
            + Send
            + Sync
            + 'static,
    {
        self.event_callback = Some(Box::new(callback));
        self
    }

    pub const fn client(&self) -> &C {
        &self.client
    }

    pub const fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Sends `user_text` and runs tool rounds until the model answers.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::respond_with_cancel`].
    pub async fn respond(&self, session: &mut Session, user_text: &str) -> RespondResult {
        self.respond_with_cancel(session, user_text, &CancellationToken::new())
            .await
    }

    /// Sends `user_text` and runs tool rounds until the model answers or
    /// `cancel` fires.
    ///
    /// The user's turn is logged before the first request and stays logged
    /// whatever happens next. Each later round appends its items only once it
    /// completes. To try again after a failure, call [`Orchestrator::retry`]
    /// rather than sending the same text twice.
    ///
    /// # Errors
    ///
    /// The returned [`RespondError`] carries the error and, in `partial`, the
    /// turns and rounds committed before it:
    /// - [`CoreError::Validation`] if `user_text` is blank or the client
    ///   configuration is invalid; nothing is logged in either case
    /// - [`CoreError::Transport`] / [`CoreError::Api`] if a request fails
    /// - [`CoreError::ToolLoopExceeded`] if the model keeps calling tools past
    ///   `max_tool_rounds`
    /// - [`CoreError::Cancelled`] if `cancel` fires
    pub async fn respond_with_cancel(
        &self,
        session: &mut Session,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> RespondResult {
        if user_text.trim().is_empty() {
            return Err(CoreError::Validation("user input is empty".to_string()).into());
        }
        self.validate_config()?;

        session.append(ConversationItem::user(user_text));
        self.drive(session, cancel).await
    }

    /// Reruns the rounds on the current log without adding a user turn.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::retry_with_cancel`].
    pub async fn retry(&self, session: &mut Session) -> RespondResult {
        self.retry_with_cancel(session, &CancellationToken::new())
            .await
    }

    /// Reruns the rounds on the current log without adding a user turn.
    ///
    /// Use this after a failed `respond`: the user's turn and any completed
    /// rounds are already logged, so the model picks up from there.
    ///
    /// # Errors
    ///
    /// [`CoreError::Validation`] if the log is empty or already ends with an
    /// assistant answer; otherwise the same errors as
    /// [`Orchestrator::respond_with_cancel`].
    pub async fn retry_with_cancel(
        &self,
        session: &mut Session,
        cancel: &CancellationToken,
    ) -> RespondResult {
        match session.items().last() {
            None => {
                return Err(CoreError::Validation("nothing to retry".to_string()).into());
            }
            Some(item) if item.is_assistant() => {
                return Err(
                    CoreError::Validation("last turn is already answered".to_string()).into(),
                );
            }
            Some(_) => {}
        }
        self.validate_config()?;

        info!("Retrying session {} from {} logged item(s)", session.id(), session.items().len());
        self.drive(session, cancel).await
    }

    fn validate_config(&self) -> Result<()> {
        self.client
            .config()
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))
    }

    async fn drive(&self, session: &mut Session, cancel: &CancellationToken) -> RespondResult {
        let start_time = Instant::now();
        let mut reply = Reply::default();
        let result = self.run_rounds(session, cancel, &mut reply).await;

        let outcome = match result {
            Ok(()) => {
                self.transition(session, SessionState::Done).await;
                debug!(
                    "Respond completed with {} tool round(s) ({:.2?})",
                    reply.tool_rounds,
                    start_time.elapsed()
                );
                Ok(reply)
            }
            Err(error) => {
                self.transition(session, SessionState::Failed).await;
                warn!("Respond failed: {error}");
                Err(RespondError::new(error, reply))
            }
        };
        self.transition(session, SessionState::Idle).await;

        outcome
    }

    /// Fills `reply` with what each round commits.
    async fn run_rounds(
        &self,
        session: &mut Session,
        cancel: &CancellationToken,
        reply: &mut Reply,
    ) -> Result<()> {
        let dispatcher =
            ToolDispatcher::new(session.tools().clone()).with_timeout(self.options.tool_timeout);

        loop {
            self.transition(session, SessionState::AwaitingModel).await;

            info!(
                "Executing model round ({}/{} tool rounds used)",
                reply.tool_rounds, self.options.max_tool_rounds
            );

            let request = self.build_request(session)?;
            let stored = request.store == Some(true);

            let response = tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    info!("Model request cancelled");
                    return Err(CoreError::Cancelled);
                }

                result = self.client.create_response(&request) => result?,
            };

            self.observe(&response, reply).await?;

            let calls = response.tool_calls();
            let mut round = StagedRound::new(response.id.clone(), stored);
            let mut turns = Vec::new();

            if calls.is_empty() {
                for item in &response.output {
                    if let Some(text) = item.message_text().filter(|t| !t.is_empty()) {
                        round.push_acknowledged(ConversationItem::assistant(text.clone()));
                        turns.push(text);
                    }
                }
                if turns.is_empty() {
                    warn!("Response {} produced no assistant text", response.id);
                }
                session.commit(round);
                reply.assistant_turns.extend(turns);
                return Ok(());
            }

            if reply.tool_rounds >= self.options.max_tool_rounds {
                return Err(CoreError::ToolLoopExceeded {
                    limit: self.options.max_tool_rounds,
                });
            }

            self.transition(session, SessionState::HandlingTools).await;

            // Keep the response's own order: interim text, then calls.
            for item in &response.output {
                match item {
                    OutputItem::Message { .. } => {
                        if let Some(text) = item.message_text().filter(|t| !t.is_empty()) {
                            round.push_acknowledged(ConversationItem::assistant(text.clone()));
                            turns.push(text);
                        }
                    }
                    OutputItem::FunctionCall { .. } => {
                        if let Some(call) = item.as_tool_call() {
                            round.push_acknowledged(ConversationItem::function_call_request(&call));
                        }
                    }
                    OutputItem::Unsupported { .. } => {}
                }
            }

            for call in &calls {
                self.emit(CoreEvent::ToolCallRequested(call.clone())).await;
            }

            let results = tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    info!("Tool execution cancelled");
                    return Err(CoreError::Cancelled);
                }

                results = dispatcher.dispatch_all(&calls, self.options.parallel_tool_calls) => results,
            };

            for result in results {
                self.emit(CoreEvent::ToolResult {
                    call_id: result.call_id.clone(),
                    name: result.name.clone(),
                    output: result.output.clone(),
                    success: result.success,
                })
                .await;
                round.push(result.into_item());
            }

            session.commit(round);
            reply.assistant_turns.extend(turns);
            reply.tool_rounds += 1;

            debug!(
                "Completed tool round {} with {} call(s), continuing conversation",
                reply.tool_rounds,
                calls.len()
            );
        }
    }

    fn build_request(&self, session: &Session) -> Result<ResponsesRequest> {
        let declarations = session.tools().declarations();
        let continuing = match self.options.continuation {
            ContinuationStrategy::FullHistory => None,
            ContinuationStrategy::PreviousResponse => session.anchor(),
        };

        let (items, previous_response_id) = match continuing {
            Some(anchor) => (
                session.conversation().since(anchor.acknowledged_len),
                Some(anchor.response_id.as_str()),
            ),
            None => (session.items(), None),
        };

        let store = self.options.continuation == ContinuationStrategy::PreviousResponse;

        let request = RequestBuilder::new(self.client.config(), items)
            .instructions(session.instructions())
            .tools(&declarations)
            .tool_choice(self.options.tool_choice.as_ref())
            .parallel_tool_calls(Some(self.options.parallel_tool_calls))
            .previous_response_id(previous_response_id)
            .store(Some(store))
            .omit_tools_on_continuation(self.options.omit_tools_on_continuation)
            .build()?;

        debug!(
            "Request: {} input item(s), previous_response_id={:?}",
            request.input.len(),
            request.previous_response_id
        );
        Ok(request)
    }

    /// Checks the response status and reports usage and ignored items.
    async fn observe(&self, response: &ModelResponse, reply: &mut Reply) -> Result<()> {
        reply.response_id = Some(response.id.clone());

        if let Some(usage) = response.usage {
            reply.usage.accumulate(&usage);
            self.emit(CoreEvent::Usage(usage)).await;
        }

        for item in &response.output {
            if let OutputItem::Unsupported { .. } = item {
                let item_type = item.item_type().to_string();
                warn!("Ignoring unsupported output item of type '{item_type}'");
                self.emit(CoreEvent::UnsupportedItem { item_type }).await;
            }
        }

        match response.status {
            ResponseStatus::Completed => {}
            ResponseStatus::Failed => {
                return Err(CoreError::Api(ApiError::new(format!(
                    "response {} failed",
                    response.id
                ))));
            }
            ResponseStatus::Incomplete => warn!(
                "Response {} is incomplete: {}",
                response.id,
                response.incomplete_reason.as_deref().unwrap_or("unknown reason")
            ),
            status @ (ResponseStatus::InProgress
            | ResponseStatus::Queued
            | ResponseStatus::Cancelled) => {
                return Err(CoreError::Transport(ClientError::InvalidResponse(format!(
                    "response {} ended in non-terminal status {status:?}",
                    response.id
                ))));
            }
        }

        if response.output.is_empty() {
            warn!("Response {} has no output items", response.id);
        }

        Ok(())
    }

    async fn transition(&self, session: &mut Session, to: SessionState) {
        let from = session.set_state(to);
        if from != to {
            debug!("Session {}: {from} -> {to}", session.id());
            self.emit(CoreEvent::StateChanged { from, to }).await;
        }
    }

    async fn emit(&self, event: CoreEvent) {
        if let Some(callback) = &self.event_callback {
            callback(event).await;
        }
    }
}


#[cfg(test)]
mod proptests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;

    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::testing::{ScriptedClient, function_call, message, response};
    use switchback_tools::ToolRegistry;

    /// One scripted model turn. `Calls` flags which calls hit a known tool.
    #[derive(Debug, Clone)]
    enum Turn {
        Answer,
        Calls(Vec<bool>),
        Failure,
    }

    fn turn() -> impl Strategy<Value = Turn> {
        prop_oneof![
            Just(Turn::Answer),
            prop::collection::vec(any::<bool>(), 1..4).prop_map(Turn::Calls),
            Just(Turn::Failure),
        ]
    }

    fn script(turns: &[Turn]) -> ScriptedClient {
        let mut client = ScriptedClient::new();
        for (i, turn) in turns.iter().enumerate() {
            client = match turn {
                Turn::Answer => client.queue(response(&format!("resp_{i}"), vec![message("ok")])),
                Turn::Calls(known) => {
                    let calls = known
                        .iter()
                        .enumerate()
                        .map(|(j, known)| {
                            let name = if *known { "echo" } else { "missing" };
                            function_call(&format!("call_{i}_{j}"), name, "{}")
                        })
                        .collect();
                    client.queue(response(&format!("resp_{i}"), calls))
                }
                Turn::Failure => client.queue_error(ClientError::Api(ApiError::new("boom"))),
            };
        }
        client
    }

    proptest! {
        #[test]
        fn log_is_append_only_and_calls_are_answered(
            turns in prop::collection::vec(turn(), 1..12),
            inputs in 1usize..5,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            let registry = ToolRegistry::new();
            registry.register_function("echo", "Echo", json!({}), |_: serde_json::Value| async {
                Ok("echo".to_string())
            });
            let orchestrator = Orchestrator::new(script(&turns))
                .with_options(OrchestratorOptions::builder().max_tool_rounds(3).build());
            let mut session = Session::new().with_tools(registry);

            for n in 0..inputs {
                let before = session.items().to_vec();
                let _ = runtime.block_on(orchestrator.respond(&mut session, &format!("input {n}")));
                prop_assert!(session.items().len() > before.len());
                prop_assert_eq!(&session.items()[..before.len()], before.as_slice());
            }

            // Every request has exactly one result, after it.
            let mut requested: HashMap<&str, usize> = HashMap::new();
            let mut answered: HashMap<&str, usize> = HashMap::new();
            for (index, item) in session.items().iter().enumerate() {
                match item {
                    ConversationItem::FunctionCallRequest { call_id, .. } => {
                        prop_assert!(requested.insert(call_id, index).is_none());
                    }
                    ConversationItem::FunctionCallResult { call_id, .. } => {
                        prop_assert!(answered.insert(call_id, index).is_none());
                    }
                    _ => {}
                }
            }
            prop_assert_eq!(requested.len(), answered.len());
            for (call_id, request_index) in &requested {
                let result_index = answered.get(call_id).copied();
                prop_assert!(result_index.is_some_and(|i| i > *request_index));
            }
        }
    }
}
