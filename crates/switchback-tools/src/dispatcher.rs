//! Dispatch of model-issued tool calls to registered handlers.
//!
//! Every dispatched call yields exactly one [`FunctionCallResult`] carrying the
//! call's `call_id`. Failures become result text the model can read instead of
//! errors that escape the conversation loop.

use std::time::Duration;

use futures::future::join_all;
use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;

use switchback_common::chat::ConversationItem;
use switchback_common::tools::ToolCall;

use crate::ToolRegistry;

/// Why a tool call could not produce a normal result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No handler is registered under the call's name.
    #[error("unknown tool")]
    UnknownTool { name: String },

    /// The arguments are not valid JSON or were rejected by the handler.
    #[error("malformed arguments: {reason}")]
    MalformedArguments { name: String, reason: String },

    /// The handler ran and failed.
    #[error("{message}")]
    Handler { name: String, message: String },

    /// The handler did not finish within the dispatcher's timeout.
    #[error("tool timed out after {}s", .timeout.as_secs_f64())]
    TimedOut { name: String, timeout: Duration },
}

impl DispatchError {
    /// Name of the tool the failed call referred to.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        match self {
            Self::UnknownTool { name }
            | Self::MalformedArguments { name, .. }
            | Self::Handler { name, .. }
            | Self::TimedOut { name, .. } => name,
        }
    }

    /// The text fed back to the model in place of a result.
    #[must_use]
    pub fn output_text(&self) -> String {
        format!("error: {self}")
    }

    /// Converts the error into the result for `call_id`.
    #[must_use]
    pub fn into_result(self, call_id: impl Into<String>) -> FunctionCallResult {
        FunctionCallResult {
            call_id: call_id.into(),
            name: self.tool_name().to_string(),
            output: self.output_text(),
            success: false,
        }
    }
}

/// Outcome of one dispatched call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCallResult {
    /// Correlation id of the originating call.
    pub call_id: String,
    /// Tool name of the originating call.
    pub name: String,
    /// Result text, or `error: ...` when the call failed.
    pub output: String,
    /// Whether the handler produced a normal result.
    pub success: bool,
}

impl FunctionCallResult {
    /// The conversation item recording this result.
    #[must_use]
    pub fn into_item(self) -> ConversationItem {
        ConversationItem::function_call_result(self.call_id, self.output)
    }
}

/// Resolves tool calls against a [`ToolRegistry`] and runs them.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: ToolRegistry,
    timeout: Option<Duration>,
}

impl ToolDispatcher {
    #[must_use]
    pub const fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Bounds each handler invocation.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Runs one call.
    ///
    /// Empty argument text is treated as `{}`.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] if the tool is unknown, the arguments are
    /// malformed, the handler fails, or the handler times out.
    pub async fn dispatch(&self, call: &ToolCall) -> Result<FunctionCallResult, DispatchError> {
        let handler = self
            .registry
            .resolve(call)
            .ok_or_else(|| DispatchError::UnknownTool {
                name: call.name.clone(),
            })?;

        let args: Value = serde_json::from_str(call.arguments_json()).map_err(|e| {
            DispatchError::MalformedArguments {
                name: call.name.clone(),
                reason: e.to_string(),
            }
        })?;

        handler
            .validate_arguments(&args)
            .map_err(|reason| DispatchError::MalformedArguments {
                name: call.name.clone(),
                reason,
            })?;

        debug!(
            "Dispatching tool '{}' (call_id {}) with {args}",
            call.name, call.call_id
        );

        let execution = handler.execute(&args);
        let outcome = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, execution)
                .await
                .map_err(|_| DispatchError::TimedOut {
                    name: call.name.clone(),
                    timeout,
                })?,
            None => execution.await,
        };

        let output = outcome.map_err(|e| DispatchError::Handler {
            name: call.name.clone(),
            message: format!("{e:#}"),
        })?;

        Ok(FunctionCallResult {
            call_id: call.call_id.clone(),
            name: call.name.clone(),
            output,
            success: true,
        })
    }

    /// Runs one call, converting any failure into an `error: ...` result.
    pub async fn dispatch_to_result(&self, call: &ToolCall) -> FunctionCallResult {
        match self.dispatch(call).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Tool call {} ('{}') failed: {e}", call.call_id, call.name);
                e.into_result(call.call_id.clone())
            }
        }
    }

    /// Runs every call of one response and returns results in call order.
    ///
    /// With `parallel`, handlers run concurrently; ordering of the returned
    /// results is unaffected.
    pub async fn dispatch_all(&self, calls: &[ToolCall], parallel: bool) -> Vec<FunctionCallResult> {
        if parallel {
            join_all(calls.iter().map(|call| self.dispatch_to_result(call))).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.dispatch_to_result(call).await);
            }
            results
        }
    }
}


#[cfg(test)]
mod proptests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn pure_registry() -> ToolRegistry {
        let registry = ToolRegistry::new();
        registry.register_function(
            "shout",
            "Upper-cases text",
            json!({"type": "object", "required": ["text"]}),
            |args: Value| async move {
                Ok(args["text"].as_str().unwrap_or_default().to_uppercase())
            },
        );
        registry
    }

    proptest! {
        #[test]
        fn dispatch_is_idempotent_for_pure_handlers(
            name in prop::sample::select(vec!["shout", "missing"]),
            arguments in prop_oneof![
                "\\PC{0,20}",
                "[a-z ]{0,20}".prop_map(|t| json!({"text": t}).to_string()),
            ],
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let dispatcher = ToolDispatcher::new(pure_registry());
            let call = ToolCall::new("call_1", name, arguments);

            let first = runtime.block_on(dispatcher.dispatch_to_result(&call));
            let second = runtime.block_on(dispatcher.dispatch_to_result(&call));
            prop_assert_eq!(first, second);
        }
    }
}
