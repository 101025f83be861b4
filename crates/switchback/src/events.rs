//! Event types for orchestration
//!
//! The orchestrator emits events while it drives a session so that callers can
//! render progress, record tool activity, or track token usage.
//!
//! Events are **observability**: one-way notifications about what is happening.
//! The orchestrator awaits the callback (so it may do async I/O) but never
//! reacts to it.

use std::future::Future;
use std::pin::Pin;

use switchback_common::client::Usage;
use switchback_common::tools::ToolCall;

use crate::session::SessionState;

/// Events emitted by the orchestrator during a `respond` call
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// The session moved between states
    StateChanged {
        from: SessionState,
        to: SessionState,
    },

    /// The model asked for a tool call; emitted before dispatch
    ToolCallRequested(ToolCall),

    /// Tool execution completed with result
    ToolResult {
        /// Correlation id of the call
        call_id: String,
        /// Name of the tool that was called
        name: String,
        /// Result or error text fed back to the model
        output: String,
        /// Whether execution succeeded
        success: bool,
    },

    /// Token usage information from one model response
    Usage(Usage),

    /// An output item type the orchestrator ignores
    UnsupportedItem { item_type: String },
}

/// Async callback for receiving orchestrator events
///
/// Returns `()` because events are notifications, not control flow decisions.
pub type EventCallback =
    Box<dyn Fn(CoreEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;
