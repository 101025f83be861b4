//! # switchback
//!
//! Tool-call orchestration over the OpenAI Responses API.
//!
//! A [`Session`] holds an append-only conversation log and a tool registry.
//! The [`Orchestrator`] sends the user's turn, runs any function calls the
//! model asks for, feeds the results back, and repeats until the model
//! answers in text.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use serde_json::json;
//! use switchback::{Config, Orchestrator, ResponsesClient, Session, ToolRegistry};
//!
//! #[derive(Deserialize)]
//! struct EchoArgs {
//!     text: String,
//! }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::new("gpt-4o").with_api_key("sk-...");
//! let orchestrator = Orchestrator::new(ResponsesClient::new(config)?);
//!
//! let tools = ToolRegistry::new();
//! tools.register_function(
//!     "echo",
//!     "Echo the given text",
//!     json!({
//!         "type": "object",
//!         "properties": {"text": {"type": "string"}},
//!         "required": ["text"]
//!     }),
//!     |args: EchoArgs| async move { Ok(args.text) },
//! );
//!
//! let mut session = Session::new().with_tools(tools);
//! let reply = orchestrator.respond(&mut session, "Echo 'hi'").await?;
//! println!("{}", reply.final_text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod session;

#[cfg(test)]
mod testing;

pub use switchback_client::*;
pub use switchback_common::*;
pub use switchback_tools::*;

pub use error::{CoreError, RespondError, RespondResult, Result};
pub use events::{CoreEvent, EventCallback};
pub use orchestrator::{
    ContinuationStrategy, DEFAULT_MAX_TOOL_ROUNDS, Orchestrator, OrchestratorOptions, Reply,
};
pub use session::{ContinuationAnchor, Session, SessionSnapshot, SessionState, SharedSession};
