//! # switchback-common
//!
//! Shared data model for tool-calling LLM sessions.
//!
//! This crate provides the types every other switchback crate speaks:
//! - Conversation items and the append-only conversation log
//! - Tool declarations and model-issued tool calls
//! - Decoded model responses with typed output items
//! - Client configuration
//!
//! ## Example
//!
//! ```
//! use switchback_common::{Conversation, ConversationItem, Parameters, Property, ToolDeclaration};
//!
//! let mut conversation = Conversation::new();
//! conversation.push(ConversationItem::user("What's the weather in Lisbon?"));
//!
//! let weather = ToolDeclaration::builder()
//!     .name("get_weather")
//!     .description("Retrieves current weather for the given location.")
//!     .parameters(
//!         Parameters::empty()
//!             .with_property("latitude", Property::number("Latitude of the location"), true)
//!             .with_property("longitude", Property::number("Longitude of the location"), true),
//!     )
//!     .build();
//!
//! assert_eq!(weather.required_arguments(), vec!["latitude", "longitude"]);
//! ```

/// Conversation items and the append-only log.
pub mod chat;
/// Client configuration, retry policy and usage accounting.
pub mod client;
/// Decoded model responses.
pub mod response;
/// Tool declarations and tool calls.
pub mod tools;

pub use chat::{Conversation, ConversationItem, MessageRole};
pub use client::{Config, DEFAULT_BASE_URL, RetryConfig, ToolChoice, Usage};
pub use response::{ContentPart, ModelResponse, OutputItem, ResponseStatus};
pub use tools::{Parameters, Property, ToolCall, ToolDeclaration};
