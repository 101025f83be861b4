//! `OpenAI` Responses API wire types.
//!
//! This module maps the in-memory conversation model onto the Responses API
//! schema and back:
//! - [`to_wire_conversation`] projects conversation items into `input` items
//! - [`RequestBuilder`] assembles a [`ResponsesRequest`]
//! - [`parse_response`] / [`from_wire_response`] decode replies into
//!   [`ModelResponse`](switchback_common::ModelResponse)

use serde::Serialize;

use switchback_common::chat::{ConversationItem, MessageRole};
use switchback_common::client::ToolChoice;
use switchback_common::tools::ToolDeclaration;

pub mod client;
pub mod parser;
pub mod request;

pub use self::client::ResponsesClient;
pub use parser::{from_wire_response, parse_response};
pub use request::{RequestBuilder, ResponsesRequest};

// ============================================================================
// Input Item Types
// ============================================================================

/// Input items that can be sent to the Responses API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    /// A message in the conversation.
    Message {
        /// Role of the message author.
        role: MessageRole,
        /// Text content of the message.
        content: String,
    },
    /// A function call made by the assistant.
    FunctionCall {
        /// Correlation id for this function call.
        call_id: String,
        /// Name of the function to call.
        name: String,
        /// Arguments as a JSON string.
        arguments: String,
    },
    /// Output from a function call.
    FunctionCallOutput {
        /// Id of the function call this is responding to.
        call_id: String,
        /// Output from the function.
        output: String,
    },
}

/// Projects conversation items into wire input items, preserving order.
///
/// Assistant turns emit their message first (skipped when the text is empty),
/// then one `function_call` item per attached call.
#[must_use]
pub fn to_wire_conversation(items: &[ConversationItem]) -> Vec<InputItem> {
    let mut input = Vec::with_capacity(items.len());

    for item in items {
        match item {
            ConversationItem::UserMessage { role, text } => {
                input.push(InputItem::Message {
                    role: *role,
                    content: text.clone(),
                });
            }
            ConversationItem::AssistantMessage {
                role,
                text,
                tool_calls,
            } => {
                if !text.is_empty() {
                    input.push(InputItem::Message {
                        role: *role,
                        content: text.clone(),
                    });
                }
                for call in tool_calls {
                    input.push(InputItem::FunctionCall {
                        call_id: call.call_id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments_json().to_owned(),
                    });
                }
            }
            ConversationItem::FunctionCallRequest {
                call_id,
                name,
                arguments,
            } => {
                input.push(InputItem::FunctionCall {
                    call_id: call_id.clone(),
                    name: name.clone(),
                    arguments: if arguments.trim().is_empty() {
                        "{}".to_string()
                    } else {
                        arguments.clone()
                    },
                });
            }
            ConversationItem::FunctionCallResult { call_id, output } => {
                input.push(InputItem::FunctionCallOutput {
                    call_id: call_id.clone(),
                    output: output.clone(),
                });
            }
        }
    }

    input
}

// ============================================================================
// Tool Types
// ============================================================================

/// A tool definition for the Responses API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesTool {
    /// A function tool.
    Function {
        /// The function definition.
        #[serde(flatten)]
        function: FunctionDefinition,
    },
}

/// Definition of a function tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionDefinition {
    /// Name of the function.
    pub name: String,
    /// Description of what the function does.
    pub description: String,
    /// JSON Schema for the function parameters.
    pub parameters: serde_json::Value,
    /// Whether generated arguments must match the schema exactly.
    pub strict: bool,
}

impl From<&ToolDeclaration> for ResponsesTool {
    fn from(tool: &ToolDeclaration) -> Self {
        Self::Function {
            function: FunctionDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
                strict: tool.strict,
            },
        }
    }
}

/// Tool choice configuration for the Responses API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponsesToolChoice {
    /// String-based choice (auto, none, required).
    Mode(String),
    /// Force a specific function.
    Function {
        /// Type, always "function".
        #[serde(rename = "type")]
        choice_type: String,
        /// Name of the function to call.
        name: String,
    },
}

impl From<&ToolChoice> for ResponsesToolChoice {
    fn from(choice: &ToolChoice) -> Self {
        match choice {
            ToolChoice::Auto => Self::Mode("auto".to_string()),
            ToolChoice::None => Self::Mode("none".to_string()),
            ToolChoice::Required => Self::Mode("required".to_string()),
            ToolChoice::Function { name } => Self::Function {
                choice_type: "function".to_string(),
                name: name.clone(),
            },
        }
    }
}
