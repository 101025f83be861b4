//! Typed model responses.
//!
//! A [`ModelResponse`] is the decoded form of one complete (non-streaming)
//! reply. Its output items keep the order the server produced them in.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chat::MessageRole;
use crate::client::Usage;
use crate::tools::ToolCall;

/// Lifecycle status reported for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Generation finished normally.
    Completed,
    /// Generation stopped early (token limit or content filter).
    Incomplete,
    /// Generation failed server-side.
    Failed,
    /// Still generating.
    InProgress,
    /// Accepted but not yet started.
    Queued,
    /// Cancelled server-side.
    Cancelled,
}

impl ResponseStatus {
    /// Returns `true` for `completed`, `incomplete` and `failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Incomplete | Self::Failed)
    }
}

/// One content part of an output message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Generated text.
    Text {
        /// The text.
        text: String,
        /// Citations and other annotations, kept opaque.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        annotations: Vec<serde_json::Value>,
    },
    /// The model declined to answer.
    Refusal {
        /// Explanation given by the model.
        refusal: String,
    },
}

impl ContentPart {
    /// The text or refusal message.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text { text, .. } => text,
            Self::Refusal { refusal } => refusal,
        }
    }
}

/// One item of a response's `output` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    /// An assistant message.
    Message {
        /// Author role, always assistant.
        role: MessageRole,
        /// Content parts in order.
        content: Vec<ContentPart>,
    },
    /// A request to run a function.
    FunctionCall {
        /// Output item id.
        id: String,
        /// Correlation id for the result.
        call_id: String,
        /// Function name.
        name: String,
        /// Arguments as JSON text.
        arguments: String,
    },
    /// An item type this crate does not model, preserved verbatim.
    Unsupported {
        /// The raw item.
        raw: serde_json::Value,
    },
}

impl OutputItem {
    /// The wire `type` discriminator of this item.
    #[must_use]
    pub fn item_type(&self) -> &str {
        match self {
            Self::Message { .. } => "message",
            Self::FunctionCall { .. } => "function_call",
            Self::Unsupported { raw } => raw
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown"),
        }
    }

    /// Converts a function-call item into a [`ToolCall`].
    #[must_use]
    pub fn as_tool_call(&self) -> Option<ToolCall> {
        match self {
            Self::FunctionCall {
                id,
                call_id,
                name,
                arguments,
            } => Some(ToolCall {
                id: id.clone(),
                call_id: call_id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            }),
            _ => None,
        }
    }

    /// Joins a message's content parts with newlines.
    #[must_use]
    pub fn message_text(&self) -> Option<String> {
        match self {
            Self::Message { content, .. } => Some(
                content
                    .iter()
                    .map(ContentPart::as_str)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => None,
        }
    }
}

/// A decoded model response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelResponse {
    /// Response id, usable as `previous_response_id`.
    pub id: String,
    /// Model that produced the response.
    pub model: String,
    /// When the response was created.
    pub created_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: ResponseStatus,
    /// Output items, in server order.
    pub output: Vec<OutputItem>,
    /// Token usage, when reported.
    pub usage: Option<Usage>,
    /// Why generation stopped early, for `incomplete` responses.
    pub incomplete_reason: Option<String>,
}

impl ModelResponse {
    /// Function calls in arrival order.
    #[must_use]
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.output.iter().filter_map(OutputItem::as_tool_call).collect()
    }

    /// Returns `true` if any output item is a function call.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        self.output
            .iter()
            .any(|item| matches!(item, OutputItem::FunctionCall { .. }))
    }

    /// Text of every message item, in order.
    #[must_use]
    pub fn message_texts(&self) -> Vec<String> {
        self.output.iter().filter_map(OutputItem::message_text).collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn response(output: Vec<OutputItem>) -> ModelResponse {
        ModelResponse {
            id: "resp_1".to_string(),
            model: "gpt-4o".to_string(),
            created_at: Utc::now(),
            status: ResponseStatus::Completed,
            output,
            usage: None,
            incomplete_reason: None,
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ResponseStatus::Completed.is_terminal());
        assert!(ResponseStatus::Incomplete.is_terminal());
        assert!(ResponseStatus::Failed.is_terminal());
        assert!(!ResponseStatus::InProgress.is_terminal());
        assert!(!ResponseStatus::Queued.is_terminal());
    }

    #[test]
    fn test_message_text_joins_parts_including_refusal() {
        let item = OutputItem::Message {
            role: MessageRole::Assistant,
            content: vec![
                ContentPart::Text {
                    text: "first".to_string(),
                    annotations: vec![],
                },
                ContentPart::Refusal {
                    refusal: "can't do that".to_string(),
                },
            ],
        };
        assert_eq!(item.message_text().unwrap(), "first\ncan't do that");
        assert!(item.as_tool_call().is_none());
    }

    #[test]
    fn test_tool_calls_keep_order() {
        let resp = response(vec![
            OutputItem::FunctionCall {
                id: "fc_1".to_string(),
                call_id: "call_a".to_string(),
                name: "a".to_string(),
                arguments: "{}".to_string(),
            },
            OutputItem::Unsupported {
                raw: json!({"type": "reasoning"}),
            },
            OutputItem::FunctionCall {
                id: "fc_2".to_string(),
                call_id: "call_b".to_string(),
                name: "b".to_string(),
                arguments: "{}".to_string(),
            },
        ]);

        assert!(resp.has_tool_calls());
        let ids: Vec<_> = resp.tool_calls().into_iter().map(|c| c.call_id).collect();
        assert_eq!(ids, vec!["call_a", "call_b"]);
        assert_eq!(resp.output[1].item_type(), "reasoning");
        assert!(resp.message_texts().is_empty());
    }
}
