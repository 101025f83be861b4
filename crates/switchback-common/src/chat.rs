//! Conversation items and the append-only conversation log.
//!
//! A [`Conversation`] is the ordered record of everything exchanged in one
//! session: user turns, assistant turns, the function calls the model asked
//! for and the results that were fed back. Order is significant, since it is
//! the exact sequence replayed to the model on every request. Items are never
//! edited or removed once appended.
//!
//! # Example
//!
//! ```
//! use switchback_common::chat::{Conversation, ConversationItem};
//! use switchback_common::tools::ToolCall;
//!
//! let mut conversation = Conversation::new();
//! conversation.push(ConversationItem::user("What's the weather in Lisbon?"));
//!
//! let call = ToolCall::new("call_1", "get_weather", r#"{"latitude":38.7,"longitude":-9.1}"#);
//! conversation.extend([
//!     ConversationItem::function_call_request(&call),
//!     ConversationItem::function_call_result("call_1", "19°C"),
//!     ConversationItem::assistant("It's 19°C in Lisbon."),
//! ]);
//!
//! assert_eq!(conversation.len(), 4);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::tools::ToolCall;

/// Author of a message turn.
///
/// Serialized in lowercase, matching the wire format.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// End-user input.
    User,
    /// Model output.
    Assistant,
    /// Instructions injected ahead of the conversation.
    System,
    /// Developer instructions; ranked above user input by the model.
    Developer,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Developer => "developer",
        };
        f.write_str(role)
    }
}

/// One entry in a conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationItem {
    /// A turn authored outside the model (normally by the user).
    UserMessage {
        /// Role presented to the model.
        role: MessageRole,
        /// The message text.
        text: String,
    },
    /// A turn produced by the model.
    AssistantMessage {
        /// Role presented to the model, always assistant.
        role: MessageRole,
        /// The message text (refusals included).
        text: String,
        /// Calls attached to this turn. Projected onto the wire as
        /// `function_call` items directly after the message.
        #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
        tool_calls: SmallVec<[ToolCall; 2]>,
    },
    /// A function call the model asked for.
    FunctionCallRequest {
        /// Correlation id shared with the matching result.
        call_id: String,
        /// Function name.
        name: String,
        /// Arguments as JSON text.
        arguments: String,
    },
    /// The output fed back to the model for a function call.
    FunctionCallResult {
        /// Correlation id of the call this answers.
        call_id: String,
        /// Result or error text.
        output: String,
    },
}

impl ConversationItem {
    /// A user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::UserMessage {
            role: MessageRole::User,
            text: text.into(),
        }
    }

    /// An assistant turn without attached calls.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::AssistantMessage {
            role: MessageRole::Assistant,
            text: text.into(),
            tool_calls: SmallVec::new(),
        }
    }

    /// Records a model-issued call.
    #[must_use]
    pub fn function_call_request(call: &ToolCall) -> Self {
        Self::FunctionCallRequest {
            call_id: call.call_id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        }
    }

    /// Records the output for a call.
    pub fn function_call_result(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::FunctionCallResult {
            call_id: call_id.into(),
            output: output.into(),
        }
    }

    /// The call id for function-call items.
    #[must_use]
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::FunctionCallRequest { call_id, .. } | Self::FunctionCallResult { call_id, .. } => {
                Some(call_id)
            }
            _ => None,
        }
    }

    /// The message text for user and assistant turns.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::UserMessage { text, .. } | Self::AssistantMessage { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Returns `true` for assistant turns.
    #[must_use]
    pub const fn is_assistant(&self) -> bool {
        matches!(self, Self::AssistantMessage { .. })
    }
}

/// The append-only log of a session.
///
/// Items cannot be removed or replaced. Callers that need all-or-nothing
/// appends stage items in a `Vec` and [`extend`](Self::extend) once the batch
/// is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier.
    pub id: Uuid,
    /// When the log was created.
    pub created_at: DateTime<Utc>,
    /// When an item was last appended.
    pub updated_at: DateTime<Utc>,
    items: Vec<ConversationItem>,
}

impl Conversation {
    /// Creates an empty log with a generated id.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        }
    }

    /// Rebuilds a log from previously recorded items.
    #[must_use]
    pub fn from_items(id: Uuid, items: Vec<ConversationItem>) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            items,
        }
    }

    /// Appends one item.
    pub fn push(&mut self, item: ConversationItem) {
        self.items.push(item);
        self.updated_at = Utc::now();
    }

    /// Appends a batch of items in order.
    pub fn extend(&mut self, items: impl IntoIterator<Item = ConversationItem>) {
        let before = self.items.len();
        self.items.extend(items);
        if self.items.len() != before {
            self.updated_at = Utc::now();
        }
    }

    /// All items, oldest first.
    #[must_use]
    pub fn items(&self) -> &[ConversationItem] {
        &self.items
    }

    /// Items appended at or after `index`.
    #[must_use]
    pub fn since(&self, index: usize) -> &[ConversationItem] {
        self.items.get(index..).unwrap_or_default()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_constructors() {
        let user = ConversationItem::user("Hello");
        assert_eq!(user.text(), Some("Hello"));
        assert!(user.call_id().is_none());
        assert!(!user.is_assistant());

        let assistant = ConversationItem::assistant("Hi there");
        assert!(assistant.is_assistant());

        let call = ToolCall::new("call_9", "get_weather", "{}");
        let request = ConversationItem::function_call_request(&call);
        assert_eq!(request.call_id(), Some("call_9"));
        assert!(request.text().is_none());
    }

    #[test]
    fn test_item_serialization_shape() {
        let item = ConversationItem::function_call_result("call_1", "19°C");
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({"kind": "function_call_result", "call_id": "call_1", "output": "19°C"})
        );

        let item = ConversationItem::assistant("done");
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({"kind": "assistant_message", "role": "assistant", "text": "done"})
        );
    }

    #[test]
    fn test_conversation_push_and_since() {
        let mut conv = Conversation::new();
        assert!(conv.is_empty());

        conv.push(ConversationItem::user("one"));
        conv.extend([ConversationItem::assistant("two"), ConversationItem::user("three")]);

        assert_eq!(conv.len(), 3);
        assert_eq!(conv.since(1).len(), 2);
        assert_eq!(conv.since(1)[0].text(), Some("two"));
        assert!(conv.since(3).is_empty());
        assert!(conv.since(10).is_empty());
    }

    #[test]
    fn test_conversation_roundtrip() {
        let mut conv = Conversation::new();
        conv.push(ConversationItem::user("hi"));
        let json = serde_json::to_string(&conv).unwrap();
        let back: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, conv);
    }
}
