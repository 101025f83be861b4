//! Request assembly for the Responses API.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use typed_builder::TypedBuilder;

use switchback_common::chat::ConversationItem;
use switchback_common::client::{Config, ToolChoice};
use switchback_common::tools::ToolDeclaration;

use super::{InputItem, ResponsesTool, ResponsesToolChoice, to_wire_conversation};
use crate::error::ClientError;

/// Request body for `POST /responses`.
///
/// Every optional field is omitted from the payload when unset.
#[derive(Debug, Clone, PartialEq, Serialize, TypedBuilder)]
pub struct ResponsesRequest {
    /// Model identifier.
    #[builder(setter(into))]
    pub model: String,
    /// Input items for the conversation.
    pub input: Vec<InputItem>,
    /// Instructions for the model (system prompt).
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Tools available for the model.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ResponsesTool>>,
    /// Tool selection strategy.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ResponsesToolChoice>,
    /// Whether the model may emit several calls in one response.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    /// Maximum output tokens to generate.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Maximum tool calls per response.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tool_calls: Option<u32>,
    /// Sampling temperature (0.0-2.0).
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling threshold (0.0-1.0).
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Whether to store the response server-side.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<bool>,
    /// Previous response id for stateful continuation.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
    /// Truncation strategy.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<String>,
    /// End-user identifier.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Request metadata.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl ResponsesRequest {
    /// Encodes the request as a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (a tool schema holding a
    /// non-finite number, for instance).
    pub fn to_payload(&self) -> Result<Vec<u8>, ClientError> {
        serde_json::to_vec(self).map_err(ClientError::Serialization)
    }

    /// Returns `true` if this request continues a stored response.
    #[must_use]
    pub const fn is_continuation(&self) -> bool {
        self.previous_response_id.is_some()
    }
}

/// Assembles a [`ResponsesRequest`] from session state and model parameters.
///
/// # Example
///
/// ```
/// use switchback_client::responses::RequestBuilder;
/// use switchback_common::{Config, ConversationItem};
///
/// let config = Config::new("gpt-4.1-nano");
/// let items = vec![ConversationItem::user("Hello")];
///
/// let request = RequestBuilder::new(&config, &items)
///     .instructions(Some("Be brief."))
///     .build()
///     .unwrap();
/// assert_eq!(request.input.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct RequestBuilder<'a> {
    config: &'a Config,
    items: &'a [ConversationItem],
    instructions: Option<&'a str>,
    tools: &'a [ToolDeclaration],
    tool_choice: Option<&'a ToolChoice>,
    parallel_tool_calls: Option<bool>,
    previous_response_id: Option<&'a str>,
    store: Option<bool>,
    omit_tools_on_continuation: bool,
}

impl<'a> RequestBuilder<'a> {
    /// Starts a request carrying `items` as input.
    #[must_use]
    pub const fn new(config: &'a Config, items: &'a [ConversationItem]) -> Self {
        Self {
            config,
            items,
            instructions: None,
            tools: &[],
            tool_choice: None,
            parallel_tool_calls: None,
            previous_response_id: None,
            store: None,
            omit_tools_on_continuation: false,
        }
    }

    /// Sets the system instructions.
    #[must_use]
    pub const fn instructions(mut self, instructions: Option<&'a str>) -> Self {
        self.instructions = instructions;
        self
    }

    /// Declares the tools the model may call.
    #[must_use]
    pub const fn tools(mut self, tools: &'a [ToolDeclaration]) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the tool selection strategy.
    #[must_use]
    pub const fn tool_choice(mut self, tool_choice: Option<&'a ToolChoice>) -> Self {
        self.tool_choice = tool_choice;
        self
    }

    /// Allows or forbids several calls per response.
    #[must_use]
    pub const fn parallel_tool_calls(mut self, parallel: Option<bool>) -> Self {
        self.parallel_tool_calls = parallel;
        self
    }

    /// Continues from a stored response instead of resending history.
    #[must_use]
    pub const fn previous_response_id(mut self, id: Option<&'a str>) -> Self {
        self.previous_response_id = id;
        self
    }

    /// Asks the server to store (or not store) the response.
    #[must_use]
    pub const fn store(mut self, store: Option<bool>) -> Self {
        self.store = store;
        self
    }

    /// Drops tool declarations on continuation requests, relying on the
    /// server-side copy attached to the previous response.
    #[must_use]
    pub const fn omit_tools_on_continuation(mut self, omit: bool) -> Self {
        self.omit_tools_on_continuation = omit;
        self
    }

    /// Validates the inputs and builds the request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidRequest`] if:
    /// - there is no input and no `previous_response_id`
    /// - `temperature` or `top_p` is out of range, or the model is empty
    /// - two tools share a name, or a tool name is empty
    pub fn build(self) -> Result<ResponsesRequest, ClientError> {
        if self.items.is_empty() && self.previous_response_id.is_none() {
            return Err(ClientError::InvalidRequest(
                "input is empty and no previous_response_id was supplied".to_string(),
            ));
        }

        self.config
            .validate()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;

        let mut seen = HashSet::new();
        for tool in self.tools {
            if tool.name.is_empty() {
                return Err(ClientError::InvalidRequest(
                    "tool name must not be empty".to_string(),
                ));
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(ClientError::InvalidRequest(format!(
                    "duplicate tool name '{}'",
                    tool.name
                )));
            }
        }

        let omit_tools = self.omit_tools_on_continuation && self.previous_response_id.is_some();
        let tools = (!self.tools.is_empty() && !omit_tools)
            .then(|| self.tools.iter().map(ResponsesTool::from).collect::<Vec<_>>());

        // Without tools the choice and parallelism flags are meaningless.
        let (tool_choice, parallel_tool_calls) = if tools.is_some() || omit_tools {
            (
                self.tool_choice.map(ResponsesToolChoice::from),
                self.parallel_tool_calls,
            )
        } else {
            (None, None)
        };

        let metadata = (!self.config.metadata.is_empty()).then(|| self.config.metadata.clone());

        Ok(ResponsesRequest::builder()
            .model(self.config.model.clone())
            .input(to_wire_conversation(self.items))
            .instructions(self.instructions.map(str::to_owned))
            .tools(tools)
            .tool_choice(tool_choice)
            .parallel_tool_calls(parallel_tool_calls)
            .max_output_tokens(self.config.max_output_tokens)
            .max_tool_calls(self.config.max_tool_calls)
            .temperature(self.config.temperature)
            .top_p(self.config.top_p)
            .store(self.store)
            .previous_response_id(self.previous_response_id.map(str::to_owned))
            .truncation(self.config.truncation.clone())
            .user(self.config.user.clone())
            .metadata(metadata)
            .build())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use serde_json::json;

    fn weather_tool() -> ToolDeclaration {
        ToolDeclaration::builder()
            .name("get_weather")
            .description("Retrieves current weather for the given location.")
            .parameters(json!({"type": "object", "properties": {}}))
            .build()
    }

    #[test]
    fn test_minimal_payload_omits_unset_fields() {
        let config = Config::new("gpt-4o");
        let items = vec![ConversationItem::user("Hello")];
        let request = RequestBuilder::new(&config, &items).build().unwrap();

        let value: serde_json::Value = serde_json::from_slice(&request.to_payload().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-4o",
                "input": [{"type": "message", "role": "user", "content": "Hello"}]
            })
        );
    }

    #[test]
    fn test_full_payload_uses_wire_names() {
        let config = Config::new("gpt-4o")
            .with_temperature(0.5)
            .with_top_p(0.9)
            .with_max_output_tokens(256)
            .with_max_tool_calls(4)
            .with_user("user-1")
            .with_metadata("app", "switchback");
        let items = vec![ConversationItem::user("Hello")];
        let tools = vec![weather_tool()];
        let choice = ToolChoice::Required;

        let request = RequestBuilder::new(&config, &items)
            .instructions(Some("Be brief."))
            .tools(&tools)
            .tool_choice(Some(&choice))
            .parallel_tool_calls(Some(false))
            .store(Some(false))
            .build()
            .unwrap();

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["instructions"], "Be brief.");
        assert_eq!(value["max_output_tokens"], 256);
        assert_eq!(value["max_tool_calls"], 4);
        assert_eq!(value["parallel_tool_calls"], false);
        assert_eq!(value["tool_choice"], "required");
        assert_eq!(value["store"], false);
        assert_eq!(value["user"], "user-1");
        assert_eq!(value["metadata"]["app"], "switchback");
        assert_eq!(value["tools"][0]["name"], "get_weather");
        assert!(value.get("previous_response_id").is_none());
    }

    #[test]
    fn test_empty_input_without_previous_response_fails() {
        let config = Config::new("gpt-4o");
        let result = RequestBuilder::new(&config, &[]).build();
        assert!(matches!(result, Err(ClientError::InvalidRequest(_))));
    }

    #[test]
    fn test_empty_input_with_previous_response_is_allowed() {
        let config = Config::new("gpt-4o");
        let request = RequestBuilder::new(&config, &[])
            .previous_response_id(Some("resp_1"))
            .build()
            .unwrap();
        assert!(request.is_continuation());
        assert!(request.input.is_empty());
    }

    #[test]
    fn test_out_of_range_temperature_fails() {
        let config = Config::new("gpt-4o").with_temperature(3.5);
        let items = vec![ConversationItem::user("Hello")];
        let result = RequestBuilder::new(&config, &items).build();
        assert!(matches!(result, Err(ClientError::InvalidRequest(_))));
    }

    #[test]
    fn test_duplicate_tool_names_fail() {
        let config = Config::new("gpt-4o");
        let items = vec![ConversationItem::user("Hello")];
        let tools = vec![weather_tool(), weather_tool()];
        let result = RequestBuilder::new(&config, &items).tools(&tools).build();
        assert!(matches!(result, Err(ClientError::InvalidRequest(msg)) if msg.contains("get_weather")));
    }

    #[test]
    fn test_tools_omitted_on_continuation_when_requested() {
        let config = Config::new("gpt-4o");
        let items = vec![ConversationItem::function_call_result("call_1", "19°C")];
        let tools = vec![weather_tool()];

        let request = RequestBuilder::new(&config, &items)
            .tools(&tools)
            .previous_response_id(Some("resp_1"))
            .omit_tools_on_continuation(true)
            .build()
            .unwrap();
        assert!(request.tools.is_none());
        assert_eq!(request.previous_response_id.as_deref(), Some("resp_1"));

        // Without a previous response there is nothing to continue from.
        let request = RequestBuilder::new(&config, &items)
            .tools(&tools)
            .omit_tools_on_continuation(true)
            .build()
            .unwrap();
        assert_eq!(request.tools.map(|t| t.len()), Some(1));
    }

    #[test]
    fn test_tool_choice_dropped_without_tools() {
        let config = Config::new("gpt-4o");
        let items = vec![ConversationItem::user("Hello")];
        let choice = ToolChoice::Required;
        let request = RequestBuilder::new(&config, &items)
            .tool_choice(Some(&choice))
            .parallel_tool_calls(Some(true))
            .build()
            .unwrap();
        assert!(request.tool_choice.is_none());
        assert!(request.parallel_tool_calls.is_none());
    }
}
