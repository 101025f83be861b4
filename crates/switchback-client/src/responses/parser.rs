//! Decoding of complete (non-streaming) Responses API replies.

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use switchback_common::chat::MessageRole;
use switchback_common::client::Usage;
use switchback_common::response::{ContentPart, ModelResponse, OutputItem, ResponseStatus};

use crate::error::{ApiError, ClientError, ErrorDetail};

/// Top-level response object as it arrives on the wire.
#[derive(Debug, Deserialize)]
struct WireResponse {
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    created_at: Option<f64>,
    #[serde(default = "default_status")]
    status: ResponseStatus,
    #[serde(default)]
    output: Vec<Value>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    incomplete_details: Option<IncompleteDetails>,
}

const fn default_status() -> ResponseStatus {
    ResponseStatus::Completed
}

#[derive(Debug, Deserialize)]
struct IncompleteDetails {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
    #[serde(default)]
    input_tokens_details: Option<InputTokensDetails>,
    #[serde(default)]
    output_tokens_details: Option<OutputTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct InputTokensDetails {
    #[serde(default)]
    cached_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OutputTokensDetails {
    #[serde(default)]
    reasoning_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(usage: WireUsage) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens,
            cached_tokens: usage.input_tokens_details.map_or(0, |d| d.cached_tokens),
            reasoning_tokens: usage.output_tokens_details.map_or(0, |d| d.reasoning_tokens),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default = "default_role")]
    role: MessageRole,
    #[serde(default)]
    content: Vec<Value>,
}

const fn default_role() -> MessageRole {
    MessageRole::Assistant
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    #[serde(default)]
    id: String,
    call_id: String,
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Decodes an HTTP status and body into a [`ModelResponse`].
///
/// A top-level `error` object always yields [`ClientError::Api`], whatever the
/// status code; the API reports some failures inside a 200 body.
///
/// # Errors
///
/// - [`ClientError::Api`] for a server-reported error, a non-2xx status, or a
///   `failed` response
/// - [`ClientError::Serialization`] if a 2xx body is not JSON
/// - [`ClientError::InvalidResponse`] if a known output item is malformed
pub fn parse_response(status: u16, body: &[u8]) -> Result<ModelResponse, ClientError> {
    let success = (200..300).contains(&status);

    let payload: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) if success => return Err(ClientError::Serialization(e)),
        Err(_) => {
            return Err(ApiError::from_status(status, &String::from_utf8_lossy(body)).into());
        }
    };

    if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
        let detail: ErrorDetail = serde_json::from_value(error.clone()).unwrap_or_else(|e| {
            debug!("Unrecognized error object shape: {e}");
            ErrorDetail {
                message: Some(error.to_string()),
                ..ErrorDetail::default()
            }
        });
        return Err(ApiError::from_detail(detail, status).into());
    }

    if !success {
        return Err(ApiError::from_status(status, &String::from_utf8_lossy(body)).into());
    }

    let response = from_wire_response(&payload)?;

    if response.status == ResponseStatus::Failed {
        let message = response
            .incomplete_reason
            .clone()
            .unwrap_or_else(|| "response failed".to_string());
        return Err(ApiError {
            status: Some(status),
            ..ApiError::new(message)
        }
        .into());
    }

    Ok(response)
}

/// Decodes a response object into a [`ModelResponse`], preserving output order.
///
/// Output items with an unrecognized `type` are kept as
/// [`OutputItem::Unsupported`] rather than rejected.
///
/// # Errors
///
/// Returns [`ClientError::InvalidResponse`] if the object lacks an `id` or a
/// `message`/`function_call` item is missing required fields.
pub fn from_wire_response(payload: &Value) -> Result<ModelResponse, ClientError> {
    let wire: WireResponse = serde_json::from_value(payload.clone())
        .map_err(|e| ClientError::InvalidResponse(format!("malformed response object: {e}")))?;

    let output = wire
        .output
        .into_iter()
        .map(decode_output_item)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ModelResponse {
        id: wire.id,
        model: wire.model,
        created_at: wire.created_at.map_or_else(Utc::now, timestamp_to_datetime),
        status: wire.status,
        output,
        usage: wire.usage.map(Usage::from),
        incomplete_reason: wire.incomplete_details.and_then(|d| d.reason),
    })
}

#[allow(clippy::cast_possible_truncation)]
fn timestamp_to_datetime(secs: f64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs as i64, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn decode_output_item(raw: Value) -> Result<OutputItem, ClientError> {
    match raw.get("type").and_then(Value::as_str) {
        Some("message") => {
            let message: WireMessage = serde_json::from_value(raw)
                .map_err(|e| ClientError::InvalidResponse(format!("malformed message item: {e}")))?;
            let content = message
                .content
                .into_iter()
                .filter_map(decode_content_part)
                .collect();
            Ok(OutputItem::Message {
                role: message.role,
                content,
            })
        }
        Some("function_call") => {
            let call: WireFunctionCall = serde_json::from_value(raw).map_err(|e| {
                ClientError::InvalidResponse(format!("malformed function_call item: {e}"))
            })?;
            Ok(OutputItem::FunctionCall {
                id: call.id,
                call_id: call.call_id,
                name: call.name,
                arguments: call.arguments,
            })
        }
        other => {
            warn!("Preserving unsupported output item type {other:?}");
            Ok(OutputItem::Unsupported { raw })
        }
    }
}

fn decode_content_part(part: Value) -> Option<ContentPart> {
    match part.get("type").and_then(Value::as_str) {
        Some("output_text") => Some(ContentPart::Text {
            text: part
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            annotations: part
                .get("annotations")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        }),
        Some("refusal") => Some(ContentPart::Refusal {
            refusal: part
                .get("refusal")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        other => {
            debug!("Skipping content part of type {other:?}");
            None
        }
    }
}


#[cfg(test)]
mod proptests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::responses::{InputItem, to_wire_conversation};
    use proptest::prelude::*;
    use serde_json::json;
    use switchback_common::chat::ConversationItem;

    /// Builds a server echo of the wire input: every input message becomes an
    /// output message with the same role and text.
    fn echo(input: &[InputItem]) -> Value {
        let output: Vec<Value> = input
            .iter()
            .filter_map(|item| match item {
                InputItem::Message { role, content } => Some(json!({
                    "type": "message",
                    "role": role,
                    "content": [{"type": "output_text", "text": content}]
                })),
                _ => None,
            })
            .collect();
        json!({"id": "resp_echo", "status": "completed", "output": output})
    }

    proptest! {
        #[test]
        fn wire_roundtrip_preserves_role_and_text(
            turns in prop::collection::vec((any::<bool>(), "\\PC{1,40}"), 1..8)
        ) {
            let items: Vec<ConversationItem> = turns
                .iter()
                .map(|(is_user, text)| {
                    if *is_user {
                        ConversationItem::user(text.as_str())
                    } else {
                        ConversationItem::assistant(text.as_str())
                    }
                })
                .collect();

            let response = from_wire_response(&echo(&to_wire_conversation(&items))).unwrap();
            prop_assert_eq!(response.output.len(), items.len());

            for (item, output) in items.iter().zip(&response.output) {
                let OutputItem::Message { role, .. } = output else {
                    return Err(TestCaseError::fail("expected message"));
                };
                let expected_role = if item.is_assistant() {
                    MessageRole::Assistant
                } else {
                    MessageRole::User
                };
                prop_assert_eq!(*role, expected_role);
                let message_text = output.message_text().unwrap();
                prop_assert_eq!(message_text.as_str(), item.text().unwrap());
            }
        }
    }
}
