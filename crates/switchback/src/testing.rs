//! Scripted model client for orchestrator tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use switchback_client::{ClientError, ModelClient, ResponsesRequest};
use switchback_common::client::{Config, Usage};
use switchback_common::response::{ContentPart, ModelResponse, OutputItem, ResponseStatus};
use switchback_common::MessageRole;

/// Returns queued responses in order and records every request.
pub struct ScriptedClient {
    config: Config,
    responses: Mutex<VecDeque<Result<ModelResponse, ClientError>>>,
    requests: Mutex<Vec<ResponsesRequest>>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            config: Config::new("mock-model"),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleeps before answering each request.
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn queue(self, response: ModelResponse) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn queue_error(self, error: ClientError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<ResponsesRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn config(&self) -> &Config {
        &self.config
    }

    async fn create_response(
        &self,
        request: &ResponsesRequest,
    ) -> Result<ModelResponse, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::InvalidResponse("no scripted response".into())))
    }
}

pub fn response(id: &str, output: Vec<OutputItem>) -> ModelResponse {
    ModelResponse {
        id: id.to_string(),
        model: "mock-model".to_string(),
        created_at: Utc::now(),
        status: ResponseStatus::Completed,
        output,
        usage: Some(Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
            ..Usage::default()
        }),
        incomplete_reason: None,
    }
}

pub fn message(text: &str) -> OutputItem {
    OutputItem::Message {
        role: MessageRole::Assistant,
        content: vec![ContentPart::Text {
            text: text.to_string(),
            annotations: Vec::new(),
        }],
    }
}

pub fn function_call(call_id: &str, name: &str, arguments: &str) -> OutputItem {
    OutputItem::FunctionCall {
        id: format!("fc_{call_id}"),
        call_id: call_id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}
