//! # switchback-client
//!
//! Client library for the `OpenAI` Responses API.
//!
//! This crate turns conversation state into wire requests and wire replies
//! into typed [`ModelResponse`]s:
//! - [`RequestBuilder`] assembles a [`ResponsesRequest`]
//! - [`parse_response`] decodes a status and body, surfacing server errors
//!   found in any response
//! - [`ResponsesClient`] sends requests over a pluggable [`Transport`]
//!
//! ## Example
//!
//! ```no_run
//! use switchback_client::{ModelClient, RequestBuilder, ResponsesClient};
//! use switchback_common::{Config, ConversationItem};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::new("gpt-4.1-nano").with_api_key("your-api-key");
//! let client = ResponsesClient::new(config.clone())?;
//!
//! let items = vec![ConversationItem::user("Hello, world!")];
//! let request = RequestBuilder::new(&config, &items).build()?;
//!
//! let response = client.create_response(&request).await?;
//! println!("Response: {:?}", response.message_texts());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use switchback_common::{Config, ModelResponse};

pub mod error;
pub mod responses;
pub mod transport;

pub use error::{ApiError, ClientError};
pub use responses::{
    RequestBuilder, ResponsesClient, ResponsesRequest, from_wire_response, parse_response,
    to_wire_conversation,
};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

/// A model endpoint that answers one request with one complete response.
///
/// Implementations must be thread-safe (Send + Sync).
#[must_use = "ModelClient must be used to make requests"]
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Get the client's configuration.
    ///
    /// The request builder reads model and generation parameters from here.
    fn config(&self) -> &Config;

    /// Submit a request and wait for the complete response.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request cannot be serialized
    /// - Network communication fails
    /// - The API reports an error, in any status
    /// - The response cannot be parsed
    async fn create_response(&self, request: &ResponsesRequest)
    -> Result<ModelResponse, ClientError>;
}

#[async_trait]
impl<C: ModelClient + ?Sized> ModelClient for std::sync::Arc<C> {
    fn config(&self) -> &Config {
        (**self).config()
    }

    async fn create_response(
        &self,
        request: &ResponsesRequest,
    ) -> Result<ModelResponse, ClientError> {
        (**self).create_response(request).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::Arc;
    use switchback_common::{ConversationItem, ResponseStatus};

    struct EchoClient {
        config: Config,
    }

    #[async_trait]
    impl ModelClient for EchoClient {
        fn config(&self) -> &Config {
            &self.config
        }

        async fn create_response(
            &self,
            request: &ResponsesRequest,
        ) -> Result<ModelResponse, ClientError> {
            Ok(ModelResponse {
                id: format!("resp_{}", request.input.len()),
                model: request.model.clone(),
                created_at: chrono::Utc::now(),
                status: ResponseStatus::Completed,
                output: Vec::new(),
                usage: None,
                incomplete_reason: None,
            })
        }
    }

    #[tokio::test]
    async fn test_arc_client_delegates() {
        let client: Arc<dyn ModelClient> = Arc::new(EchoClient {
            config: Config::new("mock-model"),
        });
        let items = vec![ConversationItem::user("hi")];
        let request = RequestBuilder::new(client.config(), &items).build().unwrap();

        let response = client.create_response(&request).await.unwrap();
        assert_eq!(response.id, "resp_1");
        assert_eq!(response.model, "mock-model");
    }
}
