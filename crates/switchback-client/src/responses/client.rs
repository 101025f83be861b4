//! Responses API client implementation.
//!
//! This module provides a client for the `OpenAI` Responses API
//! (`POST {base_url}/responses`), generic over the byte [`Transport`].

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error};
use secrecy::{ExposeSecret, SecretString};

use switchback_common::client::Config;
use switchback_common::response::ModelResponse;

use super::{ResponsesRequest, parse_response};
use crate::ModelClient;
use crate::error::ClientError;
use crate::transport::{HttpRequest, ReqwestTransport, Transport};

/// Client for the `OpenAI` Responses API.
///
/// Stateless between calls: every request carries its own input, and the
/// configuration is immutable once the client is built.
#[derive(Clone)]
pub struct ResponsesClient<T: Transport = ReqwestTransport> {
    /// Byte transport.
    transport: T,
    /// API key for authentication.
    api_key: Arc<SecretString>,
    /// Full endpoint URL.
    endpoint: String,
    /// Client configuration.
    config: Arc<Config>,
}

impl<T: Transport> std::fmt::Debug for ResponsesClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponsesClient")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ResponsesClient<ReqwestTransport> {
    /// Create a new Responses API client from configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Client configuration including API key
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing, the base URL is invalid, or
    /// HTTP client creation fails.
    pub fn new(config: Config) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new(&config)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> ResponsesClient<T> {
    /// Create a client that sends through a caller-supplied transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the base URL is invalid.
    pub fn with_transport(config: Config, transport: T) -> Result<Self, ClientError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ClientError::Configuration("API key is required".to_string()))?;

        let endpoint = format!(
            "{}/responses",
            config.base_url_or_default().trim_end_matches('/')
        );
        url::Url::parse(&endpoint)
            .map_err(|e| ClientError::Configuration(format!("Invalid URL '{endpoint}': {e}")))?;

        Ok(Self {
            transport,
            api_key: Arc::new(api_key),
            endpoint,
            config: Arc::new(config),
        })
    }

    /// The URL requests are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn http_request(&self, payload: Vec<u8>) -> HttpRequest {
        let mut request = HttpRequest::post_json(&self.endpoint, payload).with_header(
            "Authorization",
            format!("Bearer {}", self.api_key.expose_secret()),
        );
        if let Some(organization) = &self.config.organization {
            request = request.with_header("OpenAI-Organization", organization);
        }
        request
    }
}

#[async_trait]
impl<T: Transport> ModelClient for ResponsesClient<T> {
    fn config(&self) -> &Config {
        &self.config
    }

    async fn create_response(
        &self,
        request: &ResponsesRequest,
    ) -> Result<ModelResponse, ClientError> {
        let payload = request.to_payload()?;
        debug!("Request payload: {}", String::from_utf8_lossy(&payload));

        let response = self.transport.send(self.http_request(payload)).await?;
        debug!(
            "Raw API response ({}): {}",
            response.status,
            String::from_utf8_lossy(&response.body)
        );

        parse_response(response.status, &response.body).inspect_err(|e| {
            if let ClientError::Api(api) = e {
                error!(
                    "API request failed with status {}: {}",
                    api.status.unwrap_or(response.status),
                    api.message
                );
            }
        })
    }
}
