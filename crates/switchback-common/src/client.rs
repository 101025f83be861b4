use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Default endpoint root for the Responses API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Controls how the model selects which tool to call, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// Let the model decide whether to call a tool.
    #[default]
    Auto,
    /// Disable tool calling for this request.
    None,
    /// Require at least one tool call.
    Required,
    /// Force a specific function by name.
    ///
    /// ```
    /// use switchback_common::ToolChoice;
    ///
    /// let choice = ToolChoice::Function {
    ///     name: "get_weather".to_string(),
    /// };
    /// ```
    Function {
        /// The name of the function to call.
        name: String,
    },
}

impl fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::None => write!(f, "none"),
            Self::Required => write!(f, "required"),
            Self::Function { name } => write!(f, "{name}"),
        }
    }
}

/// Configuration for exponential backoff retry behavior.
///
/// Retries happen at the transport layer for transient HTTP failures only.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use switchback_common::client::RetryConfig;
///
/// let config = RetryConfig {
///     max_retries: 5,
///     initial_delay: Duration::from_millis(500),
///     max_delay: Duration::from_secs(60),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts before failing.
    pub max_retries: u32,
    /// Initial delay before the first retry attempt.
    pub initial_delay: Duration,
    /// Maximum delay between retry attempts (caps exponential growth).
    pub max_delay: Duration,
}

impl RetryConfig {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Token usage statistics for one model response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the request input.
    pub input_tokens: u32,
    /// Tokens generated.
    pub output_tokens: u32,
    /// Total tokens used (input + output).
    pub total_tokens: u32,
    /// Input tokens served from the prompt cache.
    #[serde(default)]
    pub cached_tokens: u32,
    /// Output tokens spent on hidden reasoning.
    #[serde(default)]
    pub reasoning_tokens: u32,
}

impl Usage {
    /// Adds another response's usage to this one.
    pub const fn accumulate(&mut self, other: &Self) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
        self.cached_tokens = self.cached_tokens.saturating_add(other.cached_tokens);
        self.reasoning_tokens = self.reasoning_tokens.saturating_add(other.reasoning_tokens);
    }
}

/// Immutable client-wide model and account configuration.
///
/// The API key is stored as a `SecretString` and never serialized; `Debug`
/// output shows it redacted.
///
/// # Examples
///
/// ```
/// use switchback_common::Config;
///
/// let config = Config::new("gpt-4.1-nano")
///     .with_api_key("sk-...")
///     .with_temperature(0.7)
///     .with_max_output_tokens(1000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The model identifier.
    pub model: String,
    /// Endpoint root; requests go to `{base_url}/responses`.
    pub base_url: Option<String>,
    /// API key for bearer authentication.
    #[serde(skip_serializing, default)]
    pub api_key: Option<SecretString>,
    /// Organization identifier, sent as `OpenAI-Organization`.
    pub organization: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: Option<u64>,
    /// Transport retry policy.
    #[serde(skip)]
    pub retry_config: RetryConfig,
    /// Sampling temperature (0.0 to 2.0).
    pub temperature: Option<f32>,
    /// Nucleus sampling threshold (0.0 to 1.0).
    pub top_p: Option<f32>,
    /// Upper bound on generated tokens per response.
    pub max_output_tokens: Option<u32>,
    /// Upper bound on tool calls the server will emit per response.
    pub max_tool_calls: Option<u32>,
    /// Truncation strategy (`auto` or `disabled`).
    pub truncation: Option<String>,
    /// Stable end-user identifier forwarded to the provider.
    pub user: Option<String>,
    /// Metadata attached to every request.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "gpt-4.1-nano".to_string(),
            base_url: None,
            api_key: None,
            organization: None,
            timeout_seconds: None,
            retry_config: RetryConfig::default(),
            temperature: None,
            top_p: None,
            max_output_tokens: None,
            max_tool_calls: None,
            truncation: None,
            user: None,
            metadata: HashMap::new(),
        }
    }
}

impl Config {
    /// Creates a configuration for the given model with all optional fields unset.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// The configured base URL, or [`DEFAULT_BASE_URL`].
    #[must_use]
    pub fn base_url_or_default(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Sets a custom base URL for API requests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the API key for authentication.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into().into()));
        self
    }

    /// Sets the organization identifier.
    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the nucleus sampling threshold.
    #[must_use]
    pub const fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Sets the maximum tokens to generate.
    #[must_use]
    pub const fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Caps the number of tool calls per response.
    #[must_use]
    pub const fn with_max_tool_calls(mut self, max_tool_calls: u32) -> Self {
        self.max_tool_calls = Some(max_tool_calls);
        self
    }

    /// Sets the end-user identifier.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Adds a metadata entry sent with every request.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the transport retry policy.
    #[must_use]
    pub const fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Validates configuration parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `model` is empty
    /// - `base_url` is not an absolute URL
    /// - `temperature` is outside 0.0 to 2.0
    /// - `top_p` is outside 0.0 to 1.0
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.model.trim().is_empty() {
            anyhow::bail!("model must not be empty");
        }

        if let Some(base_url) = &self.base_url {
            url::Url::parse(base_url)
                .map_err(|e| anyhow::anyhow!("invalid base URL '{base_url}': {e}"))?;
        }

        if let Some(temp) = self.temperature
            && !(0.0..=2.0).contains(&temp)
        {
            anyhow::bail!("Temperature must be between 0.0 and 2.0, got {temp}");
        }

        if let Some(top_p) = self.top_p
            && !(0.0..=1.0).contains(&top_p)
        {
            anyhow::bail!("top_p must be between 0.0 and 1.0, got {top_p}");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_api_key_not_serialized_or_printed() {
        let config = Config::new("gpt-4o").with_api_key("sk-secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));

        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));

        assert_eq!(config.api_key.unwrap().expose_secret(), "sk-secret");
    }

    #[test]
    fn test_base_url_default() {
        let config = Config::new("gpt-4o");
        assert_eq!(config.base_url_or_default(), DEFAULT_BASE_URL);

        let config = config.with_base_url("http://localhost:8080/v1");
        assert_eq!(config.base_url_or_default(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_validate_rejects_bad_base_url_and_model() {
        assert!(Config::new("").validate().is_err());
        assert!(
            Config::new("gpt-4o")
                .with_base_url("not a url")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_usage_accumulate() {
        let mut total = Usage::default();
        total.accumulate(&Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
            cached_tokens: 2,
            reasoning_tokens: 0,
        });
        total.accumulate(&Usage {
            input_tokens: 20,
            output_tokens: 1,
            total_tokens: 21,
            cached_tokens: 0,
            reasoning_tokens: 3,
        });
        assert_eq!(total.input_tokens, 30);
        assert_eq!(total.total_tokens, 36);
        assert_eq!(total.cached_tokens, 2);
        assert_eq!(total.reasoning_tokens, 3);
    }

    #[test]
    fn test_tool_choice_display_and_serde() {
        assert_eq!(ToolChoice::default().to_string(), "auto");
        let json = serde_json::to_string(&ToolChoice::Required).unwrap();
        assert_eq!(json, "\"required\"");
    }
}
