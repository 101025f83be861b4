use thiserror::Error;

use switchback_client::{ApiError, ClientError};

use crate::orchestrator::Reply;

#[derive(Error, Debug)]
pub enum CoreError {
    /// The request was rejected before it was sent; the session is unchanged.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No usable response was obtained. Retrying is up to the caller.
    #[error("Transport error: {0}")]
    Transport(#[source] ClientError),

    /// The server reported an error.
    #[error("API error: {0}")]
    Api(ApiError),

    #[error("Tool loop exceeded: model kept calling tools after {limit} rounds")]
    ToolLoopExceeded { limit: u32 },

    #[error("Cancelled")]
    Cancelled,

    /// Another `respond` call holds the session.
    #[error("Session busy: a round is already in flight")]
    SessionBusy,
}

impl From<ClientError> for CoreError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Api(api) => Self::Api(api),
            ClientError::InvalidRequest(message) => Self::Validation(message),
            other => Self::Transport(other),
        }
    }
}

impl CoreError {
    /// Returns `true` if repeating the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Api(api) => api.is_transient(),
            Self::SessionBusy => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// A failed `respond` call, with what it had logged before failing.
///
/// `partial` holds the assistant turns and tool rounds committed to the log
/// before `error` hit; they stay in the log.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct RespondError {
    pub error: CoreError,
    pub partial: Reply,
}

impl RespondError {
    #[must_use]
    pub const fn new(error: CoreError, partial: Reply) -> Self {
        Self { error, partial }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }

    #[must_use]
    pub fn into_error(self) -> CoreError {
        self.error
    }
}

impl From<CoreError> for RespondError {
    fn from(error: CoreError) -> Self {
        Self::new(error, Reply::default())
    }
}

impl From<RespondError> for CoreError {
    fn from(error: RespondError) -> Self {
        error.error
    }
}

/// Outcome of a `respond` or `retry` call.
pub type RespondResult = std::result::Result<Reply, RespondError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_mapping() {
        let api = ApiError::new("invalid_api_key");
        assert!(matches!(
            CoreError::from(ClientError::Api(api.clone())),
            CoreError::Api(e) if e == api
        ));
        assert!(matches!(
            CoreError::from(ClientError::InvalidRequest("empty".to_string())),
            CoreError::Validation(_)
        ));
        assert!(matches!(
            CoreError::from(ClientError::Timeout),
            CoreError::Transport(ClientError::Timeout)
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(CoreError::from(ClientError::Timeout).is_retryable());
        assert!(!CoreError::ToolLoopExceeded { limit: 5 }.is_retryable());
        assert!(!CoreError::Cancelled.is_retryable());
        assert!(CoreError::SessionBusy.is_retryable());
    }

    #[test]
    fn test_respond_error_keeps_partial_reply() {
        let partial = Reply {
            assistant_turns: vec!["Let me check.".to_string()],
            tool_rounds: 1,
            ..Reply::default()
        };
        let err = RespondError::new(CoreError::from(ClientError::Timeout), partial);

        assert_eq!(err.to_string(), "Transport error: Timeout error");
        assert!(err.is_retryable());
        assert_eq!(err.partial.final_text(), Some("Let me check."));
        assert!(matches!(err.into_error(), CoreError::Transport(_)));

        let bare = RespondError::from(CoreError::Cancelled);
        assert!(bare.partial.assistant_turns.is_empty());
    }
}
