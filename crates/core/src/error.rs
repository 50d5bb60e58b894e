use crate::auth::AuthError;
use crate::gateway::GatewayError;
use crate::transcript::StoreError;

/// Errors surfaced to whoever drives an interview. None of them is fatal: each one
/// belongs to a single user action that can simply be retried.
#[derive(Debug, thiserror::Error)]
pub enum InterviewError {
    /// Bad or missing user input. Raised before any network call.
    #[error("{0}")]
    Validation(String),
    /// The action is not possible in the current state (nothing to save, not signed in).
    #[error("{0}")]
    Precondition(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Another mutating call is still waiting on the model for this session.
    #[error("the previous answer is still being processed")]
    Busy,
}

impl From<GatewayError> for InterviewError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Configuration(msg) => InterviewError::Configuration(msg),
            GatewayError::Upstream { status, message } => {
                InterviewError::Upstream { status, message }
            }
            GatewayError::EmptyConversation => {
                InterviewError::Validation("conversation has no turns".to_string())
            }
            other => InterviewError::Transport(other.to_string()),
        }
    }
}

impl From<StoreError> for InterviewError {
    fn from(err: StoreError) -> Self {
        InterviewError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InterviewError>;
