use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("message is {len} characters long, the limit is {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("a message is already being sent")]
    SendInFlight,

    #[error("chat session is not active")]
    SessionClosed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("answering service responded with status {status}")]
    Status {
        status: u16,
        conversation_id: Option<String>,
    },

    #[error("malformed reply payload: {0}")]
    MalformedPayload(String),

    #[error("fallback response unavailable: {0}")]
    Fallback(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ChatError {
    /// True for failures rejected before any state change.
    pub fn is_input_rejection(&self) -> bool {
        matches!(
            self,
            ChatError::EmptyMessage
                | ChatError::MessageTooLong { .. }
                | ChatError::SendInFlight
                | ChatError::SessionClosed
        )
    }

    /// Conversation id the server issued alongside a failed exchange, if any.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            ChatError::Status {
                conversation_id, ..
            } => conversation_id.as_deref(),
            _ => None,
        }
    }
}
