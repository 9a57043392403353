/// Core error type for the relay.
///
/// Adapter crates map their library errors into this type so the composition root can decide
/// what is fatal (startup) and what only drops a single event.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("invalid recipient {recipient:?}: {reason}")]
    InvalidRecipient { recipient: String, reason: String },

    #[error("timeout while getting token (did you login?)")]
    InteractiveTimeout,

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn invalid_recipient(recipient: &str, reason: impl Into<String>) -> Self {
        Error::InvalidRecipient {
            recipient: recipient.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
