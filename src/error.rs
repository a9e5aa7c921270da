use thiserror::Error;

/// Errors returned by caption requests and catalog calls.
#[derive(Error, Debug)]
pub enum CaptionError {
    /// A precondition failed before any request was sent (missing model or prompt).
    #[error("{0}")]
    Validation(String),

    /// The request did not complete: non-2xx status or a connection failure.
    ///
    /// `message` is the backend's `detail` when it sent one, so it is shown as-is.
    #[error("{message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// A catalog endpoint answered 2xx with a body of the wrong shape.
    #[error("{0}")]
    Protocol(String),

    /// A local image could not be loaded.
    #[error("Failed to read image: {0}")]
    ImageRead(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CaptionError {
    pub(crate) fn transport(status: u16, message: impl Into<String>) -> Self {
        CaptionError::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// True for failures caught before anything reached the network.
    pub fn is_validation(&self) -> bool {
        matches!(self, CaptionError::Validation(_))
    }

    /// HTTP status of a transport failure, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            CaptionError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CaptionError>;
