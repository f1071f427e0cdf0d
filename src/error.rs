use thiserror::Error;

/// Errors surfaced by the interview core.
///
/// The taxonomy mirrors how faults are recovered: permission problems degrade
/// the capture mode locally, network problems are retryable, validation
/// problems never reach the network at all.
#[derive(Debug, Error)]
pub enum Error {
    /// Camera or microphone access was denied or the device is unavailable.
    /// Never fatal for the session: audio loss degrades to manual-transcript
    /// input, video loss aborts the recording attempt only.
    #[error("device permission denied: {0}")]
    Permission(String),

    /// A relay call to the remote evaluator failed. The current question and
    /// stage are left unchanged so the caller can retry.
    #[error("evaluator request failed: {0}")]
    Network(String),

    /// Client-side rejection before any network call (empty answer, empty
    /// resume text).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The owning session was torn down while this operation was in flight.
    #[error("operation cancelled: {0}")]
    Cancelled(&'static str),

    /// A capture-pipeline fault that is neither a permission problem nor a
    /// cancellation (encoder failure, device stream gone mid-recording).
    #[error("capture failed: {0}")]
    Capture(String),

    /// Local i/o failure (report save).
    #[error("i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller may retry the same operation without changing state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_retryable() {
        assert!(Error::Network("timeout".into()).is_retryable());
        assert!(!Error::Validation("empty answer".into()).is_retryable());
        assert!(!Error::Cancelled("reset").is_retryable());
    }
}
