// MIT License - Copyright (c) Nick Whyte
// Rust translation

/// All errors that can occur in the nessclient library.
#[derive(Debug, thiserror::Error)]
pub enum NessError {
    #[error("Malformed frame: {details}")]
    Format { details: String },

    #[error("Unknown command: 0x{0:02x}")]
    UnknownCommand(u8),

    #[error("Unknown event type: 0x{0:02x}")]
    UnknownEventType(u8),

    #[error("Unknown request id: 0x{0:02x}")]
    UnknownRequestId(u8),

    #[error("Connection failed: {0}")]
    Connection(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {details}")]
    InvalidArgument { details: String },

    #[error("Command timeout: {command}")]
    CommandTimeout { command: String },

    #[error("Unexpected response: {details}")]
    UnexpectedResponse { details: String },

    #[error("Client closed")]
    Closed,
}

impl NessError {
    pub(crate) fn format(details: impl Into<String>) -> Self {
        NessError::Format {
            details: details.into(),
        }
    }

    /// Whether this error came from decoding a line received from the panel.
    ///
    /// The receive loop logs and discards lines failing with one of these.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            NessError::Format { .. }
                | NessError::UnknownCommand(_)
                | NessError::UnknownEventType(_)
                | NessError::UnknownRequestId(_)
        )
    }

    /// Whether this error is transient and the connection should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NessError::Connection(_) | NessError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, NessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_classification() {
        assert!(NessError::format("short").is_decode_error());
        assert!(NessError::UnknownCommand(0x70).is_decode_error());
        assert!(NessError::UnknownEventType(0x40).is_decode_error());
        assert!(NessError::UnknownRequestId(0x40).is_decode_error());
        assert!(!NessError::Closed.is_decode_error());
    }

    #[test]
    fn test_retryable() {
        let refused = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert!(NessError::Connection(refused).is_retryable());
        assert!(!NessError::CommandTimeout { command: "S14".into() }.is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(NessError::UnknownCommand(0x70).to_string(), "Unknown command: 0x70");
        assert_eq!(
            NessError::CommandTimeout { command: "S14".into() }.to_string(),
            "Command timeout: S14"
        );
    }
}
