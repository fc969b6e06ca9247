//! Error types for the request pipeline

/// Errors surfaced to callers of [`crate::ApiClient`].
///
/// Only `AuthExpired` means the session is over; UI code uses
/// [`Error::is_auth_expired`] to send the user back to login.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection attempt itself failed (DNS, connect, reset).
    #[error("transport failure: {0}")]
    Transport(String),

    /// 401/403 on an authenticated call with no usable refreshed token.
    #[error("session expired ({status}): {message}")]
    AuthExpired { status: u16, message: String },

    /// Any other non-2xx response.
    #[error("{message}")]
    RequestRejected { status: u16, message: String },

    /// An upload response could not be decoded.
    #[error("upload response could not be decoded: {0}")]
    UploadDecode(String),

    /// A 2xx response did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("session storage error: {0}")]
    Storage(#[from] session::Error),
}

impl Error {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Error::AuthExpired { .. })
    }

    /// HTTP status behind the error, when there was a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::AuthExpired { status, .. } | Error::RequestRejected { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_displays_server_message_verbatim() {
        let err = Error::RequestRejected {
            status: 400,
            message: "title must not be empty".into(),
        };
        assert_eq!(err.to_string(), "title must not be empty");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn only_auth_expired_reports_session_end() {
        let expired = Error::AuthExpired {
            status: 401,
            message: "Unauthorized".into(),
        };
        assert!(expired.is_auth_expired());
        assert!(!Error::Transport("connection refused".into()).is_auth_expired());
        assert!(
            !Error::RequestRejected {
                status: 403,
                message: "forbidden".into()
            }
            .is_auth_expired()
        );
    }

    #[test]
    fn upload_decode_is_distinct_from_rejection() {
        let err = Error::UploadDecode("expected value at line 1".into());
        assert!(err.to_string().starts_with("upload response could not be decoded"));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn storage_errors_convert() {
        let err: Error = session::Error::Io("disk full".into()).into();
        assert!(matches!(err, Error::Storage(_)));
    }
}
