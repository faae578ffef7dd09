/// Errors that can occur talking to the remote object store.
///
/// An object that simply does not exist is *not* an error: searches return
/// an empty id list for that. These variants are for the cases where the
/// store could not answer the question.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RemoteError {
    /// A record the caller asked for by id is gone.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The store could not be reached.
    #[error("Connection to '{endpoint}' failed")]
    ConnectionFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The store answered with a fault.
    #[error("Remote fault {code}: {message}")]
    Fault { code: String, message: String },

    /// The store answered with something we could not decode.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Login was rejected.
    #[error("Authentication failed for user '{0}'")]
    AuthenticationFailed(String),
}

impl RemoteError {
    /// Returns true if this error is transient and the operation may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::ConnectionFailed { .. })
    }

    /// Shorthand for a connection failure wrapping any error.
    pub fn connection(
        endpoint: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        RemoteError::ConnectionFailed {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed_is_transient() {
        let err = RemoteError::connection(
            "http://localhost:8069",
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        );
        assert!(err.is_transient());
        assert!(err.to_string().contains("localhost:8069"));
    }

    #[test]
    fn test_fault_not_transient() {
        let err = RemoteError::Fault {
            code: "1".to_string(),
            message: "Object res.foo doesn't exist".to_string(),
        };
        assert!(!err.is_transient());
        assert!(err.to_string().contains("res.foo"));
    }

    #[test]
    fn test_not_found_not_transient() {
        assert!(!RemoteError::NotFound("res.partner,7".to_string()).is_transient());
    }

    #[test]
    fn test_connection_error_keeps_source() {
        use std::error::Error;

        let err = RemoteError::connection("http://erp", "timed out");
        assert_eq!(err.source().unwrap().to_string(), "timed out");
    }
}
