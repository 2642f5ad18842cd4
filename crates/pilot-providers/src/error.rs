use std::time::Duration;
use thiserror::Error;

/// Failure of a decision call. Fatal to that call and never retried here.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request exception: {0}")]
    Network(String),

    #[error("Request timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("Response body is not JSON: {0}")]
    Decode(String),
}

impl TransportError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(timeout)
        } else {
            TransportError::Network(err.to_string())
        }
    }

    /// HTTP status code, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_carries_status_and_text() {
        let err = TransportError::Http {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn test_timeout_message() {
        let err = TransportError::Timeout(Duration::from_secs(300));
        assert_eq!(err.to_string(), "Request timed out after 300 seconds");
        assert_eq!(err.status(), None);
    }
}
