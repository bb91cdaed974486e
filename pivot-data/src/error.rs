use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `pivot-data`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP error status {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("failed to decode {context}: {error}")]
    Decode { context: String, error: String },

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("stream read timeout: no data received for {0} seconds")]
    Timeout(u64),

    #[error("push stream ended by server")]
    StreamEnded,
}

impl DataError {
    /// Determine if an error ends the current push subscription and requires a reconnect.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            DataError::Timeout(_) | DataError::StreamEnded => true,
            DataError::Socket(error_msg) => {
                let error_lower = error_msg.to_lowercase();
                error_lower.contains("closed")
                    || error_lower.contains("reset")
                    || error_lower.contains("eof")
                    || error_lower.contains("broken pipe")
            }
            DataError::Status { status, .. } => *status >= 400,
            _ => false,
        }
    }

    pub fn decode(context: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Decode {
            context: context.into(),
            error: error.to_string(),
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Http(format!("timeout: {value}"))
        } else if value.is_body() || value.is_request() {
            Self::Socket(value.to_string())
        } else {
            Self::Http(value.to_string())
        }
    }
}

impl From<url::ParseError> for DataError {
    fn from(value: url::ParseError) -> Self {
        Self::InvalidUrl(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_is_terminal() {
        struct TestCase {
            input: DataError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: idle timeout ends the subscription
                input: DataError::Timeout(45),
                expected: true,
            },
            TestCase {
                // TC1: server closed the event stream
                input: DataError::StreamEnded,
                expected: true,
            },
            TestCase {
                // TC2: socket error mentioning a closed connection
                input: DataError::Socket("connection closed before message completed".to_string()),
                expected: true,
            },
            TestCase {
                // TC3: socket error mentioning a reset
                input: DataError::Socket("Connection reset by peer (os error 104)".to_string()),
                expected: true,
            },
            TestCase {
                // TC4: non-success status on the subscription request
                input: DataError::Status {
                    endpoint: "/api/sse".to_string(),
                    status: 503,
                },
                expected: true,
            },
            TestCase {
                // TC5: malformed payloads never end the subscription
                input: DataError::decode("signal event", "missing field `id`"),
                expected: false,
            },
            TestCase {
                // TC6: invalid url is a configuration problem
                input: DataError::InvalidUrl("relative URL without a base".to_string()),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_terminal();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_decode_error_display() {
        let error = DataError::decode("ticker batch", "expected value at line 1");
        assert_eq!(
            error.to_string(),
            "failed to decode ticker batch: expected value at line 1"
        );
    }
}
