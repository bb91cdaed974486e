use crate::error::DataError;
use url::Url;

/// Path of the Server-Sent Events push endpoint.
pub const PUSH_PATH: &str = "/api/sse";

/// Normalise a user supplied server address: surrounding whitespace and
/// trailing slashes are removed.
///
/// Two addresses that normalise to the same string refer to the same subscription.
pub fn normalize_server_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

/// Validate a normalised server address and join `path` onto it.
pub fn endpoint(server: &str, path: &str) -> Result<Url, DataError> {
    let base = normalize_server_url(server);
    if base.is_empty() {
        return Err(DataError::InvalidUrl("empty server url".to_string()));
    }

    let url = Url::parse(&format!("{base}{path}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(DataError::InvalidUrl(format!(
            "unsupported scheme {scheme}"
        ))),
    }
}

/// Full address of the push stream for a server.
pub fn push_url(server: &str) -> Result<Url, DataError> {
    endpoint(server, PUSH_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_server_url() {
        struct TestCase {
            input: &'static str,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: already normalised
                input: "http://localhost:8080",
                expected: "http://localhost:8080",
            },
            TestCase {
                // TC1: trailing slashes
                input: "http://localhost:8080//",
                expected: "http://localhost:8080",
            },
            TestCase {
                // TC2: whitespace
                input: "  https://pivot.example.com/ \n",
                expected: "https://pivot.example.com",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = normalize_server_url(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_push_url() {
        let url = push_url("http://127.0.0.1:8080/").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/api/sse");

        assert!(matches!(push_url("  "), Err(DataError::InvalidUrl(_))));
        assert!(matches!(
            push_url("ws://127.0.0.1:9001"),
            Err(DataError::InvalidUrl(_))
        ));
    }
}
