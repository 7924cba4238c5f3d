//! Error types shared by every XRPC call

use bytes::Bytes;

/// Transport-level errors that occur during HTTP communication
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TransportError {
    /// Failed to establish connection to server
    #[error("Connection error: {0}")]
    #[diagnostic(
        code(skypost_common::transport::connect),
        help("check network connectivity and the configured service URL")
    )]
    Connect(String),

    /// Request timed out
    #[error("Request timeout")]
    #[diagnostic(code(skypost_common::transport::timeout))]
    Timeout,

    /// Request construction failed (malformed URI, headers, etc.)
    #[error("Invalid request: {0}")]
    #[diagnostic(code(skypost_common::transport::invalid_request))]
    InvalidRequest(String),

    /// Other transport error
    #[error("Transport error: {0}")]
    #[diagnostic(code(skypost_common::transport::other))]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wrap any client error that has no more specific mapping.
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<std::convert::Infallible> for TransportError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

#[cfg(feature = "reqwest-client")]
impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_builder() || e.is_request() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Other(Box::new(e))
        }
    }
}

/// HTTP error response (non-2xx status codes)
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[diagnostic(code(skypost_common::http_status))]
pub struct HttpError {
    /// HTTP status code
    pub status: http::StatusCode,
    /// Response body if available
    pub body: Option<Bytes>,
}

impl HttpError {
    /// The XRPC `error` name from a JSON error body, if the server sent one.
    pub fn xrpc_error(&self) -> Option<String> {
        let body = self.body.as_ref()?;
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        value.get("error")?.as_str().map(str::to_owned)
    }

    /// The human-readable XRPC `message` from a JSON error body, if present.
    pub fn xrpc_message(&self) -> Option<String> {
        let body = self.body.as_ref()?;
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        value.get("message")?.as_str().map(str::to_owned)
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(body) = &self.body {
            if let Ok(s) = std::str::from_utf8(body) {
                write!(f, ":\n{}", s)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xrpc_error_fields_are_read_from_json_body() {
        let err = HttpError {
            status: http::StatusCode::BAD_REQUEST,
            body: Some(Bytes::from_static(
                br#"{"error":"InvalidRequest","message":"Unable to resolve handle"}"#,
            )),
        };
        assert_eq!(err.xrpc_error().as_deref(), Some("InvalidRequest"));
        assert_eq!(
            err.xrpc_message().as_deref(),
            Some("Unable to resolve handle")
        );
    }

    #[test]
    fn non_json_body_has_no_xrpc_error() {
        let err = HttpError {
            status: http::StatusCode::BAD_GATEWAY,
            body: Some(Bytes::from_static(b"<html>bad gateway</html>")),
        };
        assert!(err.xrpc_error().is_none());
        assert!(err.to_string().starts_with("HTTP 502"));
    }
}
