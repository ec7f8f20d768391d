//! Protocol errors raised while reading a request.
//!
//! A `ProtocolError` is never retried. The connection answers it with a
//! plain-text response carrying the status and message, then closes.

use std::fmt;

use crate::http::response::StatusCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    pub status: StatusCode,
    pub message: String,
}

impl ProtocolError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn http2_unsupported() -> Self {
        Self::new(
            StatusCode::HttpVersionNotSupported,
            format!("{} does not support HTTP/2.", crate::SERVER_NAME),
        )
    }

    pub fn malformed_declaration() -> Self {
        Self::new(StatusCode::BadRequest, "Malformed HTTP declaration was sent.")
    }

    pub fn malformed_header(line: &[u8]) -> Self {
        Self::new(
            StatusCode::BadRequest,
            format!(
                "Malformed HTTP header line was sent: {}",
                String::from_utf8_lossy(line)
            ),
        )
    }

    pub fn invalid_content_length() -> Self {
        Self::new(StatusCode::BadRequest, "Invalid content length provided.")
    }

    pub fn line_too_long() -> Self {
        Self::new(StatusCode::BadRequest, "HTTP line exceeds the maximum length.")
    }

    pub fn body_too_large() -> Self {
        Self::new(StatusCode::PayloadTooLarge, "Request body is too large.")
    }

    pub fn truncated_body() -> Self {
        Self::new(
            StatusCode::BadRequest,
            "Request body ended before the declared content length.",
        )
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for ProtocolError {}
