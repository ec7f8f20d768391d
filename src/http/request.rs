use std::collections::HashMap;
use std::net::SocketAddr;

use crate::http::error::ProtocolError;
use crate::http::grammar::{self, Declaration};

/// A parsed HTTP request handed to the handler.
///
/// Header names are stored lowercased. A repeated header keeps only the
/// last value received.
#[derive(Debug, Clone)]
pub struct Request {
    /// Method, target and version from the request line
    pub declaration: Declaration,
    /// Headers keyed by lowercased name
    pub headers: HashMap<String, String>,
    /// Address of the peer that sent the request
    pub source: SocketAddr,
    body: Option<Vec<u8>>,
}

impl Request {
    /// Retrieves a header value by name, ignoring case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    pub fn method(&self) -> &str {
        &self.declaration.method
    }

    pub fn target(&self) -> &str {
        &self.declaration.target
    }

    /// The request body, empty when no `content-length` was sent.
    pub fn body(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }

    /// Whether a body was read for this request.
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = Some(body);
    }

    /// Parses the `content-length` header.
    ///
    /// Returns `Ok(None)` when the header is absent. Only plain ASCII digits
    /// are accepted; signs, whitespace and overflow are rejected.
    pub fn content_length(&self) -> Result<Option<usize>, ProtocolError> {
        let Some(raw) = self.header("content-length") else {
            return Ok(None);
        };

        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::invalid_content_length());
        }

        raw.parse::<usize>()
            .map(Some)
            .map_err(|_| ProtocolError::invalid_content_length())
    }

    /// Determines whether the connection should remain open after the response.
    ///
    /// Only `connection: close` ends the connection. Any other value, or no
    /// header at all, keeps it open as HTTP/1.1 does by default.
    pub fn keep_alive(&self) -> bool {
        !self
            .header("connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("close"))
    }
}

enum ParserState {
    AwaitingDeclaration,
    AwaitingHeaders(Declaration),
}

/// Accumulates one request from its lines.
///
/// Lines are passed without their CRLF terminator. The blank line that ends
/// the header section is never passed in; the caller detects it and calls
/// [`RequestParser::finish`].
pub struct RequestParser {
    source: SocketAddr,
    state: ParserState,
    headers: HashMap<String, String>,
}

impl RequestParser {
    pub fn new(source: SocketAddr) -> Self {
        Self {
            source,
            state: ParserState::AwaitingDeclaration,
            headers: HashMap::new(),
        }
    }

    /// Consumes exactly one line.
    pub fn consume(&mut self, line: &[u8]) -> Result<(), ProtocolError> {
        match &self.state {
            ParserState::AwaitingDeclaration => {
                if grammar::is_http2_preface(line) {
                    return Err(ProtocolError::http2_unsupported());
                }

                let declaration = grammar::parse_request_line(line)
                    .ok_or_else(ProtocolError::malformed_declaration)?;
                self.state = ParserState::AwaitingHeaders(declaration);
            }

            ParserState::AwaitingHeaders(_) => {
                let (name, value) = grammar::parse_header_line(line)
                    .ok_or_else(|| ProtocolError::malformed_header(line))?;
                self.headers.insert(name.to_ascii_lowercase(), value);
            }
        }

        Ok(())
    }

    pub fn is_declared(&self) -> bool {
        matches!(self.state, ParserState::AwaitingHeaders(_))
    }

    /// Returns the request, or `None` if no request line was ever consumed.
    pub fn finish(self) -> Option<Request> {
        match self.state {
            ParserState::AwaitingDeclaration => None,
            ParserState::AwaitingHeaders(declaration) => Some(Request {
                declaration,
                headers: self.headers,
                source: self.source,
                body: None,
            }),
        }
    }
}

/// Builder for constructing Request objects outside of a connection.
pub struct RequestBuilder {
    method: String,
    target: String,
    version: String,
    headers: HashMap<String, String>,
    source: SocketAddr,
    body: Option<Vec<u8>>,
}

impl RequestBuilder {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            version: "1.1".to_string(),
            headers: HashMap::new(),
            source: SocketAddr::from(([127, 0, 0, 1], 0)),
            body: None,
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    pub fn source(mut self, source: SocketAddr) -> Self {
        self.source = source;
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(self) -> Request {
        Request {
            declaration: Declaration {
                method: self.method,
                target: self.target,
                version: self.version,
            },
            headers: self.headers,
            source: self.source,
            body: self.body,
        }
    }
}
