//! Line grammar for HTTP/1.1 request lines and header lines.
//!
//! Every rule is an anchored match over raw bytes: a line either matches a
//! rule completely or it is rejected. Nothing is partially parsed.
//!
//! ```text
//! token          = 1*( "!" / "#" / "$" / "%" / "&" / "'" / "*" / "+" / "-" / "."
//!                     / "^" / "_" / "`" / "|" / "~" / DIGIT / ALPHA )
//! request-target = "/" *( pchar / "/" ) [ "?" *query-char ]
//! version        = 1*DIGIT [ "." 1*DIGIT ]
//! request-line   = token SP request-target SP "HTTP/" version
//! header-line    = token ":" *WS field-value *WS
//! ```

/// The HTTP/2 connection preface line, rejected before any other matching.
pub const HTTP2_PREFACE: &[u8] = b"PRI * HTTP/2.0";

/// Method, target and version from a request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Request method token (e.g. "GET"), case preserved
    pub method: String,
    /// Origin-form target including any query (e.g. "/search?q=rust")
    pub target: String,
    /// Version digits after "HTTP/" (e.g. "1.1")
    pub version: String,
}

impl Declaration {
    /// The target without its query component.
    pub fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map(|(path, _)| path)
            .unwrap_or(&self.target)
    }

    /// The query component, if the target carried one.
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }
}

pub fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

pub fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"-._~".contains(&b)
}

pub fn is_sub_delim(b: u8) -> bool {
    b"!$&'()*+,;=".contains(&b)
}

pub fn is_pchar(b: u8) -> bool {
    is_unreserved(b) || is_sub_delim(b) || b":@%".contains(&b)
}

pub fn is_query_char(b: u8) -> bool {
    is_pchar(b) || b == b'/' || b == b'?'
}

/// Printable ASCII, 0x20 through 0x7E.
pub fn is_field_vchar(b: u8) -> bool {
    (0x20..=0x7e).contains(&b)
}

fn is_ws(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Cursor over a single line.
struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn is_done(&self) -> bool {
        self.pos == self.input.len()
    }

    /// Consumes zero or more bytes in the class.
    fn many(&mut self, class: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(&class) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    /// Consumes one or more bytes in the class.
    fn many1(&mut self, class: impl Fn(u8) -> bool) -> Option<&'a [u8]> {
        let taken = self.many(class);
        (!taken.is_empty()).then_some(taken)
    }

    fn byte(&mut self, expected: u8) -> Option<()> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    fn one(&mut self, class: impl Fn(u8) -> bool) -> Option<()> {
        match self.peek() {
            Some(b) if class(b) => {
                self.pos += 1;
                Some(())
            }
            _ => None,
        }
    }

    fn literal(&mut self, expected: &[u8]) -> Option<()> {
        if self.input[self.pos..].starts_with(expected) {
            self.pos += expected.len();
            Some(())
        } else {
            None
        }
    }

    fn request_target(&mut self) -> Option<&'a [u8]> {
        let start = self.pos;
        self.byte(b'/')?;
        self.many(|b| is_pchar(b) || b == b'/');
        if self.byte(b'?').is_some() {
            self.many(is_query_char);
        }
        Some(&self.input[start..self.pos])
    }

    fn version(&mut self) -> Option<&'a [u8]> {
        let start = self.pos;
        self.many1(|b| b.is_ascii_digit())?;
        if self.byte(b'.').is_some() {
            self.many1(|b| b.is_ascii_digit())?;
        }
        Some(&self.input[start..self.pos])
    }
}

// Every accepted class is ASCII, so matched slices are valid UTF-8.
fn ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Matches `token SP request-target SP "HTTP/" version` exactly.
pub fn parse_request_line(line: &[u8]) -> Option<Declaration> {
    let mut s = Scanner::new(line);

    let method = s.many1(is_tchar)?;
    s.one(is_ws)?;
    let target = s.request_target()?;
    s.one(is_ws)?;
    s.literal(b"HTTP/")?;
    let version = s.version()?;

    if !s.is_done() {
        return None;
    }

    Some(Declaration {
        method: ascii(method),
        target: ascii(target),
        version: ascii(version),
    })
}

/// Matches `token ":" *WS field-value *WS` exactly, returning the name as
/// sent and the value with surrounding whitespace removed.
pub fn parse_header_line(line: &[u8]) -> Option<(String, String)> {
    let mut s = Scanner::new(line);

    let name = s.many1(is_tchar)?;
    s.byte(b':')?;
    s.many(is_ws);
    let value = s.many(is_field_vchar);
    s.many(is_ws);

    if !s.is_done() {
        return None;
    }

    Some((ascii(name), ascii(value).trim_end_matches(' ').to_string()))
}

pub fn is_http2_preface(line: &[u8]) -> bool {
    line == HTTP2_PREFACE
}
