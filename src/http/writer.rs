use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::response::Response;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Headers owned by the serializer. Handler-provided values are dropped.
const RESERVED_HEADERS: [&str; 3] = ["connection", "content-length", "server"];

/// Renders a response into wire bytes.
///
/// Handler headers are written lowercased and sorted by name, followed by
/// `connection`, `content-length` and `server` computed here.
pub fn serialize_response(resp: &Response, keep_alive: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + resp.body.len());

    // Status line, no reason phrase
    buf.extend_from_slice(format!("{} {}\r\n", HTTP_VERSION, resp.status.as_u16()).as_bytes());

    let mut headers: Vec<(String, &str)> = resp
        .headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
        .filter(|(k, _)| !RESERVED_HEADERS.contains(&k.as_str()))
        .collect();
    headers.sort();

    let connection = if keep_alive { "keep-alive" } else { "close" };
    let content_length = resp.body.len().to_string();

    let injected = [
        ("connection", connection),
        ("content-length", content_length.as_str()),
        ("server", crate::SERVER_TOKEN),
    ];

    let all = headers
        .iter()
        .map(|(k, v)| (k.as_str(), *v))
        .chain(injected);

    for (k, v) in all {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(&resp.body);

    buf
}

/// A serialized response and how much of it has reached the peer.
pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response, keep_alive: bool) -> Self {
        Self {
            buffer: serialize_response(response, keep_alive),
            written: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub async fn write_to_stream<W>(&mut self, stream: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                return Err(std::io::ErrorKind::WriteZero.into());
            }

            self.written += n;
        }

        stream.flush().await
    }
}
