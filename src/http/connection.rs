use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::http::error::ProtocolError;
use crate::http::handler::Handler;
use crate::http::request::{Request, RequestParser};
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;

const READ_CHUNK: usize = 4096;

/// Per-connection resource limits.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Longest wait for a single read; `None` waits forever
    pub read_timeout: Option<Duration>,
    /// Longest accepted request or header line, excluding CRLF
    pub max_line_length: usize,
    /// Largest accepted `content-length`
    pub max_body_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for Limits {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            read_timeout: cfg.read_timeout(),
            max_line_length: cfg.max_line_length,
            max_body_size: cfg.max_body_size,
        }
    }
}

enum ConnectionState {
    Reading,
    Processing(Request, bool), // bool = keep_alive?
    Writing(ResponseWriter, bool),
    Closed,
}

enum ReadOutcome {
    Request(Request),
    /// Peer finished cleanly before sending another request line
    Closed,
    Rejected(ProtocolError),
}

enum Line {
    Complete(Bytes),
    TooLong,
    Eof,
}

/// One accepted stream and the request/response loop running on it.
pub struct Connection<S, H> {
    stream: S,
    peer: SocketAddr,
    handler: Arc<H>,
    limits: Limits,
    buffer: BytesMut,
    state: ConnectionState,
}

impl<S, H> Connection<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    H: Handler,
{
    pub fn new(stream: S, peer: SocketAddr, handler: Arc<H>, limits: Limits) -> Self {
        Self {
            stream,
            peer,
            handler,
            limits,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            state: ConnectionState::Reading,
        }
    }

    /// Serves requests until the peer closes, asks to close, or misbehaves.
    ///
    /// The stream is shut down on every exit path. Resets, broken pipes and
    /// read timeouts count as a normal end of the connection.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let result = self.drive().await;

        if let Err(e) = self.stream.shutdown().await {
            debug!(peer = %self.peer, error = %e, "Shutdown after close failed");
        }

        match result {
            Ok(()) => Ok(()),
            Err(e) if is_disconnect(&e) => {
                debug!(peer = %self.peer, error = %e, "Connection dropped");
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("I/O error on connection from {}", self.peer)),
        }
    }

    async fn drive(&mut self) -> io::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = match self.read_request().await? {
                        ReadOutcome::Request(req) => {
                            let keep_alive = req.keep_alive();
                            ConnectionState::Processing(req, keep_alive)
                        }
                        ReadOutcome::Closed => ConnectionState::Closed,
                        ReadOutcome::Rejected(err) => {
                            warn!(
                                peer = %self.peer,
                                status = err.status.as_u16(),
                                message = %err.message,
                                "Rejecting malformed request"
                            );
                            let writer = ResponseWriter::new(&Response::from(&err), false);
                            ConnectionState::Writing(writer, false)
                        }
                    };
                }

                ConnectionState::Processing(req, keep_alive) => {
                    let method = req.method().to_string();
                    let target = req.target().to_string();

                    let response = self.handler.handle(req).await;

                    info!(
                        peer = %self.peer,
                        method = %method,
                        target = %target,
                        status = response.status.as_u16(),
                        keep_alive,
                        "Request handled"
                    );

                    let writer = ResponseWriter::new(&response, keep_alive);
                    self.state = ConnectionState::Writing(writer, keep_alive);
                }

                ConnectionState::Writing(mut writer, keep_alive) => {
                    writer.write_to_stream(&mut self.stream).await?;

                    if keep_alive {
                        self.state = ConnectionState::Reading;
                    }
                }

                ConnectionState::Closed => return Ok(()),
            }
        }
    }

    async fn read_request(&mut self) -> io::Result<ReadOutcome> {
        let mut parser = RequestParser::new(self.peer);

        loop {
            let line = match self.read_line().await? {
                Line::Complete(line) => line,
                Line::TooLong => return Ok(ReadOutcome::Rejected(ProtocolError::line_too_long())),
                Line::Eof => break,
            };

            if line.is_empty() {
                // Stray CRLFs ahead of a request line are skipped
                if parser.is_declared() {
                    break;
                }
                continue;
            }

            if let Err(e) = parser.consume(&line) {
                return Ok(ReadOutcome::Rejected(e));
            }
        }

        let Some(mut request) = parser.finish() else {
            return Ok(ReadOutcome::Closed);
        };

        match request.content_length() {
            Ok(None) => {}
            Ok(Some(len)) if len > self.limits.max_body_size => {
                return Ok(ReadOutcome::Rejected(ProtocolError::body_too_large()));
            }
            Ok(Some(len)) => match self.read_body(len).await? {
                Some(body) => request.set_body(body),
                None => return Ok(ReadOutcome::Rejected(ProtocolError::truncated_body())),
            },
            Err(e) => return Ok(ReadOutcome::Rejected(e)),
        }

        Ok(ReadOutcome::Request(request))
    }

    async fn read_line(&mut self) -> io::Result<Line> {
        let mut searched = 0;

        loop {
            if let Some(pos) = find_crlf(&self.buffer[searched..]) {
                let end = searched + pos;
                if end > self.limits.max_line_length {
                    return Ok(Line::TooLong);
                }

                let mut line = self.buffer.split_to(end + 2);
                line.truncate(end);
                return Ok(Line::Complete(line.freeze()));
            }

            // A CR at the tail may still be followed by LF
            searched = self.buffer.len().saturating_sub(1);

            if searched > self.limits.max_line_length {
                return Ok(Line::TooLong);
            }

            if self.fill_buffer().await? == 0 {
                return Ok(self.take_tail());
            }
        }
    }

    /// At end of input, hands out unterminated trailing bytes as a last line.
    fn take_tail(&mut self) -> Line {
        if self.buffer.is_empty() {
            return Line::Eof;
        }

        if self.buffer.len() > self.limits.max_line_length {
            return Line::TooLong;
        }

        let mut tail = self.buffer.split().freeze();
        if tail.ends_with(b"\r") {
            tail.truncate(tail.len() - 1);
        }
        Line::Complete(tail)
    }

    /// Reads exactly `len` bytes, counting what is already buffered.
    /// Returns `None` if the stream ends first.
    async fn read_body(&mut self, len: usize) -> io::Result<Option<Vec<u8>>> {
        while self.buffer.len() < len {
            if self.fill_buffer().await? == 0 {
                return Ok(None);
            }
        }

        Ok(Some(self.buffer.split_to(len).to_vec()))
    }

    async fn fill_buffer(&mut self) -> io::Result<usize> {
        self.buffer.reserve(READ_CHUNK);
        let read = self.stream.read_buf(&mut self.buffer);

        match self.limits.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))?,
            None => read.await,
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut
    )
}
