//! Line-oriented byte stream to the pool.

use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::SessionError;

/// A duplex stream of newline-terminated text lines.
pub trait Transport {
    /// Write one line. A trailing newline is added.
    fn send_line(&mut self, line: &str) -> Result<(), SessionError>;

    /// Block until a full line arrives. `None` means end of stream.
    ///
    /// A timeout returns [`SessionError::Timeout`] without losing any part
    /// of a line that was only partially received.
    fn read_line(&mut self) -> Result<Option<String>, SessionError>;

    /// Whether unread data is waiting, without blocking.
    fn has_pending(&mut self) -> Result<bool, SessionError>;

    /// Bound how long `read_line` may block. `None` blocks indefinitely.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), SessionError>;

    /// Whether the peer closed the stream or it failed.
    fn is_closed(&self) -> bool;
}

/// Plain TCP connection to a pool.
pub struct TcpTransport {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    /// Bytes of the line being read; kept across read timeouts
    line_buf: Vec<u8>,
    closed: bool,
}

impl TcpTransport {
    pub fn connect(host: &str, port: u16) -> Result<Self, SessionError> {
        let stream = TcpStream::connect((host, port)).map_err(|source| SessionError::Connect {
            address: format!("{}:{}", host, port),
            source,
        })?;
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;

        Ok(TcpTransport {
            reader: BufReader::new(stream),
            writer,
            line_buf: Vec::with_capacity(4096),
            closed: false,
        })
    }

    fn fail(&mut self, err: io::Error) -> SessionError {
        self.closed = true;
        SessionError::Io(err)
    }
}

impl Transport for TcpTransport {
    fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        let result = self
            .writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .and_then(|_| self.writer.flush());
        result.map_err(|err| self.fail(err))
    }

    fn read_line(&mut self) -> Result<Option<String>, SessionError> {
        match self.reader.read_until(b'\n', &mut self.line_buf) {
            Ok(0) if self.line_buf.is_empty() => {
                self.closed = true;
                Ok(None)
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&self.line_buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                self.line_buf.clear();
                Ok(Some(line))
            }
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(SessionError::Timeout)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn has_pending(&mut self) -> Result<bool, SessionError> {
        if !self.reader.buffer().is_empty() {
            return Ok(true);
        }
        if self.closed {
            return Ok(false);
        }

        let stream = self.reader.get_ref();
        stream.set_nonblocking(true)?;
        let mut probe = [0u8; 1];
        let peeked = stream.peek(&mut probe);
        stream.set_nonblocking(false)?;

        match peeked {
            Ok(0) => {
                self.closed = true;
                Ok(false)
            }
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), SessionError> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
