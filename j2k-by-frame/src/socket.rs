//! Blocking TCP with a deadline on every call.

use crate::error::{Error, Result};
use bytes::{Buf, BytesMut};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Timeout applied to each read or write of the encode protocol.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);

const READ_CHUNK: usize = 64 * 1024;

/// A connected stream with a read-ahead buffer, so that a header can be
/// read up to its terminator without losing the bytes that follow it.
#[derive(Debug)]
pub struct Socket {
    stream: TcpStream,
    buffer: BytesMut,
}

impl Socket {
    /// Resolve `addr` and connect to the first address that answers
    /// within `timeout`.
    pub fn connect<A: ToSocketAddrs>(addr: A, timeout: Duration) -> Result<Self> {
        let deadline = Instant::now() + timeout;
        let mut last_err = None;
        for addr in addr.to_socket_addrs()? {
            let remaining = remaining(deadline)?;
            match TcpStream::connect_timeout(&addr, remaining) {
                Ok(stream) => return Ok(Socket::new(stream)),
                Err(e) => last_err = Some(e),
            }
        }
        Err(Error::Network(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "host did not resolve to any address")
        })))
    }

    pub fn new(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        Socket {
            stream,
            buffer: BytesMut::new(),
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }

    /// Write all of `data`, failing if it does not go out within `timeout`.
    pub fn write(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut written = 0;
        while written < data.len() {
            self.stream.set_write_timeout(Some(remaining(deadline)?))?;
            match self.stream.write(&data[written..]) {
                Ok(0) => {
                    return Err(Error::Network(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "connection closed while writing",
                    )))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Network(timed_out(e))),
            }
        }
        Ok(())
    }

    /// Read bytes up to and including a NUL terminator, returning them
    /// without the terminator. Anything received after the NUL is kept for
    /// the next read. Fails with a protocol error if no terminator arrives
    /// within `limit` bytes.
    pub fn read_until_nul(&mut self, limit: usize, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == 0) {
                if pos >= limit {
                    break;
                }
                let header = self.buffer.split_to(pos).to_vec();
                self.buffer.advance(1);
                return Ok(header);
            }
            if self.buffer.len() >= limit {
                break;
            }
            self.fill(deadline)?;
        }
        Err(Error::protocol(format!(
            "no terminator within {} bytes of header",
            limit
        )))
    }

    /// Fill `buf` completely, failing on timeout or if the peer closes early.
    pub fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let buffered = self.buffer.len().min(buf.len());
        buf[..buffered].copy_from_slice(&self.buffer[..buffered]);
        self.buffer.advance(buffered);

        let mut filled = buffered;
        while filled < buf.len() {
            self.stream.set_read_timeout(Some(remaining(deadline)?))?;
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(Error::Network(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("connection closed after {} of {} bytes", filled, buf.len()),
                    )))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Network(timed_out(e))),
            }
        }
        Ok(())
    }

    fn fill(&mut self, deadline: Instant) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            self.stream.set_read_timeout(Some(remaining(deadline)?))?;
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(Error::Network(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed before header was complete",
                    )))
                }
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Network(timed_out(e))),
            }
        }
    }
}

fn remaining(deadline: Instant) -> Result<Duration> {
    let now = Instant::now();
    if now >= deadline {
        return Err(Error::Network(io::Error::new(
            io::ErrorKind::TimedOut,
            "socket operation timed out",
        )));
    }
    // A zero timeout is rejected by the OS layer
    Ok((deadline - now).max(Duration::from_millis(1)))
}

/// Platforms report an expired socket timeout as either WouldBlock or
/// TimedOut; normalise to the latter.
fn timed_out(e: io::Error) -> io::Error {
    if e.kind() == io::ErrorKind::WouldBlock {
        io::Error::new(io::ErrorKind::TimedOut, "socket operation timed out")
    } else {
        e
    }
}
