//! The byte-level capability the protocol engine is written against, plus
//! its two realizations: a cooperative tokio transport and a direct
//! blocking transport.
//!
//! The engine is written once, as async code over [`Transport`]. Under
//! [`TcpTransport`] every primitive genuinely suspends; under
//! [`BlockingTcpTransport`] every primitive completes without awaiting, so
//! the returned futures are always ready and can be driven with
//! `futures::executor::block_on` on a plain thread, no reactor required.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Blocking I/O primitives over a byte stream pair.
///
/// Failures are `io::Error`s; the engine distinguishes
/// `io::ErrorKind::ConnectionRefused` at open time and treats everything
/// else uniformly as transport breakage.
#[async_trait]
pub trait Transport: Send {
    /// Read bytes up to the next LF. The LF is consumed but not returned.
    /// EOF before any byte is `UnexpectedEof`; EOF after some bytes yields
    /// the partial line.
    async fn read_line(&mut self) -> io::Result<Vec<u8>>;

    /// Read a single byte.
    async fn read_byte(&mut self) -> io::Result<u8>;

    /// Read exactly `len` bytes.
    async fn read_exact(&mut self, len: usize) -> io::Result<Vec<u8>>;

    /// Write the whole buffer.
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Flush buffered writes to the peer.
    async fn flush(&mut self) -> io::Result<()>;

    /// Close both directions. Called exactly once, by `disconnect`.
    async fn close(&mut self) -> io::Result<()>;
}

/// Transports that can open themselves from a socket address.
#[async_trait]
pub trait Connector: Transport + Sized {
    async fn open(addr: SocketAddr) -> io::Result<Self>;
}

fn eof(context: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, context.to_string())
}

/// Cooperative realization over a tokio `TcpStream`, split into buffered
/// read and write halves.
#[derive(Debug)]
pub struct TcpTransport {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

#[async_trait]
impl Transport for TcpTransport {
    async fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        let n = self.reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Err(eof("connection closed before end of line"));
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        Ok(line)
    }

    async fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.reader.read_exact(&mut byte).await?;
        Ok(byte[0])
    }

    async fn read_exact(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf).await?;
        Ok(buf)
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write_all(buf).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}

#[async_trait]
impl Connector for TcpTransport {
    async fn open(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        })
    }
}

/// Direct blocking realization over a `std::net::TcpStream`. Every method
/// completes before returning; the async signatures are satisfied with
/// already-ready futures.
#[derive(Debug)]
pub struct BlockingTcpTransport {
    reader: io::BufReader<std::net::TcpStream>,
    writer: std::net::TcpStream,
}

#[async_trait]
impl Transport for BlockingTcpTransport {
    async fn read_line(&mut self) -> io::Result<Vec<u8>> {
        use std::io::BufRead;
        let mut line = Vec::new();
        let n = self.reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Err(eof("connection closed before end of line"));
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        Ok(line)
    }

    async fn read_byte(&mut self) -> io::Result<u8> {
        use std::io::Read;
        let mut byte = [0u8; 1];
        self.reader.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    async fn read_exact(&mut self, len: usize) -> io::Result<Vec<u8>> {
        use std::io::Read;
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        use std::io::Write;
        self.writer.write_all(buf)
    }

    async fn flush(&mut self) -> io::Result<()> {
        use std::io::Write;
        self.writer.flush()
    }

    async fn close(&mut self) -> io::Result<()> {
        self.writer.shutdown(std::net::Shutdown::Both)
    }
}

#[async_trait]
impl Connector for BlockingTcpTransport {
    async fn open(addr: SocketAddr) -> io::Result<Self> {
        let stream = std::net::TcpStream::connect(addr)?;
        let reader = io::BufReader::new(stream.try_clone()?);
        Ok(Self {
            reader,
            writer: stream,
        })
    }
}
