use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const READ_CHUNK: usize = 4 * 1024;

/// Buffered client connection with cumulative byte accounting.
///
/// Reads land in an internal buffer so the pipeline can peek without
/// consuming. `stats` exposes monotonic totals since construction; the
/// pipeline turns consecutive snapshots into per-request deltas.
pub struct BufConn {
    stream: TcpStream,
    rbuf: BytesMut,
    read_total: u64,
    write_total: u64,
}

impl BufConn {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            rbuf: BytesMut::with_capacity(READ_CHUNK),
            read_total: 0,
            write_total: 0,
        }
    }

    /// Enable TCP keepalive with a 1-second probe period.
    pub(crate) fn set_keepalive(&self) -> io::Result<()> {
        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(1))
            .with_interval(Duration::from_secs(1));
        SockRef::from(&self.stream).set_tcp_keepalive(&keepalive)
    }

    async fn fill(&mut self) -> io::Result<usize> {
        let n = self.stream.read_buf(&mut self.rbuf).await?;
        self.read_total += n as u64;
        Ok(n)
    }

    /// Wait until at least `n` bytes are buffered and return them without
    /// consuming. EOF before `n` bytes surfaces as `UnexpectedEof`.
    pub async fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        while self.rbuf.len() < n {
            if self.fill().await? == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed"));
            }
        }
        Ok(&self.rbuf[..n])
    }

    /// Bytes received but not yet consumed by a reader.
    pub fn buffered(&self) -> usize {
        self.rbuf.len()
    }

    /// Read into `buf`, draining the internal buffer first.
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.rbuf.is_empty() {
            let n = self.stream.read(buf).await?;
            self.read_total += n as u64;
            return Ok(n);
        }
        let n = self.rbuf.len().min(buf.len());
        buf[..n].copy_from_slice(&self.rbuf[..n]);
        self.rbuf.advance(n);
        Ok(n)
    }

    /// Consume and return one `\n`-terminated line, terminator included.
    /// `max` caps the line length; EOF mid-line surfaces as `UnexpectedEof`
    /// with the partial bytes left in the buffer.
    pub(crate) async fn read_line(&mut self, max: usize) -> io::Result<Vec<u8>> {
        let mut searched = 0;
        loop {
            if let Some(pos) = self.rbuf[searched..].iter().position(|&b| b == b'\n') {
                let line = self.rbuf.split_to(searched + pos + 1);
                return Ok(line.to_vec());
            }
            searched = self.rbuf.len();
            if searched > max {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "header line exceeds limit",
                ));
            }
            if self.fill().await? == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed"));
            }
        }
    }

    pub async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await?;
        self.write_total += data.len() as u64;
        Ok(())
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().await
    }

    /// Shut down the socket. Pending peer reads unblock with EOF.
    pub async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
    }

    /// Cumulative `(bytes_read, bytes_written)` since construction.
    pub fn stats(&self) -> (u64, u64) {
        (self.read_total, self.write_total)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}

/// Byte totals already attributed to finished requests on a connection.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TransferSnapshot {
    pub(crate) read: u64,
    pub(crate) written: u64,
}
