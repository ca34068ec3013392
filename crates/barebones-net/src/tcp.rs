//! TCP Connection Layer
//!
//! Blocking TCP connections with connect, read and write deadlines.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream as StdTcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::transport::{Connection, classify_io};
use crate::NetError;

/// TCP connection configuration
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Read timeout
    pub read_timeout: Option<Duration>,
    /// Write timeout
    pub write_timeout: Option<Duration>,
    /// TCP nodelay (disable Nagle's algorithm)
    pub nodelay: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for TcpConfig {
    fn from(config: &ClientConfig) -> Self {
        // A zero duration means "no deadline" to us but is rejected by std
        let deadline = Some(config.read_timeout).filter(|d| !d.is_zero());
        Self {
            connect_timeout: config.connect_timeout,
            read_timeout: deadline,
            write_timeout: deadline,
            nodelay: true,
        }
    }
}

/// TCP connection wrapper
#[derive(Debug)]
pub struct TcpConnection {
    /// Underlying stream
    stream: StdTcpStream,
    /// Remote address
    remote_addr: SocketAddr,
}

impl TcpConnection {
    /// Resolve `host` and connect to the first address that accepts
    pub fn connect(host: &str, port: u16, config: &TcpConfig) -> io::Result<Self> {
        let mut last_err = None;

        for addr in resolve_host(host, port)? {
            match Self::connect_to_addr(addr, config) {
                Ok(conn) => return Ok(conn),
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("No address found for {}", host))
        }))
    }

    /// Connect to a SocketAddr
    pub fn connect_to_addr(addr: SocketAddr, config: &TcpConfig) -> io::Result<Self> {
        let stream = if config.connect_timeout.is_zero() {
            StdTcpStream::connect(addr)?
        } else {
            StdTcpStream::connect_timeout(&addr, config.connect_timeout)?
        };

        stream.set_nodelay(config.nodelay)?;
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;

        Ok(Self {
            stream,
            remote_addr: addr,
        })
    }

    /// Get remote address
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Take the inner stream (for TLS upgrade)
    pub fn into_inner(self) -> StdTcpStream {
        self.stream
    }

    /// Shutdown the connection
    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        self.stream.shutdown(how)
    }
}

impl Read for TcpConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Connection for TcpConnection {
    fn send_all(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        self.write_all(bytes)
            .and_then(|_| self.flush())
            .map_err(|e| classify_io(e, "write"))
    }

    fn receive_some(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        loop {
            match self.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other.map_err(|e| classify_io(e, "read")),
            }
        }
    }

    fn close(&mut self) {
        // The peer may already be gone; the fd is released on drop either way
        let _ = self.shutdown(Shutdown::Both);
    }
}

/// DNS resolver helper
pub fn resolve_host(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "DNS resolution failed"));
    }
    Ok(addrs)
}
