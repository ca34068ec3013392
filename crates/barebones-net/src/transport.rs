//! Transport
//!
//! Byte-stream connections used by the fetch pipeline. [`SocketConnector`]
//! opens real TCP (and TLS for `https`) connections; tests substitute their
//! own [`Connector`].

use std::io;

use crate::config::ClientConfig;
use crate::tcp::{TcpConfig, TcpConnection};
use crate::tls::{TlsConfig, TlsStream, create_client_config};
use crate::{NetError, Target};

/// One open connection to a server
pub trait Connection: Send {
    /// Write every byte or fail
    fn send_all(&mut self, bytes: &[u8]) -> Result<(), NetError>;

    /// Read at most `buf.len()` bytes; `Ok(0)` means the peer closed the stream
    fn receive_some(&mut self, buf: &mut [u8]) -> Result<usize, NetError>;

    /// Release the connection. Errors are ignored; dropping also releases it.
    fn close(&mut self);
}

/// Opens connections to targets
pub trait Connector: Send + Sync {
    fn open(&self, target: &Target, config: &ClientConfig) -> Result<Box<dyn Connection>, NetError>;
}

/// Connector backed by OS sockets and rustls
#[derive(Debug, Clone, Default)]
pub struct SocketConnector {
    tls: TlsConfig,
}

impl SocketConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tls_config(tls: TlsConfig) -> Self {
        Self { tls }
    }
}

impl Connector for SocketConnector {
    fn open(&self, target: &Target, config: &ClientConfig) -> Result<Box<dyn Connection>, NetError> {
        let host = target.connect_host();
        let tcp = TcpConnection::connect(host, target.port(), &TcpConfig::from(config))
            .map_err(|e| classify_io(e, &format!("connect to {}:{}", host, target.port())))?;

        if target.is_https() {
            let tls_config = create_client_config(&self.tls)?;
            Ok(Box::new(TlsStream::connect(tcp, host, tls_config)?))
        } else {
            Ok(Box::new(tcp))
        }
    }
}

/// Map an I/O error onto the error taxonomy
pub(crate) fn classify_io(err: io::Error, what: &str) -> NetError {
    let is_tls = err
        .get_ref()
        .is_some_and(|inner| inner.is::<rustls::Error>());

    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            NetError::Timeout(format!("{} exceeded deadline", what))
        }
        _ if is_tls => NetError::SecureTransport(format!("{}: {}", what, err)),
        _ => NetError::Transport(format!("{} failed: {}", what, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_classify_io() {
        let err = classify_io(io::Error::new(io::ErrorKind::WouldBlock, "again"), "read");
        assert!(err.is_timeout());

        let err = classify_io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"), "connect");
        assert!(matches!(err, NetError::Transport(_)));

        let tls = io::Error::new(io::ErrorKind::InvalidData, rustls::Error::DecryptError);
        assert!(matches!(classify_io(tls, "read"), NetError::SecureTransport(_)));
    }

    #[test]
    fn test_connection_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let target = Target::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let result = SocketConnector::new().open(&target, &ClientConfig::default());

        assert!(matches!(result, Err(NetError::Transport(_))));
    }
}
