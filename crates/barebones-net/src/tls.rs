//! TLS Layer
//!
//! rustls client streams with certificate verification against the
//! Mozilla root store and the connection's host name.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use rustls_pki_types::{CertificateDer, ServerName};

use crate::tcp::TcpConnection;
use crate::transport::{Connection, classify_io};
use crate::NetError;

/// TLS configuration
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// ALPN protocols offered to the server
    pub alpn_protocols: Vec<String>,
    /// Trust anchors accepted alongside the Mozilla roots
    pub extra_roots: Vec<CertificateDer<'static>>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            alpn_protocols: vec!["http/1.1".into()],
            extra_roots: Vec::new(),
        }
    }
}

impl TlsConfig {
    /// Also trust `cert` (a private CA, or a self-signed server certificate)
    pub fn add_root(mut self, cert: CertificateDer<'static>) -> Self {
        self.extra_roots.push(cert);
        self
    }
}

/// Create the rustls client configuration
pub fn create_client_config(config: &TlsConfig) -> Result<Arc<ClientConfig>, NetError> {
    let mut root_store = RootCertStore::empty();

    // Add Mozilla's root certificates
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    for cert in &config.extra_roots {
        root_store
            .add(cert.clone())
            .map_err(|e| NetError::SecureTransport(format!("Invalid root certificate: {}", e)))?;
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| NetError::SecureTransport(e.to_string()))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    tls_config.alpn_protocols = config
        .alpn_protocols
        .iter()
        .map(|s| s.as_bytes().to_vec())
        .collect();

    Ok(Arc::new(tls_config))
}

/// TLS stream wrapper over TCP using rustls
pub struct TlsStream {
    /// Rustls stream owning the connection
    stream: StreamOwned<ClientConnection, TcpStream>,
}

impl TlsStream {
    /// Wrap an established TCP connection and complete the handshake
    pub fn connect(tcp: TcpConnection, server_name: &str, config: Arc<ClientConfig>) -> Result<Self, NetError> {
        let name: ServerName<'static> = server_name
            .to_string()
            .try_into()
            .map_err(|_| NetError::SecureTransport(format!("Invalid server name: {}", server_name)))?;

        let conn = ClientConnection::new(config, name)
            .map_err(|e| NetError::SecureTransport(e.to_string()))?;

        let mut stream = StreamOwned::new(conn, tcp.into_inner());

        while stream.conn.is_handshaking() {
            stream
                .conn
                .complete_io(&mut stream.sock)
                .map_err(|e| handshake_error(e, server_name))?;
        }

        Ok(Self { stream })
    }
}

fn handshake_error(err: io::Error, server_name: &str) -> NetError {
    match classify_io(err, "TLS handshake") {
        NetError::Timeout(msg) => NetError::Timeout(msg),
        other => NetError::SecureTransport(format!("{}: {}", server_name, other)),
    }
}

impl Connection for TlsStream {
    fn send_all(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        self.stream
            .write_all(bytes)
            .and_then(|_| self.stream.flush())
            .map_err(|e| classify_io(e, "write"))
    }

    fn receive_some(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        loop {
            match self.stream.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // Servers answering `Connection: close` often skip close_notify
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(0),
                other => return other.map_err(|e| classify_io(e, "read")),
            }
        }
    }

    fn close(&mut self) {
        self.stream.conn.send_close_notify();
        let _ = self.stream.flush();
        let _ = self.stream.sock.shutdown(Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tcp::TcpConfig;
    use std::net::TcpListener;

    #[test]
    fn test_tls_config_default() {
        let config = TlsConfig::default();
        assert_eq!(config.alpn_protocols, vec!["http/1.1".to_string()]);
    }

    #[test]
    fn test_create_client_config() {
        let client_config = create_client_config(&TlsConfig::default()).unwrap();
        assert_eq!(client_config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[test]
    fn test_extra_root_must_be_a_certificate() {
        let config = TlsConfig::default().add_root(CertificateDer::from(vec![0x30, 0x00]));
        assert!(matches!(create_client_config(&config), Err(NetError::SecureTransport(_))));
    }

    #[test]
    fn test_handshake_with_plain_server_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 512];
            let _ = sock.read(&mut buf);
            let _ = sock.write_all(b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n");
        });

        let tcp = TcpConnection::connect("127.0.0.1", port, &TcpConfig::default()).unwrap();
        let config = create_client_config(&TlsConfig::default()).unwrap();
        let result = TlsStream::connect(tcp, "localhost", config);

        assert!(matches!(result, Err(NetError::SecureTransport(_))));
    }
}
