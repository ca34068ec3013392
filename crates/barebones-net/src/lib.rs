//! Barebones Networking
//!
//! Minimal HTTP/1.1 GET client built directly on sockets: response framing,
//! redirect following, and static/dynamic content detection.

pub mod target;
pub mod tcp;
pub mod tls;
pub mod transport;
pub mod http1;
pub mod body;
pub mod client;
pub mod dynamic;
pub mod config;
pub mod diagnostics;

#[cfg(test)]
pub(crate) mod mock;

pub use target::{Scheme, Target};
pub use tls::TlsConfig;
pub use transport::{Connection, Connector, SocketConnector};
pub use http1::{Http1Request, ResponseHead, read_head};
pub use body::{Framing, decode_body};
pub use client::{HttpClient, HttpClientBuilder};
pub use dynamic::{CheckOutcome, normalize};
pub use config::{ClientConfig, FailurePolicy};
pub use diagnostics::{Diagnostics, Event, NullDiagnostics, RecordingDiagnostics, TracingDiagnostics};

/// Fetch a URL with the default client, following redirects
pub fn fetch(url: &str) -> Result<Vec<u8>, NetError> {
    HttpClient::new().get(url)
}

/// Fetch a URL twice with the default client and report whether it is static
pub fn check(url: &str) -> Result<CheckOutcome, NetError> {
    HttpClient::new().check(url)
}

/// Network error
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("TLS error: {0}")]
    SecureTransport(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Not found: {url}")]
    NotFound { url: String },

    #[error("Too many redirects (max {max}) at {url}")]
    TooManyRedirects { max: u32, url: String },

    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl NetError {
    /// Whether a connect or read deadline was exceeded
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::Timeout(_))
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            NetError::NotFound { .. } => Some(404),
            NetError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status() {
        let err = NetError::UnexpectedStatus { status: 500, url: "http://a/".into() };
        assert_eq!(err.status(), Some(500));
        assert_eq!(NetError::NotFound { url: "http://a/".into() }.status(), Some(404));
        assert_eq!(NetError::Framing("x".into()).status(), None);
    }

    #[test]
    fn test_error_display() {
        let err = NetError::TooManyRedirects { max: 5, url: "http://a/loop".into() };
        assert_eq!(err.to_string(), "Too many redirects (max 5) at http://a/loop");
        assert!(NetError::Timeout("read".into()).is_timeout());
    }
}
