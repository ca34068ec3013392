//! HTTP Client
//!
//! Runs one GET per hop over a fresh connection and follows 301/302
//! redirects up to the configured bound.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::body::decode_body;
use crate::config::{ClientConfig, FailurePolicy};
use crate::diagnostics::{Diagnostics, Event, TracingDiagnostics};
use crate::http1::{Http1Request, ResponseHead, read_head};
use crate::transport::{Connection, Connector, SocketConnector};
use crate::{NetError, Target};

/// HTTP client builder
pub struct HttpClientBuilder {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            connector: Arc::new(SocketConnector::new()),
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn user_agent(mut self, ua: &str) -> Self {
        self.config.user_agent = ua.to_string();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn max_redirects(mut self, max: u32) -> Self {
        self.config.max_redirects = max;
        self
    }

    pub fn receive_buffer_size(mut self, size: usize) -> Self {
        self.config.receive_buffer_size = size;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn concurrent_check(mut self, enabled: bool) -> Self {
        self.config.concurrent_check = enabled;
        self
    }

    /// Use a different transport (tests, proxies)
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Send diagnostics somewhere other than `tracing`
    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn build(self) -> HttpClient {
        HttpClient {
            config: Arc::new(self.config),
            connector: self.connector,
            diagnostics: self.diagnostics,
        }
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client
///
/// Cloning is cheap; clones share configuration, connector and diagnostics
/// but never connections.
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) config: Arc<ClientConfig>,
    connector: Arc<dyn Connector>,
    pub(crate) diagnostics: Arc<dyn Diagnostics>,
}

/// Result of a single request/response exchange
struct Hop {
    head: ResponseHead,
    /// Only decoded for 200 responses
    body: Option<Vec<u8>>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a client builder
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Create with custom config
    pub fn with_config(config: ClientConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch a URL, following redirects
    pub fn get(&self, url: &str) -> Result<Vec<u8>, NetError> {
        self.fetch(&self.parse_url(url)?)
    }

    /// Parse a caller-supplied URL, reporting rejections
    pub(crate) fn parse_url(&self, url: &str) -> Result<Target, NetError> {
        Target::parse(url).inspect_err(|error| self.diagnostics.event(&Event::InvalidUrl { url, error }))
    }

    /// Fetch a target, following redirects
    pub fn fetch(&self, target: &Target) -> Result<Vec<u8>, NetError> {
        let max = self.config.max_redirects;
        let mut hops_remaining = max;
        let mut visited = HashSet::new();
        let mut current = target.clone();
        visited.insert(current.clone());

        loop {
            let hop = self.exchange(&current).inspect_err(|e| self.report(&current, e))?;
            let status = hop.head.status;

            let next = match (status, hop.body) {
                (200, Some(body)) => return Ok(body),
                (404, _) => Err(NetError::NotFound { url: current.to_string() }),
                (301 | 302, _) => match hop.head.location() {
                    Some(_) if hops_remaining == 0 => Err(NetError::TooManyRedirects {
                        max,
                        url: current.to_string(),
                    }),
                    Some(location) => current.resolve_location(location),
                    None => Err(NetError::UnexpectedStatus { status, url: current.to_string() }),
                },
                _ => Err(NetError::UnexpectedStatus { status, url: current.to_string() }),
            }
            .inspect_err(|e| self.report(&current, e))?;

            self.diagnostics.event(&Event::Redirect {
                from: &current,
                to: &next,
                status,
            });

            if !visited.insert(next.clone()) {
                self.diagnostics.event(&Event::RedirectLoop { target: &next });
                let err = NetError::TooManyRedirects { max, url: next.to_string() };
                self.report(&current, &err);
                return Err(err);
            }

            hops_remaining -= 1;
            current = next;
        }
    }

    /// One hop: connect, send, read the head and, for 200, the body.
    /// The connection is closed before returning, whatever the outcome.
    fn exchange(&self, target: &Target) -> Result<Hop, NetError> {
        self.diagnostics.event(&Event::Connecting { target });

        let mut conn = self.connector.open(target, &self.config)?;
        let result = self.exchange_on(conn.as_mut(), target);
        conn.close();
        result
    }

    fn exchange_on(&self, conn: &mut dyn Connection, target: &Target) -> Result<Hop, NetError> {
        let diag = self.diagnostics.as_ref();

        let request = Http1Request::get(target, &self.config.user_agent).serialize();
        conn.send_all(&request)?;
        diag.event(&Event::RequestSent { target, bytes: request.len() });

        let (head, leftover) = read_head(conn, &self.config, diag)?;
        diag.event(&Event::HeadReceived {
            target,
            status: head.status,
            headers: head.headers.len(),
        });

        let body = if head.status == 200 {
            Some(decode_body(&head, leftover, conn, &self.config, diag)?)
        } else {
            None
        };

        Ok(Hop { head, body })
    }

    fn report(&self, target: &Target, error: &NetError) {
        self.diagnostics.event(&Event::Failure { target, error });
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}
