//! HTTP/1.1 Framing
//!
//! GET request serialization and response head parsing.

use std::fmt;

use crate::config::ClientConfig;
use crate::diagnostics::{Diagnostics, Event};
use crate::transport::Connection;
use crate::{NetError, Target};

/// HTTP/1.1 GET request
#[derive(Debug, Clone)]
pub struct Http1Request {
    /// Request path (e.g., "/api/users?page=2")
    pub path: String,
    /// Request headers
    pub headers: Vec<(String, String)>,
}

impl Http1Request {
    /// The request sent for one hop: `Host`, `Connection: close` and `User-Agent`
    pub fn get(target: &Target, user_agent: &str) -> Self {
        Self {
            path: target.path().to_string(),
            headers: Vec::new(),
        }
        .header("Host", &target.host_header())
        .header("Connection", "close")
        .header("User-Agent", user_agent)
    }

    /// Add a header
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Serialize to bytes
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = format!("GET {} {}\r\n", self.path, HttpVersion::Http11).into_bytes();

        for (name, value) in &self.headers {
            buf.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }

        // End of headers
        buf.extend_from_slice(b"\r\n");
        buf
    }
}

/// HTTP version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpVersion {
    Http10,
    #[default]
    Http11,
    /// Any other `HTTP/major[.minor]` a server answered with
    Other { major: u8, minor: u8 },
}

impl HttpVersion {
    /// Parse an `HTTP/1.1`-style token; the minor number is optional
    fn parse(token: &str) -> Option<Self> {
        let number = token.strip_prefix("HTTP/")?;
        let (major, minor) = number.split_once('.').unwrap_or((number, "0"));
        let digit = |s: &str| (s.len() == 1).then(|| s.parse::<u8>().ok()).flatten();

        Some(match (digit(major)?, digit(minor)?) {
            (1, 0) => HttpVersion::Http10,
            (1, 1) => HttpVersion::Http11,
            (major, minor) => HttpVersion::Other { major, minor },
        })
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpVersion::Http10 => write!(f, "HTTP/1.0"),
            HttpVersion::Http11 => write!(f, "HTTP/1.1"),
            HttpVersion::Other { major, minor } => write!(f, "HTTP/{}.{}", major, minor),
        }
    }
}

/// Status line and header fields of a response
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// HTTP version
    pub version: HttpVersion,
    /// Status code
    pub status: u16,
    /// Raw status line
    pub status_line: String,
    /// Status reason phrase
    pub reason: String,
    /// Header fields in the order received
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// Parse a header block (status line plus fields, without the blank line)
    pub fn parse(block: &[u8], diag: &dyn Diagnostics) -> Result<Self, NetError> {
        let text = String::from_utf8_lossy(block);
        let mut lines = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

        let status_line = lines.next().unwrap_or_default().to_string();
        let (version, status, reason) = parse_status_line(&status_line)?;

        let mut headers: Vec<(String, String)> = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }

            // obs-fold continuation
            if line.starts_with([' ', '\t']) {
                match headers.last_mut() {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(line.trim());
                    }
                    None => diag.event(&Event::Anomaly {
                        message: format!("Continuation line before any header: {:?}", line),
                    }),
                }
                continue;
            }

            match line.split_once(':') {
                Some((name, value)) => headers.push((name.trim().to_string(), value.trim().to_string())),
                None => diag.event(&Event::Anomaly {
                    message: format!("Ignoring header line without colon: {:?}", line),
                }),
            }
        }

        Ok(Self {
            version,
            status,
            status_line,
            reason,
            headers,
        })
    }

    /// First value of a header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_all(name).next()
    }

    /// Every value of a header, in order
    pub fn header_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Check if response is redirect (301/302)
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302)
    }

    /// Get redirect location
    pub fn location(&self) -> Option<&str> {
        self.header("location").filter(|l| !l.trim().is_empty())
    }
}

fn parse_status_line(line: &str) -> Result<(HttpVersion, u16, String), NetError> {
    let malformed = || NetError::MalformedResponse(format!("Invalid status line: {:?}", line));
    let mut parts = line.trim_end().splitn(3, ' ');

    let version = parts
        .next()
        .and_then(HttpVersion::parse)
        .ok_or_else(malformed)?;

    let code = parts.next().unwrap_or_default();
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let status = code.parse().map_err(|_| malformed())?;

    let reason = parts.next().unwrap_or("").trim().to_string();

    Ok((version, status, reason))
}

/// Locate the blank line ending the head: `(head_len, body_start)`
fn find_head_end(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let start = from.min(buf.len());
    buf[start..].iter().enumerate().find_map(|(i, &b)| {
        let i = start + i;
        if b != b'\n' {
            return None;
        }
        let head_len = if i > 0 && buf[i - 1] == b'\r' { i - 1 } else { i };
        match buf.get(i + 1..) {
            Some([b'\n', ..]) => Some((head_len, i + 2)),
            Some([b'\r', b'\n', ..]) => Some((head_len, i + 3)),
            _ => None,
        }
    })
}

/// Read until the header block is complete.
///
/// Returns the parsed head and any body bytes that arrived in the same reads.
pub fn read_head(
    conn: &mut dyn Connection,
    config: &ClientConfig,
    diag: &dyn Diagnostics,
) -> Result<(ResponseHead, Vec<u8>), NetError> {
    let max = config.max_header_bytes();
    let mut buf = Vec::with_capacity(config.receive_buffer_size());
    let mut chunk = vec![0u8; config.receive_buffer_size()];
    let mut scanned = 0;

    loop {
        if let Some((head_len, body_start)) = find_head_end(&buf, scanned) {
            if head_len > max {
                break;
            }
            let leftover = buf.split_off(body_start);
            buf.truncate(head_len);
            let head = ResponseHead::parse(&buf, diag)?;
            return Ok((head, leftover));
        }

        if buf.len() > max {
            break;
        }

        // The delimiter may straddle two reads
        scanned = buf.len().saturating_sub(2);

        let n = conn.receive_some(&mut chunk)?;
        if n == 0 {
            let what = if buf.is_empty() {
                "Connection closed without a response"
            } else {
                "Connection closed before header block was complete"
            };
            return Err(NetError::MalformedResponse(what.into()));
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Err(NetError::MalformedResponse(format!("Header block exceeds {} bytes", max)))
}
