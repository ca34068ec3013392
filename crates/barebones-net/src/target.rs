//! Request Targets
//!
//! Splits an absolute `http`/`https` URL into scheme, host, port and path,
//! and resolves redirect locations against the current target.

use std::fmt;

use crate::NetError;

/// URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Port used when the URL does not name one
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Scheme::Http => "http://",
            Scheme::Https => "https://",
        }
    }

    /// Strip a case-insensitive `http://` or `https://` prefix
    fn split_prefix(url: &str) -> Option<(Scheme, &str)> {
        [Scheme::Https, Scheme::Http].into_iter().find_map(|scheme| {
            let prefix = scheme.prefix();
            let head = url.get(..prefix.len())?;
            head.eq_ignore_ascii_case(prefix)
                .then(|| (scheme, &url[prefix.len()..]))
        })
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved scheme/host/port/path for one hop
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    scheme: Scheme,
    /// ASCII host; IPv6 literals keep their brackets
    host: String,
    port: u16,
    /// Path plus query, always starting with `/`
    path: String,
}

impl Target {
    /// Parse `scheme://host[:port][/path]`
    pub fn parse(url: &str) -> Result<Self, NetError> {
        let url = url.trim();
        let (scheme, rest) = Scheme::split_prefix(url)
            .ok_or_else(|| NetError::InvalidUrl(format!("Must start with http:// or https://: {}", url)))?;

        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);

        if authority.contains('@') {
            return Err(NetError::InvalidUrl(format!("Credentials in URL are not supported: {}", url)));
        }

        let (host, port) = split_host_port(authority)?;

        Ok(Self {
            scheme,
            host: encode_host(host)?,
            port: port.unwrap_or_else(|| scheme.default_port()),
            path: request_path(tail)?,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_https(&self) -> bool {
        self.scheme == Scheme::Https
    }

    /// Whether the port is the scheme's default
    pub fn is_default_port(&self) -> bool {
        self.port == self.scheme.default_port()
    }

    /// Value for the `Host` header; the port is only included when non-default
    pub fn host_header(&self) -> String {
        if self.is_default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Host in the form the resolver and TLS server name expect
    pub fn connect_host(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }

    /// Resolve a `Location` header value against this target
    pub fn resolve_location(&self, location: &str) -> Result<Target, NetError> {
        let location = location.trim();

        if has_scheme(location) {
            return Target::parse(location);
        }

        if let Some(rest) = location.strip_prefix("//") {
            return Target::parse(&format!("{}://{}", self.scheme, rest));
        }

        let path = request_path(location)?;
        let path = if path.starts_with('/') { path } else { format!("/{}", path) };

        Ok(Self {
            path,
            ..self.clone()
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.host_header(), self.path)
    }
}

/// `scheme://` before any path separator
fn has_scheme(location: &str) -> bool {
    match location.find("://") {
        Some(i) => {
            let scheme = &location[..i];
            !scheme.is_empty()
                && scheme.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
        }
        None => false,
    }
}

fn split_host_port(authority: &str) -> Result<(&str, Option<u16>), NetError> {
    let (host, port) = if authority.starts_with('[') {
        let close = authority
            .find(']')
            .ok_or_else(|| NetError::InvalidUrl(format!("Unterminated IPv6 literal: {}", authority)))?;
        let (host, after) = authority.split_at(close + 1);
        match after.strip_prefix(':') {
            Some(port) => (host, Some(port)),
            None if after.is_empty() => (host, None),
            None => return Err(NetError::InvalidUrl(format!("Invalid authority: {}", authority))),
        }
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(NetError::InvalidUrl("Missing host".into()));
    }

    let port = match port {
        None | Some("") => None,
        Some(p) => {
            let n = p
                .bytes()
                .all(|b| b.is_ascii_digit())
                .then(|| p.parse::<u16>().ok())
                .flatten()
                .filter(|n| *n != 0)
                .ok_or_else(|| NetError::InvalidUrl(format!("Invalid port number: {}", p)))?;
            Some(n)
        }
    };

    Ok((host, port))
}

/// IDNA-encode a host name to its ASCII form
fn encode_host(host: &str) -> Result<String, NetError> {
    url::Host::parse(host)
        .map(|h| h.to_string())
        .map_err(|e| NetError::InvalidUrl(format!("Failed to encode hostname {}: {}", host, e)))
}

/// Drop the fragment and default an empty path to `/`.
///
/// The result goes onto the request line verbatim, so whitespace and
/// control bytes are refused.
fn request_path(tail: &str) -> Result<String, NetError> {
    let tail = tail.split('#').next().unwrap_or_default();
    if let Some(b) = tail.bytes().find(|&b| b <= 0x20 || b == 0x7F) {
        return Err(NetError::InvalidUrl(format!(
            "Path contains forbidden byte 0x{:02X}: {:?}",
            b, tail
        )));
    }

    Ok(if tail.is_empty() {
        "/".to_string()
    } else if tail.starts_with('?') {
        format!("/{}", tail)
    } else {
        tail.to_string()
    })
}
