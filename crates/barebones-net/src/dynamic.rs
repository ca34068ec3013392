//! Dynamic Content Detection
//!
//! Fetches a URL twice and compares the normalized bodies. Identical bodies
//! mean the resource can be treated as static.

use crate::client::HttpClient;
use crate::config::FailurePolicy;
use crate::diagnostics::Event;
use crate::{NetError, Target};

/// Tokens removed before comparing bodies. Only the token goes; the value
/// after `=` stays.
const VOLATILE_TOKENS: [&[u8]; 2] = [b"session_id=", b"timestamp="];

/// Result of a dynamic-content check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Both fetches agreed; holds the first body as fetched
    Static(Vec<u8>),
    /// The fetches disagreed
    Dynamic,
}

impl CheckOutcome {
    pub fn is_static(&self) -> bool {
        matches!(self, CheckOutcome::Static(_))
    }

    /// Representative body, if the content is static
    pub fn body(&self) -> Option<&[u8]> {
        match self {
            CheckOutcome::Static(body) => Some(body),
            CheckOutcome::Dynamic => None,
        }
    }
}

/// Strip volatile tokens from a body
pub fn normalize(body: &[u8]) -> Vec<u8> {
    VOLATILE_TOKENS
        .iter()
        .fold(body.to_vec(), |acc, token| remove_all(&acc, token))
}

fn remove_all(haystack: &[u8], needle: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

impl HttpClient {
    /// Fetch `url` twice and report whether its content is reproducible
    pub fn check(&self, url: &str) -> Result<CheckOutcome, NetError> {
        self.check_target(&self.parse_url(url)?)
    }

    /// Check an already parsed target
    pub fn check_target(&self, target: &Target) -> Result<CheckOutcome, NetError> {
        let bodies = if self.config.concurrent_check {
            self.fetch_twice_concurrently(target)
        } else {
            self.fetch(target).and_then(|first| Ok((first, self.fetch(target)?)))
        };

        let (first, second) = match (bodies, self.config.failure_policy) {
            (Ok(pair), _) => pair,
            (Err(e), FailurePolicy::Propagate) => return Err(e),
            (Err(_), FailurePolicy::TreatAsDynamic) => {
                self.diagnostics.event(&Event::Dynamic { target });
                return Ok(CheckOutcome::Dynamic);
            }
        };

        if normalize(&first) == normalize(&second) {
            self.diagnostics.event(&Event::Static { target, bytes: first.len() });
            Ok(CheckOutcome::Static(first))
        } else {
            self.diagnostics.event(&Event::Dynamic { target });
            Ok(CheckOutcome::Dynamic)
        }
    }

    /// Both fetches on the blocking pool; each owns its client clone and connections
    fn fetch_twice_concurrently(&self, target: &Target) -> Result<(Vec<u8>, Vec<u8>), NetError> {
        let spawn = |client: HttpClient, target: Target| smol::unblock(move || client.fetch(&target));

        let (first, second) = smol::block_on(smol::future::zip(
            spawn(self.clone(), target.clone()),
            spawn(self.clone(), target.clone()),
        ));

        Ok((first?, second?))
    }
}
