//! Diagnostics
//!
//! Fetch components report what they do through an injected [`Diagnostics`]
//! observer instead of a process-wide logger. [`TracingDiagnostics`] forwards
//! events to `tracing`; tests capture them with [`RecordingDiagnostics`].

use std::fmt;
use std::sync::Mutex;

use tracing::Level;

use crate::body::Framing;
use crate::{NetError, Target};

/// Something worth reporting during a fetch
#[derive(Debug)]
pub enum Event<'a> {
    Connecting { target: &'a Target },
    RequestSent { target: &'a Target, bytes: usize },
    HeadReceived { target: &'a Target, status: u16, headers: usize },
    BodyDecoded { framing: Framing, bytes: usize, gzip: bool },
    Redirect { from: &'a Target, to: &'a Target, status: u16 },
    RedirectLoop { target: &'a Target },
    Failure { target: &'a Target, error: &'a NetError },
    /// A caller-supplied URL that never became a [`Target`]
    InvalidUrl { url: &'a str, error: &'a NetError },
    Static { target: &'a Target, bytes: usize },
    Dynamic { target: &'a Target },
    /// Tolerated protocol oddity
    Anomaly { message: String },
}

impl Event<'_> {
    /// Severity used when the event is logged
    pub fn level(&self) -> Level {
        match self {
            Event::Connecting { .. }
            | Event::RequestSent { .. }
            | Event::HeadReceived { .. }
            | Event::BodyDecoded { .. }
            | Event::Static { .. } => Level::DEBUG,
            Event::Redirect { .. } | Event::Dynamic { .. } => Level::INFO,
            Event::RedirectLoop { .. } | Event::Anomaly { .. } => Level::WARN,
            Event::Failure { .. } | Event::InvalidUrl { .. } => Level::ERROR,
        }
    }
}

impl fmt::Display for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Connecting { target } => {
                write!(f, "Connecting to {} on port {}", target.host(), target.port())
            }
            Event::RequestSent { target, bytes } => write!(f, "Sent GET {} ({} bytes)", target, bytes),
            Event::HeadReceived { target, status, headers } => {
                write!(f, "HTTP {} from {} ({} headers)", status, target, headers)
            }
            Event::BodyDecoded { framing, bytes, gzip } => {
                write!(f, "Body decoded: {} bytes, {} framing", bytes, framing)?;
                if *gzip {
                    f.write_str(", gzip")?;
                }
                Ok(())
            }
            Event::Redirect { from, to, status } => write!(f, "Redirect {} {} -> {}", status, from, to),
            Event::RedirectLoop { target } => write!(f, "Redirect loop detected at {}", target),
            Event::Failure { target, error } => write!(f, "Fetch of {} failed: {}", target, error),
            Event::InvalidUrl { url, error } => write!(f, "Rejected URL {:?}: {}", url, error),
            Event::Static { target, bytes } => write!(f, "Static content at {} ({} bytes)", target, bytes),
            Event::Dynamic { target } => write!(f, "Dynamic content detected at {}", target),
            Event::Anomaly { message } => f.write_str(message),
        }
    }
}

/// Observer for fetch events
pub trait Diagnostics: Send + Sync {
    fn event(&self, event: &Event<'_>);
}

/// Forwards events to `tracing` at the event's level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn event(&self, event: &Event<'_>) {
        match event.level() {
            Level::ERROR => tracing::error!("{}", event),
            Level::WARN => tracing::warn!("{}", event),
            Level::INFO => tracing::info!("{}", event),
            Level::DEBUG => tracing::debug!("{}", event),
            _ => tracing::trace!("{}", event),
        }
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn event(&self, _event: &Event<'_>) {}
}

/// Keeps rendered events in memory
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<(Level, String)>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first
    pub fn events(&self) -> Vec<(Level, String)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Whether any recorded message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.events().iter().any(|(_, msg)| msg.contains(needle))
    }

    /// Number of events recorded at `level`
    pub fn count(&self, level: Level) -> usize {
        self.events().iter().filter(|(l, _)| *l == level).count()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn event(&self, event: &Event<'_>) {
        if let Ok(mut events) = self.events.lock() {
            events.push((event.level(), event.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_levels() {
        let target = Target::parse("http://example.com/").unwrap();
        let err = NetError::Timeout("read".into());
        assert_eq!(Event::Connecting { target: &target }.level(), Level::DEBUG);
        assert_eq!(Event::Dynamic { target: &target }.level(), Level::INFO);
        assert_eq!(Event::Failure { target: &target, error: &err }.level(), Level::ERROR);

        let bad = NetError::InvalidUrl("Missing host".into());
        let event = Event::InvalidUrl { url: "http://", error: &bad };
        assert_eq!(event.level(), Level::ERROR);
        assert_eq!(event.to_string(), "Rejected URL \"http://\": Invalid URL: Missing host");
    }

    #[test]
    fn test_recording() {
        let diag = RecordingDiagnostics::new();
        let from = Target::parse("http://example.com/a").unwrap();
        let to = Target::parse("https://example.com/b").unwrap();
        diag.event(&Event::Redirect { from: &from, to: &to, status: 301 });
        diag.event(&Event::Anomaly { message: "odd header".into() });

        assert_eq!(diag.events().len(), 2);
        assert!(diag.contains("Redirect 301 http://example.com/a -> https://example.com/b"));
        assert_eq!(diag.count(Level::WARN), 1);
    }

    #[test]
    fn test_body_event_display() {
        let event = Event::BodyDecoded { framing: Framing::Chunked, bytes: 12, gzip: true };
        assert_eq!(event.to_string(), "Body decoded: 12 bytes, chunked framing, gzip");
    }
}
