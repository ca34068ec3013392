//! Scripted connections for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::ClientConfig;
use crate::transport::{Connection, Connector};
use crate::{NetError, Target};

/// Replays a fixed byte stream, `read_size` bytes per read at most
pub(crate) struct MockConnection {
    data: Vec<u8>,
    pos: usize,
    read_size: usize,
    sent: Vec<u8>,
    closed: Arc<AtomicUsize>,
}

impl MockConnection {
    pub(crate) fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            read_size: usize::MAX,
            sent: Vec::new(),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn read_size(mut self, n: usize) -> Self {
        self.read_size = n;
        self
    }

    pub(crate) fn sent(&self) -> &[u8] {
        &self.sent
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl Connection for MockConnection {
    fn send_all(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        self.sent.extend_from_slice(bytes);
        Ok(())
    }

    fn receive_some(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        let n = buf.len().min(self.read_size).min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serves scripted responses keyed by target URL
#[derive(Default)]
pub(crate) struct MockConnector {
    responses: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    opened: Mutex<Vec<String>>,
    closed: Arc<AtomicUsize>,
    read_size: Option<usize>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `url`; the last queued response repeats
    pub(crate) fn respond(self, url: &str, response: impl Into<Vec<u8>>) -> Self {
        if let Ok(mut map) = self.responses.lock() {
            map.entry(url.to_string()).or_default().push_back(response.into());
        }
        self
    }

    pub(crate) fn read_size(mut self, n: usize) -> Self {
        self.read_size = Some(n);
        self
    }

    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    fn open(&self, target: &Target, _config: &ClientConfig) -> Result<Box<dyn Connection>, NetError> {
        let url = target.to_string();
        self.opened.lock().unwrap().push(url.clone());

        let mut map = self.responses.lock().unwrap();
        let queue = map
            .get_mut(&url)
            .ok_or_else(|| NetError::Transport(format!("connect to {} failed: refused", url)))?;
        let data = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };

        let mut conn = MockConnection::new(data);
        conn.closed = Arc::clone(&self.closed);
        if let Some(n) = self.read_size {
            conn = conn.read_size(n);
        }
        Ok(Box::new(conn))
    }
}

/// Build a raw response with a `Content-Length` body
pub(crate) fn response(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {}\r\n", status).into_bytes();
    for (name, value) in headers {
        out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
    }
    out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
    out.extend_from_slice(body);
    out
}
