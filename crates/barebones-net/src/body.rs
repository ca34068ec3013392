//! Body Framing
//!
//! Decodes a response body from the bytes already buffered behind the head
//! plus whatever is still on the connection. Exactly one framing applies:
//! chunked transfer coding, `Content-Length`, or read-until-close. Gzip
//! content coding is undone after framing.

use std::fmt;
use std::io::Read;

use flate2::read::MultiGzDecoder;

use crate::config::ClientConfig;
use crate::diagnostics::{Diagnostics, Event};
use crate::http1::ResponseHead;
use crate::transport::Connection;
use crate::NetError;

/// Longest accepted chunk-size or trailer line
const MAX_CHUNK_LINE: usize = 4096;

/// Upper bound on up-front allocation for a declared `Content-Length`
const MAX_PREALLOC: u64 = 1024 * 1024;

/// How the end of the body is found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Chunked transfer encoding
    Chunked,
    /// Content-Length specified
    ContentLength(u64),
    /// Read until connection close
    UntilClose,
}

impl Framing {
    /// Pick the framing from the response headers
    pub fn detect(head: &ResponseHead, diag: &dyn Diagnostics) -> Result<Self, NetError> {
        let chunked = head
            .header_all("transfer-encoding")
            .flat_map(|v| v.split(','))
            .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
        if chunked {
            return Ok(Framing::Chunked);
        }

        let mut lengths = head.header_all("content-length").map(str::trim);
        let Some(first) = lengths.next() else {
            return Ok(Framing::UntilClose);
        };
        let Some(len) = parse_decimal(first) else {
            diag.event(&Event::Anomaly {
                message: format!("Unusable Content-Length {:?}, reading until close", first),
            });
            return Ok(Framing::UntilClose);
        };

        // Repeats must name the same length, however they are spelled
        if lengths.any(|other| parse_decimal(other) != Some(len)) {
            return Err(NetError::MalformedResponse("Conflicting Content-Length headers".into()));
        }
        Ok(Framing::ContentLength(len))
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::Chunked => write!(f, "chunked"),
            Framing::ContentLength(_) => write!(f, "content-length"),
            Framing::UntilClose => write!(f, "connection-close"),
        }
    }
}

fn parse_decimal(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Rolling buffer over the leftover head bytes followed by socket reads
struct WireReader<'a> {
    conn: &'a mut dyn Connection,
    buf: Vec<u8>,
    pos: usize,
    chunk: Vec<u8>,
}

impl<'a> WireReader<'a> {
    fn new(conn: &'a mut dyn Connection, leftover: Vec<u8>, read_size: usize) -> Self {
        Self {
            conn,
            buf: leftover,
            pos: 0,
            chunk: vec![0u8; read_size],
        }
    }

    fn buffered(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    /// Pull one read off the socket; `false` on EOF
    fn fill(&mut self) -> Result<bool, NetError> {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        let n = self.conn.receive_some(&mut self.chunk)?;
        self.buf.extend_from_slice(&self.chunk[..n]);
        Ok(n > 0)
    }

    /// Make at least `n` bytes available; `false` if EOF came first
    fn ensure(&mut self, n: usize) -> Result<bool, NetError> {
        while self.buffered().len() < n {
            if !self.fill()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Next LF-terminated line without its line ending; `None` on EOF
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, NetError> {
        let mut scanned = 0;
        loop {
            if let Some(i) = self.buffered()[scanned..].iter().position(|&b| b == b'\n') {
                let end = scanned + i;
                let raw = &self.buffered()[..end];
                let line = raw.strip_suffix(b"\r").unwrap_or(raw).to_vec();
                self.pos += end + 1;
                return Ok(Some(line));
            }
            scanned = self.buffered().len();
            if scanned > MAX_CHUNK_LINE {
                return Err(NetError::Framing(format!("Chunk line exceeds {} bytes", MAX_CHUNK_LINE)));
            }
            if !self.fill()? {
                return Ok(None);
            }
        }
    }

    /// Append exactly `n` bytes to `out`; `false` if EOF came first
    fn read_exact_into(&mut self, n: u64, out: &mut Vec<u8>) -> Result<bool, NetError> {
        let mut remaining = n;
        loop {
            let take = remaining.min(self.buffered().len() as u64) as usize;
            out.extend_from_slice(&self.buffered()[..take]);
            self.pos += take;
            remaining -= take as u64;

            if remaining == 0 {
                return Ok(true);
            }
            if !self.fill()? {
                return Ok(false);
            }
        }
    }

    fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<(), NetError> {
        loop {
            out.extend_from_slice(self.buffered());
            self.pos = self.buf.len();
            if !self.fill()? {
                return Ok(());
            }
        }
    }

    /// Consume the line ending that closes a chunk's data
    fn expect_crlf(&mut self) -> Result<(), NetError> {
        if !self.ensure(1)? {
            return Err(NetError::Framing("Stream ended before chunk terminator".into()));
        }
        if self.buffered()[0] == b'\n' {
            self.pos += 1;
            return Ok(());
        }
        if !self.ensure(2)? {
            return Err(NetError::Framing("Stream ended before chunk terminator".into()));
        }
        if &self.buffered()[..2] != b"\r\n" {
            return Err(NetError::Framing("Chunk data not followed by CRLF".into()));
        }
        self.pos += 2;
        Ok(())
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, NetError> {
    let invalid = || NetError::Framing(format!("Invalid chunk size: {:?}", String::from_utf8_lossy(line)));

    let text = std::str::from_utf8(line).map_err(|_| invalid())?;
    // Chunk extensions are ignored
    let size = text.split(';').next().unwrap_or_default().trim();

    if size.is_empty() || size.len() > 16 || !size.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    u64::from_str_radix(size, 16).map_err(|_| invalid())
}

fn read_chunked(reader: &mut WireReader<'_>) -> Result<Vec<u8>, NetError> {
    let mut body = Vec::new();

    loop {
        let line = reader
            .read_line()?
            .ok_or_else(|| NetError::Framing("Missing chunk size CRLF".into()))?;
        let size = parse_chunk_size(&line)?;

        if size == 0 {
            // Trailer fields are discarded; EOF here still ends a complete body
            while let Some(trailer) = reader.read_line()? {
                if trailer.is_empty() {
                    break;
                }
            }
            return Ok(body);
        }

        if !reader.read_exact_into(size, &mut body)? {
            return Err(NetError::Framing(format!("Chunk truncated: expected {} bytes", size)));
        }
        reader.expect_crlf()?;
    }
}

fn is_gzip(head: &ResponseHead) -> bool {
    head.header("content-encoding")
        .map(str::trim)
        .is_some_and(|v| v.eq_ignore_ascii_case("gzip") || v.eq_ignore_ascii_case("x-gzip"))
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>, NetError> {
    let mut out = Vec::with_capacity(data.len() * 2);
    MultiGzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| NetError::Framing(format!("gzip decompression failed: {}", e)))?;
    Ok(out)
}

/// Decode the body that follows `head`.
///
/// `leftover` holds bytes read past the header block; they are consumed
/// before the connection is read again.
pub fn decode_body(
    head: &ResponseHead,
    leftover: Vec<u8>,
    conn: &mut dyn Connection,
    config: &ClientConfig,
    diag: &dyn Diagnostics,
) -> Result<Vec<u8>, NetError> {
    let framing = Framing::detect(head, diag)?;
    let mut reader = WireReader::new(conn, leftover, config.receive_buffer_size());

    let raw = match framing {
        Framing::Chunked => read_chunked(&mut reader)?,
        Framing::ContentLength(len) => {
            let mut body = Vec::with_capacity(len.min(MAX_PREALLOC) as usize);
            if !reader.read_exact_into(len, &mut body)? {
                return Err(NetError::Framing(format!(
                    "Body truncated: expected {} bytes, got {}",
                    len,
                    body.len()
                )));
            }
            body
        }
        Framing::UntilClose => {
            let mut body = Vec::new();
            reader.read_to_end(&mut body)?;
            body
        }
    };

    let gzip = is_gzip(head);
    let body = if gzip && !raw.is_empty() { gunzip(&raw)? } else { raw };

    diag.event(&Event::BodyDecoded {
        framing,
        bytes: body.len(),
        gzip,
    });

    Ok(body)
}
