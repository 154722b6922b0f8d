// SPDX-License-Identifier: MIT

use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

use crate::MAX_LINE_BYTES;

/// Splits a byte stream on `\n`, lossily decoding each line as UTF-8 and
/// capping line length. Unlike `tokio::io::Lines`, never errors on invalid
/// UTF-8 — logs are presentational, not authoritative.
pub(crate) struct LineReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { reader: BufReader::new(inner), pending: Vec::new(), eof: false }
    }

    /// Next complete or cap-truncated line, or `None` once the stream and
    /// any trailing fragment are exhausted.
    pub(crate) async fn next_line(&mut self) -> Option<String> {
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
            if self.pending.len() >= MAX_LINE_BYTES {
                let line: Vec<u8> = self.pending.drain(..MAX_LINE_BYTES).collect();
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
            if self.eof {
                if self.pending.is_empty() {
                    return None;
                }
                let line = std::mem::take(&mut self.pending);
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
            let mut buf = [0u8; 4096];
            match self.reader.read(&mut buf).await {
                Ok(0) => self.eof = true,
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(source) => {
                    tracing::warn!(%source, "error reading child output, treating as EOF");
                    self.eof = true;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "line_reader_tests.rs"]
mod tests;
