//! Newline framing for single-instance messages.
//!
//! Bytes arrive in arbitrary chunks; a line is only handed out once its `\n` has been seen.

/// Why a line could not be decoded.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    /// The peer sent more than the allowed bytes without a newline. The stream is unusable.
    #[error("line exceeds {max} bytes")]
    TooLong { max: usize },
    /// A complete line was not UTF-8. The line is consumed; later lines are still readable.
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// Incremental line splitter with an upper bound on line length.
#[derive(Debug)]
pub struct LineDecoder {
    buf: Vec<u8>,
    max_len: usize,
}

impl LineDecoder {
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len,
        }
    }

    /// Appends received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Drops any buffered partial line (connection replaced or closed).
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Number of buffered bytes not yet returned as a line.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Returns the next complete line without its terminator (`\n` or `\r\n`), or `None` when
    /// only a partial line is buffered.
    pub fn next_line(&mut self) -> Result<Option<String>, FrameError> {
        let Some(end) = self.buf.iter().position(|&b| b == b'\n') else {
            // One extra byte for a `\r` whose `\n` has not arrived yet.
            if self.buf.len() > self.max_len + 1 {
                return Err(FrameError::TooLong { max: self.max_len });
            }
            return Ok(None);
        };

        let mut line: Vec<u8> = self.buf.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.len() > self.max_len {
            return Err(FrameError::TooLong { max: self.max_len });
        }
        String::from_utf8(line)
            .map(Some)
            .map_err(|_| FrameError::InvalidUtf8)
    }
}
