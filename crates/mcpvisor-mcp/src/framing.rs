//! Newline framing for a server's stdout.

/// Accumulates raw stdout bytes and yields complete lines.
///
/// A trailing partial line stays buffered until the rest of it arrives.
/// Blank lines are skipped and a trailing `\r` is stripped.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and drain every complete line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let line = String::from_utf8_lossy(&self.buf[start..end]);
            let line = line.trim_end_matches('\r');
            if !line.trim().is_empty() {
                lines.push(line.to_string());
            }
            start = end + 1;
        }
        self.buf.drain(..start);

        lines
    }

    /// Bytes of the incomplete trailing line.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}
