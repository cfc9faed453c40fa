//! The bounded receive buffer shared by every command and by URC recognition.

use core::{cmp::min, str::from_utf8};
use heapless::{String, Vec};

use crate::log;

/// Size of the receive window, in bytes.
pub const RX_BUFFER_LEN: usize = 128;

/// Raw modem output waiting to be parsed.
///
/// All scanning methods are safe to call repeatedly while the buffer grows between calls: a
/// pattern that is not fully present yet is reported as missing and nothing is consumed.
///
/// The buffer may hold socket data that nobody has read yet in front of a command's answer. The
/// parsing methods ([ReceiveBuffer::chop_until], [ReceiveBuffer::read_int],
/// [ReceiveBuffer::take_line] and friends) only look at the reply window, which starts where the
/// buffer ended when the last request was written ([ReceiveBuffer::mark_reply]).
pub struct ReceiveBuffer {
    buffer: Vec<u8, RX_BUFFER_LEN>,
    reply_start: usize,
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveBuffer {
    pub const fn new() -> Self {
        ReceiveBuffer {
            buffer: Vec::new(),
            reply_start: 0,
        }
    }

    /// Append as many bytes as fit. Returns the number of bytes taken.
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        let n = min(self.available_bytes(), bytes.len());
        self.buffer
            .extend_from_slice(&bytes[..n])
            .ok(/* n never exceeds the free space */);
        n
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of bytes waiting in the buffer.
    pub fn stored_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Free space left in the buffer.
    pub fn available_bytes(&self) -> usize {
        self.buffer.capacity() - self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Start the reply window at the end of what is buffered now.
    pub fn mark_reply(&mut self) {
        self.reply_start = self.buffer.len();
    }

    /// Where the reply window starts.
    pub fn reply_start(&self) -> usize {
        self.reply_start
    }

    /// The bytes in the reply window.
    pub fn reply(&self) -> &[u8] {
        &self.buffer[self.reply_start..]
    }

    /// Index of the first occurrence of `pattern`.
    pub fn position(&self, pattern: &[u8]) -> Option<usize> {
        find(&self.buffer, pattern)
    }

    /// Index of the first occurrence of `pattern` at or after `from`.
    pub fn position_from(&self, from: usize, pattern: &[u8]) -> Option<usize> {
        let tail = self.buffer.get(from..)?;
        find(tail, pattern).map(|i| i + from)
    }

    /// Check whether `pattern` is anywhere in the reply window, without consuming anything.
    pub fn locate(&self, pattern: &[u8]) -> bool {
        self.position_from(self.reply_start, pattern).is_some()
    }

    pub fn starts_with(&self, pattern: &[u8]) -> bool {
        self.buffer.starts_with(pattern)
    }

    /// Discard the reply window up to `pattern`, and the pattern itself if `consume_pattern` is
    /// set.
    ///
    /// Returns false, leaving the buffer untouched, if the pattern has not arrived yet.
    pub fn chop_until(&mut self, pattern: &[u8], consume_pattern: bool) -> bool {
        let Some(position) = self.position_from(self.reply_start, pattern) else {
            return false;
        };

        let end = if consume_pattern {
            position + pattern.len()
        } else {
            position
        };
        self.excise(self.reply_start, end);
        true
    }

    /// Copy the bytes strictly between the first `start` in the reply window and the next `end`
    /// into `out`.
    ///
    /// At most `out.len()` bytes are written. Returns the number of bytes copied, or None (with
    /// `out` untouched) if either delimiter is missing.
    pub fn extract_substring(&self, start: &[u8], end: &[u8], out: &mut [u8]) -> Option<usize> {
        let from = self.position_from(self.reply_start, start)? + start.len();
        let to = self.position_from(from, end)?;

        let n = min(to - from, out.len());
        out[..n].copy_from_slice(&self.buffer[from..from + n]);
        Some(n)
    }

    /// Like [ReceiveBuffer::extract_substring], but into a string.
    ///
    /// Returns None if the delimiters are missing or the text is not valid UTF-8.
    pub fn extract_str<const N: usize>(&self, start: &[u8], end: &[u8]) -> Option<String<N>> {
        let mut raw = [0u8; RX_BUFFER_LEN];
        let n = self.extract_substring(start, end, &mut raw[..min(N, RX_BUFFER_LEN)])?;

        let mut out = String::new();
        out.push_str(from_utf8(&raw[..n]).ok()?).ok()?;
        Some(out)
    }

    /// The first complete line in the reply window that starts with `prefix`, without its line
    /// ending.
    pub fn find_line(&self, prefix: &[u8]) -> Option<&str> {
        let start = self.position_from(self.reply_start, prefix)?;
        let end = self.position_from(start, b"\r\n")?;
        from_utf8(&self.buffer[start..end]).ok()
    }

    /// Consume a decimal integer at the start of the reply window, skipping leading spaces.
    ///
    /// Stops at the first non-digit. Returns None if there are no digits.
    pub fn read_int(&mut self) -> Option<u32> {
        let from = self.reply_start;
        let skip = self.reply().iter().take_while(|&&b| b == b' ').count();
        self.excise(from, from + skip);

        let digits = self
            .reply()
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            return None;
        }

        let value = self.reply()[..digits]
            .iter()
            .fold(0u32, |acc, b| acc.saturating_mul(10).saturating_add(u32::from(b - b'0')));
        self.excise(from, from + digits);
        Some(value)
    }

    /// The first byte of the reply window.
    pub fn peek(&self) -> Option<u8> {
        self.reply().first().copied()
    }

    /// Consume the first byte of the reply window.
    pub fn read(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.excise(self.reply_start, self.reply_start + 1);
        Some(byte)
    }

    /// Consume up to `buf.len()` bytes into `buf`.
    pub fn read_into(&mut self, buf: &mut [u8]) -> usize {
        let n = min(buf.len(), self.buffer.len());
        buf[..n].copy_from_slice(&self.buffer[..n]);
        self.discard(n);
        n
    }

    /// Consume the next complete, non-empty line of the reply window, without its line ending.
    ///
    /// Returns None if no complete line is buffered yet.
    pub fn take_line(&mut self) -> Option<String<RX_BUFFER_LEN>> {
        const LINE_END: &[u8] = b"\n";
        loop {
            let from = self.reply_start;
            let position = self.position_from(from, LINE_END)?;
            let line_end = position + LINE_END.len();

            let Ok(line) = from_utf8(&self.buffer[from..position]) else {
                log::warn!("dropping non utf-8 line {:?}", &self.buffer[from..position]);
                self.excise(from, line_end);
                continue;
            };

            // The modem likes to be inconsistent with white space
            let line = line.trim();
            if line.is_empty() {
                self.excise(from, line_end);
                continue;
            }

            let mut out = String::new();
            out.push_str(line).ok(/* a line never exceeds the buffer */);
            log::trace!("RECV LINE: {:?}", out.as_str());
            self.excise(from, line_end);
            return Some(out);
        }
    }

    /// Remove the bytes in `start..end`, keeping what came before and after.
    pub fn excise(&mut self, start: usize, end: usize) {
        let end = min(end, self.buffer.len());
        if start >= end {
            return;
        }
        self.buffer[start..].rotate_left(end - start);
        self.buffer.truncate(self.buffer.len() - (end - start));

        if self.reply_start >= end {
            self.reply_start -= end - start;
        } else if self.reply_start > start {
            self.reply_start = start;
        }
    }

    /// Consume `n` bytes from the head of the buffer.
    pub fn discard(&mut self, n: usize) {
        self.excise(0, n);
    }

    /// Discard everything.
    pub fn flush(&mut self) {
        self.buffer.clear();
        self.reply_start = 0;
    }
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
