//! Bounded line scanning (L1).
//!
//! Splits a log blob into LF/CRLF-delimited lines and drops any line over
//! the 64 KiB regex-safety cap. No trimming, no ANSI handling here.

/// Regex-safety bound: lines longer than this are discarded whole.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Ordered, finite, non-restartable sequence of bounded lines.
pub struct LineSource<'src> {
    inner: std::str::Lines<'src>,
    dropped: usize,
}

impl<'src> LineSource<'src> {
    pub fn new(input: &'src str) -> Self {
        Self {
            inner: input.lines(),
            dropped: 0,
        }
    }

    /// Number of over-cap lines discarded so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl<'src> Iterator for LineSource<'src> {
    type Item = &'src str;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.inner.by_ref() {
            if line.len() > MAX_LINE_BYTES {
                self.dropped += 1;
                continue;
            }
            return Some(line);
        }
        None
    }
}
