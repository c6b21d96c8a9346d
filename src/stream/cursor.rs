/// Monotonically advancing sample index with wraparound playback.
/// The recording loops indefinitely; there is no explicit reset.
#[derive(Debug, Clone)]
pub struct StreamCursor {
    index: usize,
    total: usize,
}

impl StreamCursor {
    /// `total` must be positive; callers only build a cursor for a
    /// loaded, non-empty recording.
    pub fn new(total: usize) -> Self {
        Self::with_start(total, 0)
    }

    /// Start at `start` modulo the recording length
    pub fn with_start(total: usize, start: usize) -> Self {
        debug_assert!(total > 0);
        Self {
            index: start % total,
            total,
        }
    }

    /// Current position, always in `[0, total)`
    pub fn position(&self) -> usize {
        self.index
    }

    /// Advance one sample, wrapping to 0 upon reaching the end.
    /// Returns the position that was current before the advance.
    pub fn advance(&mut self) -> usize {
        let current = self.index;
        self.index += 1;
        if self.index == self.total {
            self.index = 0;
        }
        current
    }
}
