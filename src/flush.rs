//! Flush policies.

/// Controls when a mutation gets written to disk.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Write the whole document after every put/remove. Safest, but most I/O.
    #[default]
    Immediate,
    /// Only write when you call `flush()` yourself. Handy for batches.
    Manual,
}

impl FlushPolicy {
    /// `true` if a mutation should be followed by a flush.
    pub fn flushes_on_write(self) -> bool {
        matches!(self, FlushPolicy::Immediate)
    }
}
