//! Per-symbol sequence counter
//!
//! One counter numbers everything that happens to a symbol: order
//! admissions, fills, and outbound events all draw from it. Admission
//! sequences are the only ones journaled, so persisted streams have
//! gaps; the counter itself never goes backwards except under replay.

/// Monotonic sequence source, starting at 1
#[derive(Debug, Clone)]
pub struct Sequencer {
    next: u64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Consume and return the next sequence number
    pub fn next_sequence(&mut self) -> u64 {
        let sequence = self.next;
        self.next += 1;
        sequence
    }

    /// The value the next call will consume, without consuming it
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// The last consumed value; 0 if nothing was consumed yet
    pub fn last_consumed(&self) -> u64 {
        self.next - 1
    }

    /// Resume after `last_consumed`, e.g. from a snapshot
    pub fn restore(&mut self, last_consumed: u64) {
        self.next = last_consumed + 1;
    }

    /// Force the counter so the next consumption yields `sequence`
    ///
    /// Replay uses this to re-run a journaled operation under its
    /// original number.
    pub fn rewind_to(&mut self, sequence: u64) {
        self.next = sequence;
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}
