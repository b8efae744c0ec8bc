use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, info};

/// File offset where a fresh state file keeps its insertion counter
pub const INITIAL_OFFSET: usize = 0x5E;
/// Counter value at which the tracked offset migrates to the next slot
const ROLLOVER: i32 = 255;

/// Tracks which header slot holds the insertion counter.
///
/// The slot starts at [`INITIAL_OFFSET`] when the store is opened and
/// moves 4 bytes forward each time the counter reaches the rollover
/// value. The caller advances the slot only after the mutated buffer has
/// been persisted, so a failed write never leaves the tracked offset
/// ahead of the bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSlot {
    offset: usize,
}

impl CounterSlot {
    pub fn new() -> Self {
        Self {
            offset: INITIAL_OFFSET,
        }
    }

    /// Increment the counter within `buf` as a little-endian i32.
    /// Returns true when the new value reached the rollover threshold and
    /// the slot should advance once the buffer is persisted.
    pub fn apply(&self, buf: &mut [u8]) -> bool {
        let Some(window) = buf.get_mut(self.offset..self.offset + 4) else {
            debug!(
                "counter slot {:#x} lies outside the file, skipping",
                self.offset
            );
            return false;
        };
        let count = LittleEndian::read_i32(window).wrapping_add(1);
        LittleEndian::write_i32(window, count);
        count >= ROLLOVER
    }

    /// Move the tracked slot to the adjacent counter
    pub fn advance(&mut self) {
        self.offset += 4;
        info!(
            "insertion counter rolled over, now tracking offset {:#x}",
            self.offset
        );
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Default for CounterSlot {
    fn default() -> Self {
        Self::new()
    }
}
