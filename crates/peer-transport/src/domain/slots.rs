//! Consensus slot arithmetic.
//!
//! Block timestamps are seconds since the chain epoch; wall-clock time is
//! unix milliseconds.

use super::config::SlotConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotClock {
    epoch_unix_secs: u64,
    interval_secs: u64,
}

impl SlotClock {
    pub fn new(config: &SlotConfig) -> Self {
        Self {
            epoch_unix_secs: config.epoch_unix_secs,
            interval_secs: config.interval_secs.max(1),
        }
    }

    /// Seconds since the chain epoch at `unix_millis`.
    pub fn epoch_time(&self, unix_millis: u64) -> u64 {
        (unix_millis / 1000).saturating_sub(self.epoch_unix_secs)
    }

    /// Slot containing the given epoch time.
    pub fn slot_number(&self, epoch_time: u64) -> u64 {
        epoch_time / self.interval_secs
    }

    /// The slot after the one containing `unix_millis`.
    pub fn next_slot(&self, unix_millis: u64) -> u64 {
        self.slot_number(self.epoch_time(unix_millis)) + 1
    }

    /// Slots between the chain tip's slot and the next slot.
    pub fn lag(&self, last_block_timestamp: u64, unix_millis: u64) -> u64 {
        self.next_slot(unix_millis)
            .saturating_sub(self.slot_number(last_block_timestamp))
    }
}
