//! Block window planning for chunked `eth_getLogs` scans

use serde::Serialize;

/// Inclusive block range queried in one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockWindow {
    pub from: u64,
    pub to: u64,
}

/// Lower bound after clamping the range to the most recent `max_window` blocks
pub fn effective_from(from_block: u64, to_block: u64, max_window: u64) -> u64 {
    from_block.max(to_block.saturating_sub(max_window))
}

/// Ascending, non-overlapping windows of at most `size` blocks covering `from..=to`
pub fn windows(from: u64, to: u64, size: u64) -> Windows {
    Windows {
        next: (from <= to).then_some(from),
        to,
        size: size.max(1),
    }
}

#[derive(Debug, Clone)]
pub struct Windows {
    next: Option<u64>,
    to: u64,
    size: u64,
}

impl Iterator for Windows {
    type Item = BlockWindow;

    fn next(&mut self) -> Option<BlockWindow> {
        let from = self.next?;
        let end = from.saturating_add(self.size - 1).min(self.to);
        self.next = if end >= self.to { None } else { Some(end + 1) };
        Some(BlockWindow { from, to: end })
    }
}
