//! Work handed from the periodic sense phase to the background loop.

use heapless::spsc::Consumer;

use crate::detector::DetectionState;

pub const QUEUE_CAPACITY: usize = 8;

/// Pending actuation, consumed at most once by the background loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuationRequest {
    /// Show the given state on the strip and keep it there.
    Render(DetectionState),
    /// Light the strip for `duration_ms`, then clear it.
    Pulse { duration_ms: u32 },
}

/// Drain the queue, keeping only the newest item.
pub fn dequeue_last<T, const N: usize>(consumer: &mut Consumer<'_, T, N>) -> Option<T> {
    let mut last_item = None;
    while let Some(item) = consumer.dequeue() {
        last_item = Some(item);
    }
    last_item
}
