use tracing::trace;

use crate::reading::FRAME_LEN;

/// Little-endian value at the start of a fragment that opens a new burst.
pub const BURST_MARKER: u16 = 776;

/// Frames are only sliced off once the buffer holds more than this many bytes.
const DRAIN_THRESHOLD: usize = 20;

/// Accumulates bulk-channel fragments and slices them into 8-byte frames.
///
/// A fragment starting with [`BURST_MARKER`] replaces whatever was buffered;
/// any other fragment is appended. Once the buffer grows past 20 bytes every
/// complete frame is drained from the front and only the tail is kept. Bursts
/// shorter than 21 bytes therefore wait for the next fragment before
/// producing anything.
#[derive(Debug, Default)]
pub struct BulkReassembler {
    buffer: Vec<u8>,
}

impl BulkReassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one fragment and returns every frame it completed, in order.
    pub fn feed(&mut self, fragment: &[u8]) -> Vec<[u8; FRAME_LEN]> {
        if starts_burst(fragment) {
            if !self.buffer.is_empty() {
                trace!(
                    discarded = self.buffer.len(),
                    "burst marker dropped buffered bytes"
                );
            }
            self.buffer.clear();
        }
        self.buffer.extend_from_slice(fragment);

        if self.buffer.len() <= DRAIN_THRESHOLD {
            return Vec::new();
        }

        let (frames, remainder) = self.buffer.as_chunks::<FRAME_LEN>();
        let frames = frames.to_vec();
        let consumed = self.buffer.len() - remainder.len();
        self.buffer.drain(..consumed);
        frames
    }

    /// Bytes waiting for the rest of their frame.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }
}

fn starts_burst(fragment: &[u8]) -> bool {
    matches!(fragment, [low, high, ..] if u16::from_le_bytes([*low, *high]) == BURST_MARKER)
}
