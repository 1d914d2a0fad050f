//! Synthetic video source
//!
//! Produces a moving gradient so the session can be exercised end to
//! end without a camera. Useful for the demo binary and integration
//! tests; a real deployment plugs a capture pipeline in behind
//! [`VideoSource`] instead.

use bytes::Bytes;
use parking_lot::Mutex;

use super::{VideoFrame, VideoSource};

/// Test-pattern source with a fixed frame size
pub struct TestPatternSource {
    width: u32,
    height: u32,
    state: Mutex<PatternState>,
}

struct PatternState {
    sequence: u64,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            state: Mutex::new(PatternState { sequence: 0 }),
        }
    }

    fn render(&self, sequence: u64) -> Bytes {
        let phase = (sequence & 0xff) as u8;
        let mut data = Vec::with_capacity((self.width * self.height) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                data.push(((x + y) as u8).wrapping_add(phase));
            }
        }
        Bytes::from(data)
    }
}

impl VideoSource for TestPatternSource {
    fn frame_size(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn latest_frame(&self) -> Option<VideoFrame> {
        let mut state = self.state.lock();
        state.sequence += 1;
        let sequence = state.sequence;
        drop(state);

        Some(VideoFrame::new(
            self.render(sequence),
            self.width,
            self.height,
            sequence,
        ))
    }
}
