//! Video source boundary
//!
//! Frame capture and encoding live outside this crate; the session only
//! needs a readiness probe and the most recent encoded frame. The
//! session's copy loop is a no-op whenever the source is unavailable.

pub mod frame;
pub mod test_pattern;

pub use frame::VideoFrame;
pub use test_pattern::TestPatternSource;

/// Degenerate capture surfaces (0x0, 1x1 placeholder textures) report
/// sizes at or below this and do not count as ready.
pub const MIN_FRAME_DIMENSION: u32 = 16;

/// External video source feeding the outbound track
pub trait VideoSource: Send + Sync {
    /// Size of the frames the source currently produces, if any
    fn frame_size(&self) -> Option<(u32, u32)>;

    /// Most recent encoded frame, replaced per capture tick
    fn latest_frame(&self) -> Option<VideoFrame>;

    /// Whether the source produces a valid, non-trivial frame size
    fn is_ready(&self) -> bool {
        self.frame_size()
            .map_or(false, |(w, h)| w > MIN_FRAME_DIMENSION && h > MIN_FRAME_DIMENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSize(Option<(u32, u32)>);

    impl VideoSource for FixedSize {
        fn frame_size(&self) -> Option<(u32, u32)> {
            self.0
        }
        fn latest_frame(&self) -> Option<VideoFrame> {
            None
        }
    }

    #[test]
    fn test_degenerate_sizes_not_ready() {
        assert!(!FixedSize(None).is_ready());
        assert!(!FixedSize(Some((0, 0))).is_ready());
        assert!(!FixedSize(Some((1, 1))).is_ready());
        assert!(!FixedSize(Some((16, 16))).is_ready());
        assert!(FixedSize(Some((640, 480))).is_ready());
    }
}
