//! Video frame data

use bytes::Bytes;

/// One encoded video frame handed to the outbound track
#[derive(Debug, Clone)]
pub struct VideoFrame {
    data: Bytes,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Monotonic sequence number from the source
    pub sequence: u64,
}

impl VideoFrame {
    pub fn new(data: Bytes, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            sequence,
        }
    }

    /// Frame payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Frame payload as [`Bytes`] (cheap clone)
    pub fn data_bytes(&self) -> Bytes {
        self.data.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
