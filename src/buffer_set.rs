//! Buffer set for state machine operations.

/// Buffer set for state machine operations.
///
/// State machines only see payloads: framing happens in the stream layer.
#[derive(Debug)]
pub struct BufferSet {
    /// Payload of the last packet read, with multi-frame packets reassembled
    pub read_buffer: Vec<u8>,
    /// Payload of the next packet to write
    pub write_buffer: Vec<u8>,
    /// Framed bytes of the packet being written
    pub frame_buffer: Vec<u8>,
}

impl BufferSet {
    /// Create a new buffer set.
    pub fn new() -> Self {
        Self {
            read_buffer: Vec::with_capacity(8192),
            write_buffer: Vec::with_capacity(8192),
            frame_buffer: Vec::with_capacity(8192),
        }
    }

    /// Clear every buffer, keeping capacity.
    pub fn clear(&mut self) {
        self.read_buffer.clear();
        self.write_buffer.clear();
        self.frame_buffer.clear();
    }
}

impl Default for BufferSet {
    fn default() -> Self {
        Self::new()
    }
}
