//! Send queue and the encode-and-write path.
//!
//! Messages sent before the connection is ready wait here in submission
//! order. On secure-ready the whole queue is taken in one go and every
//! message goes through [`encode_and_write`], the same path direct sends use.

// Rust guideline compliant 2026-02

use std::collections::VecDeque;

use crate::codec::CodecRegistry;
use crate::error::Result;
use crate::message::Message;
use crate::transport::FrameWriter;

/// FIFO of messages waiting for the connection.
#[derive(Debug, Default)]
pub struct SendQueue {
    pending: VecDeque<Message>,
}

impl SendQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the tail.
    pub fn push(&mut self, message: Message) {
        self.pending.push_back(message);
    }

    /// Remove and return everything queued, head first.
    pub fn take(&mut self) -> VecDeque<Message> {
        std::mem::take(&mut self.pending)
    }

    /// Number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Encode `message` with its codec override (or `default_codec`) and write
/// the frame.
pub fn encode_and_write(
    codecs: &CodecRegistry,
    default_codec: &str,
    writer: &mut dyn FrameWriter,
    message: &Message,
) -> Result<()> {
    let codec = message.codec_name().unwrap_or(default_codec);
    let frame = codecs.encode(codec, message)?;
    log::trace!("[Gateway] Writing {}-byte '{}' frame", frame.len(), codec);
    writer.write(frame)
}
