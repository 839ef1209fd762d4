use crate::chain::{BufferChain, Pos};

/// One fully parsed message: an immutable reference to a contiguous logical
/// byte range across one or more chunks.
///
/// A frame never owns chunk memory. Packaging counted a reference on every
/// chunk the range touches; releasing the frame through the parser gives
/// those references back. Dropping a frame without releasing it keeps its
/// chunks pinned, which is why `FrameParser::release` consumes the frame.
#[derive(Debug)]
pub struct Frame {
    pub(crate) start: Pos,
    pub(crate) last_seq: u64,
    pub(crate) len: u64,
    pub(crate) content_offset: usize,
    pub(crate) content_len: u64,
}

impl Frame {
    /// Total wire length: prefix, length field, content, and suffix.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of the first content byte from the start of the frame.
    pub fn content_offset(&self) -> usize {
        self.content_offset
    }

    /// Content length, excluding all header and footer bytes.
    pub fn content_len(&self) -> u64 {
        self.content_len
    }
}

/// Copy frame bytes from logical offset `start_pos` into `dst`, clamped to
/// the frame's end. Returns the number of bytes copied.
pub(crate) fn extract(
    chain: &BufferChain,
    frame: &Frame,
    start_pos: usize,
    dst: &mut [u8],
) -> usize {
    let remaining = frame.len.saturating_sub(start_pos as u64);
    let want = (dst.len() as u64).min(remaining) as usize;
    let from = chain.advance_by(frame.start, start_pos as u64);
    chain.copy_from(from, &mut dst[..want])
}
