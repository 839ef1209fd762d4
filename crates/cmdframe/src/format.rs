use bytes::{BufMut, BytesMut};

use crate::error::{FramingError, Result};

/// Longest supported prefix/suffix pattern, in bytes.
pub const MAX_PATTERN_LEN: usize = 7;

/// Width of the transmitted length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthField {
    /// No length field; frames end at the suffix delimiter.
    #[default]
    None,
    /// One byte.
    U8,
    /// Two bytes, big-endian.
    U16,
    /// Four bytes, big-endian.
    U32,
}

impl LengthField {
    /// Encoded width in bytes.
    pub fn width(self) -> usize {
        match self {
            LengthField::None => 0,
            LengthField::U8 => 1,
            LengthField::U16 => 2,
            LengthField::U32 => 4,
        }
    }

    /// Largest value the field can carry.
    pub fn max_value(self) -> u64 {
        match self {
            LengthField::None => 0,
            LengthField::U8 => u8::MAX as u64,
            LengthField::U16 => u16::MAX as u64,
            LengthField::U32 => u32::MAX as u64,
        }
    }
}

/// Describes the binary framing grammar: an optional literal prefix, an
/// optional length field, content, and an optional literal suffix.
///
/// The grammar is the wire contract. Two shapes are accepted:
/// length-prefixed (`length_field` set, prefix required) and
/// delimiter-terminated (`length_field` unset, suffix required).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFormat {
    /// Literal prefix pattern, at most [`MAX_PATTERN_LEN`] bytes. Empty = none.
    pub prefix: Vec<u8>,
    /// Literal suffix pattern, at most [`MAX_PATTERN_LEN`] bytes. Empty = none.
    pub suffix: Vec<u8>,
    /// Width of the transmitted length field.
    pub length_field: LengthField,
    /// The transmitted length value counts the prefix bytes.
    pub length_includes_prefix: bool,
    /// The transmitted length value counts the suffix bytes.
    pub length_includes_suffix: bool,
    /// The transmitted length value counts the length field's own bytes.
    pub length_includes_length_field: bool,
}

impl Default for FrameFormat {
    /// CRLF-delimited frames, no length field.
    fn default() -> Self {
        Self {
            prefix: Vec::new(),
            suffix: b"\r\n".to_vec(),
            length_field: LengthField::None,
            length_includes_prefix: false,
            length_includes_suffix: false,
            length_includes_length_field: false,
        }
    }
}

impl FrameFormat {
    /// Check the two framing invariants and the pattern length bounds.
    ///
    /// Called once when a parser is constructed; an invalid format never
    /// produces a parser.
    pub fn validate(&self) -> Result<()> {
        for pattern in [&self.prefix, &self.suffix] {
            if pattern.len() > MAX_PATTERN_LEN {
                return Err(FramingError::PatternTooLong {
                    len: pattern.len(),
                    max: MAX_PATTERN_LEN,
                });
            }
        }
        if self.length_field == LengthField::None {
            if self.suffix.is_empty() {
                return Err(FramingError::VarLengthRequiresSuffix);
            }
        } else if self.prefix.is_empty() {
            return Err(FramingError::FixedLengthRequiresPrefix);
        }
        Ok(())
    }

    /// Bytes the transmitted length value covers beyond the content itself.
    ///
    /// Subtracting this from the raw length value yields the content length.
    pub fn counted_overhead(&self) -> u64 {
        let mut overhead = 0u64;
        if self.length_includes_prefix {
            overhead += self.prefix.len() as u64;
        }
        if self.length_includes_suffix {
            overhead += self.suffix.len() as u64;
        }
        if self.length_includes_length_field {
            overhead += self.length_field.width() as u64;
        }
        overhead
    }

    /// Offset of the first content byte from the start of a frame.
    pub fn content_offset(&self) -> usize {
        self.prefix.len() + self.length_field.width()
    }

    /// Total header + footer bytes around the content.
    pub fn wire_overhead(&self) -> usize {
        self.prefix.len() + self.length_field.width() + self.suffix.len()
    }
}

/// Encode one frame under `format` into `dst`.
///
/// Writes prefix, length field (big-endian, adjusted per the include flags),
/// content, and suffix. Fails if the adjusted length value does not fit the
/// configured field width.
pub fn encode_frame(format: &FrameFormat, content: &[u8], dst: &mut BytesMut) -> Result<()> {
    let raw = content.len() as u64 + format.counted_overhead();
    if format.length_field != LengthField::None && raw > format.length_field.max_value() {
        return Err(FramingError::ContentTooLarge {
            len: content.len(),
            max: format.length_field.max_value(),
        });
    }

    dst.reserve(format.wire_overhead() + content.len());
    dst.put_slice(&format.prefix);
    match format.length_field {
        LengthField::None => {}
        LengthField::U8 => dst.put_u8(raw as u8),
        LengthField::U16 => dst.put_u16(raw as u16),
        LengthField::U32 => dst.put_u32(raw as u32),
    }
    dst.put_slice(content);
    dst.put_slice(&format.suffix);
    Ok(())
}
