/// Errors that can occur while configuring or driving the framing engine.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// Delimiter-terminated framing (no length field) needs a suffix to find
    /// the end of a frame.
    #[error("format without a length field must define a suffix")]
    VarLengthRequiresSuffix,

    /// Length-prefixed framing needs a prefix anchor to avoid misreading the
    /// length field out of arbitrary stream bytes.
    #[error("format with a length field must define a prefix")]
    FixedLengthRequiresPrefix,

    /// A prefix or suffix pattern exceeds the supported length.
    #[error("pattern too long ({len} bytes, max {max})")]
    PatternTooLong { len: usize, max: usize },

    /// Content does not fit in the configured length-field width.
    #[error("content too large for length field ({len} bytes, max {max})")]
    ContentTooLarge { len: usize, max: u64 },

    /// A chunk is referenced by more outstanding frames than the counter can
    /// represent.
    #[error("chunk reference count overflow (max {max})")]
    RefCountOverflow { max: u8 },

    /// A frame release decremented a chunk already at zero references.
    #[error("chunk reference count underflow (release after zero)")]
    RefCountUnderflow,
}

pub type Result<T> = std::result::Result<T, FramingError>;
