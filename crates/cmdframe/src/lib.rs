//! Resumable command framing over chunked byte streams.
//!
//! Bytes arrive in whatever pieces a serial link or socket delivers them;
//! `cmdframe` extracts discrete, variably-framed messages without ever
//! needing the stream contiguous in memory:
//! - A configurable grammar (literal prefix, big-endian length field,
//!   content, literal suffix), length-prefixed or delimiter-terminated.
//! - A resumable state machine that suspends on "need more data" and picks
//!   up exactly where it left off after the next append.
//! - KMP pattern search that crosses chunk boundaries.
//! - Zero-copy frames: a completed frame references a chunk range; bytes are
//!   copied only when a caller extracts them. Reference counting reclaims
//!   chunks in arrival order once fully consumed and released.

mod alloc;
mod chain;
mod error;
mod format;
mod frame;
mod matcher;
mod parser;
mod scalar;

pub use alloc::{ChunkAllocator, HeapAllocator};
pub use error::{FramingError, Result};
pub use format::{encode_frame, FrameFormat, LengthField, MAX_PATTERN_LEN};
pub use frame::Frame;
pub use parser::{AppendHook, FrameParser};
