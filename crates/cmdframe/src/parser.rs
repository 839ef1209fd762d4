use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::alloc::{ChunkAllocator, HeapAllocator};
use crate::chain::{BufferChain, Pos};
use crate::error::Result;
use crate::format::{FrameFormat, LengthField};
use crate::frame::{self, Frame};
use crate::matcher::{self, MatchOutcome, ScanOutcome};
use crate::scalar::{self, UintOutcome};

/// Hook invoked after each appended chunk with the appended byte count.
pub type AppendHook = Box<dyn FnMut(usize) + Send>;

/// Parse stages in wire order. Stages without a corresponding field in the
/// active format are skipped by an explicit guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Init,
    SeekPrefix,
    SeekLength,
    SeekContent,
    MatchSuffix,
    SeekSuffix,
    Done,
    Abort,
}

/// Parser progress, persisted across suspensions. One per parser.
struct Workspace {
    stage: Stage,
    /// Format in effect for the frame under construction.
    format: FrameFormat,
    prefix_table: Vec<usize>,
    suffix_table: Vec<usize>,
    /// First byte of the frame under construction, once known.
    frame_start: Option<Pos>,
    /// Current scan position.
    read: Pos,
    /// Start of the field currently being scanned; backtrack target for
    /// aborts and reconfiguration.
    anchor: Pos,
    expected_content: u64,
    accumulated_content: u64,
}

/// Incremental frame parser over an append-only chunk stream.
///
/// Bytes go in through [`append`](Self::append) in whatever pieces the
/// transport delivers; [`parse`](Self::parse) advances a resumable state
/// machine as far as buffered data allows and queues completed [`Frame`]s.
/// Nothing is copied until a caller extracts frame bytes.
///
/// A parser is single-threaded and non-reentrant; independent parsers are
/// fully independent.
pub struct FrameParser {
    format: FrameFormat,
    prefix_table: Vec<usize>,
    suffix_table: Vec<usize>,
    chain: BufferChain,
    workspace: Workspace,
    pending: VecDeque<Frame>,
    alloc: Box<dyn ChunkAllocator + Send>,
    on_append: Option<AppendHook>,
}

impl FrameParser {
    /// Create a parser with the default heap allocator.
    pub fn new(format: FrameFormat) -> Result<Self> {
        Self::with_allocator(format, Box::new(HeapAllocator))
    }

    /// Create a parser with an explicit chunk allocator.
    ///
    /// The format is validated here; an invalid format never produces a
    /// parser.
    pub fn with_allocator(
        format: FrameFormat,
        alloc: Box<dyn ChunkAllocator + Send>,
    ) -> Result<Self> {
        format.validate()?;
        let prefix_table = matcher::failure_table(&format.prefix);
        let suffix_table = matcher::failure_table(&format.suffix);
        let workspace = Workspace {
            stage: Stage::Init,
            format: format.clone(),
            prefix_table: prefix_table.clone(),
            suffix_table: suffix_table.clone(),
            frame_start: None,
            read: Pos::start(),
            anchor: Pos::start(),
            expected_content: 0,
            accumulated_content: 0,
        };
        Ok(Self {
            format,
            prefix_table,
            suffix_table,
            chain: BufferChain::new(),
            workspace,
            pending: VecDeque::new(),
            alloc,
            on_append: None,
        })
    }

    /// Register a hook invoked after every append with the appended size.
    pub fn set_append_hook(&mut self, hook: impl FnMut(usize) + Send + 'static) {
        self.on_append = Some(Box::new(hook));
    }

    /// The base format frames are parsed under.
    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    /// Bytes currently held by the buffer chain.
    pub fn buffered_bytes(&self) -> u64 {
        self.chain.buffered_bytes()
    }

    /// Completed frames awaiting [`next_frame`](Self::next_frame).
    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    /// Copy `data` into a new owned chunk appended to the chain.
    pub fn append(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let owned = self.alloc.allocate(data);
        let seq = self.chain.append(owned);
        trace!(seq, len = data.len(), "chunk appended");
        if let Some(hook) = self.on_append.as_mut() {
            hook(data.len());
        }
    }

    /// Advance the state machine as far as buffered data allows; returns the
    /// number of frames completed by this call.
    ///
    /// Passing `override_format` rewinds to the last segment anchor, discards
    /// buffered bytes beyond it, and parses the next frame under the new
    /// format; the base format resumes afterward.
    pub fn parse(&mut self, override_format: Option<&FrameFormat>) -> Result<usize> {
        if let Some(format) = override_format {
            format.validate()?;
            self.apply_override(format);
        }

        let Self {
            format,
            prefix_table,
            suffix_table,
            chain,
            workspace: ws,
            pending,
            ..
        } = self;

        let mut frames = 0usize;
        loop {
            match ws.stage {
                Stage::Init => {
                    ws.format = format.clone();
                    ws.prefix_table = prefix_table.clone();
                    ws.suffix_table = suffix_table.clone();
                    ws.frame_start = None;
                    ws.expected_content = 0;
                    ws.accumulated_content = 0;
                    ws.anchor = ws.read;
                    ws.stage = Stage::SeekPrefix;
                }

                // Prefix is located by search only under length-prefixed
                // framing; delimiter framing treats everything before the
                // suffix as content.
                Stage::SeekPrefix => {
                    if ws.format.length_field != LengthField::None && !ws.format.prefix.is_empty()
                    {
                        match matcher::scan_for_pattern(
                            chain,
                            &mut ws.read,
                            &ws.format.prefix,
                            &ws.prefix_table,
                        ) {
                            ScanOutcome::Matched { anchor } => {
                                ws.anchor = anchor;
                                if ws.frame_start.is_none() {
                                    ws.frame_start = Some(anchor);
                                }
                                ws.stage = Stage::SeekLength;
                            }
                            ScanOutcome::NeedMore => return Ok(frames),
                        }
                    } else {
                        ws.stage = Stage::SeekLength;
                    }
                }

                Stage::SeekLength => {
                    if ws.format.length_field != LengthField::None {
                        ws.anchor = ws.read;
                        let width = ws.format.length_field.width();
                        match scalar::read_be_uint(chain, &mut ws.read, width) {
                            UintOutcome::Value(raw) => {
                                match raw.checked_sub(ws.format.counted_overhead()) {
                                    Some(content) => {
                                        ws.expected_content = content;
                                        if ws.frame_start.is_none() {
                                            ws.frame_start = Some(ws.anchor);
                                        }
                                        ws.stage = Stage::SeekContent;
                                    }
                                    None => {
                                        debug!(raw, "length below counted overhead, aborting frame");
                                        ws.stage = Stage::Abort;
                                    }
                                }
                            }
                            UintOutcome::NeedMore => return Ok(frames),
                        }
                    } else {
                        ws.stage = Stage::SeekContent;
                    }
                }

                // Content length is known up front only with a length field;
                // otherwise the suffix search below determines it.
                Stage::SeekContent => {
                    if ws.format.length_field != LengthField::None {
                        ws.anchor = ws.read;
                        let remaining = ws.expected_content - ws.accumulated_content;
                        let available = chain.available_from(ws.read);
                        if available < remaining {
                            ws.read = chain.advance_by(ws.read, available);
                            ws.accumulated_content += available;
                            return Ok(frames);
                        }
                        ws.read = chain.advance_by(ws.read, remaining);
                        ws.accumulated_content = ws.expected_content;
                    }
                    ws.stage = Stage::MatchSuffix;
                }

                // With a length field the suffix position is exact: match in
                // place, no search. A mismatch means the length field lied.
                Stage::MatchSuffix => {
                    if ws.format.length_field != LengthField::None && !ws.format.suffix.is_empty()
                    {
                        ws.anchor = ws.read;
                        match matcher::match_at(chain, &mut ws.read, &ws.format.suffix) {
                            MatchOutcome::Matched => ws.stage = Stage::Done,
                            MatchOutcome::NeedMore => return Ok(frames),
                            MatchOutcome::Mismatch => {
                                debug!("suffix mismatch after counted content, resynchronizing");
                                ws.stage = Stage::Abort;
                            }
                        }
                    } else {
                        ws.stage = Stage::SeekSuffix;
                    }
                }

                Stage::SeekSuffix => {
                    if ws.format.length_field == LengthField::None
                        && !ws.format.suffix.is_empty()
                    {
                        if ws.frame_start.is_none() {
                            ws.frame_start = Some(chain.normalize(ws.read));
                        }
                        match matcher::scan_for_pattern(
                            chain,
                            &mut ws.read,
                            &ws.format.suffix,
                            &ws.suffix_table,
                        ) {
                            ScanOutcome::Matched { anchor } => {
                                ws.anchor = anchor;
                                let start = ws.frame_start.unwrap_or(anchor);
                                ws.accumulated_content = chain.distance(start, anchor);
                                ws.stage = Stage::Done;
                            }
                            ScanOutcome::NeedMore => return Ok(frames),
                        }
                    } else {
                        ws.stage = Stage::Done;
                    }
                }

                Stage::Done => {
                    pack_frame(chain, ws, pending)?;
                    frames += 1;
                    ws.stage = Stage::Init;
                }

                // Discard the in-flight frame and resynchronize at the start
                // of the field that failed; later well-formed data still
                // parses.
                Stage::Abort => {
                    ws.read = ws.anchor;
                    ws.frame_start = None;
                    ws.stage = Stage::Init;
                }
            }
        }
    }

    /// Dequeue the oldest completed frame.
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.pending.pop_front()
    }

    /// Give back the frame's chunk references and reclaim what the chain no
    /// longer needs. Consuming the frame makes double release impossible.
    pub fn release(&mut self, frame: Frame) -> Result<()> {
        for seq in frame.start.seq..=frame.last_seq {
            self.chain.dec_ref(seq)?;
        }
        self.chain.reclaim_head(self.alloc.as_mut());
        Ok(())
    }

    /// Release every still-queued frame; bulk teardown.
    pub fn clear_frames(&mut self) -> Result<()> {
        while let Some(frame) = self.pending.pop_front() {
            for seq in frame.start.seq..=frame.last_seq {
                self.chain.dec_ref(seq)?;
            }
        }
        self.chain.reclaim_head(self.alloc.as_mut());
        Ok(())
    }

    /// Copy frame bytes from logical offset `start_pos` (0 = first byte of
    /// the frame, prefix included) into `dst`, clamped to the frame's end.
    /// Returns the number of bytes copied.
    pub fn extract(&self, frame: &Frame, start_pos: usize, dst: &mut [u8]) -> usize {
        frame::extract(&self.chain, frame, start_pos, dst)
    }

    /// Copy out `len` frame bytes starting at `start_pos`; `len == 0` or a
    /// range past the frame's end clamps to the end rather than erroring.
    pub fn frame_bytes(&self, frame: &Frame, start_pos: usize, len: usize) -> Vec<u8> {
        let total = frame.len() as usize;
        let start = start_pos.min(total);
        let take = if len == 0 || start.saturating_add(len) > total {
            total - start
        } else {
            len
        };
        let mut out = vec![0u8; take];
        let copied = self.extract(frame, start, &mut out);
        out.truncate(copied);
        out
    }

    /// Copy out the frame's content, without prefix, length field, or suffix.
    pub fn frame_content(&self, frame: &Frame) -> Vec<u8> {
        if frame.content_len() == 0 {
            return Vec::new();
        }
        self.frame_bytes(frame, frame.content_offset(), frame.content_len() as usize)
    }

    /// Rewind to the last segment anchor, drop buffered bytes beyond it, and
    /// restart prefix seeking under `format` for the next frame only.
    fn apply_override(&mut self, format: &FrameFormat) {
        debug!("format override, rewinding to segment anchor");
        self.workspace.read = self.workspace.anchor;
        self.chain
            .truncate_to(self.workspace.read, self.alloc.as_mut());
        self.workspace.format = format.clone();
        self.workspace.prefix_table = matcher::failure_table(&format.prefix);
        self.workspace.suffix_table = matcher::failure_table(&format.suffix);
        self.workspace.frame_start = None;
        self.workspace.expected_content = 0;
        self.workspace.accumulated_content = 0;
        self.workspace.stage = Stage::SeekPrefix;
    }
}

/// Package the frame under construction: count chunk references over its
/// span, retire chunks wholly behind the cursor, and queue the frame FIFO.
fn pack_frame(chain: &mut BufferChain, ws: &mut Workspace, pending: &mut VecDeque<Frame>) -> Result<()> {
    let start = chain.normalize(ws.frame_start.unwrap_or(ws.anchor));
    ws.read = chain.normalize(ws.read);

    let start_abs = chain.abs_offset(start);
    let end_abs = chain.abs_offset(ws.read);
    let len = end_abs - start_abs;

    let last_seq = chain.add_refs_in_span(start.seq, end_abs)?;
    chain.mark_completed_before(ws.read.seq);

    let content_offset = if ws.format.length_field != LengthField::None {
        ws.format.content_offset()
    } else {
        0
    };
    trace!(
        len,
        content_len = ws.accumulated_content,
        "frame packaged"
    );
    pending.push_back(Frame {
        start,
        last_seq,
        len,
        content_offset,
        content_len: ws.accumulated_content,
    });
    Ok(())
}
