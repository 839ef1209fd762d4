use crate::chain::{BufferChain, Pos};

/// Result of a forward pattern search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanOutcome {
    /// Pattern found. The cursor is one past the match; `anchor` is the
    /// position of the match's first byte.
    Matched { anchor: Pos },
    /// Ran out of buffered data. The cursor is rewound to the match head so
    /// a later call restarts the walk from there.
    NeedMore,
}

/// Result of an exact positional match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchOutcome {
    Matched,
    NeedMore,
    /// Bytes are present but differ: a hard framing error, not a suspension.
    Mismatch,
}

/// KMP preprocessing: `table[j]` is the length of the longest proper border
/// of the first `j` pattern bytes. `table.len() == pattern.len() + 1`.
pub(crate) fn failure_table(pattern: &[u8]) -> Vec<usize> {
    let mut table = vec![0usize; pattern.len() + 1];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[i] != pattern[k] {
            k = table[k];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        table[i + 1] = k;
    }
    table
}

/// Search forward from `cursor` for the first occurrence of `pattern`,
/// walking across chunk boundaries.
///
/// On suspension the in-progress automaton state is intentionally discarded;
/// the next call restarts comparisons from the recorded match head. Patterns
/// are short, so the repeated comparisons are cheaper than persisting the
/// partial-match index.
pub(crate) fn scan_for_pattern(
    chain: &BufferChain,
    cursor: &mut Pos,
    pattern: &[u8],
    table: &[usize],
) -> ScanOutcome {
    debug_assert!(!pattern.is_empty());
    debug_assert_eq!(table.len(), pattern.len() + 1);

    let mut cur = *cursor;
    let mut head = *cursor;
    let mut matched = 0usize;

    loop {
        let Some(byte) = chain.byte_at(cur) else {
            *cursor = head;
            return ScanOutcome::NeedMore;
        };
        if byte == pattern[matched] {
            matched += 1;
            cur = chain.advance_by(cur, 1);
            if matched == pattern.len() {
                *cursor = cur;
                return ScanOutcome::Matched {
                    anchor: chain.normalize(head),
                };
            }
        } else if matched == 0 {
            cur = chain.advance_by(cur, 1);
            head = cur;
        } else {
            // Shift the candidate start forward by the failure delta; the
            // head never overruns the read position, so the walk stays
            // within buffered data.
            let fallback = table[matched];
            head = chain.advance_by(head, (matched - fallback) as u64);
            matched = fallback;
        }
    }
}

/// Verify that the next `pattern.len()` bytes at `cursor` equal `pattern`.
/// No searching: the position is already known.
pub(crate) fn match_at(chain: &BufferChain, cursor: &mut Pos, pattern: &[u8]) -> MatchOutcome {
    if chain.available_from(*cursor) < pattern.len() as u64 {
        return MatchOutcome::NeedMore;
    }
    let mut pos = *cursor;
    for &expected in pattern {
        let Some(byte) = chain.byte_at(pos) else {
            return MatchOutcome::NeedMore;
        };
        if byte != expected {
            return MatchOutcome::Mismatch;
        }
        pos = chain.advance_by(pos, 1);
    }
    *cursor = pos;
    MatchOutcome::Matched
}
