use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use cmdframe::{
    encode_frame, ChunkAllocator, FrameFormat, FrameParser, FramingError, LengthField,
};

/// Allocator that counts chunk allocations and reclamations, so tests can
/// observe exactly when the chain gives memory back.
struct CountingAllocator {
    allocated: Arc<AtomicUsize>,
    reclaimed: Arc<AtomicUsize>,
}

impl ChunkAllocator for CountingAllocator {
    fn allocate(&mut self, data: &[u8]) -> Bytes {
        self.allocated.fetch_add(1, Ordering::Relaxed);
        Bytes::copy_from_slice(data)
    }

    fn reclaim(&mut self, chunk: Bytes) {
        self.reclaimed.fetch_add(1, Ordering::Relaxed);
        drop(chunk);
    }
}

fn counting_parser(format: FrameFormat) -> (FrameParser, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let allocated = Arc::new(AtomicUsize::new(0));
    let reclaimed = Arc::new(AtomicUsize::new(0));
    let parser = FrameParser::with_allocator(
        format,
        Box::new(CountingAllocator {
            allocated: Arc::clone(&allocated),
            reclaimed: Arc::clone(&reclaimed),
        }),
    )
    .unwrap();
    (parser, allocated, reclaimed)
}

fn length_prefixed() -> FrameFormat {
    FrameFormat {
        prefix: b"AA".to_vec(),
        suffix: b"BB".to_vec(),
        length_field: LengthField::U8,
        length_includes_prefix: false,
        length_includes_suffix: false,
        length_includes_length_field: false,
    }
}

fn wire(format: &FrameFormat, content: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(format, content, &mut buf).unwrap();
    buf.to_vec()
}

#[test]
fn init_accepts_valid_shapes_and_rejects_each_invariant() {
    // prefix + length
    assert!(FrameParser::new(FrameFormat {
        suffix: Vec::new(),
        ..length_prefixed()
    })
    .is_ok());
    // suffix only
    assert!(FrameParser::new(FrameFormat::default()).is_ok());
    // prefix + length + suffix
    assert!(FrameParser::new(length_prefixed()).is_ok());

    assert!(matches!(
        FrameParser::new(FrameFormat {
            suffix: Vec::new(),
            ..FrameFormat::default()
        }),
        Err(FramingError::VarLengthRequiresSuffix)
    ));
    assert!(matches!(
        FrameParser::new(FrameFormat {
            prefix: Vec::new(),
            ..length_prefixed()
        }),
        Err(FramingError::FixedLengthRequiresPrefix)
    ));
}

#[test]
fn concrete_scenario_prefix_length_suffix() {
    let mut parser = FrameParser::new(length_prefixed()).unwrap();

    parser.append(b"AA");
    assert_eq!(parser.parse(None).unwrap(), 0);
    parser.append(&[0x05]);
    assert_eq!(parser.parse(None).unwrap(), 0);
    parser.append(b"HELLO");
    assert_eq!(parser.parse(None).unwrap(), 0);
    parser.append(b"BB");
    assert_eq!(parser.parse(None).unwrap(), 1);

    let frame = parser.next_frame().unwrap();
    assert_eq!(frame.content_len(), 5);
    assert_eq!(parser.frame_content(&frame), b"HELLO");
    // offset 0 is the first byte of the frame, prefix included
    assert_eq!(parser.frame_bytes(&frame, 0, 0), b"AA\x05HELLOBB");
    parser.release(frame).unwrap();
}

#[test]
fn fragmentation_invariance_at_every_split_point() {
    let format = length_prefixed();
    let bytes = wire(&format, b"PAYLOAD");

    for split in 1..bytes.len() {
        let mut parser = FrameParser::new(format.clone()).unwrap();
        parser.append(&bytes[..split]);
        let first = parser.parse(None).unwrap();
        parser.append(&bytes[split..]);
        let second = parser.parse(None).unwrap();

        assert_eq!(first + second, 1, "split at byte {split}");
        let frame = parser.next_frame().unwrap();
        assert_eq!(parser.frame_content(&frame), b"PAYLOAD", "split at byte {split}");
        assert!(parser.next_frame().is_none());
    }
}

#[test]
fn byte_at_a_time_resumes_without_loss() {
    let format = length_prefixed();
    let bytes = wire(&format, b"ONE BYTE AT A TIME");
    let mut parser = FrameParser::new(format).unwrap();

    for (index, byte) in bytes.iter().enumerate() {
        parser.append(&[*byte]);
        let frames = parser.parse(None).unwrap();
        if index + 1 < bytes.len() {
            assert_eq!(frames, 0, "frame completed early at byte {index}");
        } else {
            assert_eq!(frames, 1);
        }
    }

    let frame = parser.next_frame().unwrap();
    assert_eq!(parser.frame_content(&frame), b"ONE BYTE AT A TIME");
}

#[test]
fn corrupted_suffix_aborts_frame_and_recovers() {
    let format = length_prefixed();
    let mut corrupted = wire(&format, b"HELLO");
    let last = corrupted.len() - 1;
    corrupted[last] = b'X'; // "AA\x05HELLOBX"

    let mut parser = FrameParser::new(format.clone()).unwrap();
    parser.append(&corrupted);
    assert_eq!(parser.parse(None).unwrap(), 0);

    parser.append(&wire(&format, b"WORLD"));
    assert_eq!(parser.parse(None).unwrap(), 1);

    let frame = parser.next_frame().unwrap();
    assert_eq!(parser.frame_content(&frame), b"WORLD");
    assert!(parser.next_frame().is_none());
}

#[test]
fn length_flags_recover_content_for_all_combinations() {
    for include_prefix in [false, true] {
        for include_suffix in [false, true] {
            for include_length in [false, true] {
                let format = FrameFormat {
                    length_includes_prefix: include_prefix,
                    length_includes_suffix: include_suffix,
                    length_includes_length_field: include_length,
                    ..length_prefixed()
                };
                let bytes = wire(&format, b"CONTENT");
                // the raw length value moves with the flags...
                let expected_raw =
                    7 + u8::from(include_prefix) * 2 + u8::from(include_suffix) * 2
                        + u8::from(include_length);
                assert_eq!(bytes[2], expected_raw);

                // ...and the parser recovers the same content regardless
                let mut parser = FrameParser::new(format).unwrap();
                parser.append(&bytes);
                assert_eq!(parser.parse(None).unwrap(), 1);
                let frame = parser.next_frame().unwrap();
                assert_eq!(frame.content_len(), 7);
                assert_eq!(parser.frame_content(&frame), b"CONTENT");
            }
        }
    }
}

#[test]
fn delimiter_framing_end_to_end() {
    let mut parser = FrameParser::new(FrameFormat::default()).unwrap();
    parser.append(b"alpha\r\nbeta\r\ngam");
    assert_eq!(parser.parse(None).unwrap(), 2);
    parser.append(b"ma\r\n");
    assert_eq!(parser.parse(None).unwrap(), 1);

    let mut contents = Vec::new();
    while let Some(frame) = parser.next_frame() {
        contents.push(parser.frame_content(&frame));
        parser.release(frame).unwrap();
    }
    assert_eq!(contents, [b"alpha".to_vec(), b"beta".to_vec(), b"gamma".to_vec()]);
}

#[test]
fn frames_are_delivered_fifo_regardless_of_append_granularity() {
    let format = length_prefixed();
    let mut bytes = Vec::new();
    for content in [b"first".as_ref(), b"second", b"third"] {
        bytes.extend_from_slice(&wire(&format, content));
    }

    // drip the stream in ragged pieces, parsing as we go
    let mut parser = FrameParser::new(format).unwrap();
    let mut total = 0;
    for piece in bytes.chunks(4) {
        parser.append(piece);
        total += parser.parse(None).unwrap();
    }
    assert_eq!(total, 3);

    for expected in [b"first".as_ref(), b"second", b"third"] {
        let frame = parser.next_frame().unwrap();
        assert_eq!(parser.frame_content(&frame), expected);
        parser.release(frame).unwrap();
    }
}

#[test]
fn chunks_reclaim_in_order_once_released() {
    let format = length_prefixed();
    let (mut parser, allocated, reclaimed) = counting_parser(format.clone());

    // one frame per chunk, plus a partial frame left open in the tail
    parser.append(&wire(&format, b"one"));
    parser.append(&wire(&format, b"two"));
    parser.append(b"AA\x05par");
    assert_eq!(parser.parse(None).unwrap(), 2);
    assert_eq!(allocated.load(Ordering::Relaxed), 3);

    let first = parser.next_frame().unwrap();
    let second = parser.next_frame().unwrap();

    // nothing reclaimable while both frames hold references
    assert_eq!(reclaimed.load(Ordering::Relaxed), 0);

    parser.release(first).unwrap();
    assert_eq!(reclaimed.load(Ordering::Relaxed), 1);

    // releasing out of arrival order is fine; the sweep stays in order
    parser.release(second).unwrap();
    assert_eq!(reclaimed.load(Ordering::Relaxed), 2);

    // the open tail chunk backing the partial frame is never freed
    assert_eq!(parser.buffered_bytes(), 6);
}

#[test]
fn held_frame_pins_its_chunk() {
    let format = length_prefixed();
    let (mut parser, _allocated, reclaimed) = counting_parser(format.clone());

    parser.append(&wire(&format, b"held"));
    parser.append(&wire(&format, b"released"));
    parser.parse(None).unwrap();

    let held = parser.next_frame().unwrap();
    let released = parser.next_frame().unwrap();
    parser.release(released).unwrap();

    // the second chunk cannot be freed while the first is still held:
    // reclamation frees strictly from the chain head
    assert_eq!(reclaimed.load(Ordering::Relaxed), 0);

    parser.release(held).unwrap();
    assert_eq!(reclaimed.load(Ordering::Relaxed), 2);
}

#[test]
fn clear_frames_releases_everything_queued() {
    let format = length_prefixed();
    let (mut parser, _allocated, reclaimed) = counting_parser(format.clone());

    parser.append(&wire(&format, b"one"));
    parser.append(&wire(&format, b"two"));
    assert_eq!(parser.parse(None).unwrap(), 2);

    parser.clear_frames().unwrap();
    assert_eq!(parser.pending_frames(), 0);
    assert_eq!(reclaimed.load(Ordering::Relaxed), 2);
}

#[test]
fn reconfiguration_mid_stream_keeps_tail_alive() {
    // header lines are CRLF-delimited; a header announces a binary payload
    // framed "$" + u8 length
    let header_format = FrameFormat::default();
    let payload_format = FrameFormat {
        prefix: b"$".to_vec(),
        suffix: Vec::new(),
        length_field: LengthField::U8,
        length_includes_prefix: false,
        length_includes_suffix: false,
        length_includes_length_field: false,
    };

    let (mut parser, _allocated, reclaimed) = counting_parser(header_format.clone());

    parser.append(b"EXPECT BINARY\r\n");
    assert_eq!(parser.parse(None).unwrap(), 1);
    let header = parser.next_frame().unwrap();
    assert_eq!(parser.frame_content(&header), b"EXPECT BINARY");

    // bytes buffered beyond the anchor belong to the old grammar; the
    // override discards them without touching the live tail
    parser.append(b"stale");
    assert_eq!(parser.parse(Some(&payload_format)).unwrap(), 0);
    assert_eq!(reclaimed.load(Ordering::Relaxed), 1); // the "stale" chunk
    assert_eq!(parser.buffered_bytes(), 15); // header chunk intact

    parser.append(b"$\x05WORLD");
    assert_eq!(parser.parse(None).unwrap(), 1);
    let payload = parser.next_frame().unwrap();
    assert_eq!(parser.frame_content(&payload), b"WORLD");

    // the override applied to one frame; the base format is back in effect
    parser.append(b"PING\r\n");
    assert_eq!(parser.parse(None).unwrap(), 1);
    let next_header = parser.next_frame().unwrap();
    assert_eq!(parser.frame_content(&next_header), b"PING");

    parser.release(header).unwrap();
    parser.release(payload).unwrap();
    parser.release(next_header).unwrap();
}

#[test]
fn releasing_a_foreign_frame_is_a_checked_error() {
    let format = length_prefixed();
    let mut source = FrameParser::new(format.clone()).unwrap();
    source.append(&wire(&format, b"HELLO"));
    source.parse(None).unwrap();
    let frame = source.next_frame().unwrap();

    let mut other = FrameParser::new(format).unwrap();
    assert!(matches!(
        other.release(frame),
        Err(FramingError::RefCountUnderflow)
    ));
}

#[test]
fn refcount_overflow_surfaces_and_recovers_after_release() {
    let format = length_prefixed();
    let mut parser = FrameParser::new(format.clone()).unwrap();

    // 256 frames inside a single chunk: the 256th reference cannot be
    // represented and parse reports it instead of wrapping
    let one = wire(&format, b"");
    let mut bytes = Vec::with_capacity(one.len() * 256);
    for _ in 0..256 {
        bytes.extend_from_slice(&one);
    }
    parser.append(&bytes);

    assert!(matches!(
        parser.parse(None),
        Err(FramingError::RefCountOverflow { .. })
    ));
    assert_eq!(parser.pending_frames(), 255);

    // releasing one frame frees a reference; parsing then completes
    let frame = parser.next_frame().unwrap();
    parser.release(frame).unwrap();
    assert_eq!(parser.parse(None).unwrap(), 1);
    assert_eq!(parser.pending_frames(), 255);
}
