//! Feed a framed byte stream to the parser in ragged pieces, the way a
//! serial link delivers it, and extract the messages.
//!
//! Run with:
//!   cargo run --example serial_log

use bytes::BytesMut;
use cmdframe::{encode_frame, FrameFormat, FrameParser, LengthField};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let format = FrameFormat {
        prefix: b"\xAA\x55".to_vec(),
        suffix: b"\r\n".to_vec(),
        length_field: LengthField::U8,
        length_includes_prefix: false,
        length_includes_suffix: false,
        length_includes_length_field: false,
    };

    // Build a wire stream of three log records.
    let mut wire = BytesMut::new();
    for record in ["boot ok", "sensor 23.5C", "link up"] {
        encode_frame(&format, record.as_bytes(), &mut wire)?;
    }

    let mut parser = FrameParser::new(format)?;

    // Deliver in 3-byte pieces; each parse picks up exactly where the last
    // one suspended.
    for piece in wire.chunks(3) {
        parser.append(piece);
        let completed = parser.parse(None)?;
        if completed > 0 {
            eprintln!("{completed} frame(s) completed after a {}-byte delivery", piece.len());
        }
    }

    while let Some(frame) = parser.next_frame() {
        let content = parser.frame_content(&frame);
        println!(
            "{} byte frame, content: {}",
            frame.len(),
            String::from_utf8_lossy(&content)
        );
        parser.release(frame)?;
    }

    Ok(())
}
