use std::fs::File;
use std::io::Read;

use cmdframe::FrameParser;
use tracing::debug;

use crate::cmd::ParseArgs;
use crate::exit::{framing_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frame, FrameRecord, OutputFormat};

pub fn run(args: ParseArgs, format: OutputFormat) -> CliResult<i32> {
    if args.chunk_size == 0 {
        return Err(CliError::new(USAGE, "--chunk-size must be at least 1"));
    }

    let frame_format = args.format.to_format()?;
    let mut parser =
        FrameParser::new(frame_format).map_err(|err| framing_error("invalid format", err))?;

    let mut input: Box<dyn Read> = match &args.file {
        Some(path) => Box::new(
            File::open(path).map_err(|err| io_error(&format!("open {}", path.display()), err))?,
        ),
        None => Box::new(std::io::stdin().lock()),
    };

    let mut delivery = vec![0u8; args.chunk_size];
    let mut printed = 0usize;

    loop {
        let read = match input.read(&mut delivery) {
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error("read input", err)),
        };
        if read == 0 {
            break;
        }

        parser.append(&delivery[..read]);
        parser
            .parse(None)
            .map_err(|err| framing_error("parse", err))?;

        while let Some(frame) = parser.next_frame() {
            let record = FrameRecord {
                index: printed,
                frame_len: frame.len(),
                content: parser.frame_content(&frame),
            };
            print_frame(&record, format);
            parser
                .release(frame)
                .map_err(|err| framing_error("release", err))?;
            printed += 1;

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }
    }

    debug!(
        frames = printed,
        leftover = parser.buffered_bytes(),
        "input exhausted"
    );
    Ok(SUCCESS)
}
