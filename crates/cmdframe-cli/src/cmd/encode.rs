use std::fs;

use bytes::BytesMut;
use cmdframe::encode_frame;

use crate::cmd::EncodeArgs;
use crate::exit::{framing_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::print_raw;

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let format = args.format.to_format()?;
    format
        .validate()
        .map_err(|err| framing_error("invalid format", err))?;

    let payload = match (&args.data, &args.file) {
        (Some(data), None) => data.clone().into_bytes(),
        (None, Some(path)) => fs::read(path)
            .map_err(|err| io_error(&format!("read {}", path.display()), err))?,
        _ => return Err(CliError::new(USAGE, "provide exactly one of --data or --file")),
    };

    let mut wire = BytesMut::new();
    encode_frame(&format, &payload, &mut wire)
        .map_err(|err| framing_error("encode", err))?;
    print_raw(&wire);

    Ok(SUCCESS)
}
