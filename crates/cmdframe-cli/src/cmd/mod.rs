use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use cmdframe::{FrameFormat, LengthField};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod encode;
pub mod parse;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse framed messages from a file or stdin.
    Parse(ParseArgs),
    /// Frame a payload and write the wire bytes to stdout.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Parse(args) => parse::run(args, format),
        Command::Encode(args) => encode::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// Frame grammar flags shared by `parse` and `encode`.
#[derive(Args, Debug)]
pub struct FormatArgs {
    /// Prefix pattern as hex bytes (e.g. AA55). Empty = no prefix.
    #[arg(long, value_name = "HEX", default_value = "")]
    pub prefix_hex: String,

    /// Suffix pattern as hex bytes (e.g. 0D0A). Empty = no suffix.
    #[arg(long, value_name = "HEX", default_value = "0D0A")]
    pub suffix_hex: String,

    /// Length field width in bytes: 0 (delimiter-terminated), 1, 2, or 4.
    #[arg(long, value_name = "BYTES", default_value = "0")]
    pub length_width: u8,

    /// Fields the transmitted length value counts (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "FIELDS")]
    pub length_includes: Vec<LengthInclude>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LengthInclude {
    Prefix,
    Suffix,
    Length,
}

impl FormatArgs {
    pub fn to_format(&self) -> CliResult<FrameFormat> {
        let length_field = match self.length_width {
            0 => LengthField::None,
            1 => LengthField::U8,
            2 => LengthField::U16,
            4 => LengthField::U32,
            other => {
                return Err(CliError::new(
                    USAGE,
                    format!("unsupported length width {other} (expected 0, 1, 2, or 4)"),
                ))
            }
        };
        Ok(FrameFormat {
            prefix: parse_hex("--prefix-hex", &self.prefix_hex)?,
            suffix: parse_hex("--suffix-hex", &self.suffix_hex)?,
            length_field,
            length_includes_prefix: self.length_includes.contains(&LengthInclude::Prefix),
            length_includes_suffix: self.length_includes.contains(&LengthInclude::Suffix),
            length_includes_length_field: self.length_includes.contains(&LengthInclude::Length),
        })
    }
}

fn parse_hex(flag: &str, text: &str) -> CliResult<Vec<u8>> {
    if !text.is_ascii() {
        return Err(CliError::new(USAGE, format!("{flag}: not a hex string")));
    }
    if text.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("{flag}: odd number of hex digits"),
        ));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("{flag}: invalid hex at offset {i}")))
        })
        .collect()
}

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Input file; stdin when omitted.
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub format: FormatArgs,

    /// Read size per delivery, to exercise fragmented input.
    #[arg(long, value_name = "BYTES", default_value = "4096")]
    pub chunk_size: usize,

    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub format: FormatArgs,

    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,

    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
