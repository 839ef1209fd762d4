use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One parsed frame, flattened for printing.
pub struct FrameRecord {
    pub index: usize,
    pub frame_len: u64,
    pub content: Vec<u8>,
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    index: usize,
    frame_len: u64,
    content_len: usize,
    content: &'a str,
}

pub fn print_frame(record: &FrameRecord, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let preview = content_preview(&record.content);
            let out = FrameOutput {
                index: record.index,
                frame_len: record.frame_len,
                content_len: record.content.len(),
                content: &preview,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAME", "WIRE LEN", "CONTENT LEN", "CONTENT"])
                .add_row(vec![
                    record.index.to_string(),
                    record.frame_len.to_string(),
                    record.content.len().to_string(),
                    content_preview(&record.content),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frame={} wire_len={} content_len={} content={}",
                record.index,
                record.frame_len,
                record.content.len(),
                content_preview(&record.content)
            );
        }
        OutputFormat::Raw => {
            print_raw(&record.content);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn content_preview(content: &[u8]) -> String {
    match std::str::from_utf8(content) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", content.len()),
    }
}
