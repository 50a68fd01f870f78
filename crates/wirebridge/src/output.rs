use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use wirebridge_frame::{flags, Frame};

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

#[derive(Serialize)]
struct ResponseOutput<'a> {
    seq: u32,
    method: &'a str,
    codec: &'a str,
    error: bool,
    body_size: usize,
    body: String,
}

/// Print a response frame. The method-name prefix length comes from the
/// frame's second option word.
pub fn print_response(frame: &Frame, format: OutputFormat) {
    let opts = frame.read_options();
    let (seq, method_len) = match opts.as_slice() {
        [seq, len] => (*seq, *len as usize),
        _ => (0, 0),
    };
    let method_len = method_len.min(frame.payload().len());
    let (method, body) = frame.payload().split_at(method_len);
    let method = String::from_utf8_lossy(method);
    let fl = frame.read_flags();

    match format {
        OutputFormat::Json => {
            let out = ResponseOutput {
                seq,
                method: &method,
                codec: flags::codec_name(fl),
                error: flags::is_error(fl),
                body_size: body.len(),
                body: body_preview(body),
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
                .set_header(vec!["SEQ", "METHOD", "CODEC", "ERROR", "BODY"])
                .add_row(vec![
                    seq.to_string(),
                    method.to_string(),
                    flags::codec_name(fl).to_string(),
                    flags::is_error(fl).to_string(),
                    body_preview(body),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "seq={} method={} codec={} error={} body={}",
                seq,
                method,
                flags::codec_name(fl),
                flags::is_error(fl),
                body_preview(body)
            );
        }
        OutputFormat::Raw => {
            print_raw(body);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn body_preview(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", body.len()),
    }
}
