// SPDX-License-Identifier: MIT OR Apache-2.0
//! Input opening and format selection.

use anyhow::Result;
use clap::ValueEnum;
use hs_record::datafmt::{self, Format};
use hs_record::stream::{
    RecordStream, csv_stream, json_stream, line_stream, null_stream, raw_stream,
};
use std::io::IsTerminal;

/// `--in` values.
#[derive(ValueEnum, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[value(rename_all = "lower")]
pub enum InputFormat {
    /// Autodetect: null on a TTY, otherwise sniff JSON vs lines.
    #[default]
    Auto,
    /// A single null record.
    Null,
    /// The whole input as one string record.
    Raw,
    /// Non-empty lines as string records.
    Lines,
    /// Whitespace-separated JSON values.
    Json,
    /// CSV with a header row; records are objects.
    Csv,
    /// CSV without a header row; records are arrays.
    Rawcsv,
    /// TSV with a header row.
    Tsv,
    /// TSV without a header row.
    Rawtsv,
}

/// Opens stdin as a record stream in the requested format.
pub fn open_input(fmt: InputFormat) -> Result<RecordStream> {
    let stdin = std::io::stdin();

    if fmt == InputFormat::Auto {
        // A TTY with no explicit format means a single one-shot request.
        if stdin.is_terminal() {
            return Ok(null_stream());
        }
        let (detected, reader) = datafmt::autodetect_reader(stdin)?;
        return Ok(match detected {
            Format::Json => json_stream(reader),
            _ => line_stream(reader),
        });
    }

    Ok(match fmt {
        InputFormat::Null => null_stream(),
        InputFormat::Raw => raw_stream(stdin),
        InputFormat::Lines => line_stream(stdin),
        InputFormat::Json => json_stream(stdin),
        InputFormat::Csv => csv_stream(stdin, b',', false),
        InputFormat::Rawcsv => csv_stream(stdin, b',', true),
        InputFormat::Tsv => csv_stream(stdin, b'\t', false),
        InputFormat::Rawtsv => csv_stream(stdin, b'\t', true),
        InputFormat::Auto => unreachable!("handled above"),
    })
}
