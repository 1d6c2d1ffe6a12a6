// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed input streams.
//!
//! A [`RecordStream`] is a lazy, single-use sequence of records parsed from
//! a byte source. Sources are pull-based iterators; the pipeline runner
//! pushes their output through operators.

use crate::{Record, RecordError};
use serde_json::Value;
use std::io::{BufRead, BufReader, Read};

/// One pulled record, or the error that ended the stream.
pub type RecordResult = Result<Record, RecordError>;

/// A lazy, single-use stream of records.
pub type RecordStream = Box<dyn Iterator<Item = RecordResult> + Send>;

/// A stream of exactly one null record. Used for one-shot invocations with
/// no input (TTY stdin and no explicit format).
pub fn null_stream() -> RecordStream {
    Box::new(std::iter::once(Ok(Value::Null)))
}

/// A stream of exactly one record.
pub fn singleton_stream(rec: Record) -> RecordStream {
    Box::new(std::iter::once(Ok(rec)))
}

/// Slurps the whole input and emits it as one string record.
pub fn raw_stream<R: Read + Send + 'static>(reader: R) -> RecordStream {
    let mut reader = Some(reader);
    Box::new(std::iter::from_fn(move || {
        let mut r = reader.take()?;
        let mut buf = String::new();
        Some(match r.read_to_string(&mut buf) {
            Ok(_) => Ok(Value::String(buf)),
            Err(e) => Err(e.into()),
        })
    }))
}

/// Emits each non-empty newline-delimited line as a string record.
pub fn line_stream<R: Read + Send + 'static>(reader: R) -> RecordStream {
    let lines = BufReader::new(reader).lines();
    Box::new(lines.filter_map(|line| match line {
        Ok(l) if l.is_empty() => None,
        Ok(l) => Some(Ok(Value::String(l))),
        Err(e) => Some(Err(e.into())),
    }))
}

/// Decodes whitespace-separated JSON values.
pub fn json_stream<R: Read + Send + 'static>(reader: R) -> RecordStream {
    let iter = serde_json::Deserializer::from_reader(reader).into_iter::<Value>();
    Box::new(iter.map(|item| item.map_err(RecordError::from)))
}

/// Parses comma- or tab-separated values.
///
/// With `raw` unset, the first row is a header and each subsequent row
/// becomes an object keyed by header names. With `raw` set, no header is
/// consumed and each row becomes an array of strings.
pub fn csv_stream<R: Read + Send + 'static>(reader: R, delimiter: u8, raw: bool) -> RecordStream {
    let rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_reader(reader);

    let mut rows = rdr.into_records();
    let mut fields: Option<Vec<String>> = None;
    Box::new(std::iter::from_fn(move || {
        if !raw && fields.is_none() {
            match rows.next()? {
                Ok(hdr) => fields = Some(hdr.iter().map(str::to_owned).collect()),
                Err(e) => return Some(Err(e.into())),
            }
        }

        let row = match rows.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e.into())),
        };

        Some(Ok(match &fields {
            None => Value::Array(row.iter().map(|v| Value::String(v.into())).collect()),
            Some(names) => Value::Object(
                names
                    .iter()
                    .zip(row.iter())
                    .map(|(k, v)| (k.clone(), Value::String(v.into())))
                    .collect(),
            ),
        }))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collect(stream: RecordStream) -> Vec<Record> {
        stream.map(|r| r.expect("stream error")).collect()
    }

    #[test]
    fn null_stream_emits_single_null() {
        assert_eq!(collect(null_stream()), vec![Value::Null]);
    }

    #[test]
    fn raw_stream_slurps_everything() {
        let recs = collect(raw_stream("line1\nline2\n".as_bytes()));
        assert_eq!(recs, vec![json!("line1\nline2\n")]);
    }

    #[test]
    fn line_stream_skips_empty_lines() {
        let recs = collect(line_stream("alpha\n\nbeta\n\n\ngamma".as_bytes()));
        assert_eq!(recs, vec![json!("alpha"), json!("beta"), json!("gamma")]);
    }

    #[test]
    fn json_stream_decodes_whitespace_separated_values() {
        let input = "{\"a\":1}\n  [2,3] \"four\" 5";
        let recs = collect(json_stream(input.as_bytes()));
        assert_eq!(recs, vec![json!({"a":1}), json!([2, 3]), json!("four"), json!(5)]);
    }

    #[test]
    fn json_stream_propagates_decode_errors() {
        let mut stream = json_stream("{\"a\":1} nope".as_bytes());
        assert!(stream.next().unwrap().is_ok());
        assert!(matches!(stream.next(), Some(Err(RecordError::Json(_)))));
    }

    #[test]
    fn csv_stream_headers_become_object_keys() {
        let input = "name,city\nalice,berlin\nbob,tokyo\n";
        let recs = collect(csv_stream(input.as_bytes(), b',', false));
        assert_eq!(
            recs,
            vec![
                json!({"name": "alice", "city": "berlin"}),
                json!({"name": "bob", "city": "tokyo"}),
            ]
        );
    }

    #[test]
    fn raw_csv_stream_yields_arrays_without_header() {
        let input = "a,b\nc,d\n";
        let recs = collect(csv_stream(input.as_bytes(), b',', true));
        assert_eq!(recs, vec![json!(["a", "b"]), json!(["c", "d"])]);
    }

    #[test]
    fn tsv_stream_uses_tab_delimiter() {
        let input = "k\tv\nx\ty\n";
        let recs = collect(csv_stream(input.as_bytes(), b'\t', false));
        assert_eq!(recs, vec![json!({"k": "x", "v": "y"})]);
    }

    #[test]
    fn csv_stream_header_only_input_is_empty() {
        let recs = collect(csv_stream("a,b\n".as_bytes(), b',', false));
        assert!(recs.is_empty());
    }
}
