// SPDX-License-Identifier: MIT OR Apache-2.0
//! Data-format autodetection.
//!
//! Used in two places: classifying stdin when no `--in` format is given, and
//! choosing a `Content-Type` for request bodies that lack one. Detection
//! inspects at most the first 512 bytes of the data.

use std::io::Read;

/// Number of leading bytes consulted by autodetection.
pub const MAX_AUTODETECT_LEN: usize = 512;

/// A detected data format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Nothing recognizable.
    Unknown,
    /// A JSON value (or a truncated prefix of one).
    Json,
    /// URL-encoded form data (`a=1&b=2`).
    FormData,
}

impl Format {
    /// The `Content-Type` header value for this format, if it has one.
    pub fn content_type(self) -> Option<&'static str> {
        match self {
            Format::Unknown => None,
            Format::Json => Some("application/json"),
            Format::FormData => Some("application/x-www-form-urlencoded"),
        }
    }
}

/// Detects the format of `data`, looking at no more than its first
/// [`MAX_AUTODETECT_LEN`] bytes.
pub fn autodetect(data: &str) -> Format {
    let data = truncate_to_boundary(data, MAX_AUTODETECT_LEN);

    // JSON if the first token is valid JSON. A lone '{' or '[' after
    // whitespace is enough (the value may be truncated); a primitive must
    // parse completely, so a broken string does not detect as JSON.
    let trimmed = data.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Format::Json;
    }
    if !trimmed.is_empty()
        && let Some(Ok(_)) = serde_json::Deserializer::from_str(trimmed)
            .into_iter::<serde_json::Value>()
            .next()
    {
        return Format::Json;
    }

    // Form data if it parses as such (truncation always leaves valid data),
    // and either there are multiple entries or one entry has both a key and
    // a non-empty value. This keeps "foobar" (a single key-only entry) from
    // detecting as FormData.
    let entries: Vec<(String, String)> = url::form_urlencoded::parse(data.as_bytes())
        .into_owned()
        .collect();
    if entries.len() >= 2 {
        return Format::FormData;
    }
    if let [(k, v)] = entries.as_slice()
        && !k.is_empty()
        && !v.is_empty()
    {
        return Format::FormData;
    }

    Format::Unknown
}

/// Reads up to [`MAX_AUTODETECT_LEN`] bytes from `reader`, detects their
/// format, and returns a reader that replays the consumed prefix in front of
/// the remaining input.
pub fn autodetect_reader(
    mut reader: impl Read + Send + 'static,
) -> std::io::Result<(Format, Box<dyn Read + Send>)> {
    let mut prefix = Vec::with_capacity(MAX_AUTODETECT_LEN);
    let mut take = (&mut reader).take(MAX_AUTODETECT_LEN as u64);
    take.read_to_end(&mut prefix)?;

    let format = autodetect(&String::from_utf8_lossy(&prefix));
    Ok((format, Box::new(std::io::Cursor::new(prefix).chain(reader))))
}

fn truncate_to_boundary(data: &str, max: usize) -> &str {
    if data.len() <= max {
        return data;
    }
    let mut end = max;
    while end > 0 && !data.is_char_boundary(end) {
        end -= 1;
    }
    &data[..end]
}
