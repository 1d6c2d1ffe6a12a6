// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output formatting and the success/fail split sink.
//!
//! A record is a "fail" iff its response is a transport error or a non-2xx
//! status. Fails are written unformatted to the failure writer, so a fail
//! file can be fed straight back into `hs run`; successes pass through the
//! output formatter. Both writers share one mutex.

use anyhow::Result;
use clap::ValueEnum;
use hs_record::{Record, coerce_string};
use hs_stream::RecordSink;
use serde_json::Value;
use std::io::{IsTerminal, Write};
use std::sync::Mutex;

/// `--out` values.
#[derive(ValueEnum, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[value(rename_all = "lower")]
pub enum OutputFormat {
    /// `body` on a TTY, `reqresp` otherwise.
    #[default]
    Auto,
    /// Full request+response record, with the input echoed under `input`.
    Full,
    /// Full request+response record.
    Reqresp,
    /// Response sub-object only.
    Resp,
    /// `<status>\n<body>`; `000\n<error>` on transport error.
    Bodycode,
    /// Response body; the error string on transport error.
    Body,
}

/// Whether a request/response record counts as a failure.
pub fn is_fail_response(rec: &Record) -> bool {
    let resp = rec.get("response");
    if resp.and_then(|r| r.get("error")).is_some() {
        return true;
    }
    let status = resp
        .and_then(|r| r.get("status"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    (status as i64) / 100 != 2
}

type Formatter = Box<dyn Fn(&Record) -> Record + Send + Sync>;

fn formatter(fmt: OutputFormat, tty: bool) -> Formatter {
    let fmt = match fmt {
        OutputFormat::Auto if tty => OutputFormat::Body,
        OutputFormat::Auto => OutputFormat::Reqresp,
        other => other,
    };

    match fmt {
        OutputFormat::Auto => unreachable!("resolved above"),
        OutputFormat::Full | OutputFormat::Reqresp => Box::new(Record::clone),
        OutputFormat::Resp => {
            Box::new(|rec| rec.get("response").cloned().unwrap_or(Value::Null))
        }
        OutputFormat::Body => Box::new(|rec| {
            let resp = &rec["response"];
            match resp.get("error") {
                Some(err) => err.clone(),
                None => resp.get("body").cloned().unwrap_or(Value::Null),
            }
        }),
        OutputFormat::Bodycode => Box::new(|rec| {
            let resp = &rec["response"];
            let line = match resp.get("error") {
                Some(err) => format!("000\n{}", coerce_string(err)),
                None => format!(
                    "{}\n{}",
                    coerce_string(resp.get("status").unwrap_or(&Value::Null)),
                    coerce_string(resp.get("body").unwrap_or(&Value::Null)),
                ),
            };
            Value::String(line)
        }),
    }
}

struct Writers {
    out: Box<dyn Write + Send>,
    fails: Box<dyn Write + Send>,
}

/// The terminal sink: formats successes, splits off failures.
pub struct SplitSink {
    format: Formatter,
    writers: Mutex<Writers>,
}

impl SplitSink {
    /// Builds a sink over explicit writers; `tty` selects the `auto` mode.
    pub fn new(
        fmt: OutputFormat,
        tty: bool,
        out: Box<dyn Write + Send>,
        fails: Box<dyn Write + Send>,
    ) -> Self {
        SplitSink {
            format: formatter(fmt, tty),
            writers: Mutex::new(Writers { out, fails }),
        }
    }
}

impl RecordSink for SplitSink {
    fn write(&self, rec: &Record) -> Result<()> {
        let (line, fail) = if is_fail_response(rec) {
            (coerce_string(rec), true)
        } else {
            (coerce_string(&(self.format)(rec)), false)
        };

        let mut writers = self.writers.lock().expect("sink lock poisoned");
        let w = if fail {
            &mut writers.fails
        } else {
            &mut writers.out
        };
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")?;
        Ok(())
    }
}

/// Opens the standard output sink: stdout for successes and, unless
/// `failfile` is `-`, a created file for failures.
pub fn open_output(fmt: OutputFormat, failfile: &str) -> Result<SplitSink> {
    let stdout = std::io::stdout();
    let tty = stdout.is_terminal();

    let fails: Box<dyn Write + Send> = if failfile.is_empty() || failfile == "-" {
        Box::new(std::io::stdout())
    } else {
        Box::new(std::fs::File::create(failfile)?)
    };

    Ok(SplitSink::new(fmt, tty, Box::new(stdout), fails))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Buf(Arc<Mutex<Vec<u8>>>);

    impl Buf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Buf {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn sink(fmt: OutputFormat) -> (SplitSink, Buf, Buf) {
        let out = Buf::default();
        let fails = Buf::default();
        let sink = SplitSink::new(fmt, false, Box::new(out.clone()), Box::new(fails.clone()));
        (sink, out, fails)
    }

    fn ok_record() -> Record {
        json!({
            "method": "GET",
            "url": "https://x/",
            "response": {"status": 200, "body": "hello"},
        })
    }

    #[test]
    fn fail_classification() {
        assert!(!is_fail_response(&ok_record()));
        assert!(is_fail_response(&json!({"response": {"status": 500}})));
        assert!(is_fail_response(&json!({"response": {"status": 302}})));
        assert!(is_fail_response(&json!({"response": {"error": "refused"}})));
        assert!(is_fail_response(&json!({"no": "response"})));
    }

    #[test]
    fn successes_format_and_go_to_out() {
        let (sink, out, fails) = sink(OutputFormat::Resp);
        sink.write(&ok_record()).unwrap();
        assert_eq!(out.contents(), "{\"status\":200,\"body\":\"hello\"}\n");
        assert_eq!(fails.contents(), "");
    }

    #[test]
    fn failures_skip_the_formatter_for_round_tripping() {
        let (sink, out, fails) = sink(OutputFormat::Body);
        let fail = json!({
            "method": "GET",
            "url": "https://x/",
            "response": {"status": 500, "body": "oops"},
        });
        sink.write(&fail).unwrap();
        assert_eq!(out.contents(), "");
        // Unformatted: the whole record, ready to re-run.
        assert_eq!(fails.contents(), format!("{fail}\n"));
    }

    #[test]
    fn body_mode_prints_bare_body_or_error() {
        let (sink, out, _) = sink(OutputFormat::Body);
        sink.write(&ok_record()).unwrap();
        assert_eq!(out.contents(), "hello\n");

        // Transport-error fails don't reach the formatter at all, so body
        // mode only sees the error string through the formatter when the
        // record is classified a success; the error path is exercised via
        // formatter() directly.
        let f = formatter(OutputFormat::Body, false);
        assert_eq!(
            f(&json!({"response": {"error": "refused"}})),
            json!("refused")
        );
    }

    #[test]
    fn bodycode_mode_prefixes_the_status() {
        let f = formatter(OutputFormat::Bodycode, false);
        assert_eq!(f(&ok_record()), json!("200\nhello"));
        assert_eq!(
            f(&json!({"response": {"error": "refused"}})),
            json!("000\nrefused")
        );
    }

    #[test]
    fn auto_mode_resolves_by_tty() {
        let tty = formatter(OutputFormat::Auto, true);
        assert_eq!(tty(&ok_record()), json!("hello"));

        let pipe = formatter(OutputFormat::Auto, false);
        assert_eq!(pipe(&ok_record()), ok_record());
    }

    #[test]
    fn reqresp_passes_records_through() {
        let (sink, out, _) = sink(OutputFormat::Reqresp);
        sink.write(&ok_record()).unwrap();
        assert_eq!(out.contents(), format!("{}\n", ok_record()));
    }
}
