// SPDX-License-Identifier: MIT OR Apache-2.0
//! Terminal progress bar glue.
//!
//! Input records are buffered through a large bounded channel on a thread
//! so the input side keeps streaming while requests run; one counter tracks
//! records read, another tracks records processed. The bar renders with an
//! indefinite total until the input hits end-of-stream, at which point the
//! total becomes definite.

use clap::ValueEnum;
use hs_record::stream::RecordStream;
use hs_stream::counter::{ProgressCounter, counting_stream};
use hs_stream::CancellationToken;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

/// `--progress` values.
#[derive(ValueEnum, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[value(rename_all = "lower")]
pub enum ProgressMode {
    /// Render when stdout is redirected away from the terminal.
    #[default]
    Auto,
    /// Always render.
    True,
    /// Never render.
    False,
}

const MAX_BUFFERED_RECORDS: usize = 1 << 16;
const RENDER_INTERVAL: Duration = Duration::from_millis(250);

/// The running render task; [`finish`](ProgressHandle::finish) after the
/// pipeline completes (and the token is cancelled) to let it shut down.
pub struct ProgressHandle {
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl ProgressHandle {
    /// Waits for the renderer to exit.
    pub async fn finish(self) {
        if let Some(handle) = self.handle {
            let _ = handle.await;
        }
    }
}

/// Wraps `input` with progress accounting when `enable` is set. Returns
/// the stream to feed the pipeline, the processed-records counter to hand
/// to the runner, and the render task handle.
pub fn attach(
    cancel: &CancellationToken,
    input: RecordStream,
    enable: bool,
) -> (RecordStream, Option<Arc<ProgressCounter>>, ProgressHandle) {
    if !enable {
        return (input, None, ProgressHandle { handle: None });
    }

    let in_counter = ProgressCounter::new();
    let counted = counting_stream(input, in_counter.clone());

    // Buffer the counted input through a channel so records stream in ahead
    // of the workers and the input total becomes known as early as possible.
    let (tx, rx) = std::sync::mpsc::sync_channel(MAX_BUFFERED_RECORDS);
    let feeder_cancel = cancel.clone();
    std::thread::spawn(move || {
        for item in counted {
            if feeder_cancel.is_cancelled() || tx.send(item).is_err() {
                return;
            }
        }
    });
    let buffered: RecordStream = Box::new(rx.into_iter());

    let out_counter = ProgressCounter::new();
    let handle = tokio::spawn(render(cancel.clone(), in_counter, out_counter.clone()));

    (
        buffered,
        Some(out_counter),
        ProgressHandle {
            handle: Some(handle),
        },
    )
}

async fn render(
    cancel: CancellationToken,
    in_counter: Arc<ProgressCounter>,
    out_counter: Arc<ProgressCounter>,
) {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} {pos} req ({per_sec}, {elapsed}) buffering input")
    {
        bar.set_style(style);
    }

    let mut ticker = tokio::time::interval(RENDER_INTERVAL);
    let mut total_known = false;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (read, input_done) = in_counter.snapshot();
                let (processed, _) = out_counter.snapshot();

                if input_done && !total_known {
                    bar.set_length(read);
                    if let Ok(style) = ProgressStyle::with_template(
                        "{bar:40} {pos}/{len} req ({per_sec}, {elapsed})",
                    ) {
                        bar.set_style(style);
                    }
                    total_known = true;
                }
                bar.set_position(processed);
            }
            _ = cancel.cancelled() => {
                bar.finish();
                return;
            }
        }
    }
}
