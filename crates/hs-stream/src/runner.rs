// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounded-parallel pipeline runner.
//!
//! A feeder moves records from the (blocking) input stream into a bounded
//! channel; `n` workers drain the channel, run the command, and write every
//! yielded record to the sink. The first error from any of them cancels the
//! pipeline and becomes the runner's result; later errors are dropped.
//! With `n == 1` output order matches input order; with `n > 1` no ordering
//! is guaranteed.

use crate::cancel::CancellationToken;
use crate::counter::ProgressCounter;
use crate::sink::RecordSink;
use crate::RecordCommand;
use anyhow::{Context, Result};
use hs_expr::Bindings;
use hs_record::stream::RecordStream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Runs `cmd` over every input record with `parallelism` workers.
pub async fn run_parallel(
    cancel: &CancellationToken,
    cmd: Arc<dyn RecordCommand>,
    binds: Arc<Bindings>,
    input: RecordStream,
    sink: Arc<dyn RecordSink>,
    parallelism: usize,
    counter: Option<Arc<ProgressCounter>>,
) -> Result<()> {
    let n = parallelism.max(1);
    let (rec_tx, rec_rx) = mpsc::channel::<hs_record::Record>(n);
    let rec_rx = Arc::new(tokio::sync::Mutex::new(rec_rx));
    let (err_tx, mut err_rx) = mpsc::channel::<anyhow::Error>(n + 1);

    // Feeder: drain the blocking input iterator off the async runtime.
    let feeder = {
        let cancel = cancel.clone();
        let err_tx = err_tx.clone();
        tokio::task::spawn_blocking(move || {
            for item in input {
                if cancel.is_cancelled() {
                    return;
                }
                match item {
                    Ok(rec) => {
                        // Send fails only when every worker is gone.
                        if rec_tx.blocking_send(rec).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = err_tx.try_send(anyhow::Error::new(e).context("reading input"));
                        cancel.cancel();
                        return;
                    }
                }
            }
        })
    };

    let mut workers = Vec::with_capacity(n);
    for worker_id in 0..n {
        let cancel = cancel.clone();
        let cmd = cmd.clone();
        let binds = binds.clone();
        let sink = sink.clone();
        let rec_rx = rec_rx.clone();
        let err_tx = err_tx.clone();
        let counter = counter.clone();

        workers.push(tokio::spawn(async move {
            loop {
                let rec = { rec_rx.lock().await.recv().await };
                let Some(rec) = rec else { break };

                match cmd.run(&cancel, rec, &binds).await {
                    Ok(outs) => {
                        if let Some(c) = &counter {
                            c.increment();
                        }
                        for out in outs {
                            if let Err(e) = sink.write(&out) {
                                debug!(target: "hs.pipeline", worker_id, error = %e, "sink error");
                                let _ = err_tx.try_send(e.context("writing output"));
                                cancel.cancel();
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        debug!(target: "hs.pipeline", worker_id, error = %e, "command error");
                        let _ = err_tx.try_send(e);
                        cancel.cancel();
                        return;
                    }
                }

                if cancel.is_cancelled() {
                    break;
                }
            }
        }));
    }
    drop(err_tx);

    for worker in workers {
        worker.await.context("join worker")?;
    }
    // The feeder may be stuck in a blocking read after cancellation; don't
    // wait for it in that case, just let the thread run out with the process.
    if !cancel.is_cancelled() {
        feeder.await.context("join input feeder")?;
    }

    match err_rx.recv().await {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
