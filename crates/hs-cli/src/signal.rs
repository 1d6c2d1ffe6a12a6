// SPDX-License-Identifier: MIT OR Apache-2.0
//! Two-stage interrupt handling.
//!
//! First Ctrl-C: flip the HTTP runner to dry-run, so in-flight requests
//! finish and everything still queued completes immediately with an error
//! record. Second Ctrl-C: cancel the pipeline outright.

use hs_stream::CancellationToken;
use tracing::warn;

/// Spawns the interrupt listener. It exits with the pipeline token.
pub fn attach_two_stage(cancel: &CancellationToken, soft: impl Fn() + Send + Sync + 'static) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        let mut interrupts = 0u32;
        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if result.is_err() {
                        return;
                    }
                    match interrupts {
                        0 => {
                            soft();
                            warn!(target: "hs.signal", "interrupt: terminating after finishing existing requests");
                        }
                        1 => {
                            warn!(target: "hs.signal", "interrupt: terminating immediately");
                            cancel.cancel();
                        }
                        _ => {}
                    }
                    interrupts += 1;
                }
                _ = cancel.cancelled() => return,
            }
        }
    });
}
