// SPDX-License-Identifier: MIT OR Apache-2.0
//! Record pipeline: commands, sinks, and the bounded-parallel runner.
//!
//! A [`RecordCommand`] takes action on each input record — building and
//! running an HTTP request, reformatting, and so on — yielding zero or more
//! output records. [`runner::run_parallel`] drives a whole input stream
//! through one command with bounded parallelism, funnelling outputs into a
//! shared [`RecordSink`] and aborting the pipeline on the first error.

#![deny(unsafe_code)]

pub mod cancel;
pub mod counter;
pub mod runner;
pub mod sink;

pub use cancel::CancellationToken;
pub use counter::ProgressCounter;
pub use runner::run_parallel;
pub use sink::{JsonLineSink, RecordSink};

use anyhow::Result;
use async_trait::async_trait;
use hs_expr::Bindings;
use hs_record::Record;
use std::sync::Arc;

/// Takes action on a sequence of records, possibly returning more records
/// in response to each.
///
/// Implementations must be safe for concurrent use: the parallel runner
/// calls `run` from many workers at once. Long-running work should honor
/// `cancel` promptly.
#[async_trait]
pub trait RecordCommand: Send + Sync {
    /// Processes one input record under the given bindings.
    async fn run(
        &self,
        cancel: &CancellationToken,
        rec: Record,
        binds: &Arc<Bindings>,
    ) -> Result<Vec<Record>>;
}
