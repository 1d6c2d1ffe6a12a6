// SPDX-License-Identifier: MIT OR Apache-2.0
//! Progress accounting for the pipeline.

use hs_record::stream::RecordStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A shared counter with a completion flag.
///
/// The runner increments one of these per processed record; a counting
/// stream wrapper increments another per record pulled from the input, and
/// marks it done at end of input. Progress rendering reads both.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    count: AtomicU64,
    done: AtomicBool,
}

impl ProgressCounter {
    /// Creates a counter at zero.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adds one.
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Marks the counted sequence as complete.
    pub fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    /// Returns the current count and whether the sequence completed.
    pub fn snapshot(&self) -> (u64, bool) {
        (
            self.count.load(Ordering::Relaxed),
            self.done.load(Ordering::Acquire),
        )
    }
}

/// Wraps a stream so that `counter` tracks how many records were pulled,
/// marking it done when the stream ends.
pub fn counting_stream(input: RecordStream, counter: Arc<ProgressCounter>) -> RecordStream {
    let mut input = Some(input);
    let mut inner = move || {
        let it = input.as_mut()?;
        match it.next() {
            Some(item) => {
                counter.increment();
                Some(item)
            }
            None => {
                counter.mark_done();
                input = None;
                None
            }
        }
    };
    Box::new(std::iter::from_fn(move || inner()))
}
