// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request execution with retries, gzip decoding, and dry-run.

use crate::HttpError;
use crate::retry::RetryFn;
use crate::types::{Attempt, BuiltRequest, response_record};
use flate2::read::GzDecoder;
use hs_record::Record;
use hs_stream::CancellationToken;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING, HeaderValue};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// The error string reported for requests suppressed by dry-run.
pub const DRY_RUN_ERROR: &str = "request not sent";

/// Executes built requests against a shared client.
///
/// Dry-run is a sticky one-way switch: once set, new requests complete
/// immediately with an error response record; requests already in flight
/// are unaffected.
pub struct HttpRunner {
    client: reqwest::Client,
    retry: Option<RetryFn>,
    dryrun: AtomicBool,
}

impl HttpRunner {
    /// Creates a runner over `client` with an optional retry policy.
    pub fn new(client: reqwest::Client, retry: Option<RetryFn>) -> Self {
        HttpRunner {
            client,
            retry,
            dryrun: AtomicBool::new(false),
        }
    }

    /// Switches the runner to dry-run. Sticky; clears nothing.
    pub fn set_dry_run(&self) {
        self.dryrun.store(true, Ordering::SeqCst);
    }

    /// Executes one request and forms its output record. Transport failures
    /// and HTTP statuses are values in the record; hard errors (cancellation,
    /// unreadable response body) abort the pipeline.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        req: BuiltRequest,
    ) -> Result<Record, HttpError> {
        // The output record reports the request as built; the transport-level
        // Accept-Encoding injection below stays out of it.
        let mut send_headers = req.headers.clone();
        send_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        if self.dryrun.load(Ordering::SeqCst) {
            return Ok(response_record(
                &req,
                &Attempt::Error(DRY_RUN_ERROR.to_string()),
                &[],
            ));
        }

        let mut retries: Vec<Attempt> = Vec::new();
        let last = loop {
            let attempt = self.attempt(cancel, &req, &send_headers).await?;

            let Some(retry) = &self.retry else {
                break attempt;
            };
            let (backoff, again) = (**retry)(&req, &attempt, retries.len());
            if !again {
                break attempt;
            }

            debug!(
                target: "hs.http",
                url = %req.url,
                attempt = retries.len() + 1,
                backoff_ms = backoff.as_millis() as u64,
                "retrying request"
            );
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = cancel.cancelled() => return Err(HttpError::Cancelled),
            }
            retries.push(attempt);
        };

        Ok(response_record(&req, &last, &retries))
    }

    async fn attempt(
        &self,
        cancel: &CancellationToken,
        req: &BuiltRequest,
        send_headers: &reqwest::header::HeaderMap,
    ) -> Result<Attempt, HttpError> {
        let mut builder = self
            .client
            .request(req.method.clone(), req.url.clone())
            .headers(send_headers.clone());
        // The body is rebuilt from its saved content on every attempt.
        if let Some(body) = &req.body {
            builder = builder.body(body.clone());
        }

        let sent = tokio::select! {
            r = builder.send() => r,
            _ = cancel.cancelled() => return Err(HttpError::Cancelled),
        };
        let resp = match sent {
            Ok(resp) => resp,
            Err(e) => return Ok(Attempt::Error(e.to_string())),
        };

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let bytes = tokio::select! {
            b = resp.bytes() => b.map_err(HttpError::ResponseRead)?,
            _ = cancel.cancelled() => return Err(HttpError::Cancelled),
        };

        let gzipped = headers
            .get(CONTENT_ENCODING)
            .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"gzip"));
        let body = if gzipped {
            let mut decoded = Vec::new();
            GzDecoder::new(&bytes[..])
                .read_to_end(&mut decoded)
                .map_err(HttpError::Gzip)?;
            String::from_utf8_lossy(&decoded).into_owned()
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        };

        Ok(Attempt::Response {
            status,
            headers,
            body,
        })
    }
}
