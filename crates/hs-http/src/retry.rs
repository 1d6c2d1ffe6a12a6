// SPDX-License-Identifier: MIT OR Apache-2.0
//! Retry policy.

use crate::types::{Attempt, BuiltRequest};
use std::sync::Arc;
use std::time::Duration;

/// Consulted after each attempt with the number of prior failed attempts;
/// returns the backoff to sleep and whether to retry.
pub type RetryFn = Arc<dyn Fn(&BuiltRequest, &Attempt, usize) -> (Duration, bool) + Send + Sync>;

/// The default policy: retry up to `max_retries` times when the transport
/// errored or the status is 5xx, with one-second backoff.
pub fn default_retry(max_retries: usize) -> RetryFn {
    Arc::new(move |_req, attempt, prior| {
        let failed =
            attempt.is_transport_error() || attempt.status().is_some_and(|s| s / 100 == 5);
        (Duration::from_secs(1), failed && prior < max_retries)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use reqwest::header::HeaderMap;
    use url::Url;

    fn req() -> BuiltRequest {
        BuiltRequest {
            method: Method::GET,
            url: Url::parse("https://example.com/").unwrap(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    fn resp(status: u16) -> Attempt {
        Attempt::Response {
            status,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    #[test]
    fn retries_transport_errors_and_5xx_up_to_limit() {
        let policy = default_retry(2);
        let transport = Attempt::Error("refused".to_string());

        assert!((*policy)(&req(), &transport, 0).1);
        assert!((*policy)(&req(), &resp(500), 1).1);
        assert!(!(*policy)(&req(), &resp(503), 2).1, "limit reached");
    }

    #[test]
    fn does_not_retry_success_or_4xx() {
        let policy = default_retry(3);
        assert!(!(*policy)(&req(), &resp(200), 0).1);
        assert!(!(*policy)(&req(), &resp(404), 0).1);
        assert!(!(*policy)(&req(), &resp(302), 0).1);
    }

    #[test]
    fn attempt_count_property() {
        // A transport that fails k times then succeeds makes exactly
        // min(k + 1, n + 1) attempts under "retry while prior < n".
        for n in 0..4usize {
            for k in 0..6usize {
                let policy = default_retry(n);
                let mut attempts = 0;
                let mut prior = 0;
                loop {
                    attempts += 1;
                    let outcome = if attempts <= k { resp(500) } else { resp(200) };
                    let (_, again) = (*policy)(&req(), &outcome, prior);
                    if !again {
                        break;
                    }
                    prior += 1;
                }
                assert_eq!(attempts, (k + 1).min(n + 1), "n={n} k={k}");
            }
        }
    }

    #[test]
    fn backoff_is_one_second() {
        let policy = default_retry(1);
        assert_eq!((*policy)(&req(), &resp(500), 0).0, Duration::from_secs(1));
    }
}
