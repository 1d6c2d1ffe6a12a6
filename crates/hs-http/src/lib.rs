// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP request synthesis and execution.
//!
//! [`RequestTemplate`] compiles URL/body/header templates once and builds
//! one [`BuiltRequest`] per input record. [`HttpRunner`] executes requests
//! with retries, gzip-aware response reading, and a sticky dry-run switch,
//! producing request/response output records. The [`commands`] module wires
//! both into pipeline [`RecordCommand`](hs_stream::RecordCommand)s.

#![deny(unsafe_code)]

pub mod builder;
pub mod commands;
pub mod retry;
pub mod runner;
pub mod types;

pub use builder::RequestTemplate;
pub use commands::{AddInputField, BuildCommand, HttpCommand, RunCommand};
pub use retry::{RetryFn, default_retry};
pub use runner::{DRY_RUN_ERROR, HttpRunner};
pub use types::{Attempt, BuiltRequest, extract_request, response_record};

/// Errors from building or executing HTTP requests.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("request build is missing host, and no global HOST variable is set")]
    MissingHost,

    #[error("unknown host alias @{0}")]
    UnknownHostAlias(String),

    #[error("malformed URL '{url}': {source}")]
    BadUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("bad HTTP method '{0}'")]
    BadMethod(String),

    #[error("header field missing colon: {0}")]
    HeaderMissingColon(String),

    #[error("bad header field in '{0}'")]
    BadHeaderField(String),

    #[error(transparent)]
    Expr(#[from] hs_expr::ExprError),

    #[error("gzip error: {0}")]
    Gzip(#[source] std::io::Error),

    #[error("response read error: {0}")]
    ResponseRead(#[source] reqwest::Error),

    #[error("missing HTTP method string in record: {0}")]
    MissingMethod(String),

    #[error("missing HTTP URL string in record: {0}")]
    MissingUrl(String),

    #[error("non-string value for header '{name}' in record: {value}")]
    BadHeaderValue { name: String, value: String },

    #[error("request cancelled")]
    Cancelled,
}
