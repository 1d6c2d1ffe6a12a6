// SPDX-License-Identifier: MIT OR Apache-2.0
//! Program runtime context for hs: configuration loading, host aliasing,
//! cookie jars, and `--loadjson` lookup tables.
//!
//! Everything here runs once at startup. The result is a [`Context`] whose
//! pieces — global scope/bindings, function table, HTTP client — are
//! immutable and shared by every pipeline worker.

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod cookie;
pub mod hostalias;
pub mod loadjson;

pub use context::{Context, Options};
pub use hostalias::HostAliasFn;

use std::path::PathBuf;

/// Errors from runtime setup.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config file {0} already exists")]
    ConfigExists(PathBuf),

    #[error("expected {expected} for {name}, got {actual}")]
    BadConfigValue {
        name: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("bad cookie line {line} in {path}")]
    MalformedCookieFile { path: PathBuf, line: usize },

    #[error("bad load spec '{spec}', should be of form 'filename,varname,keyexpr'")]
    BadLoadSpec { spec: String },

    #[error("bad key expression '{src}': {source}")]
    BadKeyExpr {
        src: String,
        #[source]
        source: hs_expr::ExprError,
    },

    #[error("evaluating key expression: {0}")]
    KeyExprEval(#[source] hs_expr::ExprError),

    #[error("decoding {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: hs_record::RecordError,
    },

    #[error("building HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
