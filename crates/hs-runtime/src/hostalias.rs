// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host aliasing.
//!
//! A request URL of the form `https://@prod/path` treats `prod` as an alias
//! key rather than a hostname. Alias functions compose, first non-empty
//! answer wins, so config tables and plugins can stack.

use std::collections::HashMap;
use std::sync::Arc;

/// Applies host aliasing rules: returns the replacement host for an alias
/// key, or `None` when no aliasing applies.
pub type HostAliasFn = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// The no-op aliasing function.
pub fn none() -> HostAliasFn {
    Arc::new(|_| None)
}

/// Aliasing backed by a simple lookup table.
pub fn table(mapping: HashMap<String, String>) -> HostAliasFn {
    Arc::new(move |host| mapping.get(host).cloned())
}

/// Composes two alias functions; `base` answers first.
pub fn compose(base: HostAliasFn, next: HostAliasFn) -> HostAliasFn {
    Arc::new(move |host| (*base)(host).or_else(|| (*next)(host)))
}
