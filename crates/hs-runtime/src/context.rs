// SPDX-License-Identifier: MIT OR Apache-2.0
//! The assembled runtime context.

use crate::cookie;
use crate::hostalias::{self, HostAliasFn};
use crate::{RuntimeError, config};
use hs_expr::{FuncTable, Scoped};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const HOST_CONFIG_VAR: &str = "HOST";
const HOST_ALIASES_CONFIG_VAR: &str = "HOST_ALIASES";

/// Options for building a [`Context`].
#[derive(Debug, Default)]
pub struct Options {
    /// `-b` cookie specs from the command line.
    pub cookie_specs: Vec<String>,
}

/// Everything a command needs at runtime: global scope/bindings, the
/// function table, host defaults and aliasing, and the shared HTTP client.
pub struct Context {
    /// Global names and values from config and loadjson tables.
    pub globals: Scoped,
    /// Function table for expression parsing.
    pub funcs: Arc<FuncTable>,
    /// Default host when URL templates omit one; empty when unset.
    pub default_host: String,
    /// Host aliasing for `@alias` request URLs.
    pub host_alias: HostAliasFn,
    /// Shared HTTP client (cookie jar attached, redirects followed).
    pub client: reqwest::Client,
}

impl Context {
    /// Builds the standard context: loads config, reads the `HOST`,
    /// `HOST_ALIASES`, `COOKIE_HOST_ALIASES`, and `COOKIES` entries, and
    /// assembles the HTTP client.
    pub fn default_context(opts: Options) -> Result<Context, RuntimeError> {
        let globals = config::load(None)?;

        let default_host = config_host(&globals)?;
        let host_alias = config_host_aliasing(&globals)?;

        let jar = cookie::load_jar(&opts.cookie_specs, &globals)?;
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::new(jar))
            .build()?;

        Ok(Context {
            globals,
            funcs: FuncTable::builtins(),
            default_host,
            host_alias,
            client,
        })
    }
}

fn config_host(globals: &Scoped) -> Result<String, RuntimeError> {
    match globals.lookup(HOST_CONFIG_VAR) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(host)) => Ok(host.clone()),
        Some(other) => Err(RuntimeError::BadConfigValue {
            name: HOST_CONFIG_VAR,
            expected: "string",
            actual: hs_record::type_name(other),
        }),
    }
}

fn config_host_aliasing(globals: &Scoped) -> Result<HostAliasFn, RuntimeError> {
    match globals.lookup(HOST_ALIASES_CONFIG_VAR) {
        None | Some(Value::Null) => Ok(hostalias::none()),
        Some(Value::Object(map)) => {
            let mut aliases = HashMap::with_capacity(map.len());
            for (key, val) in map {
                let Value::String(host) = val else {
                    return Err(RuntimeError::BadConfigValue {
                        name: HOST_ALIASES_CONFIG_VAR,
                        expected: "string values",
                        actual: hs_record::type_name(val),
                    });
                };
                aliases.insert(key.clone(), host.clone());
            }
            Ok(hostalias::table(aliases))
        }
        Some(other) => Err(RuntimeError::BadConfigValue {
            name: HOST_ALIASES_CONFIG_VAR,
            expected: "map",
            actual: hs_record::type_name(other),
        }),
    }
}
