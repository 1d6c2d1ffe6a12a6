// SPDX-License-Identifier: MIT OR Apache-2.0
//! `--loadjson` lookup tables.
//!
//! A load spec `filename,varname,keyexpr` reads a JSON stream from
//! `filename`, evaluates `keyexpr` over each value to produce a string key,
//! and binds `varname` in a new child scope to the resulting object. Tables
//! load before URL/body/header templates parse, so templates see the final
//! scope.

use crate::RuntimeError;
use hs_expr::{Bindings, FuncTable, Scope, Scoped, parse_expr};
use hs_record::{Object, coerce_string, stream::json_stream};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Applies one load spec, returning the extended scope and bindings.
pub fn load_json_table(
    spec: &str,
    globals: &Scoped,
    funcs: &Arc<FuncTable>,
) -> Result<Scoped, RuntimeError> {
    let mut parts = spec.splitn(3, ',');
    let (Some(filename), Some(varname), Some(keyexpr_src)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(RuntimeError::BadLoadSpec {
            spec: spec.to_string(),
        });
    };

    let keyexpr =
        parse_expr(keyexpr_src, &globals.scope, funcs).map_err(|e| RuntimeError::BadKeyExpr {
            src: keyexpr_src.to_string(),
            source: e,
        })?;

    let path = PathBuf::from(filename);
    let file = std::fs::File::open(&path).map_err(|e| RuntimeError::Io {
        path: path.clone(),
        source: e,
    })?;

    let mut table = Object::new();
    for item in json_stream(file) {
        let value = item.map_err(|e| RuntimeError::Decode {
            path: path.clone(),
            source: e,
        })?;
        let key = keyexpr
            .eval(&value, &globals.binds)
            .map_err(RuntimeError::KeyExprEval)?;
        table.insert(coerce_string(&key), value);
    }
    debug!(target: "hs.config", %varname, entries = table.len(), "loaded json table");

    let (scope, ids) = Scope::derive(Some(&globals.scope), [varname]);
    let binds = Bindings::derive(
        Some(&globals.binds),
        std::iter::zip(ids, [Value::Object(table)]).collect(),
    );
    Ok(Scoped { scope, binds })
}
