// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in functions and the function table.
//!
//! The [`FuncTable`] is a parent-linked, immutable map from name to
//! implementation. Function heads resolve against it at parse time and the
//! resolved [`Func`] is stored in the AST, so evaluation never looks a name
//! up again.

use crate::ExprError;
use hs_record::{Record, as_strings_array, coerce_string, type_name};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A built-in function: takes evaluated argument records, returns a record.
pub type Func = Arc<dyn Fn(&[Record]) -> Result<Record, ExprError> + Send + Sync>;

/// An immutable, parent-linked function table.
pub struct FuncTable {
    parent: Option<Arc<FuncTable>>,
    funcs: HashMap<String, Func>,
}

impl FuncTable {
    /// Creates a table derived from `parent` with additional functions.
    pub fn derive(parent: Option<&Arc<FuncTable>>, funcs: HashMap<String, Func>) -> Arc<FuncTable> {
        Arc::new(FuncTable {
            parent: parent.cloned(),
            funcs,
        })
    }

    /// Resolves a function by name, searching this table then ancestors.
    pub fn get(&self, name: &str) -> Option<Func> {
        self.funcs
            .get(name)
            .cloned()
            .or_else(|| self.parent.as_ref()?.get(name))
    }

    /// The fixed table of built-in functions.
    pub fn builtins() -> Arc<FuncTable> {
        Self::derive(None, builtin_funcs())
    }
}

// ---------------------------------------------------------------------------
// Built-ins
// ---------------------------------------------------------------------------

/// `urlenc` keeps unreserved characters as-is.
const URLENC_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn err(func: &str, msg: impl Into<String>) -> ExprError {
    ExprError::Builtin {
        func: func.to_string(),
        msg: msg.into(),
    }
}

fn arity(func: &str, args: &[Record], want: usize) -> Result<(), ExprError> {
    if args.len() != want {
        return Err(err(
            func,
            format!("expected {want} argument(s), got {}", args.len()),
        ));
    }
    Ok(())
}

fn want_number(func: &str, arg: &Record) -> Result<f64, ExprError> {
    arg.as_f64()
        .ok_or_else(|| err(func, format!("expected a number, got {}", type_name(arg))))
}

fn want_string<'a>(func: &str, arg: &'a Record) -> Result<&'a str, ExprError> {
    arg.as_str()
        .ok_or_else(|| err(func, format!("expected a string, got {}", type_name(arg))))
}

fn number(func: &str, v: f64) -> Result<Record, ExprError> {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .ok_or_else(|| err(func, "non-finite result"))
}

fn arith(name: &'static str, op: fn(f64, f64) -> f64) -> Func {
    Arc::new(move |args| {
        arity(name, args, 2)?;
        let a = want_number(name, &args[0])?;
        let b = want_number(name, &args[1])?;
        number(name, op(a, b))
    })
}

fn builtin_funcs() -> HashMap<String, Func> {
    let mut table: HashMap<String, Func> = HashMap::new();
    let mut put = |name: &str, f: Func| table.insert(name.to_string(), f);

    put(
        "id",
        Arc::new(|args| {
            arity("id", args, 1)?;
            Ok(args[0].clone())
        }),
    );

    put("arr", Arc::new(|args| Ok(Value::Array(args.to_vec()))));

    put(
        "obj",
        Arc::new(|args| {
            if args.len() % 2 != 0 {
                return Err(err("obj", "expected an even number of arguments"));
            }
            let mut obj = serde_json::Map::with_capacity(args.len() / 2);
            for pair in args.chunks(2) {
                obj.insert(coerce_string(&pair[0]), pair[1].clone());
            }
            Ok(Value::Object(obj))
        }),
    );

    put("add", arith("add", |a, b| a + b));
    put("sub", arith("sub", |a, b| a - b));
    put("mul", arith("mul", |a, b| a * b));
    put("div", arith("div", |a, b| a / b));

    put(
        "cat",
        Arc::new(|args| {
            Ok(Value::String(
                args.iter().map(coerce_string).collect::<String>(),
            ))
        }),
    );

    put(
        "upper",
        Arc::new(|args| {
            arity("upper", args, 1)?;
            Ok(Value::String(want_string("upper", &args[0])?.to_uppercase()))
        }),
    );

    put(
        "lower",
        Arc::new(|args| {
            arity("lower", args, 1)?;
            Ok(Value::String(want_string("lower", &args[0])?.to_lowercase()))
        }),
    );

    put(
        "trim",
        Arc::new(|args| {
            arity("trim", args, 1)?;
            Ok(Value::String(want_string("trim", &args[0])?.trim().to_string()))
        }),
    );

    put(
        "len",
        Arc::new(|args| {
            arity("len", args, 1)?;
            let n = match &args[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                other => {
                    return Err(err(
                        "len",
                        format!("expected string, array, or object, got {}", type_name(other)),
                    ));
                }
            };
            Ok(Value::from(n))
        }),
    );

    put(
        "split",
        Arc::new(|args| {
            arity("split", args, 2)?;
            let sep = want_string("split", &args[0])?;
            let s = want_string("split", &args[1])?;
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(sep).map(|p| Value::String(p.to_string())).collect()
            };
            Ok(Value::Array(parts))
        }),
    );

    put(
        "join",
        Arc::new(|args| {
            arity("join", args, 2)?;
            let sep = want_string("join", &args[0])?;
            let parts = as_strings_array(&args[1], false)
                .map_err(|e| err("join", e.to_string()))?;
            Ok(Value::String(parts.join(sep)))
        }),
    );

    put(
        "default",
        Arc::new(|args| {
            arity("default", args, 2)?;
            Ok(if args[0].is_null() {
                args[1].clone()
            } else {
                args[0].clone()
            })
        }),
    );

    put(
        "tojson",
        Arc::new(|args| {
            arity("tojson", args, 1)?;
            Ok(Value::String(args[0].to_string()))
        }),
    );

    put(
        "fromjson",
        Arc::new(|args| {
            arity("fromjson", args, 1)?;
            let s = want_string("fromjson", &args[0])?;
            serde_json::from_str(s).map_err(|e| err("fromjson", e.to_string()))
        }),
    );

    put(
        "urlenc",
        Arc::new(|args| {
            arity("urlenc", args, 1)?;
            let s = want_string("urlenc", &args[0])?;
            Ok(Value::String(utf8_percent_encode(s, URLENC_SET).to_string()))
        }),
    );

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: &[Record]) -> Result<Record, ExprError> {
        let func = FuncTable::builtins().get(name).expect("builtin exists");
        (*func)(args)
    }

    #[test]
    fn id_returns_argument() {
        assert_eq!(call("id", &[json!({"k": 1})]).unwrap(), json!({"k": 1}));
        assert!(call("id", &[]).is_err());
    }

    #[test]
    fn arr_and_obj_construct_collections() {
        assert_eq!(call("arr", &[json!(1), json!("a")]).unwrap(), json!([1, "a"]));
        assert_eq!(
            call("obj", &[json!("k"), json!(1), json!(2), json!("v")]).unwrap(),
            json!({"k": 1, "2": "v"})
        );
        assert!(call("obj", &[json!("odd")]).is_err());
    }

    #[test]
    fn arithmetic() {
        assert_eq!(call("add", &[json!(2), json!(3)]).unwrap(), json!(5.0));
        assert_eq!(call("sub", &[json!(2), json!(3)]).unwrap(), json!(-1.0));
        assert_eq!(call("mul", &[json!(2), json!(3)]).unwrap(), json!(6.0));
        assert_eq!(call("div", &[json!(7), json!(2)]).unwrap(), json!(3.5));
        assert!(call("div", &[json!(1), json!(0)]).is_err());
        assert!(call("add", &[json!("x"), json!(1)]).is_err());
    }

    #[test]
    fn string_funcs() {
        assert_eq!(
            call("cat", &[json!("a"), json!(1), json!("b")]).unwrap(),
            json!("a1b")
        );
        assert_eq!(call("upper", &[json!("aBc")]).unwrap(), json!("ABC"));
        assert_eq!(call("lower", &[json!("aBc")]).unwrap(), json!("abc"));
        assert_eq!(call("trim", &[json!("  x ")]).unwrap(), json!("x"));
    }

    #[test]
    fn len_counts_by_shape() {
        assert_eq!(call("len", &[json!("héllo")]).unwrap(), json!(5));
        assert_eq!(call("len", &[json!([1, 2, 3])]).unwrap(), json!(3));
        assert_eq!(call("len", &[json!({"a": 1})]).unwrap(), json!(1));
        assert!(call("len", &[json!(7)]).is_err());
    }

    #[test]
    fn split_and_join() {
        assert_eq!(
            call("split", &[json!(","), json!("a,b,c")]).unwrap(),
            json!(["a", "b", "c"])
        );
        assert_eq!(
            call("split", &[json!(""), json!("ab")]).unwrap(),
            json!(["a", "b"])
        );
        assert_eq!(
            call("join", &[json!("-"), json!(["a", "b"])]).unwrap(),
            json!("a-b")
        );
        assert!(call("join", &[json!("-"), json!([1])]).is_err());
    }

    #[test]
    fn default_picks_first_non_null() {
        assert_eq!(call("default", &[json!(null), json!("d")]).unwrap(), json!("d"));
        assert_eq!(call("default", &[json!(0), json!("d")]).unwrap(), json!(0));
    }

    #[test]
    fn json_round_trip_funcs() {
        assert_eq!(
            call("tojson", &[json!({"a": [1]})]).unwrap(),
            json!(r#"{"a":[1]}"#)
        );
        assert_eq!(
            call("fromjson", &[json!(r#"{"a":[1]}"#)]).unwrap(),
            json!({"a": [1]})
        );
        assert!(call("fromjson", &[json!("not json")]).is_err());
    }

    #[test]
    fn urlenc_escapes_reserved_chars() {
        assert_eq!(
            call("urlenc", &[json!("a b/c?d=e&f~g")]).unwrap(),
            json!("a%20b%2Fc%3Fd%3De%26f~g")
        );
    }

    #[test]
    fn derived_table_shadows_parent() {
        let base = FuncTable::builtins();
        let shadow: Func = Arc::new(|_| Ok(json!("shadowed")));
        let child = FuncTable::derive(Some(&base), HashMap::from([("id".to_string(), shadow)]));

        let shadowed = child.get("id").unwrap();
        assert_eq!((*shadowed)(&[]).unwrap(), json!("shadowed"));
        // Parent remains reachable for everything else.
        assert!(child.get("cat").is_some());
        assert!(child.get("missing").is_none());
    }
}
