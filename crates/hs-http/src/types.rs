// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wire-adjacent types and their record forms.

use crate::HttpError;
use hs_record::{Object, Record, coerce_string};
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};
use url::Url;

/// A fully-materialized request: everything needed to send it, plus the
/// body kept as a string so retries can replay it.
#[derive(Debug, Clone)]
pub struct BuiltRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL (scheme/host defaults and aliasing applied).
    pub url: Url,
    /// Header set as built; repetitions preserved.
    pub headers: HeaderMap,
    /// Body content, if any.
    pub body: Option<String>,
}

impl BuiltRequest {
    /// The request record: `method`, `url`, optional `headers` and `body`.
    pub fn to_record(&self) -> Record {
        let mut obj = Object::new();
        obj.insert("method".into(), json!(self.method.as_str()));
        obj.insert("url".into(), json!(self.url.as_str()));
        if let Some(headers) = headers_to_record(&self.headers) {
            obj.insert("headers".into(), headers);
        }
        if let Some(body) = self.body.as_deref().filter(|b| !b.is_empty()) {
            obj.insert("body".into(), json!(body));
        }
        Value::Object(obj)
    }
}

/// The outcome of one request attempt.
#[derive(Debug, Clone)]
pub enum Attempt {
    /// Transport failure (connection refused, TLS error, …). The HTTP
    /// status is a value, not an error; this is for failures below that.
    Error(String),
    /// A response was received and its body fully read.
    Response {
        /// Status code.
        status: u16,
        /// Response headers.
        headers: HeaderMap,
        /// Decoded body.
        body: String,
    },
}

impl Attempt {
    /// Whether this attempt failed at the transport level.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Attempt::Error(_))
    }

    /// The status code, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Attempt::Error(_) => None,
            Attempt::Response { status, .. } => Some(*status),
        }
    }

    /// The response record: `{error}` or `{status, headers?, body?}`.
    pub fn to_record(&self) -> Record {
        match self {
            Attempt::Error(msg) => json!({"error": msg}),
            Attempt::Response {
                status,
                headers,
                body,
            } => {
                let mut obj = Object::new();
                obj.insert("status".into(), json!(status));
                if let Some(headers) = headers_to_record(headers) {
                    obj.insert("headers".into(), headers);
                }
                if !body.is_empty() {
                    obj.insert("body".into(), json!(body));
                }
                Value::Object(obj)
            }
        }
    }
}

/// Headers as a record: field name mapped to an array of values. `None`
/// when empty.
pub fn headers_to_record(headers: &HeaderMap) -> Option<Record> {
    if headers.is_empty() {
        return None;
    }
    let mut obj = Object::new();
    for name in headers.keys() {
        let vals: Vec<Value> = headers
            .get_all(name)
            .iter()
            .map(|v| json!(String::from_utf8_lossy(v.as_bytes())))
            .collect();
        obj.insert(name.as_str().to_string(), Value::Array(vals));
    }
    Some(Value::Object(obj))
}

/// The full output record for one processed request: the request as built
/// (without transport-level header injection), the final response, and the
/// prior attempts under `response.retries` when any retries happened.
pub fn response_record(req: &BuiltRequest, last: &Attempt, retries: &[Attempt]) -> Record {
    let mut obj = match req.to_record() {
        Value::Object(obj) => obj,
        _ => Object::new(),
    };

    let mut resp = match last.to_record() {
        Value::Object(resp) => resp,
        _ => Object::new(),
    };
    if !retries.is_empty() {
        resp.insert(
            "retries".into(),
            Value::Array(retries.iter().map(Attempt::to_record).collect()),
        );
    }

    obj.insert("response".into(), Value::Object(resp));
    Value::Object(obj)
}

/// Reconstructs a request from a prebuilt request record (`hs run` input).
/// Header values may be a string or an array of strings.
pub fn extract_request(rec: &Record) -> Result<BuiltRequest, HttpError> {
    let obj = rec.as_object();

    let Some(method) = obj.and_then(|o| o.get("method")).and_then(Value::as_str) else {
        return Err(HttpError::MissingMethod(coerce_string(rec)));
    };
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| HttpError::BadMethod(method.to_string()))?;

    let Some(url_str) = obj.and_then(|o| o.get("url")).and_then(Value::as_str) else {
        return Err(HttpError::MissingUrl(coerce_string(rec)));
    };
    let url = Url::parse(url_str).map_err(|source| HttpError::BadUrl {
        url: url_str.to_string(),
        source,
    })?;

    let mut headers = HeaderMap::new();
    if let Some(Value::Object(hdrs)) = obj.and_then(|o| o.get("headers")) {
        for (name, vals) in hdrs {
            let field = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HttpError::BadHeaderField(name.clone()))?;
            let string_vals: Vec<&str> = match vals {
                Value::String(s) => vec![s.as_str()],
                Value::Array(arr) => arr
                    .iter()
                    .map(|v| {
                        v.as_str().ok_or_else(|| HttpError::BadHeaderValue {
                            name: name.clone(),
                            value: coerce_string(v),
                        })
                    })
                    .collect::<Result<_, _>>()?,
                other => {
                    return Err(HttpError::BadHeaderValue {
                        name: name.clone(),
                        value: coerce_string(other),
                    });
                }
            };
            for val in string_vals {
                let val = HeaderValue::from_str(val).map_err(|_| HttpError::BadHeaderValue {
                    name: name.clone(),
                    value: val.to_string(),
                })?;
                headers.append(field.clone(), val);
            }
        }
    }

    let body = obj
        .and_then(|o| o.get("body"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(BuiltRequest {
        method,
        url,
        headers,
        body,
    })
}
