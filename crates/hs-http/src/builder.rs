// SPDX-License-Identifier: MIT OR Apache-2.0
//! Template-driven request construction.

use crate::HttpError;
use crate::types::BuiltRequest;
use hs_expr::{Bindings, Expr, FuncTable, Scope, parse_template};
use hs_record::{Record, datafmt};
use hs_runtime::HostAliasFn;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::sync::{Arc, OnceLock};
use url::Url;

/// Precompiled URL/body/header templates plus the config-derived pieces
/// needed to finish a URL. One instance builds every request of a command
/// invocation; it is immutable apart from the one-shot content-type cache.
pub struct RequestTemplate {
    method: Method,
    url: Expr,
    body: Option<Expr>,
    headers: Vec<Expr>,

    default_host: String,
    host_alias: HostAliasFn,

    // Autodetected once, on the first non-empty body, and applied to all
    // subsequent bodies.
    auto_content_type: OnceLock<Option<&'static str>>,
}

impl RequestTemplate {
    /// Parses the templates against `scope`/`funcs`. An empty `body_src`
    /// means no body.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        method: &str,
        url_src: &str,
        body_src: &str,
        header_srcs: &[String],
        scope: &Arc<Scope>,
        funcs: &Arc<FuncTable>,
        default_host: String,
        host_alias: HostAliasFn,
    ) -> Result<Self, HttpError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| HttpError::BadMethod(method.to_string()))?;

        let url = parse_template(url_src, scope, funcs)?;
        let body = if body_src.is_empty() {
            None
        } else {
            Some(parse_template(body_src, scope, funcs)?)
        };
        let headers = header_srcs
            .iter()
            .map(|src| parse_template(src, scope, funcs))
            .collect::<Result<_, _>>()?;

        Ok(RequestTemplate {
            method,
            url,
            body,
            headers,
            default_host,
            host_alias,
            auto_content_type: OnceLock::new(),
        })
    }

    /// Builds one request from a record and its bindings.
    pub fn build(&self, rec: &Record, binds: &Bindings) -> Result<BuiltRequest, HttpError> {
        let url_str = self.url.eval_to_string(rec, binds)?;
        let url = self.finish_url(&url_str)?;

        let body = match &self.body {
            Some(expr) => Some(expr.eval_to_string(rec, binds)?),
            None => None,
        };

        let mut headers = HeaderMap::new();
        for expr in &self.headers {
            let line = expr.eval_to_string(rec, binds)?;
            let (field, value) = line
                .split_once(':')
                .ok_or_else(|| HttpError::HeaderMissingColon(line.clone()))?;
            let name = HeaderName::from_bytes(field.as_bytes())
                .map_err(|_| HttpError::BadHeaderField(line.clone()))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|_| HttpError::BadHeaderField(line.clone()))?;
            headers.append(name, value);
        }

        if let Some(body) = body.as_deref().filter(|b| !b.is_empty())
            && !headers.contains_key(CONTENT_TYPE)
        {
            let detected = *self
                .auto_content_type
                .get_or_init(|| datafmt::autodetect(body).content_type());
            if let Some(content_type) = detected {
                headers.append(CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
        }

        Ok(BuiltRequest {
            method: self.method.clone(),
            url,
            headers,
            body,
        })
    }

    /// Applies scheme/host defaults and `@alias` resolution to an evaluated
    /// URL string.
    fn finish_url(&self, raw: &str) -> Result<Url, HttpError> {
        let full;
        let rest = if let Some(rest) = raw.strip_prefix("//") {
            // Scheme-relative: authority is present, scheme defaults.
            full = format!("https://{rest}");
            rest
        } else if let Some(rest) = scheme_suffix(raw) {
            full = raw.to_string();
            rest
        } else {
            // No scheme and no authority: the whole input is a path and the
            // host comes from config.
            if self.default_host.is_empty() {
                return Err(HttpError::MissingHost);
            }
            let sep = if raw.starts_with('/') { "" } else { "/" };
            full = format!("https://{}{sep}{raw}", self.default_host);
            return parse_url(&full);
        };

        // Empty user-info (a leading '@') marks the host as an alias key.
        // Non-empty user-info disables aliasing.
        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        if !rest[..authority_end].starts_with('@') {
            return parse_url(&full);
        }

        let scheme_len = full.len() - rest.len();
        let stripped = format!(
            "{}{}{}",
            &full[..scheme_len],
            &rest[1..authority_end],
            &rest[authority_end..]
        );
        let mut url = parse_url(&stripped)?;

        let key = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(HttpError::MissingHost),
        };
        let Some(target) = (*self.host_alias)(&key) else {
            return Err(HttpError::UnknownHostAlias(key));
        };

        let (host, port) = match target.split_once(':') {
            Some((h, p)) => (h.to_string(), p.parse::<u16>().ok()),
            None => (target, None),
        };
        url.set_host(Some(&host)).map_err(|source| HttpError::BadUrl {
            url: stripped.clone(),
            source,
        })?;
        let _ = url.set_port(port);
        Ok(url)
    }
}

fn parse_url(raw: &str) -> Result<Url, HttpError> {
    Url::parse(raw).map_err(|source| HttpError::BadUrl {
        url: raw.to_string(),
        source,
    })
}

/// When `s` starts with `scheme://`, returns the part after the `://`.
fn scheme_suffix(s: &str) -> Option<&str> {
    let idx = s.find("://")?;
    if idx == 0 {
        return None;
    }
    let mut chars = s[..idx].chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-')) {
        return None;
    }
    Some(&s[idx + 3..])
}
