// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cookie specs and the request cookie jar.
//!
//! Cookie sources, in load order: `-b` command-line specs, `.hscookie`
//! search-path files, and the `COOKIES` config entry. A spec is either
//! `name=value` (a bare cookie with no scope, attached to every request) or
//! the name of a Netscape-format cookie file. The assembled jar can also be
//! adapted by `COOKIE_HOST_ALIASES`: lookups additionally consult the
//! aliased host, optionally overriding the scheme.

use crate::RuntimeError;
use hs_expr::Scoped;
use hs_record::as_strings_array;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use url::Url;

/// Cookie file name looked up on the search path.
pub const COOKIE_FILENAME: &str = ".hscookie";

const COOKIES_CONFIG_VAR: &str = "COOKIES";
const COOKIE_ALIASES_CONFIG_VAR: &str = "COOKIE_HOST_ALIASES";

// ---------------------------------------------------------------------------
// Specs and Netscape files
// ---------------------------------------------------------------------------

/// One parsed cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieEntry {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain scope; empty means the cookie applies to every request.
    pub domain: String,
    /// Path scope.
    pub path: String,
    /// Whether the cookie is HTTPS-only.
    pub secure: bool,
    /// Expiry as a Unix timestamp; 0 means a session cookie.
    pub expires: i64,
}

impl CookieEntry {
    fn bare(name: &str, value: &str) -> Self {
        CookieEntry {
            name: name.to_string(),
            value: value.to_string(),
            domain: String::new(),
            path: String::new(),
            secure: false,
            expires: 0,
        }
    }

    fn is_expired(&self) -> bool {
        if self.expires == 0 {
            return false;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.expires < now
    }
}

/// Resolves one cookie spec: `name=value` yields a bare cookie, anything
/// else is read as a Netscape-format cookie file.
pub fn parse_spec(spec: &str) -> Result<Vec<CookieEntry>, RuntimeError> {
    if let Some((name, value)) = spec.split_once('=') {
        return Ok(vec![CookieEntry::bare(name, value)]);
    }
    parse_netscape_file(Path::new(spec))
}

/// Reads and parses a Netscape cookie file.
pub fn parse_netscape_file(path: &Path) -> Result<Vec<CookieEntry>, RuntimeError> {
    let content = std::fs::read_to_string(path).map_err(|e| RuntimeError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_netscape(&content, path)
}

/// Parses Netscape cookie-file content: seven tab-separated fields per
/// line, `#` comments (except the `#HttpOnly_` prefix), blank lines skipped.
pub fn parse_netscape(content: &str, path: &Path) -> Result<Vec<CookieEntry>, RuntimeError> {
    let mut cookies = Vec::new();
    for (i, raw_line) in content.lines().enumerate() {
        let line = raw_line.strip_prefix("#HttpOnly_").unwrap_or(raw_line);
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        let [domain, _subdomains, cookie_path, secure, expires, name, value] = fields[..] else {
            return Err(RuntimeError::MalformedCookieFile {
                path: path.to_path_buf(),
                line: i + 1,
            });
        };

        let expires: i64 = expires
            .parse()
            .map_err(|_| RuntimeError::MalformedCookieFile {
                path: path.to_path_buf(),
                line: i + 1,
            })?;

        cookies.push(CookieEntry {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.trim_start_matches('.').to_string(),
            path: cookie_path.to_string(),
            secure: secure.eq_ignore_ascii_case("true"),
            expires,
        });
    }
    Ok(cookies)
}

// ---------------------------------------------------------------------------
// Jar
// ---------------------------------------------------------------------------

/// Replacement target for a cookie host alias: `host` or `scheme://host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTarget {
    /// Optional scheme override.
    pub scheme: Option<String>,
    /// Replacement host (may include a port).
    pub host: String,
}

impl AliasTarget {
    /// Parses `host` or `scheme://host`.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once("://") {
            Some((scheme, host)) => AliasTarget {
                scheme: Some(scheme.to_string()),
                host: host.to_string(),
            },
            None => AliasTarget {
                scheme: None,
                host: raw.to_string(),
            },
        }
    }
}

/// The hs cookie jar: domain/path-scoped cookies delegated to a
/// [`reqwest::cookie::Jar`], bare cookies attached to every request, and
/// host-alias adaptation for lookups.
#[derive(Default)]
pub struct AliasCookieJar {
    inner: Jar,
    always: Vec<(String, String)>,
    aliases: HashMap<String, AliasTarget>,
}

impl AliasCookieJar {
    /// Builds a jar from parsed cookies and an alias table.
    pub fn new(cookies: Vec<CookieEntry>, aliases: HashMap<String, AliasTarget>) -> Self {
        let mut jar = AliasCookieJar {
            aliases,
            ..Default::default()
        };
        for cookie in cookies {
            jar.add(cookie);
        }
        jar
    }

    fn add(&mut self, cookie: CookieEntry) {
        if cookie.is_expired() {
            debug!(target: "hs.cookie", name = %cookie.name, "skipping expired cookie");
            return;
        }
        if cookie.domain.is_empty() && cookie.path.is_empty() {
            self.always.push((cookie.name, cookie.value));
            return;
        }

        let scheme = if cookie.secure { "https" } else { "http" };
        let Ok(url) = Url::parse(&format!("{scheme}://{}/", cookie.domain)) else {
            debug!(target: "hs.cookie", domain = %cookie.domain, "skipping cookie with bad domain");
            return;
        };
        let mut spec = format!(
            "{}={}; Domain={}; Path={}",
            cookie.name,
            cookie.value,
            cookie.domain,
            if cookie.path.is_empty() { "/" } else { &cookie.path },
        );
        if cookie.secure {
            spec.push_str("; Secure");
        }
        self.inner.add_cookie_str(&spec, &url);
    }

    fn alias_url(&self, url: &Url) -> Option<Url> {
        let target = self.aliases.get(url.host_str()?)?;
        let mut aliased = url.clone();

        let (host, port) = match target.host.split_once(':') {
            Some((h, p)) => (h, p.parse::<u16>().ok()),
            None => (target.host.as_str(), None),
        };
        aliased.set_host(Some(host)).ok()?;
        aliased.set_port(port).ok()?;
        if let Some(scheme) = &target.scheme {
            aliased.set_scheme(scheme).ok()?;
        }
        Some(aliased)
    }
}

impl CookieStore for AliasCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.inner.set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let mut parts: Vec<String> = self
            .always
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();

        if let Some(matched) = self.inner.cookies(url)
            && let Ok(s) = matched.to_str()
        {
            parts.push(s.to_string());
        }
        if let Some(aliased) = self.alias_url(url)
            && let Some(matched) = self.inner.cookies(&aliased)
            && let Ok(s) = matched.to_str()
        {
            parts.push(s.to_string());
        }

        if parts.is_empty() {
            return None;
        }
        HeaderValue::from_str(&parts.join("; ")).ok()
    }
}

// ---------------------------------------------------------------------------
// Assembly from all sources
// ---------------------------------------------------------------------------

/// Loads every cookie source and assembles the jar:
/// command-line specs, `.hscookie` search-path files, and `COOKIES` config,
/// adapted by `COOKIE_HOST_ALIASES`.
pub fn load_jar(extra_specs: &[String], globals: &Scoped) -> Result<AliasCookieJar, RuntimeError> {
    let mut cookies = Vec::new();
    for spec in extra_specs {
        cookies.extend(parse_spec(spec)?);
    }
    for path in cookie_file_paths() {
        if path.exists() {
            cookies.extend(parse_netscape_file(&path)?);
        }
    }
    for spec in config_cookie_specs(globals)? {
        cookies.extend(parse_spec(&spec)?);
    }

    Ok(AliasCookieJar::new(cookies, config_aliases(globals)?))
}

fn cookie_file_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(COOKIE_FILENAME));
    }
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(COOKIE_FILENAME));
    }
    paths
}

fn config_cookie_specs(globals: &Scoped) -> Result<Vec<String>, RuntimeError> {
    match globals.lookup(COOKIES_CONFIG_VAR) {
        None => Ok(Vec::new()),
        Some(val) => as_strings_array(val, true).map_err(|_| RuntimeError::BadConfigValue {
            name: COOKIES_CONFIG_VAR,
            expected: "string or array of strings",
            actual: hs_record::type_name(val),
        }),
    }
}

/// Reads `COOKIE_HOST_ALIASES` from config.
pub fn config_aliases(globals: &Scoped) -> Result<HashMap<String, AliasTarget>, RuntimeError> {
    match globals.lookup(COOKIE_ALIASES_CONFIG_VAR) {
        None => Ok(HashMap::new()),
        Some(serde_json::Value::Object(map)) => {
            let mut aliases = HashMap::with_capacity(map.len());
            for (key, val) in map {
                let serde_json::Value::String(target) = val else {
                    return Err(RuntimeError::BadConfigValue {
                        name: COOKIE_ALIASES_CONFIG_VAR,
                        expected: "string values",
                        actual: hs_record::type_name(val),
                    });
                };
                aliases.insert(key.clone(), AliasTarget::parse(target));
            }
            Ok(aliases)
        }
        Some(other) => Err(RuntimeError::BadConfigValue {
            name: COOKIE_ALIASES_CONFIG_VAR,
            expected: "map",
            actual: hs_record::type_name(other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie_header(jar: &AliasCookieJar, url: &str) -> Option<String> {
        jar.cookies(&Url::parse(url).unwrap())
            .map(|hv| hv.to_str().unwrap().to_string())
    }

    #[test]
    fn bare_spec_parses_to_unscoped_cookie() {
        let cookies = parse_spec("session=abc123").unwrap();
        assert_eq!(cookies, vec![CookieEntry::bare("session", "abc123")]);
    }

    #[test]
    fn netscape_parsing_handles_comments_and_httponly() {
        let content = "\
# Netscape HTTP Cookie File
# https://curl.se/docs/http-cookies.html

example.com\tTRUE\t/\tFALSE\t0\tplain\tv1
#HttpOnly_.example.com\tTRUE\t/api\tTRUE\t0\thidden\tv2
";
        let cookies = parse_netscape(content, Path::new("test")).unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "plain");
        assert_eq!(cookies[1].name, "hidden");
        assert_eq!(cookies[1].domain, "example.com");
        assert!(cookies[1].secure);
        assert_eq!(cookies[1].path, "/api");
    }

    #[test]
    fn netscape_malformed_line_reports_position() {
        let err = parse_netscape("not\tenough\tfields", Path::new("bad")).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::MalformedCookieFile { line: 1, .. }
        ));
    }

    #[test]
    fn bare_cookies_attach_to_every_request() {
        let jar = AliasCookieJar::new(
            vec![CookieEntry::bare("tok", "42")],
            HashMap::new(),
        );
        assert_eq!(
            cookie_header(&jar, "https://anything.example/x").as_deref(),
            Some("tok=42")
        );
    }

    #[test]
    fn scoped_cookies_match_domain() {
        let cookies = parse_netscape(
            "example.com\tTRUE\t/\tFALSE\t0\tsess\tyes\n",
            Path::new("test"),
        )
        .unwrap();
        let jar = AliasCookieJar::new(cookies, HashMap::new());

        assert_eq!(
            cookie_header(&jar, "http://example.com/page").as_deref(),
            Some("sess=yes")
        );
        assert_eq!(cookie_header(&jar, "http://other.com/page"), None);
    }

    #[test]
    fn expired_cookies_are_dropped() {
        let cookies = parse_netscape(
            "example.com\tTRUE\t/\tFALSE\t1\told\tgone\n",
            Path::new("test"),
        )
        .unwrap();
        let jar = AliasCookieJar::new(cookies, HashMap::new());
        assert_eq!(cookie_header(&jar, "http://example.com/"), None);
    }

    #[test]
    fn alias_lookup_consults_aliased_host() {
        let cookies = parse_netscape(
            "real.example\tTRUE\t/\tFALSE\t0\tsess\tfrom-real\n",
            Path::new("test"),
        )
        .unwrap();
        let aliases = HashMap::from([(
            "alias.example".to_string(),
            AliasTarget::parse("real.example"),
        )]);
        let jar = AliasCookieJar::new(cookies, aliases);

        assert_eq!(
            cookie_header(&jar, "http://alias.example/").as_deref(),
            Some("sess=from-real")
        );
    }

    #[test]
    fn alias_scheme_override_reaches_secure_cookies() {
        let cookies = parse_netscape(
            "real.example\tTRUE\t/\tTRUE\t0\tsec\tonly-https\n",
            Path::new("test"),
        )
        .unwrap();
        let aliases = HashMap::from([(
            "alias.example".to_string(),
            AliasTarget::parse("https://real.example"),
        )]);
        let jar = AliasCookieJar::new(cookies, aliases);

        // Plain-http request to the alias still sees the secure cookie via
        // the https-overriding alias target.
        assert_eq!(
            cookie_header(&jar, "http://alias.example/").as_deref(),
            Some("sec=only-https")
        );
    }

    #[test]
    fn alias_target_parsing() {
        assert_eq!(
            AliasTarget::parse("example.com:8443"),
            AliasTarget {
                scheme: None,
                host: "example.com:8443".to_string()
            }
        );
        assert_eq!(
            AliasTarget::parse("https://example.com"),
            AliasTarget {
                scheme: Some("https".to_string()),
                host: "example.com".to_string()
            }
        );
    }
}
