// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading.
//!
//! Config is a flat mapping from uppercase name to value, merged from `.hs`
//! YAML files on the search path (home directory, then working directory;
//! later files override) and `HS_`-prefixed environment variables on top.
//! Every entry becomes an identifier bound in the global scope.

use crate::RuntimeError;
use hs_expr::{Bindings, Scope, Scoped};
use hs_record::Record;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable prefix recognized as config.
pub const ENV_PREFIX: &str = "HS_";

/// Config file name looked up on the search path.
pub const CONFIG_FILENAME: &str = ".hs";

fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home);
    }
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd);
    }
    paths
}

/// Loads all configuration into a child scope/bindings derived from the
/// given ones (or fresh roots when `None`).
pub fn load(parent: Option<&Scoped>) -> Result<Scoped, RuntimeError> {
    let mut raw = HashMap::new();
    for dir in search_paths() {
        merge_yaml_file(&dir.join(CONFIG_FILENAME), &mut raw)?;
    }
    merge_env(std::env::vars(), &mut raw);
    Ok(bind_values(parent, raw))
}

/// Merges one YAML config file into `into`, overriding existing keys.
/// A missing file is not an error.
pub fn merge_yaml_file(
    path: &Path,
    into: &mut HashMap<String, Record>,
) -> Result<(), RuntimeError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(RuntimeError::Io {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    debug!(target: "hs.config", path = %path.display(), "loading config file");
    let vals: HashMap<String, Record> =
        serde_yaml::from_str(&content).map_err(|e| RuntimeError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })?;
    into.extend(vals);
    Ok(())
}

/// Merges `HS_`-prefixed environment variables into `into` as strings,
/// overriding file values.
pub fn merge_env(
    vars: impl Iterator<Item = (String, String)>,
    into: &mut HashMap<String, Record>,
) {
    for (key, value) in vars {
        if let Some(name) = key.strip_prefix(ENV_PREFIX) {
            into.insert(name.to_string(), Value::String(value));
        }
    }
}

/// Uppercases all names, mints identifiers for them in a child scope, and
/// binds the values.
pub fn bind_values(parent: Option<&Scoped>, raw: HashMap<String, Record>) -> Scoped {
    let entries: Vec<(String, Record)> = raw
        .into_iter()
        .map(|(name, val)| (name.to_uppercase(), val))
        .collect();

    let (scope, ids) = Scope::derive(
        parent.map(|p| &p.scope),
        entries.iter().map(|(name, _)| name.as_str()),
    );
    let binds = Bindings::derive(
        parent.map(|p| &p.binds),
        ids.into_iter()
            .zip(entries.into_iter().map(|(_, val)| val))
            .collect(),
    );
    Scoped { scope, binds }
}

// ---------------------------------------------------------------------------
// Config file creation (`hs init`)
// ---------------------------------------------------------------------------

/// The template written by `hs init`.
pub fn default_config() -> &'static str {
    "\
# hs configuration. Merged from ~/.hs and ./.hs; HS_* environment variables
# override file values. Every top-level key is bound as a variable, usable
# in URL/body/header templates.
#
#HOST: api.example.com
#HOST_ALIASES:
#  prod: api.example.com
#  staging: staging.example.com
#COOKIE_HOST_ALIASES: {}
#COOKIES: []
"
}

/// Creates the base config file in the home directory, refusing to clobber
/// an existing one. Returns the written path and content.
pub fn create_config_file() -> Result<(PathBuf, &'static str), RuntimeError> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let path = home.join(CONFIG_FILENAME);
    if path.exists() {
        return Err(RuntimeError::ConfigExists(path));
    }
    std::fs::write(&path, default_config()).map_err(|e| RuntimeError::Io {
        path: path.clone(),
        source: e,
    })?;
    Ok((path, default_config()))
}

/// Returns a warning when no base config file exists in the home directory.
pub fn missing_base_config_warning() -> Option<String> {
    let home = dirs::home_dir()?;
    let path = home.join(CONFIG_FILENAME);
    if path.exists() {
        None
    } else {
        Some(format!(
            "no configuration file at {}; run 'hs init' to create one",
            path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn env_merge_filters_and_strips_prefix() {
        let mut raw = HashMap::new();
        merge_env(
            vec![
                ("HS_HOST".to_string(), "example.com".to_string()),
                ("PATH".to_string(), "/usr/bin".to_string()),
                ("HS_TOKEN".to_string(), "t".to_string()),
            ]
            .into_iter(),
            &mut raw,
        );
        assert_eq!(raw.len(), 2);
        assert_eq!(raw["HOST"], json!("example.com"));
        assert_eq!(raw["TOKEN"], json!("t"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut raw = HashMap::from([("HOST".to_string(), json!("from-file"))]);
        merge_env(
            vec![("HS_HOST".to_string(), "from-env".to_string())].into_iter(),
            &mut raw,
        );
        assert_eq!(raw["HOST"], json!("from-env"));
    }

    #[test]
    fn yaml_values_round_trip_into_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            "HOST: api.example.com\nHOST_ALIASES:\n  prod: example.com\nRETRIES: 3\n",
        )
        .unwrap();

        let mut raw = HashMap::new();
        merge_yaml_file(&path, &mut raw).unwrap();
        assert_eq!(raw["HOST"], json!("api.example.com"));
        assert_eq!(raw["HOST_ALIASES"], json!({"prod": "example.com"}));
        assert_eq!(raw["RETRIES"], json!(3));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let mut raw = HashMap::new();
        merge_yaml_file(Path::new("/nonexistent/.hs"), &mut raw).unwrap();
        assert!(raw.is_empty());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, ":\n  - not a mapping").unwrap();

        let mut raw = HashMap::new();
        assert!(merge_yaml_file(&path, &mut raw).is_err());
    }

    #[test]
    fn bind_values_uppercases_names() {
        let scoped = bind_values(
            None,
            HashMap::from([("host".to_string(), json!("example.com"))]),
        );
        assert_eq!(scoped.lookup("HOST"), Some(&json!("example.com")));
        assert_eq!(scoped.lookup("host"), None);
    }

    #[test]
    fn bind_values_extends_parent() {
        let base = bind_values(None, HashMap::from([("A".to_string(), json!(1))]));
        let child = bind_values(
            Some(&base),
            HashMap::from([("B".to_string(), json!(2))]),
        );
        assert_eq!(child.lookup("A"), Some(&json!(1)));
        assert_eq!(child.lookup("B"), Some(&json!(2)));
        assert_eq!(base.lookup("B"), None);
    }

    #[test]
    fn default_config_is_valid_yaml() {
        // All-comments template parses to an empty document.
        let parsed: serde_yaml::Value = serde_yaml::from_str(default_config()).unwrap();
        assert!(parsed.is_null());
        assert!(default_config().contains("#HOST:"));
    }
}
