//! Environment snapshot with `.env` file support

use super::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Immutable view of environment variables
///
/// Built once at start-up from the process environment, optionally overlaid
/// with a `.env` file. Variables already present in the process environment
/// take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct EnvMap {
    vars: HashMap<String, String>,
}

impl EnvMap {
    /// Snapshot the current process environment
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a map from explicit pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Fill in variables from a `.env` file
    ///
    /// A missing file is not an error. Keys already present are kept.
    pub fn with_dotenv_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No .env file found");
                return Ok(self);
            }
            Err(e) => return Err(e.into()),
        };

        let mut loaded = 0usize;
        for (key, value) in parse_dotenv(&content) {
            if !self.vars.contains_key(&key) {
                self.vars.insert(key, value);
                loaded += 1;
            }
        }
        tracing::debug!(path = %path.display(), loaded, "Loaded .env file");
        Ok(self)
    }

    /// Look up a variable; blank values count as unset
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Parse `KEY=VALUE` lines, skipping comments and blank lines
fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.find(quote).map(|end| &rest[..end]))
        {
            return inner;
        }
    }
    // Unquoted values may carry a trailing comment
    match value.find(" #") {
        Some(idx) => value[..idx].trim_end(),
        None => value,
    }
}
