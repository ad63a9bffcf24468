//! Configuration loader with environment variable expansion

use super::{Config, ConfigError, EnvMap};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P, env: &EnvMap) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, env)
    }

    /// Parse YAML configuration after expanding environment variables
    pub fn parse(content: &str, env: &EnvMap) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content, env);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Expand `${VAR_NAME}` and `${VAR_NAME:-default}`
    ///
    /// Unknown variables without a default keep their placeholder, which
    /// credential validation later reports as unset.
    fn expand_env_vars(content: &str, env: &EnvMap) -> String {
        let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") {
            Ok(re) => re,
            Err(_) => return content.to_string(),
        };

        re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
            match (env.get(&caps[1]), caps.get(2)) {
                (Some(value), _) => value.to_string(),
                (None, Some(default)) => default.as_str().to_string(),
                (None, None) => caps[0].to_string(),
            }
        })
        .into_owned()
    }
}
