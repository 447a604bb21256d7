//! Configuration loader with environment variable expansion

use super::{Config, ConfigError};
use lazy_static::lazy_static;
use regex_lite::Regex;
use std::path::Path;

lazy_static! {
    // ${VAR} or ${VAR:-default}
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").unwrap();
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Expand `${VAR}` and `${VAR:-default}`
    ///
    /// An unset variable without a default keeps its placeholder.
    fn expand_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |cap: &regex_lite::Captures<'_>| {
                match std::env::var(&cap[1]) {
                    Ok(value) => value,
                    Err(_) => match cap.get(2) {
                        Some(default) => default.as_str().to_string(),
                        None => cap[0].to_string(),
                    },
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TSUKUMO_TEST_VAR", "test_value");
        let expanded = ConfigLoader::expand_env_vars("key: ${TSUKUMO_TEST_VAR}");
        assert_eq!(expanded, "key: test_value");
        std::env::remove_var("TSUKUMO_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_default_and_missing() {
        let expanded = ConfigLoader::expand_env_vars(
            "a: ${TSUKUMO_UNSET_A:-fallback}\nb: ${TSUKUMO_UNSET_B}\nc: ${TSUKUMO_UNSET_C:-}",
        );
        assert_eq!(expanded, "a: fallback\nb: ${TSUKUMO_UNSET_B}\nc: ");
    }
}
