//! Application configuration management

pub mod profiles;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub use profiles::{
    ConfigDocument, ConfigEntry, ConfigError, ConfigIssue, ConfigSnapshot, ConfigStore, NamingConfig,
};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Profile document (YAML, or JSON by extension)
    pub profiles_path: PathBuf,

    /// Profile used when a request names none; overrides the document's default
    pub default_profile: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),

            port: lookup("PORT")
                .unwrap_or_else(|| "3001".to_string())
                .parse()
                .context("Invalid PORT")?,

            profiles_path: lookup("PROFILES_PATH")
                .unwrap_or_else(|| "./data/profiles.yaml".to_string())
                .into(),

            default_profile: lookup("DEFAULT_PROFILE").filter(|p| !p.is_empty()),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.profiles_path, PathBuf::from("./data/profiles.yaml"));
        assert_eq!(config.default_profile, None);
        assert_eq!(config.bind_address(), "0.0.0.0:3001");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("PROFILES_PATH", "/etc/curator/profiles.json"),
            ("DEFAULT_PROFILE", "HD"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.default_profile.as_deref(), Some("HD"));
    }

    #[test]
    fn test_invalid_port() {
        let err = Config::from_lookup(lookup(&[("PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("Invalid PORT"));
    }
}
