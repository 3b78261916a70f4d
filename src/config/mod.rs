// Configuration module
//
// YAML file with ${VAR} environment substitution. Built once at startup and
// shared immutably; per-call option changes are merged copies of `defaults`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ThumbError;
use crate::options::ThumbOptions;
use crate::placeholder::PlaceholderConfig;
use crate::raster::SourceLimits;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Option document every derivation starts from
    #[serde(default)]
    pub defaults: ThumbOptions,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub placeholder: PlaceholderConfig,
    #[serde(default)]
    pub limits: SourceLimits,
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_url_prefix() -> String {
    "/thumbnails".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// URL path thumbnails are served under
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            url_prefix: default_url_prefix(),
        }
    }
}

impl ServerConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

fn default_remote_path() -> PathBuf {
    PathBuf::from("./remote")
}

fn default_ttl_seconds() -> u64 {
    86400
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_redirects() -> usize {
    5
}

fn default_true() -> bool {
    true
}

/// Remote source mirroring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Mirror root
    #[serde(default = "default_remote_path")]
    pub path: PathBuf,
    /// Mirror lifetime in seconds
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_remote_path(),
            ttl_seconds: default_ttl_seconds(),
            timeout_seconds: default_timeout_seconds(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl RemoteConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, ThumbError> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| ThumbError::configuration(e.to_string()))?;

        // Every referenced variable must be set
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                ThumbError::configuration(format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                ))
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        serde_yaml::from_str(&substituted)
            .map_err(|e| ThumbError::configuration(format!("Invalid config: {}", e)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ThumbError> {
        let yaml = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ThumbError::configuration(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), ThumbError> {
        if self.server.port == 0 {
            return Err(ThumbError::configuration("server.port must not be 0"));
        }

        if !self.server.url_prefix.starts_with('/') {
            return Err(ThumbError::configuration(format!(
                "server.url_prefix '{}' does not start with /",
                self.server.url_prefix
            )));
        }

        self.defaults.validate()?;

        let roots = [
            ("defaults.path_images", &self.defaults.path_images),
            ("defaults.path_thumbs", &self.defaults.path_thumbs),
            ("defaults.path_watermarks", &self.defaults.path_watermarks),
            ("defaults.path_fonts", &self.defaults.path_fonts),
            ("remote.path", &self.remote.path),
        ];
        for (name, path) in roots {
            if path.as_os_str().is_empty() {
                return Err(ThumbError::configuration(format!("{} cannot be empty", name)));
            }
        }

        if self.remote.ttl_seconds == 0 {
            return Err(ThumbError::configuration(
                "remote.ttl_seconds must be greater than 0",
            ));
        }

        if self.remote.timeout_seconds == 0 {
            return Err(ThumbError::configuration(
                "remote.timeout_seconds must be greater than 0",
            ));
        }

        if self.placeholder.base_url.is_empty() {
            return Err(ThumbError::configuration("placeholder.base_url cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_yaml_with_env("{}").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.url_prefix, "/thumbnails");
        assert_eq!(config.remote.ttl_seconds, 86400);
        assert_eq!(config.limits.max_source_pixels, 100_000_000);
        assert_eq!(config.defaults, ThumbOptions::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_remote_mirror_is_outside_thumbs_root() {
        let config = Config::default();
        assert_eq!(config.remote.path, PathBuf::from("./remote"));
        assert!(!config.remote.path.starts_with(&config.defaults.path_thumbs));
    }

    #[test]
    fn test_partial_defaults_document() {
        let yaml = r#"
defaults:
  path_images: /srv/images
  resize:
    width: 300
    method: crop
"#;
        let config = Config::from_yaml_with_env(yaml).unwrap();
        assert_eq!(config.defaults.path_images, PathBuf::from("/srv/images"));
        assert_eq!(config.defaults.resize.width, Some(300));
        assert_eq!(config.defaults.resize.height, Some(500));
        assert_eq!(config.defaults.quality, 80);
    }

    #[test]
    fn test_unknown_alignment_fails_to_load() {
        let yaml = "defaults:\n  resize:\n    align_x: diagonal\n";
        assert!(matches!(
            Config::from_yaml_with_env(yaml),
            Err(ThumbError::Configuration(_))
        ));
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("THUMBSMITH_TEST_CONFIG_PORT", "9191");
        let config =
            Config::from_yaml_with_env("server:\n  port: ${THUMBSMITH_TEST_CONFIG_PORT}\n").unwrap();
        assert_eq!(config.server.port, 9191);
    }

    #[test]
    fn test_env_substitution_missing_variable() {
        let err = Config::from_yaml_with_env("server:\n  address: ${THUMBSMITH_TEST_UNSET_VAR}\n")
            .unwrap_err();
        assert!(err.to_string().contains("THUMBSMITH_TEST_UNSET_VAR"));
    }

    #[test]
    fn test_validate_rejects_bad_prefix() {
        let mut config = Config::default();
        config.server.url_prefix = "thumbnails".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ttl_and_timeout() {
        let mut config = Config::default();
        config.remote.ttl_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.remote.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_root() {
        let mut config = Config::default();
        config.defaults.path_thumbs = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_listen_address() {
        assert_eq!(ServerConfig::default().listen_address(), "0.0.0.0:8080");
    }
}
