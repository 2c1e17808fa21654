//! Plategate configuration, layered from built-in defaults, an optional TOML
//! file and `PLATEGATE_*` environment variables

use crate::intake::IntakeLimits;
use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "plategate.toml";

/// Prefix of the environment variables that override the config file
pub const ENV_PREFIX: &str = "PLATEGATE";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub intake: IntakeSettings,
    pub detection: DetectionSettings,

    /// Log filter directives, used when `RUST_LOG` is unset
    pub log: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,

    /// Number of HTTP worker threads. 0 keeps actix's default of one per core
    pub workers: usize,

    /// Directory the static front end is served from
    pub static_root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntakeSettings {
    /// Longest accepted Base64 payload, in bytes of text
    pub max_payload_bytes: usize,

    /// Largest accepted `width * height` of a decoded image
    pub max_pixels: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    pub timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerSettings::default(),
            intake: IntakeSettings::default(),
            detection: DetectionSettings::default(),
            log: "info".into(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: "0.0.0.0".into(),
            port: 5000,
            workers: 0,
            static_root: PathBuf::from("static"),
        }
    }
}

impl Default for IntakeSettings {
    fn default() -> Self {
        IntakeSettings {
            max_payload_bytes: 16 * 1024 * 1024,
            max_pixels: 40_000_000,
        }
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        DetectionSettings { timeout_ms: 5000 }
    }
}

impl Settings {
    /// Load settings from `path` (or `plategate.toml` if it exists) and the
    /// environment. An explicitly given file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Parse settings from TOML text alone, without consulting the
    /// environment
    pub fn from_toml(toml: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }

    pub fn intake_limits(&self) -> IntakeLimits {
        IntakeLimits {
            max_payload_bytes: self.intake.max_payload_bytes,
            max_pixels: self.intake.max_pixels,
        }
    }

    pub fn detection_timeout(&self) -> Duration {
        Duration::from_millis(self.detection.timeout_ms)
    }

    /// Body limit for the JSON extractor. Slightly above the payload limit so
    /// oversized images are reported by intake rather than by the extractor
    pub fn json_body_limit(&self) -> usize {
        self.intake.max_payload_bytes.saturating_add(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.static_root, PathBuf::from("static"));
        assert_eq!(settings.detection_timeout(), Duration::from_secs(5));
        assert_eq!(settings.intake.max_payload_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn test_partial_override() {
        let settings = Settings::from_toml(
            r#"
            log = "debug"

            [server]
            port = 8080
            static_root = "/srv/www"

            [detection]
            timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(settings.log, "debug");
        assert_eq!(settings.bind_addr(), ("0.0.0.0".to_string(), 8080));
        assert_eq!(settings.server.static_root, PathBuf::from("/srv/www"));
        assert_eq!(settings.detection_timeout(), Duration::from_millis(250));
        // untouched sections keep their defaults
        assert_eq!(settings.intake.max_pixels, 40_000_000);
    }

    #[test]
    fn test_json_body_limit_exceeds_payload_limit() {
        let settings = Settings::from_toml("[intake]\nmax_payload_bytes = 10").unwrap();
        assert_eq!(settings.intake_limits().max_payload_bytes, 10);
        assert!(settings.json_body_limit() > 10);
    }

    #[test]
    fn test_missing_explicit_file() {
        assert!(Settings::load(Some(Path::new("/nonexistent/plategate.toml"))).is_err());
    }
}
