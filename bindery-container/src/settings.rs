//! Container settings.
//!
//! The only setting is the root namespace that name-based registration
//! searches under. It is read from a JSON file ([`SETTINGS_FILE_NAME`])
//! and may be overridden by the [`ROOT_NAMESPACE_ENV`] environment
//! variable. Missing or malformed sources fall back to the default.
//!
//! ```json
//! { "root_namespace": "my_app::services" }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::discovery::is_module_path;
use crate::error::{DiscoveryError, Result};

/// File name searched for in the working directory by [`Settings::load`].
pub const SETTINGS_FILE_NAME: &str = "bindery.json";

/// Environment variable that overrides the configured root namespace.
pub const ROOT_NAMESPACE_ENV: &str = "BINDERY_ROOT_NAMESPACE";

/// Root namespace used when nothing is configured. Matches every module.
pub const DEFAULT_ROOT_NAMESPACE: &str = "";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Module path prefix searched by name-based registration.
    pub root_namespace: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root_namespace: DEFAULT_ROOT_NAMESPACE.to_string(),
        }
    }
}

impl Settings {
    /// Parses settings from JSON text.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Reads settings from `path`, falling back to the defaults if the
    /// file is missing, unreadable or malformed.
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Self::default();
        }

        match Self::load_required(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring settings file");
                Self::default()
            }
        }
    }

    /// Reads settings from `path`.
    ///
    /// # Errors
    /// [`DiscoveryError`] if the file cannot be read, is not valid JSON, or
    /// names an invalid root namespace.
    pub fn load_required(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DiscoveryError::new(DEFAULT_ROOT_NAMESPACE, format!("cannot read {}", path.display()))
                .with_source(e)
        })?;
        let settings = Self::from_json(&text).map_err(|e| {
            DiscoveryError::new(DEFAULT_ROOT_NAMESPACE, format!("malformed {}", path.display()))
                .with_source(e)
        })?;

        if !is_module_path(&settings.root_namespace) {
            return Err(DiscoveryError::new(
                settings.root_namespace,
                format!("root_namespace in {} is not a module path", path.display()),
            )
            .into());
        }
        Ok(settings)
    }

    /// Applies an environment override value. Empty or invalid values
    /// are ignored.
    pub fn with_override(mut self, value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("") | None => {}
            Some(root) if is_module_path(root) => {
                debug!(root, "Root namespace overridden by environment");
                self.root_namespace = root.to_string();
            }
            Some(root) => {
                warn!(root, variable = ROOT_NAMESPACE_ENV, "Ignoring invalid root namespace");
            }
        }
        self
    }

    /// Defaults with the [`ROOT_NAMESPACE_ENV`] override applied.
    pub fn from_env() -> Self {
        let value = std::env::var(ROOT_NAMESPACE_ENV).ok();
        Self::default().with_override(value.as_deref())
    }

    /// Reads [`SETTINGS_FILE_NAME`] from the working directory, then
    /// applies the [`ROOT_NAMESPACE_ENV`] override.
    pub fn load() -> Self {
        let value = std::env::var(ROOT_NAMESPACE_ENV).ok();
        Self::from_file(SETTINGS_FILE_NAME).with_override(value.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BinderyError, ErrorKind};

    #[test]
    fn default_matches_everything() {
        assert_eq!(Settings::default().root_namespace, "");
    }

    #[test]
    fn parses_json() {
        let settings = Settings::from_json(r#"{ "root_namespace": "shop::services" }"#).unwrap();
        assert_eq!(settings.root_namespace, "shop::services");

        let empty = Settings::from_json("{}").unwrap();
        assert_eq!(empty, Settings::default());
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_file(dir.path().join(SETTINGS_FILE_NAME));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "root_namespace = shop").unwrap();

        assert_eq!(Settings::from_file(&path), Settings::default());
        match Settings::load_required(&path) {
            Err(BinderyError::Discovery(e)) => assert!(e.reason.contains("malformed")),
            other => panic!("Expected Discovery error, got: {other:?}"),
        }
    }

    #[test]
    fn reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, r#"{"root_namespace":"shop"}"#).unwrap();

        assert_eq!(Settings::from_file(&path).root_namespace, "shop");
    }

    #[test]
    fn required_rejects_invalid_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, r#"{"root_namespace":"shop/services"}"#).unwrap();

        let err = Settings::load_required(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Discovery);
        assert_eq!(Settings::from_file(&path), Settings::default());
    }

    #[test]
    fn required_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_required(dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Discovery);
    }

    #[test]
    fn override_replaces_valid_values_only() {
        let base = Settings {
            root_namespace: "shop".to_string(),
        };

        assert_eq!(base.clone().with_override(None).root_namespace, "shop");
        assert_eq!(base.clone().with_override(Some("  ")).root_namespace, "shop");
        assert_eq!(base.clone().with_override(Some("billing")).root_namespace, "billing");
        assert_eq!(base.with_override(Some("not a path")).root_namespace, "shop");
    }
}
