//! Link configuration — which hosting environment the process binds against.
//!
//! The process-wide linker reads its configuration from the environment:
//!
//! - `HOSTCAPS_DISABLE` — `1`/`true`/`yes` switches binding off entirely
//! - `HOSTCAPS_LIBRARY` — path of a runtime shared library (feature `dylib`)
//! - `HOSTCAPS_ENTRY_POINT` — entry point symbol (default `hostcaps_bootstrap`)
//!
//! Without a library the linker searches the process symbol table, where
//! runtimes linked into the binary register themselves.
//!
//! The same settings can be loaded from YAML:
//!
//! ```yaml
//! library: /opt/runtime/libdesktop_runtime.so
//! entry_point: hostcaps_bootstrap
//! ```

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::binding::host::{HostEnvironment, NoHost, ProcessHost, ENTRY_POINT_SYMBOL};

pub const ENV_DISABLE: &str = "HOSTCAPS_DISABLE";
pub const ENV_LIBRARY: &str = "HOSTCAPS_LIBRARY";
pub const ENV_ENTRY_POINT: &str = "HOSTCAPS_ENTRY_POINT";

/// Errors loading a link configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A field has an unusable value.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Where to look for the capability runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Skip binding; the layer reports itself unavailable.
    #[serde(default)]
    pub disabled: bool,

    /// Shared library exporting the entry point. When unset, the process
    /// symbol table is searched.
    #[serde(default)]
    pub library: Option<PathBuf>,

    /// Entry point symbol name.
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
}

fn default_entry_point() -> String {
    ENTRY_POINT_SYMBOL.to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            library: None,
            entry_point: default_entry_point(),
        }
    }
}

impl LinkConfig {
    /// Configuration from `HOSTCAPS_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let disabled = non_empty(ENV_DISABLE)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            disabled,
            library: non_empty(ENV_LIBRARY).map(PathBuf::from),
            entry_point: non_empty(ENV_ENTRY_POINT).unwrap_or_else(default_entry_point),
        }
    }

    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.entry_point.trim().is_empty() {
            return Err(ConfigError::Validation(
                "entry_point must not be empty".to_string(),
            ));
        }
        if self.entry_point.contains('\0') {
            return Err(ConfigError::Validation(
                "entry_point must not contain NUL bytes".to_string(),
            ));
        }
        Ok(())
    }

    /// The hosting environment this configuration selects.
    pub fn host(&self) -> Box<dyn HostEnvironment> {
        if self.disabled {
            return Box::new(NoHost);
        }
        match &self.library {
            Some(path) => library_host(path),
            None => Box::new(ProcessHost::global()),
        }
    }
}

#[cfg(feature = "dylib")]
fn library_host(path: &Path) -> Box<dyn HostEnvironment> {
    Box::new(crate::binding::dylib::DylibHost::new(path))
}

#[cfg(not(feature = "dylib"))]
fn library_host(path: &Path) -> Box<dyn HostEnvironment> {
    log::warn!(
        "{} is set to {} but hostcaps was built without the `dylib` feature",
        ENV_LIBRARY,
        path.display()
    );
    Box::new(WithoutDylibSupport(path.to_path_buf()))
}

/// A library was configured but this build cannot load libraries.
#[cfg(not(feature = "dylib"))]
#[derive(Debug)]
struct WithoutDylibSupport(PathBuf);

#[cfg(not(feature = "dylib"))]
impl HostEnvironment for WithoutDylibSupport {
    fn describe(&self) -> String {
        format!("shared library {} (loading unsupported)", self.0.display())
    }

    fn locate(
        &self,
        symbol: &str,
    ) -> Result<crate::binding::host::EntryPoint, crate::binding::error::LinkError> {
        Err(crate::binding::error::LinkError::incompatible(
            symbol,
            "built without the `dylib` feature",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LinkConfig::from_lookup(vars(&[]));
        assert_eq!(config, LinkConfig::default());
        assert_eq!(config.entry_point, ENTRY_POINT_SYMBOL);
        assert!(config.host().describe().starts_with("process symbol table"));
    }

    #[test]
    fn test_disable_flag() {
        for value in ["1", "true", "TRUE", " yes "] {
            let config = LinkConfig::from_lookup(vars(&[(ENV_DISABLE, value)]));
            assert!(config.disabled, "{:?} should disable", value);
            assert_eq!(config.host().describe(), "disabled");
        }
        for value in ["0", "false", ""] {
            let config = LinkConfig::from_lookup(vars(&[(ENV_DISABLE, value)]));
            assert!(!config.disabled, "{:?} should not disable", value);
        }
    }

    #[test]
    fn test_library_and_entry_point() {
        let config = LinkConfig::from_lookup(vars(&[
            (ENV_LIBRARY, "/opt/rt/libruntime.so"),
            (ENV_ENTRY_POINT, "custom_bootstrap"),
        ]));
        assert_eq!(config.library, Some(PathBuf::from("/opt/rt/libruntime.so")));
        assert_eq!(config.entry_point, "custom_bootstrap");
        assert!(config.host().describe().contains("/opt/rt/libruntime.so"));
    }

    #[cfg(not(feature = "dylib"))]
    #[test]
    fn test_library_without_feature_is_incompatible() {
        let config = LinkConfig::from_lookup(vars(&[(ENV_LIBRARY, "/opt/rt/libruntime.so")]));
        let err = config.host().locate(ENTRY_POINT_SYMBOL).unwrap_err();
        assert!(matches!(
            err,
            crate::binding::error::LinkError::Incompatible { .. }
        ));
    }

    #[test]
    fn test_from_yaml() {
        let config = LinkConfig::from_yaml("library: /tmp/librt.so\n").unwrap();
        assert!(!config.disabled);
        assert_eq!(config.library, Some(PathBuf::from("/tmp/librt.so")));
        assert_eq!(config.entry_point, ENTRY_POINT_SYMBOL);

        let config = LinkConfig::from_yaml("disabled: true\nentry_point: other\n").unwrap();
        assert!(config.disabled);
        assert_eq!(config.entry_point, "other");
    }

    #[test]
    fn test_from_yaml_rejects_empty_entry_point() {
        let err = LinkConfig::from_yaml("entry_point: \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("entry_point"));
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostcaps.yaml");
        std::fs::write(&path, "disabled: true\n").unwrap();
        let config = LinkConfig::from_yaml_file(&path).unwrap();
        assert!(config.disabled);

        assert!(matches!(
            LinkConfig::from_yaml_file(dir.path().join("missing.yaml")),
            Err(ConfigError::Io(_))
        ));
    }
}
