//! Manifest loading.
//!
//! A manifest is a YAML document with an `applications:` list. Each block is
//! kept as a [`RawApplication`], close to what the user wrote, and only turned
//! into an [`ApplicationSpec`](super::ApplicationSpec) by the resolver.

use crate::error::{ConfigError, PushError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default manifest file names, checked in order.
pub const DEFAULT_MANIFEST_FILES: &[&str] = &["manifest.yml", "manifest.yaml"];

/// A parsed manifest document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    /// Application blocks in document order.
    #[serde(default)]
    pub applications: Vec<RawApplication>,
}

/// One application block as written in the manifest.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RawApplication {
    /// Application name.
    #[serde(default)]
    pub name: Option<String>,
    /// Path to the application bits.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Deprecated single buildpack.
    #[serde(default)]
    pub buildpack: Option<String>,
    /// Ordered buildpacks.
    #[serde(default)]
    pub buildpacks: Option<Vec<String>>,
    /// Docker image settings.
    #[serde(default)]
    pub docker: Option<RawDocker>,
    /// Routes as `host.domain/path` strings.
    #[serde(default)]
    pub routes: Option<Vec<RawRoute>>,
    /// Deprecated hostname.
    #[serde(default)]
    pub host: Option<String>,
    /// Deprecated hostnames.
    #[serde(default)]
    pub hosts: Option<Vec<String>>,
    /// Deprecated domain.
    #[serde(default)]
    pub domain: Option<String>,
    /// Deprecated domains.
    #[serde(default)]
    pub domains: Option<Vec<String>>,
    /// Disables routing.
    #[serde(default)]
    pub no_route: Option<bool>,
    /// Instance count.
    #[serde(default)]
    pub instances: Option<u32>,
    /// Memory quantity.
    #[serde(default)]
    pub memory: Option<ScalarValue>,
    /// Disk quantity.
    #[serde(default, rename = "disk_quota", alias = "disk-quota")]
    pub disk_quota: Option<ScalarValue>,
    /// Environment variables.
    #[serde(default)]
    pub env: Option<BTreeMap<String, ScalarValue>>,
    /// Health check type.
    #[serde(default)]
    pub health_check_type: Option<String>,
    /// Health check HTTP endpoint.
    #[serde(default)]
    pub health_check_http_endpoint: Option<String>,
    /// Prevents starting the application.
    #[serde(default)]
    pub no_start: Option<bool>,
}

/// Docker settings of an application block.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RawDocker {
    /// Image reference.
    pub image: String,
    /// Registry username.
    #[serde(default)]
    pub username: Option<String>,
}

/// One entry of the `routes` list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RawRoute {
    /// Route string.
    pub route: String,
}

/// A YAML scalar, for fields users write either quoted or bare.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ScalarValue {
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Integer(i64),
    /// Floating point scalar.
    Float(f64),
    /// String scalar.
    Text(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl RawApplication {
    /// Returns true if any deprecated route field is present.
    #[must_use]
    pub const fn has_legacy_route_fields(&self) -> bool {
        self.host.is_some() || self.hosts.is_some() || self.domain.is_some() || self.domains.is_some()
    }

    /// Returns the block's name or an empty string.
    #[must_use]
    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// Loads manifest documents.
#[derive(Debug, Default)]
pub struct ManifestLoader;

impl ManifestLoader {
    /// Creates a new loader.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads a manifest from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Manifest> {
        let path = path.as_ref();
        info!("Using manifest file {}", path.display());

        if !path.exists() {
            return Err(PushError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            PushError::Config(ConfigError::parse(
                path.display().to_string(),
                format!("failed to read file: {e}"),
            ))
        })?;

        self.parse_yaml(&content)
    }

    /// Parses a manifest from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str) -> Result<Manifest> {
        let manifest: Manifest = serde_yaml::from_str(content)
            .map_err(|e| PushError::Config(ConfigError::parse("manifest", e.to_string())))?;

        debug!("Parsed manifest with {} application(s)", manifest.applications.len());
        Ok(manifest)
    }
}

/// Finds a manifest in the given directory.
///
/// Returns `None` when the directory holds no manifest; pushing without one
/// is allowed.
#[must_use]
pub fn find_manifest(dir: impl AsRef<Path>) -> Option<PathBuf> {
    let dir = dir.as_ref();
    DEFAULT_MANIFEST_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_block() {
        let yaml = r#"
applications:
  - name: web
    path: ./dist
    buildpacks:
      - ruby_buildpack
      - go_buildpack
    routes:
      - route: web.example.com
      - route: www.example.com/api
    instances: 2
    memory: 512M
    disk-quota: 1G
    env:
      RAILS_ENV: production
      WORKERS: 4
      DEBUG: false
    health-check-type: http
    health-check-http-endpoint: /health
    no-start: true
"#;
        let manifest = ManifestLoader::new().parse_yaml(yaml).unwrap();
        assert_eq!(manifest.applications.len(), 1);

        let app = &manifest.applications[0];
        assert_eq!(app.name.as_deref(), Some("web"));
        assert_eq!(app.buildpacks.as_ref().map(Vec::len), Some(2));
        assert_eq!(app.routes.as_ref().map(Vec::len), Some(2));
        assert_eq!(app.memory, Some(ScalarValue::Text(String::from("512M"))));
        assert_eq!(app.disk_quota, Some(ScalarValue::Text(String::from("1G"))));
        assert_eq!(app.no_start, Some(true));

        let env = app.env.as_ref().unwrap();
        assert_eq!(env["WORKERS"].to_string(), "4");
        assert_eq!(env["DEBUG"].to_string(), "false");
    }

    #[test]
    fn test_parse_legacy_fields() {
        let yaml = r"
applications:
  - name: legacy
    buildpack: staticfile_buildpack
    host: www
    domains: [example.com, example.org]
";
        let manifest = ManifestLoader::new().parse_yaml(yaml).unwrap();
        let app = &manifest.applications[0];
        assert_eq!(app.buildpack.as_deref(), Some("staticfile_buildpack"));
        assert!(app.has_legacy_route_fields());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = ManifestLoader::new().parse_yaml("applications: [name: {");
        assert!(matches!(
            result,
            Err(PushError::Config(ConfigError::ParseError { .. }))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ManifestLoader::new().load_file(dir.path().join("manifest.yml"));
        assert!(matches!(
            result,
            Err(PushError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_find_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_manifest(dir.path()).is_none());

        std::fs::write(dir.path().join("manifest.yaml"), "applications: []\n").unwrap();
        let found = find_manifest(dir.path()).unwrap();
        assert!(found.ends_with("manifest.yaml"));

        let manifest = ManifestLoader::new().load_file(&found).unwrap();
        assert!(manifest.applications.is_empty());
    }
}
