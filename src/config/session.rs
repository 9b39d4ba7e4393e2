//! Persisted session and target.
//!
//! The session records which control plane is targeted, the access token and
//! the org and space commands act on. It is loaded once per invocation and
//! passed around explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{ConfigError, PushError, Result};

/// Environment variable selecting the session directory.
pub const HOME_ENV: &str = "CFPUSH_HOME";

/// Environment variable overriding the stored access token.
pub const TOKEN_ENV: &str = "CFPUSH_ACCESS_TOKEN";

/// Default session directory name under the user's home.
const SESSION_DIR: &str = ".cfpush";

/// Session file name.
const SESSION_FILE: &str = "config.json";

/// A named platform resource with its GUID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetRef {
    /// Resource GUID.
    pub guid: String,
    /// Resource name.
    pub name: String,
}

/// The current session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Control plane API endpoint.
    #[serde(default)]
    pub api_endpoint: Option<String>,
    /// API version reported by the endpoint.
    #[serde(default)]
    pub api_version: Option<String>,
    /// Bearer access token.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Targeted organization.
    #[serde(default)]
    pub organization: Option<TargetRef>,
    /// Targeted space.
    #[serde(default)]
    pub space: Option<TargetRef>,
    /// Last time the session was saved.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Returns true if an access token is present.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Sets a new endpoint, dropping everything tied to the previous one.
    pub fn set_endpoint(&mut self, endpoint: impl Into<String>, version: Option<String>) {
        *self = Self {
            api_endpoint: Some(endpoint.into().trim_end_matches('/').to_string()),
            api_version: version,
            ..Self::default()
        };
    }

    /// Targets an organization, clearing the space.
    pub fn set_organization(&mut self, org: TargetRef) {
        self.organization = Some(org);
        self.space = None;
    }

    /// Applies environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            debug!("Overriding access token from environment");
            self.access_token = Some(token);
        }
    }
}

/// File-backed session store.
#[derive(Debug, Clone)]
pub struct SessionStore {
    /// Directory holding the session file.
    base_dir: PathBuf,
    /// Path to the session file.
    session_path: PathBuf,
}

impl SessionStore {
    /// Creates a store in `$CFPUSH_HOME` or `~/.cfpush`.
    ///
    /// # Errors
    ///
    /// Returns an error if neither location can be determined.
    pub fn from_env() -> Result<Self> {
        if let Ok(home) = std::env::var(HOME_ENV) {
            return Ok(Self::with_base_dir(home));
        }
        let home = dirs::home_dir().ok_or(PushError::Config(ConfigError::NoHomeDirectory))?;
        Ok(Self::with_base_dir(home.join(SESSION_DIR)))
    }

    /// Creates a store in the given directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let session_path = base_dir.join(SESSION_FILE);
        Self {
            base_dir,
            session_path,
        }
    }

    /// Returns the session file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.session_path
    }

    /// Loads the session, returning an empty one if none was saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self) -> Result<Session> {
        if !self.session_path.exists() {
            debug!("No session file at {}", self.session_path.display());
            return Ok(Session::default());
        }

        let content = fs::read_to_string(&self.session_path).await.map_err(|e| {
            PushError::Config(ConfigError::parse(
                "session",
                format!("failed to read {}: {e}", self.session_path.display()),
            ))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| PushError::Config(ConfigError::parse("session", e.to_string())))
    }

    /// Saves the session atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, session: &Session) -> Result<()> {
        let write_err = |e: std::io::Error| {
            PushError::Config(ConfigError::WriteError {
                path: self.session_path.clone(),
                message: e.to_string(),
            })
        };

        if !self.base_dir.exists() {
            fs::create_dir_all(&self.base_dir).await.map_err(write_err)?;
        }

        let mut stamped = session.clone();
        stamped.updated_at = Some(Utc::now());

        let content = serde_json::to_string_pretty(&stamped).map_err(|e| {
            PushError::Config(ConfigError::WriteError {
                path: self.session_path.clone(),
                message: e.to_string(),
            })
        })?;

        let temp_path = self.session_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await.map_err(write_err)?;
        file.write_all(content.as_bytes()).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        fs::rename(&temp_path, &self.session_path).await.map_err(write_err)?;

        info!("Session saved to {}", self.session_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Session {
        let mut session = Session::default();
        session.set_endpoint("https://api.example.com/", Some(String::from("3.120.0")));
        session.access_token = Some(String::from("token"));
        session.set_organization(TargetRef {
            guid: String::from("org-guid"),
            name: String::from("org"),
        });
        session.space = Some(TargetRef {
            guid: String::from("space-guid"),
            name: String::from("dev"),
        });
        session
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::with_base_dir(temp.path().join("nested"));

        store.save(&sample()).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded.api_endpoint.as_deref(), Some("https://api.example.com"));
        assert_eq!(loaded.space.map(|s| s.name).as_deref(), Some("dev"));
        assert!(loaded.updated_at.is_some());
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::with_base_dir(temp.path());

        let session = store.load().await.unwrap();
        assert_eq!(session, Session::default());
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn test_load_corrupted() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::with_base_dir(temp.path());
        std::fs::write(store.path(), "{not json").unwrap();

        assert!(store.load().await.is_err());
    }

    #[test]
    fn test_set_endpoint_resets_target() {
        let mut session = sample();
        session.set_endpoint("https://other.example.com", None);

        assert!(!session.is_logged_in());
        assert!(session.organization.is_none());
        assert!(session.space.is_none());
    }

    #[test]
    fn test_set_organization_clears_space() {
        let mut session = sample();
        session.set_organization(TargetRef {
            guid: String::from("g2"),
            name: String::from("other"),
        });
        assert!(session.space.is_none());
    }
}
