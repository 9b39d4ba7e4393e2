//! Control plane records and the actual-state snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{HealthCheck, RouteSpec, Session};

/// The org and space a command operates in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpaceScope {
    /// Organization GUID.
    pub org_guid: String,
    /// Space GUID.
    pub space_guid: String,
    /// Space name, for messages.
    pub space_name: String,
}

impl SpaceScope {
    /// The scope targeted by a session, if both org and space are set.
    #[must_use]
    pub fn from_session(session: &Session) -> Option<Self> {
        let org = session.organization.as_ref()?;
        let space = session.space.as_ref()?;
        Some(Self {
            org_guid: org.guid.clone(),
            space_guid: space.guid.clone(),
            space_name: space.name.clone(),
        })
    }
}

/// Control plane information.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiInfo {
    /// API version, semver formatted.
    pub version: String,
}

/// Whether an application is started.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppState {
    /// Desired state started.
    Started,
    /// Desired state stopped.
    Stopped,
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Lifecycle currently configured on the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum LifecycleRecord {
    /// Buildpack staging, with the assigned buildpacks in order.
    Buildpacks(Vec<String>),
    /// Docker image.
    Docker {
        /// Current image, if a package exists.
        image: Option<String>,
    },
}

/// An application record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppRecord {
    /// Application GUID.
    pub guid: String,
    /// Application name.
    pub name: String,
    /// Started or stopped.
    pub state: AppState,
    /// Staging lifecycle.
    pub lifecycle: LifecycleRecord,
}

/// Settings of the application's web process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessRecord {
    /// Process GUID.
    pub guid: String,
    /// Instance count.
    pub instances: u32,
    /// Memory in megabytes.
    pub memory_mb: u64,
    /// Disk in megabytes.
    pub disk_mb: u64,
    /// Health check.
    pub health_check: Option<HealthCheck>,
}

/// A route record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteRecord {
    /// Route GUID.
    pub guid: String,
    /// Host, domain, path and port.
    pub route: RouteSpec,
    /// Number of other applications mapped to this route.
    pub other_destinations: usize,
}

/// The most recent package of an application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageRecord {
    /// Package GUID.
    pub guid: String,
    /// sha256 of the uploaded bits, bits packages only.
    pub digest: Option<String>,
    /// Image reference, docker packages only.
    pub image: Option<String>,
}

/// Which dimension of the web process a scale call changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDimension {
    /// Instance count.
    Instances,
    /// Memory in megabytes.
    Memory,
    /// Disk in megabytes.
    Disk,
}

impl fmt::Display for ScaleDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instances => write!(f, "instances"),
            Self::Memory => write!(f, "memory"),
            Self::Disk => write!(f, "disk quota"),
        }
    }
}

/// Kind of asynchronous work a job handle tracks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Bits processing of an uploaded package.
    Package,
    /// Staging build.
    Build,
    /// Generic background job.
    Job,
    /// Instances starting after a start call.
    Startup,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package => write!(f, "package processing"),
            Self::Build => write!(f, "staging"),
            Self::Job => write!(f, "job"),
            Self::Startup => write!(f, "startup"),
        }
    }
}

/// Reference to an asynchronous remote operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobHandle {
    /// Job, package, build or process GUID.
    pub id: String,
    /// Path to poll for status.
    pub poll_url: String,
    /// What is being tracked.
    pub kind: JobKind,
    /// When the operation was submitted.
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    /// Creates a handle submitted now.
    #[must_use]
    pub fn new(id: impl Into<String>, poll_url: impl Into<String>, kind: JobKind) -> Self {
        Self {
            id: id.into(),
            poll_url: poll_url.into(),
            kind,
            submitted_at: Utc::now(),
        }
    }
}

/// Classification of a polled job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Not terminal yet.
    Running,
    /// Finished successfully, with the GUID of what it produced.
    Succeeded {
        /// Produced resource (package or droplet GUID).
        resource: Option<String>,
    },
    /// Finished unsuccessfully.
    Failed {
        /// Reason reported by the platform.
        reason: String,
    },
}

impl JobState {
    /// Returns true for succeeded and failed states.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Snapshot of one application's live resources.
///
/// Fetched fresh for every invocation and owned by the task handling the
/// application.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActualState {
    /// Application record, `None` if the application does not exist.
    pub app: Option<AppRecord>,
    /// Web process settings.
    pub process: Option<ProcessRecord>,
    /// Environment variables.
    pub env: BTreeMap<String, String>,
    /// Routes mapped to the application.
    pub mapped_routes: Vec<RouteRecord>,
    /// Desired routes that exist in the space but are not mapped.
    pub known_routes: Vec<RouteRecord>,
    /// Most recent package.
    pub package: Option<PackageRecord>,
    /// Whether a current droplet exists.
    pub has_droplet: bool,
}

impl ActualState {
    /// The state of an application that does not exist.
    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }

    /// Returns true if the application exists.
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.app.is_some()
    }

    /// Returns the application GUID, if it exists.
    #[must_use]
    pub fn app_guid(&self) -> Option<&str> {
        self.app.as_ref().map(|a| a.guid.as_str())
    }

    /// Returns true if the application exists and is started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.app.as_ref().is_some_and(|a| a.state == AppState::Started)
    }

    /// Returns the assigned buildpacks, empty for docker or missing applications.
    #[must_use]
    pub fn buildpacks(&self) -> &[String] {
        match self.app.as_ref().map(|a| &a.lifecycle) {
            Some(LifecycleRecord::Buildpacks(list)) => list,
            _ => &[],
        }
    }

    /// Returns the current docker image, if any.
    #[must_use]
    pub fn docker_image(&self) -> Option<&str> {
        match self.app.as_ref().map(|a| &a.lifecycle) {
            Some(LifecycleRecord::Docker { image }) => image.as_deref(),
            _ => None,
        }
    }

    /// Returns the digest of the current bits package.
    #[must_use]
    pub fn package_digest(&self) -> Option<&str> {
        self.package.as_ref().and_then(|p| p.digest.as_deref())
    }

    /// Finds a mapped route.
    #[must_use]
    pub fn mapped(&self, route: &RouteSpec) -> Option<&RouteRecord> {
        self.mapped_routes.iter().find(|r| r.route == *route)
    }

    /// Finds an existing but unmapped route.
    #[must_use]
    pub fn known(&self, route: &RouteSpec) -> Option<&RouteRecord> {
        self.known_routes.iter().find(|r| r.route == *route)
    }
}
