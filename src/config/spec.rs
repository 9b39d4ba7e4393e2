//! Desired-state specification types.
//!
//! An [`ApplicationSpec`] is the canonical, fully resolved description of one
//! application as the user wants it to exist on the platform. Specs are built
//! by the resolver and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Canonical desired state for a single application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplicationSpec {
    /// Application name, unique within the targeted space.
    pub name: String,
    /// Directory or archive holding the application bits.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// How the application is staged.
    pub lifecycle: Lifecycle,
    /// Desired routes.
    pub routes: RouteSet,
    /// Desired instance count, `None` leaves the platform value alone.
    #[serde(default)]
    pub instances: Option<u32>,
    /// Desired memory in megabytes.
    #[serde(default)]
    pub memory_mb: Option<u64>,
    /// Desired disk in megabytes.
    #[serde(default)]
    pub disk_mb: Option<u64>,
    /// Environment variables to set on the application.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Health check configuration.
    #[serde(default)]
    pub health_check: Option<HealthCheck>,
    /// Whether the application must not be started.
    #[serde(default)]
    pub no_start: bool,
    /// Deprecated input that was accepted while resolving.
    #[serde(default)]
    pub deprecations: Vec<Deprecation>,
}

/// Staging lifecycle of an application.
///
/// Exactly one of buildpack staging or a docker image is active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Lifecycle {
    /// Staged from uploaded bits with buildpacks.
    Buildpack {
        /// `None` keeps whatever the platform has, an empty list means auto-detect.
        buildpacks: Option<Vec<String>>,
    },
    /// Run from a prebuilt docker image.
    Docker {
        /// Image reference.
        image: String,
        /// Registry username.
        #[serde(default)]
        username: Option<String>,
    },
}

/// A host + domain (+ path or port) binding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteSpec {
    /// Hostname; absent for TCP routes and bare domains.
    #[serde(default)]
    pub host: Option<String>,
    /// Domain name.
    pub domain: String,
    /// Path suffix, starting with `/`.
    #[serde(default)]
    pub path: Option<String>,
    /// Port, TCP routes only.
    #[serde(default)]
    pub port: Option<u16>,
}

/// Where the desired route set came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    /// Derived from the application name; yields to existing routes.
    Default,
    /// Declared in the manifest; routes outside the set are removed.
    Explicit,
    /// Given with route flags; added alongside existing routes.
    Flag,
    /// Routing disabled with `no-route`.
    NoRoute,
}

/// Ordered set of desired routes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteSet {
    /// Routes in first-appearance order, without duplicates.
    pub routes: Vec<RouteSpec>,
    /// Origin of the routes.
    pub source: RouteSource,
}

/// Health check configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthCheck {
    /// Check type.
    pub check_type: HealthCheckType,
    /// HTTP endpoint, `http` checks only.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Health check types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckType {
    /// TCP port check.
    Port,
    /// Process liveness check.
    Process,
    /// HTTP endpoint check.
    Http,
}

/// Deprecated manifest attributes that are still accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeprecatedField {
    /// Singular `buildpack`.
    Buildpack,
    /// `host`.
    Host,
    /// `hosts`.
    Hosts,
    /// `domain`.
    Domain,
    /// `domains`.
    Domains,
    /// Health check type `none`.
    HealthCheckNone,
}

/// A deprecation accepted during resolution, surfaced as a warning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deprecation {
    /// The deprecated field.
    pub field: DeprecatedField,
    /// Warning text for the diagnostic stream.
    pub message: String,
}

/// Kind of a platform domain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DomainKind {
    /// HTTP domain, routes carry hostnames.
    Http,
    /// TCP domain, routes are host-less.
    Tcp,
}

/// A domain known to the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DomainInfo {
    /// Domain GUID.
    pub guid: String,
    /// Domain name.
    pub name: String,
    /// HTTP or TCP.
    pub kind: DomainKind,
}

impl ApplicationSpec {
    /// Creates a buildpack application with default routing and no overrides.
    #[must_use]
    pub fn new(name: impl Into<String>, routes: RouteSet) -> Self {
        Self {
            name: name.into(),
            path: None,
            lifecycle: Lifecycle::Buildpack { buildpacks: None },
            routes,
            instances: None,
            memory_mb: None,
            disk_mb: None,
            env: BTreeMap::new(),
            health_check: None,
            no_start: false,
            deprecations: Vec::new(),
        }
    }

    /// Returns the requested buildpacks, `None` when unspecified or docker.
    #[must_use]
    pub fn buildpacks(&self) -> Option<&[String]> {
        match &self.lifecycle {
            Lifecycle::Buildpack { buildpacks } => buildpacks.as_deref(),
            Lifecycle::Docker { .. } => None,
        }
    }

    /// Returns the docker image, if this is a docker application.
    #[must_use]
    pub fn docker_image(&self) -> Option<&str> {
        match &self.lifecycle {
            Lifecycle::Docker { image, .. } => Some(image),
            Lifecycle::Buildpack { .. } => None,
        }
    }

    /// Returns true for docker applications.
    #[must_use]
    pub const fn is_docker(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Docker { .. })
    }

    /// Returns true if the given field was accepted as deprecated.
    #[must_use]
    pub fn is_deprecated(&self, field: DeprecatedField) -> bool {
        self.deprecations.iter().any(|d| d.field == field)
    }
}

impl RouteSpec {
    /// Creates an HTTP route.
    #[must_use]
    pub fn http(host: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            domain: domain.into(),
            path: None,
            port: None,
        }
    }

    /// Creates a host-less route on a domain.
    #[must_use]
    pub fn bare(domain: impl Into<String>) -> Self {
        Self {
            host: None,
            domain: domain.into(),
            path: None,
            port: None,
        }
    }

    /// Sets the path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(host) = &self.host {
            write!(f, "{host}.")?;
        }
        write!(f, "{}", self.domain)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        if let Some(path) = &self.path {
            write!(f, "{path}")?;
        }
        Ok(())
    }
}

impl RouteSet {
    /// Builds a route set, dropping duplicates while keeping first appearance.
    #[must_use]
    pub fn new(routes: impl IntoIterator<Item = RouteSpec>, source: RouteSource) -> Self {
        let mut unique: Vec<RouteSpec> = Vec::new();
        for route in routes {
            if !unique.contains(&route) {
                unique.push(route);
            }
        }
        Self {
            routes: unique,
            source,
        }
    }

    /// A route set with routing disabled.
    #[must_use]
    pub const fn no_route() -> Self {
        Self {
            routes: Vec::new(),
            source: RouteSource::NoRoute,
        }
    }

    /// Returns true if the route is desired.
    #[must_use]
    pub fn contains(&self, route: &RouteSpec) -> bool {
        self.routes.contains(route)
    }
}

impl fmt::Display for HealthCheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Port => "port",
            Self::Process => "process",
            Self::Http => "http",
        };
        write!(f, "{s}")
    }
}

impl HealthCheckType {
    /// Parses a health check type, reporting whether a deprecated alias was used.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a known type.
    pub fn parse(s: &str) -> Result<(Self, bool), String> {
        match s.to_lowercase().as_str() {
            "port" => Ok((Self::Port, false)),
            "process" => Ok((Self::Process, false)),
            "none" => Ok((Self::Process, true)),
            "http" => Ok((Self::Http, false)),
            other => Err(format!(
                "unknown health check type '{other}', expected port, process or http"
            )),
        }
    }
}

impl fmt::Display for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.check_type)?;
        if let Some(endpoint) = &self.endpoint {
            write!(f, " {endpoint}")?;
        }
        Ok(())
    }
}

/// Parses a memory or disk quantity like `512M` or `1G` into megabytes.
///
/// # Errors
///
/// Returns an error if the value has no recognized unit or is not a number.
pub fn parse_megabytes(value: &str) -> Result<u64, String> {
    let trimmed = value.trim().to_uppercase();
    let (digits, multiplier) = if let Some(d) = trimmed.strip_suffix("GB") {
        (d, 1024)
    } else if let Some(d) = trimmed.strip_suffix("MB") {
        (d, 1)
    } else if let Some(d) = trimmed.strip_suffix('G') {
        (d, 1024)
    } else if let Some(d) = trimmed.strip_suffix('M') {
        (d, 1)
    } else {
        return Err(format!("missing unit in '{value}'"));
    };

    let amount = digits
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid amount in '{value}'"))?;

    if amount == 0 {
        return Err(format!("quantity '{value}' must be greater than zero"));
    }

    amount
        .checked_mul(multiplier)
        .ok_or_else(|| format!("quantity '{value}' is too large"))
}

/// Formats megabytes the way quantities are written in manifests.
#[must_use]
pub fn format_megabytes(mb: u64) -> String {
    if mb >= 1024 && mb % 1024 == 0 {
        format!("{}G", mb / 1024)
    } else {
        format!("{mb}M")
    }
}
