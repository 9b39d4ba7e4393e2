//! Change sets.
//!
//! A [`ChangeSet`] is the ordered list of remote operations that converges one
//! application, plus field annotations for the diff display.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::config::{HealthCheck, Lifecycle, RouteSpec};
use crate::error::PlanError;
use crate::remote::ScaleDimension;

/// Operation kinds, used for ordering checks and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpKind {
    /// Create the application.
    CreateApp,
    /// Stop the application.
    Stop,
    /// Replace the buildpacks.
    SetBuildpacks,
    /// Replace the docker image.
    SetDockerImage,
    /// Set environment variables.
    SetEnv,
    /// Replace the health check.
    SetHealthCheck,
    /// Scale one process dimension.
    Scale,
    /// Create a route.
    CreateRoute,
    /// Map a route to the application.
    MapRoute,
    /// Unmap a route from the application.
    UnmapRoute,
    /// Delete a route.
    DeleteRoute,
    /// Upload application bits.
    UploadBits,
    /// Stage the current package.
    Stage,
    /// Start the application.
    Start,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CreateApp => "create-app",
            Self::Stop => "stop",
            Self::SetBuildpacks => "set-buildpacks",
            Self::SetDockerImage => "set-docker-image",
            Self::SetEnv => "set-env",
            Self::SetHealthCheck => "set-health-check",
            Self::Scale => "scale",
            Self::CreateRoute => "create-route",
            Self::MapRoute => "map-route",
            Self::UnmapRoute => "unmap-route",
            Self::DeleteRoute => "delete-route",
            Self::UploadBits => "upload-bits",
            Self::Stage => "stage",
            Self::Start => "start",
        };
        write!(f, "{s}")
    }
}

/// One remote operation with the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ChangeOp {
    /// Create the application with its initial lifecycle.
    CreateApp {
        /// Initial lifecycle.
        lifecycle: Lifecycle,
    },
    /// Stop a started application.
    Stop,
    /// Replace the buildpacks.
    SetBuildpacks {
        /// Assigned buildpacks before.
        before: Vec<String>,
        /// Buildpacks after; empty means auto-detect.
        after: Vec<String>,
    },
    /// Replace the docker image.
    SetDockerImage {
        /// Image before.
        before: Option<String>,
        /// Image after.
        image: String,
        /// Registry username.
        username: Option<String>,
    },
    /// Set environment variables that are new or changed.
    SetEnv {
        /// Values before, `None` for new variables.
        before: BTreeMap<String, Option<String>>,
        /// Values to set.
        vars: BTreeMap<String, String>,
    },
    /// Replace the health check.
    SetHealthCheck {
        /// Health check before.
        before: Option<HealthCheck>,
        /// Health check after.
        after: HealthCheck,
    },
    /// Scale one dimension of the web process.
    Scale {
        /// Which dimension.
        dimension: ScaleDimension,
        /// Value before.
        before: Option<u64>,
        /// Value after.
        after: u64,
    },
    /// Create a route that does not exist yet.
    CreateRoute {
        /// The route.
        route: RouteSpec,
    },
    /// Map a route.
    MapRoute {
        /// The route.
        route: RouteSpec,
        /// GUID of an existing route; `None` when an earlier op creates it.
        route_guid: Option<String>,
    },
    /// Unmap a route.
    UnmapRoute {
        /// The route.
        route: RouteSpec,
        /// Route GUID.
        route_guid: String,
    },
    /// Delete a route nothing else is mapped to.
    DeleteRoute {
        /// The route.
        route: RouteSpec,
        /// Route GUID.
        route_guid: String,
    },
    /// Upload bits.
    UploadBits {
        /// Digest of the current package.
        before: Option<String>,
        /// Digest of the artifact to upload.
        digest: String,
    },
    /// Stage the current package and assign the droplet.
    Stage,
    /// Start the application.
    Start,
}

impl ChangeOp {
    /// Returns the operation kind.
    #[must_use]
    pub const fn kind(&self) -> OpKind {
        match self {
            Self::CreateApp { .. } => OpKind::CreateApp,
            Self::Stop => OpKind::Stop,
            Self::SetBuildpacks { .. } => OpKind::SetBuildpacks,
            Self::SetDockerImage { .. } => OpKind::SetDockerImage,
            Self::SetEnv { .. } => OpKind::SetEnv,
            Self::SetHealthCheck { .. } => OpKind::SetHealthCheck,
            Self::Scale { .. } => OpKind::Scale,
            Self::CreateRoute { .. } => OpKind::CreateRoute,
            Self::MapRoute { .. } => OpKind::MapRoute,
            Self::UnmapRoute { .. } => OpKind::UnmapRoute,
            Self::DeleteRoute { .. } => OpKind::DeleteRoute,
            Self::UploadBits { .. } => OpKind::UploadBits,
            Self::Stage => OpKind::Stage,
            Self::Start => OpKind::Start,
        }
    }

    /// Returns the route this operation targets, if any.
    #[must_use]
    pub const fn route(&self) -> Option<&RouteSpec> {
        match self {
            Self::CreateRoute { route }
            | Self::MapRoute { route, .. }
            | Self::UnmapRoute { route, .. }
            | Self::DeleteRoute { route, .. } => Some(route),
            _ => None,
        }
    }

    /// The resource the operation targets, for display.
    #[must_use]
    pub fn target(&self) -> String {
        match self {
            Self::Scale { dimension, .. } => dimension.to_string(),
            Self::SetEnv { vars, .. } => vars.keys().cloned().collect::<Vec<_>>().join(", "),
            op => op
                .route()
                .map_or_else(|| String::from("app"), ToString::to_string),
        }
    }

    /// Value before the change, for display.
    #[must_use]
    pub fn before(&self) -> Option<String> {
        match self {
            Self::SetBuildpacks { before, .. } => Some(before.join(", ")),
            Self::SetDockerImage { before, .. } | Self::UploadBits { before, .. } => before.clone(),
            Self::SetHealthCheck { before, .. } => before.as_ref().map(ToString::to_string),
            Self::Scale { before, .. } => before.map(|v| v.to_string()),
            Self::UnmapRoute { route, .. } | Self::DeleteRoute { route, .. } => Some(route.to_string()),
            _ => None,
        }
    }

    /// Value after the change, for display.
    #[must_use]
    pub fn after(&self) -> Option<String> {
        match self {
            Self::SetBuildpacks { after, .. } => Some(after.join(", ")),
            Self::SetDockerImage { image, .. } => Some(image.clone()),
            Self::SetHealthCheck { after, .. } => Some(after.to_string()),
            Self::Scale { after, .. } => Some(after.to_string()),
            Self::UploadBits { digest, .. } => Some(digest.clone()),
            Self::CreateRoute { route } | Self::MapRoute { route, .. } => Some(route.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.target())
    }
}

/// Change marker on an annotated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    /// Value is added.
    Added,
    /// Value is removed.
    Removed,
    /// Value is unchanged, shown for context.
    Unchanged,
}

impl Marker {
    /// The prefix character.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Added => '+',
            Self::Removed => '-',
            Self::Unchanged => ' ',
        }
    }
}

/// One annotated value of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    /// Change marker.
    pub marker: Marker,
    /// Displayed value.
    pub value: String,
}

/// Whether a field holds one value or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldShape {
    /// Rendered as `field: value`.
    Scalar,
    /// Rendered as a header with one line per element.
    List,
}

/// Annotations for one field the user referenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    /// Field name.
    pub field: String,
    /// Scalar or list.
    pub shape: FieldShape,
    /// Values in display order.
    pub entries: Vec<DiffEntry>,
    /// Deprecation warnings for the diagnostic stream.
    pub deprecations: Vec<String>,
}

impl FieldDiff {
    /// Creates a field annotation.
    #[must_use]
    pub fn new(field: impl Into<String>, shape: FieldShape) -> Self {
        Self {
            field: field.into(),
            shape,
            entries: Vec::new(),
            deprecations: Vec::new(),
        }
    }

    /// Appends an entry.
    pub fn push(&mut self, marker: Marker, value: impl Into<String>) {
        self.entries.push(DiffEntry {
            marker,
            value: value.into(),
        });
    }

    /// Returns true if any entry is added or removed.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.entries.iter().any(|e| e.marker != Marker::Unchanged)
    }
}

/// Ordered operations for one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    /// Application name.
    pub app: String,
    /// Whether a start must be preceded by a stage.
    pub stage_before_start: bool,
    /// Operations in execution order.
    pub ops: Vec<ChangeOp>,
    /// Field annotations in display order.
    pub annotations: Vec<FieldDiff>,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn empty(app: impl Into<String>, stage_before_start: bool) -> Self {
        Self {
            app: app.into(),
            stage_before_start,
            ops: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// A change set for a direct lifecycle command such as start or stop.
    #[must_use]
    pub fn lifecycle_command(app: impl Into<String>, op: ChangeOp) -> Self {
        Self {
            app: app.into(),
            stage_before_start: false,
            ops: vec![op],
            annotations: Vec::new(),
        }
    }

    /// Returns true if no remote mutation is needed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns the number of operations.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns the operation kinds in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<OpKind> {
        self.ops.iter().map(ChangeOp::kind).collect()
    }

    /// Counts operations of one kind.
    #[must_use]
    pub fn count(&self, kind: OpKind) -> usize {
        self.ops.iter().filter(|op| op.kind() == kind).count()
    }

    /// Returns true if any annotation shows a change.
    #[must_use]
    pub fn has_visible_changes(&self) -> bool {
        self.annotations.iter().any(FieldDiff::is_changed)
    }

    /// Verifies the ordering invariants.
    ///
    /// - create-app comes first
    /// - a route is created before it is mapped, unless it already existed
    /// - a route is unmapped before it is deleted
    /// - start comes last, after every configuration and route change
    /// - start is preceded by stage when staging applies, and stage by any upload
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::OrderingViolation`] describing the first breach.
    pub fn check_ordering(&self) -> Result<(), PlanError> {
        let violation = |message: String| PlanError::OrderingViolation {
            app: self.app.clone(),
            message,
        };

        let mut created: HashSet<&RouteSpec> = HashSet::new();
        let mut unmapped: HashSet<&RouteSpec> = HashSet::new();
        let mut seen: HashSet<OpKind> = HashSet::new();

        for (i, op) in self.ops.iter().enumerate() {
            if seen.contains(&OpKind::Start) {
                return Err(violation(format!("'{op}' follows start")));
            }

            match op {
                ChangeOp::CreateApp { .. } if i != 0 => {
                    return Err(violation(String::from("create-app is not the first operation")));
                }
                ChangeOp::CreateRoute { route } => {
                    created.insert(route);
                }
                ChangeOp::MapRoute {
                    route,
                    route_guid: None,
                } if !created.contains(route) => {
                    return Err(violation(format!("route {route} is mapped before it is created")));
                }
                ChangeOp::UnmapRoute { route, .. } => {
                    unmapped.insert(route);
                }
                ChangeOp::DeleteRoute { route, .. } if !unmapped.contains(route) => {
                    return Err(violation(format!("route {route} is deleted before it is unmapped")));
                }
                ChangeOp::UploadBits { .. } if seen.contains(&OpKind::Stage) => {
                    return Err(violation(String::from("upload-bits follows stage")));
                }
                ChangeOp::Start if self.stage_before_start && !seen.contains(&OpKind::Stage) => {
                    return Err(violation(String::from("start is not preceded by stage")));
                }
                ChangeOp::SetBuildpacks { .. }
                | ChangeOp::SetEnv { .. }
                | ChangeOp::Scale { .. }
                | ChangeOp::SetHealthCheck { .. }
                | ChangeOp::SetDockerImage { .. }
                    if seen.contains(&OpKind::UploadBits) || seen.contains(&OpKind::Stage) =>
                {
                    return Err(violation(format!("'{op}' follows upload-bits or stage")));
                }
                _ => {}
            }

            seen.insert(op.kind());
        }

        Ok(())
    }

    /// Deterministic digest of the operations.
    ///
    /// Two plans for the same desired and actual state share a fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.app.as_bytes());
        for op in &self.ops {
            hasher.update([0u8]);
            hasher.update(op.to_string().as_bytes());
            hasher.update([1u8]);
            hasher.update(op.before().unwrap_or_default().as_bytes());
            hasher.update([2u8]);
            hasher.update(op.after().unwrap_or_default().as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ops.is_empty() {
            return write!(f, "{}: no changes required", self.app);
        }

        writeln!(f, "{} ({} operations):", self.app, self.ops.len())?;
        for (i, op) in self.ops.iter().enumerate() {
            writeln!(f, "  {}. {op}", i + 1)?;
        }
        Ok(())
    }
}
