//! Apply executor.
//!
//! Performs one application's change set strictly in order. The first failure
//! halts the remaining operations, which are reported as skipped. Nothing is
//! rolled back: operations applied before a failure stay applied and are
//! reported as such.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::artifact::Artifact;
use crate::config::{ApplySettings, Lifecycle, RouteSpec};
use crate::error::{ApplyError, TransportError};
use crate::remote::{ActualState, JobPoller, PollOutcome, RemoteClient, SpaceScope};

use super::plan::{ChangeOp, ChangeSet, OpKind};

/// Lifecycle of one application's apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppPhase {
    /// Planned, nothing issued yet.
    Planned,
    /// Issuing configuration and route operations.
    Applying,
    /// Waiting for staging.
    Staging,
    /// Waiting for instances to start.
    Starting,
    /// Started successfully.
    Started,
    /// All operations applied without a start.
    Applied,
    /// Halted by a failure.
    Failed,
}

impl fmt::Display for AppPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Planned => "planned",
            Self::Applying => "applying",
            Self::Staging => "staging",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Applied => "applied",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// How an application's apply ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ApplyOutcome {
    /// Planned only; nothing was applied.
    Planned,
    /// Every operation was applied.
    FullyApplied,
    /// An operation failed; see the report's failures.
    PartiallyApplied,
    /// Rejected before any operation was issued.
    RejectedBeforeStart {
        /// Why the application was rejected.
        reason: String,
    },
}

/// An operation that failed, or was not issued because of cancellation.
#[derive(Debug, Clone, Serialize)]
pub struct FailedOp {
    /// The operation.
    pub op: ChangeOp,
    /// Error message.
    pub message: String,
    /// The error.
    #[serde(skip)]
    pub error: ApplyError,
}

impl FailedOp {
    fn new(op: &ChangeOp, error: ApplyError) -> Self {
        Self {
            op: op.clone(),
            message: error.to_string(),
            error,
        }
    }
}

/// Result of applying one application.
#[derive(Debug, Clone, Serialize)]
pub struct AppReport {
    /// Application name.
    pub app: String,
    /// The planned change set.
    pub changeset: ChangeSet,
    /// Operations that were applied.
    pub applied: Vec<ChangeOp>,
    /// Operations that were never attempted.
    pub skipped: Vec<ChangeOp>,
    /// Operations that failed.
    pub failures: Vec<FailedOp>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
    /// Final phase.
    pub phase: AppPhase,
    /// Outcome.
    pub outcome: ApplyOutcome,
    /// When the apply began.
    pub started_at: DateTime<Utc>,
    /// When the apply ended.
    pub finished_at: DateTime<Utc>,
}

impl AppReport {
    /// A report for a change set that has not been applied.
    #[must_use]
    pub fn planned(changeset: ChangeSet) -> Self {
        let now = Utc::now();
        Self {
            app: changeset.app.clone(),
            changeset,
            applied: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
            phase: AppPhase::Planned,
            outcome: ApplyOutcome::Planned,
            started_at: now,
            finished_at: now,
        }
    }

    /// A report for an application rejected before any mutation.
    #[must_use]
    pub fn rejected(app: impl Into<String>, reason: impl Into<String>) -> Self {
        let app = app.into();
        let mut report = Self::planned(ChangeSet::empty(app, false));
        report.phase = AppPhase::Failed;
        report.outcome = ApplyOutcome::RejectedBeforeStart {
            reason: reason.into(),
        };
        report
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            ApplyOutcome::Planned | ApplyOutcome::FullyApplied
        )
    }
}

/// Identifiers learned while applying.
struct Progress {
    app_guid: Option<String>,
    package_guid: Option<String>,
    created_routes: HashMap<RouteSpec, String>,
}

/// Applies change sets against the control plane.
pub struct ApplyExecutor<'a> {
    /// Control plane client.
    client: &'a dyn RemoteClient,
    /// Targeted org and space.
    scope: &'a SpaceScope,
    /// Timeouts and retry policy.
    settings: ApplySettings,
    /// Stops new operations when cancelled.
    cancel: CancellationToken,
}

impl<'a> ApplyExecutor<'a> {
    /// Creates an executor.
    #[must_use]
    pub const fn new(
        client: &'a dyn RemoteClient,
        scope: &'a SpaceScope,
        settings: ApplySettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            scope,
            settings,
            cancel,
        }
    }

    /// Applies `changeset`, whose plan was computed from `actual`.
    ///
    /// Never returns an error: failures are recorded in the report so that
    /// other applications can proceed.
    pub async fn apply(
        &self,
        changeset: &ChangeSet,
        actual: &ActualState,
        artifact: Option<&Artifact>,
    ) -> AppReport {
        let mut report = AppReport::planned(changeset.clone());
        report.started_at = Utc::now();

        if let Err(e) = changeset.check_ordering() {
            error!("{e}");
            report.phase = AppPhase::Failed;
            report.outcome = ApplyOutcome::RejectedBeforeStart {
                reason: e.to_string(),
            };
            report.finished_at = Utc::now();
            return report;
        }

        if changeset.is_empty() {
            info!("'{}' is up to date", changeset.app);
            report.phase = AppPhase::Applied;
            report.outcome = ApplyOutcome::FullyApplied;
            report.finished_at = Utc::now();
            return report;
        }

        info!("Applying {} operation(s) to '{}'", changeset.len(), changeset.app);
        report.phase = AppPhase::Applying;

        let mut progress = Progress {
            app_guid: actual.app_guid().map(ToString::to_string),
            package_guid: actual.package.as_ref().map(|p| p.guid.clone()),
            created_routes: HashMap::new(),
        };

        for (i, op) in changeset.ops.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Cancelled; '{}' stops before {op}", changeset.app);
                let error = ApplyError::Cancelled {
                    app: changeset.app.clone(),
                    operation: op.to_string(),
                };
                report.failures.push(FailedOp::new(op, error));
                report.skipped = changeset.ops[i + 1..].to_vec();
                break;
            }

            match op.kind() {
                OpKind::Stage => report.phase = AppPhase::Staging,
                OpKind::Start => report.phase = AppPhase::Starting,
                _ => {}
            }

            debug!("[{}/{}] {op}", i + 1, changeset.len());
            let result = self
                .apply_op(&changeset.app, op, &mut progress, artifact, report.applied.len())
                .await;

            match result {
                Ok(()) => {
                    info!("{}: {op} done", changeset.app);
                    if op.kind() == OpKind::Start {
                        report.phase = AppPhase::Started;
                    }
                    report.applied.push(op.clone());
                }
                Err(e) if op.kind() == OpKind::DeleteRoute => {
                    warn!("{}: {op} failed: {e}", changeset.app);
                    let route = op.route().map(ToString::to_string).unwrap_or_default();
                    report
                        .warnings
                        .push(format!("Route {route} was unmapped but not deleted: {e}"));
                }
                Err(e) => {
                    error!("{e}");
                    report.failures.push(FailedOp::new(op, e));
                    report.skipped = changeset.ops[i + 1..].to_vec();
                    break;
                }
            }
        }

        if report.failures.is_empty() {
            if report.phase != AppPhase::Started {
                report.phase = AppPhase::Applied;
            }
            report.outcome = ApplyOutcome::FullyApplied;
        } else {
            report.phase = AppPhase::Failed;
            report.outcome = ApplyOutcome::PartiallyApplied;
        }

        report.finished_at = Utc::now();
        report
    }

    async fn apply_op(
        &self,
        app: &str,
        op: &ChangeOp,
        progress: &mut Progress,
        artifact: Option<&Artifact>,
        applied_before: usize,
    ) -> Result<(), ApplyError> {
        let failed = |cause: TransportError| ApplyError::OperationFailed {
            app: app.to_string(),
            operation: op.to_string(),
            cause,
            applied_before,
        };
        let app_guid = progress.app_guid.clone();
        let require_app = || {
            app_guid
                .as_deref()
                .ok_or_else(|| failed(TransportError::permanent("application does not exist")))
        };

        match op {
            ChangeOp::CreateApp { lifecycle } => {
                let record = self
                    .client
                    .create_app(self.scope, app, lifecycle)
                    .await
                    .map_err(&failed)?;
                progress.app_guid = Some(record.guid);
            }
            ChangeOp::Stop => self.client.stop(require_app()?).await.map_err(&failed)?,
            ChangeOp::SetBuildpacks { after, .. } => {
                let lifecycle = Lifecycle::Buildpack {
                    buildpacks: Some(after.clone()),
                };
                self.client
                    .set_lifecycle(require_app()?, &lifecycle)
                    .await
                    .map_err(&failed)?;
            }
            ChangeOp::SetDockerImage {
                image, username, ..
            } => {
                let lifecycle = Lifecycle::Docker {
                    image: image.clone(),
                    username: username.clone(),
                };
                self.client
                    .set_lifecycle(require_app()?, &lifecycle)
                    .await
                    .map_err(&failed)?;
            }
            ChangeOp::SetEnv { vars, .. } => self
                .client
                .set_env(require_app()?, vars)
                .await
                .map_err(&failed)?,
            ChangeOp::SetHealthCheck { after, .. } => self
                .client
                .set_health_check(require_app()?, after)
                .await
                .map_err(&failed)?,
            ChangeOp::Scale {
                dimension, after, ..
            } => self
                .client
                .scale(require_app()?, *dimension, *after)
                .await
                .map_err(&failed)?,
            ChangeOp::CreateRoute { route } => {
                let record = self
                    .client
                    .create_route(self.scope, route)
                    .await
                    .map_err(&failed)?;
                progress.created_routes.insert(route.clone(), record.guid);
            }
            ChangeOp::MapRoute { route, route_guid } => {
                let guid = route_guid
                    .as_ref()
                    .or_else(|| progress.created_routes.get(route))
                    .ok_or_else(|| failed(TransportError::permanent("route was not created")))?;
                self.client
                    .map_route(guid, require_app()?)
                    .await
                    .map_err(&failed)?;
            }
            ChangeOp::UnmapRoute { route_guid, .. } => self
                .client
                .unmap_route(route_guid, require_app()?)
                .await
                .map_err(&failed)?,
            ChangeOp::DeleteRoute { route_guid, .. } => {
                self.client.delete_route(route_guid).await.map_err(&failed)?;
            }
            ChangeOp::UploadBits { .. } => {
                let artifact = artifact
                    .ok_or_else(|| failed(TransportError::permanent("no artifact to upload")))?;
                let handle = self
                    .client
                    .upload_bits(require_app()?, artifact)
                    .await
                    .map_err(&failed)?;
                match self.poller().wait(&handle, self.settings.staging_timeout).await.map_err(&failed)? {
                    PollOutcome::Succeeded(package) => {
                        progress.package_guid = Some(package.unwrap_or_else(|| handle.id.clone()));
                    }
                    PollOutcome::Failed(reason) => {
                        return Err(failed(TransportError::permanent(reason)));
                    }
                    PollOutcome::TimedOut => {
                        return Err(ApplyError::StagingTimedOut {
                            app: app.to_string(),
                            job_id: handle.id,
                            timeout_secs: self.settings.staging_timeout.as_secs(),
                        });
                    }
                    PollOutcome::Cancelled => return Err(self.cancelled(app, op)),
                }
            }
            ChangeOp::Stage => {
                let package = progress
                    .package_guid
                    .as_deref()
                    .ok_or_else(|| failed(TransportError::permanent("no package to stage")))?;
                let handle = self.client.stage(package).await.map_err(&failed)?;
                match self.poller().wait(&handle, self.settings.staging_timeout).await.map_err(&failed)? {
                    PollOutcome::Succeeded(Some(droplet)) => {
                        debug!("{app}: staged droplet {droplet}");
                        self.client
                            .assign_droplet(require_app()?, &droplet)
                            .await
                            .map_err(&failed)?;
                    }
                    PollOutcome::Succeeded(None) => {
                        return Err(ApplyError::StagingFailed {
                            app: app.to_string(),
                            reason: String::from("staging produced no droplet"),
                        });
                    }
                    PollOutcome::Failed(reason) => {
                        return Err(ApplyError::StagingFailed {
                            app: app.to_string(),
                            reason,
                        });
                    }
                    PollOutcome::TimedOut => {
                        return Err(ApplyError::StagingTimedOut {
                            app: app.to_string(),
                            job_id: handle.id,
                            timeout_secs: self.settings.staging_timeout.as_secs(),
                        });
                    }
                    PollOutcome::Cancelled => return Err(self.cancelled(app, op)),
                }
            }
            ChangeOp::Start => {
                let handle = self.client.start(require_app()?).await.map_err(&failed)?;
                match self.poller().wait(&handle, self.settings.startup_timeout).await.map_err(&failed)? {
                    PollOutcome::Succeeded(_) => {}
                    PollOutcome::Failed(reason) => {
                        return Err(ApplyError::StartupFailed {
                            app: app.to_string(),
                            reason,
                        });
                    }
                    PollOutcome::TimedOut => {
                        return Err(ApplyError::StartupTimedOut {
                            app: app.to_string(),
                            timeout_secs: self.settings.startup_timeout.as_secs(),
                        });
                    }
                    PollOutcome::Cancelled => return Err(self.cancelled(app, op)),
                }
            }
        }

        Ok(())
    }

    fn poller(&self) -> JobPoller<'a> {
        JobPoller::new(
            self.client,
            self.settings.poll_interval,
            self.settings.retry,
            self.cancel.clone(),
        )
    }

    fn cancelled(&self, app: &str, op: &ChangeOp) -> ApplyError {
        debug!("{app}: wait for {op} interrupted");
        ApplyError::Cancelled {
            app: app.to_string(),
            operation: op.to_string(),
        }
    }
}
