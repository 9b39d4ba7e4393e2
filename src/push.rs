//! Push orchestration.
//!
//! A push checks the command's requirements, resolves the desired state of
//! every application, then handles each application in its own task:
//! observe, plan, and apply (or stop after planning on a dry run). One
//! application's failure never stops the others.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::artifact::{Artifact, ArtifactKind};
use crate::config::{
    ApplicationSpec, ApplySettings, DesiredStateResolver, Manifest, ManifestLoader, PushFlags,
    RouteSet, Session, find_manifest,
};
use crate::error::{ConfigError, PushError, Result};
use crate::planner::{AppReport, ApplyExecutor, ChangeOp, ChangeSet, DiffPlanner};
use crate::remote::{ActualState, LifecycleRecord, RemoteClient, SpaceScope, StateObserver};
use crate::requirements::{CommandArgs, CommandMetadata, RequirementContext, RequirementFactory};

/// Inputs of a push besides the session.
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Command-line overrides, including the application name argument.
    pub flags: PushFlags,
    /// Manifest file or directory given with `-f`.
    pub manifest: Option<PathBuf>,
    /// Plan only.
    pub dry_run: bool,
    /// Directory used to find a manifest and as the default application path.
    pub working_dir: PathBuf,
}

/// Result of a push across all applications, in manifest order.
#[derive(Debug, Clone, Serialize)]
pub struct PushReport {
    /// Per-application reports.
    pub apps: Vec<AppReport>,
    /// Requirement and resolution warnings.
    pub warnings: Vec<String>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

impl PushReport {
    /// Returns true if every application succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.apps.iter().all(AppReport::is_success)
    }

    /// Process exit code: 0 on full success, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.is_success())
    }
}

/// Runs pushes and direct lifecycle commands.
pub struct Pusher {
    /// Shared control plane client.
    client: Arc<dyn RemoteClient>,
    /// Apply tunables.
    settings: ApplySettings,
    /// Interrupt signal.
    cancel: CancellationToken,
}

impl Pusher {
    /// Creates a pusher.
    #[must_use]
    pub fn new(
        client: Arc<dyn RemoteClient>,
        settings: ApplySettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            settings,
            cancel,
        }
    }

    /// Pushes every resolved application.
    ///
    /// # Errors
    ///
    /// Returns an error for failures before any mutation: unmet requirements,
    /// unreadable manifests, unresolvable desired state, or an unreachable
    /// control plane. Per-application failures are reported in the result.
    pub async fn push(&self, session: &Session, options: &PushOptions) -> Result<PushReport> {
        let args = CommandArgs::new(options.flags.app_name.iter().cloned().collect(), Vec::new());
        let ctx = RequirementContext::online(session, self.client.as_ref(), self.settings.retry);
        let mut warnings = RequirementFactory::for_command(&CommandMetadata::push(), &args)
            .execute(&ctx)
            .await?;
        let scope = target_scope(session)?;

        let (manifest, base_dir) = load_manifest(options)?;
        let observer = StateObserver::new(self.client.as_ref(), self.settings.retry);
        let defaults = observer.platform_defaults().await?;
        let resolution =
            DesiredStateResolver::new(&defaults).resolve(manifest.as_ref(), &options.flags)?;
        for warning in resolution.warnings {
            if !warnings.contains(&warning) {
                warnings.push(warning);
            }
        }

        info!(
            "Pushing {} application(s) to space '{}'{}",
            resolution.specs.len(),
            scope.space_name,
            if options.dry_run { " (dry run)" } else { "" }
        );

        let names: Vec<String> = resolution.specs.iter().map(|s| s.name.clone()).collect();
        let mut tasks = JoinSet::new();
        for (index, spec) in resolution.specs.into_iter().enumerate() {
            let client = Arc::clone(&self.client);
            let scope = scope.clone();
            let settings = self.settings;
            let cancel = self.cancel.clone();
            let base_dir = base_dir.clone();
            let dry_run = options.dry_run;
            tasks.spawn(async move {
                let report =
                    push_app(client.as_ref(), &scope, &spec, &base_dir, settings, cancel, dry_run)
                        .await;
                (index, report)
            });
        }

        let mut slots: Vec<Option<AppReport>> = vec![None; names.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => error!("Application task aborted: {e}"),
            }
        }

        let apps = names
            .into_iter()
            .zip(slots)
            .map(|(name, slot)| {
                slot.unwrap_or_else(|| AppReport::rejected(name, "application task aborted"))
            })
            .collect();

        Ok(PushReport {
            apps,
            warnings,
            dry_run: options.dry_run,
        })
    }

    /// Starts an existing application, staging it first if it has no droplet.
    ///
    /// # Errors
    ///
    /// Returns an error if a requirement is unmet or the application cannot be observed.
    pub async fn start(&self, session: &Session, name: &str) -> Result<AppReport> {
        let (scope, actual, mut warnings) =
            self.prepare_lifecycle(session, name, &CommandMetadata::start()).await?;

        let mut changeset = ChangeSet::empty(name, false);
        if !actual.is_started() {
            let docker = matches!(
                actual.app.as_ref().map(|a| &a.lifecycle),
                Some(LifecycleRecord::Docker { .. })
            );
            if !actual.has_droplet && !docker {
                changeset.stage_before_start = true;
                changeset.ops.push(ChangeOp::Stage);
            }
            changeset.ops.push(ChangeOp::Start);
        }

        let mut report = ApplyExecutor::new(
            self.client.as_ref(),
            &scope,
            self.settings,
            self.cancel.clone(),
        )
        .apply(&changeset, &actual, None)
        .await;
        warnings.append(&mut report.warnings);
        report.warnings = warnings;
        Ok(report)
    }

    /// Stops an existing application.
    ///
    /// # Errors
    ///
    /// Returns an error if a requirement is unmet or the application cannot be observed.
    pub async fn stop(&self, session: &Session, name: &str) -> Result<AppReport> {
        let (scope, actual, mut warnings) =
            self.prepare_lifecycle(session, name, &CommandMetadata::stop()).await?;

        let changeset = if actual.is_started() {
            ChangeSet::lifecycle_command(name, ChangeOp::Stop)
        } else {
            ChangeSet::empty(name, false)
        };

        let mut report = ApplyExecutor::new(
            self.client.as_ref(),
            &scope,
            self.settings,
            self.cancel.clone(),
        )
        .apply(&changeset, &actual, None)
        .await;
        warnings.append(&mut report.warnings);
        report.warnings = warnings;
        Ok(report)
    }

    async fn prepare_lifecycle(
        &self,
        session: &Session,
        name: &str,
        meta: &CommandMetadata,
    ) -> Result<(SpaceScope, ActualState, Vec<String>)> {
        let args = CommandArgs::new(vec![name.to_string()], Vec::new());
        let ctx = RequirementContext::online(session, self.client.as_ref(), self.settings.retry);
        let warnings = RequirementFactory::for_command(meta, &args)
            .execute(&ctx)
            .await?;
        let scope = target_scope(session)?;

        let spec = ApplicationSpec::new(name, RouteSet::no_route());
        let actual = StateObserver::new(self.client.as_ref(), self.settings.retry)
            .observe(&scope, &spec)
            .await?;
        Ok((scope, actual, warnings))
    }
}

fn target_scope(session: &Session) -> Result<SpaceScope> {
    SpaceScope::from_session(session)
        .ok_or_else(|| PushError::internal("session has no targeted space"))
}

/// Loads the manifest to use, with the directory relative paths resolve against.
fn load_manifest(options: &PushOptions) -> Result<(Option<Manifest>, PathBuf)> {
    let path = match &options.manifest {
        Some(dir) if dir.is_dir() => Some(
            find_manifest(dir).ok_or_else(|| ConfigError::FileNotFound { path: dir.clone() })?,
        ),
        Some(path) => Some(path.clone()),
        None => find_manifest(&options.working_dir),
    };

    let Some(path) = path else {
        return Ok((None, options.working_dir.clone()));
    };
    let manifest = ManifestLoader::new().load_file(&path)?;
    let base_dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| options.working_dir.clone(), Path::to_path_buf);
    Ok((Some(manifest), base_dir))
}

/// Observes, plans and applies one application.
async fn push_app(
    client: &dyn RemoteClient,
    scope: &SpaceScope,
    spec: &ApplicationSpec,
    base_dir: &Path,
    settings: ApplySettings,
    cancel: CancellationToken,
    dry_run: bool,
) -> AppReport {
    let artifact = if spec.is_docker() {
        None
    } else {
        let path = spec
            .path
            .as_ref()
            .map_or_else(|| base_dir.to_path_buf(), |p| base_dir.join(p));
        match Artifact::load(path).await {
            Ok(artifact)
                if artifact.kind == ArtifactKind::Directory && !client.uploads_directories() =>
            {
                warn!("'{}': {} is a directory", spec.name, artifact.path.display());
                return AppReport::rejected(
                    &spec.name,
                    format!(
                        "{} is a directory; the application path must be a zip archive",
                        artifact.path.display()
                    ),
                );
            }
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!("'{}': cannot read application bits: {e}", spec.name);
                return AppReport::rejected(&spec.name, format!("Cannot read application bits: {e}"));
            }
        }
    };

    let actual = match StateObserver::new(client, settings.retry).observe(scope, spec).await {
        Ok(actual) => actual,
        Err(e) => {
            warn!("'{}': cannot fetch current state: {e}", spec.name);
            return AppReport::rejected(&spec.name, format!("Cannot fetch current state: {e}"));
        }
    };

    let changeset = DiffPlanner::new().plan(
        spec,
        &actual,
        artifact.as_ref().map(|a| a.digest.as_str()),
    );

    if dry_run {
        return AppReport::planned(changeset);
    }

    ApplyExecutor::new(client, scope, settings, cancel)
        .apply(&changeset, &actual, artifact.as_ref())
        .await
}
