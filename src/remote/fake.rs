//! In-memory control plane used by apply and push tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::artifact::Artifact;
use crate::config::{DomainInfo, DomainKind, HealthCheck, Lifecycle, RouteSpec, TargetRef};
use crate::error::TransportError;

use super::client::{RemoteClient, RemoteResult};
use super::types::{
    ApiInfo, AppRecord, AppState, JobHandle, JobKind, JobState, LifecycleRecord, PackageRecord,
    ProcessRecord, RouteRecord, ScaleDimension, SpaceScope,
};

pub(crate) struct FakeApp {
    pub guid: String,
    pub name: String,
    pub state: AppState,
    pub lifecycle: LifecycleRecord,
    pub env: BTreeMap<String, String>,
    pub process: ProcessRecord,
    pub package: Option<PackageRecord>,
    pub droplet: Option<String>,
}

pub(crate) struct FakeRoute {
    pub guid: String,
    pub route: RouteSpec,
    pub apps: Vec<String>,
}

#[derive(Default)]
pub(crate) struct FakeState {
    pub domains: Vec<DomainInfo>,
    pub apps: Vec<FakeApp>,
    pub routes: Vec<FakeRoute>,
    /// Every call in order, as `method detail`.
    pub calls: Vec<String>,
    /// Methods that fail with a permanent error.
    pub failing: Vec<&'static str>,
    /// Applications whose staging fails.
    pub failing_staging: Vec<String>,
    /// Applications whose staging never finishes.
    pub stuck_staging: Vec<String>,
    /// Refuse directory uploads like the HTTP client does.
    pub archives_only: bool,
    builds: Vec<(String, String)>,
    next_id: usize,
}

impl FakeState {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn app_mut(&mut self, guid: &str) -> RemoteResult<&mut FakeApp> {
        self.apps
            .iter_mut()
            .find(|a| a.guid == guid)
            .ok_or_else(|| TransportError::permanent(format!("app {guid} not found")))
    }

    fn record(app: &FakeApp) -> AppRecord {
        AppRecord {
            guid: app.guid.clone(),
            name: app.name.clone(),
            state: app.state,
            lifecycle: app.lifecycle.clone(),
        }
    }
}

/// A control plane held in memory.
pub(crate) struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    /// A platform with one HTTP domain `example.com`.
    pub fn new() -> Self {
        let state = FakeState {
            domains: vec![DomainInfo {
                guid: String::from("dom-1"),
                name: String::from("example.com"),
                kind: DomainKind::Http,
            }],
            ..FakeState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Calls whose method name starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(prefix))
            .count()
    }

    fn begin(&self, method: &'static str, detail: &str) -> RemoteResult<MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        state.calls.push(format!("{method} {detail}"));
        if state.failing.contains(&method) {
            return Err(TransportError::permanent(format!("{method} rejected")));
        }
        Ok(state)
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn api_info(&self) -> RemoteResult<ApiInfo> {
        let _state = self.begin("api_info", "")?;
        Ok(ApiInfo {
            version: String::from("3.150.0"),
        })
    }

    async fn list_domains(&self) -> RemoteResult<Vec<DomainInfo>> {
        let state = self.begin("list_domains", "")?;
        Ok(state.domains.clone())
    }

    async fn find_org(&self, name: &str) -> RemoteResult<Option<TargetRef>> {
        let _state = self.begin("find_org", name)?;
        Ok(Some(TargetRef {
            guid: format!("org-{name}"),
            name: name.to_string(),
        }))
    }

    async fn find_space(&self, org_guid: &str, name: &str) -> RemoteResult<Option<TargetRef>> {
        let _state = self.begin("find_space", org_guid)?;
        Ok(Some(TargetRef {
            guid: format!("space-{name}"),
            name: name.to_string(),
        }))
    }

    async fn find_app(&self, _scope: &SpaceScope, name: &str) -> RemoteResult<Option<AppRecord>> {
        let state = self.begin("find_app", name)?;
        Ok(state
            .apps
            .iter()
            .find(|a| a.name == name)
            .map(FakeState::record))
    }

    async fn app_process(&self, app_guid: &str) -> RemoteResult<Option<ProcessRecord>> {
        let mut state = self.begin("app_process", app_guid)?;
        Ok(Some(state.app_mut(app_guid)?.process.clone()))
    }

    async fn app_env(&self, app_guid: &str) -> RemoteResult<BTreeMap<String, String>> {
        let mut state = self.begin("app_env", app_guid)?;
        Ok(state.app_mut(app_guid)?.env.clone())
    }

    async fn app_routes(&self, app_guid: &str) -> RemoteResult<Vec<RouteRecord>> {
        let state = self.begin("app_routes", app_guid)?;
        Ok(state
            .routes
            .iter()
            .filter(|r| r.apps.iter().any(|a| a == app_guid))
            .map(|r| RouteRecord {
                guid: r.guid.clone(),
                route: r.route.clone(),
                other_destinations: r.apps.len() - 1,
            })
            .collect())
    }

    async fn find_route(
        &self,
        _scope: &SpaceScope,
        route: &RouteSpec,
    ) -> RemoteResult<Option<RouteRecord>> {
        let state = self.begin("find_route", &route.to_string())?;
        Ok(state
            .routes
            .iter()
            .find(|r| r.route == *route)
            .map(|r| RouteRecord {
                guid: r.guid.clone(),
                route: r.route.clone(),
                other_destinations: r.apps.len(),
            }))
    }

    async fn current_package(&self, app_guid: &str) -> RemoteResult<Option<PackageRecord>> {
        let mut state = self.begin("current_package", app_guid)?;
        Ok(state.app_mut(app_guid)?.package.clone())
    }

    async fn has_current_droplet(&self, app_guid: &str) -> RemoteResult<bool> {
        let mut state = self.begin("has_current_droplet", app_guid)?;
        Ok(state.app_mut(app_guid)?.droplet.is_some())
    }

    async fn create_app(
        &self,
        _scope: &SpaceScope,
        name: &str,
        lifecycle: &Lifecycle,
    ) -> RemoteResult<AppRecord> {
        let mut state = self.begin("create_app", name)?;
        let guid = state.id("app");
        let lifecycle = match lifecycle {
            Lifecycle::Buildpack { buildpacks } => {
                LifecycleRecord::Buildpacks(buildpacks.clone().unwrap_or_default())
            }
            Lifecycle::Docker { .. } => LifecycleRecord::Docker { image: None },
        };
        let app = FakeApp {
            guid: guid.clone(),
            name: name.to_string(),
            state: AppState::Stopped,
            lifecycle,
            env: BTreeMap::new(),
            process: ProcessRecord {
                guid: format!("proc-{guid}"),
                instances: 1,
                memory_mb: 1024,
                disk_mb: 1024,
                health_check: None,
            },
            package: None,
            droplet: None,
        };
        let record = FakeState::record(&app);
        state.apps.push(app);
        Ok(record)
    }

    async fn set_lifecycle(&self, app_guid: &str, lifecycle: &Lifecycle) -> RemoteResult<()> {
        let mut state = self.begin("set_lifecycle", app_guid)?;
        let package_guid = state.id("pkg");
        let app = state.app_mut(app_guid)?;
        match lifecycle {
            Lifecycle::Buildpack {
                buildpacks: Some(list),
            } => app.lifecycle = LifecycleRecord::Buildpacks(list.clone()),
            Lifecycle::Buildpack { buildpacks: None } => {}
            Lifecycle::Docker { image, .. } => {
                app.lifecycle = LifecycleRecord::Docker { image: None };
                app.package = Some(PackageRecord {
                    guid: package_guid,
                    digest: None,
                    image: Some(image.clone()),
                });
            }
        }
        Ok(())
    }

    async fn set_env(&self, app_guid: &str, env: &BTreeMap<String, String>) -> RemoteResult<()> {
        let mut state = self.begin("set_env", app_guid)?;
        let app = state.app_mut(app_guid)?;
        app.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn set_health_check(&self, app_guid: &str, check: &HealthCheck) -> RemoteResult<()> {
        let mut state = self.begin("set_health_check", app_guid)?;
        state.app_mut(app_guid)?.process.health_check = Some(check.clone());
        Ok(())
    }

    async fn scale(
        &self,
        app_guid: &str,
        dimension: ScaleDimension,
        value: u64,
    ) -> RemoteResult<()> {
        let mut state = self.begin("scale", &dimension.to_string())?;
        let process = &mut state.app_mut(app_guid)?.process;
        match dimension {
            ScaleDimension::Instances => {
                process.instances = u32::try_from(value)
                    .map_err(|_| TransportError::permanent("instances out of range"))?;
            }
            ScaleDimension::Memory => process.memory_mb = value,
            ScaleDimension::Disk => process.disk_mb = value,
        }
        Ok(())
    }

    async fn create_route(
        &self,
        _scope: &SpaceScope,
        route: &RouteSpec,
    ) -> RemoteResult<RouteRecord> {
        let mut state = self.begin("create_route", &route.to_string())?;
        if state.routes.iter().any(|r| r.route == *route) {
            return Err(TransportError::permanent("route already exists"));
        }
        let guid = state.id("route");
        state.routes.push(FakeRoute {
            guid: guid.clone(),
            route: route.clone(),
            apps: Vec::new(),
        });
        Ok(RouteRecord {
            guid,
            route: route.clone(),
            other_destinations: 0,
        })
    }

    async fn map_route(&self, route_guid: &str, app_guid: &str) -> RemoteResult<()> {
        let mut state = self.begin("map_route", route_guid)?;
        let route = state
            .routes
            .iter_mut()
            .find(|r| r.guid == route_guid)
            .ok_or_else(|| TransportError::permanent("route not found"))?;
        route.apps.push(app_guid.to_string());
        Ok(())
    }

    async fn unmap_route(&self, route_guid: &str, app_guid: &str) -> RemoteResult<()> {
        let mut state = self.begin("unmap_route", route_guid)?;
        if let Some(route) = state.routes.iter_mut().find(|r| r.guid == route_guid) {
            route.apps.retain(|a| a != app_guid);
        }
        Ok(())
    }

    async fn delete_route(&self, route_guid: &str) -> RemoteResult<()> {
        let mut state = self.begin("delete_route", route_guid)?;
        state.routes.retain(|r| r.guid != route_guid);
        Ok(())
    }

    fn uploads_directories(&self) -> bool {
        !self.lock().archives_only
    }

    async fn upload_bits(&self, app_guid: &str, artifact: &Artifact) -> RemoteResult<JobHandle> {
        let mut state = self.begin("upload_bits", app_guid)?;
        let guid = state.id("pkg");
        state.app_mut(app_guid)?.package = Some(PackageRecord {
            guid: guid.clone(),
            digest: Some(artifact.digest.clone()),
            image: None,
        });
        Ok(JobHandle::new(
            guid.clone(),
            format!("/v3/packages/{guid}"),
            JobKind::Package,
        ))
    }

    async fn stage(&self, package_guid: &str) -> RemoteResult<JobHandle> {
        let mut state = self.begin("stage", package_guid)?;
        let app_guid = state
            .apps
            .iter()
            .find(|a| a.package.as_ref().is_some_and(|p| p.guid == package_guid))
            .map(|a| a.guid.clone())
            .ok_or_else(|| TransportError::permanent("package not found"))?;
        let build = state.id("build");
        state.builds.push((build.clone(), app_guid));
        Ok(JobHandle::new(
            build.clone(),
            format!("/v3/builds/{build}"),
            JobKind::Build,
        ))
    }

    async fn assign_droplet(&self, app_guid: &str, droplet_guid: &str) -> RemoteResult<()> {
        let mut state = self.begin("assign_droplet", droplet_guid)?;
        state.app_mut(app_guid)?.droplet = Some(droplet_guid.to_string());
        Ok(())
    }

    async fn start(&self, app_guid: &str) -> RemoteResult<JobHandle> {
        let mut state = self.begin("start", app_guid)?;
        state.app_mut(app_guid)?.state = AppState::Started;
        Ok(JobHandle::new(
            app_guid,
            format!("/v3/apps/{app_guid}/processes/web/stats"),
            JobKind::Startup,
        ))
    }

    async fn stop(&self, app_guid: &str) -> RemoteResult<()> {
        let mut state = self.begin("stop", app_guid)?;
        state.app_mut(app_guid)?.state = AppState::Stopped;
        Ok(())
    }

    async fn poll_job(&self, handle: &JobHandle) -> RemoteResult<JobState> {
        let mut state = self.begin("poll_job", &handle.id)?;
        match handle.kind {
            JobKind::Build => {
                let app_guid = state
                    .builds
                    .iter()
                    .find(|(build, _)| *build == handle.id)
                    .map(|(_, app)| app.clone())
                    .ok_or_else(|| TransportError::permanent("build not found"))?;
                let name = state.app_mut(&app_guid)?.name.clone();
                if state.stuck_staging.contains(&name) {
                    return Ok(JobState::Running);
                }
                if state.failing_staging.contains(&name) {
                    return Ok(JobState::Failed {
                        reason: String::from("BuildpackCompileFailed"),
                    });
                }
                Ok(JobState::Succeeded {
                    resource: Some(format!("droplet-{}", handle.id)),
                })
            }
            JobKind::Package => Ok(JobState::Succeeded {
                resource: Some(handle.id.clone()),
            }),
            JobKind::Job | JobKind::Startup => Ok(JobState::Succeeded { resource: None }),
        }
    }
}
