//! Control plane client.
//!
//! [`RemoteClient`] is the capability surface the planner's operations are
//! applied through. [`HttpRemoteClient`] implements it over the v3 REST API.
//! Every call is a single attempt; retrying is left to callers that know
//! whether the call is idempotent.

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode, header, multipart};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::artifact::{Artifact, ArtifactKind};
use crate::config::{
    DomainInfo, DomainKind, HealthCheck, HealthCheckType, Lifecycle, RouteSpec, TargetRef,
};
use crate::error::{PushError, Result, TransportError};

use super::types::{
    ApiInfo, AppRecord, AppState, JobHandle, JobKind, JobState, LifecycleRecord, PackageRecord,
    ProcessRecord, RouteRecord, ScaleDimension, SpaceScope,
};

/// Result of a single remote call.
pub type RemoteResult<T> = std::result::Result<T, TransportError>;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Header carrying the per-request correlation id.
const REQUEST_ID_HEADER: &str = "X-Vcap-Request-Id";

/// Capability surface of the control plane.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetches the API information.
    async fn api_info(&self) -> RemoteResult<ApiInfo>;

    /// Lists the domains visible to the user.
    async fn list_domains(&self) -> RemoteResult<Vec<DomainInfo>>;

    /// Finds an organization by name.
    async fn find_org(&self, name: &str) -> RemoteResult<Option<TargetRef>>;

    /// Finds a space by name within an organization.
    async fn find_space(&self, org_guid: &str, name: &str) -> RemoteResult<Option<TargetRef>>;

    /// Finds an application by name within a space.
    async fn find_app(&self, scope: &SpaceScope, name: &str) -> RemoteResult<Option<AppRecord>>;

    /// Fetches the web process of an application.
    async fn app_process(&self, app_guid: &str) -> RemoteResult<Option<ProcessRecord>>;

    /// Fetches the user-provided environment variables.
    async fn app_env(&self, app_guid: &str) -> RemoteResult<BTreeMap<String, String>>;

    /// Fetches the routes mapped to an application.
    async fn app_routes(&self, app_guid: &str) -> RemoteResult<Vec<RouteRecord>>;

    /// Finds an existing route in the space.
    async fn find_route(
        &self,
        scope: &SpaceScope,
        route: &RouteSpec,
    ) -> RemoteResult<Option<RouteRecord>>;

    /// Fetches the most recent package of an application.
    async fn current_package(&self, app_guid: &str) -> RemoteResult<Option<PackageRecord>>;

    /// Returns true if the application has a current droplet.
    async fn has_current_droplet(&self, app_guid: &str) -> RemoteResult<bool>;

    /// Creates an application.
    async fn create_app(
        &self,
        scope: &SpaceScope,
        name: &str,
        lifecycle: &Lifecycle,
    ) -> RemoteResult<AppRecord>;

    /// Replaces the application's lifecycle (buildpacks or docker image).
    async fn set_lifecycle(&self, app_guid: &str, lifecycle: &Lifecycle) -> RemoteResult<()>;

    /// Sets environment variables, leaving unnamed ones untouched.
    async fn set_env(&self, app_guid: &str, env: &BTreeMap<String, String>) -> RemoteResult<()>;

    /// Replaces the web process health check.
    async fn set_health_check(&self, app_guid: &str, check: &HealthCheck) -> RemoteResult<()>;

    /// Scales one dimension of the web process.
    async fn scale(
        &self,
        app_guid: &str,
        dimension: ScaleDimension,
        value: u64,
    ) -> RemoteResult<()>;

    /// Creates a route in the space.
    async fn create_route(
        &self,
        scope: &SpaceScope,
        route: &RouteSpec,
    ) -> RemoteResult<RouteRecord>;

    /// Maps a route to an application.
    async fn map_route(&self, route_guid: &str, app_guid: &str) -> RemoteResult<()>;

    /// Unmaps a route from an application.
    async fn unmap_route(&self, route_guid: &str, app_guid: &str) -> RemoteResult<()>;

    /// Deletes a route.
    async fn delete_route(&self, route_guid: &str) -> RemoteResult<()>;

    /// Uploads application bits; the job yields the package GUID.
    async fn upload_bits(&self, app_guid: &str, artifact: &Artifact) -> RemoteResult<JobHandle>;

    /// Whether `upload_bits` accepts unarchived directories.
    fn uploads_directories(&self) -> bool {
        false
    }

    /// Stages a package; the job yields the droplet GUID.
    async fn stage(&self, package_guid: &str) -> RemoteResult<JobHandle>;

    /// Makes a droplet the application's current one.
    async fn assign_droplet(&self, app_guid: &str, droplet_guid: &str) -> RemoteResult<()>;

    /// Starts an application; the job tracks instance startup.
    async fn start(&self, app_guid: &str) -> RemoteResult<JobHandle>;

    /// Stops an application.
    async fn stop(&self, app_guid: &str) -> RemoteResult<()>;

    /// Polls an asynchronous operation once.
    async fn poll_job(&self, handle: &JobHandle) -> RemoteResult<JobState>;
}

/// HTTP implementation of [`RemoteClient`].
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    /// HTTP client.
    client: Client,
    /// API endpoint without trailing slash.
    endpoint: String,
    /// Bearer token.
    token: Option<String>,
}

impl HttpRemoteClient {
    /// Creates a client for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        Self::with_timeout(endpoint, token, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(endpoint: &str, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PushError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Sends a request and classifies non-success statuses.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> RemoteResult<Response> {
        let url = format!("{}{path}", self.endpoint);
        let request_id = Uuid::new_v4().to_string();
        trace!("{method} {url} ({request_id})");

        let mut request = self
            .client
            .request(method, url.as_str())
            .query(query)
            .header(REQUEST_ID_HEADER, request_id);
        if let Some(token) = &self.token {
            request = request.header(header::AUTHORIZATION, format!("bearer {token}"));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        check_status(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> RemoteResult<T> {
        let response = self.send(Method::GET, path, query, None).await?;
        response.json().await.map_err(map_reqwest_error)
    }

    /// GET that maps 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> RemoteResult<Option<T>> {
        match self.get(path, &[]).await {
            Ok(value) => Ok(Some(value)),
            Err(TransportError::Permanent {
                status: Some(404), ..
            }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Value,
    ) -> RemoteResult<T> {
        let response = self.send(method, path, &[], Some(body)).await?;
        response.json().await.map_err(map_reqwest_error)
    }

    async fn send_unit(&self, method: Method, path: &str, body: Option<Value>) -> RemoteResult<()> {
        self.send(method, path, &[], body).await.map(|_| ())
    }

    async fn domain_by_name(&self, name: &str) -> RemoteResult<V3Domain> {
        let page: Page<V3Domain> = self.get("/v3/domains", &[("names", name)]).await?;
        page.resources
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::permanent(format!("domain '{name}' not found")))
    }

    async fn list_routes(&self, path: &str, query: &[(&str, &str)]) -> RemoteResult<Vec<(V3Route, String)>> {
        let mut query = query.to_vec();
        query.push(("include", "domain"));
        let page: Page<V3Route> = self.get(path, &query).await?;
        let domains = page.included.map(|i| i.domains).unwrap_or_default();

        Ok(page
            .resources
            .into_iter()
            .filter_map(|route| {
                let domain = domains
                    .iter()
                    .find(|d| d.guid == route.relationships.domain.data.guid)?
                    .name
                    .clone();
                Some((route, domain))
            })
            .collect())
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn api_info(&self) -> RemoteResult<ApiInfo> {
        let root: V3Root = self.get("/", &[]).await?;
        let version = root
            .links
            .cloud_controller_v3
            .map(|link| link.meta.version)
            .ok_or_else(|| TransportError::permanent("endpoint does not expose a v3 API"))?;
        Ok(ApiInfo { version })
    }

    async fn list_domains(&self) -> RemoteResult<Vec<DomainInfo>> {
        let page: Page<V3Domain> = self.get("/v3/domains", &[("per_page", "5000")]).await?;
        Ok(page.resources.into_iter().map(V3Domain::into_info).collect())
    }

    async fn find_org(&self, name: &str) -> RemoteResult<Option<TargetRef>> {
        let page: Page<V3Named> = self.get("/v3/organizations", &[("names", name)]).await?;
        Ok(page.resources.into_iter().next().map(V3Named::into_target))
    }

    async fn find_space(&self, org_guid: &str, name: &str) -> RemoteResult<Option<TargetRef>> {
        let page: Page<V3Named> = self
            .get("/v3/spaces", &[("names", name), ("organization_guids", org_guid)])
            .await?;
        Ok(page.resources.into_iter().next().map(V3Named::into_target))
    }

    async fn find_app(&self, scope: &SpaceScope, name: &str) -> RemoteResult<Option<AppRecord>> {
        let page: Page<V3App> = self
            .get("/v3/apps", &[("names", name), ("space_guids", scope.space_guid.as_str())])
            .await?;
        Ok(page.resources.into_iter().next().map(V3App::into_record))
    }

    async fn app_process(&self, app_guid: &str) -> RemoteResult<Option<ProcessRecord>> {
        let process: Option<V3Process> = self
            .get_optional(&format!("/v3/apps/{app_guid}/processes/web"))
            .await?;
        Ok(process.map(V3Process::into_record))
    }

    async fn app_env(&self, app_guid: &str) -> RemoteResult<BTreeMap<String, String>> {
        let env: V3Env = self
            .get(&format!("/v3/apps/{app_guid}/environment_variables"), &[])
            .await?;
        Ok(env
            .var
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::Null => None,
                Value::String(s) => Some((k, s)),
                other => Some((k, other.to_string())),
            })
            .collect())
    }

    async fn app_routes(&self, app_guid: &str) -> RemoteResult<Vec<RouteRecord>> {
        let routes = self.list_routes(&format!("/v3/apps/{app_guid}/routes"), &[]).await?;
        Ok(routes
            .into_iter()
            .map(|(route, domain)| route.into_record(domain, Some(app_guid)))
            .collect())
    }

    async fn find_route(
        &self,
        scope: &SpaceScope,
        route: &RouteSpec,
    ) -> RemoteResult<Option<RouteRecord>> {
        let host = route.host.clone().unwrap_or_default();
        let path = route.path.clone().unwrap_or_default();
        let port = route.port.map(|p| p.to_string());

        let mut query = vec![
            ("space_guids", scope.space_guid.as_str()),
            ("hosts", host.as_str()),
            ("paths", path.as_str()),
        ];
        if let Some(port) = &port {
            query.push(("ports", port.as_str()));
        }

        let routes = self.list_routes("/v3/routes", &query).await?;
        Ok(routes
            .into_iter()
            .map(|(found, domain)| found.into_record(domain, None))
            .find(|record| record.route == *route))
    }

    async fn current_package(&self, app_guid: &str) -> RemoteResult<Option<PackageRecord>> {
        let page: Page<V3Package> = self
            .get(
                &format!("/v3/apps/{app_guid}/packages"),
                &[("order_by", "-created_at"), ("per_page", "1")],
            )
            .await?;
        Ok(page.resources.into_iter().next().map(|p| PackageRecord {
            guid: p.guid,
            digest: p.data.checksum.and_then(|c| c.value),
            image: p.data.image,
        }))
    }

    async fn has_current_droplet(&self, app_guid: &str) -> RemoteResult<bool> {
        let droplet: Option<V3Guid> = self
            .get_optional(&format!("/v3/apps/{app_guid}/droplets/current"))
            .await?;
        Ok(droplet.is_some())
    }

    async fn create_app(
        &self,
        scope: &SpaceScope,
        name: &str,
        lifecycle: &Lifecycle,
    ) -> RemoteResult<AppRecord> {
        debug!("Creating app {name} in space {}", scope.space_name);
        let body = json!({
            "name": name,
            "lifecycle": lifecycle_body(lifecycle),
            "relationships": { "space": { "data": { "guid": scope.space_guid } } },
        });
        let app: V3App = self.send_json(Method::POST, "/v3/apps", body).await?;
        Ok(app.into_record())
    }

    async fn set_lifecycle(&self, app_guid: &str, lifecycle: &Lifecycle) -> RemoteResult<()> {
        let body = json!({ "lifecycle": lifecycle_body(lifecycle) });
        self.send_unit(Method::PATCH, &format!("/v3/apps/{app_guid}"), Some(body))
            .await?;

        if let Lifecycle::Docker { image, username } = lifecycle {
            let mut data = json!({ "image": image });
            if let Some(username) = username {
                data["username"] = json!(username);
            }
            let body = json!({
                "type": "docker",
                "data": data,
                "relationships": { "app": { "data": { "guid": app_guid } } },
            });
            self.send_unit(Method::POST, "/v3/packages", Some(body)).await?;
        }
        Ok(())
    }

    async fn set_env(&self, app_guid: &str, env: &BTreeMap<String, String>) -> RemoteResult<()> {
        let body = json!({ "var": env });
        self.send_unit(
            Method::PATCH,
            &format!("/v3/apps/{app_guid}/environment_variables"),
            Some(body),
        )
        .await
    }

    async fn set_health_check(&self, app_guid: &str, check: &HealthCheck) -> RemoteResult<()> {
        let mut data = json!({});
        if let Some(endpoint) = &check.endpoint {
            data["endpoint"] = json!(endpoint);
        }
        let body = json!({ "health_check": { "type": check.check_type.to_string(), "data": data } });
        self.send_unit(
            Method::PATCH,
            &format!("/v3/apps/{app_guid}/processes/web"),
            Some(body),
        )
        .await
    }

    async fn scale(
        &self,
        app_guid: &str,
        dimension: ScaleDimension,
        value: u64,
    ) -> RemoteResult<()> {
        let field = match dimension {
            ScaleDimension::Instances => "instances",
            ScaleDimension::Memory => "memory_in_mb",
            ScaleDimension::Disk => "disk_in_mb",
        };
        let mut body = serde_json::Map::new();
        body.insert(field.to_string(), json!(value));
        let body = Value::Object(body);
        self.send_unit(
            Method::POST,
            &format!("/v3/apps/{app_guid}/processes/web/actions/scale"),
            Some(body),
        )
        .await
    }

    async fn create_route(
        &self,
        scope: &SpaceScope,
        route: &RouteSpec,
    ) -> RemoteResult<RouteRecord> {
        let domain = self.domain_by_name(&route.domain).await?;
        let mut body = json!({
            "relationships": {
                "space": { "data": { "guid": scope.space_guid } },
                "domain": { "data": { "guid": domain.guid } },
            }
        });
        if let Some(host) = &route.host {
            body["host"] = json!(host);
        }
        if let Some(path) = &route.path {
            body["path"] = json!(path);
        }
        if let Some(port) = route.port {
            body["port"] = json!(port);
        }

        let created: V3Route = self.send_json(Method::POST, "/v3/routes", body).await?;
        Ok(created.into_record(domain.name, None))
    }

    async fn map_route(&self, route_guid: &str, app_guid: &str) -> RemoteResult<()> {
        let body = json!({ "destinations": [ { "app": { "guid": app_guid } } ] });
        self.send_unit(
            Method::POST,
            &format!("/v3/routes/{route_guid}/destinations"),
            Some(body),
        )
        .await
    }

    async fn unmap_route(&self, route_guid: &str, app_guid: &str) -> RemoteResult<()> {
        let destinations: V3Destinations = self
            .get(&format!("/v3/routes/{route_guid}/destinations"), &[])
            .await?;
        for destination in destinations
            .destinations
            .iter()
            .filter(|d| d.app.guid == app_guid)
        {
            self.send_unit(
                Method::DELETE,
                &format!("/v3/routes/{route_guid}/destinations/{}", destination.guid),
                None,
            )
            .await?;
        }
        Ok(())
    }

    async fn delete_route(&self, route_guid: &str) -> RemoteResult<()> {
        self.send_unit(Method::DELETE, &format!("/v3/routes/{route_guid}"), None)
            .await
    }

    async fn upload_bits(&self, app_guid: &str, artifact: &Artifact) -> RemoteResult<JobHandle> {
        if artifact.kind == ArtifactKind::Directory {
            return Err(TransportError::permanent(format!(
                "{} is a directory; bits must be archived before upload",
                artifact.path.display()
            )));
        }

        let bytes = tokio::fs::read(&artifact.path)
            .await
            .map_err(|e| TransportError::permanent(format!("cannot read artifact: {e}")))?;

        let body = json!({
            "type": "bits",
            "relationships": { "app": { "data": { "guid": app_guid } } },
        });
        let package: V3Package = self.send_json(Method::POST, "/v3/packages", body).await?;

        let form = multipart::Form::new().part(
            "bits",
            multipart::Part::bytes(bytes).file_name(String::from("application.zip")),
        );
        let url = format!("{}/v3/packages/{}/upload", self.endpoint, package.guid);
        let mut request = self
            .client
            .post(url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
            .multipart(form);
        if let Some(token) = &self.token {
            request = request.header(header::AUTHORIZATION, format!("bearer {token}"));
        }
        let response = request.send().await.map_err(map_reqwest_error)?;
        check_status(response).await?;

        debug!("Uploaded {} as package {}", artifact.path.display(), package.guid);
        Ok(JobHandle::new(
            package.guid.clone(),
            format!("/v3/packages/{}", package.guid),
            JobKind::Package,
        ))
    }

    async fn stage(&self, package_guid: &str) -> RemoteResult<JobHandle> {
        let body = json!({ "package": { "guid": package_guid } });
        let build: V3Build = self.send_json(Method::POST, "/v3/builds", body).await?;
        Ok(JobHandle::new(
            build.guid.clone(),
            format!("/v3/builds/{}", build.guid),
            JobKind::Build,
        ))
    }

    async fn assign_droplet(&self, app_guid: &str, droplet_guid: &str) -> RemoteResult<()> {
        let body = json!({ "data": { "guid": droplet_guid } });
        self.send_unit(
            Method::PATCH,
            &format!("/v3/apps/{app_guid}/relationships/current_droplet"),
            Some(body),
        )
        .await
    }

    async fn start(&self, app_guid: &str) -> RemoteResult<JobHandle> {
        self.send_unit(Method::POST, &format!("/v3/apps/{app_guid}/actions/start"), None)
            .await?;
        Ok(JobHandle::new(
            app_guid,
            format!("/v3/apps/{app_guid}/processes/web/stats"),
            JobKind::Startup,
        ))
    }

    async fn stop(&self, app_guid: &str) -> RemoteResult<()> {
        self.send_unit(Method::POST, &format!("/v3/apps/{app_guid}/actions/stop"), None)
            .await
    }

    async fn poll_job(&self, handle: &JobHandle) -> RemoteResult<JobState> {
        let state = match handle.kind {
            JobKind::Package => {
                let package: V3Package = self.get(&handle.poll_url, &[]).await?;
                match package.state.as_str() {
                    "READY" => JobState::Succeeded {
                        resource: Some(package.guid),
                    },
                    "FAILED" | "EXPIRED" => JobState::Failed {
                        reason: format!("package {}", package.state.to_lowercase()),
                    },
                    _ => JobState::Running,
                }
            }
            JobKind::Build => {
                let build: V3Build = self.get(&handle.poll_url, &[]).await?;
                match build.state.as_str() {
                    "STAGED" => JobState::Succeeded {
                        resource: build.droplet.map(|d| d.guid),
                    },
                    "FAILED" => JobState::Failed {
                        reason: build.error.unwrap_or_else(|| String::from("staging failed")),
                    },
                    _ => JobState::Running,
                }
            }
            JobKind::Job => {
                let job: V3Job = self.get(&handle.poll_url, &[]).await?;
                match job.state.as_str() {
                    "COMPLETE" => JobState::Succeeded { resource: None },
                    "FAILED" => JobState::Failed {
                        reason: job
                            .errors
                            .into_iter()
                            .next()
                            .map_or_else(|| String::from("job failed"), |e| e.detail),
                    },
                    _ => JobState::Running,
                }
            }
            JobKind::Startup => {
                let stats: Page<V3Instance> = self.get(&handle.poll_url, &[]).await?;
                classify_startup(&stats.resources)
            }
        };
        trace!("Polled {} {}: {state:?}", handle.kind, handle.id);
        Ok(state)
    }
}

fn classify_startup(instances: &[V3Instance]) -> JobState {
    if instances.iter().any(|i| i.state == "RUNNING") {
        JobState::Succeeded { resource: None }
    } else if !instances.is_empty() && instances.iter().all(|i| i.state == "CRASHED") {
        JobState::Failed {
            reason: String::from("all instances crashed"),
        }
    } else {
        JobState::Running
    }
}

fn lifecycle_body(lifecycle: &Lifecycle) -> Value {
    match lifecycle {
        Lifecycle::Buildpack { buildpacks } => json!({
            "type": "buildpack",
            "data": { "buildpacks": buildpacks.clone().unwrap_or_default() },
        }),
        Lifecycle::Docker { .. } => json!({ "type": "docker", "data": {} }),
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_decode() {
        TransportError::permanent(format!("invalid response: {e}"))
    } else if e.is_builder() {
        TransportError::permanent(format!("invalid request: {e}"))
    } else {
        TransportError::transient(format!("request failed: {e}"))
    }
}

async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<V3Errors>(&body)
        .ok()
        .and_then(|e| e.errors.into_iter().next())
        .map_or_else(|| status_text(status), |e| e.detail);
    Err(TransportError::from_status(status.as_u16(), message))
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map_or_else(|| status.as_str().to_string(), str::to_string)
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    resources: Vec<T>,
    #[serde(default)]
    included: Option<Included>,
}

#[derive(Debug, Deserialize)]
struct Included {
    #[serde(default)]
    domains: Vec<V3Domain>,
}

#[derive(Debug, Deserialize)]
struct V3Guid {
    guid: String,
}

#[derive(Debug, Deserialize)]
struct V3Named {
    guid: String,
    name: String,
}

impl V3Named {
    fn into_target(self) -> TargetRef {
        TargetRef {
            guid: self.guid,
            name: self.name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct V3Domain {
    guid: String,
    name: String,
    #[serde(default)]
    supported_protocols: Vec<String>,
}

impl V3Domain {
    fn into_info(self) -> DomainInfo {
        let kind = if self.supported_protocols.iter().any(|p| p == "tcp") {
            DomainKind::Tcp
        } else {
            DomainKind::Http
        };
        DomainInfo {
            guid: self.guid,
            name: self.name,
            kind,
        }
    }
}

#[derive(Debug, Deserialize)]
struct V3App {
    guid: String,
    name: String,
    state: AppState,
    lifecycle: V3Lifecycle,
}

#[derive(Debug, Deserialize)]
struct V3Lifecycle {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: V3LifecycleData,
}

#[derive(Debug, Default, Deserialize)]
struct V3LifecycleData {
    #[serde(default)]
    buildpacks: Vec<String>,
}

impl V3App {
    fn into_record(self) -> AppRecord {
        let lifecycle = if self.lifecycle.kind == "docker" {
            LifecycleRecord::Docker { image: None }
        } else {
            LifecycleRecord::Buildpacks(self.lifecycle.data.buildpacks)
        };
        AppRecord {
            guid: self.guid,
            name: self.name,
            state: self.state,
            lifecycle,
        }
    }
}

#[derive(Debug, Deserialize)]
struct V3Process {
    guid: String,
    instances: u32,
    memory_in_mb: u64,
    disk_in_mb: u64,
    health_check: Option<V3HealthCheck>,
}

#[derive(Debug, Deserialize)]
struct V3HealthCheck {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: V3HealthCheckData,
}

#[derive(Debug, Default, Deserialize)]
struct V3HealthCheckData {
    #[serde(default)]
    endpoint: Option<String>,
}

impl V3Process {
    fn into_record(self) -> ProcessRecord {
        let health_check = self.health_check.and_then(|hc| {
            let (check_type, _) = HealthCheckType::parse(&hc.kind).ok()?;
            let endpoint = hc.data.endpoint.filter(|_| check_type == HealthCheckType::Http);
            Some(HealthCheck {
                check_type,
                endpoint,
            })
        });
        ProcessRecord {
            guid: self.guid,
            instances: self.instances,
            memory_mb: self.memory_in_mb,
            disk_mb: self.disk_in_mb,
            health_check,
        }
    }
}

#[derive(Debug, Deserialize)]
struct V3Env {
    #[serde(default)]
    var: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct V3Route {
    guid: String,
    #[serde(default)]
    host: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    destinations: Vec<V3Destination>,
    relationships: V3RouteRelationships,
}

#[derive(Debug, Deserialize)]
struct V3RouteRelationships {
    domain: V3ToOne,
}

#[derive(Debug, Deserialize)]
struct V3ToOne {
    data: V3Guid,
}

#[derive(Debug, Deserialize)]
struct V3Destination {
    guid: String,
    app: V3Guid,
}

#[derive(Debug, Deserialize)]
struct V3Destinations {
    destinations: Vec<V3Destination>,
}

impl V3Route {
    /// Converts to a record; destinations of `owner` are not counted as others.
    fn into_record(self, domain: String, owner: Option<&str>) -> RouteRecord {
        let other_destinations = self
            .destinations
            .iter()
            .filter(|d| Some(d.app.guid.as_str()) != owner)
            .count();
        RouteRecord {
            guid: self.guid,
            route: RouteSpec {
                host: Some(self.host).filter(|h| !h.is_empty()),
                domain,
                path: Some(self.path).filter(|p| !p.is_empty()),
                port: self.port,
            },
            other_destinations,
        }
    }
}

#[derive(Debug, Deserialize)]
struct V3Package {
    guid: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    data: V3PackageData,
}

#[derive(Debug, Default, Deserialize)]
struct V3PackageData {
    #[serde(default)]
    checksum: Option<V3Checksum>,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct V3Checksum {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct V3Build {
    guid: String,
    state: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    droplet: Option<V3Guid>,
}

#[derive(Debug, Deserialize)]
struct V3Job {
    state: String,
    #[serde(default)]
    errors: Vec<V3ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct V3Errors {
    errors: Vec<V3ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct V3ErrorDetail {
    detail: String,
}

#[derive(Debug, Deserialize)]
struct V3Instance {
    state: String,
}

#[derive(Debug, Deserialize)]
struct V3Root {
    links: V3RootLinks,
}

#[derive(Debug, Deserialize)]
struct V3RootLinks {
    #[serde(default)]
    cloud_controller_v3: Option<V3Link>,
}

#[derive(Debug, Deserialize)]
struct V3Link {
    meta: V3LinkMeta,
}

#[derive(Debug, Deserialize)]
struct V3LinkMeta {
    version: String,
}
