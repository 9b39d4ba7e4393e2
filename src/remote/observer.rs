//! Actual-state observation.
//!
//! Every read here is idempotent, so each one goes through the retry policy.

use tracing::{debug, info};

use crate::config::{ApplicationSpec, PlatformDefaults};
use crate::error::TransportError;

use super::client::RemoteClient;
use super::retry::RetryPolicy;
use super::types::{ActualState, LifecycleRecord, SpaceScope};

/// Fetches actual state from the control plane.
pub struct StateObserver<'a> {
    /// Control plane client.
    client: &'a dyn RemoteClient,
    /// Retry policy for reads.
    retry: RetryPolicy,
}

impl<'a> StateObserver<'a> {
    /// Creates an observer.
    #[must_use]
    pub const fn new(client: &'a dyn RemoteClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Fetches the platform defaults used for resolution.
    ///
    /// # Errors
    ///
    /// Returns the transport error once retries are exhausted.
    pub async fn platform_defaults(&self) -> Result<PlatformDefaults, TransportError> {
        let domains = self
            .retry
            .run("list domains", || self.client.list_domains())
            .await?;
        debug!("Platform exposes {} domain(s)", domains.len());
        Ok(PlatformDefaults::from_domains(domains))
    }

    /// Fetches a snapshot of everything the planner compares for one application.
    ///
    /// # Errors
    ///
    /// Returns the transport error once retries are exhausted.
    pub async fn observe(
        &self,
        scope: &SpaceScope,
        spec: &ApplicationSpec,
    ) -> Result<ActualState, TransportError> {
        let app = self
            .retry
            .run("find app", || self.client.find_app(scope, &spec.name))
            .await?;

        let mut state = ActualState::absent();

        if let Some(mut app) = app {
            let guid = app.guid.clone();
            let (process, env, mapped_routes, package, has_droplet) = tokio::try_join!(
                self.retry.run("fetch process", || self.client.app_process(&guid)),
                self.retry.run("fetch env", || self.client.app_env(&guid)),
                self.retry.run("fetch routes", || self.client.app_routes(&guid)),
                self.retry.run("fetch package", || self.client.current_package(&guid)),
                self.retry
                    .run("fetch droplet", || self.client.has_current_droplet(&guid)),
            )?;

            if let LifecycleRecord::Docker { image } = &mut app.lifecycle {
                *image = package.as_ref().and_then(|p| p.image.clone());
            }

            state.app = Some(app);
            state.process = process;
            state.env = env;
            state.mapped_routes = mapped_routes;
            state.package = package;
            state.has_droplet = has_droplet;
        }

        for route in &spec.routes.routes {
            if state.mapped(route).is_some() {
                continue;
            }
            let found = self
                .retry
                .run("find route", || self.client.find_route(scope, route))
                .await?;
            if let Some(record) = found {
                state.known_routes.push(record);
            }
        }

        info!(
            "Observed '{}': {}, {} mapped route(s)",
            spec.name,
            state
                .app
                .as_ref()
                .map_or_else(|| String::from("absent"), |a| a.state.to_string()),
            state.mapped_routes.len()
        );
        Ok(state)
    }
}
