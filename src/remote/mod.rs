//! Control plane integration.
//!
//! This module provides everything that talks to the platform: the client
//! capability surface and its HTTP implementation, actual-state observation,
//! job polling and the retry policy for idempotent reads.

mod client;
#[cfg(test)]
pub(crate) mod fake;
mod observer;
mod poller;
mod retry;
mod types;

#[cfg(test)]
pub use client::MockRemoteClient;
pub use client::{HttpRemoteClient, RemoteClient, RemoteResult};
pub use observer::StateObserver;
pub use poller::{JobPoller, PollOutcome};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};
pub use types::{
    ActualState, ApiInfo, AppRecord, AppState, JobHandle, JobKind, JobState, LifecycleRecord,
    PackageRecord, ProcessRecord, RouteRecord, ScaleDimension, SpaceScope,
};
