//! Configuration and desired state.
//!
//! This module handles everything that happens before the control plane is
//! asked to change anything:
//! - Loading manifests and validating their structure
//! - Resolving manifest, flags and platform defaults into application specs
//! - The persisted session and the apply tunables

mod manifest;
mod resolver;
mod session;
mod settings;
mod spec;
mod validator;

pub use manifest::{
    DEFAULT_MANIFEST_FILES, Manifest, ManifestLoader, RawApplication, RawDocker, RawRoute,
    ScalarValue, find_manifest,
};
pub use resolver::{DesiredStateResolver, PlatformDefaults, PushFlags, Resolution};
pub use session::{HOME_ENV, Session, SessionStore, TOKEN_ENV, TargetRef};
pub use settings::{
    ApplySettings, POLL_INTERVAL_ENV, RETRY_ATTEMPTS_ENV, STAGING_TIMEOUT_ENV,
    STARTUP_TIMEOUT_ENV, load_dotenv,
};
pub use spec::{
    ApplicationSpec, DeprecatedField, Deprecation, DomainInfo, DomainKind, HealthCheck,
    HealthCheckType, Lifecycle, RouteSet, RouteSource, RouteSpec, format_megabytes,
    parse_megabytes,
};
pub use validator::{ManifestValidator, ValidationResult};
