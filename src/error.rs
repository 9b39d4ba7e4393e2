//! Error types for the push system.
//!
//! This module provides the error hierarchy for every phase of a push:
//! pre-flight requirements, desired-state resolution, planning, applying,
//! and the transport underneath the remote control plane client.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the push system.
#[derive(Debug, Error)]
pub enum PushError {
    /// Configuration-related errors (manifest and session files).
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A command precondition was not met.
    #[error("{0}")]
    Requirement(#[from] RequirementError),

    /// The desired state could not be resolved.
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Apply errors.
    #[error("{0}")]
    Apply(#[from] ApplyError),

    /// Remote transport errors.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file was not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A configuration file could not be parsed.
    #[error("Failed to parse {what}: {message}")]
    ParseError {
        /// What was being parsed (manifest, session).
        what: String,
        /// Description of the parse error.
        message: String,
    },

    /// A configuration file could not be written.
    #[error("Failed to write {path}: {message}")]
    WriteError {
        /// Path of the file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// An environment variable holds an unusable value.
    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// The offending value.
        value: String,
    },

    /// The home directory could not be determined.
    #[error("Cannot determine home directory; set CFPUSH_HOME")]
    NoHomeDirectory,
}

/// Classification of an unmet requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementKind {
    /// No access token is available.
    NotLoggedIn,
    /// No API endpoint, org or space is targeted.
    NoTarget,
    /// A named resource does not exist.
    NotFound,
    /// The control plane API version is outside the supported range.
    VersionUnsupported,
    /// The command received the wrong number of arguments.
    BadArgumentCount,
}

/// A command precondition that was not met.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RequirementError {
    /// What kind of precondition failed.
    pub kind: RequirementKind,
    /// User-facing message.
    pub message: String,
}

/// Errors raised while resolving manifest, flags and defaults into specs.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// `buildpack` and `buildpacks` disagree within one application block.
    #[error("Application '{app}': 'buildpack' and 'buildpacks' cannot both be set to different values")]
    ConflictingBuildpackFields {
        /// Application name.
        app: String,
    },

    /// A docker image was combined with buildpacks.
    #[error("Application '{app}': a docker image cannot be used together with buildpacks")]
    DockerWithBuildpacks {
        /// Application name.
        app: String,
    },

    /// A hostname was given for a TCP domain.
    #[error("The route is invalid: a hostname cannot be used with a TCP domain.")]
    HostnameWithTcpDomain {
        /// Application name.
        app: String,
        /// The TCP domain.
        domain: String,
    },

    /// The referenced domain is not known to the platform.
    #[error("Application '{app}': domain '{domain}' not found")]
    UnknownDomain {
        /// Application name.
        app: String,
        /// The unknown domain.
        domain: String,
    },

    /// A route string could not be interpreted.
    #[error("Application '{app}': route '{route}' is invalid: {reason}")]
    InvalidRoute {
        /// Application name.
        app: String,
        /// The route string.
        route: String,
        /// Why it is invalid.
        reason: String,
    },

    /// `routes` was combined with the deprecated host/domain fields.
    #[error("Application '{app}': 'routes' cannot be combined with 'host', 'hosts', 'domain' or 'domains'")]
    RoutesWithLegacyFields {
        /// Application name.
        app: String,
    },

    /// A memory or disk quantity could not be parsed.
    #[error("Application '{app}': invalid {field} '{value}', expected an integer followed by M, MB, G or GB")]
    InvalidQuantity {
        /// Application name.
        app: String,
        /// Field name.
        field: String,
        /// The offending value.
        value: String,
    },

    /// Two application blocks share a name.
    #[error("Duplicate application name in manifest: {name}")]
    DuplicateApplication {
        /// The duplicated name.
        name: String,
    },

    /// The requested application is not declared in the manifest.
    #[error("Could not find app named '{name}' in manifest")]
    AppNotInManifest {
        /// The requested name.
        name: String,
    },

    /// No application name was given and no manifest was found.
    #[error("Incorrect Usage: The push command requires an app name. The app name can be supplied as an argument or with a manifest.yml file.")]
    MissingAppName,

    /// Command-line flags were given for a multi-application manifest.
    #[error("Command line flags (except -f) cannot be applied when pushing multiple apps from a manifest file.")]
    FlagsWithMultipleApps,

    /// A field holds an invalid value.
    #[error("Application '{app}': invalid {field}: {message}")]
    InvalidField {
        /// Application name.
        app: String,
        /// Field name.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A change set violates an ordering invariant.
    #[error("Change set for '{app}' violates ordering: {message}")]
    OrderingViolation {
        /// Application name.
        app: String,
        /// Description of the violation.
        message: String,
    },
}

/// Errors raised while applying a change set.
#[derive(Debug, Clone, Error)]
pub enum ApplyError {
    /// A remote operation failed.
    #[error("Application '{app}': {operation} failed: {cause}")]
    OperationFailed {
        /// Application name.
        app: String,
        /// Description of the failed operation.
        operation: String,
        /// Underlying transport failure.
        cause: TransportError,
        /// Number of operations applied before the failure.
        applied_before: usize,
    },

    /// The staging job terminated unsuccessfully.
    #[error("Application '{app}': staging failed: {reason}")]
    StagingFailed {
        /// Application name.
        app: String,
        /// Failure reason reported by the platform.
        reason: String,
    },

    /// The staging job did not reach a terminal state in time.
    #[error("Application '{app}': staging timed out after {timeout_secs}s (job {job_id})")]
    StagingTimedOut {
        /// Application name.
        app: String,
        /// The job that was polled.
        job_id: String,
        /// The deadline that was exceeded.
        timeout_secs: u64,
    },

    /// No instance of the application became healthy.
    #[error("Application '{app}': start unsuccessful: {reason}")]
    StartupFailed {
        /// Application name.
        app: String,
        /// Failure reason.
        reason: String,
    },

    /// Instances did not start before the startup deadline.
    #[error("Application '{app}': start timed out after {timeout_secs}s")]
    StartupTimedOut {
        /// Application name.
        app: String,
        /// The deadline that was exceeded.
        timeout_secs: u64,
    },

    /// The user cancelled the push.
    #[error("Application '{app}': cancelled before {operation}")]
    Cancelled {
        /// Application name.
        app: String,
        /// The operation that was not issued.
        operation: String,
    },
}

/// Transport-level failures talking to the control plane.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// A failure that may succeed on retry (network, 5xx, rate limiting).
    #[error("transient failure: {message}")]
    Transient {
        /// HTTP status, when one was received.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// A failure that will not succeed on retry.
    #[error("request failed ({}): {message}", status_label(.status))]
    Permanent {
        /// HTTP status, when one was received.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// The access token was rejected.
    #[error("Authentication failed: {message}")]
    NotAuthenticated {
        /// Description of the failure.
        message: String,
    },
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| String::from("no status"), |s| s.to_string())
}

/// Result type alias for push operations.
pub type Result<T> = std::result::Result<T, PushError>;

impl PushError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the error was raised before any remote mutation.
    #[must_use]
    pub const fn is_preflight(&self) -> bool {
        matches!(self, Self::Requirement(_) | Self::Resolution(_) | Self::Config(_))
    }
}

impl RequirementError {
    /// Creates a requirement error of the given kind.
    #[must_use]
    pub fn new(kind: RequirementKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl ConfigError {
    /// Creates a parse error for the named document.
    #[must_use]
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            what: what.into(),
            message: message.into(),
        }
    }
}

impl ApplyError {
    /// Returns the application this error belongs to.
    #[must_use]
    pub fn app(&self) -> &str {
        match self {
            Self::OperationFailed { app, .. }
            | Self::StagingFailed { app, .. }
            | Self::StagingTimedOut { app, .. }
            | Self::StartupFailed { app, .. }
            | Self::StartupTimedOut { app, .. }
            | Self::Cancelled { app, .. } => app,
        }
    }
}

impl TransportError {
    /// Creates a transient error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            status: None,
            message: message.into(),
        }
    }

    /// Creates a permanent error.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            status: None,
            message: message.into(),
        }
    }

    /// Classifies an HTTP status code and body into a transport error.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::NotAuthenticated { message },
            429 | 500..=599 => Self::Transient {
                status: Some(status),
                message,
            },
            _ => Self::Permanent {
                status: Some(status),
                message,
            },
        }
    }

    /// Returns true if this error is worth retrying on an idempotent call.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}
