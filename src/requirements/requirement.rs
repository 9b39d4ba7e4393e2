//! Individual command preconditions.

use semver::Version;
use std::fmt;
use tracing::debug;

use crate::config::Session;
use crate::error::{PushError, RequirementError, RequirementKind, Result};
use crate::remote::{RemoteClient, RetryPolicy, SpaceScope};

/// What a requirement may look at: the session and, for existence checks,
/// read-only access to the control plane.
#[derive(Clone, Copy)]
pub struct RequirementContext<'a> {
    /// Current session.
    pub session: &'a Session,
    /// Control plane client, absent before an endpoint is known.
    pub client: Option<&'a dyn RemoteClient>,
    /// Retry policy for reads.
    pub retry: RetryPolicy,
}

impl<'a> RequirementContext<'a> {
    /// A context without control plane access.
    #[must_use]
    pub fn offline(session: &'a Session) -> Self {
        Self {
            session,
            client: None,
            retry: RetryPolicy::none(),
        }
    }

    /// A context that may query the control plane.
    #[must_use]
    pub const fn online(session: &'a Session, client: &'a dyn RemoteClient, retry: RetryPolicy) -> Self {
        Self {
            session,
            client: Some(client),
            retry,
        }
    }
}

/// A precondition checked before a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// The command received an acceptable number of positional arguments.
    ArgumentCount {
        /// Number of arguments received.
        args: usize,
        /// Minimum accepted.
        min: usize,
        /// Maximum accepted, `None` for unbounded.
        max: Option<usize>,
        /// Usage text shown on failure.
        usage: String,
    },
    /// An API endpoint is set.
    ApiEndpointSet,
    /// An access token is present.
    LoggedIn,
    /// An organization is targeted.
    OrgTargeted,
    /// A space is targeted.
    SpaceTargeted,
    /// The control plane API version is within bounds.
    ApiVersionInRange {
        /// Command name, for the message.
        command: String,
        /// Lowest supported version.
        min: Option<Version>,
        /// Highest supported version.
        max: Option<Version>,
    },
    /// The named application exists in the targeted space.
    ApplicationExists {
        /// Application name.
        name: String,
    },
    /// Deprecated usage; never fails, warns when triggered.
    DeprecatedUsage {
        /// Warning text.
        message: String,
        /// Whether the deprecated usage occurred.
        triggered: bool,
    },
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgumentCount { min, max, .. } => match max {
                Some(max) => write!(f, "argument count {min}..={max}"),
                None => write!(f, "argument count >= {min}"),
            },
            Self::ApiEndpointSet => write!(f, "api endpoint"),
            Self::LoggedIn => write!(f, "logged in"),
            Self::OrgTargeted => write!(f, "org targeted"),
            Self::SpaceTargeted => write!(f, "space targeted"),
            Self::ApiVersionInRange { .. } => write!(f, "api version"),
            Self::ApplicationExists { name } => write!(f, "app '{name}' exists"),
            Self::DeprecatedUsage { .. } => write!(f, "deprecated usage"),
        }
    }
}

fn fail(kind: RequirementKind, message: impl Into<String>) -> PushError {
    PushError::Requirement(RequirementError::new(kind, message))
}

impl Requirement {
    /// Checks the requirement, returning a warning line if it produced one.
    ///
    /// # Errors
    ///
    /// Returns a [`RequirementError`] if the precondition is not met, or a
    /// transport error if an existence check could not reach the control plane.
    pub async fn evaluate(&self, ctx: &RequirementContext<'_>) -> Result<Option<String>> {
        let session = ctx.session;

        match self {
            Self::ArgumentCount {
                args,
                min,
                max,
                usage,
            } => {
                if *args < *min || max.is_some_and(|max| *args > max) {
                    return Err(fail(
                        RequirementKind::BadArgumentCount,
                        format!("Incorrect Usage. {usage}"),
                    ));
                }
            }
            Self::ApiEndpointSet => {
                if session.api_endpoint.is_none() {
                    return Err(fail(
                        RequirementKind::NoTarget,
                        "No API endpoint set. Use 'cfpush api' to set an endpoint",
                    ));
                }
            }
            Self::LoggedIn => {
                if !session.is_logged_in() {
                    return Err(fail(
                        RequirementKind::NotLoggedIn,
                        "Not logged in. Use 'cfpush login' to log in.",
                    ));
                }
            }
            Self::OrgTargeted => {
                if session.organization.is_none() {
                    return Err(fail(
                        RequirementKind::NoTarget,
                        "No org targeted, use 'cfpush target -o ORG' to target an org.",
                    ));
                }
            }
            Self::SpaceTargeted => {
                if session.space.is_none() {
                    return Err(fail(
                        RequirementKind::NoTarget,
                        "No space targeted, use 'cfpush target -s SPACE' to target a space.",
                    ));
                }
            }
            Self::ApiVersionInRange { command, min, max } => {
                check_version(session.api_version.as_deref(), command, min.as_ref(), max.as_ref())?;
            }
            Self::ApplicationExists { name } => {
                let (Some(client), Some(scope)) = (ctx.client, SpaceScope::from_session(session))
                else {
                    return Err(fail(
                        RequirementKind::NoTarget,
                        "No space targeted, use 'cfpush target -s SPACE' to target a space.",
                    ));
                };
                let found = ctx
                    .retry
                    .run("find app", || client.find_app(&scope, name))
                    .await?;
                if found.is_none() {
                    return Err(fail(RequirementKind::NotFound, format!("App '{name}' not found")));
                }
            }
            Self::DeprecatedUsage { message, triggered } => {
                return Ok(triggered.then(|| message.clone()));
            }
        }

        debug!("Requirement met: {self}");
        Ok(None)
    }
}

fn check_version(
    current: Option<&str>,
    command: &str,
    min: Option<&Version>,
    max: Option<&Version>,
) -> Result<()> {
    if min.is_none() && max.is_none() {
        return Ok(());
    }

    let version = current
        .and_then(|v| Version::parse(v.trim_start_matches('v')).ok())
        .ok_or_else(|| {
            fail(
                RequirementKind::VersionUnsupported,
                format!("Unable to determine the API version; run 'cfpush api' again before {command}"),
            )
        })?;

    if let Some(min) = min.filter(|min| version < **min) {
        return Err(fail(
            RequirementKind::VersionUnsupported,
            format!("{command} requires API version {min} or higher"),
        ));
    }
    if let Some(max) = max.filter(|max| version > **max) {
        return Err(fail(
            RequirementKind::VersionUnsupported,
            format!("{command} requires API version {max} or lower"),
        ));
    }
    Ok(())
}
