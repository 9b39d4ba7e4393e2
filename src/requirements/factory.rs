//! Building requirement chains from command metadata.

use semver::Version;

use super::chain::RequirementChain;
use super::requirement::Requirement;

/// A flag or usage that still works but is deprecated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecatedFlag {
    /// The flag as typed, e.g. `--token`.
    pub flag: String,
    /// Warning shown when it is used.
    pub message: String,
}

/// Declarative description of what a command needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMetadata {
    /// Command name.
    pub name: String,
    /// Usage line.
    pub usage: String,
    /// Minimum positional arguments.
    pub min_args: usize,
    /// Maximum positional arguments.
    pub max_args: Option<usize>,
    /// Requires an API endpoint.
    pub needs_endpoint: bool,
    /// Requires a login.
    pub needs_login: bool,
    /// Requires a targeted org.
    pub needs_org: bool,
    /// Requires a targeted space.
    pub needs_space: bool,
    /// Lowest supported API version.
    pub min_api_version: Option<Version>,
    /// Highest supported API version.
    pub max_api_version: Option<Version>,
    /// Requires the application named by the first argument to exist.
    pub app_must_exist: bool,
    /// Deprecated flags.
    pub deprecated_flags: Vec<DeprecatedFlag>,
}

impl CommandMetadata {
    fn base(name: &str, usage: &str, min_args: usize, max_args: Option<usize>) -> Self {
        Self {
            name: name.to_string(),
            usage: usage.to_string(),
            min_args,
            max_args,
            needs_endpoint: false,
            needs_login: false,
            needs_org: false,
            needs_space: false,
            min_api_version: None,
            max_api_version: None,
            app_must_exist: false,
            deprecated_flags: Vec::new(),
        }
    }

    fn targeted(mut self) -> Self {
        self.needs_endpoint = true;
        self.needs_login = true;
        self.needs_org = true;
        self.needs_space = true;
        self.min_api_version = Some(Version::new(3, 0, 0));
        self
    }

    /// `api URL`.
    #[must_use]
    pub fn api() -> Self {
        Self::base("api", "cfpush api URL", 1, Some(1))
    }

    /// `login`.
    #[must_use]
    pub fn login() -> Self {
        let mut meta = Self::base("login", "cfpush login [--token TOKEN]", 0, Some(0));
        meta.needs_endpoint = true;
        meta.deprecated_flags.push(DeprecatedFlag {
            flag: String::from("--token"),
            message: format!(
                "Deprecation warning: passing the token with --token exposes it in shell history; set {} instead.",
                crate::config::TOKEN_ENV
            ),
        });
        meta
    }

    /// `target [-o ORG] [-s SPACE]`.
    #[must_use]
    pub fn target() -> Self {
        let mut meta = Self::base("target", "cfpush target [-o ORG] [-s SPACE]", 0, Some(0));
        meta.needs_endpoint = true;
        meta.needs_login = true;
        meta
    }

    /// `push [APP_NAME]`.
    #[must_use]
    pub fn push() -> Self {
        Self::base("push", "cfpush push [APP_NAME] [-f MANIFEST] [flags]", 0, Some(1)).targeted()
    }

    /// `start APP_NAME`.
    #[must_use]
    pub fn start() -> Self {
        let mut meta = Self::base("start", "cfpush start APP_NAME", 1, Some(1)).targeted();
        meta.app_must_exist = true;
        meta
    }

    /// `stop APP_NAME`.
    #[must_use]
    pub fn stop() -> Self {
        let mut meta = Self::base("stop", "cfpush stop APP_NAME", 1, Some(1)).targeted();
        meta.app_must_exist = true;
        meta
    }
}

/// What a command was invoked with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    /// Positional arguments.
    pub positional: Vec<String>,
    /// Flags that were given explicitly.
    pub flags: Vec<String>,
}

impl CommandArgs {
    /// Creates invocation arguments.
    #[must_use]
    pub fn new(positional: Vec<String>, flags: Vec<String>) -> Self {
        Self { positional, flags }
    }
}

/// Builds requirement chains.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequirementFactory;

impl RequirementFactory {
    /// Builds the chain for a command invocation.
    ///
    /// Order: argument count, API endpoint, login, org, space, API version,
    /// application existence, deprecated usages.
    #[must_use]
    pub fn for_command(meta: &CommandMetadata, args: &CommandArgs) -> RequirementChain {
        let mut chain = RequirementChain::new().with(Requirement::ArgumentCount {
            args: args.positional.len(),
            min: meta.min_args,
            max: meta.max_args,
            usage: meta.usage.clone(),
        });

        if meta.needs_endpoint {
            chain = chain.with(Requirement::ApiEndpointSet);
        }
        if meta.needs_login {
            chain = chain.with(Requirement::LoggedIn);
        }
        if meta.needs_org {
            chain = chain.with(Requirement::OrgTargeted);
        }
        if meta.needs_space {
            chain = chain.with(Requirement::SpaceTargeted);
        }
        if meta.min_api_version.is_some() || meta.max_api_version.is_some() {
            chain = chain.with(Requirement::ApiVersionInRange {
                command: meta.name.clone(),
                min: meta.min_api_version.clone(),
                max: meta.max_api_version.clone(),
            });
        }
        if meta.app_must_exist {
            if let Some(name) = args.positional.first() {
                chain = chain.with(Requirement::ApplicationExists { name: name.clone() });
            }
        }
        for deprecated in &meta.deprecated_flags {
            chain = chain.with(Requirement::DeprecatedUsage {
                message: deprecated.message.clone(),
                triggered: args.flags.contains(&deprecated.flag),
            });
        }

        chain
    }
}
