//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::PushFlags;

/// cfpush - Declarative application push for platform-as-a-service control planes.
#[derive(Parser, Debug)]
#[command(name = "cfpush")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Set the API endpoint and record its version.
    Api {
        /// Control plane URL.
        url: String,
    },

    /// Store an access token for the current endpoint.
    Login {
        /// Access token. Prefer the `CFPUSH_ACCESS_TOKEN` environment variable.
        #[arg(long)]
        token: Option<String>,
    },

    /// Target an organization and space.
    Target {
        /// Organization name.
        #[arg(short, long)]
        org: Option<String>,

        /// Space name.
        #[arg(short, long)]
        space: Option<String>,
    },

    /// Push one or more applications.
    Push(PushArgs),

    /// Start an application.
    Start {
        /// Application name.
        app_name: String,
    },

    /// Stop an application.
    Stop {
        /// Application name.
        app_name: String,
    },
}

/// Arguments of `push`.
#[derive(Args, Debug, Default)]
pub struct PushArgs {
    /// Application name; selects one application from the manifest.
    pub app_name: Option<String>,

    /// Manifest file, or a directory containing one.
    #[arg(short = 'f', long = "manifest")]
    pub manifest: Option<PathBuf>,

    /// Buildpack name or URL; repeat for multiple buildpacks.
    #[arg(short = 'b', long = "buildpack")]
    pub buildpacks: Vec<String>,

    /// Docker image to deploy.
    #[arg(short = 'o', long = "docker-image")]
    pub docker_image: Option<String>,

    /// Registry username for the docker image.
    #[arg(long = "docker-username")]
    pub docker_username: Option<String>,

    /// Hostname for the route.
    #[arg(short = 'n', long)]
    pub hostname: Option<String>,

    /// Domain for the route.
    #[arg(short = 'd', long)]
    pub domain: Option<String>,

    /// Path for the route.
    #[arg(long = "route-path")]
    pub route_path: Option<String>,

    /// Do not map any route and remove existing ones.
    #[arg(long = "no-route")]
    pub no_route: bool,

    /// Do not start the application after pushing.
    #[arg(long = "no-start")]
    pub no_start: bool,

    /// Path to the application bits. Uploads to a control plane require a zip
    /// archive; a directory is rejected before any change is made.
    #[arg(short = 'p', long)]
    pub path: Option<PathBuf>,

    /// Number of instances.
    #[arg(short = 'i', long)]
    pub instances: Option<u32>,

    /// Memory limit, e.g. 256M or 1G.
    #[arg(short = 'm', long)]
    pub memory: Option<String>,

    /// Disk limit, e.g. 512M or 1G.
    #[arg(short = 'k', long)]
    pub disk: Option<String>,

    /// Health check type (port, process, http).
    #[arg(short = 'u', long = "health-check-type")]
    pub health_check_type: Option<String>,

    /// Endpoint for the http health check.
    #[arg(long = "endpoint")]
    pub health_check_endpoint: Option<String>,

    /// Show the planned changes without applying them.
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

impl PushArgs {
    /// Converts the arguments into resolver flags.
    #[must_use]
    pub fn to_flags(&self) -> PushFlags {
        PushFlags {
            app_name: self.app_name.clone(),
            buildpacks: self.buildpacks.clone(),
            docker_image: self.docker_image.clone(),
            docker_username: self.docker_username.clone(),
            hostname: self.hostname.clone(),
            domain: self.domain.clone(),
            route_path: self.route_path.clone(),
            no_route: self.no_route,
            no_start: self.no_start,
            path: self.path.clone(),
            instances: self.instances,
            memory: self.memory.clone(),
            disk: self.disk.clone(),
            health_check_type: self.health_check_type.clone(),
            health_check_endpoint: self.health_check_endpoint.clone(),
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_flags() {
        let cli = Cli::try_parse_from([
            "cfpush", "push", "web", "-b", "ruby", "-b", "node", "-i", "3", "-m", "1G", "-n",
            "www", "-d", "example.com", "--no-start", "--dry-run",
        ])
        .unwrap();

        let Commands::Push(args) = cli.command else {
            panic!("expected push");
        };
        assert!(args.dry_run);

        let flags = args.to_flags();
        assert_eq!(flags.app_name.as_deref(), Some("web"));
        assert_eq!(flags.buildpacks, vec!["ruby", "node"]);
        assert_eq!(flags.instances, Some(3));
        assert_eq!(flags.memory.as_deref(), Some("1G"));
        assert_eq!(flags.hostname.as_deref(), Some("www"));
        assert!(flags.no_start);
        assert!(!flags.no_route);
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from(["cfpush", "stop", "web", "-v", "--output", "json"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Stop { app_name } if app_name == "web"));
    }

    #[test]
    fn test_target_flags() {
        let cli = Cli::try_parse_from(["cfpush", "target", "-o", "acme", "-s", "dev"]).unwrap();
        match cli.command {
            Commands::Target { org, space } => {
                assert_eq!(org.as_deref(), Some("acme"));
                assert_eq!(space.as_deref(), Some("dev"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_start_requires_name() {
        assert!(Cli::try_parse_from(["cfpush", "start"]).is_err());
    }
}
