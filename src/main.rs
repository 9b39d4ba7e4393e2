//! cfpush CLI entrypoint.
//!
//! This is the main entrypoint for the cfpush command-line tool.

use std::process::ExitCode;
use std::sync::Arc;

use cfpush::cli::{Cli, Commands, OutputFormat, OutputFormatter, PushArgs};
use cfpush::config::{ApplySettings, Session, SessionStore, TOKEN_ENV, TargetRef, load_dotenv};
use cfpush::error::{PushError, RequirementError, RequirementKind, Result};
use cfpush::push::{PushOptions, Pusher};
use cfpush::remote::{HttpRemoteClient, RemoteClient};
use cfpush::render::DiffRenderer;
use cfpush::requirements::{
    CommandArgs, CommandMetadata, Requirement, RequirementContext, RequirementFactory,
};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.output);

    let formatter = OutputFormatter::new(cli.output);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}", formatter.error(&format!("Failed to create async runtime: {e}")));
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, &formatter)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", formatter.error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// Logs go to stderr so stdout carries only the diff and reports.
fn init_logging(verbose: bool, output: OutputFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match output {
        OutputFormat::Json => builder.json().init(),
        OutputFormat::Text => builder.init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<u8> {
    let working_dir = std::env::current_dir()?;
    load_dotenv(&working_dir)?;

    let store = SessionStore::from_env()?;
    let stored = store.load().await?;
    let mut session = stored.clone();
    session.apply_env_overrides();
    debug!("Session loaded from {}", store.path().display());

    match cli.command {
        Commands::Api { url } => cmd_api(&store, stored, &session, url, formatter).await,
        Commands::Login { token } => cmd_login(&store, stored, &session, token, formatter).await,
        Commands::Target { org, space } => {
            cmd_target(&store, stored, &session, org, space, formatter).await
        }
        Commands::Push(args) => cmd_push(&session, &args, working_dir, formatter).await,
        Commands::Start { app_name } => cmd_lifecycle(&session, &app_name, true, formatter).await,
        Commands::Stop { app_name } => cmd_lifecycle(&session, &app_name, false, formatter).await,
    }
}

/// Set the API endpoint.
async fn cmd_api(
    store: &SessionStore,
    mut stored: Session,
    session: &Session,
    url: String,
    formatter: &OutputFormatter,
) -> Result<u8> {
    let args = CommandArgs::new(vec![url.clone()], Vec::new());
    RequirementFactory::for_command(&CommandMetadata::api(), &args)
        .execute(&RequirementContext::offline(session))
        .await?;

    let client = HttpRemoteClient::new(&url, None)?;
    let api = client.api_info().await?;
    info!("API endpoint {url} reports version {}", api.version);

    stored.set_endpoint(url, Some(api.version.clone()));
    store.save(&stored).await?;

    let endpoint = stored.api_endpoint.unwrap_or_default();
    println!(
        "{}",
        formatter.success(&format!("API endpoint: {endpoint} (API version: {})", api.version))
    );
    Ok(0)
}

/// Store an access token.
async fn cmd_login(
    store: &SessionStore,
    mut stored: Session,
    session: &Session,
    token: Option<String>,
    formatter: &OutputFormatter,
) -> Result<u8> {
    let flags = if token.is_some() {
        vec![String::from("--token")]
    } else {
        Vec::new()
    };
    let warnings = RequirementFactory::for_command(
        &CommandMetadata::login(),
        &CommandArgs::new(Vec::new(), flags),
    )
    .execute(&RequirementContext::offline(session))
    .await?;
    print_warnings(formatter, &warnings);

    let token = token
        .or_else(|| std::env::var(TOKEN_ENV).ok())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            RequirementError::new(
                RequirementKind::NotLoggedIn,
                format!("No access token given. Use --token or set {TOKEN_ENV}."),
            )
        })?;

    // Any authenticated read proves the token is accepted.
    let client = remote_client(session, Some(token.clone())).await?;
    let domains = client.list_domains().await?;
    debug!("Token accepted, {} domain(s) visible", domains.len());

    stored.access_token = Some(token);
    store.save(&stored).await?;

    println!("{}", formatter.success("Authenticated."));
    Ok(0)
}

/// Target an organization and space.
async fn cmd_target(
    store: &SessionStore,
    mut stored: Session,
    session: &Session,
    org: Option<String>,
    space: Option<String>,
    formatter: &OutputFormatter,
) -> Result<u8> {
    RequirementFactory::for_command(&CommandMetadata::target(), &CommandArgs::default())
        .execute(&RequirementContext::offline(session))
        .await?;

    let client = remote_client(session, session.access_token.clone()).await?;

    if let Some(name) = org {
        let found = client.find_org(&name).await?.ok_or_else(|| {
            RequirementError::new(
                RequirementKind::NotFound,
                format!("Organization '{name}' not found"),
            )
        })?;
        info!("Targeting org {} ({})", found.name, found.guid);
        stored.set_organization(found);
    }

    if let Some(name) = space {
        let org_guid = stored
            .organization
            .as_ref()
            .map(|o| o.guid.clone())
            .ok_or_else(|| {
                RequirementError::new(
                    RequirementKind::NoTarget,
                    "No org targeted, use 'cfpush target -o ORG' to target an org.",
                )
            })?;
        let found = client.find_space(&org_guid, &name).await?.ok_or_else(|| {
            RequirementError::new(RequirementKind::NotFound, format!("Space '{name}' not found"))
        })?;
        info!("Targeting space {} ({})", found.name, found.guid);
        stored.space = Some(found);
    }

    store.save(&stored).await?;

    println!(
        "{}",
        formatter.success(&format!(
            "Targeted org: {}, space: {}",
            target_name(stored.organization.as_ref()),
            target_name(stored.space.as_ref())
        ))
    );
    Ok(0)
}

/// Push applications.
async fn cmd_push(
    session: &Session,
    args: &PushArgs,
    working_dir: std::path::PathBuf,
    formatter: &OutputFormatter,
) -> Result<u8> {
    let pusher = pusher(session).await?;
    let options = PushOptions {
        flags: args.to_flags(),
        manifest: args.manifest.clone(),
        dry_run: args.dry_run,
        working_dir,
    };

    let report = pusher.push(session, &options).await?;

    let renderer = DiffRenderer::new();
    let mut warnings = report.warnings.clone();
    for app in &report.apps {
        let rendered = renderer.render(&app.changeset);
        for warning in rendered.warnings.iter().chain(&app.warnings) {
            if !warnings.contains(warning) {
                warnings.push(warning.clone());
            }
        }
    }
    print_warnings(formatter, &warnings);

    println!("{}", formatter.format_push(&report));
    Ok(report.exit_code())
}

/// Start or stop an application.
async fn cmd_lifecycle(
    session: &Session,
    app_name: &str,
    start: bool,
    formatter: &OutputFormatter,
) -> Result<u8> {
    let pusher = pusher(session).await?;
    let report = if start {
        pusher.start(session, app_name).await?
    } else {
        pusher.stop(session, app_name).await?
    };

    print_warnings(formatter, &report.warnings);
    println!("{}", formatter.format_app(&report));
    Ok(u8::from(!report.is_success()))
}

/// Builds a pusher whose cancellation token fires on Ctrl-C.
async fn pusher(session: &Session) -> Result<Pusher> {
    let client = remote_client(session, session.access_token.clone()).await?;
    let settings = ApplySettings::from_env()?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted: no further operations will be issued");
            on_interrupt.cancel();
        }
    });

    Ok(Pusher::new(client, settings, cancel))
}

/// Creates a client for the session's endpoint.
async fn remote_client(session: &Session, token: Option<String>) -> Result<Arc<dyn RemoteClient>> {
    Requirement::ApiEndpointSet
        .evaluate(&RequirementContext::offline(session))
        .await?;
    let endpoint = session
        .api_endpoint
        .as_deref()
        .ok_or_else(|| PushError::internal("API endpoint missing after check"))?;
    Ok(Arc::new(HttpRemoteClient::new(endpoint, token)?))
}

fn target_name(target: Option<&TargetRef>) -> &str {
    target.map_or("(none)", |t| t.name.as_str())
}

fn print_warnings(formatter: &OutputFormatter, warnings: &[String]) {
    for warning in warnings {
        eprintln!("{}", formatter.warning(warning));
    }
}
