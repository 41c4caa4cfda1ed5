// Statwell Server - Main Entry Point
//
// Bootstrap only: CLI commands, environment loading and tracing setup.
// Handlers, routes and business logic live in the library crate.

pub use statwell_server::*;

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use dotenvy::{Error as DotenvError, dotenv, from_filename};
use statwell_core::{
    config::AppConfig,
    db::Database,
    membership::SiteRole,
    user::{UserRecord, UserStore, Viewer},
};
use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_appender::non_blocking;
use tracing_subscriber::EnvFilter;

static TRACING_FILE_GUARD: OnceLock<non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(author, version, about = "Statwell server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Run database migrations
    Migrate,
    /// Create a user account
    CreateUser(CreateUserArgs),
    /// Create a site owned by an existing user
    CreateSite(CreateSiteArgs),
    /// Invite an email address to an existing site
    Invite(InviteArgs),
}

#[derive(Args, Debug)]
struct CreateUserArgs {
    #[arg(long, value_name = "EMAIL")]
    email: String,
    /// Optional display name
    #[arg(long, value_name = "NAME")]
    name: Option<String>,
}

#[derive(Args, Debug)]
struct CreateSiteArgs {
    /// Email of the owning user
    #[arg(long = "owner-email", value_name = "EMAIL")]
    owner_email: String,
    #[arg(long, value_name = "DOMAIN")]
    domain: String,
    /// IANA timezone name (defaults to UTC)
    #[arg(long, value_name = "TZ")]
    timezone: Option<String>,
}

#[derive(Args, Debug)]
struct InviteArgs {
    #[arg(long = "site-domain", value_name = "DOMAIN")]
    site_domain: String,
    /// Email address receiving the invitation
    #[arg(long, value_name = "EMAIL")]
    email: String,
    #[arg(long, value_name = "admin|viewer", default_value = "viewer")]
    role: String,
    /// Email of the owner or admin issuing the invitation
    #[arg(long = "inviter-email", value_name = "EMAIL")]
    inviter_email: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_status = load_env_file();
    init_tracing();
    report_env_status(&env_status);

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_serve(config).await,
        Command::Migrate => run_migrate(config).await,
        Command::CreateUser(args) => run_create_user(config, args).await,
        Command::CreateSite(args) => run_create_site(config, args).await,
        Command::Invite(args) => run_invite(config, args).await,
    }
}

async fn run_serve(config: AppConfig) -> anyhow::Result<()> {
    info!(
        database_path = %config.database_path,
        database_max_connections = config.database_max_connections,
        pin_limit = config.pin_limit,
        default_page_size = config.default_page_size,
        max_page_size = config.max_page_size,
        "Starting server with database configuration"
    );
    let database = Database::connect(&config).await?;
    let state = build_state(&database, &config);
    let app = router::build_router(state);

    let listener = TcpListener::bind(config.bind_address)
        .await
        .context("failed to bind socket")?;
    let actual_addr = listener
        .local_addr()
        .context("failed to read local address")?;

    info!("listening on {actual_addr}");

    if let Err(error) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(?error, "server terminated with error");
    }

    Ok(())
}

async fn run_migrate(config: AppConfig) -> anyhow::Result<()> {
    let _database = Database::connect(&config).await?;
    info!("migrations completed");
    Ok(())
}

async fn run_create_user(config: AppConfig, args: CreateUserArgs) -> anyhow::Result<()> {
    if args.email.trim().is_empty() {
        bail!("email must not be empty");
    }

    let database = Database::connect(&config).await?;
    let user = UserStore::new(&database)
        .create(&args.email, args.name.as_deref())
        .await?;

    info!(user_id = %user.id, email = %user.email, "created user");
    println!("Created user {} ({})", user.email, user.id);
    Ok(())
}

async fn run_create_site(config: AppConfig, args: CreateSiteArgs) -> anyhow::Result<()> {
    let database = Database::connect(&config).await?;
    let state = build_state(&database, &config);
    let owner = find_user_by_email(&state.user_store, &args.owner_email).await?;

    let site = state
        .site_service
        .create_site(&owner, &args.domain, args.timezone.as_deref())
        .await
        .map_err(|err| anyhow!("failed to create site: {err}"))?;

    println!(
        "Created site '{}' ({}) for owner {}",
        site.domain, site.id, owner.email
    );
    Ok(())
}

async fn run_invite(config: AppConfig, args: InviteArgs) -> anyhow::Result<()> {
    let role = SiteRole::parse(&args.role)
        .with_context(|| format!("unknown role `{}`", args.role))?;

    let database = Database::connect(&config).await?;
    let state = build_state(&database, &config);
    let inviter = find_user_by_email(&state.user_store, &args.inviter_email).await?;
    let site = state
        .site_store
        .find_by_domain(&args.site_domain)
        .await?
        .with_context(|| format!("no site found with domain {}", args.site_domain))?;

    let viewer = Viewer::for_user(&inviter, &config);
    let invitation = state
        .site_service
        .invite(&viewer, &site.id, &args.email, role)
        .await
        .map_err(|err| anyhow!("failed to create invitation: {err}"))?;

    println!(
        "Invited {} to {} as {} ({})",
        invitation.email,
        site.domain,
        invitation.role.as_str(),
        invitation.id
    );
    Ok(())
}

async fn find_user_by_email(user_store: &UserStore, email: &str) -> anyhow::Result<UserRecord> {
    let normalized = email.trim();
    if normalized.is_empty() {
        bail!("email must not be empty");
    }

    user_store
        .find_by_email(normalized)
        .await?
        .with_context(|| format!("no user found with email {normalized}"))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // STATWELL_LOG_TO_STDOUT (anything but empty or "0") keeps logs on stdout.
    let log_to_stdout = std::env::var("STATWELL_LOG_TO_STDOUT")
        .map(|v| !v.trim().is_empty() && v.trim() != "0")
        .unwrap_or(false);

    if log_to_stdout
        && tracing_subscriber::fmt()
            .with_env_filter(env_filter.clone())
            .with_ansi(false)
            .json()
            .with_writer(std::io::stdout)
            .try_init()
            .is_ok()
    {
        return;
    }

    let log_dir = std::env::var("STATWELL_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    if let Err(err) = std::fs::create_dir_all(&log_dir) {
        eprintln!("failed to create log dir '{log_dir}': {err}");
        std::process::exit(1);
    }

    let file_appender = tracing_appender::rolling::daily(&log_dir, "server.log");
    let (writer, guard) = non_blocking(file_appender);

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .json()
        .with_writer(writer)
        .try_init()
        .is_ok()
    {
        let _ = TRACING_FILE_GUARD.set(guard);
    }
}

enum EnvLoadStatus {
    Loaded(PathBuf),
    NotFound,
    Failed(DotenvError),
}

fn load_env_file() -> EnvLoadStatus {
    if let Ok(env_file) = std::env::var("STATWELL_ENV_FILE") {
        let trimmed = env_file.trim();
        if !trimmed.is_empty() {
            let path = PathBuf::from(trimmed);
            return match from_filename(&path) {
                Ok(_) => EnvLoadStatus::Loaded(make_relative(&path).unwrap_or(path)),
                Err(err) => EnvLoadStatus::Failed(err),
            };
        }
    }

    match dotenv() {
        Ok(path) => EnvLoadStatus::Loaded(make_relative(&path).unwrap_or(path)),
        Err(DotenvError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            EnvLoadStatus::NotFound
        }
        Err(err) => EnvLoadStatus::Failed(err),
    }
}

fn report_env_status(status: &EnvLoadStatus) {
    match status {
        EnvLoadStatus::Loaded(path) => {
            info!("Loaded environment variables from {}", path.display());
        }
        EnvLoadStatus::NotFound => {
            info!("No .env file found; using process environment only");
        }
        EnvLoadStatus::Failed(err) => {
            warn!("Failed to load .env file: {err:?}");
        }
    }
}

fn make_relative(path: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    path.strip_prefix(&cwd).map(|p| p.to_path_buf()).ok()
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut term, mut int) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(err), _) | (_, Err(err)) => {
                error!(?err, "failed to install signal handlers; falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = term.recv() => {},
            _ = int.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
