//! CLI definition and command dispatch for kbsync.
//!
//! This module defines the command-line interface using `clap` and provides
//! the `run()` function that dispatches commands to the sync engine.
//!
//! ## Configuration Precedence
//!
//! Configuration is resolved with the following precedence (highest to lowest):
//! 1. CLI flags (e.g., `--offline`, `--backend-url`)
//! 2. Environment variables (`KBSYNC_CONFIG`, `KBSYNC_OFFLINE`, `KBSYNC_TOKEN`)
//! 3. Config file (`~/.kbsync/config.yaml` or path from `--config`/`KBSYNC_CONFIG`)
//! 4. Built-in defaults

use std::io::{BufRead, IsTerminal, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::explore::{resolve_resource, Explorer};
use crate::ui::{format, table, ColorMode, MessageType, Progress, ProgressMode, Style};

use kbsync_client::{fetch_access_token, ClientError, Credentials, ModeRepository, TokenStore};
use kbsync_core::{
    AuthContext, Clock, ExplorerSession, ExplorerView, ManualClock, RefreshReport,
    RepositoryError, ResourceRepository, SyncConfig, SyncError, SystemClock, UnauthorizedSignal,
};

// ============================================================================
// CLI Definition
// ============================================================================

/// Version string including git commit hash
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

const NOT_LOGGED_IN: &str = "Not logged in";

/// Knowledge-base sync explorer
#[derive(Parser, Debug)]
#[command(name = "kbsync")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "KBSYNC_VERBOSE")]
    pub verbose: bool,

    /// Suppress progress and informational messages
    #[arg(short, long, global = true, env = "KBSYNC_QUIET")]
    pub quiet: bool,

    /// Path to configuration file (default: ~/.kbsync/config.yaml)
    #[arg(long, global = true, env = "KBSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Use the built-in offline repository instead of the backend
    #[arg(long, global = true, env = "KBSYNC_OFFLINE")]
    pub offline: bool,

    /// Base URL of the repository API (overrides backendUrl)
    #[arg(long, global = true, env = "KBSYNC_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Path of the offline membership store (overrides storePath)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Bearer token to use instead of the stored one
    #[arg(long, global = true, env = "KBSYNC_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Color output mode
    #[arg(long, global = true, env = "KBSYNC_COLOR", value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and store the access token
    #[command(after_help = r#"EXAMPLES:
    # Prompt for the password on stdin
    kbsync login --email me@example.com

    # Non-interactive
    KBSYNC_PASSWORD=secret kbsync login --email me@example.com
"#)]
    Login {
        /// Account email
        #[arg(long, env = "KBSYNC_EMAIL")]
        email: String,

        /// Account password (read from stdin when omitted)
        #[arg(long, env = "KBSYNC_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Remove the stored access token
    Logout,

    /// List storage connections
    Connections {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List knowledge bases
    #[command(name = "kbs")]
    KnowledgeBases {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show one page of a directory with its indexing status
    #[command(after_help = r#"EXAMPLES:
    # Root of the first connection, statuses from the first knowledge base
    kbsync ls

    # A nested directory, by name or id
    kbsync ls --dir "My Documents" --dir "Subfolder A"

    # Search across the connection
    kbsync ls --search report --page 2

    # Selection mode (no knowledge base)
    kbsync ls --kb none

    # Machine-readable view
    kbsync ls --json | jq '.resources[].status'
"#)]
    Ls {
        /// Connection id (default: the first connection)
        #[arg(long)]
        connection: Option<String>,

        /// Knowledge base id, or `none` for selection mode (default: the first)
        #[arg(long)]
        kb: Option<String>,

        /// Directory to descend into; repeat for nested directories
        #[arg(long)]
        dir: Vec<String>,

        /// Search term
        #[arg(long)]
        search: Option<String>,

        /// Page number, starting at 1
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        /// Output the reconciled view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive explorer reading commands from stdin
    #[command(after_help = r#"EXAMPLES:
    # Interactive session
    kbsync explore

    # Scripted session
    printf 'cd "My Documents"\ntoggle File A.txt\nwait\nls\n' | kbsync explore
"#)]
    Explore,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration and report warnings
    Check {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the resolved configuration (file plus flags)
    Show,
}

// ============================================================================
// Context
// ============================================================================

/// Resolved configuration and shared handles for one invocation.
pub(crate) struct Context {
    pub style: Style,
    pub config: SyncConfig,
    pub config_path: Option<PathBuf>,
    pub tokens: TokenStore,
    pub token_override: Option<String>,
    pub signal: UnauthorizedSignal,
    pub quiet: bool,
}

impl Context {
    pub fn progress_mode(&self, json: bool) -> ProgressMode {
        ProgressMode::detect(self.quiet, json, self.style.color_mode())
    }

    pub fn info(&self, text: &str) {
        if !self.quiet {
            println!("{}", self.style.message(MessageType::Info, text));
        }
    }

    /// The bearer token, or an error pointing at `kbsync login`.
    fn require_token(&self) -> Result<String, SyncError> {
        if let Some(token) = self.token_override.as_deref().filter(|t| !t.trim().is_empty()) {
            return Ok(token.trim().to_string());
        }
        self.tokens
            .load()
            .map_err(client_error)?
            .ok_or_else(|| SyncError::Precondition(NOT_LOGGED_IN.to_string()))
    }

    fn repository(&self, clock: Arc<dyn Clock>) -> Result<Arc<ModeRepository>, SyncError> {
        let repository =
            ModeRepository::from_config(&self.config, clock, self.signal.clone()).map_err(client_error)?;
        Ok(Arc::new(repository))
    }

    pub fn open_session(&self, clock: Arc<dyn Clock>) -> Result<ExplorerSession, SyncError> {
        let token = self.require_token()?;
        let repository: Arc<dyn ResourceRepository> = self.repository(Arc::clone(&clock))?;
        let mut auth = AuthContext::new();
        auth.load(Some(token));
        Ok(ExplorerSession::new(
            repository,
            auth,
            self.config.online,
            self.config.session_settings(),
            clock,
        ))
    }

    /// Refresh under a spinner. A rejected token is an error; other fetch
    /// failures stay in the report.
    pub async fn refresh(
        &self,
        session: &mut ExplorerSession,
        message: &str,
        mode: ProgressMode,
    ) -> Result<RefreshReport, SyncError> {
        let progress = Progress::spinner(message, mode);
        let report = session.refresh().await;
        progress.finish_clear();
        if report.unauthorized {
            return Err(SyncError::Repository(RepositoryError::Unauthorized));
        }
        Ok(report)
    }

    /// Print non-fatal fetch failures to stderr.
    pub fn warn_errors(&self, errors: &[SyncError]) {
        for error in errors {
            eprintln!("{}", self.style.message(MessageType::Warn, &error.to_string()));
        }
    }
}

fn client_error(err: ClientError) -> SyncError {
    match err {
        ClientError::Repository(inner) => SyncError::Repository(inner),
        other => SyncError::Other(other.into()),
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Run the CLI with the given arguments.
///
/// Returns `ExitCode::SUCCESS` on success, or `ExitCode::FAILURE` on error.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Always show warnings; debug only under --verbose
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = format!(
        "kbsync_core={level},kbsync_client={level},kbsync_store={level},kbsync={level}",
        level = log_level
    );

    tracing_subscriber::fmt()
        .with_env_filter(&filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let style = Style::new(cli.color);

    let loaded = match &cli.config {
        Some(path) => SyncConfig::from_path(path),
        None => SyncConfig::load_default(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            let hint = match &cli.config {
                Some(path) => format!("Check your config at {}", path.display()),
                None => "Check your config at ~/.kbsync/config.yaml".to_string(),
            };
            eprintln!(
                "{}",
                style.error_with_context("Failed to load configuration", Some(&e.to_string()), Some(&hint))
            );
            return ExitCode::FAILURE;
        }
    };

    if cli.offline {
        config.online = false;
    }
    if let Some(url) = &cli.backend_url {
        config.backend_url = Some(url.clone());
    }
    if let Some(store) = &cli.store {
        config.store_path = Some(store.clone());
    }

    let context = Context {
        style,
        tokens: TokenStore::new(config.effective_token_path()),
        config,
        config_path: cli.config.clone(),
        token_override: cli.token.clone(),
        signal: UnauthorizedSignal::new(),
        quiet: cli.quiet,
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!(
                "{}",
                context
                    .style
                    .message(MessageType::Err, &format!("Failed to start async runtime: {}", e))
            );
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(dispatch(&context, cli.command));

    let expired = context.signal.raised_count() > 0
        || result.as_ref().err().is_some_and(SyncError::is_unauthorized);
    if expired {
        force_logout(&context);
        return ExitCode::FAILURE;
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let hint = hint_for(&e, &context);
            eprintln!(
                "{}",
                context.style.error_with_context(&e.to_string(), None, hint.as_deref())
            );
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(ctx: &Context, command: Command) -> Result<(), SyncError> {
    match command {
        Command::Login { email, password } => handle_login(ctx, email, password).await,
        Command::Logout => handle_logout(ctx),
        Command::Connections { json } => handle_connections(ctx, json).await,
        Command::KnowledgeBases { json } => handle_knowledge_bases(ctx, json).await,
        Command::Ls {
            connection,
            kb,
            dir,
            search,
            page,
            json,
        } => handle_ls(ctx, connection, kb, dir, search, page, json).await,
        Command::Explore => handle_explore(ctx).await,
        Command::Config { action } => match action {
            ConfigAction::Check { json } => handle_config_check(ctx, json),
            ConfigAction::Show => handle_config_show(ctx),
        },
    }
}

/// Remove the stored token after the backend rejected it.
fn force_logout(ctx: &Context) {
    if let Err(e) = ctx.tokens.clear() {
        debug!("Could not remove token after 401: {}", e);
    }
    eprintln!(
        "{}",
        ctx.style.error_with_context(
            "Session expired",
            Some("The backend rejected the access token"),
            Some("Run `kbsync login` to sign in again"),
        )
    );
}

fn hint_for(err: &SyncError, ctx: &Context) -> Option<String> {
    match err {
        SyncError::Precondition(msg) if msg == NOT_LOGGED_IN => {
            Some("Run `kbsync login` or pass --token".to_string())
        }
        SyncError::Repository(RepositoryError::MissingInput(_)) => {
            Some("Set backendUrl in the config or run with --offline".to_string())
        }
        SyncError::InvalidConfig(_) | SyncError::InvalidConfiguration { .. } => Some(match &ctx.config_path {
            Some(path) => format!("Check your config at {}", path.display()),
            None => "Check your config at ~/.kbsync/config.yaml".to_string(),
        }),
        SyncError::ResourceNotFound(_) => Some("Run `kbsync ls` to see the current listing".to_string()),
        _ => None,
    }
}

// ============================================================================
// Command handlers
// ============================================================================

async fn handle_login(ctx: &Context, email: String, password: Option<String>) -> Result<(), SyncError> {
    let auth_url = ctx.config.auth_url.as_deref().ok_or_else(|| {
        client_error(ClientError::missing_setting("authUrl", "Set authUrl in the config"))
    })?;
    let anon_key = ctx.config.auth_anon_key.as_deref().ok_or_else(|| {
        client_error(ClientError::missing_setting("authAnonKey", "Set authAnonKey in the config"))
    })?;

    let password = match password {
        Some(password) => password,
        None => read_password()?,
    };
    let credentials = Credentials { email, password };

    let progress = Progress::spinner("Signing in...", ctx.progress_mode(false));
    let token = fetch_access_token(auth_url, anon_key, &credentials).await;
    progress.finish_clear();

    let token = token.map_err(client_error)?;
    ctx.tokens.save(&token).map_err(client_error)?;
    println!(
        "{}",
        ctx.style
            .message(MessageType::Ok, &format!("Logged in as {}", credentials.email))
    );
    Ok(())
}

fn read_password() -> Result<String, SyncError> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprint!("Password: ");
        std::io::stderr().flush()?;
    }
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    let password = line.trim_end_matches(&['\r', '\n'][..]).to_string();
    if password.is_empty() {
        return Err(SyncError::Precondition("password is empty".to_string()));
    }
    Ok(password)
}

fn handle_logout(ctx: &Context) -> Result<(), SyncError> {
    if ctx.tokens.clear().map_err(client_error)? {
        println!("{}", ctx.style.message(MessageType::Ok, "Logged out"));
    } else {
        println!("{}", ctx.style.message(MessageType::Skip, "Not logged in"));
    }
    Ok(())
}

async fn handle_connections(ctx: &Context, json: bool) -> Result<(), SyncError> {
    let token = ctx.require_token()?;
    let repository = ctx.repository(Arc::new(SystemClock::new()))?;

    let progress = Progress::spinner("Loading connections...", ctx.progress_mode(json));
    let connections = repository.list_connections(ctx.config.online, &token).await;
    progress.finish_clear();
    let connections = connections?;

    if json {
        println!("{}", serde_json::to_string_pretty(&connections)?);
    } else if connections.is_empty() {
        ctx.info("No connections");
    } else {
        println!("{}", table::render_connections_table(&connections));
    }
    Ok(())
}

async fn handle_knowledge_bases(ctx: &Context, json: bool) -> Result<(), SyncError> {
    let token = ctx.require_token()?;
    let repository = ctx.repository(Arc::new(SystemClock::new()))?;

    let progress = Progress::spinner("Loading knowledge bases...", ctx.progress_mode(json));
    let knowledge_bases = repository.list_knowledge_bases(ctx.config.online, &token).await;
    progress.finish_clear();
    let knowledge_bases = knowledge_bases?;

    if json {
        println!("{}", serde_json::to_string_pretty(&knowledge_bases)?);
    } else if knowledge_bases.is_empty() {
        ctx.info("No knowledge bases");
    } else {
        // The explorer adopts the first one by default
        let default = knowledge_bases.first().map(|kb| kb.knowledge_base_id.as_str());
        println!("{}", table::render_knowledge_bases_table(&knowledge_bases, default));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_ls(
    ctx: &Context,
    connection: Option<String>,
    kb: Option<String>,
    dirs: Vec<String>,
    search: Option<String>,
    page: u32,
    json: bool,
) -> Result<(), SyncError> {
    let clock = Arc::new(ManualClock::new());
    let mut session = ctx.open_session(clock.clone())?;
    let mode = ctx.progress_mode(json);

    if let Some(connection) = connection {
        session.select_connection(connection);
    }
    match kb.as_deref() {
        Some("none") => session.select_knowledge_base(None),
        Some(id) => session.select_knowledge_base(Some(id.to_string())),
        None => {}
    }
    let report = ctx.refresh(&mut session, "Loading resources...", mode).await?;
    if session.connection_id().is_none() {
        let mut errors = report.errors.into_iter();
        return Err(errors
            .next()
            .unwrap_or_else(|| SyncError::Precondition("no connection available".to_string())));
    }
    ctx.warn_errors(&report.errors);

    for dir in &dirs {
        let view = session.view();
        let target = resolve_resource(&view.resources, dir)
            .map(|row| row.resource.resource_id.clone())
            .ok_or_else(|| SyncError::ResourceNotFound(dir.clone()))?;
        session.open_directory(&target)?;
        let report = ctx.refresh(&mut session, "Loading resources...", mode).await?;
        ctx.warn_errors(&report.errors);
    }

    if let Some(term) = search {
        session.set_search_term(&term);
        clock.advance(ctx.config.session_settings().search_debounce);
        session.tick().await;
        let report = ctx.refresh(&mut session, "Searching...", mode).await?;
        ctx.warn_errors(&report.errors);
    }

    for _ in 1..page {
        if !session.next_page() {
            return Err(SyncError::Precondition(format!("page {} is past the last page", page)));
        }
        let report = ctx.refresh(&mut session, "Loading page...", mode).await?;
        ctx.warn_errors(&report.errors);
    }

    let view = session.view();
    if let Some(error) = &view.listing_error {
        return Err(SyncError::Fetch {
            query: "listing".to_string(),
            message: error.clone(),
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_view(&ctx.style, &view);
    }
    Ok(())
}

async fn handle_explore(ctx: &Context) -> Result<(), SyncError> {
    let session = ctx.open_session(Arc::new(SystemClock::new()))?;
    let mut explorer = Explorer::new(ctx, session);
    explorer.run().await
}

fn handle_config_check(ctx: &Context, json: bool) -> Result<(), SyncError> {
    let warnings = ctx.config.validate()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "valid": true, "warnings": warnings }))?
        );
        return Ok(());
    }

    if warnings.is_empty() {
        println!("{}", ctx.style.message(MessageType::Ok, "Configuration is valid"));
    } else {
        println!(
            "{}",
            ctx.style
                .message(MessageType::Warn, &format!("{} warning(s):", warnings.len()))
        );
        for warning in &warnings {
            println!("  • {}", warning);
        }
        println!();
        println!(
            "{}",
            ctx.style
                .message(MessageType::Ok, "Configuration is valid with warnings")
        );
    }
    Ok(())
}

fn handle_config_show(ctx: &Context) -> Result<(), SyncError> {
    let mut resolved = serde_json::to_value(&ctx.config)?;
    if let Some(object) = resolved.as_object_mut() {
        object.insert(
            "storePath".to_string(),
            ctx.config.effective_store_path().display().to_string().into(),
        );
        object.insert(
            "tokenPath".to_string(),
            ctx.config.effective_token_path().display().to_string().into(),
        );
    }
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}

// ============================================================================
// Shared rendering
// ============================================================================

/// Print the location line, the reconciled table, and a footer.
pub(crate) fn print_view(style: &Style, view: &ExplorerView) {
    println!("{}", style.section(&format::format_breadcrumbs(&view.breadcrumbs)));
    if !view.debounced_search_term.trim().is_empty() {
        println!(
            "{}",
            style.key_value("Search", view.debounced_search_term.trim())
        );
    }

    if let Some(error) = &view.membership_error {
        println!(
            "{}",
            style.message(MessageType::Warn, &format!("Statuses may be stale: {}", error))
        );
    }

    if view.resources.is_empty() {
        let text = if view.is_loading {
            "Loading..."
        } else if view.debounced_search_term.trim().is_empty() {
            "Empty directory"
        } else {
            "No matches"
        };
        println!("{}", style.message(MessageType::Info, text));
    } else if view.knowledge_base_id.is_none() {
        let is_selected = |row: &kbsync_core::ResourceView| view.selected.contains(&row.resource.resource_id);
        println!(
            "{}",
            table::render_resources_table(style, &view.resources, Some(&is_selected))
        );
    } else {
        println!("{}", table::render_resources_table(style, &view.resources, None));
    }

    let mut footer = vec![format!("page {}", view.page_index + 1)];
    if view.has_next_page {
        footer.push("more with `next`".to_string());
    }
    if view.pending_count > 0 {
        footer.push(format!("{} syncing", format::pluralize(view.pending_count, "resource")));
    }
    if view.knowledge_base_id.is_none() {
        footer.push(format!("{} selected", view.selection_count));
    }
    println!("{}", style.message_detail("Showing", &footer.join(", ")));
}
