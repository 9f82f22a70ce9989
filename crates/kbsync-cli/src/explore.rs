//! Interactive explorer over stdin.
//!
//! One line is one command. Debounce and poll timers run on the same
//! current-thread loop as input, so membership keeps converging while the
//! prompt waits.

use std::io::{IsTerminal, Write as _};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};

use kbsync_core::{
    CreateOutcome, ExplorerSession, PendingOperation, RepositoryError, ResourceView,
    SyncError, TickReport, ToggleOutcome,
};

use crate::cli::{print_view, Context};
use crate::ui::{format, table, MessageType, Progress};

/// How long `wait` follows pending operations before giving up.
const WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sleep used by `wait` when no timer is armed.
const IDLE_WAIT: Duration = Duration::from_millis(250);

const HELP: &str = "\
Commands:
  ls                 show the current directory
  cd <id|name>       open a directory (`cd ..` goes up)
  up [k]             go up k levels (default 1)
  next, prev         change page
  search [term]      search the connection (no term clears)
  toggle <id|name>   index, deindex, or select a resource
  create             create a knowledge base from the selection
  kb <id|none>       switch knowledge base (`none` for selection mode)
  kbs                list knowledge bases
  conn [id]          list connections or switch to one
  wait               follow pending operations until they confirm
  status             show session state
  help               show this help
  quit               leave the explorer";

// ============================================================================
// Input parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Input {
    Empty,
    Ls,
    Cd(String),
    Up(usize),
    Next,
    Prev,
    Search(String),
    Toggle(String),
    Create,
    Kb(Option<String>),
    Kbs,
    Conn(Option<String>),
    Wait,
    Status,
    Help,
    Quit,
}

/// Parse one line. The argument is the rest of the line, quotes optional.
pub(crate) fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, unquote(rest)),
        None => (line, String::new()),
    };
    let required = |what: &str| {
        if rest.is_empty() {
            Err(format!("`{}` needs {}", command, what))
        } else {
            Ok(rest.clone())
        }
    };

    let input = match command {
        "" => Input::Empty,
        "ls" => Input::Ls,
        "cd" => Input::Cd(required("a directory")?),
        "up" => match rest.as_str() {
            "" => Input::Up(1),
            n => Input::Up(
                n.parse()
                    .map_err(|_| format!("`up` expects a number, got `{}`", n))?,
            ),
        },
        "next" => Input::Next,
        "prev" => Input::Prev,
        "search" => Input::Search(rest),
        "toggle" => Input::Toggle(required("a resource")?),
        "create" => Input::Create,
        "kb" => match required("a knowledge base id or `none`")?.as_str() {
            "none" => Input::Kb(None),
            id => Input::Kb(Some(id.to_string())),
        },
        "kbs" => Input::Kbs,
        "conn" => Input::Conn((!rest.is_empty()).then_some(rest)),
        "wait" => Input::Wait,
        "status" => Input::Status,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        other => return Err(format!("Unknown command `{}`. Type `help`.", other)),
    };
    Ok(input)
}

fn unquote(text: &str) -> String {
    let text = text.trim();
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
        .to_string()
}

/// Find a row by id, then exact name, then path, then case-insensitive name.
pub(crate) fn resolve_resource<'a>(rows: &'a [ResourceView], key: &str) -> Option<&'a ResourceView> {
    let key = key.trim().trim_end_matches('/');
    if key.is_empty() {
        return None;
    }
    let lowered = key.to_lowercase();
    rows.iter()
        .find(|row| row.resource.resource_id.as_str() == key)
        .or_else(|| rows.iter().find(|row| row.resource.name() == key))
        .or_else(|| rows.iter().find(|row| row.resource.path == key))
        .or_else(|| rows.iter().find(|row| row.resource.name().to_lowercase() == lowered))
}

/// Breadcrumb index `k` levels above a directory `depth` levels deep.
pub(crate) fn up_target(depth: usize, levels: usize) -> isize {
    (depth as isize - 1 - levels as isize).max(-1)
}

// ============================================================================
// Explorer
// ============================================================================

pub(crate) struct Explorer<'a> {
    ctx: &'a Context,
    session: ExplorerSession,
}

impl<'a> Explorer<'a> {
    pub fn new(ctx: &'a Context, session: ExplorerSession) -> Self {
        Self { ctx, session }
    }

    /// Read commands until `quit` or end of input.
    ///
    /// Returns an error only when the session can no longer continue (the
    /// token was rejected, or stdin failed).
    pub async fn run(&mut self) -> Result<(), SyncError> {
        let interactive = std::io::stdin().is_terminal();
        self.reload().await?;
        if interactive {
            println!("{}", self.ctx.style.message(MessageType::Hint, "Type `help` for commands"));
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut prompt = true;
        loop {
            if interactive && prompt {
                print!("kbsync> ");
                std::io::stdout().flush()?;
                prompt = false;
            }

            let timer = self.session.next_timer_in();
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    prompt = true;
                    match parse_input(&line) {
                        Ok(Input::Quit) => break,
                        Ok(input) => self.execute(input).await?,
                        Err(message) => {
                            println!("{}", self.ctx.style.message(MessageType::Warn, &message));
                        }
                    }
                }
                _ = sleep_for(timer) => {
                    prompt = self.on_timer().await? || prompt;
                }
            }
        }
        Ok(())
    }

    /// Run one command. Command failures are printed; only a rejected token
    /// ends the session.
    async fn execute(&mut self, input: Input) -> Result<(), SyncError> {
        let result = match input {
            Input::Empty | Input::Quit => Ok(()),
            Input::Ls => self.reload().await,
            Input::Cd(target) => self.cd(&target).await,
            Input::Up(levels) => self.up(levels).await,
            Input::Next => self.page(true).await,
            Input::Prev => self.page(false).await,
            Input::Search(term) => self.search(&term).await,
            Input::Toggle(target) => self.toggle(&target).await,
            Input::Create => self.create().await,
            Input::Kb(id) => self.switch_knowledge_base(id).await,
            Input::Kbs => {
                self.print_knowledge_bases();
                Ok(())
            }
            Input::Conn(id) => self.connection(id).await,
            Input::Wait => self.wait().await,
            Input::Status => {
                self.print_status();
                Ok(())
            }
            Input::Help => {
                println!("{}", HELP);
                Ok(())
            }
        };

        match result {
            Err(e) if e.is_unauthorized() => Err(e),
            Err(e) => {
                println!("{}", self.ctx.style.message(MessageType::Err, &e.to_string()));
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    /// Handle due timers. Returns true when something was printed.
    async fn on_timer(&mut self) -> Result<bool, SyncError> {
        let report = self.session.tick().await;
        let mut printed = self.report_tick(&report)?;
        if report.search_settled.is_some() {
            self.reload().await?;
            printed = true;
        }
        Ok(printed)
    }

    fn report_tick(&self, report: &TickReport) -> Result<bool, SyncError> {
        if report.unauthorized {
            return Err(SyncError::Repository(RepositoryError::Unauthorized));
        }
        let style = &self.ctx.style;
        for error in &report.errors {
            println!("{}", style.message(MessageType::Warn, &error.to_string()));
        }
        if report.confirmed > 0 {
            println!(
                "{}",
                style.message(
                    MessageType::Ok,
                    &format!("{} confirmed", format::pluralize(report.confirmed, "resource"))
                )
            );
        }
        Ok(!report.errors.is_empty() || report.confirmed > 0)
    }

    async fn reload(&mut self) -> Result<(), SyncError> {
        let mode = self.ctx.progress_mode(false);
        let report = self.ctx.refresh(&mut self.session, "Loading...", mode).await?;
        self.ctx.warn_errors(&report.errors);
        print_view(&self.ctx.style, &self.session.view());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    async fn cd(&mut self, target: &str) -> Result<(), SyncError> {
        if target == ".." {
            return self.up(1).await;
        }
        let view = self.session.view();
        let id = resolve_resource(&view.resources, target)
            .map(|row| row.resource.resource_id.clone())
            .ok_or_else(|| SyncError::ResourceNotFound(target.to_string()))?;
        self.session.open_directory(&id)?;
        self.reload().await
    }

    async fn up(&mut self, levels: usize) -> Result<(), SyncError> {
        let depth = self.session.navigation().breadcrumbs().len().saturating_sub(1);
        if depth == 0 {
            println!("{}", self.ctx.style.message(MessageType::Skip, "Already at the root"));
            return Ok(());
        }
        self.session.jump_to_breadcrumb(up_target(depth, levels));
        self.reload().await
    }

    async fn page(&mut self, forward: bool) -> Result<(), SyncError> {
        let moved = if forward {
            self.session.next_page()
        } else {
            self.session.previous_page()
        };
        if !moved {
            let text = if forward { "Already on the last page" } else { "Already on the first page" };
            println!("{}", self.ctx.style.message(MessageType::Skip, text));
            return Ok(());
        }
        self.reload().await
    }

    /// Type a search term and wait for it to settle.
    async fn search(&mut self, term: &str) -> Result<(), SyncError> {
        self.session.set_search_term(term);
        while self.session.navigation().debounced_search_term() != term {
            let Some(delay) = self.session.next_timer_in() else {
                break;
            };
            tokio::time::sleep(delay).await;
            let report = self.session.tick().await;
            self.report_tick(&report)?;
        }
        self.reload().await
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    async fn toggle(&mut self, target: &str) -> Result<(), SyncError> {
        let view = self.session.view();
        let row = resolve_resource(&view.resources, target)
            .cloned()
            .ok_or_else(|| SyncError::ResourceNotFound(target.to_string()))?;
        let name = row.resource.name().to_string();
        let style = &self.ctx.style;

        match self.session.toggle(&row.resource.resource_id).await? {
            ToggleOutcome::Ignored => {
                println!(
                    "{}",
                    style.message(MessageType::Skip, &format!("`{}` is already syncing", name))
                );
            }
            ToggleOutcome::Selection { selected } => {
                let verb = if selected { "Selected" } else { "Deselected" };
                let count = self.session.view().selection_count;
                println!(
                    "{}",
                    style.message(MessageType::Ok, &format!("{} `{}` ({} selected)", verb, name, count))
                );
            }
            ToggleOutcome::Dispatched(report) => {
                for failure in &report.failures {
                    println!("{}", style.message(MessageType::Err, &failure.to_string()));
                }
                if report.succeeded() > 0 {
                    let removing = report
                        .issued
                        .iter()
                        .any(|(_, op)| *op == PendingOperation::Deindex);
                    let verb = if removing { "Removing" } else { "Indexing" };
                    println!(
                        "{}",
                        style.message(
                            MessageType::Ok,
                            &format!(
                                "{} `{}` ({})",
                                verb,
                                name,
                                format::pluralize(report.issued.len(), "resource")
                            )
                        )
                    );
                }
                if self.session.has_pending() {
                    let pending = self.session.view().pending_count;
                    self.ctx.info(&format!("{} syncing", format::pluralize(pending, "resource")));
                }
            }
        }
        Ok(())
    }

    async fn create(&mut self) -> Result<(), SyncError> {
        let progress = Progress::spinner("Creating knowledge base...", self.ctx.progress_mode(false));
        let outcome = self.session.create_and_sync_knowledge_base().await;
        progress.finish_clear();

        match outcome? {
            CreateOutcome::Created {
                knowledge_base,
                resource_ids,
            } => {
                println!(
                    "{}",
                    self.ctx.style.message(
                        MessageType::Ok,
                        &format!(
                            "Created knowledge base {} from {}",
                            self.ctx.style.short_id(&knowledge_base.knowledge_base_id),
                            format::pluralize(resource_ids.len(), "source")
                        )
                    )
                );
                println!(
                    "{}",
                    self.ctx
                        .style
                        .message(MessageType::Hint, "Indexing started; `wait` follows it")
                );
                self.reload().await
            }
            CreateOutcome::Skipped { reason } => {
                println!("{}", self.ctx.style.message(MessageType::Skip, &reason));
                Ok(())
            }
        }
    }

    /// Follow pending operations until every one is confirmed or the wait
    /// times out.
    async fn wait(&mut self) -> Result<(), SyncError> {
        if !self.session.has_pending() {
            println!("{}", self.ctx.style.message(MessageType::Skip, "Nothing is syncing"));
            return Ok(());
        }

        let started = Instant::now();
        let progress = Progress::spinner("Waiting for the backend...", self.ctx.progress_mode(false));
        while self.session.has_pending() && started.elapsed() < WAIT_TIMEOUT {
            let pending = self.session.view().pending_count;
            progress.set_message(&format!(
                "Waiting for {} to sync...",
                format::pluralize(pending, "resource")
            ));
            let delay = self.session.next_timer_in().unwrap_or(IDLE_WAIT);
            tokio::time::sleep(delay).await;
            let report = self.session.tick().await;
            if report.unauthorized {
                progress.finish_clear();
                return Err(SyncError::Repository(RepositoryError::Unauthorized));
            }
        }
        progress.finish_clear();

        if self.session.has_pending() {
            let pending = self.session.view().pending_count;
            println!(
                "{}",
                self.ctx.style.message(
                    MessageType::Warn,
                    &format!(
                        "{} still syncing after {}s",
                        format::pluralize(pending, "resource"),
                        WAIT_TIMEOUT.as_secs()
                    )
                )
            );
        } else {
            println!("{}", self.ctx.style.message(MessageType::Ok, "All resources synced"));
        }
        self.reload().await
    }

    // ------------------------------------------------------------------
    // Connections and knowledge bases
    // ------------------------------------------------------------------

    async fn switch_knowledge_base(&mut self, id: Option<String>) -> Result<(), SyncError> {
        let Some(key) = id else {
            self.session.select_knowledge_base(None);
            self.ctx.info("Selection mode: toggle resources, then `create`");
            return self.reload().await;
        };

        let known = self.session.knowledge_bases();
        let found = known
            .iter()
            .find(|kb| kb.knowledge_base_id == key)
            .or_else(|| known.iter().find(|kb| kb.display_name() == key))
            .map(|kb| kb.knowledge_base_id.clone());
        let id = match found {
            Some(id) => id,
            None if known.is_empty() => key,
            None => return Err(SyncError::Precondition(format!("unknown knowledge base `{}`", key))),
        };
        self.session.select_knowledge_base(Some(id));
        self.reload().await
    }

    async fn connection(&mut self, id: Option<String>) -> Result<(), SyncError> {
        let Some(id) = id else {
            let connections = self.session.connections();
            if connections.is_empty() {
                self.ctx.info("No connections");
            } else {
                println!("{}", table::render_connections_table(connections));
            }
            return Ok(());
        };
        if !self.session.connections().iter().any(|c| c.connection_id == id) {
            return Err(SyncError::Precondition(format!("unknown connection `{}`", id)));
        }
        self.session.select_connection(id);
        self.reload().await
    }

    fn print_knowledge_bases(&self) {
        let knowledge_bases = self.session.knowledge_bases();
        if knowledge_bases.is_empty() {
            self.ctx.info("No knowledge bases");
        } else {
            println!(
                "{}",
                table::render_knowledge_bases_table(knowledge_bases, self.session.knowledge_base_id())
            );
        }
    }

    fn print_status(&self) {
        let style = &self.ctx.style;
        let view = self.session.view();
        let mode = if self.session.is_online() { "online" } else { "offline" };
        println!("{}", style.section("STATUS"));
        println!();
        println!("  {}", style.key_value("Mode", mode));
        println!(
            "  {}",
            style.key_value("Connection", view.connection_id.as_deref().unwrap_or("(none)"))
        );
        println!(
            "  {}",
            style.key_value(
                "Knowledge base",
                view.knowledge_base_id.as_deref().unwrap_or("(selection mode)")
            )
        );
        println!(
            "  {}",
            style.key_value("Location", &format::format_breadcrumbs(&view.breadcrumbs))
        );
        println!(
            "  {}",
            style.key_value("Page", &(view.page_index + 1).to_string())
        );
        if !view.search_term.is_empty() {
            println!("  {}", style.key_value("Search", &view.search_term));
        }
        println!("  {}", style.key_value("Pending", &view.pending_count.to_string()));
        println!("  {}", style.key_value("Selected", &view.selection_count.to_string()));
        println!(
            "  {}",
            style.key_value("Polling", if view.is_polling { "yes" } else { "no" })
        );
    }
}

async fn sleep_for(timer: Option<Duration>) {
    match timer {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}
