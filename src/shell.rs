//! Interactive session shell.
//!
//! Everything quirk tracks is session-scoped and in-memory (staged files,
//! token, live job, DB config), so the process runs as a line-oriented
//! session rather than one-shot subcommands. The loop `select!`s between
//! user input and pipeline events so a status poll resolving never blocks
//! typing, and vice versa.
//!
//! Readiness gating lives here: a disabled action prints why instead of
//! issuing a request. The gates are UI preconditions only; the client layer
//! passes whatever it is given through to the backend.

use crate::auth::AuthSession;
use crate::client::{BackendClient, ExportFormat, StoreOperation};
use crate::config::{DbConfig, DbField, Settings};
use crate::error::Result;
use crate::export;
use crate::mode::Mode;
use crate::pipeline::{JobOrchestrator, JobStatus, PipelineEvent, PollSchedule};
use crate::progress;
use crate::search::{self, QueryGateway};
use crate::staging::{format_file_size, FileStaging};
use crate::store::StoreGateway;
use indicatif::ProgressBar;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::error;

/// Why `store` is currently disabled, if it is.
fn store_unavailable_reason(status: JobStatus, db: &DbConfig) -> Option<&'static str> {
    if status != JobStatus::Completed {
        return Some("store is enabled once an embedding job has completed");
    }
    if !db.is_ready() {
        return Some("store needs every ChromaDB field set; see 'db show'");
    }
    None
}

/// Why `search` is currently disabled, if it is. Deliberately looser than
/// the store gate: any set field counts as a config.
fn search_unavailable_reason(text: &str, db: &DbConfig) -> Option<&'static str> {
    if text.trim().is_empty() {
        return Some("search needs a non-blank query");
    }
    if !db.is_set() {
        return Some("search needs a ChromaDB config; see 'db set'");
    }
    None
}

/// Why `export` is currently disabled, if it is.
fn export_unavailable_reason(status: JobStatus) -> Option<&'static str> {
    if status != JobStatus::Completed {
        return Some("export is enabled once an embedding job has completed");
    }
    None
}

/// Notice for an event that ends the tracked job. `None` for progress
/// events, which only update the spinner.
fn event_notice(event: &PipelineEvent) -> Option<String> {
    match event {
        PipelineEvent::Submitted { .. } | PipelineEvent::StillProcessing { .. } => None,
        PipelineEvent::Completed { object_id } => Some(format!(
            "✓ Embeddings ready for job {}\n  'export <json|csv>' and 'store [add|update]' are now enabled",
            object_id
        )),
        PipelineEvent::PollFailed { message } => {
            Some(format!("Embedding job failed: {}", message))
        }
        PipelineEvent::TimedOut { checks } => Some(format!(
            "Embedding job timed out after {} status check(s)",
            checks
        )),
    }
}

pub struct Session {
    client: Arc<BackendClient>,
    mode: Mode,
    db: DbConfig,
    staging: FileStaging,
    auth: AuthSession,
    orchestrator: JobOrchestrator,
    store: StoreGateway,
    query: QueryGateway,
    spinner: Option<ProgressBar>,
    out_dir: PathBuf,
}

impl Session {
    pub fn new(
        settings: &Settings,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PipelineEvent>)> {
        let client = Arc::new(BackendClient::new(
            &settings.backend_url,
            Duration::from_secs(settings.timeout_secs),
        )?);
        let (orchestrator, events) =
            JobOrchestrator::new(Arc::clone(&client), PollSchedule::from(settings.poll));

        let session = Self {
            client,
            mode: Mode::default(),
            db: DbConfig::default(),
            staging: FileStaging::new(),
            auth: AuthSession::new(),
            orchestrator,
            store: StoreGateway::new(),
            query: QueryGateway::new(),
            spinner: None,
            out_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        Ok((session, events))
    }

    /// Handle one input line. Returns false when the session should end.
    /// Command failures are reported here as one-shot notices and never
    /// escape the loop.
    pub async fn dispatch(&mut self, line: &str) -> bool {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return true;
        };
        let args: Vec<&str> = parts.collect();

        match command {
            "help" | "?" => self.print_help(),
            "mode" => self.cmd_mode(&args),
            "login" => self.cmd_login(args.first().copied().unwrap_or("")).await,
            "stage" => self.cmd_stage(&args),
            "files" => self.cmd_files(),
            "unstage" => self.cmd_unstage(&args),
            "clear" => {
                self.staging.clear();
                println!("✓ Staged files cleared");
            }
            "submit" => self.cmd_submit().await,
            "status" => self.cmd_status(),
            "export" => self.cmd_export(&args).await,
            "db" => self.cmd_db(&args).await,
            "store" => self.cmd_store(&args).await,
            "search" => self.cmd_search(&args).await,
            "results" => self.cmd_results(),
            "reset" => self.cmd_reset(),
            "quit" | "exit" => return false,
            other => println!("Unknown command '{}'; try 'help'", other),
        }
        true
    }

    /// React to poll progress. The busy indicator is cleared on every
    /// terminal outcome; the completion notice is emitted only on success.
    /// Notices go through the `MultiProgress` (like tracing lines do) so an
    /// event resolving mid-prompt scrolls above it instead of into it.
    pub fn handle_event(&mut self, event: PipelineEvent) {
        if let PipelineEvent::StillProcessing { check } = &event {
            if let Some(spinner) = &self.spinner {
                spinner.set_message(format!("generating embeddings... (check {})", check));
            }
        }

        if let Some(notice) = event_notice(&event) {
            self.clear_spinner();
            progress::println(&notice);
        }
    }

    fn start_spinner(&mut self) {
        self.clear_spinner();
        self.spinner = Some(progress::generating_spinner());
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn print_help(&self) {
        println!("commands:");
        println!("  mode [upload|embed|store|search]   show or switch the active panel");
        println!("  login <email>                      authenticate with the backend");
        println!("  stage <path>...                    stage files (or directories) for embedding");
        println!("  files                              list staged files");
        println!("  unstage <n>                        remove staged file n");
        println!("  clear                              drop all staged files");
        println!("  submit                             submit staged files as one embedding job");
        println!("  status                             show the tracked job");
        println!("  export <json|csv>                  download the completed job's embeddings");
        println!("  db set <field> <value>             set a ChromaDB field");
        println!("  db show | db clear | db test       inspect, reset or ping the config");
        println!("  store [add|update]                 push embeddings into ChromaDB");
        println!("  search <text>                      similarity search the collection");
        println!("  results                            re-print the last search results");
        println!("  reset                              reset the whole session");
        println!("  quit                               leave");
    }

    fn cmd_mode(&mut self, args: &[&str]) {
        match args.first() {
            None => println!("mode: {} — {}", self.mode, self.mode.hint()),
            Some(name) => match Mode::from_str(name) {
                Ok(mode) => {
                    self.mode = mode;
                    println!("mode: {} — {}", mode, mode.hint());
                    self.render_panel();
                }
                Err(e) => println!("{}", e),
            },
        }
    }

    /// What the active panel shows. The mode gates visibility only; every
    /// operation stays reachable by its command regardless.
    fn render_panel(&self) {
        match self.mode {
            Mode::Upload => {
                println!(
                    "  {} file(s) staged ({})",
                    self.staging.len(),
                    format_file_size(self.staging.total_bytes())
                );
            }
            Mode::Embed => {
                let state = self.orchestrator.state();
                println!("  job: {}", state.status);
            }
            Mode::Store => {
                println!(
                    "  config {} · operation {}",
                    if self.db.is_ready() { "ready" } else { "incomplete" },
                    self.store.operation()
                );
            }
            Mode::Search => match self.query.last() {
                Some((query, _)) => println!("  last query: {}", query),
                None => println!("  no results yet"),
            },
        }
    }

    pub async fn cmd_login(&mut self, email: &str) {
        match self.auth.authenticate(&self.client, email).await {
            Ok(true) => println!("✓ Authenticated as {}", self.auth.email()),
            Ok(false) => {} // blank email, silent no-op
            // The error Display already carries the "Authentication error"
            // prefix.
            Err(e) => {
                error!("{}", e);
                println!("{}", e);
            }
        }
    }

    fn cmd_stage(&mut self, args: &[&str]) {
        if args.is_empty() {
            println!("Usage: stage <path>...");
            return;
        }
        let paths: Vec<PathBuf> = args.iter().map(PathBuf::from).collect();
        match self.staging.add(&paths) {
            Ok(added) => println!("✓ Staged {} file(s), {} total", added, self.staging.len()),
            Err(e) => println!("Staging failed: {}", e),
        }
    }

    fn cmd_files(&self) {
        if self.staging.is_empty() {
            println!("No files staged");
            return;
        }
        for (i, file) in self.staging.files().iter().enumerate() {
            println!(
                "{}. {} ({})",
                i + 1,
                file.name,
                format_file_size(file.size_bytes)
            );
        }
    }

    fn cmd_unstage(&mut self, args: &[&str]) {
        let Some(index) = args.first().and_then(|a| a.parse::<usize>().ok()) else {
            println!("Usage: unstage <n> (see 'files' for numbering)");
            return;
        };
        match index.checked_sub(1).and_then(|i| self.staging.remove(i)) {
            Some(removed) => println!("✓ Unstaged {}", removed.name),
            None => println!("No staged file numbered {}", index),
        }
    }

    async fn cmd_submit(&mut self) {
        if self.staging.is_empty() {
            println!("Nothing staged; use 'stage <path>' first");
            return;
        }
        let Some(token) = self.auth.token().map(str::to_string) else {
            println!("Not authenticated; run 'login <email>' first");
            return;
        };

        match self.orchestrator.submit(self.staging.files(), &token).await {
            Ok(object_id) => {
                println!(
                    "✓ Submitted {} file(s) as job {}",
                    self.staging.len(),
                    object_id
                );
                self.start_spinner();
                self.mode = Mode::Embed;
            }
            Err(e) => {
                error!("Submission failed: {}", e);
                println!("Submission failed: {}", e);
            }
        }
    }

    fn cmd_status(&self) {
        let state = self.orchestrator.state();
        match &state.object_id {
            Some(object_id) => println!(
                "job {}: {} ({} status check(s) so far)",
                object_id, state.status, state.checks
            ),
            None => println!("no job submitted yet"),
        }
    }

    async fn cmd_export(&mut self, args: &[&str]) {
        let format = match args.first() {
            Some(arg) => match ExportFormat::from_str(arg) {
                Ok(format) => format,
                Err(e) => {
                    println!("{}", e);
                    return;
                }
            },
            None => ExportFormat::Json,
        };

        if let Some(reason) = export_unavailable_reason(self.orchestrator.status()) {
            println!("{}", reason);
            return;
        }
        let (Some(object_id), Some(token)) = (
            self.orchestrator.object_id(),
            self.auth.token().map(str::to_string),
        ) else {
            println!("No completed job to export");
            return;
        };

        match export::export(&self.client, &object_id, format, &token, &self.out_dir).await {
            Ok(path) => println!("✓ Saved {}", path.display()),
            Err(e) => {
                error!("Export failed: {}", e);
                println!("Export failed: {}", e);
            }
        }
    }

    async fn cmd_db(&mut self, args: &[&str]) {
        match args.first().copied() {
            Some("set") => {
                let (Some(field), Some(_)) = (args.get(1), args.get(2)) else {
                    println!("Usage: db set <field> <value>");
                    return;
                };
                match DbField::from_str(field) {
                    Ok(field) => {
                        let value = args[2..].join(" ");
                        self.db.set(field, value);
                        println!("✓ {} set", field.name());
                    }
                    Err(e) => println!("{}", e),
                }
            }
            Some("show") | None => {
                println!("ChromaDB config:");
                for field in DbField::ALL {
                    let value = self.db.get(field);
                    if value.trim().is_empty() {
                        println!("  {:<13} (unset, e.g. {})", field.name(), field.placeholder());
                    } else {
                        println!("  {:<13} {}", field.name(), value);
                    }
                }
                println!(
                    "  status: {}",
                    if self.db.is_ready() { "ready" } else { "incomplete" }
                );
            }
            Some("clear") => {
                self.db.clear();
                println!("✓ ChromaDB config cleared");
            }
            Some("test") => match self.client.healthcheck(&self.db).await {
                Ok(()) => println!("✓ ChromaDB reachable"),
                Err(e) => {
                    error!("Healthcheck failed: {}", e);
                    println!("ChromaDB unreachable: {}", e);
                }
            },
            Some(other) => println!("Unknown db action '{}'; try set/show/clear/test", other),
        }
    }

    async fn cmd_store(&mut self, args: &[&str]) {
        if let Some(arg) = args.first() {
            match StoreOperation::from_str(arg) {
                Ok(operation) => self.store.set_operation(operation),
                Err(e) => {
                    println!("{}", e);
                    return;
                }
            }
        }

        if let Some(reason) = store_unavailable_reason(self.orchestrator.status(), &self.db) {
            println!("{}", reason);
            return;
        }
        let (Some(object_id), Some(token)) = (
            self.orchestrator.object_id(),
            self.auth.token().map(str::to_string),
        ) else {
            println!("No completed job to store");
            return;
        };

        match self
            .store
            .store(&self.client, &object_id, &self.db, &token)
            .await
        {
            Ok(()) => println!(
                "✓ Embeddings {}ed to collection {}",
                self.store.operation(),
                self.db.collection_id
            ),
            Err(e) => {
                error!("Store failed: {}", e);
                println!("Store failed: {}", e);
            }
        }
    }

    async fn cmd_search(&mut self, args: &[&str]) {
        let text = args.join(" ");
        if let Some(reason) = search_unavailable_reason(&text, &self.db) {
            println!("{}", reason);
            return;
        }
        let Some(token) = self.auth.token().map(str::to_string) else {
            println!("Not authenticated; run 'login <email>' first");
            return;
        };

        match self.query.search(&self.client, &text, &self.db, &token).await {
            Ok(()) => self.cmd_results(),
            Err(e) => {
                error!("Search failed: {}", e);
                println!("Search failed: {}", e);
                if self.query.last().is_some() {
                    println!("(previous results kept; 'results' to re-print)");
                }
            }
        }
    }

    fn cmd_results(&self) {
        match self.query.last() {
            Some((query, result)) => search::print_results(query, result),
            None => println!("No search results yet"),
        }
    }

    /// Whole-session reset: staged files, DB config, identity, job tracking
    /// and held results all go back to their initial state.
    fn cmd_reset(&mut self) {
        self.clear_spinner();
        self.staging.clear();
        self.db.clear();
        self.auth.reset();
        self.orchestrator.reset();
        self.query.clear();
        self.store.set_operation(StoreOperation::Add);
        self.mode = Mode::default();
        println!("✓ Session reset");
    }
}

/// Run the interactive session until EOF or `quit`.
pub async fn run(settings: Settings) -> Result<()> {
    let (mut session, mut events) = Session::new(&settings)?;

    println!("quirk — transform data into vector embeddings");
    println!("panels: upload · embed · store · search   ('help' for commands)\n");

    if let Some(email) = settings.email.clone() {
        session.cmd_login(&email).await;
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        // One prompt per line read. Events that resolve while waiting are
        // handled in place; their notices scroll above the prompt.
        print!("quirk> ");
        let _ = std::io::stdout().flush();

        let line = loop {
            tokio::select! {
                Some(event) = events.recv() => {
                    session.handle_event(event);
                }
                line = lines.next_line() => break line?,
            }
        };

        match line {
            Some(line) => {
                if !session.dispatch(line.trim()).await {
                    break;
                }
            }
            None => break,
        }
    }

    Ok(())
}
