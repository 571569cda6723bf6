use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
    sync::{Arc, Mutex},
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use client_core::{
    config::validate_server_url, load_settings, CommitOutcome, FixedConfirmation, LibraryPortal,
    LoanOutcome, LoginOutcome, ModalState, ModalView, NavigationMode, NavigationTarget, Navigator,
    PanelView, PortalHost, PortalViews, ReturnConfirmation, Severity, SyncOutcome, ViewModel,
};
use shared::domain::{BookId, BookRecord, LoanRecord};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "library-portal", about = "Terminal client for the university library portal")]
struct Args {
    /// Settings file; defaults to ./portal.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    stu_id: Option<String>,
    #[arg(long)]
    password: Option<String>,
    /// Keep the credentials for later runs (stored in plaintext).
    #[arg(long)]
    remember: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the profile and current loans.
    Profile,
    /// List the catalog.
    Books,
    Search {
        keyword: String,
    },
    /// Show one book, optionally borrowing it from the detail view.
    Detail {
        book_id: String,
        #[arg(long)]
        borrow: bool,
    },
    Borrow {
        book_id: String,
    },
    Return {
        book_id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Forget remembered credentials.
    Logout,
}

struct ConsoleView {
    panel: &'static str,
}

impl PanelView for ConsoleView {
    fn render(&self, model: ViewModel) {
        match model {
            ViewModel::Notice(notice) => {
                let label = match notice.severity {
                    Severity::Info => "info",
                    Severity::Success => "ok",
                    Severity::Warning => "warning",
                    Severity::Error => "error",
                };
                println!("[{label}] {}: {}", self.panel, notice.message);
            }
            ViewModel::Loading(message) => debug!(panel = self.panel, "{message}"),
            ViewModel::Profile(profile) => {
                println!("{} ({})", profile.name, profile.stu_id);
                println!("  trust: {}", profile.trust);
                println!("  status: {}", profile.eligibility_label());
            }
            ViewModel::LoanRecords(records) => print_loans(&records),
            ViewModel::Books(books) => {
                for book in &books {
                    print_book_line(book);
                }
            }
            ViewModel::BookModal(ModalView::Open(book)) => print_book_detail(&book),
            ViewModel::BookModal(ModalView::Committing(book)) => {
                println!("Borrowing {}...", book.title)
            }
            ViewModel::BookModal(ModalView::Closed)
            | ViewModel::Control { .. }
            | ViewModel::ClearInput
            | ViewModel::Prefill { .. } => {}
        }
    }
}

fn print_loans(records: &[LoanRecord]) {
    if records.is_empty() {
        println!("No current loans.");
        return;
    }
    println!("Current loans:");
    for record in records {
        let overdue = if record.is_overdue { "  OVERDUE" } else { "" };
        println!(
            "  {}  {} / {}  borrowed {}  due {}  fine ¥{:.2}{overdue}",
            record.book_id,
            record.book_title,
            record.book_author,
            record.borrow_date,
            record.due_date,
            record.fine_amount,
        );
    }
}

fn print_book_line(book: &BookRecord) {
    let status = if book.is_borrowable() { "available" } else { "unavailable" };
    println!(
        "  {}  {} / {}  {}/{}  {status}",
        book.book_id, book.title, book.author, book.available_copies, book.total_copies
    );
}

fn print_book_detail(book: &BookRecord) {
    println!("{} / {}", book.title, book.author);
    println!("  id: {}", book.book_id);
    println!("  copies: {}/{}", book.available_copies, book.total_copies);
    if !book.description.is_empty() {
        println!("  {}", book.description);
    }
    if let Some(created_at) = book.created_at {
        println!("  added: {}", created_at.format("%Y-%m-%d"));
    }
}

fn console_views() -> PortalViews {
    PortalViews {
        login: Arc::new(ConsoleView { panel: "login" }),
        profile: Arc::new(ConsoleView { panel: "profile" }),
        records: Arc::new(ConsoleView { panel: "loans" }),
        catalog: Arc::new(ConsoleView { panel: "catalog" }),
        borrow: Arc::new(ConsoleView { panel: "borrow" }),
        returns: Arc::new(ConsoleView { panel: "return" }),
        modal: Arc::new(ConsoleView { panel: "detail" }),
    }
}

/// One process is one page visit; navigation only records where it would go.
struct ConsoleNavigator {
    current: Mutex<NavigationTarget>,
}

impl Navigator for ConsoleNavigator {
    fn navigate(&self, target: NavigationTarget, mode: NavigationMode) {
        debug!(?target, ?mode, "navigate");
        if let Ok(mut current) = self.current.lock() {
            *current = target;
        }
    }

    fn current(&self) -> NavigationTarget {
        self.current
            .lock()
            .map(|current| *current)
            .unwrap_or(NavigationTarget::Entry)
    }
}

struct StdinConfirmation;

#[async_trait]
impl ReturnConfirmation for StdinConfirmation {
    async fn confirm(&self, book_id: &BookId) -> bool {
        let prompt = format!("Return book {book_id}? An overdue fine may be charged. [y/N] ");
        let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
            print!("{prompt}");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            Ok(line)
        })
        .await;
        matches!(answer, Ok(Ok(line)) if matches!(line.trim(), "y" | "Y" | "yes"))
    }
}

async fn sign_in(portal: &LibraryPortal, args: &Args) -> Result<()> {
    let (stu_id, password, remember) = match (&args.stu_id, &args.password) {
        (Some(stu_id), Some(password)) => (stu_id.clone(), password.clone(), args.remember),
        _ => match portal.gate().remembered_credentials() {
            Some(credentials) => (credentials.stu_id, credentials.password, true),
            None => bail!("no credentials: pass --stu-id and --password, or sign in once with --remember"),
        },
    };

    match portal.login().login(&stu_id, &password, remember).await {
        LoginOutcome::SignedIn(profile) => {
            info!(stu_id = %profile.stu_id, "signed in");
            Ok(())
        }
        LoginOutcome::Failed(classified) => bail!("sign-in failed: {}", classified.message),
        LoginOutcome::Busy => bail!("sign-in already in progress"),
    }
}

async fn run(portal: &LibraryPortal, command: Command) -> bool {
    match command {
        Command::Profile => portal.sync().refresh_profile().await == SyncOutcome::Rendered,
        Command::Books => portal.catalog().list_books().await == SyncOutcome::Rendered,
        Command::Search { keyword } => {
            portal.catalog().search(&keyword).await == SyncOutcome::Rendered
        }
        Command::Detail { book_id, borrow } => {
            if !matches!(portal.modal().open(&book_id).await, ModalState::Open(_)) {
                return false;
            }
            if !borrow {
                portal.modal().cancel().await;
                return true;
            }
            match portal.modal().commit().await {
                CommitOutcome::Completed(outcome) => outcome.is_success(),
                CommitOutcome::Blocked | CommitOutcome::NotOpen => false,
            }
        }
        Command::Borrow { book_id } => portal.loans().borrow(&book_id).await.is_success(),
        Command::Return { book_id, .. } => match portal.loans().return_book(&book_id).await {
            LoanOutcome::Declined => {
                println!("Return cancelled.");
                true
            }
            outcome => outcome.is_success(),
        },
        Command::Logout => {
            portal.gate().logout().await;
            println!("Signed out; remembered credentials cleared.");
            true
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(server_url) = &args.server_url {
        validate_server_url(server_url)?;
        settings.server_url = server_url.clone();
    }

    let confirmation: Arc<dyn ReturnConfirmation> = match args.command {
        Command::Return { yes: true, .. } => Arc::new(FixedConfirmation(true)),
        _ => Arc::new(StdinConfirmation),
    };
    let host = PortalHost {
        views: console_views(),
        navigator: Arc::new(ConsoleNavigator {
            current: Mutex::new(NavigationTarget::Entry),
        }),
        confirmation,
    };
    let portal = LibraryPortal::connect(settings, host).context("failed to start portal")?;

    if !matches!(args.command, Command::Logout) {
        sign_in(&portal, &args).await?;
    }
    let succeeded = run(&portal, args.command).await;

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
