#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

use std::path::PathBuf;
use std::sync::Arc;

use biblioteca::error::ConfigError;
use biblioteca::net::library;
use biblioteca::net::types::{Book, BookFormat, Loan, LoanStatus, NewBook};
use biblioteca::pages::admin::AdminPanel;
use biblioteca::pages::dashboard::Dashboard;
use biblioteca::pages::login::{self, LoginOutcome};
use biblioteca::pages::register::{self, RegisterForm, RegisterOutcome};
use biblioteca::pages::{ListView, Notice, Route};
use biblioteca::session::FileStore;
use biblioteca::util::format::{book_icon, format_date};
use biblioteca::{ApiClient, ClientConfig, ClientError, Session};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("{0}")]
    Rejected(String),
    #[error("not allowed here; go to {}", .0.path())]
    Redirected(Route),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "biblio", about = "Library catalog and loans from the terminal")]
struct Cli {
    #[arg(long, env = "BIBLIO_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "BIBLIO_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[arg(short, long, default_value_t = false, help = "Log requests to stderr")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        username: String,
        #[arg(long, env = "BIBLIO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register(RegisterArgs),
    Logout,
    Whoami {
        #[arg(long, default_value_t = false, help = "Ask the backend whether the token is still valid")]
        remote: bool,
    },
    Books {
        #[arg(long, conflicts_with = "category")]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    Book {
        id: i64,
    },
    Borrow {
        book_id: i64,
    },
    Loans,
    Return {
        loan_id: i64,
    },
    Admin(AdminCommand),
}

#[derive(Args, Debug)]
struct RegisterArgs {
    username: String,
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    email: String,
    #[arg(long, env = "BIBLIO_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    confirm_password: String,
}

#[derive(Args, Debug)]
struct AdminCommand {
    #[command(subcommand)]
    command: AdminSubcommand,
}

#[derive(Subcommand, Debug)]
enum AdminSubcommand {
    Books {
        #[arg(long)]
        search: Option<String>,
    },
    Loans,
    Stats,
    AddBook(AddBookArgs),
}

#[derive(Args, Debug)]
struct AddBookArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    author: String,
    #[arg(long)]
    isbn: String,
    #[arg(long)]
    category: String,
    #[command(subcommand)]
    format: FormatArgs,
}

#[derive(Subcommand, Debug)]
enum FormatArgs {
    Digital {
        #[arg(long, default_value = "PDF")]
        file_format: String,
        #[arg(long)]
        file_size_mb: f64,
    },
    Audio {
        #[arg(long)]
        narrator: String,
        #[arg(long)]
        duration_minutes: u32,
        #[arg(long, default_value = "MP3")]
        audio_format: String,
    },
    Ebook {
        #[arg(long)]
        publisher: String,
        #[arg(long)]
        page_count: u32,
        #[arg(long, default_value_t = false)]
        interactive: bool,
    },
}

impl From<AddBookArgs> for NewBook {
    fn from(args: AddBookArgs) -> Self {
        let format = match args.format {
            FormatArgs::Digital { file_format, file_size_mb } => BookFormat::Digital { file_format, file_size_mb },
            FormatArgs::Audio { narrator, duration_minutes, audio_format } => {
                BookFormat::Audio { narrator, duration_minutes, audio_format }
            }
            FormatArgs::Ebook { publisher, page_count, interactive } => {
                BookFormat::EBook { publisher, page_count, has_interactive_content: interactive }
            }
        };
        Self { title: args.title, author: args.author, isbn: args.isbn, category: args.category, format }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let api = connect(cli.base_url.as_deref(), cli.session_file)?;

    match cli.command {
        Command::Login { username, password } => run_login(&api, &username, &password).await,
        Command::Register(args) => run_register(&api, args).await,
        Command::Logout => {
            let route = api.session().logout(&api).await;
            println!("signed out; go to {}", route.path());
            Ok(())
        }
        Command::Whoami { remote } => run_whoami(&api, remote).await,
        Command::Books { search, category } => {
            let page = open_dashboard(api)?;
            let view = match (search, category) {
                (Some(q), _) => page.search(&q).await,
                (None, Some(c)) => page.filter_by_category(&c).await,
                (None, None) => page.load_books().await,
            };
            print_list(view, print_book)
        }
        Command::Book { id } => {
            let page = open_dashboard(api)?;
            let book = page.view_book(id).await.map_err(CliError::Rejected)?;
            print_book_details(&book, page.can_borrow(&book));
            Ok(())
        }
        Command::Borrow { book_id } => print_notice(open_dashboard(api)?.borrow(book_id).await),
        Command::Loans => {
            let page = open_dashboard(api)?;
            print_list(page.load_my_loans().await, print_loan)
        }
        Command::Return { loan_id } => print_notice(open_dashboard(api)?.return_book(loan_id).await),
        Command::Admin(admin) => run_admin(api, admin).await,
    }
}

/// Flags win over `BIBLIO_*` variables, which win over defaults.
fn resolve_config(base_url: Option<&str>, session_file: Option<PathBuf>) -> Result<ClientConfig, CliError> {
    let mut config = match base_url {
        Some(url) => ClientConfig::new(url)?,
        None => ClientConfig::from_env()?,
    };
    if let Some(path) = session_file {
        config.session_file = path;
    }
    Ok(config)
}

fn connect(base_url: Option<&str>, session_file: Option<PathBuf>) -> Result<ApiClient, CliError> {
    let config = resolve_config(base_url, session_file)?;
    let session = Session::new(Arc::new(FileStore::new(&config.session_file)));
    Ok(ApiClient::new(&config.base_url, session)?)
}

fn open_dashboard(api: ApiClient) -> Result<Dashboard, CliError> {
    let page = Dashboard::open(api).map_err(CliError::Redirected)?;
    println!("{}", page.greeting());
    Ok(page)
}

async fn run_login(api: &ApiClient, username: &str, password: &str) -> Result<(), CliError> {
    if let Some(home) = login::redirect_if_authenticated(api.session()) {
        println!("already signed in; go to {}", home.path());
        return Ok(());
    }
    match login::submit(api, username, password).await {
        LoginOutcome::Redirect(home) => {
            println!("signed in; go to {}", home.path());
            Ok(())
        }
        LoginOutcome::Rejected(message) => Err(CliError::Rejected(message)),
    }
}

async fn run_register(api: &ApiClient, args: RegisterArgs) -> Result<(), CliError> {
    let form = RegisterForm {
        full_name: args.full_name,
        username: args.username,
        email: args.email,
        password: args.password,
        confirm_password: args.confirm_password,
    };
    match register::submit(api, &form).await {
        RegisterOutcome::Registered { message, redirect } => {
            println!("{message}");
            println!("next: {}", redirect.path());
            Ok(())
        }
        RegisterOutcome::Rejected(message) => Err(CliError::Rejected(message)),
    }
}

async fn run_whoami(api: &ApiClient, remote: bool) -> Result<(), CliError> {
    if remote {
        let check = library::validate(api).await?;
        if !check.valid {
            return Err(CliError::Redirected(Route::Login));
        }
        if let Some(user) = check.user {
            print_json(&serde_json::to_value(user)?)?;
        }
        return Ok(());
    }
    let user = api.session().current_user().ok_or(CliError::Redirected(Route::Login))?;
    print_json(&serde_json::to_value(user)?)
}

async fn run_admin(api: ApiClient, admin: AdminCommand) -> Result<(), CliError> {
    let panel = AdminPanel::open(api).map_err(CliError::Redirected)?;
    println!("{}", panel.greeting());

    match admin.command {
        AdminSubcommand::Books { search } => {
            let view = match search {
                Some(q) => panel.search(&q).await,
                None => panel.load_books().await,
            };
            print_list(view, print_book)
        }
        AdminSubcommand::Loans => print_list(panel.load_all_loans().await, |loan| {
            print!("{:<12} ", loan.username);
            print_loan(loan);
        }),
        AdminSubcommand::Stats => {
            let stats = panel.statistics().await.map_err(CliError::Rejected)?;
            println!("books         {}", stats.books);
            println!("total loans   {}", stats.total_loans);
            println!("active loans  {}", stats.active_loans);
            println!("overdue loans {}", stats.overdue_loans);
            Ok(())
        }
        AdminSubcommand::AddBook(args) => print_notice(panel.add_book(&NewBook::from(args)).await),
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_list<T>(view: ListView<T>, print_item: impl Fn(&T)) -> Result<(), CliError> {
    match view {
        ListView::Loaded(items) => {
            items.iter().for_each(print_item);
            Ok(())
        }
        ListView::Empty(message) => {
            println!("{message}");
            Ok(())
        }
        ListView::Failed(message) => Err(CliError::Rejected(message)),
    }
}

fn print_notice(notice: Notice) -> Result<(), CliError> {
    match notice {
        Notice::Success(message) => {
            println!("{message}");
            Ok(())
        }
        Notice::Error(message) => Err(CliError::Rejected(message)),
    }
}

fn print_book(book: &Book) {
    let state = if book.available { "available" } else { "on loan" };
    println!(
        "{} #{:<5} {} by {} [{}] {state}",
        book_icon(&book.book_type),
        book.id,
        book.title,
        book.author,
        book.category
    );
}

fn print_book_details(book: &Book, can_borrow: bool) {
    println!("{} {}", book_icon(&book.book_type), book.title);
    println!("  author    {}", book.author);
    println!("  isbn      {}", book.isbn);
    println!("  category  {}", book.category);
    println!("  type      {}", book.book_type);
    if let Some(access) = &book.access_method {
        println!("  access    {access}");
    }
    println!("  status    {}", if book.available { "available" } else { "on loan" });
    if can_borrow {
        println!("  borrow with: biblio borrow {}", book.id);
    }
}

fn print_loan(loan: &Loan) {
    let state = match loan.status() {
        LoanStatus::Returned => format!("returned {}", format_date(loan.return_date.as_deref())),
        LoanStatus::Overdue => "OVERDUE".to_owned(),
        LoanStatus::Active => format!("{} days left", loan.days_until_due),
    };
    println!(
        "#{:<5} {} borrowed {} due {} {state}",
        loan.id,
        loan.book_title,
        format_date(loan.loan_date.as_deref()),
        format_date(loan.due_date.as_deref())
    );
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
