mod commands;
mod terminal;
mod util;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use triage_core::{HttpGateway, Session, WorkflowController};

use commands::email::SubmitArgs;
use terminal::{OutputFormat, SystemClipboard, TerminalView};
use util::{client, exit_error, resolve_token};

#[derive(Parser)]
#[command(name = "triage", version, about = "Email triage CLI: classify incoming emails and answer them with a suggested reply")]
struct Cli {
    /// API base URL
    #[arg(long, env = "TRIAGE_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    /// Bearer token (overrides stored credentials)
    #[arg(long, env = "TRIAGE_API_KEY", hide_env_values = true)]
    token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "TRIAGE_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Log in with email and password
    Login {
        /// Account email
        email: String,
        /// Password (prompted on stdin when omitted)
        #[arg(long, env = "TRIAGE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Remove stored credentials
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Change the account password
    ChangePassword {
        #[arg(long)]
        current: Option<String>,
        #[arg(long)]
        new: Option<String>,
    },
    /// Classify an email and print the suggested reply
    Classify {
        #[command(flatten)]
        submit: SubmitArgs,
        /// Copy the suggested reply to the clipboard
        #[arg(long)]
        copy: bool,
        /// Mark the email as responded right away
        #[arg(long)]
        mark_responded: bool,
    },
    /// Mark a classified email as responded
    Respond {
        /// Email id printed by `classify`
        id: String,
    },
    /// List previously classified emails
    History {
        /// Filter on responded state
        #[arg(long)]
        responded: Option<bool>,
    },
    /// Show one email from the history
    Detail {
        /// Position in the history listing
        #[arg(required_unless_present = "id")]
        position: Option<usize>,
        /// Email id, skipping the listing
        #[arg(long)]
        id: Option<String>,
    },
    /// Interactive session: submit, regenerate, respond and browse history
    Shell,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "triage=warn,triage_core=warn".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let gateway = HttpGateway::with_client(client(cli.timeout_secs), &cli.api_url)
        .unwrap_or_else(|e| exit_error(&e.to_string(), Some("Set --api-url or TRIAGE_API_URL")));
    let session = match resolve_token(gateway.api_url(), cli.token.as_deref()) {
        Some(token) => Session::with_token(token),
        None => Session::new(),
    };
    let app = WorkflowController::with_session(
        gateway,
        TerminalView::new(cli.output),
        Box::new(SystemClipboard),
        session,
    );

    let code = match cli.command {
        Commands::Health => commands::health::run(&app).await,
        Commands::Login { email, password } => commands::auth::login(&app, &email, password).await,
        Commands::Logout => commands::auth::logout(&app),
        Commands::Whoami => commands::auth::whoami(&app).await,
        Commands::ChangePassword { current, new } => {
            commands::auth::change_password(&app, current, new).await
        }
        Commands::Classify {
            submit,
            copy,
            mark_responded,
        } => commands::email::classify(&app, submit, copy, mark_responded).await,
        Commands::Respond { id } => commands::email::respond(&app, id).await,
        Commands::History { responded } => commands::email::history(&app, responded).await,
        Commands::Detail { position, id } => commands::email::detail(&app, position, id).await,
        Commands::Shell => commands::shell::run(Arc::new(app)).await,
    };

    std::process::exit(code);
}
