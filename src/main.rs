mod shell;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use centi_client::api::{CentiClient, FinanceApi, LoginRequest, RegisterRequest};
use centi_client::database_sqlx::FlagStoreSqlx;
use centi_client::storage::{MemoryFlagStore, SessionStore};
use centi_client::{AuthModal, CentiApp, Config, Screen};

/// Command line driver for the Centi session client
#[derive(Parser)]
#[command(name = "centi")]
#[command(version, about = "Drive the Centi session flow against the REST API")]
#[command(long_about = "
Runs the Centi navigation logic from the terminal. Persisted flags live in a
local SQLite file; the volatile session marker lives only as long as the
process, so `centi shell` behaves like one browser tab.

Configuration is read from the environment (or a .env file):
  CENTI_API_BASE_URL          REST API root (default http://localhost:8000)
  CENTI_DATABASE_PATH         SQLite file for flags (default centi_session.db)
  CENTI_REQUEST_TIMEOUT_SECS  optional HTTP timeout
  CENTI_DASHBOARD_ON_RELOAD   open the dashboard on reload when data is confirmed
  CENTI_ERROR_FALLBACK        conservative | optimistic for every data check
  CENTI_LOG                   log filter (default centi_client=info)
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide the initial screen once and print it
    Start {
        /// Entry path, e.g. /verify-email
        #[arg(long)]
        entry: Option<String>,
    },
    /// Log in and move to the dashboard or finance connect
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Reconcile stored flags instead of probing the server for data
        #[arg(long)]
        no_probe: bool,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// End the session locally and on the server
    Logout,
    /// Print the stored session flags
    Flags,
    /// Interactive session; the process lifetime is one browsing context
    Shell {
        #[arg(long)]
        entry: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env("CENTI_LOG")
        .unwrap_or_else(|_| EnvFilter::new("centi_client=info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("❌ Configuration Error: {}", e);
            std::process::exit(1);
        }
    };

    let client = Arc::new(CentiClient::new(&config)?);
    let persistent = FlagStoreSqlx::new(&config.database_path).await?;
    let store = SessionStore::new(Arc::new(persistent), Arc::new(MemoryFlagStore::new()));
    let api: Arc<dyn FinanceApi> = client.clone();
    let mut app = CentiApp::from_config(&config, api, store);

    match cli.command {
        Command::Start { entry } => {
            let screen = app.bootstrap(entry.as_deref()).await?;
            println!("{}", screen);
        }
        Command::Login { email, password, no_probe } => {
            app.bootstrap(None).await?;
            enter_account_setup(&mut app, AuthModal::Login)?;

            let auth = client.login(&LoginRequest { email, password }).await?;
            let hint = if no_probe { None } else { Some(app.probe_remote().await) };
            let screen = app.login_success(&auth.user, hint).await?;
            println!("{}", screen);
        }
        Command::Signup { first_name, last_name, email, password } => {
            app.bootstrap(None).await?;
            enter_account_setup(&mut app, AuthModal::SignUp)?;

            let request = RegisterRequest { first_name, last_name, email, password };
            let auth = client.register(&request).await?;
            let screen = app.sign_up_success(&auth.user).await?;
            println!("{}", screen);
        }
        Command::Logout => {
            app.end_session().await;
            println!("{}", Screen::Welcome);
        }
        Command::Flags => {
            let state = app.session_state().await?;
            shell::print_state(&state);
        }
        Command::Shell { entry } => {
            let mut shell = shell::Shell::new(app, client);
            shell.run(entry.as_deref()).await?;
        }
    }

    Ok(())
}

/// Get the router onto the account-setup screen from a freshly bootstrapped state
pub(crate) fn enter_account_setup(app: &mut CentiApp, modal: AuthModal) -> Result<()> {
    match app.current_screen() {
        Some(Screen::AccountSetup(current)) if current == modal => Ok(()),
        Some(Screen::Welcome) | Some(Screen::AccountSetup(_)) => {
            app.show_account_setup(modal)?;
            Ok(())
        }
        Some(other) => Err(anyhow!(
            "Already signed in ({}). Run `centi logout` first.",
            other
        )),
        None => Err(anyhow!("Session has not been initialised")),
    }
}
