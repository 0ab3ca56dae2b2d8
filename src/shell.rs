use anyhow::{anyhow, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use centi_client::api::{CentiClient, LoginRequest, RegisterRequest};
use centi_client::storage::MemoryFlagStore;
use centi_client::{AuthModal, CentiApp, SessionState};

const HELP: &str = "
Commands:
  screen                               show the current screen
  setup <signup|login>                 open account setup
  back                                 back to welcome
  get-started                          skip straight to finance connect
  login <email> <password>             log in
  signup <first> <last> <email> <pw>   create an account
  verified                             email verification finished
  link <public_token>                  exchange a Plaid public token
  connect                              finish finance connect with data
  skip                                 finish finance connect without data
  refresh                              reload dashboard data flags
  clear-data                           empty all server-side data
  logout                               log out from the dashboard
  reload                               simulate a page reload
  flags                                print stored flags
  help                                 this text
  quit                                 exit
";

/// Interactive loop over one browsing context
pub struct Shell {
    app: CentiApp,
    client: Arc<CentiClient>,
}

impl Shell {
    pub fn new(app: CentiApp, client: Arc<CentiClient>) -> Self {
        Self { app, client }
    }

    pub async fn run(&mut self, entry: Option<&str>) -> Result<()> {
        let screen = self.app.bootstrap(entry).await?;
        println!("🧭 {}", screen);
        println!("Type 'help' for commands.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("[{}] > ", self.app.view());
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.is_empty() {
                continue;
            }
            if matches!(words[0], "quit" | "exit") {
                break;
            }

            if let Err(e) = self.dispatch(&words).await {
                eprintln!("❌ {}", e);
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, words: &[&str]) -> Result<()> {
        let app = &mut self.app;
        let screen = match words {
            ["screen"] => {
                println!("{}", app.view());
                return Ok(());
            }
            ["help"] => {
                println!("{}", HELP);
                return Ok(());
            }
            ["flags"] => {
                print_state(&app.session_state().await?);
                return Ok(());
            }
            ["setup", mode] => app.show_account_setup(mode.parse()?)?,
            ["back"] => app.back_to_welcome()?,
            ["get-started"] => app.get_started()?,
            ["login", email, password] => {
                let request = LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                };
                crate::enter_account_setup(app, AuthModal::Login)?;
                let auth = self.client.login(&request).await?;
                let hint = app.probe_remote().await;
                app.login_success(&auth.user, Some(hint)).await?
            }
            ["signup", first, last, email, password] => {
                let request = RegisterRequest {
                    first_name: first.to_string(),
                    last_name: last.to_string(),
                    email: email.to_string(),
                    password: password.to_string(),
                };
                crate::enter_account_setup(app, AuthModal::SignUp)?;
                let auth = self.client.register(&request).await?;
                app.sign_up_success(&auth.user).await?
            }
            ["verified"] => app.email_verification_complete()?,
            ["link", token] => {
                app.link_bank(token).await?;
                println!("🏦 Bank linked");
                return Ok(());
            }
            ["connect"] => app.finance_connect_complete(true).await?,
            ["skip"] => app.finance_connect_complete(false).await?,
            ["refresh"] => {
                print_state(&app.refresh_dashboard().await?);
                return Ok(());
            }
            ["clear-data"] => {
                app.clear_all_data().await?;
                println!("🗑️ Data cleared");
                return Ok(());
            }
            ["logout"] => app.logout().await?,
            ["reload"] => app.reload(Arc::new(MemoryFlagStore::new()), None).await?,
            _ => return Err(anyhow!("Unknown command '{}'. Type 'help'.", words.join(" "))),
        };
        println!("🧭 {}", screen);
        Ok(())
    }
}

pub fn print_state(state: &SessionState) {
    let user = state
        .user_record()
        .map(|u| u.display_name())
        .or_else(|| state.user.as_ref().map(|_| "(unparsed record)".to_string()))
        .unwrap_or_else(|| "-".to_string());

    println!("user                 {}", user);
    println!("hasEverHadData       {}", state.has_ever_had_data);
    println!("hasConnectedData     {}", state.has_connected_data);
    println!("hasTransactions      {}", state.has_transactions);
    println!("hasFiles             {}", state.has_files);
    println!("hasAccounts          {}", state.has_accounts);
    println!("bank link            {}", if state.has_bank_link() { "yes" } else { "no" });
    println!("in-flow navigation   {}", state.navigated_from_finance_connect);
}
