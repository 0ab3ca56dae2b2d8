//! Session controller: the root of the client.
//!
//! Owns the screen router and runs every navigation callback against the
//! session store and the remote API.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::{DataSource, FinanceApi};
use crate::bootstrap::{determine_initial_screen, entry_screen, BootstrapSettings};
use crate::models::{AuthModal, Config, Screen, SessionState, UserRecord};
use crate::reconciler::{ProbeOutcome, ReconcilePolicy, Reconciler};
use crate::router::{NavEvent, ScreenRouter};
use crate::storage::{FlagStore, SessionStore};

pub struct CentiApp {
    api: Arc<dyn FinanceApi>,
    store: SessionStore,
    reconciler: Reconciler,
    settings: BootstrapSettings,
    router: ScreenRouter,
}

impl CentiApp {
    pub fn new(
        api: Arc<dyn FinanceApi>,
        store: SessionStore,
        policy: ReconcilePolicy,
        settings: BootstrapSettings,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(api.clone(), policy),
            api,
            store,
            settings,
            router: ScreenRouter::new(),
        }
    }

    /// Build the controller with the policies named in the configuration
    pub fn from_config(config: &Config, api: Arc<dyn FinanceApi>, store: SessionStore) -> Self {
        let policy = config
            .error_fallback
            .map(ReconcilePolicy::uniform)
            .unwrap_or_default();
        let settings = BootstrapSettings {
            dashboard_on_reload: config.dashboard_on_reload,
        };
        Self::new(api, store, policy, settings)
    }

    pub fn current_screen(&self) -> Option<Screen> {
        self.router.current()
    }

    pub fn view(&self) -> String {
        self.router.view()
    }

    pub async fn session_state(&self) -> Result<SessionState> {
        self.store.load().await
    }

    /// Pick and show the initial screen. Runs once per load.
    pub async fn bootstrap(&mut self, entry_path: Option<&str>) -> Result<Screen> {
        self.router.peek(NavEvent::Initialised(Screen::Welcome))?;

        if let Some(screen) = entry_screen(entry_path) {
            info!("🔗 Entry path selects {}", screen);
            return Ok(self.router.initialise(screen)?);
        }

        let before = match self.store.load().await {
            Ok(state) => state,
            Err(e) => {
                error!("Could not read stored session, starting logged out: {}", e);
                return Ok(self.router.initialise(Screen::Welcome)?);
            }
        };

        let decision = determine_initial_screen(&self.reconciler, before.clone(), self.settings).await;
        if let Err(e) = self.store.save(&before, &decision.state).await {
            warn!("Could not persist reconciled flags: {}", e);
        }

        Ok(self.router.initialise(decision.screen)?)
    }

    /// Start a new browsing context: fresh volatile scope, then bootstrap again
    pub async fn reload(&mut self, volatile: Arc<dyn FlagStore>, entry_path: Option<&str>) -> Result<Screen> {
        self.store.reset_volatile(volatile);
        self.router.reset();
        self.bootstrap(entry_path).await
    }

    pub fn show_account_setup(&mut self, modal: AuthModal) -> Result<Screen> {
        Ok(self.router.show_account_setup(modal)?)
    }

    pub fn back_to_welcome(&mut self) -> Result<Screen> {
        Ok(self.router.back_to_welcome()?)
    }

    /// "Get started" shortcut from the welcome page, skipping auth
    pub fn get_started(&mut self) -> Result<Screen> {
        info!("🚀 Get started, going to finance connect");
        Ok(self.router.get_started()?)
    }

    /// A new account was created. Data flags from any earlier account are dropped.
    pub async fn sign_up_success(&mut self, user: &UserRecord) -> Result<Screen> {
        self.router.peek(NavEvent::AuthSucceeded { has_data: false })?;

        let before = self.store.load().await?;
        let mut after = before.clone();
        after.user = Some(serde_json::to_string(user)?);
        after.clear_data_flags();
        after.bank_token = None;

        if user.is_verified == Some(false) {
            info!("📧 {} must verify their email before continuing", user.display_name());
            self.store.save(&before, &after).await?;
            return Ok(self.router.await_email_verification()?);
        }

        let reconciliation = self.reconciler.has_existing_data(after).await;
        self.store.save(&before, &reconciliation.state).await?;
        Ok(self.router.auth_succeeded(reconciliation.has_data)?)
    }

    /// A user logged in. `has_data_hint` is what the login flow already learned
    /// about the account; without it the stored flags are reconciled.
    pub async fn login_success(&mut self, user: &UserRecord, has_data_hint: Option<bool>) -> Result<Screen> {
        self.router.peek(NavEvent::AuthSucceeded { has_data: false })?;

        let before = self.store.load().await?;
        let mut after = before.clone();
        after.user = Some(serde_json::to_string(user)?);

        if user.is_verified == Some(false) {
            info!("📧 {} has not verified their email yet", user.display_name());
            self.store.save(&before, &after).await?;
            return Ok(self.router.await_email_verification()?);
        }

        let has_data = match has_data_hint {
            Some(has_data) => {
                info!("Using data status from login: {}", has_data);
                if has_data {
                    after.has_connected_data = true;
                    after.has_ever_had_data = true;
                }
                has_data
            }
            None => {
                let reconciliation = self.reconciler.has_existing_data(after).await;
                after = reconciliation.state;
                reconciliation.has_data
            }
        };

        self.store.save(&before, &after).await?;
        Ok(self.router.auth_succeeded(has_data)?)
    }

    pub fn email_verification_complete(&mut self) -> Result<Screen> {
        info!("📧 Email verified, showing login");
        Ok(self.router.email_verified()?)
    }

    /// Exchange a Plaid public token and keep the access token as bank-link evidence
    pub async fn link_bank(&mut self, public_token: &str) -> Result<()> {
        self.require_screen(Screen::FinanceConnect, "Bank linking")?;

        let exchanged = self.api.exchange_public_token(public_token).await?;
        let before = self.store.load().await?;
        let mut after = before.clone();
        after.bank_token = Some(exchanged.access_token);
        self.store.save(&before, &after).await?;

        info!("🏦 Bank link stored (item {:?})", exchanged.item_id);
        Ok(())
    }

    /// Leave finance connect. With actual data every data flag is set up front.
    pub async fn finance_connect_complete(&mut self, has_actual_data: bool) -> Result<Screen> {
        self.router.peek(NavEvent::FinanceConnectCompleted)?;

        let before = self.store.load().await?;
        let mut after = before.clone();
        if has_actual_data {
            after.set_all_data_flags();
        } else {
            info!("User skipped finance connect");
        }
        after.navigated_from_finance_connect = true;
        self.store.save(&before, &after).await?;

        Ok(self.router.finance_connect_completed()?)
    }

    /// Dashboard load: raise the per-source flags for whatever the server has.
    /// Flags are only ever set here, never cleared.
    pub async fn refresh_dashboard(&mut self) -> Result<SessionState> {
        self.require_screen(Screen::Dashboard, "Dashboard refresh")?;

        let probe = self.reconciler.probe().await;
        let before = self.store.load().await?;
        let mut after = before.clone();

        for source in DataSource::ALL {
            if probe.has(source) {
                match source {
                    DataSource::Transactions => after.has_transactions = true,
                    DataSource::Accounts => after.has_accounts = true,
                    DataSource::Files => after.has_files = true,
                }
            }
        }
        if probe.outcome() == ProbeOutcome::Found {
            after.has_ever_had_data = true;
            after.has_connected_data = true;
        }

        self.store.save(&before, &after).await?;
        Ok(after)
    }

    /// Empty the user's server-side data and drop the main flags
    pub async fn clear_all_data(&mut self) -> Result<()> {
        self.require_screen(Screen::Dashboard, "Clearing data")?;

        self.api.clear_database().await?;

        let before = self.store.load().await?;
        let mut after = before.clone();
        after.has_ever_had_data = false;
        after.has_connected_data = false;
        self.store.save(&before, &after).await?;

        info!("🗑️ Cleared all user data");
        Ok(())
    }

    /// Best-effort remote logout followed by unconditional local teardown
    pub async fn end_session(&self) {
        if let Err(e) = self.api.logout().await {
            warn!("Logout request failed, clearing local session anyway: {}", e);
        }
        if let Err(e) = self.store.clear_all().await {
            error!("Failed to clear stored session: {}", e);
        }
        info!("👋 Session cleared");
    }

    /// Log out from the dashboard
    pub async fn logout(&mut self) -> Result<Screen> {
        self.router.peek(NavEvent::LoggedOut)?;
        self.end_session().await;
        Ok(self.router.logged_out()?)
    }

    /// Three-read probe where failures count as "no data", as the login form does
    pub async fn probe_remote(&self) -> bool {
        self.reconciler.probe_remote().await
    }

    fn require_screen(&self, screen: Screen, action: &str) -> Result<()> {
        match self.router.current() {
            Some(current) if current == screen => Ok(()),
            Some(current) => Err(anyhow!("{} is only available on {}, not {}", action, screen, current)),
            None => Err(anyhow!("{} is not available while loading", action)),
        }
    }
}
