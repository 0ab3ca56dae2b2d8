use tracing::info;

use crate::models::{AuthModal, Screen, SessionState};
use crate::reconciler::{Reconciler, Reconciliation};

/// Knobs for the initial screen decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapSettings {
    /// Let a fresh load with confirmed data open the dashboard
    pub dashboard_on_reload: bool,
}

/// Outcome of the initial screen decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapDecision {
    pub screen: Screen,
    /// Flags after reconciliation; persist these
    pub state: SessionState,
    pub reconciliation: Option<Reconciliation>,
    pub fresh_page_load: bool,
}

/// Screen forced by the entry path, decided before storage is read
pub fn entry_screen(entry_path: Option<&str>) -> Option<Screen> {
    entry_path.and_then(Screen::from_entry_path)
}

/// Pick the first screen to show for this load.
///
/// Unauthenticated sessions go to the welcome page without touching the API.
/// Authenticated ones are reconciled, and only an in-flow navigation (the
/// volatile marker is present) with confirmed data opens the dashboard.
pub async fn determine_initial_screen(
    reconciler: &Reconciler,
    state: SessionState,
    settings: BootstrapSettings,
) -> BootstrapDecision {
    let fresh_page_load = !state.navigated_from_finance_connect;

    if !state.is_authenticated() {
        info!("👋 No stored session, showing welcome");
        return BootstrapDecision {
            screen: Screen::Welcome,
            state,
            reconciliation: None,
            fresh_page_load,
        };
    }

    if state.awaiting_email_verification() {
        info!("📧 Stored user has not verified their email yet");
        return BootstrapDecision {
            screen: Screen::AccountSetup(AuthModal::EmailVerification),
            state,
            reconciliation: None,
            fresh_page_load,
        };
    }

    let reconciliation = reconciler.has_existing_data(state).await;
    let open_dashboard =
        reconciliation.has_data && (!fresh_page_load || settings.dashboard_on_reload);

    let screen = if open_dashboard {
        Screen::Dashboard
    } else {
        Screen::FinanceConnect
    };
    info!(
        "🧭 Initial screen: {} (has data = {}, fresh load = {})",
        screen, reconciliation.has_data, fresh_page_load
    );

    BootstrapDecision {
        screen,
        state: reconciliation.state.clone(),
        reconciliation: Some(reconciliation),
        fresh_page_load,
    }
}
