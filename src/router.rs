use std::fmt;
use tracing::{debug, warn};

use crate::models::{AuthModal, Screen};

/// Events that move the router between screens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavEvent {
    Initialised(Screen),
    ShowAccountSetup(AuthModal),
    BackToWelcome,
    AuthSucceeded { has_data: bool },
    AwaitEmailVerification,
    EmailVerified,
    GetStarted,
    FinanceConnectCompleted,
    LoggedOut,
}

impl fmt::Display for NavEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavEvent::Initialised(screen) => write!(f, "initialise to {}", screen),
            NavEvent::ShowAccountSetup(modal) => write!(f, "show account setup ({})", modal),
            NavEvent::BackToWelcome => f.write_str("back to welcome"),
            NavEvent::AuthSucceeded { has_data } => write!(f, "auth succeeded (has data = {})", has_data),
            NavEvent::AwaitEmailVerification => f.write_str("await email verification"),
            NavEvent::EmailVerified => f.write_str("email verified"),
            NavEvent::GetStarted => f.write_str("get started"),
            NavEvent::FinanceConnectCompleted => f.write_str("finance connect completed"),
            NavEvent::LoggedOut => f.write_str("logged out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("the router has not picked an initial screen yet")]
    NotInitialised,
    #[error("the router is already showing {0}")]
    AlreadyInitialised(Screen),
    #[error("'{event}' is not allowed from {from}")]
    InvalidTransition { from: Screen, event: NavEvent },
}

/// Transition table. `None` means the event is not reachable from `from`.
pub fn next_screen(from: Screen, event: NavEvent) -> Option<Screen> {
    use Screen::*;

    match (from, event) {
        (Welcome, NavEvent::ShowAccountSetup(modal)) => Some(AccountSetup(modal)),
        (AccountSetup(_), NavEvent::ShowAccountSetup(modal)) => Some(AccountSetup(modal)),
        (AccountSetup(_), NavEvent::BackToWelcome) => Some(Welcome),
        (ResetPassword, NavEvent::BackToWelcome) => Some(Welcome),
        (AccountSetup(_), NavEvent::AuthSucceeded { has_data: true }) => Some(Dashboard),
        (AccountSetup(_), NavEvent::AuthSucceeded { has_data: false }) => Some(FinanceConnect),
        (AccountSetup(_), NavEvent::AwaitEmailVerification) => {
            Some(AccountSetup(AuthModal::EmailVerification))
        }
        (AccountSetup(AuthModal::EmailVerification), NavEvent::EmailVerified)
        | (VerifyEmail, NavEvent::EmailVerified) => Some(AccountSetup(AuthModal::Login)),
        (Welcome, NavEvent::GetStarted) => Some(FinanceConnect),
        (FinanceConnect, NavEvent::FinanceConnectCompleted) => Some(Dashboard),
        (Dashboard, NavEvent::LoggedOut) => Some(Welcome),
        _ => None,
    }
}

/// Holds the one screen currently shown
#[derive(Debug, Clone, Default)]
pub struct ScreenRouter {
    current: Option<Screen>,
}

impl ScreenRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Screen> {
        self.current
    }

    /// What to render; `loading` until the initial screen is known
    pub fn view(&self) -> String {
        self.current
            .map(|screen| screen.to_string())
            .unwrap_or_else(|| "loading".to_string())
    }

    pub fn initialise(&mut self, screen: Screen) -> Result<Screen, RouterError> {
        self.apply(NavEvent::Initialised(screen))
    }

    /// Back to the loading state, ahead of a new bootstrap
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Where an event would lead, without applying it
    pub fn peek(&self, event: NavEvent) -> Result<Screen, RouterError> {
        if let NavEvent::Initialised(screen) = event {
            return match self.current {
                Some(current) => Err(RouterError::AlreadyInitialised(current)),
                None => Ok(screen),
            };
        }

        let from = self.current.ok_or(RouterError::NotInitialised)?;
        next_screen(from, event).ok_or(RouterError::InvalidTransition { from, event })
    }

    /// Apply an event; on rejection the current screen is left as it was
    pub fn apply(&mut self, event: NavEvent) -> Result<Screen, RouterError> {
        match self.peek(event) {
            Ok(to) => {
                match self.current {
                    Some(from) => debug!("🧭 {} --[{}]--> {}", from, event, to),
                    None => debug!("Router initialised on {}", to),
                }
                self.current = Some(to);
                Ok(to)
            }
            Err(e) => {
                warn!("Rejected '{}': {}", event, e);
                Err(e)
            }
        }
    }

    pub fn show_account_setup(&mut self, modal: AuthModal) -> Result<Screen, RouterError> {
        self.apply(NavEvent::ShowAccountSetup(modal))
    }

    pub fn back_to_welcome(&mut self) -> Result<Screen, RouterError> {
        self.apply(NavEvent::BackToWelcome)
    }

    pub fn auth_succeeded(&mut self, has_data: bool) -> Result<Screen, RouterError> {
        self.apply(NavEvent::AuthSucceeded { has_data })
    }

    pub fn await_email_verification(&mut self) -> Result<Screen, RouterError> {
        self.apply(NavEvent::AwaitEmailVerification)
    }

    pub fn email_verified(&mut self) -> Result<Screen, RouterError> {
        self.apply(NavEvent::EmailVerified)
    }

    pub fn get_started(&mut self) -> Result<Screen, RouterError> {
        self.apply(NavEvent::GetStarted)
    }

    pub fn finance_connect_completed(&mut self) -> Result<Screen, RouterError> {
        self.apply(NavEvent::FinanceConnectCompleted)
    }

    pub fn logged_out(&mut self) -> Result<Screen, RouterError> {
        self.apply(NavEvent::LoggedOut)
    }
}
