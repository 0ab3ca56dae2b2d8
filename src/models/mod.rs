use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Storage keys shared by the persistent and volatile flag stores
pub mod keys {
    pub const USER: &str = "user";
    pub const HAS_EVER_HAD_DATA: &str = "hasEverHadData";
    pub const HAS_CONNECTED_DATA: &str = "hasConnectedData";
    pub const HAS_TRANSACTIONS: &str = "hasTransactions";
    pub const HAS_FILES: &str = "hasFiles";
    pub const HAS_ACCOUNTS: &str = "hasAccounts";
    pub const PLAID_ACCESS_TOKEN: &str = "plaid_access_token";

    /// Volatile, lives only as long as the browsing context
    pub const NAVIGATED_FROM_FINANCE_CONNECT: &str = "hasNavigatedFromFinanceConnect";

    /// Every persisted key, in the order they are written
    pub const PERSISTED: [&str; 7] = [
        USER,
        HAS_EVER_HAD_DATA,
        HAS_CONNECTED_DATA,
        HAS_TRANSACTIONS,
        HAS_FILES,
        HAS_ACCOUNTS,
        PLAID_ACCESS_TOKEN,
    ];
}

/// Screens the application can show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Welcome,
    AccountSetup(AuthModal),
    FinanceConnect,
    Dashboard,
    VerifyEmail,
    ResetPassword,
}

impl Screen {
    /// Screen selected by a deep-link path, if the path is one
    pub fn from_entry_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "/verify-email" => Some(Screen::VerifyEmail),
            "/reset-password" => Some(Screen::ResetPassword),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Screen::Welcome => "welcome",
            Screen::AccountSetup(_) => "account-setup",
            Screen::FinanceConnect => "finance-connect",
            Screen::Dashboard => "dashboard",
            Screen::VerifyEmail => "verify-email",
            Screen::ResetPassword => "reset-password",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::AccountSetup(modal) => write!(f, "account-setup ({})", modal),
            other => f.write_str(other.id()),
        }
    }
}

/// Sub-mode rendered by the account-setup screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthModal {
    SignUp,
    Login,
    EmailVerification,
}

impl fmt::Display for AuthModal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuthModal::SignUp => "signup",
            AuthModal::Login => "login",
            AuthModal::EmailVerification => "email-verification",
        };
        f.write_str(label)
    }
}

impl FromStr for AuthModal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "signup" | "sign-up" | "register" => Ok(AuthModal::SignUp),
            "login" | "signin" | "sign-in" => Ok(AuthModal::Login),
            "email-verification" | "verify" => Ok(AuthModal::EmailVerification),
            other => Err(anyhow::anyhow!("Unknown account setup mode: {}", other)),
        }
    }
}

/// User record as returned by the auth endpoints and kept under the `user` key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    /// Fields the client does not interpret, kept so the record round-trips
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserRecord {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name, &self.email) {
            (Some(first), Some(last), _) => format!("{} {}", first, last),
            (Some(first), None, _) => first.clone(),
            (None, _, Some(email)) => email.clone(),
            _ => "unknown user".to_string(),
        }
    }
}

/// Snapshot of every flag the navigation logic reads.
///
/// Decision functions take this by value and hand back the modified copy;
/// writing it to storage is the caller's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Raw serialized user record; presence is the session marker
    pub user: Option<String>,
    pub has_ever_had_data: bool,
    pub has_connected_data: bool,
    pub has_transactions: bool,
    pub has_files: bool,
    pub has_accounts: bool,
    pub bank_token: Option<String>,
    pub navigated_from_finance_connect: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Parsed user record. A marker that is not valid JSON still counts as a session.
    pub fn user_record(&self) -> Option<UserRecord> {
        self.user
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    /// True only when the stored record explicitly says the email is unverified
    pub fn awaiting_email_verification(&self) -> bool {
        matches!(
            self.user_record(),
            Some(UserRecord { is_verified: Some(false), .. })
        )
    }

    pub fn has_bank_link(&self) -> bool {
        self.bank_token.as_deref().map_or(false, |t| !t.is_empty())
    }

    /// Any of the eagerly written flags that assert a connection exists
    pub fn any_optimistic_flag(&self) -> bool {
        self.has_connected_data || self.has_transactions || self.has_files || self.has_accounts
    }

    pub fn set_all_data_flags(&mut self) {
        self.has_ever_had_data = true;
        self.has_connected_data = true;
        self.has_transactions = true;
        self.has_files = true;
        self.has_accounts = true;
    }

    pub fn clear_data_flags(&mut self) {
        self.has_ever_had_data = false;
        self.has_connected_data = false;
        self.has_transactions = false;
        self.has_files = false;
        self.has_accounts = false;
    }
}

/// What to answer when a reconciliation read fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Reuse the optimistic flags that were set before the read
    ConservativeOnError,
    /// Assume the data is there
    OptimisticOnError,
}

impl FromStr for FallbackPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conservative" => Ok(FallbackPolicy::ConservativeOnError),
            "optimistic" => Ok(FallbackPolicy::OptimisticOnError),
            other => Err(anyhow::anyhow!(
                "Unknown fallback policy '{}', expected 'conservative' or 'optimistic'",
                other
            )),
        }
    }
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: Url,
    pub database_path: String,
    pub request_timeout: Option<Duration>,
    /// Send reloads with confirmed data straight to the dashboard
    pub dashboard_on_reload: bool,
    /// Single policy for every reconciliation step; `None` keeps the per-step defaults
    pub error_fallback: Option<FallbackPolicy>,
}

impl Config {
    pub const DEFAULT_API_BASE_URL: &'static str = "http://localhost:8000";

    /// Configuration pointing at the given API root with every other setting at its default
    pub fn new(api_base_url: &str) -> anyhow::Result<Self> {
        let api_base_url = Url::parse(api_base_url)
            .map_err(|e| anyhow::anyhow!("Invalid API base URL '{}': {}", api_base_url, e))?;

        Ok(Config {
            api_base_url,
            database_path: "centi_session.db".to_string(),
            request_timeout: None,
            dashboard_on_reload: false,
            error_fallback: None,
        })
    }

    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let base_url = std::env::var("CENTI_API_BASE_URL")
            .unwrap_or_else(|_| Self::DEFAULT_API_BASE_URL.to_string());
        let mut config = Config::new(&base_url)?;

        if let Ok(path) = std::env::var("CENTI_DATABASE_PATH") {
            config.database_path = path;
        }

        config.request_timeout = match std::env::var("CENTI_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => Some(Duration::from_secs(raw.trim().parse().map_err(|_| {
                anyhow::anyhow!("CENTI_REQUEST_TIMEOUT_SECS must be a whole number of seconds, got '{}'", raw)
            })?)),
            Err(_) => None,
        };

        config.dashboard_on_reload = std::env::var("CENTI_DASHBOARD_ON_RELOAD")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        config.error_fallback = match std::env::var("CENTI_ERROR_FALLBACK") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().parse()?),
            _ => None,
        };

        Ok(config)
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
