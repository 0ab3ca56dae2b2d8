use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::models::UserRecord;

pub mod centi_client;
pub use centi_client::CentiClient;

/// Errors returned by the Centi REST API client
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} returned {status}: {body}")]
    Status {
        path: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{path} rejected the session and it could not be refreshed")]
    Unauthorized { path: String },
    #[error("could not decode response from {path}: {message}")]
    Decode { path: String, message: String },
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Server-side collections whose presence means "the user has data"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Transactions,
    Accounts,
    Files,
}

impl DataSource {
    pub const ALL: [DataSource; 3] = [DataSource::Transactions, DataSource::Accounts, DataSource::Files];

    /// Read the collection for this source through the given provider
    pub async fn list<A: FinanceApi + ?Sized>(self, api: &A) -> ApiResult<Vec<Value>> {
        match self {
            DataSource::Transactions => api.list_transactions().await,
            DataSource::Accounts => api.list_accounts().await,
            DataSource::Files => api.list_files().await,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataSource::Transactions => "transactions",
            DataSource::Accounts => "accounts",
            DataSource::Files => "files",
        })
    }
}

/// Remote operations the session logic depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait FinanceApi: Send + Sync {
    async fn list_transactions(&self) -> ApiResult<Vec<Value>>;
    async fn list_accounts(&self) -> ApiResult<Vec<Value>>;
    async fn list_files(&self) -> ApiResult<Vec<Value>>;
    async fn logout(&self) -> ApiResult<()>;
    /// Swap a Plaid Link public token for a long-lived access token
    async fn exchange_public_token(&self, public_token: &str) -> ApiResult<AccessTokenResponse>;
    /// Delete every transaction, file and account the user owns
    async fn clear_database(&self) -> ApiResult<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Body of the login, register and refresh endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: UserRecord,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub item_id: Option<String>,
}
