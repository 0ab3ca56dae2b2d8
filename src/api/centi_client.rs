use anyhow::Result;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::models::{Config, UserRecord};
use super::{
    AccessTokenResponse, ApiError, ApiResult, AuthResponse, FinanceApi, LoginRequest,
    RegisterRequest,
};

const REFRESH_PATH: &str = "auth/refresh";

/// HTTP client for the Centi REST API.
///
/// Session cookies set by the server are kept in the client's cookie store.
/// Any `401` outside the auth endpoints triggers one `/auth/refresh` and a
/// single retry of the original request.
pub struct CentiClient {
    client: Client,
    base_url: Url,
}

impl CentiClient {
    /// Create a new Centi client
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .user_agent("centi-client/0.1");

        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        // `Url::join` drops the last path segment unless it ends in a slash
        let mut base_url = config.api_base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Decode {
                path: path.to_string(),
                message: format!("invalid endpoint: {}", e),
            })
    }

    fn request(&self, method: Method, url: Url, body: Option<&Value>) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }

    /// Send a request, refreshing the session once on `401`
    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> ApiResult<Response> {
        let url = self.endpoint(path)?;
        debug!("Making request: {} {}", method, url);

        let response = self
            .request(method.clone(), url.clone(), body)
            .send()
            .await
            .map_err(|source| ApiError::Transport { path: path.to_string(), source })?;

        if response.status() != StatusCode::UNAUTHORIZED || is_auth_endpoint(path) {
            return check_status(path, response).await;
        }

        warn!("🔑 {} returned 401, refreshing session", path);
        if let Err(e) = self.refresh_session().await {
            warn!("Session refresh failed: {}", e);
            return Err(ApiError::Unauthorized { path: path.to_string() });
        }

        let retried = self
            .request(method, url, body)
            .send()
            .await
            .map_err(|source| ApiError::Transport { path: path.to_string(), source })?;

        if retried.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized { path: path.to_string() });
        }
        check_status(path, retried).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ApiResult<T> {
        let response = self.send(method, path, body).await?;
        decode(path, response).await
    }

    async fn get_list(&self, path: &str) -> ApiResult<Vec<Value>> {
        let value: Value = self.send_json(Method::GET, path, None).await?;
        let items = extract_items(path, value)?;
        debug!("{} returned {} items", path, items.len());
        Ok(items)
    }

    /// Log in with email and password
    pub async fn login(&self, request: &LoginRequest) -> ApiResult<AuthResponse> {
        let body = to_body("auth/login", request)?;
        let auth: AuthResponse = self.send_json(Method::POST, "auth/login", Some(&body)).await?;
        info!("✅ Logged in as {}", auth.user.display_name());
        Ok(auth)
    }

    /// Create a new account
    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<AuthResponse> {
        let body = to_body("auth/register", request)?;
        let auth: AuthResponse = self.send_json(Method::POST, "auth/register", Some(&body)).await?;
        info!("✅ Registered {}", auth.user.display_name());
        Ok(auth)
    }

    /// Fetch the user the current session belongs to
    pub async fn current_user(&self) -> ApiResult<UserRecord> {
        self.send_json(Method::GET, "auth/me", None).await
    }

    /// Ask the server to rotate the access cookie using the refresh cookie
    pub async fn refresh_session(&self) -> ApiResult<()> {
        let url = self.endpoint(REFRESH_PATH)?;
        debug!("Refreshing session: POST {}", url);

        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|source| ApiError::Transport { path: REFRESH_PATH.to_string(), source })?;

        check_status(REFRESH_PATH, response).await?;
        info!("🔑 Session refreshed");
        Ok(())
    }
}

#[async_trait::async_trait]
impl FinanceApi for CentiClient {
    async fn list_transactions(&self) -> ApiResult<Vec<Value>> {
        self.get_list("transactions").await
    }

    async fn list_accounts(&self) -> ApiResult<Vec<Value>> {
        self.get_list("accounts").await
    }

    async fn list_files(&self) -> ApiResult<Vec<Value>> {
        self.get_list("files").await
    }

    async fn logout(&self) -> ApiResult<()> {
        self.send(Method::POST, "auth/logout", None).await?;
        Ok(())
    }

    async fn exchange_public_token(&self, public_token: &str) -> ApiResult<AccessTokenResponse> {
        let body = serde_json::json!({ "public_token": public_token });
        self.send_json(Method::POST, "plaid/exchange_public_token", Some(&body))
            .await
    }

    async fn clear_database(&self) -> ApiResult<()> {
        self.send(Method::DELETE, "clear", None).await?;
        Ok(())
    }
}

fn is_auth_endpoint(path: &str) -> bool {
    path.trim_start_matches('/').starts_with("auth/")
}

async fn check_status(path: &str, response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status { path: path.to_string(), status, body })
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> ApiResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|source| ApiError::Transport { path: path.to_string(), source })?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}

fn to_body<T: serde::Serialize>(path: &str, request: &T) -> ApiResult<Value> {
    serde_json::to_value(request).map_err(|e| ApiError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Collections come back as bare arrays; a `{"data": [...]}` wrapper is accepted too
fn extract_items(path: &str, value: Value) -> ApiResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("data").or_else(|| map.remove("items")) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ApiError::Decode {
                path: path.to_string(),
                message: "expected a JSON array".to_string(),
            }),
        },
        other => Err(ApiError::Decode {
            path: path.to_string(),
            message: format!("expected a JSON array, got {}", other),
        }),
    }
}
