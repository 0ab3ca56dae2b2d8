//! Scripted stand-in for the REST API that counts every call

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use centi_client::api::{AccessTokenResponse, ApiError, ApiResult, FinanceApi};
use serde_json::{json, Value};

/// What the three collection endpoints report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteData {
    /// One transaction, nothing else
    Present,
    Empty,
    /// Every read fails
    Unreachable,
}

#[derive(Debug)]
struct Inner {
    data: Mutex<RemoteData>,
    logout_fails: AtomicBool,
    reads: AtomicUsize,
    logouts: AtomicUsize,
    exchanges: AtomicUsize,
    clears: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct ScriptedApi {
    inner: Arc<Inner>,
}

impl ScriptedApi {
    pub fn new(data: RemoteData) -> Self {
        Self {
            inner: Arc::new(Inner {
                data: Mutex::new(data),
                logout_fails: AtomicBool::new(false),
                reads: AtomicUsize::new(0),
                logouts: AtomicUsize::new(0),
                exchanges: AtomicUsize::new(0),
                clears: AtomicUsize::new(0),
            }),
        }
    }

    pub fn set_data(&self, data: RemoteData) {
        *self.inner.data.lock().unwrap() = data;
    }

    pub fn fail_logout(&self) {
        self.inner.logout_fails.store(true, Ordering::SeqCst);
    }

    /// Collection reads issued so far, three per probe
    pub fn reads(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.inner.logouts.load(Ordering::SeqCst)
    }

    pub fn exchanges(&self) -> usize {
        self.inner.exchanges.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.inner.clears.load(Ordering::SeqCst)
    }

    fn read(&self, path: &str, item: Value) -> ApiResult<Vec<Value>> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        let data = *self.inner.data.lock().unwrap();
        match data {
            RemoteData::Present if path == "transactions" => Ok(vec![item]),
            RemoteData::Present | RemoteData::Empty => Ok(vec![]),
            RemoteData::Unreachable => Err(unreachable(path)),
        }
    }
}

fn unreachable(path: &str) -> ApiError {
    ApiError::Status {
        path: path.to_string(),
        status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        body: "down for maintenance".to_string(),
    }
}

#[async_trait::async_trait]
impl FinanceApi for ScriptedApi {
    async fn list_transactions(&self) -> ApiResult<Vec<Value>> {
        self.read("transactions", json!({"id": 1, "amount": -12.5, "description": "Coffee"}))
    }

    async fn list_accounts(&self) -> ApiResult<Vec<Value>> {
        self.read("accounts", json!({"id": 1, "name": "Checking"}))
    }

    async fn list_files(&self) -> ApiResult<Vec<Value>> {
        self.read("files", json!({"id": 1, "filename": "statement.csv"}))
    }

    async fn logout(&self) -> ApiResult<()> {
        self.inner.logouts.fetch_add(1, Ordering::SeqCst);
        if self.inner.logout_fails.load(Ordering::SeqCst) {
            return Err(unreachable("auth/logout"));
        }
        Ok(())
    }

    async fn exchange_public_token(&self, public_token: &str) -> ApiResult<AccessTokenResponse> {
        self.inner.exchanges.fetch_add(1, Ordering::SeqCst);
        Ok(AccessTokenResponse {
            access_token: format!("access-for-{}", public_token),
            item_id: Some("item-1".to_string()),
        })
    }

    async fn clear_database(&self) -> ApiResult<()> {
        self.inner.clears.fetch_add(1, Ordering::SeqCst);
        self.set_data(RemoteData::Empty);
        Ok(())
    }
}
