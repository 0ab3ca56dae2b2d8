use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::models::{keys, SessionState};

/// Key-value persistence for client-side flags
#[async_trait::async_trait]
pub trait FlagStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;

    /// A flag is set only when the stored string is exactly `"true"`
    async fn get_flag(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.as_deref() == Some("true"))
    }

    /// Unset flags are removed rather than written as `"false"`
    async fn put_flag(&self, key: &str, value: bool) -> Result<()> {
        if value {
            self.set(key, "true").await
        } else {
            self.remove(key).await
        }
    }
}

/// In-memory store. Used for the volatile session scope and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryFlagStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every entry, for inspection
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> Result<T> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory flag store lock poisoned"))?;
        Ok(f(&mut entries))
    }
}

#[async_trait::async_trait]
impl FlagStore for MemoryFlagStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }
}

/// Session storage split into a persistent scope and a volatile one
#[derive(Clone)]
pub struct SessionStore {
    persistent: Arc<dyn FlagStore>,
    volatile: Arc<dyn FlagStore>,
}

impl SessionStore {
    pub fn new(persistent: Arc<dyn FlagStore>, volatile: Arc<dyn FlagStore>) -> Self {
        Self { persistent, volatile }
    }

    /// Store backed entirely by memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryFlagStore::new()), Arc::new(MemoryFlagStore::new()))
    }

    /// Replace the volatile scope, as when a new browsing context starts
    pub fn reset_volatile(&mut self, volatile: Arc<dyn FlagStore>) {
        self.volatile = volatile;
    }

    /// Read every flag the navigation logic depends on
    pub async fn load(&self) -> Result<SessionState> {
        let p = &self.persistent;
        let state = SessionState {
            user: p.get(keys::USER).await?,
            has_ever_had_data: p.get_flag(keys::HAS_EVER_HAD_DATA).await?,
            has_connected_data: p.get_flag(keys::HAS_CONNECTED_DATA).await?,
            has_transactions: p.get_flag(keys::HAS_TRANSACTIONS).await?,
            has_files: p.get_flag(keys::HAS_FILES).await?,
            has_accounts: p.get_flag(keys::HAS_ACCOUNTS).await?,
            bank_token: p.get(keys::PLAID_ACCESS_TOKEN).await?,
            navigated_from_finance_connect: self
                .volatile
                .get_flag(keys::NAVIGATED_FROM_FINANCE_CONNECT)
                .await?,
        };
        debug!("Loaded session state: {:?}", redacted(&state));
        Ok(state)
    }

    /// Write every key whose value differs between `before` and `after`
    pub async fn save(&self, before: &SessionState, after: &SessionState) -> Result<()> {
        let p = &self.persistent;

        if before.user != after.user {
            put_optional(p.as_ref(), keys::USER, after.user.as_deref()).await?;
        }
        if before.bank_token != after.bank_token {
            put_optional(p.as_ref(), keys::PLAID_ACCESS_TOKEN, after.bank_token.as_deref()).await?;
        }

        let flags = [
            (keys::HAS_EVER_HAD_DATA, before.has_ever_had_data, after.has_ever_had_data),
            (keys::HAS_CONNECTED_DATA, before.has_connected_data, after.has_connected_data),
            (keys::HAS_TRANSACTIONS, before.has_transactions, after.has_transactions),
            (keys::HAS_FILES, before.has_files, after.has_files),
            (keys::HAS_ACCOUNTS, before.has_accounts, after.has_accounts),
        ];
        for (key, old, new) in flags {
            if old != new {
                p.put_flag(key, new).await?;
            }
        }

        if before.navigated_from_finance_connect != after.navigated_from_finance_connect {
            self.volatile
                .put_flag(keys::NAVIGATED_FROM_FINANCE_CONNECT, after.navigated_from_finance_connect)
                .await?;
        }
        Ok(())
    }

    /// Remove every persisted key and the volatile marker.
    ///
    /// Every key is attempted; the first failure is returned afterwards.
    pub async fn clear_all(&self) -> Result<()> {
        let mut first_error = None;
        for key in keys::PERSISTED {
            if let Err(e) = self.persistent.remove(key).await {
                warn!("Failed to remove {}: {}", key, e);
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.volatile.remove(keys::NAVIGATED_FROM_FINANCE_CONNECT).await {
            warn!("Failed to remove {}: {}", keys::NAVIGATED_FROM_FINANCE_CONNECT, e);
            first_error.get_or_insert(e);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn put_optional(store: &dyn FlagStore, key: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(value) => store.set(key, value).await,
        None => store.remove(key).await,
    }
}

/// State with the user record and bank token masked, for logs
fn redacted(state: &SessionState) -> SessionState {
    SessionState {
        user: state.user.as_ref().map(|_| "<user>".to_string()),
        bank_token: state.bank_token.as_ref().map(|_| "<token>".to_string()),
        ..state.clone()
    }
}
