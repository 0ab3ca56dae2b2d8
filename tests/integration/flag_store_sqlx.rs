//! SQLite flag store on a temporary database

use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::logging::{init_test_logging, log_test_step};
use centi_client::database_sqlx::FlagStoreSqlx;
use centi_client::models::{keys, SessionState};
use centi_client::storage::{FlagStore, MemoryFlagStore, SessionStore};

fn temp_db() -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("centi_session.db").to_string_lossy().to_string();
    (dir, path)
}

#[tokio::test]
async fn test_round_trip_across_reopen() {
    init_test_logging();
    let (_dir, path) = temp_db();

    log_test_step("Write, overwrite and remove");
    {
        let store = FlagStoreSqlx::new(&path).await.unwrap();
        store.set(keys::HAS_FILES, "true").await.unwrap();
        store.set(keys::HAS_ACCOUNTS, "true").await.unwrap();
        store.set(keys::PLAID_ACCESS_TOKEN, "access-sandbox-1").await.unwrap();
        store.set(keys::PLAID_ACCESS_TOKEN, "access-sandbox-2").await.unwrap();
        store.remove(keys::HAS_ACCOUNTS).await.unwrap();
        store.remove("never-written").await.unwrap();
    }

    log_test_step("Reopen the same file");
    let store = FlagStoreSqlx::new(&format!("sqlite:{}", path)).await.unwrap();
    assert!(store.get_flag(keys::HAS_FILES).await.unwrap());
    assert!(!store.get_flag(keys::HAS_ACCOUNTS).await.unwrap());
    assert_eq!(
        store.get(keys::PLAID_ACCESS_TOKEN).await.unwrap().as_deref(),
        Some("access-sandbox-2")
    );
    assert_eq!(
        store.entries().await.unwrap(),
        vec![
            (keys::HAS_FILES.to_string(), "true".to_string()),
            (keys::PLAID_ACCESS_TOKEN.to_string(), "access-sandbox-2".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_session_persists_but_volatile_marker_does_not() {
    init_test_logging();
    let (_dir, path) = temp_db();

    let mut state = SessionState {
        user: Some(r#"{"id":7,"email":"ada@centi.app"}"#.to_string()),
        navigated_from_finance_connect: true,
        ..Default::default()
    };
    state.set_all_data_flags();

    {
        let persistent = FlagStoreSqlx::new(&path).await.unwrap();
        let store = SessionStore::new(Arc::new(persistent), Arc::new(MemoryFlagStore::new()));
        store.save(&SessionState::default(), &state).await.unwrap();
        assert_eq!(store.load().await.unwrap(), state);
    }

    let persistent = FlagStoreSqlx::new(&path).await.unwrap();
    let store = SessionStore::new(Arc::new(persistent), Arc::new(MemoryFlagStore::new()));
    let reloaded = store.load().await.unwrap();
    assert_eq!(
        reloaded,
        SessionState {
            navigated_from_finance_connect: false,
            ..state
        }
    );

    store.clear_all().await.unwrap();
    assert_eq!(store.load().await.unwrap(), SessionState::default());
}
