//! REST client against a mock server

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use centi_client::api::{ApiError, CentiClient, FinanceApi, LoginRequest};
use centi_client::models::Config;

fn client_for(server: &MockServer) -> CentiClient {
    let config = Config::new(&server.uri()).unwrap();
    CentiClient::new(&config).unwrap()
}

#[test_log::test(tokio::test)]
async fn test_lists_collections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "amount": -4.2},
            {"id": 2, "amount": 100.0}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.list_transactions().await.unwrap().len(), 2);
    assert!(client.list_files().await.unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_refreshes_once_on_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 9}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Token refreshed"})))
        .expect(1)
        .mount(&server)
        .await;

    let accounts = client_for(&server).list_accounts().await.unwrap();
    assert_eq!(accounts, vec![json!({"id": 9})]);
}

#[test_log::test(tokio::test)]
async fn test_failed_refresh_surfaces_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server).list_transactions().await;
    assert_matches!(result, Err(ApiError::Unauthorized { path }) if path == "transactions");
}

#[test_log::test(tokio::test)]
async fn test_login_rejection_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid credentials"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let request = LoginRequest {
        email: "ada@centi.app".to_string(),
        password: "wrong".to_string(),
    };
    let result = client_for(&server).login(&request).await;
    assert_matches!(
        result,
        Err(ApiError::Status { status, body, .. })
            if status == reqwest::StatusCode::UNAUTHORIZED && body == "Invalid credentials"
    );
}

#[test_log::test(tokio::test)]
async fn test_login_returns_user_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "ada@centi.app", "password": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Login successful",
            "user": {
                "id": 7,
                "email": "ada@centi.app",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "is_verified": true,
                "created_at": "2024-01-01T00:00:00"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = LoginRequest {
        email: "ada@centi.app".to_string(),
        password: "hunter2".to_string(),
    };
    let auth = client_for(&server).login(&request).await.unwrap();
    assert_eq!(auth.user.display_name(), "Ada Lovelace");
    assert_eq!(auth.user.is_verified, Some(true));
    assert!(auth.user.extra.contains_key("created_at"));
}

#[test_log::test(tokio::test)]
async fn test_current_user_reads_me_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "email": "ada@centi.app",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "is_verified": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = client_for(&server).current_user().await.unwrap();
    assert_eq!(user.id, Some(7));
    assert_eq!(user.email.as_deref(), Some("ada@centi.app"));
    assert_eq!(user.is_verified, Some(false));
}

#[test_log::test(tokio::test)]
async fn test_current_user_without_session_is_not_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = client_for(&server).current_user().await;
    assert_matches!(
        result,
        Err(ApiError::Status { status, .. }) if status == reqwest::StatusCode::UNAUTHORIZED
    );
}

#[test_log::test(tokio::test)]
async fn test_exchange_logout_and_clear() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/plaid/exchange_public_token"))
        .and(body_json(json!({"public_token": "public-sandbox-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-sandbox-1",
            "item_id": "item-1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Logged out"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/clear"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Database cleared"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let exchanged = client.exchange_public_token("public-sandbox-1").await.unwrap();
    assert_eq!(exchanged.access_token, "access-sandbox-1");
    assert_eq!(exchanged.item_id.as_deref(), Some("item-1"));

    client.clear_database().await.unwrap();
    client.logout().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_server_error_keeps_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = client_for(&server).list_files().await;
    assert_matches!(
        result,
        Err(ApiError::Status { status, .. }) if status == reqwest::StatusCode::INTERNAL_SERVER_ERROR
    );
}
