mod common;

use common::{
    expired_credential, token_json, valid_credential, write_credential, write_secrets, StubFlow,
};
use gcal_sender::components::google_calendar::scopes::{
    Capability, CALENDAR_READONLY_SCOPE,
};
use gcal_sender::components::google_calendar::{TokenManager, TokenStore};
use gcal_sender::error::Error;
use std::fs;
use wiremock::matchers::{any, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn manager(dir: &std::path::Path) -> TokenManager {
    TokenManager::new(
        dir.join("token.json"),
        dir.join("credentials.json"),
        Capability::ReadWrite.scopes(),
    )
}

/// A valid stored token is returned as-is without touching the network or the file
#[tokio::test]
async fn test_valid_stored_credential_is_reused() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    let stored = valid_credential(&format!("{}/token", server.uri()));
    write_credential(&token_path, &stored);
    let before = fs::read_to_string(&token_path).unwrap();

    let flow = StubFlow::new(valid_credential("unused"));
    let credential = manager(dir.path()).acquire(&flow).await.unwrap();

    assert_eq!(credential, stored);
    assert_eq!(flow.calls(), 0);
    assert_eq!(fs::read_to_string(&token_path).unwrap(), before);
}

/// An expired token with a refresh token triggers exactly one refresh, then is persisted
#[tokio::test]
async fn test_expired_credential_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("ya29.fresh")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    write_credential(&token_path, &expired_credential(&format!("{}/token", server.uri())));

    let flow = StubFlow::new(valid_credential("unused"));
    let credential = manager(dir.path()).acquire(&flow).await.unwrap();

    assert_eq!(credential.token.as_deref(), Some("ya29.fresh"));
    assert_eq!(credential.refresh_token.as_deref(), Some("refresh-abc"));
    assert!(credential.is_valid());
    assert_eq!(flow.calls(), 0);

    let persisted = TokenStore::new(&token_path).load().unwrap().unwrap();
    assert_eq!(persisted, credential);
}

#[tokio::test]
async fn test_refresh_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_credential(
        &dir.path().join("token.json"),
        &expired_credential(&format!("{}/token", server.uri())),
    );

    let flow = StubFlow::new(valid_credential("unused"));
    let result = manager(dir.path()).acquire(&flow).await;

    match result {
        Err(Error::Auth(message)) => assert!(message.contains("invalid_grant")),
        other => panic!("expected auth error, got {:?}", other),
    }
    assert_eq!(flow.calls(), 0);
}

#[tokio::test]
async fn test_missing_token_runs_flow_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    write_secrets(dir.path(), "http://127.0.0.1:9");

    let granted = valid_credential("https://oauth2.googleapis.com/token");
    let flow = StubFlow::new(granted.clone());
    let credential = manager(dir.path()).acquire(&flow).await.unwrap();

    assert_eq!(credential, granted);
    assert_eq!(flow.calls(), 1);

    let persisted = TokenStore::new(dir.path().join("token.json"))
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(persisted, granted);
}

#[tokio::test]
async fn test_corrupt_token_falls_back_to_flow() {
    let dir = tempfile::tempdir().unwrap();
    write_secrets(dir.path(), "http://127.0.0.1:9");
    fs::write(dir.path().join("token.json"), "{ not json").unwrap();

    let flow = StubFlow::new(valid_credential("https://oauth2.googleapis.com/token"));
    let credential = manager(dir.path()).acquire(&flow).await.unwrap();

    assert_eq!(flow.calls(), 1);
    assert_eq!(credential.token.as_deref(), Some("ya29.valid"));
}

#[tokio::test]
async fn test_read_only_token_is_not_enough_for_write() {
    let dir = tempfile::tempdir().unwrap();
    write_secrets(dir.path(), "http://127.0.0.1:9");

    let mut read_only = valid_credential("https://oauth2.googleapis.com/token");
    read_only.scopes = vec![CALENDAR_READONLY_SCOPE.to_string()];
    write_credential(&dir.path().join("token.json"), &read_only);

    let flow = StubFlow::new(valid_credential("https://oauth2.googleapis.com/token"));
    manager(dir.path()).acquire(&flow).await.unwrap();

    assert_eq!(flow.calls(), 1);
}

#[tokio::test]
async fn test_expired_without_refresh_token_runs_flow() {
    let dir = tempfile::tempdir().unwrap();
    write_secrets(dir.path(), "http://127.0.0.1:9");

    let mut expired = expired_credential("https://oauth2.googleapis.com/token");
    expired.refresh_token = None;
    write_credential(&dir.path().join("token.json"), &expired);

    let flow = StubFlow::new(valid_credential("https://oauth2.googleapis.com/token"));
    let credential = manager(dir.path()).acquire(&flow).await.unwrap();

    assert_eq!(flow.calls(), 1);
    assert!(credential.is_valid());
}

#[tokio::test]
async fn test_missing_client_secrets_fails_when_flow_needed() {
    let dir = tempfile::tempdir().unwrap();

    let flow = StubFlow::new(valid_credential("https://oauth2.googleapis.com/token"));
    let result = manager(dir.path()).acquire(&flow).await;

    assert!(matches!(result, Err(Error::Config(_))));
    assert_eq!(flow.calls(), 0);
    assert!(!dir.path().join("token.json").exists());
}

#[test]
fn test_persisted_credential_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = TokenStore::new(dir.path().join("nested").join("token.json"));
    let credential = valid_credential("https://oauth2.googleapis.com/token");

    store.save(&credential).unwrap();
    let reloaded = store.load().unwrap().unwrap();

    assert_eq!(reloaded.scopes, credential.scopes);
    assert_eq!(reloaded.expiry, credential.expiry);
    assert_eq!(reloaded, credential);
}

#[test]
fn test_missing_token_file_loads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = TokenStore::new(dir.path().join("token.json"));
    assert!(store.load().unwrap().is_none());
}
