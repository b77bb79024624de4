mod common;

use common::{token_json, write_secrets};
use gcal_sender::components::google_calendar::scopes::Capability;
use gcal_sender::components::google_calendar::secrets::ClientSecrets;
use gcal_sender::components::google_calendar::{AuthorizationFlow, DeviceCodeFlow, TokenManager};
use gcal_sender::error::Error;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_device_code(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/device/code"))
        .and(body_string_contains("client_id=test-client.apps.googleusercontent.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dev-123",
            "user_code": "ABCD-EFGH",
            "verification_url": "https://www.google.com/device",
            "expires_in": 1800,
            "interval": 0
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn secrets(server: &MockServer, dir: &tempfile::TempDir) -> ClientSecrets {
    ClientSecrets::load(&write_secrets(dir.path(), &server.uri())).unwrap()
}

#[tokio::test]
async fn test_device_flow_polls_until_granted() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(428).set_body_json(json!({ "error": "authorization_pending" })),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("device_code=dev-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.device",
            "refresh_token": "refresh-device",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/calendar.readonly",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let secrets = secrets(&server, &dir);
    let flow = DeviceCodeFlow::new(Duration::from_secs(10), CancellationToken::new());

    let credential = flow
        .authorize(&secrets, &Capability::ReadOnly.scopes())
        .await
        .unwrap();

    assert_eq!(credential.token.as_deref(), Some("ya29.device"));
    assert_eq!(credential.refresh_token.as_deref(), Some("refresh-device"));
    assert_eq!(credential.client_id, "test-client.apps.googleusercontent.com");
    assert_eq!(credential.token_uri, format!("{}/token", server.uri()));
    assert!(credential.has_scopes(&Capability::ReadOnly.scopes()));
    assert!(credential.is_valid());
}

#[tokio::test]
async fn test_device_flow_access_denied() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "error": "access_denied" })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let secrets = secrets(&server, &dir);
    let flow = DeviceCodeFlow::new(Duration::from_secs(10), CancellationToken::new());

    let result = flow.authorize(&secrets, &Capability::ReadOnly.scopes()).await;
    assert!(matches!(result, Err(Error::Auth(_))));
}

#[tokio::test]
async fn test_device_flow_times_out() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(428)
                .set_body_json(json!({ "error": "authorization_pending" }))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let secrets = secrets(&server, &dir);
    let flow = DeviceCodeFlow::new(Duration::from_millis(300), CancellationToken::new());

    let result = flow.authorize(&secrets, &Capability::ReadOnly.scopes()).await;
    assert!(matches!(result, Err(Error::AuthTimeout(_))));
}

#[tokio::test]
async fn test_device_flow_cancelled() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(428)
                .set_body_json(json!({ "error": "authorization_pending" }))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let secrets = secrets(&server, &dir);
    let cancel = CancellationToken::new();
    let flow = DeviceCodeFlow::new(Duration::from_secs(30), cancel.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let result = flow.authorize(&secrets, &Capability::ReadOnly.scopes()).await;
    assert!(matches!(result, Err(Error::Cancelled)));
}

/// `authorize` always runs the flow and overwrites the stored token
#[tokio::test]
async fn test_token_manager_authorize_persists_device_grant() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("ya29.granted")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_secrets(dir.path(), &server.uri());
    std::fs::write(dir.path().join("token.json"), "stale").unwrap();

    let manager = TokenManager::new(
        dir.path().join("token.json"),
        dir.path().join("credentials.json"),
        Capability::ReadWrite.scopes(),
    );
    let flow = DeviceCodeFlow::new(Duration::from_secs(10), CancellationToken::new());

    let credential = manager.authorize(&flow).await.unwrap();
    let stored = manager.store().load().unwrap().unwrap();

    assert_eq!(stored, credential);
    assert_eq!(stored.token.as_deref(), Some("ya29.granted"));
}
