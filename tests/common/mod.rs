#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gcal_sender::components::google_calendar::scopes::CALENDAR_SCOPE;
use gcal_sender::components::google_calendar::secrets::ClientSecrets;
use gcal_sender::components::google_calendar::{AuthorizationFlow, Credential};
use gcal_sender::error::CalResult;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Flow that hands out a fixed credential and counts how often it ran
pub struct StubFlow {
    calls: AtomicUsize,
    credential: Credential,
}

impl StubFlow {
    pub fn new(credential: Credential) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            credential,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthorizationFlow for StubFlow {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn authorize(&self, _secrets: &ClientSecrets, _scopes: &[String]) -> CalResult<Credential> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.credential.clone())
    }
}

/// Read-write credential against the given token endpoint
pub fn credential(token_uri: &str, access_token: &str, expiry: Option<DateTime<Utc>>) -> Credential {
    Credential {
        token: Some(access_token.to_string()),
        refresh_token: Some("refresh-abc".to_string()),
        token_uri: token_uri.to_string(),
        client_id: "test-client.apps.googleusercontent.com".to_string(),
        client_secret: "test-secret".to_string(),
        scopes: vec![CALENDAR_SCOPE.to_string()],
        expiry,
    }
}

pub fn valid_credential(token_uri: &str) -> Credential {
    credential(token_uri, "ya29.valid", Some(Utc::now() + Duration::hours(1)))
}

pub fn expired_credential(token_uri: &str) -> Credential {
    credential(token_uri, "ya29.stale", Some(Utc::now() - Duration::hours(1)))
}

/// Write an `installed` client secrets file pointing at `base_uri`
pub fn write_secrets(dir: &Path, base_uri: &str) -> PathBuf {
    let path = dir.join("credentials.json");
    let content = serde_json::json!({
        "installed": {
            "client_id": "test-client.apps.googleusercontent.com",
            "client_secret": "test-secret",
            "auth_uri": format!("{}/auth", base_uri),
            "token_uri": format!("{}/token", base_uri),
            "device_auth_uri": format!("{}/device/code", base_uri),
            "redirect_uris": ["http://localhost"]
        }
    });
    fs::write(&path, content.to_string()).expect("failed to write client secrets");
    path
}

pub fn write_credential(path: &Path, credential: &Credential) {
    let json = serde_json::to_string_pretty(credential).expect("failed to serialize credential");
    fs::write(path, json).expect("failed to write credential");
}

pub fn token_json(access_token: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access_token,
        "expires_in": 3599,
        "scope": CALENDAR_SCOPE,
        "token_type": "Bearer"
    })
}
