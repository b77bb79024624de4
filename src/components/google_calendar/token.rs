use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::auth::AuthorizationFlow;
use super::scopes::scopes_satisfied;
use super::secrets::{ClientSecrets, GOOGLE_TOKEN_URI};
use crate::error::{auth_error, CalResult};

/// Tokens this close to expiry are treated as expired
pub fn refresh_threshold() -> Duration {
    Duration::seconds(225)
}

/// Authorized-user token material, stored as `token.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Access token
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl Credential {
    /// Build a credential from a fresh grant at the token endpoint
    pub fn from_grant(
        response: TokenResponse,
        secrets: &ClientSecrets,
        requested_scopes: &[String],
        now: DateTime<Utc>,
    ) -> Self {
        let mut credential = Self {
            token: None,
            refresh_token: None,
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            scopes: requested_scopes.to_vec(),
            expiry: None,
        };
        credential.apply(response, now);
        credential
    }

    /// Merge a token endpoint response into this credential
    pub fn apply(&mut self, response: TokenResponse, now: DateTime<Utc>) {
        self.token = Some(response.access_token);
        // Refresh responses usually omit the refresh token; keep the old one
        if response.refresh_token.is_some() {
            self.refresh_token = response.refresh_token;
        }
        self.expiry = response
            .expires_in
            .map(|secs| now + Duration::seconds(secs));
        if let Some(scope) = response.scope {
            let granted: Vec<String> = scope.split_whitespace().map(str::to_string).collect();
            if !granted.is_empty() {
                self.scopes = granted;
            }
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now >= expiry - refresh_threshold(),
            None => false,
        }
    }

    /// Holds an access token that is not (about to be) expired
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.token.is_some() && !self.is_expired_at(now)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn has_scopes(&self, required: &[String]) -> bool {
        scopes_satisfied(&self.scopes, required)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    pub fn access_token(&self) -> CalResult<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| auth_error("No access token available"))
    }
}

/// Successful reply from the token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

/// Error reply from the token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Outcome of a token endpoint call that reached the server
#[derive(Debug)]
pub enum TokenReply {
    Granted(TokenResponse),
    Rejected { status: u16, error: TokenError },
}

/// POST a form to a token endpoint
pub async fn request_token(
    client: &Client,
    token_uri: &str,
    params: &[(&str, String)],
) -> CalResult<TokenReply> {
    let response = client
        .post(token_uri)
        .form(params)
        .send()
        .await
        .map_err(|e| auth_error(&format!("Token request failed: {}", e)))?;

    let status = response.status();
    if status.is_success() {
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| auth_error(&format!("Failed to parse token response: {}", e)))?;
        return Ok(TokenReply::Granted(token));
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Could not read error response".to_string());
    let error = serde_json::from_str::<TokenError>(&body).unwrap_or(TokenError {
        error: format!("http_{}", status.as_u16()),
        error_description: Some(body),
    });

    Ok(TokenReply::Rejected {
        status: status.as_u16(),
        error,
    })
}

/// Reads and writes the persisted credential file
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored credential. `Ok(None)` when no file exists.
    pub fn load(&self) -> CalResult<Option<Credential>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let credential = serde_json::from_str(&content)?;
        Ok(Some(credential))
    }

    /// Overwrite the file with the given credential
    pub fn save(&self, credential: &Credential) -> CalResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(credential)?;
        fs::write(&self.path, json)?;
        debug!("Credential saved to {}", self.path.display());
        Ok(())
    }
}

/// Obtains, refreshes and persists the credential
#[derive(Debug, Clone)]
pub struct TokenManager {
    store: TokenStore,
    credentials_path: PathBuf,
    scopes: Vec<String>,
    client: Client,
}

impl TokenManager {
    pub fn new(
        token_path: impl Into<PathBuf>,
        credentials_path: impl Into<PathBuf>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            store: TokenStore::new(token_path),
            credentials_path: credentials_path.into(),
            scopes,
            client: Client::new(),
        }
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Get a valid credential: stored, refreshed, or from the interactive flow
    pub async fn acquire(&self, flow: &dyn AuthorizationFlow) -> CalResult<Credential> {
        match self.store.load() {
            Ok(Some(credential)) => {
                if !credential.has_scopes(&self.scopes) {
                    warn!(
                        "Stored credential lacks required scopes (has {:?}, needs {:?})",
                        credential.scopes, self.scopes
                    );
                } else if credential.is_valid() {
                    debug!("Using stored credential from {}", self.store.path().display());
                    return Ok(credential);
                } else if credential.can_refresh() {
                    info!("Stored credential expired, refreshing");
                    let refreshed = self.refresh(&credential).await?;
                    self.store.save(&refreshed)?;
                    return Ok(refreshed);
                } else {
                    warn!("Stored credential expired and has no refresh token");
                }
            }
            Ok(None) => {
                info!("No stored credential at {}", self.store.path().display());
            }
            Err(e) => {
                warn!(
                    "Ignoring unreadable credential file {}: {}",
                    self.store.path().display(),
                    e
                );
            }
        }

        self.authorize(flow).await
    }

    /// Run the interactive flow unconditionally and persist the result
    pub async fn authorize(&self, flow: &dyn AuthorizationFlow) -> CalResult<Credential> {
        let secrets = ClientSecrets::load(&self.credentials_path)?;
        info!("Starting {} authorization", flow.name());
        let credential = flow.authorize(&secrets, &self.scopes).await?;
        self.store.save(&credential)?;
        info!("Authorization complete, credential saved to {}", self.store.path().display());
        Ok(credential)
    }

    /// Refresh in place if the credential expired, persisting the new state
    pub async fn ensure_fresh(&self, credential: &mut Credential) -> CalResult<()> {
        if credential.is_valid() {
            return Ok(());
        }
        if !credential.can_refresh() {
            return Err(auth_error("Credential expired and has no refresh token"));
        }
        *credential = self.refresh(credential).await?;
        self.store.save(credential)?;
        Ok(())
    }

    /// Refresh an expired credential
    pub async fn refresh(&self, credential: &Credential) -> CalResult<Credential> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or_else(|| auth_error("No refresh token in credential"))?;

        let params = [
            ("client_id", credential.client_id.clone()),
            ("client_secret", credential.client_secret.clone()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token".to_string()),
        ];

        match request_token(&self.client, &credential.token_uri, &params).await? {
            TokenReply::Granted(response) => {
                let mut refreshed = credential.clone();
                refreshed.apply(response, Utc::now());
                Ok(refreshed)
            }
            TokenReply::Rejected { status, error } => Err(auth_error(&format!(
                "Failed to refresh token: HTTP {} - {}",
                status, error
            ))),
        }
    }
}
