use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::secrets::ClientSecrets;
use super::token::{request_token, Credential, TokenReply};
use crate::config::{AuthFlowKind, Config};
use crate::error::{auth_error, CalResult, Error};

const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// An interactive way of obtaining a fresh credential
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Obtain a credential granting `scopes` for the registered client
    async fn authorize(&self, secrets: &ClientSecrets, scopes: &[String]) -> CalResult<Credential>;
}

/// Build the flow selected in configuration
pub fn flow_for(config: &Config, cancel: CancellationToken) -> Box<dyn AuthorizationFlow> {
    match config.auth_flow {
        AuthFlowKind::LocalServer => Box::new(LocalServerFlow::new(config.auth_timeout, cancel)),
        AuthFlowKind::DeviceCode => Box::new(DeviceCodeFlow::new(config.auth_timeout, cancel)),
    }
}

/// Browser consent with a loopback listener receiving the redirect
pub struct LocalServerFlow {
    client: Client,
    timeout: Duration,
    cancel: CancellationToken,
    open_browser: bool,
}

impl LocalServerFlow {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            client: Client::new(),
            timeout,
            cancel,
            open_browser: true,
        }
    }

    /// Only print the consent URL
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    async fn wait_for_code(&self, server: Arc<tiny_http::Server>, state: &str) -> CalResult<String> {
        let listener = Arc::clone(&server);
        let expected_state = state.to_string();
        let timeout = self.timeout;
        let wait = tokio::task::spawn_blocking(move || {
            receive_callback(&listener, &expected_state, timeout)
        });

        tokio::select! {
            joined = wait => joined
                .map_err(|e| auth_error(&format!("Callback listener failed: {}", e)))?,
            _ = self.cancel.cancelled() => {
                server.unblock();
                Err(Error::Cancelled)
            }
        }
    }
}

#[async_trait]
impl AuthorizationFlow for LocalServerFlow {
    fn name(&self) -> &'static str {
        "local server"
    }

    async fn authorize(&self, secrets: &ClientSecrets, scopes: &[String]) -> CalResult<Credential> {
        let server = tiny_http::Server::http("127.0.0.1:0")
            .map_err(|e| auth_error(&format!("Failed to start callback listener: {}", e)))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| auth_error("Callback listener has no TCP address"))?;
        let redirect_uri = format!("http://localhost:{}/", port);

        // Random state to tie the callback to this request
        let state = Uuid::new_v4().to_string();
        let auth_url = authorization_url(secrets, scopes, &redirect_uri, &state)?;

        println!("Please visit this URL to authorize this application: {}", auth_url);
        if self.open_browser {
            if let Err(e) = webbrowser::open(auth_url.as_str()) {
                warn!("Could not open browser: {}", e);
            }
        }
        info!("Waiting for authorization callback on port {}", port);

        let code = self.wait_for_code(Arc::new(server), &state).await?;

        let params = [
            ("client_id", secrets.client_id.clone()),
            ("client_secret", secrets.client_secret.clone()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code".to_string()),
        ];

        match request_token(&self.client, &secrets.token_uri, &params).await? {
            TokenReply::Granted(response) => {
                Ok(Credential::from_grant(response, secrets, scopes, Utc::now()))
            }
            TokenReply::Rejected { status, error } => Err(auth_error(&format!(
                "Failed to exchange authorization code: HTTP {} - {}",
                status, error
            ))),
        }
    }
}

/// Consent page URL for the loopback flow
pub fn authorization_url(
    secrets: &ClientSecrets,
    scopes: &[String],
    redirect_uri: &str,
    state: &str,
) -> CalResult<Url> {
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", scopes.join(" ").as_str()),
            ("state", state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| auth_error(&format!("Invalid authorization URI: {}", e)))
}

/// Extract the authorization code from a callback request path.
///
/// `Ok(None)` for requests that are not the redirect (e.g. `/favicon.ico`).
pub fn parse_callback(request_url: &str, expected_state: &str) -> CalResult<Option<String>> {
    let url = Url::parse("http://localhost")
        .and_then(|base| base.join(request_url))
        .map_err(|e| auth_error(&format!("Malformed callback URL: {}", e)))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => return Err(auth_error(&format!("Authorization denied: {}", value))),
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    let Some(code) = code else {
        return Ok(None);
    };
    if state.as_deref() != Some(expected_state) {
        return Err(auth_error("State mismatch in authorization callback"));
    }
    Ok(Some(code))
}

/// Block until the redirect arrives or the timeout passes
fn receive_callback(
    server: &tiny_http::Server,
    expected_state: &str,
    timeout: Duration,
) -> CalResult<String> {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::AuthTimeout(timeout.as_secs()));
        }

        let Some(request) = server.recv_timeout(remaining)? else {
            return Err(Error::AuthTimeout(timeout.as_secs()));
        };

        match parse_callback(request.url(), expected_state) {
            Ok(Some(code)) => {
                let response = tiny_http::Response::from_string(
                    "Authorization successful! You can close this window.",
                );
                if let Err(e) = request.respond(response) {
                    warn!("Failed to answer browser: {}", e);
                }
                return Ok(code);
            }
            Ok(None) => {
                debug!("Ignoring request to {}", request.url());
                let _ = request.respond(tiny_http::Response::empty(404));
            }
            Err(e) => {
                let response =
                    tiny_http::Response::from_string(format!("Authorization failed: {}", e))
                        .with_status_code(400);
                let _ = request.respond(response);
                return Err(e);
            }
        }
    }
}

/// Device authorization grant, for hosts without a browser
pub struct DeviceCodeFlow {
    client: Client,
    timeout: Duration,
    cancel: CancellationToken,
}

/// Reply of the device authorization endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    #[serde(alias = "verification_uri")]
    pub verification_url: String,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_interval() -> u64 {
    5
}

impl DeviceCodeFlow {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            client: Client::new(),
            timeout,
            cancel,
        }
    }

    async fn request_device_code(
        &self,
        secrets: &ClientSecrets,
        scopes: &[String],
    ) -> CalResult<DeviceAuthorization> {
        let response = self
            .client
            .post(&secrets.device_auth_uri)
            .form(&[
                ("client_id", secrets.client_id.clone()),
                ("scope", scopes.join(" ")),
            ])
            .send()
            .await
            .map_err(|e| auth_error(&format!("Device authorization request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(auth_error(&format!(
                "Device authorization failed: HTTP {} - {}",
                status, error_body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| auth_error(&format!("Failed to parse device authorization: {}", e)))
    }

    async fn poll(
        &self,
        secrets: &ClientSecrets,
        device: &DeviceAuthorization,
        scopes: &[String],
    ) -> CalResult<Credential> {
        let mut interval = Duration::from_secs(device.interval);
        let expires_at = Instant::now() + Duration::from_secs(device.expires_in);
        let params = [
            ("client_id", secrets.client_id.clone()),
            ("client_secret", secrets.client_secret.clone()),
            ("device_code", device.device_code.clone()),
            ("grant_type", DEVICE_GRANT_TYPE.to_string()),
        ];

        loop {
            tokio::time::sleep(interval).await;

            match request_token(&self.client, &secrets.token_uri, &params).await? {
                TokenReply::Granted(response) => {
                    return Ok(Credential::from_grant(response, secrets, scopes, Utc::now()));
                }
                TokenReply::Rejected { error, .. } => match error.error.as_str() {
                    "authorization_pending" => debug!("Authorization pending"),
                    "slow_down" => {
                        interval += SLOW_DOWN_STEP;
                        debug!("Slowing down polling to {:?}", interval);
                    }
                    "access_denied" => return Err(auth_error("Access denied by user")),
                    "expired_token" => return Err(auth_error("Device code expired")),
                    _ => return Err(auth_error(&format!("Device authorization failed: {}", error))),
                },
            }

            if Instant::now() >= expires_at {
                return Err(auth_error("Device code expired"));
            }
        }
    }
}

#[async_trait]
impl AuthorizationFlow for DeviceCodeFlow {
    fn name(&self) -> &'static str {
        "device code"
    }

    async fn authorize(&self, secrets: &ClientSecrets, scopes: &[String]) -> CalResult<Credential> {
        let device = self.request_device_code(secrets, scopes).await?;

        println!(
            "To authorize, visit {} and enter the code {}",
            device.verification_url, device.user_code
        );

        tokio::select! {
            result = tokio::time::timeout(self.timeout, self.poll(secrets, &device, scopes)) => {
                result.map_err(|_| Error::AuthTimeout(self.timeout.as_secs()))?
            }
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
        }
    }
}
