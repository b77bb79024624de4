use crate::error::{config_error, CalResult};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_DEVICE_AUTH_URI: &str = "https://oauth2.googleapis.com/device/code";

/// OAuth client registration as downloaded from the Google Cloud console
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Not part of Google's file; set for tests and non-Google providers
    #[serde(default = "default_device_auth_uri")]
    pub device_auth_uri: String,
}

/// Top-level layout: the registration sits under `installed` or `web`
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

fn default_device_auth_uri() -> String {
    GOOGLE_DEVICE_AUTH_URI.to_string()
}

impl ClientSecrets {
    /// Read and parse a client secrets file
    pub fn load(path: &Path) -> CalResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            config_error(&format!(
                "Failed to read client secrets {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> CalResult<Self> {
        let file: ClientSecretsFile = serde_json::from_str(content)
            .map_err(|e| config_error(&format!("Malformed client secrets: {}", e)))?;

        file.installed
            .or(file.web)
            .ok_or_else(|| config_error("Client secrets contain neither 'installed' nor 'web'"))
    }
}
