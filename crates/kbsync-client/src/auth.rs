//! Authentication: password-grant login and the persisted bearer token.

use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Email and password for the password grant.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    error: Option<String>,
}

/// `POST {auth_url}/auth/v1/token?grant_type=password`
pub fn token_url(auth_url: &str) -> ClientResult<Url> {
    let raw = format!(
        "{}/auth/v1/token?grant_type=password",
        auth_url.trim().trim_end_matches('/')
    );
    Url::parse(&raw).map_err(|e| ClientError::invalid_url(auth_url, e.to_string()))
}

/// Human-readable reason extracted from an auth error response.
pub fn auth_error_message(body: &str) -> String {
    let parsed: AuthErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.error)
        .unwrap_or_else(|| "Authentication failed".to_string())
}

/// Exchange credentials for an access token.
///
/// # Errors
///
/// Returns [`ClientError::AuthenticationFailed`] when the service rejects the
/// credentials or cannot be reached.
pub async fn fetch_access_token(
    auth_url: &str,
    anon_key: &str,
    credentials: &Credentials,
) -> ClientResult<String> {
    let url = token_url(auth_url)?;
    debug!("Requesting access token for {}", credentials.email);

    let res = reqwest::Client::new()
        .post(url)
        .header("apikey", anon_key)
        .header("content-type", "application/json")
        .json(&serde_json::json!({
            "email": credentials.email,
            "password": credentials.password,
            "gotrue_meta_security": {},
        }))
        .send()
        .await
        .map_err(|e| ClientError::AuthenticationFailed(format!("auth service unreachable: {}", e)))?;

    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        debug!("Token request rejected with HTTP {}", status);
        return Err(ClientError::AuthenticationFailed(auth_error_message(&body)));
    }

    let token: TokenResponse = res
        .json()
        .await
        .map_err(|e| ClientError::AuthenticationFailed(format!("unexpected auth response: {}", e)))?;
    Ok(token.access_token)
}

// ============================================================================
// TokenStore
// ============================================================================

/// The bearer token persisted between runs.
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

    /// The stored token, or `None` when absent or blank.
    pub fn load(&self) -> ClientResult<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| ClientError::token_file(&self.path, e.to_string()))?;
        let token = raw.trim();
        Ok((!token.is_empty()).then(|| token.to_string()))
    }

    /// Persist `token`, readable by the current user only on unix.
    pub fn save(&self, token: &str) -> ClientResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ClientError::token_file(parent, e.to_string()))?;
        }
        fs::write(&self.path, token.trim())
            .map_err(|e| ClientError::token_file(&self.path, e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(|e| ClientError::token_file(&self.path, e.to_string()))?;
        }

        debug!("Saved token to {:?}", self.path);
        Ok(())
    }

    /// Remove the stored token. Returns false if there was none.
    pub fn clear(&self) -> ClientResult<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path).map_err(|e| ClientError::token_file(&self.path, e.to_string()))?;
        debug!("Removed token at {:?}", self.path);
        Ok(true)
    }
}
