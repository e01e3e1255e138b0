//! OAuth 2.0 client-credentials token exchange for the Domo API.

use reqwest::Client;
use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::error::AppError;

/// OAuth scope requested for stream uploads.
const OAUTH_SCOPE: &str = "data";

/// Response from the Domo token endpoint.
///
/// `domain` and `role` are informational only and logged at login.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthData {
    /// Bearer token used on every subsequent API call.
    pub access_token: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Exchanges client credentials for an access token.
///
/// # Errors
///
/// - `AppError::ConnectionFailed` - network error reaching the token endpoint
/// - `AppError::OAuth` - non-2xx response or unparseable token body
pub async fn fetch_access_token(
    http: &Client,
    base_url: &Url,
    client_id: &str,
    client_secret: &str,
) -> Result<AuthData, AppError> {
    let url = base_url
        .join(&format!(
            "/oauth/token?grant_type=client_credentials&scope={}",
            OAUTH_SCOPE
        ))
        .map_err(|e| AppError::Internal(format!("Failed to build token URL: {}", e)))?;

    let response = http
        .get(url)
        .basic_auth(client_id, Some(client_secret))
        .send()
        .await
        .map_err(|e| AppError::ConnectionFailed(format!("Token request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("Unable to read error body"));
        return Err(AppError::OAuth(format!(
            "HTTP {}: {}",
            status.as_u16(),
            body
        )));
    }

    let auth: AuthData = response
        .json()
        .await
        .map_err(|e| AppError::OAuth(format!("Failed to parse token response: {}", e)))?;

    info!(
        "Logged into {} as {}",
        auth.domain.as_deref().unwrap_or("domo"),
        auth.role.as_deref().unwrap_or("unknown")
    );

    Ok(auth)
}
