use reqwest::{Client, StatusCode};
use std::fmt;

use super::error::{ApiError, ApiResult};
use super::types::{ErrorBody, TokenRequest, TokenResponse};

const ACCOUNTS_SCOPES: &[&str] = &["accounts:read", "accounts:execute"];
const BANKS_SCOPES: &[&str] = &["banks:read", "banks:write"];
const CUSTOMERS_SCOPES: &[&str] = &["customers:read", "customers:write", "customers:execute"];
const PRICES_SCOPES: &[&str] = &["prices:read"];
const QUOTES_SCOPES: &[&str] = &["quotes:execute"];
const TRADES_SCOPES: &[&str] = &["trades:read", "trades:execute"];

/// Space separated scope list requested with every token.
pub fn scopes() -> String {
    [
        ACCOUNTS_SCOPES,
        BANKS_SCOPES,
        CUSTOMERS_SCOPES,
        PRICES_SCOPES,
        QUOTES_SCOPES,
        TRADES_SCOPES,
    ]
    .concat()
    .join(" ")
}

#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Bearer token returned by the identity service.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Exchanges client credentials for an access token (OAuth2 client-credentials grant).
pub async fn request_token(
    client: &Client,
    identity_url: &str,
    credentials: &Credentials,
) -> ApiResult<AccessToken> {
    let body = TokenRequest {
        grant_type: "client_credentials",
        client_id: &credentials.client_id,
        client_secret: &credentials.client_secret,
        scope: scopes(),
    };

    let response = client
        .post(format!("{}/oauth/token", identity_url))
        .json(&body)
        .send()
        .await?;
    let status = response.status();

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!("Token request rejected: {} - {}", status, error_text);
        let message = ErrorBody::describe(&error_text);
        // The identity service answers bad credentials with 400 invalid_client
        return Err(match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ApiError::Unauthorized { status, message }
            }
            _ => ApiError::Http { status, message },
        });
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| ApiError::decode(format!("token response: {}", e)))?;

    tracing::debug!(
        "Token issued (type: {}, expires in: {}s)",
        token.token_type.as_deref().unwrap_or("bearer"),
        token.expires_in.unwrap_or_default()
    );

    token
        .access_token
        .filter(|t| !t.is_empty())
        .map(AccessToken::new)
        .ok_or(ApiError::NoAccessToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_cover_flow_operations() {
        let scopes = scopes();
        for needed in ["customers:write", "accounts:execute", "quotes:execute", "trades:execute"] {
            assert!(scopes.split(' ').any(|s| s == needed), "missing {}", needed);
        }
    }

    #[test]
    fn test_secrets_are_not_printed() {
        let creds = Credentials::new("client", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));

        let token = AccessToken::new("abc.def");
        assert!(!format!("{:?}", token).contains("abc.def"));
        assert_eq!(token.secret(), "abc.def");
    }
}
