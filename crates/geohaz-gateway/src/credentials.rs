//! Access token loading.
//!
//! Token acquisition (OAuth, service-account exchange) happens outside this
//! process. The token is taken from an environment variable, or from a file that
//! holds either the raw token or a JSON object with an `access_token` field.

use crate::{AccessToken, GatewayError, Result};
use std::path::Path;
use tracing::debug;

/// Environment variable consulted before the token file.
pub const TOKEN_ENV_VAR: &str = "GEOHAZ_ACCESS_TOKEN";

/// Parse the contents of a token file.
pub fn parse_token_file(contents: &str) -> Result<AccessToken> {
    let trimmed = contents.trim();
    let token = if trimmed.starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(trimmed)
            .map_err(|e| GatewayError::Config(format!("token file is not valid JSON: {}", e)))?;
        match value.get("access_token").and_then(|v| v.as_str()) {
            Some(token) => AccessToken::new(token),
            None if value.get("private_key").is_some() => {
                return Err(GatewayError::Config(
                    "token file holds a service-account key; exchange it for an access token first"
                        .to_string(),
                ))
            }
            None => {
                return Err(GatewayError::Config(
                    "token file has no 'access_token' field".to_string(),
                ))
            }
        }
    } else {
        AccessToken::new(trimmed)
    };

    if token.is_empty() {
        return Err(GatewayError::Config("access token is empty".to_string()));
    }
    Ok(token)
}

/// Resolve the access token from `env_value` (normally `$GEOHAZ_ACCESS_TOKEN`) or `path`.
pub fn resolve_token(env_value: Option<String>, path: &Path) -> Result<AccessToken> {
    if let Some(token) = env_value.map(AccessToken::new).filter(|t| !t.is_empty()) {
        debug!("using access token from {}", TOKEN_ENV_VAR);
        return Ok(token);
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        GatewayError::Config(format!("cannot read token file {}: {}", path.display(), e))
    })?;
    debug!(path = %path.display(), "using access token from file");
    parse_token_file(&contents)
}

/// Load the access token from the environment or `path`.
pub fn load_token(path: &Path) -> Result<AccessToken> {
    resolve_token(std::env::var(TOKEN_ENV_VAR).ok(), path)
}
