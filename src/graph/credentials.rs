//! Drive Credentials Module
//!
//! Resolves the bearer token used on the caller's authenticated channel.
//! Acquiring tokens (OAuth flows, refresh) is left to the caller; this module
//! only locates an already-issued token.
//!
//! # Sources
//!
//! - `drive.access_token` in the configuration file
//! - The `DRIVE_ACCESS_TOKEN` environment variable
//!
//! # Example
//!
//! ```
//! use drive_uploadr::graph::AccessToken;
//!
//! let token = AccessToken::new("eyJ0eXAi...");
//! assert_eq!(token.secret(), "eyJ0eXAi...");
//! assert_eq!(format!("{:?}", token), "AccessToken(***)");
//! ```

use crate::config::DriveConfig;
use thiserror::Error;

/// Environment variable consulted when the config carries no token
pub const ACCESS_TOKEN_ENV: &str = "DRIVE_ACCESS_TOKEN";

/// Credential loading errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// Bearer token for the authenticated channel
///
/// `Debug` never prints the secret.
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

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Factory methods for locating a token
pub struct CredentialsProvider;

impl CredentialsProvider {
    /// Load the token from `DRIVE_ACCESS_TOKEN`
    pub fn from_env() -> Result<AccessToken, CredentialsError> {
        let token = std::env::var(ACCESS_TOKEN_ENV).map_err(|_| {
            CredentialsError::MissingCredentials(format!("{} not set", ACCESS_TOKEN_ENV))
        })?;
        Self::validate(token)
    }

    /// Load the token from config, falling back to the environment
    pub fn from_config(config: &DriveConfig) -> Result<AccessToken, CredentialsError> {
        match &config.access_token {
            Some(token) => Self::validate(token.clone()),
            None => Self::from_env(),
        }
    }

    fn validate(token: String) -> Result<AccessToken, CredentialsError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CredentialsError::InvalidCredentials(
                "access token is empty".into(),
            ));
        }
        // An unexpanded ${VAR} placeholder means the variable was never set.
        if token.starts_with("${") {
            return Err(CredentialsError::MissingCredentials(format!(
                "access token placeholder {} was not expanded",
                token
            )));
        }
        Ok(AccessToken::new(token))
    }
}
