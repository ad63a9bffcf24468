//! S3 Credentials Module
//!
//! Static access-key/secret-key credentials for R2, taken from an explicit
//! [`R2Config`] rather than the ambient environment.
//!
//! # Example
//!
//! ```
//! use r2_uplink::s3::Credentials;
//!
//! let creds = Credentials::new(" AKIAEXAMPLEKEY1234 ", "secret");
//! assert_eq!(creds.access_key_id(), "AKIAEXAMPLEKEY1234");
//! assert_eq!(creds.masked_access_key(), "AKIAEXAM...1234");
//! ```

use crate::config::{R2Config, ENV_ACCESS_KEY_ID, ENV_SECRET_ACCESS_KEY};
use thiserror::Error;

/// Credential loading errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

/// Credentials for S3 authentication
///
/// Values are trimmed on construction; stray whitespace from copy-pasted
/// tokens is the most common cause of signature mismatches.
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl Credentials {
    /// Create new credentials
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into().trim().to_string(),
            secret_access_key: secret_access_key.into().trim().to_string(),
        }
    }

    /// Load credentials from an [`R2Config`]
    pub fn from_config(config: &R2Config) -> Result<Self, CredentialsError> {
        let creds = Self::new(&config.access_key_id, &config.secret_access_key);

        if creds.access_key_id.is_empty() {
            return Err(CredentialsError::MissingCredentials(format!(
                "{} not set",
                ENV_ACCESS_KEY_ID
            )));
        }
        if creds.secret_access_key.is_empty() {
            return Err(CredentialsError::MissingCredentials(format!(
                "{} not set",
                ENV_SECRET_ACCESS_KEY
            )));
        }

        Ok(creds)
    }

    /// Get the access key ID
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Get the secret access key
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// Access key with the middle elided, safe for printing
    pub fn masked_access_key(&self) -> String {
        let key = &self.access_key_id;
        if key.len() <= 12 || !key.is_ascii() {
            return "****".to_string();
        }
        format!("{}...{}", &key[..8], &key[key.len() - 4..])
    }

    /// Length of the secret, printed instead of the secret itself
    pub fn secret_len(&self) -> usize {
        self.secret_access_key.chars().count()
    }

    /// Convert into the SDK credential type
    pub(crate) fn to_sdk(&self) -> aws_credential_types::Credentials {
        aws_credential_types::Credentials::new(
            self.access_key_id.clone(),
            self.secret_access_key.clone(),
            None,
            None,
            "r2-uplink-static",
        )
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.masked_access_key())
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r2_config(access: &str, secret: &str) -> R2Config {
        R2Config {
            account_id: "acct".into(),
            access_key_id: access.into(),
            secret_access_key: secret.into(),
            endpoint: None,
        }
    }

    #[test]
    fn test_credentials_are_trimmed() {
        let creds = Credentials::new(" access\n", "\tsecret ");
        assert_eq!(creds.access_key_id(), "access");
        assert_eq!(creds.secret_access_key(), "secret");
    }

    #[test]
    fn test_from_config_missing_access_key() {
        let result = Credentials::from_config(&r2_config("  ", "secret"));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_config_missing_secret_key() {
        let result = Credentials::from_config(&r2_config("access", ""));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_config_success() {
        let creds = Credentials::from_config(&r2_config("config-access", "config-secret")).unwrap();
        assert_eq!(creds.access_key_id(), "config-access");
        assert_eq!(creds.secret_access_key(), "config-secret");
    }

    #[test]
    fn test_masking() {
        let creds = Credentials::new("0123456789abcdef", "s3cr3t");
        assert_eq!(creds.masked_access_key(), "01234567...cdef");
        assert_eq!(creds.secret_len(), 6);

        let short = Credentials::new("short", "s");
        assert_eq!(short.masked_access_key(), "****");
    }

    #[test]
    fn test_debug_never_prints_secret() {
        let creds = Credentials::new("0123456789abcdef", "very-secret-value");
        let output = format!("{:?}", creds);
        assert!(!output.contains("very-secret-value"));
        assert!(!output.contains("0123456789abcdef"));
    }
}
