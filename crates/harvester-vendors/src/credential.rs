//! Vendor login credentials.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use harvester_otp::{decode_secret, OtpError, TotpGenerator};
use serde::Deserialize;

/// Login material for one vendor.
///
/// Handed to a job as a read-only copy; never persisted by the automation
/// core. `Debug` redacts the password, the TOTP secret and extra fields.
#[derive(Clone, Deserialize)]
pub struct Credential {
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Vendor-specific fields such as an account or customer number.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    /// Defaults to whether a TOTP secret is present.
    #[serde(default)]
    pub totp_enabled: Option<bool>,
    #[serde(default)]
    pub totp_secret: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            extra: BTreeMap::new(),
            totp_enabled: None,
            totp_secret: None,
            updated_at: None,
        }
    }

    pub fn with_totp(mut self, secret: impl Into<String>) -> Self {
        self.totp_secret = Some(secret.into());
        self.totp_enabled = Some(true);
        self
    }

    /// Whether a second factor can be answered automatically.
    pub fn has_totp(&self) -> bool {
        let secret_present = self
            .totp_secret
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        self.totp_enabled.unwrap_or(secret_present) && secret_present
    }

    /// Current TOTP code, `Ok(None)` when TOTP is not configured.
    pub fn current_totp(&self) -> Result<Option<String>, OtpError> {
        if !self.has_totp() {
            return Ok(None);
        }
        let secret = decode_secret(self.totp_secret.as_deref().unwrap_or_default())?;
        TotpGenerator::default().now(&secret).map(Some)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("extra", &format_args!("<{} redacted>", self.extra.len()))
            .field("totp_enabled", &self.has_totp())
            .field("updated_at", &self.updated_at)
            .finish()
    }
}
