//! Per-vendor configuration.
//!
//! Every field is optional so a table can override a single selector of a
//! built-in vendor. Custom vendors must supply the URLs and the listing,
//! link and download selectors.

use serde::{Deserialize, Serialize};

use super::default_true;

/// Vendor overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_list_url: Option<String>,

    /// URL fragment that proves the session is authenticated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticated_url: Option<String>,

    /// Additional URL fragments that also count as "already there".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub already_there: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_timeout_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_timeout_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_limit: Option<usize>,

    /// `comma`, `dot` or `auto`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_separator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// chrono format strings tried in order when parsing issue dates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub date_formats: Vec<String>,

    #[serde(default)]
    pub selectors: SelectorConfig,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            display_name: None,
            login_url: None,
            invoice_list_url: None,
            authenticated_url: None,
            already_there: Vec::new(),
            interaction_required: None,
            auth_timeout_seconds: None,
            download_timeout_seconds: None,
            default_limit: None,
            decimal_separator: None,
            currency: None,
            date_formats: Vec::new(),
            selectors: SelectorConfig::default(),
        }
    }
}

/// CSS selector overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorConfig {
    pub username: Option<String>,
    pub continue_button: Option<String>,
    pub password: Option<String>,
    pub submit: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captcha: Vec<String>,
    pub totp_input: Option<String>,
    pub totp_submit: Option<String>,
    pub listing_row: Option<String>,
    pub invoice_link: Option<String>,
    pub next_page: Option<String>,
    pub date_filter: Option<String>,
    /// Option value template for the date filter; `{year}` is substituted.
    pub date_filter_value: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<String>,
    pub invoice_amount: Option<String>,
    pub download_button: Option<String>,
}
