//! Vendor descriptors: built-in defaults merged with configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use harvester_config::{SelectorConfig, VendorConfig};
use serde::Serialize;
use url::Url;

use crate::error::VendorError;
use crate::extract::DecimalSeparator;

const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_LIMIT: usize = 10;
const DEFAULT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d.%m.%Y"];

/// CSS selectors driving login, listing and detail extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorSelectors {
    pub username: Option<String>,
    pub continue_button: Option<String>,
    pub password: Option<String>,
    pub submit: Option<String>,
    /// Any match means a CAPTCHA is shown.
    pub captcha: Vec<String>,
    pub totp_input: Option<String>,
    pub totp_submit: Option<String>,
    pub listing_row: String,
    pub invoice_link: String,
    pub next_page: Option<String>,
    pub date_filter: Option<String>,
    /// `{year}` is replaced with the year of the requested start date.
    pub date_filter_value: String,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<String>,
    pub invoice_amount: Option<String>,
    pub download_button: String,
}

/// Immutable description of one vendor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorDescriptor {
    pub id: String,
    pub display_name: String,
    pub login_url: String,
    pub invoice_list_url: String,
    /// URL or path fragment that proves an authenticated session.
    pub authenticated_url: String,
    /// Further fragments that also count as authenticated.
    pub already_there: Vec<String>,
    /// Login always needs a human (e.g. push approval).
    pub interaction_required: bool,
    #[serde(serialize_with = "serialize_secs")]
    pub auth_timeout: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub download_timeout: Duration,
    pub default_limit: usize,
    pub decimal_separator: DecimalSeparator,
    pub currency: Option<String>,
    pub date_formats: Vec<String>,
    pub selectors: VendorSelectors,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

/// Ids of the vendors shipped with built-in defaults.
pub const BUILTIN_VENDORS: &[&str] = &["amazon"];

fn some(s: &str) -> Option<String> {
    Some(s.to_string())
}

impl VendorDescriptor {
    /// Amazon (amazon.com order history).
    pub fn amazon() -> Self {
        Self {
            id: "amazon".to_string(),
            display_name: "Amazon".to_string(),
            login_url: "https://www.amazon.com/ap/signin".to_string(),
            invoice_list_url: "https://www.amazon.com/gp/css/order-history".to_string(),
            authenticated_url: "/gp/css/order-history".to_string(),
            already_there: vec!["/your-orders/orders".to_string()],
            interaction_required: false,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            default_limit: DEFAULT_LIMIT,
            decimal_separator: DecimalSeparator::Dot,
            currency: some("USD"),
            date_formats: ["%B %d, %Y", "%b %d, %Y", "%Y-%m-%d"]
                .iter()
                .map(|f| f.to_string())
                .collect(),
            selectors: VendorSelectors {
                username: some("#ap_email"),
                continue_button: some("#continue"),
                password: some("#ap_password"),
                submit: some("#signInSubmit"),
                captcha: vec![
                    "#auth-captcha-image".to_string(),
                    "#captchacharacters".to_string(),
                    "iframe[src*='arkoselabs']".to_string(),
                ],
                totp_input: some("#auth-mfa-otpcode"),
                totp_submit: some("#auth-signin-button"),
                listing_row: ".order-card".to_string(),
                invoice_link: "a[href*='invoice']".to_string(),
                next_page: some(".a-pagination .a-last a"),
                date_filter: some("#time-filter"),
                date_filter_value: "year-{year}".to_string(),
                invoice_number: some("[data-test-id='order-id']"),
                invoice_date: some("[data-test-id='order-date']"),
                invoice_amount: some("[data-test-id='grand-total']"),
                download_button: "a[href$='.pdf']".to_string(),
            },
        }
    }

    /// Built-in descriptor for `id`.
    pub fn builtin(id: &str) -> Option<Self> {
        match id {
            "amazon" => Some(Self::amazon()),
            _ => None,
        }
    }

    /// Build a descriptor from configuration, layered over the built-in
    /// defaults when `id` names a built-in vendor.
    pub fn from_config(id: &str, config: &VendorConfig) -> Result<Self, VendorError> {
        match Self::builtin(id) {
            Some(base) => Ok(base.merged(config)),
            None => Self::custom(id, config),
        }
    }

    /// Every enabled vendor: built-ins plus configured custom vendors, sorted by id.
    pub fn load_all(configs: &BTreeMap<String, VendorConfig>) -> Result<Vec<Self>, VendorError> {
        let mut descriptors = Vec::new();

        for id in BUILTIN_VENDORS {
            if !configs.contains_key(*id) {
                descriptors.extend(Self::builtin(id));
            }
        }
        for (id, config) in configs {
            if config.enabled {
                descriptors.push(Self::from_config(id, config)?);
            }
        }

        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(descriptors)
    }

    /// Whether `url` shows an authenticated page.
    pub fn is_authenticated_url(&self, url: &str) -> bool {
        std::iter::once(&self.authenticated_url)
            .chain(self.already_there.iter())
            .any(|pattern| url_matches(url, pattern))
    }

    fn merged(mut self, config: &VendorConfig) -> Self {
        if let Some(v) = &config.display_name {
            self.display_name = v.clone();
        }
        if let Some(v) = &config.login_url {
            self.login_url = v.clone();
        }
        if let Some(v) = &config.invoice_list_url {
            self.invoice_list_url = v.clone();
        }
        if let Some(v) = &config.authenticated_url {
            self.authenticated_url = v.clone();
        }
        if !config.already_there.is_empty() {
            self.already_there = config.already_there.clone();
        }
        if let Some(v) = config.interaction_required {
            self.interaction_required = v;
        }
        if let Some(v) = config.auth_timeout_seconds {
            self.auth_timeout = Duration::from_secs(v);
        }
        if let Some(v) = config.download_timeout_seconds {
            self.download_timeout = Duration::from_secs(v);
        }
        if let Some(v) = config.default_limit {
            self.default_limit = v;
        }
        if let Some(Ok(sep)) = config
            .decimal_separator
            .as_deref()
            .map(str::parse::<DecimalSeparator>)
        {
            self.decimal_separator = sep;
        }
        if config.currency.is_some() {
            self.currency = config.currency.clone();
        }
        if !config.date_formats.is_empty() {
            self.date_formats = config.date_formats.clone();
        }
        self.selectors.apply(&config.selectors);
        self
    }

    fn custom(id: &str, config: &VendorConfig) -> Result<Self, VendorError> {
        let missing = |field: &str| VendorError::InvalidDescriptor {
            vendor: id.to_string(),
            message: format!("{} is required for a custom vendor", field),
        };
        let required = |value: &Option<String>, field: &str| {
            value
                .as_ref()
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or_else(|| missing(field))
        };

        let decimal_separator = match &config.decimal_separator {
            Some(s) => s.parse().map_err(|e: String| VendorError::InvalidDescriptor {
                vendor: id.to_string(),
                message: e,
            })?,
            None => DecimalSeparator::Auto,
        };

        let s = &config.selectors;
        let selectors = VendorSelectors {
            username: s.username.clone(),
            continue_button: s.continue_button.clone(),
            password: s.password.clone(),
            submit: s.submit.clone(),
            captcha: s.captcha.clone(),
            totp_input: s.totp_input.clone(),
            totp_submit: s.totp_submit.clone(),
            listing_row: required(&s.listing_row, "selectors.listing_row")?,
            invoice_link: required(&s.invoice_link, "selectors.invoice_link")?,
            next_page: s.next_page.clone(),
            date_filter: s.date_filter.clone(),
            date_filter_value: s
                .date_filter_value
                .clone()
                .unwrap_or_else(|| "{year}".to_string()),
            invoice_number: s.invoice_number.clone(),
            invoice_date: s.invoice_date.clone(),
            invoice_amount: s.invoice_amount.clone(),
            download_button: required(&s.download_button, "selectors.download_button")?,
        };

        Ok(Self {
            id: id.to_string(),
            display_name: config.display_name.clone().unwrap_or_else(|| id.to_string()),
            login_url: required(&config.login_url, "login_url")?,
            invoice_list_url: required(&config.invoice_list_url, "invoice_list_url")?,
            authenticated_url: required(&config.authenticated_url, "authenticated_url")?,
            already_there: config.already_there.clone(),
            interaction_required: config.interaction_required.unwrap_or(false),
            auth_timeout: config
                .auth_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_AUTH_TIMEOUT),
            download_timeout: config
                .download_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT),
            default_limit: config.default_limit.unwrap_or(DEFAULT_LIMIT),
            decimal_separator,
            currency: config.currency.clone(),
            date_formats: if config.date_formats.is_empty() {
                DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect()
            } else {
                config.date_formats.clone()
            },
            selectors,
        })
    }
}

impl VendorSelectors {
    fn apply(&mut self, o: &SelectorConfig) {
        fn set(target: &mut Option<String>, value: &Option<String>) {
            if value.is_some() {
                target.clone_from(value);
            }
        }
        fn set_required(target: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                target.clone_from(v);
            }
        }

        set(&mut self.username, &o.username);
        set(&mut self.continue_button, &o.continue_button);
        set(&mut self.password, &o.password);
        set(&mut self.submit, &o.submit);
        if !o.captcha.is_empty() {
            self.captcha = o.captcha.clone();
        }
        set(&mut self.totp_input, &o.totp_input);
        set(&mut self.totp_submit, &o.totp_submit);
        set_required(&mut self.listing_row, &o.listing_row);
        set_required(&mut self.invoice_link, &o.invoice_link);
        set(&mut self.next_page, &o.next_page);
        set(&mut self.date_filter, &o.date_filter);
        set_required(&mut self.date_filter_value, &o.date_filter_value);
        set(&mut self.invoice_number, &o.invoice_number);
        set(&mut self.invoice_date, &o.invoice_date);
        set(&mut self.invoice_amount, &o.invoice_amount);
        set_required(&mut self.download_button, &o.download_button);
    }
}

/// Whether `url` is the page `pattern` names.
///
/// An absolute pattern must match scheme, host and port, and prefix the
/// path. Any other pattern is looked up in the path only, so query strings
/// such as a sign-in `return_to` never count.
pub fn url_matches(url: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    let Ok(parsed) = Url::parse(url) else {
        return url == pattern;
    };
    match Url::parse(pattern) {
        Ok(expected) => {
            parsed.origin() == expected.origin() && parsed.path().starts_with(expected.path())
        }
        Err(_) => parsed.path().contains(pattern),
    }
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
