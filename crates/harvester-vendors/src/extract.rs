//! Listing scan and invoice detail extraction.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, Utc};
use harvester_browser::Page;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::descriptor::VendorDescriptor;
use crate::error::VendorError;

/// Upper bound on listing pages followed in one scan.
pub const MAX_LISTING_PAGES: usize = 50;

/// Currency code used when neither the vendor nor the text names one.
pub const UNKNOWN_CURRENCY: &str = "XXX";

/// Which character separates the fractional part of an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecimalSeparator {
    /// `1.234,56`
    Comma,
    /// `1,234.56`
    Dot,
    /// Right-most separator is decimal when followed by one or two digits.
    Auto,
}

impl FromStr for DecimalSeparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "comma" | "," => Ok(Self::Comma),
            "dot" | "." => Ok(Self::Dot),
            "auto" => Ok(Self::Auto),
            other => Err(format!(
                "unknown decimal separator '{}' (expected comma, dot or auto)",
                other
            )),
        }
    }
}

impl fmt::Display for DecimalSeparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Comma => "comma",
            Self::Dot => "dot",
            Self::Auto => "auto",
        })
    }
}

/// Parse a displayed amount. `None` when the text carries no digits.
pub fn parse_amount(text: &str, separator: DecimalSeparator) -> Option<f64> {
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let kept = kept.trim_matches(|c| c == '.' || c == ',');
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let decimal = match separator {
        DecimalSeparator::Comma => Some(','),
        DecimalSeparator::Dot => Some('.'),
        DecimalSeparator::Auto => auto_decimal(kept),
    };
    let decimal_at = decimal.and_then(|d| kept.rfind(d));

    let mut normalized = String::with_capacity(kept.len());
    for (i, c) in kept.char_indices() {
        if c.is_ascii_digit() {
            normalized.push(c);
        } else if Some(i) == decimal_at {
            normalized.push('.');
        }
    }
    normalized.parse().ok()
}

fn auto_decimal(kept: &str) -> Option<char> {
    let at = kept.rfind(['.', ','])?;
    let fraction = kept.len() - at - 1;
    if (1..=2).contains(&fraction) {
        kept[at..].chars().next()
    } else {
        None
    }
}

/// Find a date in `text` using the first matching chrono format.
///
/// The whole text is tried first, then every run of up to four words, so
/// labels like "Invoice date:" around the value do not matter.
pub fn parse_date(text: &str, formats: &[String]) -> Option<NaiveDate> {
    let trim = |s: &str| {
        s.trim_matches(|c: char| !c.is_alphanumeric())
            .to_string()
    };

    let whole = trim(text);
    if let Some(date) = try_formats(&whole, formats) {
        return Some(date);
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    for len in (1..=4).rev() {
        for window in words.windows(len) {
            let candidate = trim(&window.join(" "));
            if let Some(date) = try_formats(&candidate, formats) {
                return Some(date);
            }
        }
    }
    None
}

fn try_formats(text: &str, formats: &[String]) -> Option<NaiveDate> {
    formats
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
}

/// ISO code for the first currency code or symbol found in `text`.
pub fn detect_currency(text: &str) -> Option<&'static str> {
    const CODES: &[&str] = &[
        "USD", "EUR", "GBP", "CHF", "JPY", "CAD", "AUD", "SEK", "NOK", "DKK", "PLN", "CZK", "BRL",
        "INR",
    ];
    const SYMBOLS: &[(&str, &str)] = &[
        ("R$", "BRL"),
        ("CA$", "CAD"),
        ("C$", "CAD"),
        ("AU$", "AUD"),
        ("A$", "AUD"),
        ("US$", "USD"),
        ("€", "EUR"),
        ("£", "GBP"),
        ("¥", "JPY"),
        ("₹", "INR"),
        ("zł", "PLN"),
        ("Kč", "CZK"),
        ("$", "USD"),
    ];

    let upper = text.to_ascii_uppercase();
    for code in CODES {
        let boundary = |c: Option<char>| c.is_none_or(|c| !c.is_ascii_alphabetic());
        for (at, _) in upper.match_indices(code) {
            let before = upper[..at].chars().next_back();
            let after = upper[at + code.len()..].chars().next();
            if boundary(before) && boundary(after) {
                return Some(code);
            }
        }
    }

    SYMBOLS
        .iter()
        .find(|(symbol, _)| text.contains(symbol))
        .map(|(_, code)| *code)
}

/// The invoice or order number shown in `text`: the last token holding a
/// digit, with surrounding punctuation removed.
pub fn normalize_invoice_number(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| t.chars().any(|c| c.is_ascii_digit()))
        .next_back()
        .map(str::to_string)
}

/// Number assigned when the page shows none.
pub fn synthetic_invoice_number() -> String {
    format!("GEN-{}", Utc::now().timestamp_millis())
}

/// A listing row that links to an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceCandidate {
    /// Zero-based position across all scanned pages.
    pub position: usize,
    pub href: String,
    /// Row text, used as a fallback source for details.
    pub summary: String,
}

/// Outcome of [`scan`].
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub candidates: Vec<InvoiceCandidate>,
    /// Rows without an invoice link.
    pub skipped_rows: usize,
    pub pages: usize,
}

/// Walk the vendor's listing, following pagination, until `limit`
/// candidates are found or the listing ends.
///
/// The page must already show the invoice list.
pub async fn scan(
    page: &dyn Page,
    descriptor: &VendorDescriptor,
    limit: usize,
    from_date: Option<NaiveDate>,
) -> Result<ScanResult, VendorError> {
    let mut result = ScanResult::default();
    if limit == 0 {
        return Ok(result);
    }

    let selectors = &descriptor.selectors;
    if let (Some(filter), Some(date)) = (&selectors.date_filter, from_date) {
        let value = selectors
            .date_filter_value
            .replace("{year}", &date.year().to_string());
        if let Err(e) = page.select_option(filter, &value).await {
            warn!(vendor = %descriptor.id, filter = %value, "Date filter not applied: {}", e);
        }
    }

    let mut seen = HashSet::new();
    loop {
        result.pages += 1;
        let rows = page
            .rows(&selectors.listing_row, &selectors.invoice_link)
            .await?;
        debug!(vendor = %descriptor.id, page = result.pages, rows = rows.len(), "Scanning listing page");

        let mut progressed = false;
        for row in rows {
            let Some(href) = row.href.filter(|h| !h.is_empty()) else {
                result.skipped_rows += 1;
                continue;
            };
            if !seen.insert(href.clone()) {
                continue;
            }
            progressed = true;
            result.candidates.push(InvoiceCandidate {
                position: result.candidates.len(),
                href,
                summary: row.text,
            });
            if result.candidates.len() >= limit {
                return Ok(finish(descriptor, result));
            }
        }

        let Some(next) = &selectors.next_page else {
            break;
        };
        if !progressed || result.pages >= MAX_LISTING_PAGES || !page.exists(next).await? {
            break;
        }
        page.click(next).await?;
    }

    Ok(finish(descriptor, result))
}

fn finish(descriptor: &VendorDescriptor, result: ScanResult) -> ScanResult {
    info!(
        vendor = %descriptor.id,
        candidates = result.candidates.len(),
        skipped = result.skipped_rows,
        pages = result.pages,
        "Listing scan finished"
    );
    result
}

/// Metadata read from an invoice detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDetails {
    pub invoice_number: String,
    /// The number was generated, not read from the page.
    pub synthetic_number: bool,
    pub issue_date: NaiveDate,
    pub amount: f64,
    pub currency: String,
}

/// Read number, date, amount and currency from the open detail page,
/// falling back to the candidate's listing text and then to defaults.
pub async fn extract_details(
    page: &dyn Page,
    descriptor: &VendorDescriptor,
    candidate: &InvoiceCandidate,
) -> Result<InvoiceDetails, VendorError> {
    let selectors = &descriptor.selectors;

    let number_text = read(page, selectors.invoice_number.as_deref()).await?;
    let date_text = read(page, selectors.invoice_date.as_deref()).await?;
    let amount_text = read(page, selectors.invoice_amount.as_deref()).await?;

    let (invoice_number, synthetic_number) = match number_text
        .as_deref()
        .and_then(normalize_invoice_number)
        .or_else(|| number_from_summary(&candidate.summary))
    {
        Some(number) => (number, false),
        None => (synthetic_invoice_number(), true),
    };

    let issue_date = date_text
        .as_deref()
        .and_then(|t| parse_date(t, &descriptor.date_formats))
        .or_else(|| parse_date(&candidate.summary, &descriptor.date_formats))
        .unwrap_or_else(|| Utc::now().date_naive());

    let amount = amount_text
        .as_deref()
        .and_then(|t| parse_amount(t, descriptor.decimal_separator))
        .unwrap_or(0.0);

    let currency = descriptor
        .currency
        .clone()
        .or_else(|| amount_text.as_deref().and_then(detect_currency).map(str::to_string))
        .or_else(|| detect_currency(&candidate.summary).map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_CURRENCY.to_string());

    Ok(InvoiceDetails {
        invoice_number,
        synthetic_number,
        issue_date,
        amount,
        currency,
    })
}

async fn read(page: &dyn Page, selector: Option<&str>) -> Result<Option<String>, VendorError> {
    match selector {
        Some(selector) => Ok(page.text_of(selector).await?.filter(|t| !t.is_empty())),
        None => Ok(None),
    }
}

static SUMMARY_NUMBER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:invoice|order|receipt|bill)\s*(?:no\.?|number|#|:)?\s*[:#]?\s*([A-Z0-9][A-Z0-9\-/]*\d[A-Z0-9\-/]*)",
    )
    .ok()
});

fn number_from_summary(summary: &str) -> Option<String> {
    SUMMARY_NUMBER
        .as_ref()?
        .captures(summary)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
