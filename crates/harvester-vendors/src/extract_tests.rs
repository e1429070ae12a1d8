use std::sync::Arc;

use super::*;
use crate::testing::FakeSite;
use harvester_browser::BrowserContext;

fn formats() -> Vec<String> {
    ["%B %d, %Y", "%Y-%m-%d", "%d.%m.%Y"]
        .iter()
        .map(|f| f.to_string())
        .collect()
}

#[test]
fn test_parse_amount_dot() {
    assert_eq!(parse_amount("$1,234.56", DecimalSeparator::Dot), Some(1234.56));
    assert_eq!(parse_amount("Total: 19.99 USD.", DecimalSeparator::Dot), Some(19.99));
    assert_eq!(parse_amount("1,000", DecimalSeparator::Dot), Some(1000.0));
}

#[test]
fn test_parse_amount_comma() {
    assert_eq!(parse_amount("1.234,56 €", DecimalSeparator::Comma), Some(1234.56));
    assert_eq!(parse_amount("12,5", DecimalSeparator::Comma), Some(12.5));
    assert_eq!(parse_amount("1.000", DecimalSeparator::Comma), Some(1000.0));
}

#[test]
fn test_parse_amount_auto() {
    assert_eq!(parse_amount("1.234,56", DecimalSeparator::Auto), Some(1234.56));
    assert_eq!(parse_amount("1,234.56", DecimalSeparator::Auto), Some(1234.56));
    assert_eq!(parse_amount("1.234", DecimalSeparator::Auto), Some(1234.0));
    assert_eq!(parse_amount("12,5", DecimalSeparator::Auto), Some(12.5));
}

#[test]
fn test_parse_amount_without_digits() {
    assert_eq!(parse_amount("free", DecimalSeparator::Auto), None);
    assert_eq!(parse_amount("", DecimalSeparator::Dot), None);
    assert_eq!(parse_amount(".,", DecimalSeparator::Dot), None);
}

#[test]
fn test_decimal_separator_from_str() {
    assert_eq!("Comma".parse::<DecimalSeparator>(), Ok(DecimalSeparator::Comma));
    assert_eq!(".".parse::<DecimalSeparator>(), Ok(DecimalSeparator::Dot));
    assert_eq!("auto".parse::<DecimalSeparator>(), Ok(DecimalSeparator::Auto));
    assert!("space".parse::<DecimalSeparator>().is_err());
}

#[test]
fn test_parse_date_formats() {
    let expected = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    assert_eq!(parse_date("March 5, 2024", &formats()), Some(expected));
    assert_eq!(parse_date("Order placed March 5, 2024", &formats()), Some(expected));
    assert_eq!(parse_date("Invoice date: 2024-03-05.", &formats()), Some(expected));
    assert_eq!(parse_date("Datum 05.03.2024", &formats()), Some(expected));
    assert_eq!(parse_date("no date here", &formats()), None);
}

#[test]
fn test_detect_currency() {
    assert_eq!(detect_currency("€ 12,00"), Some("EUR"));
    assert_eq!(detect_currency("£5"), Some("GBP"));
    assert_eq!(detect_currency("$19.99"), Some("USD"));
    assert_eq!(detect_currency("R$ 10,00"), Some("BRL"));
    assert_eq!(detect_currency("Total 10.00 chf"), Some("CHF"));
    assert_eq!(detect_currency("EURO"), None);
    assert_eq!(detect_currency("12.00"), None);
}

#[test]
fn test_normalize_invoice_number() {
    assert_eq!(
        normalize_invoice_number("Order # 112-3456789-0123456").as_deref(),
        Some("112-3456789-0123456")
    );
    assert_eq!(normalize_invoice_number("Invoice: INV-0042.").as_deref(), Some("INV-0042"));
    assert_eq!(normalize_invoice_number("Invoice"), None);
}

#[test]
fn test_synthetic_invoice_number() {
    let number = synthetic_invoice_number();
    assert!(number.starts_with("GEN-"));
    assert!(number[4..].chars().all(|c| c.is_ascii_digit()));
}

#[test]
fn test_number_from_summary() {
    assert_eq!(
        number_from_summary("Order # 112-1 placed March 1, 2024").as_deref(),
        Some("112-1")
    );
    assert_eq!(number_from_summary("Invoice no. A77"), Some("A77".to_string()));
    assert_eq!(number_from_summary("Order placed March 1"), None);
}

#[test]
fn test_summary_pattern_compiles_once() {
    assert!(SUMMARY_NUMBER.is_some());
    for _ in 0..3 {
        assert_eq!(number_from_summary("Bill #9-42"), Some("9-42".to_string()));
    }
}

async fn listing_page(site: &FakeSite) -> Arc<dyn Page> {
    let store = Arc::new(harvester_browser::MemorySessionStore::new());
    let context = crate::testing::FakeContext::new("amazon", site.clone(), store);
    let page = context.new_page().await.unwrap();
    page.goto(&site.descriptor().invoice_list_url).await.unwrap();
    page
}

#[tokio::test]
async fn test_scan_respects_limit() {
    let site = FakeSite::new(VendorDescriptor::amazon()).with_invoices(5).logged_in();
    let page = listing_page(&site).await;

    let result = scan(page.as_ref(), &site.descriptor(), 3, None).await.unwrap();
    assert_eq!(result.candidates.len(), 3);
    assert_eq!(result.candidates[0].position, 0);
    assert_eq!(result.candidates[2].position, 2);
    assert!(result.candidates[0].summary.contains("INV-0001"));
}

#[tokio::test]
async fn test_scan_follows_pagination_and_counts_linkless_rows() {
    let site = FakeSite::new(VendorDescriptor::amazon())
        .with_invoices(7)
        .with_page_size(3)
        .with_linkless_rows(2)
        .logged_in();
    let page = listing_page(&site).await;

    let result = scan(page.as_ref(), &site.descriptor(), 10, None).await.unwrap();
    assert_eq!(result.candidates.len(), 7);
    assert_eq!(result.skipped_rows, 2);
    assert_eq!(result.pages, 3);
}

#[tokio::test]
async fn test_scan_limit_zero() {
    let site = FakeSite::new(VendorDescriptor::amazon()).with_invoices(2).logged_in();
    let page = listing_page(&site).await;

    let result = scan(page.as_ref(), &site.descriptor(), 0, None).await.unwrap();
    assert!(result.candidates.is_empty());
    assert_eq!(result.pages, 0);
}

#[tokio::test]
async fn test_scan_applies_date_filter() {
    let site = FakeSite::new(VendorDescriptor::amazon()).with_invoices(1).logged_in();
    let page = listing_page(&site).await;

    let from = NaiveDate::from_ymd_opt(2023, 6, 1);
    scan(page.as_ref(), &site.descriptor(), 5, from).await.unwrap();
    assert!(site.actions().contains(&"filter year-2023".to_string()));
}

#[tokio::test]
async fn test_extract_details_from_detail_page() {
    let site = FakeSite::new(VendorDescriptor::amazon())
        .with_invoice("112-0000001", "March 5, 2024", "$1,019.99")
        .logged_in();
    let page = listing_page(&site).await;
    let descriptor = site.descriptor();

    let candidate = scan(page.as_ref(), &descriptor, 1, None)
        .await
        .unwrap()
        .candidates
        .remove(0);
    page.goto(&candidate.href).await.unwrap();

    let details = extract_details(page.as_ref(), &descriptor, &candidate).await.unwrap();
    assert_eq!(details.invoice_number, "112-0000001");
    assert!(!details.synthetic_number);
    assert_eq!(details.issue_date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    assert_eq!(details.amount, 1019.99);
    assert_eq!(details.currency, "USD");
}

#[tokio::test]
async fn test_extract_details_fallbacks() {
    let site = FakeSite::new(VendorDescriptor::amazon())
        .with_invoice("INV-1", "someday", "n/a")
        .logged_in();
    let page = listing_page(&site).await;

    let mut descriptor = site.descriptor();
    descriptor.selectors.invoice_number = None;
    descriptor.currency = None;
    let candidate = InvoiceCandidate {
        position: 0,
        href: "https://vendor.test/invoice/0".to_string(),
        summary: "Statement".to_string(),
    };
    page.goto(&candidate.href).await.unwrap();

    let details = extract_details(page.as_ref(), &descriptor, &candidate).await.unwrap();
    assert!(details.synthetic_number);
    assert!(details.invoice_number.starts_with("GEN-"));
    assert_eq!(details.issue_date, Utc::now().date_naive());
    assert_eq!(details.amount, 0.0);
    assert_eq!(details.currency, UNKNOWN_CURRENCY);
}
