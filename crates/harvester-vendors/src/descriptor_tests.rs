use super::*;

fn custom_config() -> VendorConfig {
    let mut config = VendorConfig {
        login_url: Some("https://portal.acme.test/login".to_string()),
        invoice_list_url: Some("https://portal.acme.test/billing".to_string()),
        authenticated_url: Some("/billing".to_string()),
        decimal_separator: Some("comma".to_string()),
        currency: Some("EUR".to_string()),
        ..VendorConfig::default()
    };
    config.selectors.listing_row = Some("tr.invoice".to_string());
    config.selectors.invoice_link = Some("a.view".to_string());
    config.selectors.download_button = Some("a.pdf".to_string());
    config
}

#[test]
fn test_amazon_defaults() {
    let amazon = VendorDescriptor::amazon();
    assert_eq!(amazon.id, "amazon");
    assert_eq!(amazon.default_limit, 10);
    assert!(!amazon.interaction_required);
    assert!(amazon.is_authenticated_url("https://www.amazon.com/gp/css/order-history?ref=nav"));
    assert!(amazon.is_authenticated_url("https://www.amazon.com/your-orders/orders?timeFilter=year-2024"));
    assert!(!amazon.is_authenticated_url("https://www.amazon.com/ap/signin?openid=x"));
}

#[test]
fn test_builtin_merge_overrides_single_field() {
    let mut config = VendorConfig::default();
    config.selectors.password = Some("#pw".to_string());
    config.auth_timeout_seconds = Some(300);

    let merged = VendorDescriptor::from_config("amazon", &config).unwrap();
    assert_eq!(merged.selectors.password.as_deref(), Some("#pw"));
    assert_eq!(merged.selectors.username.as_deref(), Some("#ap_email"));
    assert_eq!(merged.auth_timeout, Duration::from_secs(300));
    assert_eq!(merged.invoice_list_url, VendorDescriptor::amazon().invoice_list_url);
}

#[test]
fn test_custom_vendor() {
    let acme = VendorDescriptor::from_config("acme", &custom_config()).unwrap();
    assert_eq!(acme.display_name, "acme");
    assert_eq!(acme.decimal_separator, DecimalSeparator::Comma);
    assert_eq!(acme.currency.as_deref(), Some("EUR"));
    assert_eq!(acme.selectors.date_filter_value, "{year}");
    assert!(!acme.date_formats.is_empty());
    assert!(acme.selectors.username.is_none());
}

#[test]
fn test_custom_vendor_requires_urls_and_selectors() {
    let mut config = custom_config();
    config.invoice_list_url = None;
    let err = VendorDescriptor::from_config("acme", &config).unwrap_err();
    assert!(err.to_string().contains("invoice_list_url"));

    let mut config = custom_config();
    config.selectors.download_button = None;
    let err = VendorDescriptor::from_config("acme", &config).unwrap_err();
    assert!(err.to_string().contains("download_button"));
}

#[test]
fn test_custom_vendor_rejects_bad_separator() {
    let mut config = custom_config();
    config.decimal_separator = Some("semicolon".to_string());
    assert!(VendorDescriptor::from_config("acme", &config).is_err());
}

#[test]
fn test_load_all_includes_builtins_and_skips_disabled() {
    let mut configs = BTreeMap::new();
    assert_eq!(
        VendorDescriptor::load_all(&configs)
            .unwrap()
            .iter()
            .map(|d| d.id.as_str())
            .collect::<Vec<_>>(),
        vec!["amazon"]
    );

    configs.insert("acme".to_string(), custom_config());
    configs.insert(
        "amazon".to_string(),
        VendorConfig {
            enabled: false,
            ..VendorConfig::default()
        },
    );
    let ids: Vec<_> = VendorDescriptor::load_all(&configs)
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec!["acme"]);
}

#[test]
fn test_url_matches() {
    assert!(url_matches("https://a.test/x", "https://a.test/x"));
    assert!(url_matches("https://a.test/orders/1", "/orders"));
    assert!(!url_matches("https://a.test/login", "/orders"));
    assert!(!url_matches("https://a.test/login", ""));
}

#[test]
fn test_url_matches_ignores_query_string() {
    assert!(!url_matches("https://a.test/login?next=/orders", "/orders"));
    assert!(!url_matches("https://b.test/orders", "https://a.test/orders"));
    assert!(url_matches("https://a.test/orders/2024?page=2", "https://a.test/orders"));

    let amazon = VendorDescriptor::amazon();
    assert!(!amazon.is_authenticated_url(
        "https://www.amazon.com/ap/signin?return_to=/gp/css/order-history"
    ));
}

#[test]
fn test_descriptor_serializes_without_credentials() {
    let json = serde_json::to_value(VendorDescriptor::amazon()).unwrap();
    assert_eq!(json["id"], "amazon");
    assert_eq!(json["authTimeout"], 60);
    assert_eq!(json["selectors"]["listingRow"], ".order-card");
}
