use super::*;

#[test]
fn test_cdp_request_serialize() {
    let req = CdpRequest {
        id: 1,
        method: "Page.navigate".to_string(),
        params: Some(serde_json::json!({"url": "https://example.com"})),
        session_id: None,
    };
    let json = serde_json::to_string(&req).unwrap();
    assert!(json.contains("Page.navigate"));
    assert!(json.contains("example.com"));
    assert!(!json.contains("sessionId"));
}

#[test]
fn test_cdp_response_deserialize() {
    let json = r#"{"id": 1, "result": {"frameId": "abc"}}"#;
    let resp: CdpResponse = serde_json::from_str(json).unwrap();
    assert_eq!(resp.id, Some(1));
    assert!(resp.result.is_some());
}

#[test]
fn test_event_from_response() {
    let json = r#"{
        "method": "Browser.downloadWillBegin",
        "params": {"frameId": "F1", "guid": "g-1", "suggestedFilename": "inv.pdf"}
    }"#;
    let resp: CdpResponse = serde_json::from_str(json).unwrap();
    let event = CdpEvent::from_response(resp).unwrap();
    assert_eq!(event.method, "Browser.downloadWillBegin");
    assert_eq!(event.session_id, "");
    assert_eq!(event.param_str("guid"), Some("g-1"));
    assert_eq!(event.param_str("missing"), None);
}

#[test]
fn test_response_without_method_is_not_event() {
    let resp: CdpResponse = serde_json::from_str(r#"{"id": 7, "result": {}}"#).unwrap();
    assert!(CdpEvent::from_response(resp).is_none());
}

#[test]
fn test_network_cookie_deserialize() {
    let json = r#"{
        "name": "session-id",
        "value": "abc",
        "domain": ".amazon.com",
        "path": "/",
        "expires": -1,
        "size": 13,
        "httpOnly": true,
        "secure": true,
        "session": true,
        "sameSite": "Lax"
    }"#;
    let cookie: NetworkCookie = serde_json::from_str(json).unwrap();
    assert_eq!(cookie.name, "session-id");
    assert!(cookie.http_only);
    assert!(cookie.session);
    assert_eq!(cookie.same_site.as_deref(), Some("Lax"));
}

#[test]
fn test_cookie_param_omits_session_expiry() {
    let param = CookieParam {
        name: "a".to_string(),
        value: "b".to_string(),
        domain: "example.com".to_string(),
        path: "/".to_string(),
        expires: None,
        http_only: false,
        secure: true,
        same_site: None,
    };
    let json = serde_json::to_value(&param).unwrap();
    assert!(json.get("expires").is_none());
    assert_eq!(json["httpOnly"], false);
}

#[test]
fn test_mouse_button_serialize() {
    let btn = MouseButton::Left;
    let json = serde_json::to_string(&btn).unwrap();
    assert_eq!(json, "\"left\"");
}

#[test]
fn test_screenshot_format_serialize() {
    let fmt = ScreenshotFormat::Png;
    let json = serde_json::to_string(&fmt).unwrap();
    assert_eq!(json, "\"png\"");
}
