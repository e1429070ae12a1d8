//! Persisted browser session state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cdp::{CookieParam, NetworkCookie};

/// A cookie as persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Seconds since the epoch; `None` for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl From<NetworkCookie> for StoredCookie {
    fn from(c: NetworkCookie) -> Self {
        let expires = if c.session || c.expires < 0.0 {
            None
        } else {
            Some(c.expires)
        };
        Self {
            name: c.name,
            value: c.value,
            domain: c.domain,
            path: c.path,
            expires,
            http_only: c.http_only,
            secure: c.secure,
            same_site: c.same_site,
        }
    }
}

impl From<&StoredCookie> for CookieParam {
    fn from(c: &StoredCookie) -> Self {
        Self {
            name: c.name.clone(),
            value: c.value.clone(),
            domain: c.domain.clone(),
            path: c.path.clone(),
            expires: c.expires,
            http_only: c.http_only,
            secure: c.secure,
            same_site: c.same_site.clone(),
        }
    }
}

/// Cookies plus per-origin `localStorage` captured from a live context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub cookies: Vec<StoredCookie>,
    /// origin -> key -> value
    #[serde(default)]
    pub origins: BTreeMap<String, BTreeMap<String, String>>,
}

impl SessionState {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.values().all(|items| items.is_empty())
    }

    /// Script that seeds `localStorage` for whichever stored origin a
    /// document belongs to. Keys already present in the page are left alone.
    pub fn origin_seed_script(&self) -> Option<String> {
        let seeded: BTreeMap<_, _> = self
            .origins
            .iter()
            .filter(|(_, items)| !items.is_empty())
            .collect();
        if seeded.is_empty() {
            return None;
        }
        let payload = serde_json::to_string(&seeded).ok()?;
        Some(format!(
            "(() => {{ \
               const seed = {payload}; \
               const items = seed[location.origin]; \
               if (!items) return; \
               try {{ \
                 for (const [k, v] of Object.entries(items)) {{ \
                   if (localStorage.getItem(k) === null) localStorage.setItem(k, v); \
                 }} \
               }} catch (e) {{}} \
             }})();"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str) -> StoredCookie {
        StoredCookie {
            name: name.to_string(),
            value: "v".to_string(),
            domain: ".example.com".to_string(),
            path: "/".to_string(),
            expires: Some(1_900_000_000.0),
            http_only: true,
            secure: true,
            same_site: Some("Lax".to_string()),
        }
    }

    #[test]
    fn test_session_cookie_has_no_expiry() {
        let cdp = NetworkCookie {
            name: "sid".to_string(),
            value: "x".to_string(),
            domain: "example.com".to_string(),
            path: "/".to_string(),
            expires: -1.0,
            http_only: false,
            secure: false,
            session: true,
            same_site: None,
        };
        let stored = StoredCookie::from(cdp);
        assert_eq!(stored.expires, None);
        assert!(CookieParam::from(&stored).expires.is_none());
    }

    #[test]
    fn test_empty_state() {
        let mut state = SessionState::default();
        assert!(state.is_empty());
        state.origins.insert("https://a.test".to_string(), BTreeMap::new());
        assert!(state.is_empty());
        state.cookies.push(cookie("a"));
        assert!(!state.is_empty());
    }

    #[test]
    fn test_seed_script_only_for_populated_origins() {
        let mut state = SessionState::default();
        assert!(state.origin_seed_script().is_none());

        let mut items = BTreeMap::new();
        items.insert("token".to_string(), "abc".to_string());
        state.origins.insert("https://www.amazon.com".to_string(), items);
        state.origins.insert("https://empty.test".to_string(), BTreeMap::new());

        let script = state.origin_seed_script().unwrap();
        assert!(script.contains("https://www.amazon.com"));
        assert!(script.contains("\"token\":\"abc\""));
        assert!(!script.contains("empty.test"));
    }

    #[test]
    fn test_serde_shape() {
        let mut state = SessionState::default();
        state.cookies.push(cookie("a"));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["cookies"][0]["httpOnly"], true);
        assert_eq!(json["cookies"][0]["sameSite"], "Lax");
        let back: SessionState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
