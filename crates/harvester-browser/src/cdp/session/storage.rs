//! Web storage operations for CDP page session.

use std::collections::BTreeMap;

use serde_json::json;

use crate::cdp::error::CdpError;

use super::core::PageSession;

impl PageSession {
    /// Snapshot `localStorage` of the current origin.
    ///
    /// Returns `None` for opaque origins (`about:blank`, `data:`).
    pub async fn local_storage_snapshot(
        &self,
    ) -> Result<Option<(String, BTreeMap<String, String>)>, CdpError> {
        let value = self
            .evaluate(
                "(() => { \
                   if (!location.origin || location.origin === 'null') return null; \
                   const items = {}; \
                   try { \
                     for (let i = 0; i < localStorage.length; i++) { \
                       const k = localStorage.key(i); \
                       items[k] = localStorage.getItem(k); \
                     } \
                   } catch (e) { return null; } \
                   return { origin: location.origin, items }; \
                 })()",
            )
            .await?;

        if value.is_null() {
            return Ok(None);
        }

        let origin = value["origin"]
            .as_str()
            .ok_or_else(|| CdpError::Malformed("Missing origin".to_string()))?
            .to_string();
        let items: BTreeMap<String, String> = serde_json::from_value(value["items"].clone())?;
        Ok(Some((origin, items)))
    }

    /// Run `source` in every new document before page scripts.
    pub async fn add_init_script(&self, source: &str) -> Result<String, CdpError> {
        let result = self
            .call(
                "Page.addScriptToEvaluateOnNewDocument",
                Some(json!({"source": source})),
            )
            .await?;
        Ok(result["identifier"].as_str().unwrap_or_default().to_string())
    }
}
