//! Selector-driven DOM interaction.

use serde_json::json;

use crate::cdp::error::CdpError;
use crate::cdp::protocol::{BoxModel, DomNode};

use super::core::PageSession;

/// `DOM.getBoxModel` fails with this code for nodes without layout.
const NO_LAYOUT: i64 = -32000;

impl PageSession {
    async fn document_root(&self) -> Result<DomNode, CdpError> {
        let result = self
            .call("DOM.getDocument", Some(json!({"depth": 0})))
            .await?;
        Ok(serde_json::from_value(result["root"].clone())?)
    }

    /// Node id of the first match, if any.
    pub async fn query_selector(&self, selector: &str) -> Result<Option<i64>, CdpError> {
        let root = self.document_root().await?;
        let result = self
            .call(
                "DOM.querySelector",
                Some(json!({"nodeId": root.node_id, "selector": selector})),
            )
            .await?;

        Ok(result["nodeId"].as_i64().filter(|id| *id != 0))
    }

    async fn require(&self, selector: &str) -> Result<i64, CdpError> {
        self.query_selector(selector)
            .await?
            .ok_or_else(|| CdpError::NoSuchElement(selector.to_string()))
    }

    async fn layout(&self, node_id: i64) -> Result<Option<BoxModel>, CdpError> {
        match self
            .call("DOM.getBoxModel", Some(json!({"nodeId": node_id})))
            .await
        {
            Ok(r) => Ok(Some(serde_json::from_value(r["model"].clone())?)),
            Err(CdpError::Remote { code: NO_LAYOUT, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Scroll the first match into view and click its centre.
    pub async fn click_selector(&self, selector: &str) -> Result<(), CdpError> {
        let node_id = self.require(selector).await?;

        // Fixed-position nodes reject scrolling yet stay clickable.
        let _ = self
            .call("DOM.scrollIntoViewIfNeeded", Some(json!({"nodeId": node_id})))
            .await;

        let model = self
            .layout(node_id)
            .await?
            .ok_or_else(|| CdpError::NoSuchElement(format!("{} (not rendered)", selector)))?;
        let (x, y) = Self::centroid(&model.content);
        self.click(x, y).await
    }

    /// Replace the value of the first matching input by typing into it.
    pub async fn fill(&self, selector: &str, value: &str) -> Result<(), CdpError> {
        let node_id = self.require(selector).await?;
        self.call("DOM.focus", Some(json!({"nodeId": node_id})))
            .await?;
        self.press_key_combo("Control+a").await?;
        self.press_key("Backspace").await?;
        self.type_text(value).await
    }

    /// Mean of a quad's four corners; origin for malformed quads.
    pub(super) fn centroid(quad: &[f64]) -> (f64, f64) {
        match quad {
            [x1, y1, x2, y2, x3, y3, x4, y4, ..] => {
                ((x1 + x2 + x3 + x4) / 4.0, (y1 + y2 + y3 + y4) / 4.0)
            }
            _ => (0.0, 0.0),
        }
    }
}
