//! JavaScript execution operations for CDP page session.

use serde_json::{json, Value};

use crate::cdp::error::CdpError;

use super::core::PageSession;

impl PageSession {
    /// Evaluate JavaScript expression, awaiting promises.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["exception"]["description"]
                .as_str()
                .or_else(|| exception["text"].as_str())
                .unwrap_or("Unknown error");
            return Err(CdpError::Script(text.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    /// Evaluate `body` as a function of the element matching `selector`.
    ///
    /// `body` sees the element as `el` (possibly `null`) and any extra
    /// arguments as `arg`.
    pub async fn evaluate_on_selector(
        &self,
        selector: &str,
        body: &str,
        arg: Value,
    ) -> Result<Value, CdpError> {
        let expression = format!(
            "(async (el, arg) => {{ {} }})(document.querySelector({}), {})",
            body,
            serde_json::to_string(selector)?,
            serde_json::to_string(&arg)?,
        );
        self.evaluate(&expression).await
    }

    /// Trimmed `innerText` of the first match.
    pub async fn text_of(&self, selector: &str) -> Result<Option<String>, CdpError> {
        let value = self
            .evaluate_on_selector(
                selector,
                "return el ? (el.innerText || el.textContent || '').trim() : null;",
                Value::Null,
            )
            .await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    /// Attribute (or matching DOM property) of the first match.
    pub async fn attribute_of(
        &self,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, CdpError> {
        let value = self
            .evaluate_on_selector(
                selector,
                "if (!el) return null; \
                 const v = (arg in el && typeof el[arg] === 'string') ? el[arg] : el.getAttribute(arg); \
                 return v == null ? null : String(v);",
                json!(name),
            )
            .await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    /// Select an `<option>` by value (falls back to visible label).
    pub async fn select_option(&self, selector: &str, value: &str) -> Result<(), CdpError> {
        let found = self
            .evaluate_on_selector(
                selector,
                "if (!el) return false; \
                 const opt = Array.from(el.options || []).find(o => o.value === arg || o.label.trim() === arg); \
                 if (!opt) return false; \
                 el.value = opt.value; \
                 el.dispatchEvent(new Event('input', { bubbles: true })); \
                 el.dispatchEvent(new Event('change', { bubbles: true })); \
                 return true;",
                json!(value),
            )
            .await?;

        if found.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(CdpError::NoSuchElement(format!("{} option '{}'", selector, value)))
        }
    }
}
