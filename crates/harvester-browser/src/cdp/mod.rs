//! Chrome DevTools Protocol (CDP) client implementation.
//!
//! One WebSocket connection per browser. Commands are JSON-RPC calls
//! multiplexed over that socket; page-scoped commands carry a `sessionId`
//! obtained from `Target.attachToTarget` with `flatten: true`.
//!
//! ```rust,ignore
//! let client = CdpClient::connect("http://localhost:9222").await?;
//! let page = client.new_page(None).await?;
//! page.navigate("https://example.com").await?;
//! ```

mod client;
mod error;
mod protocol;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use protocol::*;
pub use session::PageSession;
