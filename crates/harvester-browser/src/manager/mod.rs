//! Browser session manager: launches browsers and hands out per-profile
//! contexts backed by CDP.

mod cdp_context;
mod cdp_page;
mod manager_core;
mod manager_types;

pub use cdp_context::CdpContext;
pub use cdp_page::CdpPage;
pub use manager_core::BrowserManager;
pub use manager_types::{BrowserError, BrowserManagerConfig, BrowserState};

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
