//! Browser session management for Invoice Harvester.
//!
//! Drives Chrome over the DevTools Protocol:
//!
//! - **Launch chain**: persistent profile, running system browser, or a
//!   managed instance, tried in configured order
//! - **Contexts**: one isolated cookie/storage jar per profile, restored from
//!   and flushed to a [`SessionStore`]
//! - **Pages**: navigation, form input, extraction, downloads, screenshots
//!
//! Vendor automation only sees the [`Page`], [`BrowserContext`] and
//! [`ContextProvider`] traits, so it can be exercised without a browser.

pub mod cdp;
pub mod fs;
pub mod launch;
pub mod manager;
pub mod page;
pub mod session_store;
pub mod state;

pub use launch::{LaunchFailure, LaunchStrategy};
pub use manager::{BrowserError, BrowserManager, BrowserManagerConfig, BrowserState};
pub use page::{
    capture_screenshot, BrowserContext, ContextOptions, ContextProvider, DownloadedFile,
    ListingRow, Page,
};
pub use session_store::{FileSessionStore, MemorySessionStore, SessionStore, SessionStoreError};
pub use state::{SessionState, StoredCookie};
