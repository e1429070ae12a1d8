//! HTTP API for Invoice Harvester.
//!
//! Routes:
//!
//! ```text
//! POST /jobs/{vendorId}   start one vendor job (optional {limit, fromDate})
//! POST /jobs              run every vendor sequentially
//! GET  /jobs              job record per registered vendor
//! GET  /jobs/{vendorId}   job record of one vendor
//! GET  /invoices          ledger records, optionally ?vendorId=
//! GET  /file?path=        stored artifact bytes
//! GET  /vendors           vendor descriptors
//! GET  /health            liveness
//! ```

pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use server::{shutdown_signal, ApiConfig, ApiServer};
pub use state::AppState;
