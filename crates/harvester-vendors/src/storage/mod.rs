//! Invoice metadata ledger and artifact files.

mod artifacts;
mod ledger;

pub use artifacts::ArtifactStore;
pub use ledger::{JsonLedger, MemoryLedger, MetadataLedger};
