//! Vendor automation core for Invoice Harvester.
//!
//! A vendor is described declaratively by a [`VendorDescriptor`] (URLs,
//! timeouts, CSS selectors, amount locale). [`ScriptedVendor`] turns a
//! descriptor into a [`VendorAutomation`]:
//!
//! 1. [`login`]: restore or establish an authenticated session, pausing for
//!    manual completion when a CAPTCHA or unsupported challenge appears
//! 2. [`extract::scan`]: walk the invoice listing
//! 3. [`pipeline`]: per invoice, extract metadata, dedup against the
//!    [`MetadataLedger`], download and store the artifact

pub mod automation;
pub mod credential;
pub mod descriptor;
pub mod error;
pub mod extract;
pub mod login;
pub mod pipeline;
pub mod record;
pub mod registry;
pub mod storage;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use automation::{RunOptions, ScriptedVendor, VendorAutomation, VendorRun, VendorServices};
pub use credential::Credential;
pub use descriptor::{VendorDescriptor, VendorSelectors};
pub use error::{StorageError, VendorError};
pub use extract::{DecimalSeparator, InvoiceCandidate};
pub use login::{LoginOutcome, LoginPhase, LoginTimings};
pub use pipeline::{DownloadPipeline, DownloadReport};
pub use record::InvoiceRecord;
pub use registry::VendorRegistry;
pub use storage::{ArtifactStore, JsonLedger, MemoryLedger, MetadataLedger};
