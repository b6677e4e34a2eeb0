//! Catalog image pipeline: pull a commerce product's images (or local
//! files), normalize everything to canonical JPEG, optionally rename or
//! extend the set with AI, and export or push the result to the remote
//! catalog.

pub mod actions;
pub mod ai;
pub mod config;
pub mod error;
pub mod export;
pub mod handles;
pub mod ingest;
pub mod logging;
pub mod lookup;
pub mod normalize;
pub mod record;
pub mod session;
pub mod store;
pub mod upload;

pub use actions::UploadReport;
pub use config::Config;
pub use error::PipelineError;
pub use record::{ImageRecord, RecordId, RecordStatus, SourceKind};
pub use session::Session;
pub use store::{AssetStore, PipelineState};
