//! Error taxonomy for the ingestion and batch-action pipeline.
//!
//! Lookup and zero-survivor conversion failures are fatal to a request;
//! everything else is scoped to a single record or a single collaborator
//! call and must not disturb sibling records.

use thiserror::Error;

/// Failures while resolving a product or fetching its image list.
/// Always fatal to the ingestion request that triggered them.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("could not detect a product id in the page URL")]
    ProductNotFound,

    #[error("product lookup failed: {0}")]
    Request(String),

    #[error("malformed product response: {0}")]
    Malformed(String),
}

/// Failures while normalizing a single raw input to the canonical
/// encoding. Isolated per item during ingestion; only `NoUsableImages`
/// (zero survivors) fails the whole batch.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("unreadable source {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("empty image payload")]
    EmptyPayload,

    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("image encode failed: {0}")]
    Encode(String),

    #[error("no usable images")]
    NoUsableImages,
}

/// A failed AI description call. Reported to the operator, never
/// propagated to sibling records.
#[derive(Debug, Error)]
#[error("image description failed: {0}")]
pub struct DescriptionError(pub String);

/// A failed AI image-generation call.
#[derive(Debug, Error)]
#[error("image generation failed: {0}")]
pub struct GenerationError(pub String);

/// The aggregated outcome of a catalog upload run that did not fully
/// succeed. Carries only the most recent per-item failure message.
#[derive(Debug, Error)]
#[error("upload failed: {0}")]
pub struct UploadError(pub String);

/// Configuration problems that block an action before any network call.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("catalog credentials are not configured")]
    MissingCredentials,
}

/// Unified error type surfaced by the pipeline's public operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Description(#[from] DescriptionError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("export failed: {0}")]
    Export(#[from] std::io::Error),

    #[error("archive failed: {0}")]
    Archive(#[from] zip::result::ZipError),
}
