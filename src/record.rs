//! The unit of catalog art tracked by the pipeline.

use uuid::Uuid;

use crate::handles::HandleRegistry;
use crate::normalize::NormalizedImage;

/// Unique identifier for an image record.
///
/// Assigned once at ingestion and stable for the record's lifetime;
/// never reused, even across ingestion batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        RecordId(Uuid::new_v4())
    }

    /// Short hex prefix of the id, used for fallback filenames.
    pub fn short_prefix(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Provenance of a record. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    RemoteFetch,
    LocalUpload,
    AiGenerated,
}

impl SourceKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceKind::RemoteFetch => "remote",
            SourceKind::LocalUpload => "local",
            SourceKind::AiGenerated => "ai",
        }
    }
}

/// Per-record lifecycle state, independent of sibling records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Converting,
    Success,
    Failed,
}

/// Ephemeral handle used to render a record's current buffer.
///
/// Exactly one handle is live per record; the previous handle must be
/// released before a new one is installed (see [`crate::handles`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayHandle(pub(crate) u64);

/// One normalized image tracked by the pipeline.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub id: RecordId,
    pub source_kind: SourceKind,
    /// Remote URL, local path, or generation prompt that produced this
    /// record. Immutable.
    pub original_reference: String,
    /// Current normalized JPEG buffer. Absent when `status` is `Failed`.
    pub buffer: Option<Vec<u8>>,
    pub display_handle: Option<DisplayHandle>,
    pub width: u32,
    pub height: u32,
    /// Operator-facing filename stem. Absent until assigned by ingestion
    /// auto-naming, AI rename, or generation naming.
    pub suggested_name: Option<String>,
    pub status: RecordStatus,
}

impl ImageRecord {
    /// Build a successful record from a freshly normalized image,
    /// minting its display handle from the registry.
    pub fn from_normalized(
        registry: &mut HandleRegistry,
        source_kind: SourceKind,
        original_reference: String,
        image: NormalizedImage,
        suggested_name: Option<String>,
    ) -> Self {
        let handle = registry.create();
        Self {
            id: RecordId::new(),
            source_kind,
            original_reference,
            buffer: Some(image.bytes),
            display_handle: Some(handle),
            width: image.width,
            height: image.height,
            suggested_name,
            status: RecordStatus::Success,
        }
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }
}
