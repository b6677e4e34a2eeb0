//! Display-handle lifecycle management.
//!
//! Every buffer carried by a record has one live display handle derived
//! from it. When a buffer is replaced (an edit, for example) the prior
//! handle must be released before the new one is installed, otherwise
//! superseded buffers keep their render resources alive for the rest of
//! the session.

use std::collections::HashSet;

use crate::normalize::NormalizedImage;
use crate::record::{DisplayHandle, RecordId, RecordStatus};
use crate::store::AssetStore;

/// Issues and tracks display handles for binary buffers.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    next: u64,
    live: HashSet<u64>,
    released: u64,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> DisplayHandle {
        self.next += 1;
        self.live.insert(self.next);
        DisplayHandle(self.next)
    }

    /// Release a handle. Returns false if it was not live (double
    /// release or a handle from another registry).
    pub fn release(&mut self, handle: DisplayHandle) -> bool {
        let removed = self.live.remove(&handle.0);
        if removed {
            self.released += 1;
        } else {
            tracing::warn!(handle = handle.0, "released a handle that was not live");
        }
        removed
    }

    pub fn is_live(&self, handle: DisplayHandle) -> bool {
        self.live.contains(&handle.0)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn released_count(&self) -> u64 {
        self.released
    }
}

/// Replace a record's buffer, releasing the prior display handle before
/// installing the new one. The buffer, dimensions, and handle land in a
/// single store update so no observer sees a half-applied record.
///
/// Returns false (and changes nothing) when the record no longer exists,
/// which happens when an ingestion batch replaced the list mid-edit.
pub fn install_buffer(
    store: &mut AssetStore,
    registry: &mut HandleRegistry,
    id: RecordId,
    image: NormalizedImage,
) -> bool {
    let prior = match store.record(id) {
        Some(record) => record.display_handle,
        None => return false,
    };
    if let Some(handle) = prior {
        registry.release(handle);
    }
    let handle = registry.create();
    store.update(id, |record| {
        record.buffer = Some(image.bytes);
        record.width = image.width;
        record.height = image.height;
        record.display_handle = Some(handle);
        record.status = RecordStatus::Success;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ImageRecord, SourceKind};

    fn image(bytes: &[u8], width: u32, height: u32) -> NormalizedImage {
        NormalizedImage {
            bytes: bytes.to_vec(),
            width,
            height,
        }
    }

    fn seeded_store(registry: &mut HandleRegistry) -> (AssetStore, RecordId) {
        let mut store = AssetStore::new();
        let token = store.begin_ingest(crate::store::PipelineState::Converting);
        let record = ImageRecord::from_normalized(
            registry,
            SourceKind::LocalUpload,
            "a.png".to_string(),
            image(b"one", 4, 4),
            None,
        );
        let id = record.id;
        assert!(store.commit_ingest(token, vec![record]));
        (store, id)
    }

    #[test]
    fn create_and_release_track_liveness() {
        let mut registry = HandleRegistry::new();
        let h = registry.create();
        assert!(registry.is_live(h));
        assert!(registry.release(h));
        assert!(!registry.is_live(h));
        assert!(!registry.release(h));
        assert_eq!(registry.released_count(), 1);
    }

    #[test]
    fn install_buffer_releases_the_prior_handle() {
        let mut registry = HandleRegistry::new();
        let (mut store, id) = seeded_store(&mut registry);
        let old_handle = store.record(id).unwrap().display_handle.unwrap();

        assert!(install_buffer(&mut store, &mut registry, id, image(b"two", 8, 6)));

        let record = store.record(id).unwrap();
        assert!(!registry.is_live(old_handle));
        assert!(registry.is_live(record.display_handle.unwrap()));
        assert_eq!(registry.live_count(), 1);
        assert_eq!(record.buffer.as_deref(), Some(b"two".as_ref()));
        assert_eq!((record.width, record.height), (8, 6));
    }

    #[test]
    fn install_buffer_on_missing_record_changes_nothing() {
        let mut registry = HandleRegistry::new();
        let (mut store, _id) = seeded_store(&mut registry);
        let before = registry.live_count();

        assert!(!install_buffer(
            &mut store,
            &mut registry,
            RecordId::new(),
            image(b"x", 1, 1),
        ));
        assert_eq!(registry.live_count(), before);
    }
}
