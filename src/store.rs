//! In-memory session state: the ordered record list, the selection and
//! analyzing sets over it, and the coarse pipeline state.
//!
//! All mutation goes through the methods here; orchestrators receive the
//! store explicitly rather than reaching for globals. Ingestion commits
//! are guarded by a generation token so a superseded request's
//! late-arriving batch can never overwrite a newer one.

use std::collections::HashSet;

use crate::record::{ImageRecord, RecordId};

/// Coarse processing state for the current ingestion request.
///
/// `Complete` and `Error` are terminal; any new ingestion request resets
/// to `FetchingInfo` or `Converting` from any state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    FetchingInfo,
    Converting,
    Complete,
    Error(String),
}

impl Default for PipelineState {
    fn default() -> Self {
        PipelineState::Idle
    }
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Complete | PipelineState::Error(_))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, PipelineState::FetchingInfo | PipelineState::Converting)
    }
}

/// Token identifying one ingestion request. Commits carrying a stale
/// token are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestToken(u64);

/// The asset record store plus its selection, analyzing, and pipeline
/// state. One instance per operator session.
#[derive(Debug, Default)]
pub struct AssetStore {
    records: Vec<ImageRecord>,
    selected: HashSet<RecordId>,
    analyzing: HashSet<RecordId>,
    state: PipelineState,
    product_name: String,
    current_sku: String,
    generation: u64,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Records in ingestion/insertion order.
    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn record(&self, id: RecordId) -> Option<&ImageRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn current_sku(&self) -> &str {
        &self.current_sku
    }

    pub fn selected(&self) -> &HashSet<RecordId> {
        &self.selected
    }

    pub fn is_analyzing(&self, id: RecordId) -> bool {
        self.analyzing.contains(&id)
    }

    pub fn analyzing_count(&self) -> usize {
        self.analyzing.len()
    }

    /// Start a new ingestion request: clears the record list, selection,
    /// and analyzing set, enters the given state, and returns the token
    /// that must accompany the eventual commit or failure.
    pub fn begin_ingest(&mut self, initial: PipelineState) -> IngestToken {
        self.generation += 1;
        self.records.clear();
        self.selected.clear();
        self.analyzing.clear();
        self.product_name.clear();
        self.current_sku.clear();
        self.state = initial;
        tracing::debug!(generation = self.generation, state = ?self.state, "ingestion started");
        IngestToken(self.generation)
    }

    pub fn is_current(&self, token: IngestToken) -> bool {
        token.0 == self.generation
    }

    /// Mid-request state transition; ignored for stale tokens.
    pub fn advance(&mut self, token: IngestToken, state: PipelineState) -> bool {
        if !self.is_current(token) {
            return false;
        }
        self.state = state;
        true
    }

    /// Record the product's display name and sku id; ignored for stale
    /// tokens.
    pub fn set_product(&mut self, token: IngestToken, name: &str, sku: &str) -> bool {
        if !self.is_current(token) {
            return false;
        }
        self.product_name = name.to_string();
        self.current_sku = sku.to_string();
        true
    }

    /// Atomically swap in the full record batch for this request and
    /// enter `Complete`. A stale token leaves the store untouched.
    pub fn commit_ingest(&mut self, token: IngestToken, records: Vec<ImageRecord>) -> bool {
        if !self.is_current(token) {
            tracing::warn!("ignoring record batch from a superseded ingestion request");
            return false;
        }
        self.records = records;
        self.selected.clear();
        self.analyzing.clear();
        self.state = PipelineState::Complete;
        tracing::info!(count = self.records.len(), "ingestion committed");
        true
    }

    /// Mark the current request failed with an operator-readable
    /// message. The record list stays empty. Stale tokens are ignored.
    pub fn fail_ingest(&mut self, token: IngestToken, message: impl Into<String>) -> bool {
        if !self.is_current(token) {
            return false;
        }
        let message = message.into();
        tracing::error!(error = %message, "ingestion failed");
        self.records.clear();
        self.state = PipelineState::Error(message);
        true
    }

    /// Apply a partial update to one record by id. No-op (returns
    /// false) when the id is absent, which happens when a new batch
    /// replaced the list while a call was in flight. List order is
    /// never affected.
    pub fn update<F: FnOnce(&mut ImageRecord)>(&mut self, id: RecordId, patch: F) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                patch(record);
                true
            }
            None => false,
        }
    }

    /// Insert a record at the head of the list, leaving existing
    /// records, selection, and statuses untouched.
    pub fn prepend(&mut self, record: ImageRecord) {
        self.records.insert(0, record);
    }

    pub fn toggle_select(&mut self, id: RecordId) {
        if self.record(id).is_none() {
            return;
        }
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
    }

    /// Full-set toggle: select every current id unless the selection is
    /// already full, in which case clear it.
    pub fn select_all_or_none(&mut self) {
        if self.selected.len() == self.records.len() {
            self.selected.clear();
        } else {
            self.selected = self.records.iter().map(|r| r.id).collect();
        }
    }

    /// The records a batch action applies to: the selected ids when the
    /// selection is non-empty, otherwise the full list. Always in list
    /// order.
    pub fn scope(&self) -> Vec<RecordId> {
        if self.selected.is_empty() {
            self.records.iter().map(|r| r.id).collect()
        } else {
            self.records
                .iter()
                .filter(|r| self.selected.contains(&r.id))
                .map(|r| r.id)
                .collect()
        }
    }

    pub fn mark_analyzing(&mut self, id: RecordId) {
        self.analyzing.insert(id);
    }

    pub fn clear_analyzing(&mut self, id: RecordId) {
        self.analyzing.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::HandleRegistry;
    use crate::normalize::NormalizedImage;
    use crate::record::SourceKind;

    fn record(registry: &mut HandleRegistry, name: &str) -> ImageRecord {
        ImageRecord::from_normalized(
            registry,
            SourceKind::RemoteFetch,
            format!("https://img/{name}"),
            NormalizedImage {
                bytes: name.as_bytes().to_vec(),
                width: 1,
                height: 1,
            },
            Some(name.to_string()),
        )
    }

    fn seeded(n: usize) -> (AssetStore, Vec<RecordId>) {
        let mut registry = HandleRegistry::new();
        let mut store = AssetStore::new();
        let token = store.begin_ingest(PipelineState::Converting);
        let records: Vec<ImageRecord> =
            (0..n).map(|i| record(&mut registry, &format!("r{i}"))).collect();
        let ids = records.iter().map(|r| r.id).collect();
        assert!(store.commit_ingest(token, records));
        (store, ids)
    }

    #[test]
    fn commit_enters_complete_and_clears_selection() {
        let (store, ids) = seeded(3);
        assert_eq!(store.state(), &PipelineState::Complete);
        assert_eq!(store.records().len(), 3);
        assert!(store.selected().is_empty());
        assert_eq!(store.scope(), ids);
    }

    #[test]
    fn stale_token_cannot_commit_or_fail() {
        let mut registry = HandleRegistry::new();
        let mut store = AssetStore::new();
        let old = store.begin_ingest(PipelineState::FetchingInfo);
        let new = store.begin_ingest(PipelineState::Converting);

        assert!(!store.commit_ingest(old, vec![record(&mut registry, "late")]));
        assert!(store.records().is_empty());
        assert_eq!(store.state(), &PipelineState::Converting);

        assert!(!store.fail_ingest(old, "late failure"));
        assert_eq!(store.state(), &PipelineState::Converting);

        assert!(store.commit_ingest(new, vec![record(&mut registry, "fresh")]));
        assert_eq!(store.records().len(), 1);
    }

    #[test]
    fn fail_leaves_an_empty_list_and_error_state() {
        let mut store = AssetStore::new();
        let token = store.begin_ingest(PipelineState::FetchingInfo);
        assert!(store.fail_ingest(token, "no usable images"));
        assert!(store.records().is_empty());
        assert_eq!(
            store.state(),
            &PipelineState::Error("no usable images".to_string())
        );
    }

    #[test]
    fn update_is_a_noop_for_absent_ids() {
        let (mut store, _) = seeded(1);
        assert!(!store.update(RecordId::new(), |r| r.suggested_name = None));
    }

    #[test]
    fn update_preserves_order() {
        let (mut store, ids) = seeded(3);
        assert!(store.update(ids[1], |r| r.suggested_name = Some("renamed".into())));
        let order: Vec<RecordId> = store.records().iter().map(|r| r.id).collect();
        assert_eq!(order, ids);
        assert_eq!(
            store.record(ids[1]).unwrap().suggested_name.as_deref(),
            Some("renamed")
        );
    }

    #[test]
    fn prepend_puts_new_records_first() {
        let (mut store, ids) = seeded(2);
        store.toggle_select(ids[0]);
        let mut registry = HandleRegistry::new();
        let fresh = record(&mut registry, "generated");
        let fresh_id = fresh.id;
        store.prepend(fresh);

        let order: Vec<RecordId> = store.records().iter().map(|r| r.id).collect();
        assert_eq!(order, vec![fresh_id, ids[0], ids[1]]);
        // existing selection untouched
        assert!(store.selected().contains(&ids[0]));
    }

    #[test]
    fn toggle_select_ignores_unknown_ids() {
        let (mut store, _) = seeded(1);
        store.toggle_select(RecordId::new());
        assert!(store.selected().is_empty());
    }

    #[test]
    fn select_all_or_none_is_a_full_set_toggle() {
        let (mut store, ids) = seeded(3);
        store.toggle_select(ids[0]);
        // partial selection: selects everything
        store.select_all_or_none();
        assert_eq!(store.selected().len(), 3);
        // full selection: clears
        store.select_all_or_none();
        assert!(store.selected().is_empty());
    }

    #[test]
    fn scope_follows_selection() {
        let (mut store, ids) = seeded(3);
        assert_eq!(store.scope(), ids);
        store.toggle_select(ids[2]);
        store.toggle_select(ids[0]);
        // scope keeps list order, not toggle order
        assert_eq!(store.scope(), vec![ids[0], ids[2]]);
    }

    #[test]
    fn begin_ingest_resets_everything() {
        let (mut store, ids) = seeded(2);
        store.toggle_select(ids[0]);
        store.mark_analyzing(ids[1]);
        store.begin_ingest(PipelineState::FetchingInfo);
        assert!(store.records().is_empty());
        assert!(store.selected().is_empty());
        assert_eq!(store.analyzing_count(), 0);
        assert_eq!(store.state(), &PipelineState::FetchingInfo);
    }
}
