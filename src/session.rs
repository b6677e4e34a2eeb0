//! One operator session: owns the store, the handle registry, and the
//! orchestrators wired to their collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::actions::{Actions, UploadReport};
use crate::ai::{ChatDescriber, Describer, Generator, HttpGenerator};
use crate::config::Config;
use crate::error::{ConversionError, PipelineError};
use crate::export;
use crate::handles::{install_buffer, HandleRegistry};
use crate::ingest::Ingestor;
use crate::lookup::{HttpLookup, ProductLookup};
use crate::normalize::{normalize_bytes, HttpFetcher, ImageFetcher};
use crate::record::{ImageRecord, RecordId, RecordStatus};
use crate::store::AssetStore;
use crate::upload::{CatalogUploader, HttpUploader};

pub struct Session {
    config: Config,
    store: AssetStore,
    registry: HandleRegistry,
    ingestor: Ingestor,
    actions: Actions,
}

impl Session {
    /// Build a session with the real HTTP collaborators from config.
    pub fn new(config: Config) -> Self {
        let fetcher: Arc<dyn ImageFetcher> = Arc::new(HttpFetcher::new());
        let lookup: Arc<dyn ProductLookup> = Arc::new(HttpLookup::new(&config.lookup.base_url));
        let describer: Arc<dyn Describer> = Arc::new(ChatDescriber::from_config(&config.ai));
        let generator: Arc<dyn Generator> = Arc::new(HttpGenerator::from_config(&config.ai));
        let uploader: Arc<dyn CatalogUploader> = Arc::new(HttpUploader::new());
        Self::with_collaborators(config, fetcher, lookup, describer, generator, uploader)
    }

    /// Build a session with explicit collaborators.
    pub fn with_collaborators(
        config: Config,
        fetcher: Arc<dyn ImageFetcher>,
        lookup: Arc<dyn ProductLookup>,
        describer: Arc<dyn Describer>,
        generator: Arc<dyn Generator>,
        uploader: Arc<dyn CatalogUploader>,
    ) -> Self {
        Self {
            config,
            store: AssetStore::new(),
            registry: HandleRegistry::new(),
            ingestor: Ingestor::new(fetcher, lookup),
            actions: Actions::new(describer, generator, uploader),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Ingest a product's images from its storefront page URL.
    pub async fn search(&mut self, page_url: &str) -> Result<usize, PipelineError> {
        self.ingestor
            .ingest_remote(&mut self.store, &mut self.registry, page_url)
            .await
    }

    /// Ingest a batch of local image files.
    pub async fn ingest_files(&mut self, paths: Vec<PathBuf>) -> Result<usize, PipelineError> {
        self.ingestor
            .ingest_local(&mut self.store, &mut self.registry, paths)
            .await
    }

    pub async fn rename_one(&mut self, id: RecordId) -> Result<(), PipelineError> {
        self.actions.rename_one(&mut self.store, id).await
    }

    pub async fn rename_all(&mut self) -> usize {
        self.actions.rename_all(&mut self.store).await
    }

    pub async fn generate_variation(
        &mut self,
        prompt: &str,
        reference: Option<RecordId>,
    ) -> Result<RecordId, PipelineError> {
        self.actions
            .generate_variation(&mut self.store, &mut self.registry, prompt, reference)
            .await
    }

    /// Replace a record's image with freshly edited bytes. The prior
    /// display handle is released only after the new bytes normalize;
    /// a failed edit leaves the record untouched.
    pub async fn apply_edit(&mut self, id: RecordId, raw: Vec<u8>) -> Result<(), PipelineError> {
        let Some(prior_status) = self.store.record(id).map(|r| r.status) else {
            return Ok(());
        };
        self.store
            .update(id, |r| r.status = RecordStatus::Converting);

        let settled = tokio::task::spawn_blocking(move || normalize_bytes(&raw))
            .await
            .map_err(|e| ConversionError::Decode(e.to_string()))
            .and_then(|inner| inner.map_err(Into::into));
        let image = match settled {
            Ok(image) => image,
            Err(err) => {
                self.store.update(id, |r| r.status = prior_status);
                return Err(err.into());
            }
        };

        if !install_buffer(&mut self.store, &mut self.registry, id, image) {
            tracing::warn!(record = %id, "edited record no longer exists, discarding result");
        }
        Ok(())
    }

    pub fn toggle_select(&mut self, id: RecordId) {
        self.store.toggle_select(id);
    }

    pub fn select_all_or_none(&mut self) {
        self.store.select_all_or_none();
    }

    /// Bundle the in-scope records into a zip archive.
    pub fn export_zip(&self, path: &Path) -> Result<usize, PipelineError> {
        let records = self.scope_records();
        export::write_zip(&records, path)
    }

    /// Write one record to a directory under its derived filename.
    pub fn download_one(
        &self,
        id: RecordId,
        dir: &Path,
    ) -> Result<Option<PathBuf>, PipelineError> {
        match self.store.record(id) {
            Some(record) => export::write_single(record, dir),
            None => Ok(None),
        }
    }

    /// Write every in-scope record to a directory.
    pub fn download_all(&self, dir: &Path) -> Result<usize, PipelineError> {
        let mut written = 0;
        for record in self.scope_records() {
            if export::write_single(record, dir)?.is_some() {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Push the in-scope records to the catalog, sequentially.
    pub async fn push_to_catalog(&mut self) -> Result<UploadReport, PipelineError> {
        self.actions
            .upload_all(&self.store, self.config.credentials.as_ref())
            .await
    }

    fn scope_records(&self) -> Vec<&ImageRecord> {
        self.store
            .scope()
            .into_iter()
            .filter_map(|id| self.store.record(id))
            .collect()
    }
}
