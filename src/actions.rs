//! Selection-scoped batch actions: AI renaming, AI variation
//! generation, and the sequential catalog upload with its aggregation
//! policy.

use std::sync::Arc;

use crate::ai::{Describer, Generator};
use crate::config::CatalogCredentials;
use crate::error::{ConfigurationError, DescriptionError, GenerationError, PipelineError};
use crate::export::{archive_filename, prompt_slug};
use crate::handles::HandleRegistry;
use crate::normalize::normalize_bytes;
use crate::record::{ImageRecord, RecordId, SourceKind};
use crate::store::AssetStore;
use crate::upload::{CatalogUploader, UploadOutcome};

/// Prompt characters kept in a generated record's name stem.
const SLUG_PREFIX_LEN: usize = 20;

/// Aggregated outcome of one catalog upload run.
///
/// The run continues past individual failures; only the most recent
/// failure message is kept.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub last_error: Option<String>,
}

impl UploadReport {
    pub fn is_success(&self) -> bool {
        self.succeeded == self.attempted
    }

    /// Collapse the report into the overall verdict: success only when
    /// every in-scope item succeeded.
    pub fn into_result(self) -> Result<usize, PipelineError> {
        if self.is_success() {
            Ok(self.succeeded)
        } else {
            Err(crate::error::UploadError(
                self.last_error.unwrap_or_else(|| "unknown failure".to_string()),
            )
            .into())
        }
    }
}

/// Runs selection-scoped actions against the store. Holds the AI and
/// upload collaborators.
pub struct Actions {
    describer: Arc<dyn Describer>,
    generator: Arc<dyn Generator>,
    uploader: Arc<dyn CatalogUploader>,
}

impl Actions {
    pub fn new(
        describer: Arc<dyn Describer>,
        generator: Arc<dyn Generator>,
        uploader: Arc<dyn CatalogUploader>,
    ) -> Self {
        Self {
            describer,
            generator,
            uploader,
        }
    }

    /// AI-rename a single record. Does nothing for records without
    /// pixel data. The analyzing flag is cleared however the call ends.
    pub async fn rename_one(
        &self,
        store: &mut AssetStore,
        id: RecordId,
    ) -> Result<(), PipelineError> {
        let Some(buffer) = store.record(id).and_then(|r| r.buffer.clone()) else {
            return Ok(());
        };

        store.mark_analyzing(id);
        let describer = Arc::clone(&self.describer);
        let settled =
            tokio::task::spawn_blocking(move || describer.describe(&buffer)).await;
        store.clear_analyzing(id);

        match settled {
            Ok(Ok(name)) => {
                store.update(id, |r| r.suggested_name = Some(name.trim().to_string()));
                Ok(())
            }
            Ok(Err(err)) => Err(err.into()),
            Err(join_err) => Err(DescriptionError(join_err.to_string()).into()),
        }
    }

    /// AI-rename every in-scope record with pixel data, concurrently.
    /// A failed call leaves that record's name unchanged and never
    /// aborts its siblings. Returns how many records were renamed.
    pub async fn rename_all(&self, store: &mut AssetStore) -> usize {
        let targets: Vec<(RecordId, Vec<u8>)> = store
            .scope()
            .into_iter()
            .filter_map(|id| {
                store
                    .record(id)
                    .and_then(|r| r.buffer.clone().map(|buffer| (id, buffer)))
            })
            .collect();

        for (id, _) in &targets {
            store.mark_analyzing(*id);
        }

        // spawn_blocking starts every call immediately; the loop below
        // only collects results, clearing each flag as its call settles
        let tasks: Vec<_> = targets
            .into_iter()
            .map(|(id, buffer)| {
                let describer = Arc::clone(&self.describer);
                (
                    id,
                    tokio::task::spawn_blocking(move || describer.describe(&buffer)),
                )
            })
            .collect();

        let mut renamed = 0;
        for (id, task) in tasks {
            let settled = task.await;
            store.clear_analyzing(id);
            match settled {
                Ok(Ok(name)) => {
                    if store.update(id, |r| r.suggested_name = Some(name.trim().to_string())) {
                        renamed += 1;
                    }
                }
                Ok(Err(err)) => {
                    tracing::warn!(record = %id, error = %err, "keeping previous name after failed description");
                }
                Err(join_err) => {
                    tracing::warn!(record = %id, error = %join_err, "description task died");
                }
            }
        }
        tracing::info!(renamed, "AI rename pass finished");
        renamed
    }

    /// Generate a variant image, normalize it, and prepend it as a new
    /// record. The reference record, when given, seeds the generation
    /// with its buffer and dimensions.
    pub async fn generate_variation(
        &self,
        store: &mut AssetStore,
        registry: &mut HandleRegistry,
        prompt: &str,
        reference: Option<RecordId>,
    ) -> Result<RecordId, PipelineError> {
        let (ref_buffer, width, height) = match reference.and_then(|id| store.record(id)) {
            Some(record) => (
                record.buffer.clone(),
                Some(record.width),
                Some(record.height),
            ),
            None => (None, None, None),
        };

        let generator = Arc::clone(&self.generator);
        let prompt_owned = prompt.to_string();
        let raw = tokio::task::spawn_blocking(move || {
            generator.generate(&prompt_owned, ref_buffer.as_deref(), width, height)
        })
        .await
        .map_err(|e| GenerationError(e.to_string()))??;

        let image = tokio::task::spawn_blocking(move || normalize_bytes(&raw))
            .await
            .map_err(|e| GenerationError(e.to_string()))??;

        let name = format!("ai-{}", prompt_slug(prompt, SLUG_PREFIX_LEN));
        let record = ImageRecord::from_normalized(
            registry,
            SourceKind::AiGenerated,
            prompt.to_string(),
            image,
            Some(name),
        );
        let id = record.id;
        store.prepend(record);
        tracing::info!(record = %id, "generated variant added");
        Ok(id)
    }

    /// Upload every in-scope record with pixel data to the catalog,
    /// one at a time in scope order. The remote API does not guarantee
    /// safe concurrent writes to one product, so at most one call is in
    /// flight. The loop continues past failures and aggregates at the
    /// end.
    ///
    /// Missing credentials short-circuit before any network call.
    pub async fn upload_all(
        &self,
        store: &AssetStore,
        credentials: Option<&CatalogCredentials>,
    ) -> Result<UploadReport, PipelineError> {
        let credentials = credentials.ok_or(ConfigurationError::MissingCredentials)?;
        let sku_id = store.current_sku().to_string();

        let targets: Vec<(Vec<u8>, String)> = store
            .scope()
            .into_iter()
            .filter_map(|id| store.record(id))
            .filter_map(|record| {
                record
                    .buffer
                    .clone()
                    .map(|buffer| (buffer, archive_filename(record)))
            })
            .collect();

        let attempted = targets.len();
        let mut succeeded = 0;
        let mut last_error: Option<String> = None;

        for (buffer, filename) in targets {
            let uploader = Arc::clone(&self.uploader);
            let sku = sku_id.clone();
            let creds = credentials.clone();
            let name = filename.clone();
            let outcome =
                tokio::task::spawn_blocking(move || uploader.upload(&buffer, &name, &sku, &creds))
                    .await
                    .unwrap_or_else(|e| UploadOutcome::failed(e.to_string()));

            if outcome.success {
                succeeded += 1;
            } else {
                let message = outcome
                    .message
                    .unwrap_or_else(|| "unknown failure".to_string());
                tracing::warn!(file = %filename, error = %message, "upload failed, continuing");
                last_error = Some(message);
            }
        }

        tracing::info!(attempted, succeeded, "upload run finished");
        Ok(UploadReport {
            attempted,
            succeeded,
            last_error,
        })
    }
}
