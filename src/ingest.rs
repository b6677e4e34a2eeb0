//! Ingestion orchestration: fan a batch of raw inputs through the
//! normalizer concurrently, isolate per-item failures, and commit the
//! survivors into the store as one batch.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;

use crate::error::{ConversionError, LookupError, PipelineError};
use crate::export::sanitize_stem;
use crate::handles::HandleRegistry;
use crate::lookup::{extract_product_id, ProductLookup};
use crate::normalize::{normalize_file, normalize_remote, ImageFetcher, NormalizedImage};
use crate::record::{ImageRecord, SourceKind};
use crate::store::{AssetStore, PipelineState};

/// Runs ingestion requests against the store. Holds the remote-fetch
/// and product-lookup collaborators.
pub struct Ingestor {
    fetcher: Arc<dyn ImageFetcher>,
    lookup: Arc<dyn ProductLookup>,
}

impl Ingestor {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, lookup: Arc<dyn ProductLookup>) -> Self {
        Self { fetcher, lookup }
    }

    /// Ingest a product by storefront page URL: resolve the product id,
    /// fetch its image list, normalize every image concurrently, and
    /// commit the surviving records.
    ///
    /// Lookup failure and zero survivors are fatal; an individual image
    /// that fails conversion is dropped without affecting its siblings.
    /// Surviving records keep the relative order of the source list and
    /// are auto-named `{productId}` then `{productId}_{i}` by surviving
    /// position.
    pub async fn ingest_remote(
        &self,
        store: &mut AssetStore,
        registry: &mut HandleRegistry,
        page_url: &str,
    ) -> Result<usize, PipelineError> {
        let token = store.begin_ingest(PipelineState::FetchingInfo);

        let product_id = match extract_product_id(page_url) {
            Some(id) => id,
            None => {
                let err = LookupError::ProductNotFound;
                store.fail_ingest(token, err.to_string());
                return Err(err.into());
            }
        };
        tracing::info!(product_id = %product_id, "resolving product");

        let lookup = Arc::clone(&self.lookup);
        let id_for_task = product_id.clone();
        let info = match tokio::task::spawn_blocking(move || lookup.fetch_product(&id_for_task))
            .await
        {
            Ok(Ok(info)) => info,
            Ok(Err(err)) => {
                store.fail_ingest(token, err.to_string());
                return Err(err.into());
            }
            Err(join_err) => {
                let err = LookupError::Request(join_err.to_string());
                store.fail_ingest(token, err.to_string());
                return Err(err.into());
            }
        };

        store.set_product(token, &info.display_name, &product_id);
        store.advance(token, PipelineState::Converting);

        let survivors = settle_remote(Arc::clone(&self.fetcher), info.image_urls).await;
        if survivors.is_empty() {
            let err = ConversionError::NoUsableImages;
            store.fail_ingest(token, err.to_string());
            return Err(err.into());
        }

        if !store.is_current(token) {
            tracing::warn!("ingestion superseded before commit, dropping batch");
            return Ok(0);
        }

        let records: Vec<ImageRecord> = survivors
            .into_iter()
            .enumerate()
            .map(|(index, (url, image))| {
                let name = if index == 0 {
                    product_id.clone()
                } else {
                    format!("{product_id}_{index}")
                };
                ImageRecord::from_normalized(
                    registry,
                    SourceKind::RemoteFetch,
                    url,
                    image,
                    Some(name),
                )
            })
            .collect();

        let count = records.len();
        store.commit_ingest(token, records);
        Ok(count)
    }

    /// Ingest a batch of local files, concurrently. Names come from the
    /// sanitized file stem. Same isolation and survivor rules as the
    /// remote case.
    pub async fn ingest_local(
        &self,
        store: &mut AssetStore,
        registry: &mut HandleRegistry,
        paths: Vec<PathBuf>,
    ) -> Result<usize, PipelineError> {
        let token = store.begin_ingest(PipelineState::Converting);
        store.set_product(token, "Local files", "");

        let survivors = settle_local(paths).await;
        if survivors.is_empty() {
            let err = ConversionError::NoUsableImages;
            store.fail_ingest(token, err.to_string());
            return Err(err.into());
        }

        if !store.is_current(token) {
            tracing::warn!("ingestion superseded before commit, dropping batch");
            return Ok(0);
        }

        let records: Vec<ImageRecord> = survivors
            .into_iter()
            .map(|(path, image)| {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.to_string_lossy().to_string());
                ImageRecord::from_normalized(
                    registry,
                    SourceKind::LocalUpload,
                    path.display().to_string(),
                    image,
                    Some(sanitize_stem(&stem)),
                )
            })
            .collect();

        let count = records.len();
        store.commit_ingest(token, records);
        Ok(count)
    }
}

/// Normalize every URL concurrently; a failed slot is logged and
/// dropped. Survivors come back in source order.
async fn settle_remote(
    fetcher: Arc<dyn ImageFetcher>,
    urls: Vec<String>,
) -> Vec<(String, NormalizedImage)> {
    let tasks: Vec<_> = urls
        .into_iter()
        .map(|url| {
            let fetcher = Arc::clone(&fetcher);
            tokio::task::spawn_blocking(move || match normalize_remote(fetcher.as_ref(), &url) {
                Ok(image) => Some((url, image)),
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "dropping image that failed conversion");
                    None
                }
            })
        })
        .collect();

    join_all(tasks)
        .await
        .into_iter()
        .filter_map(|settled| settled.ok().flatten())
        .collect()
}

async fn settle_local(paths: Vec<PathBuf>) -> Vec<(PathBuf, NormalizedImage)> {
    let tasks: Vec<_> = paths
        .into_iter()
        .map(|path| {
            tokio::task::spawn_blocking(move || match normalize_file(&path) {
                Ok(image) => Some((path, image)),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "dropping file that failed conversion");
                    None
                }
            })
        })
        .collect();

    join_all(tasks)
        .await
        .into_iter()
        .filter_map(|settled| settled.ok().flatten())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::ProductInfo;
    use crate::normalize::test_support::sample_png;
    use crate::record::RecordStatus;
    use std::collections::HashMap;

    struct MapFetcher(HashMap<String, Vec<u8>>);

    impl ImageFetcher for MapFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, ConversionError> {
            self.0.get(url).cloned().ok_or_else(|| ConversionError::Fetch {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    struct FixedLookup(Result<ProductInfo, String>);

    impl ProductLookup for FixedLookup {
        fn fetch_product(&self, _product_id: &str) -> Result<ProductInfo, LookupError> {
            self.0
                .clone()
                .map_err(LookupError::Request)
        }
    }

    fn ingestor(
        images: &[(&str, Vec<u8>)],
        lookup: Result<ProductInfo, String>,
    ) -> Ingestor {
        let map: HashMap<String, Vec<u8>> = images
            .iter()
            .map(|(url, bytes)| (url.to_string(), bytes.clone()))
            .collect();
        Ingestor::new(Arc::new(MapFetcher(map)), Arc::new(FixedLookup(lookup)))
    }

    fn product(urls: &[&str]) -> ProductInfo {
        ProductInfo {
            display_name: "Zapatilla Urbana".to_string(),
            image_urls: urls.iter().map(|u| u.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn failed_conversions_are_dropped_and_survivors_renumbered() {
        // three references, the second one fails to fetch
        let good = sample_png(4, 4);
        let ing = ingestor(
            &[("https://img/a", good.clone()), ("https://img/c", good.clone())],
            Ok(product(&["https://img/a", "https://img/b", "https://img/c"])),
        );
        let mut store = AssetStore::new();
        let mut registry = HandleRegistry::new();

        let count = ing
            .ingest_remote(&mut store, &mut registry, "https://shop/zapatilla-2103415/p")
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(store.state(), &PipelineState::Complete);
        let names: Vec<_> = store
            .records()
            .iter()
            .map(|r| r.suggested_name.clone().unwrap())
            .collect();
        // index reflects surviving position, not the original slot
        assert_eq!(names, vec!["2103415", "2103415_1"]);
        let refs: Vec<_> = store
            .records()
            .iter()
            .map(|r| r.original_reference.clone())
            .collect();
        assert_eq!(refs, vec!["https://img/a", "https://img/c"]);
        assert!(store
            .records()
            .iter()
            .all(|r| r.status == RecordStatus::Success && r.has_buffer()));
        assert_eq!(registry.live_count(), 2);
        assert_eq!(store.product_name(), "Zapatilla Urbana");
        assert_eq!(store.current_sku(), "2103415");
    }

    #[tokio::test]
    async fn zero_survivors_fail_the_request() {
        let ing = ingestor(&[], Ok(product(&["https://img/a", "https://img/b"])));
        let mut store = AssetStore::new();
        let mut registry = HandleRegistry::new();

        let err = ing
            .ingest_remote(&mut store, &mut registry, "2103415")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Conversion(ConversionError::NoUsableImages)
        ));
        assert!(store.records().is_empty());
        assert_eq!(
            store.state(),
            &PipelineState::Error("no usable images".to_string())
        );
    }

    #[tokio::test]
    async fn lookup_failure_is_fatal_with_no_partial_batch() {
        let ing = ingestor(&[], Err("service unavailable".to_string()));
        let mut store = AssetStore::new();
        let mut registry = HandleRegistry::new();

        let err = ing
            .ingest_remote(&mut store, &mut registry, "2103415")
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Lookup(_)));
        assert!(store.records().is_empty());
        assert!(matches!(store.state(), PipelineState::Error(_)));
    }

    #[tokio::test]
    async fn unresolvable_page_url_is_a_lookup_error() {
        let ing = ingestor(&[], Ok(product(&[])));
        let mut store = AssetStore::new();
        let mut registry = HandleRegistry::new();

        let err = ing
            .ingest_remote(&mut store, &mut registry, "https://shop/camisa/p")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Lookup(LookupError::ProductNotFound)
        ));
    }

    #[tokio::test]
    async fn local_files_get_sanitized_stems() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("Summer Photo.png");
        std::fs::write(&good, sample_png(3, 3)).unwrap();
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"garbage").unwrap();

        let ing = ingestor(&[], Ok(product(&[])));
        let mut store = AssetStore::new();
        let mut registry = HandleRegistry::new();

        let count = ing
            .ingest_local(&mut store, &mut registry, vec![good, broken])
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(
            store.records()[0].suggested_name.as_deref(),
            Some("summer-photo")
        );
        assert_eq!(store.records()[0].source_kind, SourceKind::LocalUpload);
        assert_eq!(store.product_name(), "Local files");
    }

    #[tokio::test]
    async fn all_local_files_failing_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.bin");
        std::fs::write(&broken, b"garbage").unwrap();

        let ing = ingestor(&[], Ok(product(&[])));
        let mut store = AssetStore::new();
        let mut registry = HandleRegistry::new();

        let err = ing
            .ingest_local(&mut store, &mut registry, vec![broken])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Conversion(ConversionError::NoUsableImages)
        ));
        assert!(matches!(store.state(), PipelineState::Error(_)));
    }
}
