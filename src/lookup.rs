//! Product lookup: turn a storefront page URL into a product id, and a
//! product id into its display name and raw image URL list.

use std::time::Duration;

use serde::Deserialize;

use crate::error::LookupError;

/// Extract a product id from a storefront page URL.
///
/// Recognized forms, in order: an explicit id query parameter
/// (`skuId`, `idsku`, `productId`), a bare numeric id, and otherwise
/// the last run of four or more digits in the URL path (shorter runs
/// are sizes and variant counters, not ids).
pub fn extract_product_id(page_url: &str) -> Option<String> {
    let trimmed = page_url.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Some(trimmed.to_string());
    }

    if let Some(query) = trimmed.split('?').nth(1) {
        for pair in query.split('&') {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or("");
            if matches!(key, "skuId" | "idsku" | "productId") {
                if let Some(value) = parts.next() {
                    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }

    let path = trimmed.split('?').next().unwrap_or(trimmed);
    let mut best: Option<String> = None;
    let mut run = String::new();
    for c in path.chars() {
        if c.is_ascii_digit() {
            run.push(c);
        } else {
            if run.len() >= 4 {
                best = Some(run.clone());
            }
            run.clear();
        }
    }
    if run.len() >= 4 {
        best = Some(run);
    }
    best
}

/// A product's display name and its raw image references, in catalog
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInfo {
    pub display_name: String,
    pub image_urls: Vec<String>,
}

/// Collaborator that resolves a product id into its image list.
pub trait ProductLookup: Send + Sync {
    fn fetch_product(&self, product_id: &str) -> Result<ProductInfo, LookupError>;
}

#[derive(Debug, Deserialize)]
struct SearchProduct {
    #[serde(rename = "productName")]
    product_name: String,
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    images: Vec<SearchImage>,
}

#[derive(Debug, Deserialize)]
struct SearchImage {
    #[serde(rename = "imageUrl")]
    image_url: String,
}

/// Looks products up through the storefront's public search API.
pub struct HttpLookup {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpLookup {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(30))
                .build(),
        }
    }
}

impl ProductLookup for HttpLookup {
    fn fetch_product(&self, product_id: &str) -> Result<ProductInfo, LookupError> {
        let url = format!(
            "{}/api/catalog_system/pub/products/search?fq=productId:{}",
            self.base_url, product_id
        );

        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| LookupError::Request(e.to_string()))?;

        let products: Vec<SearchProduct> = response
            .into_json()
            .map_err(|e| LookupError::Malformed(e.to_string()))?;

        let product = products.into_iter().next().ok_or(LookupError::ProductNotFound)?;

        // SKU variants often share art; keep the first occurrence of
        // each URL in catalog order.
        let mut seen = std::collections::HashSet::new();
        let image_urls: Vec<String> = product
            .items
            .iter()
            .flat_map(|item| item.images.iter().map(|img| img.image_url.clone()))
            .filter(|url| seen.insert(url.clone()))
            .collect();

        Ok(ProductInfo {
            display_name: product.product_name,
            image_urls,
        })
    }
}
