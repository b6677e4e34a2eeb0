//! Catalog upload: pushes a record's buffer to the remote catalog's SKU
//! file endpoint.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;

use crate::config::CatalogCredentials;

/// Result of one upload call. Per-call outcome, never a batch verdict.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub success: bool,
    pub message: Option<String>,
}

impl UploadOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Collaborator that writes one image to the remote catalog.
pub trait CatalogUploader: Send + Sync {
    fn upload(
        &self,
        image: &[u8],
        filename: &str,
        sku_id: &str,
        credentials: &CatalogCredentials,
    ) -> UploadOutcome;
}

#[derive(Debug, Serialize)]
struct SkuFileRequest {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "IsMain")]
    is_main: bool,
    #[serde(rename = "File")]
    file: String,
}

/// Uploads through the catalog's private SKU file API, authenticated
/// with app key/token headers.
pub struct HttpUploader {
    agent: ureq::Agent,
}

impl HttpUploader {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(120))
                .build(),
        }
    }
}

impl Default for HttpUploader {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogUploader for HttpUploader {
    fn upload(
        &self,
        image: &[u8],
        filename: &str,
        sku_id: &str,
        credentials: &CatalogCredentials,
    ) -> UploadOutcome {
        let url = format!(
            "https://{}.{}.com.br/api/catalog2/pvt/stockkeepingunit/{}/file",
            credentials.account_name, credentials.environment, sku_id
        );

        let request = SkuFileRequest {
            name: filename.to_string(),
            is_main: false,
            file: BASE64.encode(image),
        };

        let result = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set("X-VTEX-API-AppKey", &credentials.app_key)
            .set("X-VTEX-API-AppToken", &credentials.app_token)
            .send_json(&request);

        match result {
            Ok(_) => UploadOutcome::ok(),
            Err(e) => UploadOutcome::failed(e.to_string()),
        }
    }
}
