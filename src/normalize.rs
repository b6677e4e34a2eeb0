//! Image normalization: any supported input format in, a
//! quality-controlled JPEG of known dimensions out.
//!
//! Downstream consumers never branch on the source format; everything
//! past this point is the canonical encoding.

use std::io::{Cursor, Read};
use std::path::Path;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::GenericImageView;

use crate::error::ConversionError;

/// JPEG quality used for the canonical encoding.
pub const JPEG_QUALITY: u8 = 85;

/// A normalized image: canonical JPEG bytes plus pixel dimensions.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode any supported format and re-encode as JPEG.
///
/// Alpha channels are flattened since JPEG carries none.
pub fn normalize_bytes(input: &[u8]) -> Result<NormalizedImage, ConversionError> {
    if input.is_empty() {
        return Err(ConversionError::EmptyPayload);
    }

    let decoded = image::load_from_memory(input)
        .map_err(|e| ConversionError::Decode(e.to_string()))?;
    let (width, height) = decoded.dimensions();

    let flattened = image::DynamicImage::ImageRgb8(decoded.to_rgb8());
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    flattened
        .write_with_encoder(encoder)
        .map_err(|e| ConversionError::Encode(e.to_string()))?;

    Ok(NormalizedImage {
        bytes: buf.into_inner(),
        width,
        height,
    })
}

/// Normalize a local file.
pub fn normalize_file(path: &Path) -> Result<NormalizedImage, ConversionError> {
    let data = std::fs::read(path).map_err(|e| ConversionError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    normalize_bytes(&data)
}

/// Normalize a remote image reference via the given fetcher.
pub fn normalize_remote(
    fetcher: &dyn ImageFetcher,
    url: &str,
) -> Result<NormalizedImage, ConversionError> {
    let data = fetcher.fetch(url)?;
    normalize_bytes(&data)
}

/// Seam over the remote HTTP GET so ingestion fan-out is testable.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ConversionError>;
}

/// Fetches image bytes over HTTP.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(60))
                .build(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ConversionError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| ConversionError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let mut data = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut data)
            .map_err(|e| ConversionError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if data.is_empty() {
            return Err(ConversionError::EmptyPayload);
        }
        Ok(data)
    }
}
