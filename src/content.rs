//! Binary content handed to the vision model: images and PDFs.
//!
//! The orchestrator never decodes pixels. It only needs the bytes and a MIME
//! type the provider accepts, so this module sniffs the format from magic
//! bytes (`%PDF`, or whatever the `image` crate recognises) and rejects
//! anything a vision model cannot read before a single API call is spent.

use crate::error::ImgEditError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use std::path::PathBuf;
use tracing::{debug, info};

/// Already-decoded binary content plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl Content {
    /// Wrap bytes whose MIME type is already known.
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    /// Sniff the MIME type from magic bytes.
    ///
    /// Accepts PDF, PNG, JPEG, WebP and GIF.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImgEditError> {
        let mime = sniff_mime(&bytes).ok_or_else(|| ImgEditError::UnsupportedContent {
            source_name: "<bytes>".into(),
            detail: format!("unrecognised magic bytes {:02x?}", &bytes[..bytes.len().min(4)]),
        })?;
        Ok(Self::new(bytes, mime))
    }

    pub fn is_pdf(&self) -> bool {
        self.mime == "application/pdf"
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Base64 (standard alphabet) encoding for the provider request body.
    pub fn to_base64(&self) -> String {
        let b64 = STANDARD.encode(&self.bytes);
        debug!("Encoded {} → {} bytes base64", self.mime, b64.len());
        b64
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF") {
        return Some("application/pdf");
    }
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        _ => None,
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load content from a local path or an HTTP/HTTPS URL.
pub async fn load(input: &str, timeout_secs: u64) -> Result<Content, ImgEditError> {
    let (bytes, name) = if is_url(input) {
        (download_url(input, timeout_secs).await?, input.to_string())
    } else {
        (read_local(input).await?, input.to_string())
    };

    match sniff_mime(&bytes) {
        Some(mime) => {
            debug!("Loaded {} ({}, {} bytes)", name, mime, bytes.len());
            Ok(Content::new(bytes, mime))
        }
        None => Err(ImgEditError::UnsupportedContent {
            source_name: name,
            detail: "expected a PNG, JPEG, WebP, GIF or PDF file".into(),
        }),
    }
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, ImgEditError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ImgEditError::PermissionDenied { path })
        }
        Err(_) => Err(ImgEditError::FileNotFound { path }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, ImgEditError> {
    info!("Downloading content from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ImgEditError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ImgEditError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ImgEditError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ImgEditError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ImgEditError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10];

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/cat.png"));
        assert!(is_url("http://example.com/cat.png"));
        assert!(!is_url("/tmp/cat.png"));
        assert!(!is_url(""));
    }

    #[test]
    fn sniffs_pdf_and_images() {
        assert_eq!(sniff_mime(b"%PDF-1.7\n"), Some("application/pdf"));
        assert_eq!(sniff_mime(PNG_MAGIC), Some("image/png"));
        assert_eq!(sniff_mime(JPEG_MAGIC), Some("image/jpeg"));
        assert_eq!(sniff_mime(b"hello world"), None);
    }

    #[test]
    fn from_bytes_rejects_unknown() {
        let err = Content::from_bytes(b"plain text".to_vec()).unwrap_err();
        assert!(matches!(err, ImgEditError::UnsupportedContent { .. }));
    }

    #[test]
    fn base64_round_trips() {
        let c = Content::from_bytes(PNG_MAGIC.to_vec()).unwrap();
        let decoded = STANDARD.decode(c.to_base64()).expect("valid base64");
        assert_eq!(decoded, PNG_MAGIC);
        assert!(!c.is_pdf());
    }

    #[tokio::test]
    async fn load_local_pdf() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.4\n%fake").unwrap();
        let c = load(tmp.path().to_str().unwrap(), 5).await.unwrap();
        assert!(c.is_pdf());
    }

    #[tokio::test]
    async fn load_missing_file() {
        let err = load("/definitely/not/here.png", 5).await.unwrap_err();
        assert!(matches!(err, ImgEditError::FileNotFound { .. }));
    }
}
