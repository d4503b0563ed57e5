//! Selfie verification client
//!
//! One multipart upload per identity. The service answers with a gender
//! label which the caller caches; this is never asked twice.

use std::path::Path;

use pairup_core::{Gender, Identity};
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{Error, Result};

/// Smallest image the service accepts
pub const MIN_IMAGE_BYTES: usize = 1024;

/// Largest image the service accepts
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    gender: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Outcome of a verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub gender: Gender,
    pub message: Option<String>,
}

/// Content type for a selfie file, judged by extension
pub fn image_mime(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => Ok("image/jpeg"),
        Some("png") => Ok("image/png"),
        Some("webp") => Ok("image/webp"),
        _ => Err(Error::Verification(
            "Invalid file type. Only JPEG, PNG, and WebP are allowed.".into(),
        )),
    }
}

/// Size limits, checked before anything is uploaded
pub fn check_image_size(len: usize) -> Result<()> {
    if len < MIN_IMAGE_BYTES {
        return Err(Error::Verification("File too small".into()));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(Error::Verification("File too large. Maximum size is 10MB.".into()));
    }
    Ok(())
}

/// HTTP client for the verification endpoint
pub struct VerifyClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl VerifyClient {
    /// `endpoint` is the full verify URL, e.g. `http://localhost:8000/verify`
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| Error::InvalidUrl(format!("{endpoint}: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
        })
    }

    /// Read a selfie from disk and verify it
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn verify_file(&self, identity: &Identity, path: &Path) -> Result<Verification> {
        let mime = image_mime(path)?;
        let image = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("selfie")
            .to_string();
        self.verify(identity, image, file_name, mime).await
    }

    /// Upload one image and return the classified gender
    pub async fn verify(
        &self,
        identity: &Identity,
        image: Vec<u8>,
        file_name: String,
        mime: &str,
    ) -> Result<Verification> {
        check_image_size(image.len())?;

        let part = Part::bytes(image).file_name(file_name).mime_str(mime)?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoint.clone())
            .query(&[("device_id", identity.as_str())])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.detail)
                .unwrap_or_else(|_| format!("verification service returned {status}"));
            return Err(Error::Verification(detail));
        }

        let body: VerifyResponse = response.json().await?;
        let gender = Gender::from_label(&body.gender);
        info!(gender = %gender, "Verification complete");

        Ok(Verification {
            gender,
            message: body.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_mime() {
        assert_eq!(image_mime(Path::new("me.JPG")).unwrap(), "image/jpeg");
        assert_eq!(image_mime(Path::new("me.webp")).unwrap(), "image/webp");
        assert!(image_mime(Path::new("me.gif")).is_err());
        assert!(image_mime(Path::new("selfie")).is_err());
    }

    #[test]
    fn test_image_size_bounds() {
        assert!(check_image_size(MIN_IMAGE_BYTES - 1).is_err());
        assert!(check_image_size(MIN_IMAGE_BYTES).is_ok());
        assert!(check_image_size(MAX_IMAGE_BYTES).is_ok());
        assert!(check_image_size(MAX_IMAGE_BYTES + 1).is_err());
    }

    #[tokio::test]
    async fn test_tiny_image_rejected_before_upload() {
        // unroutable endpoint: the size check must fail first
        let client = VerifyClient::new("http://127.0.0.1:9/verify").unwrap();
        let result = client
            .verify(&Identity::new("me"), vec![0u8; 10], "a.png".into(), "image/png")
            .await;
        assert!(matches!(result, Err(Error::Verification(_))));
    }
}
