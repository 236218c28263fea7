use async_trait::async_trait;
use image::GenericImageView;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("capture request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("capture service returned {status}: {body}")]
    Service { status: u16, body: String },
    #[error("capture produced an unreadable image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("capture timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterOptions {
    pub scale: u8,
    pub use_cors: bool,
    pub background_color: String,
    pub logging: bool,
}

impl RasterOptions {
    /// Print quality capture used for the PDF.
    pub fn print() -> Self {
        Self {
            scale: 2,
            use_cors: true,
            background_color: "#ffffff".to_string(),
            logging: false,
        }
    }

    pub fn fallback() -> Self {
        Self {
            scale: 1,
            ..Self::print()
        }
    }
}

/// Rendered markup of the certificate region to capture.
#[derive(Debug, Clone)]
pub struct CaptureTarget {
    pub html: String,
    /// Base URL for resolving relative image and stylesheet references.
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Bitmap {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Bitmap {
    pub fn from_png(png: Vec<u8>) -> Result<Self, RasterError> {
        let (width, height) = image::load_from_memory(&png)?.dimensions();
        Ok(Self { png, width, height })
    }
}

#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn capture(
        &self,
        target: &CaptureTarget,
        options: &RasterOptions,
    ) -> Result<Bitmap, RasterError>;
}

#[derive(Debug, Serialize)]
struct CaptureRequest<'a> {
    html: &'a str,
    base_url: &'a str,
    #[serde(flatten)]
    options: &'a RasterOptions,
}

/// Client for an HTML-to-PNG capture service.
pub struct HttpRasterizer {
    client: Client,
    endpoint: String,
}

impl HttpRasterizer {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, RasterError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Rasterizer for HttpRasterizer {
    async fn capture(
        &self,
        target: &CaptureTarget,
        options: &RasterOptions,
    ) -> Result<Bitmap, RasterError> {
        info!(scale = options.scale, bytes = target.html.len(), "capturing certificate");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&CaptureRequest {
                html: &target.html,
                base_url: &target.base_url,
                options,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RasterError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let png = response.bytes().await?.to_vec();
        Bitmap::from_png(png)
    }
}
