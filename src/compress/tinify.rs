//! TinyPNG (tinify) API client.
//!
//! Uploads the raw image to `/shrink`, then downloads the compressed result
//! from the `output.url` the service returns.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::{CompressionError, CompressionResult, Compressor};
use crate::config::CompressionConfig;

/// Extensions the service accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

const COMPRESSION_COUNT_HEADER: &str = "Compression-Count";

#[derive(Debug, Deserialize)]
struct ShrinkResponse {
    output: ShrinkOutput,
}

#[derive(Debug, Deserialize)]
struct ShrinkOutput {
    url: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the TinyPNG API.
#[derive(Debug)]
pub struct TinifyClient {
    http_client: Client,
    endpoint: String,
    api_key: String,
    compression_count: Mutex<Option<u64>>,
}

impl TinifyClient {
    /// Creates a client from the compression settings. Fails without an API key.
    pub fn new(config: &CompressionConfig) -> CompressionResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(CompressionError::MissingApiKey)?;
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(http_client, &config.endpoint, &api_key))
    }

    /// Creates a client with a custom `reqwest::Client`.
    pub fn with_client(client: Client, endpoint: &str, api_key: &str) -> Self {
        Self {
            http_client: client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            compression_count: Mutex::new(None),
        }
    }

    fn add_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.basic_auth("api", Some(&self.api_key))
    }

    fn record_count(&self, response: &Response) {
        let count = response
            .headers()
            .get(COMPRESSION_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        if let (Some(count), Ok(mut slot)) = (count, self.compression_count.lock()) {
            *slot = Some(count);
        }
    }
}

/// Map an unsuccessful response to a typed error.
async fn error_from(response: Response) -> CompressionError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body
        .message
        .or(body.error)
        .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text });

    match status {
        StatusCode::UNAUTHORIZED => CompressionError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS => CompressionError::QuotaExceeded(message),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => CompressionError::UnsupportedFormat(message),
        _ => CompressionError::Service {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl Compressor for TinifyClient {
    async fn compress(&self, data: Vec<u8>, file_name: &str) -> CompressionResult<Vec<u8>> {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(CompressionError::UnsupportedFormat(format!(
                "{} (supported: {})",
                file_name,
                SUPPORTED_EXTENSIONS.join(", ")
            )));
        }

        let url = format!("{}/shrink", self.endpoint);
        let builder = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data);
        let response = self.add_auth(builder).send().await?;
        self.record_count(&response);
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }

        let shrink: ShrinkResponse = response.json().await?;
        tracing::debug!(
            "{} shrunk to {} bytes",
            file_name,
            shrink
                .output
                .size
                .map_or_else(|| "?".to_string(), |s| s.to_string())
        );

        let builder = self.http_client.get(&shrink.output.url);
        let download = self.add_auth(builder).send().await?;
        if !download.status().is_success() {
            return Err(error_from(download).await);
        }
        Ok(download.bytes().await?.to_vec())
    }

    fn compression_count(&self) -> Option<u64> {
        self.compression_count.lock().ok().and_then(|slot| *slot)
    }
}
