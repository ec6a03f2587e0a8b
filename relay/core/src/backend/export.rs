//! PDF Export Passthrough
//!
//! Forwards an opaque export parameter value to the provider's PDF endpoint and
//! hands the binary body back as a byte stream.

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::warn;

use super::traits::UpstreamEndpoint;
use crate::error::{RelayError, RelayResult};

/// Filename advertised to browsers when none is supplied
pub const DEFAULT_PDF_FILENAME: &str = "artifact.pdf";

/// Streamed PDF body
pub type PdfStream = BoxStream<'static, RelayResult<Vec<u8>>>;

/// Client for the PDF export endpoint
#[derive(Clone)]
pub struct PdfExporter {
    endpoint: UpstreamEndpoint,
    http_client: reqwest::Client,
}

impl PdfExporter {
    /// Create an exporter; `endpoint.base_url` is the full export URL
    #[must_use]
    pub fn new(endpoint: UpstreamEndpoint, http_client: reqwest::Client) -> Self {
        Self {
            endpoint,
            http_client,
        }
    }

    /// Request a PDF for the given export parameters
    ///
    /// Any failure, including a non-2xx status, is reported as
    /// [`RelayError::ExportFailed`] carrying the upstream status text.
    pub async fn export(&self, export_params: &serde_json::Value) -> RelayResult<PdfStream> {
        let response = self
            .http_client
            .post(&self.endpoint.base_url)
            .bearer_auth(&self.endpoint.api_key)
            .json(&serde_json::json!({ "exportParams": export_params }))
            .send()
            .await
            .map_err(|e| RelayError::ExportFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("unknown status");
            warn!(status = status.as_u16(), reason, "PDF export rejected upstream");
            return Err(RelayError::ExportFailed(reason.to_string()));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| RelayError::ExportFailed(e.to_string()))
            })
            .boxed())
    }
}
