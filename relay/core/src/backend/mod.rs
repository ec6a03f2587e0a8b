//! Upstream Completion Backend
//!
//! Access to the external completion API through a common trait, so the relay
//! logic does not depend on a specific transport library.
//!
//! # Usage
//!
//! ```ignore
//! use relay_core::backend::{ChatCompletionsBackend, CompletionBackend, CompletionRequest};
//!
//! let backend = ChatCompletionsBackend::new(config.chat_endpoint()?, http_client);
//! let deltas = backend.send_streaming(&request).await?;
//! ```

mod chat_completions;
mod export;
mod stream;
mod traits;

pub use chat_completions::{build_http_client, ChatCompletionsBackend};
pub use export::{PdfExporter, PdfStream, DEFAULT_PDF_FILENAME};
pub use stream::DeltaStream;
pub use traits::{
    CompletionBackend, CompletionRequest, CompletionResponse, StreamingToken, UpstreamEndpoint,
    UpstreamMessage,
};
