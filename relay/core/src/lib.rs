//! Relay Core - Streaming Completion Relay for the Tutor and Artifact Demos
//!
//! This crate holds everything between an inbound turn and the upstream
//! completion API, independent of any HTTP server or terminal UI. The daemon
//! puts an axum surface on top of it; the TUI uses its data model.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  POST   ┌──────────────────────────────────────────────┐
//! │    Client    │────────▶│                 RELAY CORE                    │
//! │   (tutor /   │         │  ┌────────────┐   ┌─────────────────────┐    │
//! │  artifacts)  │         │  │  Request   │──▶│  CompletionBackend  │────┼──▶ upstream
//! │              │         │  │ Translator │   │  (chat-completions) │◀───┼─── SSE deltas
//! │              │         │  └────────────┘   └──────────┬──────────┘    │
//! │              │ stream  │                   ┌──────────▼──────────┐    │
//! │              │◀────────┼───────────────────│     StreamRelay     │    │
//! └──────────────┘         │                   └─────────────────────┘    │
//!                          └──────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`RequestTranslator`]: Turns prompts and edit instructions into upstream requests
//! - [`CompletionBackend`]: Upstream completion API (streaming and one-shot)
//! - [`DeltaStream`]: Lazy, finite, non-restartable sequence of text deltas
//! - [`StreamRelay`]: Re-emits deltas downstream with an explicit lifecycle
//! - [`ThreadStore`]: Per-thread history resent to the stateless upstream
//! - [`Conversation`]: Client-side ordered turns with durable [`PersistedState`]
//! - [`RelayError`]: Every failure kind that can cross the relay boundary
//!
//! # Quick Start
//!
//! ```ignore
//! use relay_core::{
//!     backend::{build_http_client, ChatCompletionsBackend, CompletionBackend},
//!     RelayConfig, RequestTranslator, StreamRelay, ThreadId, ResponseId, Turn,
//! };
//!
//! let config = RelayConfig::from_env();
//! let http = build_http_client(config.connect_timeout())?;
//! let backend = ChatCompletionsBackend::new(config.chat_endpoint()?, http);
//!
//! let thread_id = ThreadId::new();
//! let request = RequestTranslator::new(&config).chat(
//!     &Turn::user("Explain photosynthesis"),
//!     &[],
//!     &thread_id,
//!     &ResponseId::new(),
//! )?;
//!
//! let relay = StreamRelay::new(backend.send_streaming(&request).await?, thread_id.as_str());
//! // hand `relay` to the HTTP layer as the response body
//! ```
//!
//! # No Server or UI Dependencies
//!
//! This crate does not depend on axum, ratatui or crossterm.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod artifact;
pub mod backend;
pub mod config;
pub mod conversation;
pub mod error;
pub mod messages;
pub mod prompts;
pub mod relay;
pub mod threads;
pub mod translator;

pub use artifact::{ArtifactDocument, ArtifactType};
pub use backend::{CompletionBackend, CompletionRequest, DeltaStream, StreamingToken};
pub use config::RelayConfig;
pub use conversation::{Conversation, PersistedState};
pub use error::{RelayError, RelayResult};
pub use messages::{ArtifactId, ResponseId, Role, ThreadId, Turn, TurnId};
pub use relay::{StreamRelay, StreamSession, StreamState};
pub use threads::ThreadStore;
pub use translator::{validate_content, RequestTranslator};
