//! Tutor TUI - Terminal client for the tutor relay
//!
//! A full-screen chat with the tutor plus a headless artifact generator, both
//! talking to a running `relay-daemon`.
//!
//! # Architecture
//!
//! - **Client**: HTTP calls to the relay routes, raw body streams out
//! - **Consumer**: incremental UTF-8 decoding into one growing buffer
//! - **Scheduler**: coalescing hand-off of snapshots to the frame tick
//! - **Sessions**: tutor conversation and artifact state, persisted locally
//! - **App**: ratatui event loop, auto-scroll and rendering

pub mod app;
pub mod artifacts;
pub mod client;
pub mod config;
pub mod consumer;
pub mod decoder;
pub mod scheduler;
pub mod scroll;
pub mod store;
pub mod tutor;

pub use app::App;
pub use artifacts::{pdf_filename, ArtifactSession};
pub use client::{RelayBody, RelayClient};
pub use config::ClientConfig;
pub use consumer::{consume, ConsumeOutcome};
pub use decoder::Utf8StreamDecoder;
pub use scheduler::PublishScheduler;
pub use scroll::{AutoScrollPolicy, Viewport};
pub use store::StateStore;
pub use tutor::{PendingTurn, TutorSession};
