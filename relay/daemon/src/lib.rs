//! Relay Daemon
//!
//! HTTP surface for the relay core. The tutor chat and the artifact generator
//! talk to this daemon; it forwards their requests upstream and streams the
//! responses back.
//!
//! The binary (`relay-daemon`) only parses flags, sets up logging and serves
//! [`router`]; everything a test needs is exported from here.

pub mod error;
pub mod server;

pub use error::ApiError;
pub use server::{router, AppState, ARTIFACT_ID_HEADER, THREAD_ID_HEADER};
