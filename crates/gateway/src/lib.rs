//! `lt-gateway`: the LexTutor HTTP server.
//!
//! Wires identity, context retrieval, the completion orchestrator and the
//! conversation store behind an axum router. The binary (`lextutor`) lives
//! in `main.rs`; everything here is reusable from tests.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod identity;
pub mod runtime;
pub mod state;
pub mod transcription;
