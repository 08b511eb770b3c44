//! Shared types for every LexTutor crate: the error type, configuration,
//! prompt and conversation messages, principals, retry pacing, stream
//! events and structured trace events.

pub mod config;
pub mod error;
pub mod message;
pub mod principal;
pub mod retry;
pub mod stream;
pub mod trace;
