//! Completion orchestrator.
//!
//! [`run_turn`] takes an authenticated principal plus a message and
//! produces a stream of [`TurnEvent`]s suitable for a streamed body or a
//! single JSON reply.

pub mod prompt;
pub mod turn;

pub use turn::{run_turn, TurnEvent, TurnInput};
