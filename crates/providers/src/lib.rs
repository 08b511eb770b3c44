pub mod openai_compat;
pub mod speech;
pub mod traits;
pub(crate) mod sse;
pub(crate) mod util;

// Re-exports for convenience.
pub use openai_compat::OpenAiCompatProvider;
pub use speech::{AudioUpload, OpenAiTranscriber, SpeechToText};
pub use traits::{ChatRequest, ChatResponse, LlmProvider};
