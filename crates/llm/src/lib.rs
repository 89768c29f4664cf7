#![deny(unsafe_code)]

mod gemini;
mod model;
mod provider;
mod session;
mod sse;
/// Wire format of the generative language API.
pub mod wire;

pub use gemini::GeminiClient;
pub use model::{
    CHAT_SEED_ACKNOWLEDGEMENT, CHAT_SEED_PROMPT, CHAT_SYSTEM_INSTRUCTION, DEFAULT_CHAT_MODEL,
    DEFAULT_ENDPOINT, DEFAULT_REVIEW_MODEL,
};
pub use provider::{
    BoxFuture, ChatBackend, ChatFragment, FragmentStream, InlineDocument, ProviderConfig,
    ProviderError, ProviderResult, ReviewBackend, StructuredRequest,
};
pub use session::{ChatBootstrap, GeminiChat, bootstrap_chat, scripted_stream, seeded_history};
pub use sse::fragment_stream;
