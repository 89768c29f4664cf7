#![deny(unsafe_code)]

/// Streaming reply aggregation.
pub mod aggregator;
pub mod events;
pub mod input;
/// Message model and stream lifecycle state.
pub mod message;
pub mod transcript;

pub use aggregator::{
    APOLOGY_MESSAGE, DEFAULT_IDLE_TIMEOUT, StreamingMessageAggregator, UNAVAILABLE_MESSAGE,
};
pub use events::{PendingReply, RenderFrame, StreamEventMapped, StreamEventPayload};
pub use input::{InputBuffer, KeyInput};
pub use message::{
    Message, MessageId, MessageStatus, Role, StreamSessionId, StreamState, StreamTarget,
    StreamTransition, StreamTransitionRejection,
};
pub use transcript::{Transcript, WELCOME_MESSAGE};
