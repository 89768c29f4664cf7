use std::sync::{Arc, Weak};

use crate::message::{Message, StreamTarget, StreamTransition};

/// A reply accepted by `submit` and waiting for its stream.
///
/// Only the aggregator creates these, so holding one proves the placeholder exists.
/// Once every copy is dropped without reaching `stream_reply`, the aggregator
/// fails the placeholder and accepts new input again.
#[must_use = "pass the reply to `stream_reply`, or the placeholder is failed"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    target: StreamTarget,
    prompt: String,
    claim: Arc<()>,
}

impl PendingReply {
    pub(crate) fn new(target: StreamTarget, prompt: impl Into<String>) -> Self {
        Self {
            target,
            prompt: prompt.into(),
            claim: Arc::new(()),
        }
    }

    /// Stays upgradable while any copy of this reply is alive.
    pub(crate) fn claim(&self) -> Weak<()> {
        Arc::downgrade(&self.claim)
    }

    pub fn target(&self) -> StreamTarget {
        self.target
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub(crate) fn start_transition(&self) -> StreamTransition {
        StreamTransition::Start(self.target)
    }
}

/// Provider stream output mapped into chat domain language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventPayload {
    /// Everything received so far, not just the newest fragment.
    Accumulated(String),
    Done,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEventMapped {
    pub target: StreamTarget,
    pub payload: StreamEventPayload,
}

impl StreamEventMapped {
    pub fn new(target: StreamTarget, payload: StreamEventPayload) -> Self {
        Self { target, payload }
    }

    /// Maps terminal payloads to stream state transitions.
    ///
    /// Text payloads return `None`: they touch the placeholder, not the lifecycle.
    pub fn into_transition(self) -> Option<StreamTransition> {
        match self.payload {
            StreamEventPayload::Accumulated(_) => None,
            StreamEventPayload::Done | StreamEventPayload::Error(_) => {
                Some(StreamTransition::Finish(self.target))
            }
        }
    }
}

/// Snapshot published after every transcript mutation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderFrame {
    pub version: u64,
    /// The last message after the mutation.
    pub tail: Option<Message>,
    pub busy: bool,
}
