use chrono::{DateTime, Utc};

/// Stable identifier for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Identifier for one streaming reply.
///
/// Changes on every submission so a late fragment can never land in a newer reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamSessionId(pub u64);

impl StreamSessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Routing key tying a stream to the placeholder it fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    pub session_id: StreamSessionId,
    pub message_id: MessageId,
}

impl StreamTarget {
    pub const fn new(session_id: StreamSessionId, message_id: MessageId) -> Self {
        Self {
            session_id,
            message_id,
        }
    }
}

/// Chat speaker role. There are no system-authored visible messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Model,
}

/// Lifecycle status for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageStatus {
    Streaming(StreamSessionId),
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a message with explicit status, stamped now.
    pub fn new(id: MessageId, role: Role, text: impl Into<String>, status: MessageStatus) -> Self {
        Self {
            id,
            role,
            text: text.into(),
            status,
            created_at: Utc::now(),
        }
    }

    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Role::User, text, MessageStatus::Done)
    }

    pub fn model(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Role::Model, text, MessageStatus::Done)
    }

    /// Creates an empty model placeholder for a reply that is still streaming.
    pub fn model_streaming(id: MessageId, session_id: StreamSessionId) -> Self {
        Self::new(
            id,
            Role::Model,
            String::new(),
            MessageStatus::Streaming(session_id),
        )
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.status, MessageStatus::Streaming(_))
    }
}

/// Submission gate for the chat surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming(StreamTarget),
}

/// State transition input for the stream lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTransition {
    Start(StreamTarget),
    Finish(StreamTarget),
}

/// Rejection reason for illegal stream transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTransitionRejection {
    AlreadyStreaming {
        active: StreamTarget,
        attempted: StreamTarget,
    },
    NoActiveStream,
    SessionMismatch {
        active: StreamTarget,
        attempted: StreamTarget,
    },
}

pub type StreamTransitionResult = Result<StreamState, StreamTransitionRejection>;

impl StreamState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns the active target if and only if state is `Streaming`.
    pub fn active_target(&self) -> Option<StreamTarget> {
        match self {
            Self::Streaming(target) => Some(*target),
            Self::Idle => None,
        }
    }

    /// Returns true when incoming stream data matches the active session.
    pub fn accepts_stream_event(&self, target: StreamTarget) -> bool {
        matches!(self, Self::Streaming(active) if *active == target)
    }

    /// Applies one transition. Only `Idle` may start; `Finish` must name the
    /// active stream exactly.
    pub fn apply(&self, transition: StreamTransition) -> StreamTransitionResult {
        match (self, transition) {
            (Self::Idle, StreamTransition::Start(target)) => Ok(Self::Streaming(target)),
            (Self::Streaming(active), StreamTransition::Start(attempted)) => {
                Err(StreamTransitionRejection::AlreadyStreaming {
                    active: *active,
                    attempted,
                })
            }
            (Self::Streaming(active), StreamTransition::Finish(target)) if *active == target => {
                Ok(Self::Idle)
            }
            (Self::Streaming(active), StreamTransition::Finish(attempted)) => {
                Err(StreamTransitionRejection::SessionMismatch {
                    active: *active,
                    attempted,
                })
            }
            (Self::Idle, StreamTransition::Finish(_)) => {
                Err(StreamTransitionRejection::NoActiveStream)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(session: u64, message: u64) -> StreamTarget {
        StreamTarget::new(StreamSessionId::new(session), MessageId::new(message))
    }

    #[test]
    fn idle_starts_and_finishes_matching_stream() {
        let streaming = StreamState::Idle
            .apply(StreamTransition::Start(target(1, 2)))
            .unwrap();
        assert_eq!(streaming.active_target(), Some(target(1, 2)));
        assert!(streaming.accepts_stream_event(target(1, 2)));
        assert!(!streaming.accepts_stream_event(target(0, 2)));

        let idle = streaming
            .apply(StreamTransition::Finish(target(1, 2)))
            .unwrap();
        assert!(idle.is_idle());
    }

    #[test]
    fn second_start_is_rejected_while_streaming() {
        let streaming = StreamState::Streaming(target(1, 2));

        assert_eq!(
            streaming.apply(StreamTransition::Start(target(2, 4))),
            Err(StreamTransitionRejection::AlreadyStreaming {
                active: target(1, 2),
                attempted: target(2, 4),
            })
        );
    }

    #[test]
    fn stale_finish_is_rejected() {
        let streaming = StreamState::Streaming(target(2, 4));

        assert!(matches!(
            streaming.apply(StreamTransition::Finish(target(1, 2))),
            Err(StreamTransitionRejection::SessionMismatch { .. })
        ));
        assert_eq!(
            StreamState::Idle.apply(StreamTransition::Finish(target(1, 2))),
            Err(StreamTransitionRejection::NoActiveStream)
        );
    }
}
