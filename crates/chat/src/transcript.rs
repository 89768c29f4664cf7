use crate::message::{Message, MessageId, MessageStatus, Role, StreamSessionId};

pub const WELCOME_MESSAGE: &str =
    "I've analyzed the paper. Ask me anything about the methodology, results, or specific details.";

/// Ordered, append-only conversation log.
///
/// Only the last model message may change, and only while it is streaming.
/// Every mutation bumps `version`.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    next_message_id: u64,
    version: u64,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    /// Creates a transcript holding the finalized welcome message.
    pub fn new() -> Self {
        let mut transcript = Self::empty();
        let id = transcript.alloc_message_id();
        transcript.push(Message::model(id, WELCOME_MESSAGE));
        transcript
    }

    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
            next_message_id: 1,
            version: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    /// The streaming placeholder, if any.
    pub fn in_flight(&self) -> Option<&Message> {
        self.messages.last().filter(|message| message.is_streaming())
    }

    pub(crate) fn append_user(&mut self, text: impl Into<String>) -> MessageId {
        let id = self.alloc_message_id();
        self.push(Message::user(id, text));
        id
    }

    pub(crate) fn append_model(&mut self, text: impl Into<String>) -> MessageId {
        let id = self.alloc_message_id();
        self.push(Message::model(id, text));
        id
    }

    pub(crate) fn append_placeholder(&mut self, session_id: StreamSessionId) -> MessageId {
        let id = self.alloc_message_id();
        self.push(Message::model_streaming(id, session_id));
        id
    }

    /// Overwrites the in-flight text with the full accumulated reply.
    ///
    /// Returns false when `id` is not the streaming tail.
    pub(crate) fn write_in_flight(&mut self, id: MessageId, text: &str) -> bool {
        let Some(message) = self.streaming_tail_mut(id) else {
            return false;
        };
        message.text.clear();
        message.text.push_str(text);
        self.version += 1;
        true
    }

    pub(crate) fn finalize(&mut self, id: MessageId) -> bool {
        self.close_in_flight(id, None, MessageStatus::Done)
    }

    /// Replaces the in-flight text wholesale and marks it failed.
    pub(crate) fn fail_in_flight(&mut self, id: MessageId, text: &str) -> bool {
        self.close_in_flight(id, Some(text), MessageStatus::Failed)
    }

    fn close_in_flight(&mut self, id: MessageId, text: Option<&str>, status: MessageStatus) -> bool {
        let Some(message) = self.streaming_tail_mut(id) else {
            return false;
        };
        if let Some(text) = text {
            message.text = text.to_string();
        }
        message.status = status;
        self.version += 1;
        true
    }

    fn streaming_tail_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages
            .last_mut()
            .filter(|message| message.id == id && message.is_streaming())
    }

    fn push(&mut self, message: Message) {
        debug_assert!(
            self.in_flight().is_none(),
            "appending behind a streaming message"
        );
        self.messages.push(message);
        self.version += 1;
    }

    fn alloc_message_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id += 1;
        id
    }
}
