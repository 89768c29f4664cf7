use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::StreamExt;
use scholarsight_llm::{
    ChatBackend, ChatBootstrap, ChatFragment, FragmentStream, ProviderError, ProviderResult,
};
use tokio::sync::watch;

use crate::events::{PendingReply, RenderFrame, StreamEventMapped, StreamEventPayload};
use crate::message::{StreamSessionId, StreamState, StreamTarget};
use crate::transcript::Transcript;

pub const APOLOGY_MESSAGE: &str = "Sorry, I encountered an error responding to your question.";
pub const UNAVAILABLE_MESSAGE: &str = "Error: Chat service unavailable.";
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Turns a chat backend's fragment stream into a growing transcript entry.
///
/// One reply streams at a time. `submit` is the synchronous half and only
/// succeeds from `Idle`; `stream_reply` drives the stream to completion and
/// always lands back in `Idle`. Stream failures stay inside the in-flight
/// message and are never returned to the caller. A reply whose
/// `PendingReply` is dropped, or whose `stream_reply` future is cancelled,
/// is failed with the apology so the aggregator never stays busy.
pub struct StreamingMessageAggregator {
    bootstrap: ChatBootstrap,
    transcript: Transcript,
    state: StreamState,
    claim: Weak<()>,
    next_session_id: u64,
    idle_timeout: Option<Duration>,
    render_tx: watch::Sender<RenderFrame>,
}

impl StreamingMessageAggregator {
    /// `idle_timeout` bounds each wait for the next fragment; `None` waits forever.
    pub fn new(bootstrap: ChatBootstrap, idle_timeout: Option<Duration>) -> Self {
        let transcript = Transcript::new();
        let (render_tx, _) = watch::channel(RenderFrame {
            version: transcript.version(),
            tail: transcript.last().cloned(),
            busy: false,
        });

        Self {
            bootstrap,
            transcript,
            state: StreamState::Idle,
            claim: Weak::new(),
            next_session_id: 1,
            idle_timeout,
            render_tx,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// True while a reply streams or its `PendingReply` is still held.
    pub fn is_busy(&self) -> bool {
        !self.state.is_idle() && self.claim.strong_count() > 0
    }

    pub fn is_available(&self) -> bool {
        self.bootstrap.is_ready()
    }

    /// Receives a frame after every transcript mutation. Slow readers only see the latest.
    pub fn subscribe(&self) -> watch::Receiver<RenderFrame> {
        self.render_tx.subscribe()
    }

    /// Appends the user turn and an empty placeholder, then enters `Streaming`.
    ///
    /// Blank input or a busy aggregator is a silent no-op. An unavailable
    /// backend answers immediately with a finalized error message and
    /// returns `None`.
    #[must_use = "pass the reply to `stream_reply`, or the placeholder is failed"]
    pub fn submit(&mut self, text: &str) -> Option<PendingReply> {
        if text.trim().is_empty() {
            return None;
        }
        self.reclaim_abandoned();
        if let Some(active) = self.state.active_target() {
            tracing::debug!(
                session_id = active.session_id.0,
                "submission ignored while a reply is streaming"
            );
            return None;
        }

        if let ChatBootstrap::Unavailable { reason } = &self.bootstrap {
            tracing::warn!(reason = %reason, "chat submission without a chat session");
            self.transcript.append_user(text);
            self.transcript.append_model(UNAVAILABLE_MESSAGE);
            self.publish();
            return None;
        }

        let session_id = self.alloc_session_id();
        self.transcript.append_user(text);
        let message_id = self.transcript.append_placeholder(session_id);
        let pending = PendingReply::new(StreamTarget::new(session_id, message_id), text);

        match self.state.apply(pending.start_transition()) {
            Ok(next) => {
                self.state = next;
                self.claim = pending.claim();
            }
            Err(rejection) => {
                tracing::warn!(?rejection, "stream start rejected");
                return None;
            }
        }
        self.publish();
        Some(pending)
    }

    /// Opens the reply stream and folds every fragment into the placeholder.
    pub async fn stream_reply(&mut self, pending: PendingReply) {
        let target = pending.target();
        if !self.state.accepts_stream_event(target) {
            tracing::warn!(
                session_id = target.session_id.0,
                "stale pending reply ignored"
            );
            return;
        }

        let mut guard = SettleOnDrop {
            chat: self,
            target,
            settled: false,
        };
        let payload = match guard.chat.consume(&pending).await {
            Ok(fragments) => {
                tracing::debug!(
                    session_id = target.session_id.0,
                    fragments,
                    "reply stream finished"
                );
                StreamEventPayload::Done
            }
            Err(error) => {
                tracing::error!(
                    session_id = target.session_id.0,
                    error = %error,
                    "reply stream failed"
                );
                StreamEventPayload::Error(error.to_string())
            }
        };
        guard.chat.apply_event(StreamEventMapped::new(target, payload));
        guard.settled = true;
    }

    /// Both halves in one call.
    pub async fn send(&mut self, text: &str) {
        if let Some(pending) = self.submit(text) {
            self.stream_reply(pending).await;
        }
    }

    /// Fails a placeholder whose `PendingReply` was dropped unstreamed.
    fn reclaim_abandoned(&mut self) {
        let Some(target) = self.state.active_target() else {
            return;
        };
        if self.claim.strong_count() > 0 {
            return;
        }

        tracing::warn!(
            session_id = target.session_id.0,
            "pending reply dropped before streaming"
        );
        self.apply_event(StreamEventMapped::new(
            target,
            StreamEventPayload::Error("reply abandoned".to_string()),
        ));
    }

    async fn consume(&mut self, pending: &PendingReply) -> ProviderResult<usize> {
        let backend = self.backend()?;
        let target = pending.target();

        let mut stream = self
            .bounded("open-stream", backend.send_message_stream(pending.prompt()))
            .await??;

        let mut accumulated = String::new();
        let mut fragments = 0;
        while let Some(fragment) = self.next_fragment(&mut stream).await? {
            let fragment = fragment?;
            fragments += 1;
            accumulated.push_str(fragment.text());
            self.apply_event(StreamEventMapped::new(
                target,
                StreamEventPayload::Accumulated(accumulated.clone()),
            ));
        }
        Ok(fragments)
    }

    async fn next_fragment(
        &self,
        stream: &mut FragmentStream,
    ) -> ProviderResult<Option<ProviderResult<ChatFragment>>> {
        self.bounded("receive-fragment", stream.next()).await
    }

    async fn bounded<F: Future>(&self, stage: &'static str, future: F) -> ProviderResult<F::Output> {
        let Some(limit) = self.idle_timeout else {
            return Ok(future.await);
        };
        tokio::time::timeout(limit, future)
            .await
            .map_err(|_| ProviderError::StreamIdle {
                stage,
                seconds: limit.as_secs(),
            })
    }

    fn backend(&self) -> ProviderResult<Arc<dyn ChatBackend>> {
        match &self.bootstrap {
            ChatBootstrap::Ready(backend) => Ok(Arc::clone(backend)),
            ChatBootstrap::Unavailable { reason } => Err(ProviderError::StreamTransport {
                stage: "open-stream",
                details: reason.clone(),
            }),
        }
    }

    fn apply_event(&mut self, event: StreamEventMapped) {
        if !self.state.accepts_stream_event(event.target) {
            tracing::debug!(
                session_id = event.target.session_id.0,
                "stream event for inactive target dropped"
            );
            return;
        }

        let message_id = event.target.message_id;
        match &event.payload {
            StreamEventPayload::Accumulated(text) => {
                self.transcript.write_in_flight(message_id, text);
            }
            StreamEventPayload::Done => {
                self.transcript.finalize(message_id);
            }
            StreamEventPayload::Error(_) => {
                self.transcript.fail_in_flight(message_id, APOLOGY_MESSAGE);
            }
        }

        if let Some(transition) = event.into_transition() {
            match self.state.apply(transition) {
                Ok(next) => self.state = next,
                Err(rejection) => tracing::warn!(?rejection, "stream finish rejected"),
            }
        }
        self.publish();
    }

    fn publish(&self) {
        self.render_tx.send_replace(RenderFrame {
            version: self.transcript.version(),
            tail: self.transcript.last().cloned(),
            busy: self.is_busy(),
        });
    }

    fn alloc_session_id(&mut self) -> StreamSessionId {
        let id = StreamSessionId::new(self.next_session_id);
        self.next_session_id += 1;
        id
    }
}

/// Fails the in-flight reply if `stream_reply` is dropped before it settles.
struct SettleOnDrop<'a> {
    chat: &'a mut StreamingMessageAggregator,
    target: StreamTarget,
    settled: bool,
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        tracing::warn!(
            session_id = self.target.session_id.0,
            "reply stream cancelled"
        );
        self.chat.apply_event(StreamEventMapped::new(
            self.target,
            StreamEventPayload::Error("reply cancelled".to_string()),
        ));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use futures::stream;
    use scholarsight_llm::{BoxFuture, scripted_stream};

    use super::*;
    use crate::message::{MessageStatus, Role};
    use crate::transcript::WELCOME_MESSAGE;

    struct ScriptedChat {
        replies: Mutex<VecDeque<ProviderResult<FragmentStream>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedChat {
        fn new(replies: Vec<ProviderResult<FragmentStream>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn fragments(texts: &[&str]) -> ProviderResult<FragmentStream> {
            Ok(scripted_stream(
                texts.iter().map(|text| Ok(ChatFragment::new(*text))).collect(),
            ))
        }
    }

    impl ChatBackend for ScriptedChat {
        fn send_message_stream<'a>(
            &'a self,
            message: &'a str,
        ) -> BoxFuture<'a, ProviderResult<FragmentStream>> {
            self.prompts.lock().unwrap().push(message.to_string());
            let reply = self.replies.lock().unwrap().pop_front().unwrap();
            Box::pin(async move { reply })
        }
    }

    fn aggregator(backend: Arc<ScriptedChat>) -> StreamingMessageAggregator {
        StreamingMessageAggregator::new(ChatBootstrap::Ready(backend), Some(DEFAULT_IDLE_TIMEOUT))
    }

    fn transport_error() -> ProviderError {
        ProviderError::StreamTransport {
            stage: "test",
            details: "connection reset".to_string(),
        }
    }

    #[tokio::test]
    async fn fragments_concatenate_into_one_reply() {
        let backend = ScriptedChat::new(vec![ScriptedChat::fragments(&[
            "The ",
            "authors used ",
            "the CIFAR-10 dataset.",
        ])]);
        let mut chat = aggregator(backend.clone());

        chat.send("What dataset was used?").await;

        let messages = chat.transcript().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].text, WELCOME_MESSAGE);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].text, "What dataset was used?");
        assert_eq!(messages[2].role, Role::Model);
        assert_eq!(messages[2].text, "The authors used the CIFAR-10 dataset.");
        assert_eq!(messages[2].status, MessageStatus::Done);
        assert!(!chat.is_busy());
        assert_eq!(
            backend.prompts.lock().unwrap().as_slice(),
            ["What dataset was used?"]
        );
    }

    #[tokio::test]
    async fn empty_and_absent_fragments_contribute_nothing() {
        let backend = ScriptedChat::new(vec![Ok(scripted_stream(vec![
            Ok(ChatFragment::new("a")),
            Ok(ChatFragment::empty()),
            Ok(ChatFragment::new("")),
            Ok(ChatFragment::new("b")),
        ]))]);
        let mut chat = aggregator(backend);

        chat.send("q").await;

        assert_eq!(chat.transcript().last().unwrap().text, "ab");
    }

    #[tokio::test]
    async fn zero_fragments_leave_empty_finalized_reply() {
        let backend = ScriptedChat::new(vec![ScriptedChat::fragments(&[])]);
        let mut chat = aggregator(backend);

        chat.send("q").await;

        let last = chat.transcript().last().unwrap();
        assert_eq!(last.text, "");
        assert_eq!(last.status, MessageStatus::Done);
        assert!(chat.state().is_idle());
    }

    #[tokio::test]
    async fn submit_while_streaming_is_a_no_op() {
        let backend = ScriptedChat::new(vec![ScriptedChat::fragments(&["ok"])]);
        let mut chat = aggregator(backend.clone());

        let pending = chat.submit("first").unwrap();
        let version = chat.transcript().version();
        let len = chat.transcript().len();

        assert!(chat.is_busy());
        assert_eq!(chat.submit("second"), None);
        assert_eq!(chat.transcript().version(), version);
        assert_eq!(chat.transcript().len(), len);
        assert_eq!(chat.state().active_target(), Some(pending.target()));

        chat.stream_reply(pending).await;
        assert_eq!(backend.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn whitespace_submission_is_a_no_op() {
        let backend = ScriptedChat::new(Vec::new());
        let mut chat = aggregator(backend.clone());

        assert_eq!(chat.submit("   \n\t "), None);
        chat.send("").await;

        assert_eq!(chat.transcript().len(), 1);
        assert!(chat.state().is_idle());
        assert!(backend.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mid_stream_failure_replaces_only_the_in_flight_message() {
        let backend = ScriptedChat::new(vec![
            ScriptedChat::fragments(&["first answer"]),
            Ok(scripted_stream(vec![
                Ok(ChatFragment::new("partial ")),
                Err(transport_error()),
                Ok(ChatFragment::new("never seen")),
            ])),
        ]);
        let mut chat = aggregator(backend);
        chat.send("one").await;
        let before = chat.transcript().messages().to_vec();

        chat.send("two").await;

        let after = chat.transcript().messages();
        assert_eq!(&after[..before.len()], before.as_slice());
        assert_eq!(after.len(), before.len() + 2);
        assert_eq!(after[before.len()].text, "two");
        let failed = after.last().unwrap();
        assert_eq!(failed.text, APOLOGY_MESSAGE);
        assert_eq!(failed.status, MessageStatus::Failed);
        assert!(!chat.is_busy());
    }

    #[tokio::test]
    async fn open_failure_is_reported_in_the_bubble() {
        let backend = ScriptedChat::new(vec![
            Err(ProviderError::RateLimited { stage: "test" }),
            ScriptedChat::fragments(&["recovered"]),
        ]);
        let mut chat = aggregator(backend);

        chat.send("q").await;
        assert_eq!(chat.transcript().last().unwrap().text, APOLOGY_MESSAGE);

        chat.send("again").await;
        assert_eq!(chat.transcript().last().unwrap().text, "recovered");
    }

    #[tokio::test]
    async fn silent_stream_times_out_into_apology() {
        let first: ProviderResult<ChatFragment> = Ok(ChatFragment::new("half"));
        let stalled: FragmentStream = Box::pin(stream::iter(vec![first]).chain(stream::pending()));
        let backend = ScriptedChat::new(vec![Ok(stalled)]);
        let mut chat = StreamingMessageAggregator::new(
            ChatBootstrap::Ready(backend),
            Some(Duration::from_millis(20)),
        );

        chat.send("q").await;

        let last = chat.transcript().last().unwrap();
        assert_eq!(last.text, APOLOGY_MESSAGE);
        assert_eq!(last.status, MessageStatus::Failed);
        assert!(chat.state().is_idle());
    }

    #[tokio::test]
    async fn in_band_provider_error_fails_the_reply() {
        let backend = ScriptedChat::new(vec![Ok(scripted_stream(vec![
            Ok(ChatFragment::new("partial ")),
            Err(ProviderError::ApiReported {
                stage: "test",
                details: "500 INTERNAL: Internal error encountered.".to_string(),
            }),
        ]))]);
        let mut chat = aggregator(backend);

        chat.send("q").await;

        let last = chat.transcript().last().unwrap();
        assert_eq!(last.text, APOLOGY_MESSAGE);
        assert_eq!(last.status, MessageStatus::Failed);
        assert!(!chat.is_busy());
    }

    #[tokio::test]
    async fn dropped_pending_reply_frees_the_aggregator() {
        let backend = ScriptedChat::new(vec![ScriptedChat::fragments(&["recovered"])]);
        let mut chat = aggregator(backend.clone());

        let abandoned = chat.submit("first").unwrap();
        assert!(chat.is_busy());
        drop(abandoned);
        assert!(!chat.is_busy());

        let pending = chat.submit("second").unwrap();
        let messages = chat.transcript().messages();
        assert_eq!(messages[2].text, APOLOGY_MESSAGE);
        assert_eq!(messages[2].status, MessageStatus::Failed);
        assert_eq!(messages[3].text, "second");

        chat.stream_reply(pending).await;
        assert_eq!(chat.transcript().last().unwrap().text, "recovered");
        assert_eq!(backend.prompts.lock().unwrap().as_slice(), ["second"]);
    }

    #[tokio::test]
    async fn cancelled_stream_reply_settles_the_placeholder() {
        let stalled: FragmentStream = Box::pin(stream::pending());
        let backend = ScriptedChat::new(vec![
            Ok(stalled),
            ScriptedChat::fragments(&["after cancel"]),
        ]);
        let mut chat = StreamingMessageAggregator::new(ChatBootstrap::Ready(backend), None);

        let pending = chat.submit("q").unwrap();
        let outcome =
            tokio::time::timeout(Duration::from_millis(20), chat.stream_reply(pending)).await;
        assert!(outcome.is_err());

        assert!(!chat.is_busy());
        assert!(chat.state().is_idle());
        let last = chat.transcript().last().unwrap();
        assert_eq!(last.text, APOLOGY_MESSAGE);
        assert_eq!(last.status, MessageStatus::Failed);

        chat.send("again").await;
        assert_eq!(chat.transcript().last().unwrap().text, "after cancel");
    }

    #[tokio::test]
    async fn unavailable_backend_answers_with_fixed_message() {
        let mut chat = StreamingMessageAggregator::new(
            ChatBootstrap::unavailable("missing api key"),
            None,
        );

        assert_eq!(chat.submit("hello?"), None);

        let messages = chat.transcript().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].text, "hello?");
        assert_eq!(messages[2].text, UNAVAILABLE_MESSAGE);
        assert_eq!(messages[2].status, MessageStatus::Done);
        assert!(!chat.is_busy());
        assert!(!chat.is_available());
    }

    #[tokio::test]
    async fn render_frames_track_the_growing_reply() {
        let backend = ScriptedChat::new(vec![ScriptedChat::fragments(&["Hel", "lo"])]);
        let mut chat = aggregator(backend);
        let mut frames = chat.subscribe();
        let initial = frames.borrow_and_update().version;

        let pending = chat.submit("hi").unwrap();
        assert!(frames.has_changed().unwrap());
        let frame = frames.borrow_and_update().clone();
        assert!(frame.busy);
        assert!(frame.version > initial);
        assert_eq!(frame.tail.map(|m| m.is_streaming()), Some(true));

        chat.stream_reply(pending).await;

        let frame = frames.borrow_and_update().clone();
        assert!(!frame.busy);
        assert_eq!(frame.version, chat.transcript().version());
        assert_eq!(frame.tail.map(|m| m.text), Some("Hello".to_string()));
    }
}
