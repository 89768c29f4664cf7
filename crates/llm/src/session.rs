use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Mutex;

use super::gemini::GeminiClient;
use super::model::{CHAT_SEED_ACKNOWLEDGEMENT, CHAT_SEED_PROMPT};
use super::provider::{
    BoxFuture, ChatBackend, ChatFragment, FragmentStream, InlineDocument, ProviderConfig,
    ProviderResult,
};
use super::wire::{Content, GenerateContentRequest, Part};

/// Outcome of preparing a conversation for one document.
///
/// `Unavailable` is a value the caller handles, not an error: the chat
/// surface stays usable and reports the outage inside the transcript.
pub enum ChatBootstrap {
    Ready(Arc<dyn ChatBackend>),
    Unavailable { reason: String },
}

impl ChatBootstrap {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl fmt::Debug for ChatBootstrap {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(_) => formatter.write_str("ChatBootstrap::Ready"),
            Self::Unavailable { reason } => formatter
                .debug_struct("ChatBootstrap::Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

pub fn bootstrap_chat(config: &ProviderConfig, document: &InlineDocument) -> ChatBootstrap {
    match GeminiClient::new(config.clone()) {
        Ok(client) => {
            tracing::info!(
                model_id = %config.chat_model,
                mime_type = %document.mime_type,
                "chat session seeded with document"
            );
            ChatBootstrap::Ready(Arc::new(GeminiChat::new(Arc::new(client), document)))
        }
        Err(error) => {
            tracing::error!(
                error = %error,
                "chat client could not be constructed; chat will report unavailability"
            );
            ChatBootstrap::unavailable(error.to_string())
        }
    }
}

/// The two turns that ground a conversation before the user speaks.
pub fn seeded_history(document: &InlineDocument) -> Vec<Content> {
    vec![
        Content::user(vec![Part::document(document), Part::text(CHAT_SEED_PROMPT)]),
        Content::model_text(CHAT_SEED_ACKNOWLEDGEMENT),
    ]
}

pub struct GeminiChat {
    client: Arc<GeminiClient>,
    model: String,
    history: Arc<Mutex<Vec<Content>>>,
}

impl GeminiChat {
    pub fn new(client: Arc<GeminiClient>, document: &InlineDocument) -> Self {
        let model = client.config().chat_model.clone();
        Self {
            client,
            model,
            history: Arc::new(Mutex::new(seeded_history(document))),
        }
    }
}

impl ChatBackend for GeminiChat {
    fn send_message_stream<'a>(
        &'a self,
        text: &'a str,
    ) -> BoxFuture<'a, ProviderResult<FragmentStream>> {
        Box::pin(async move {
            let user_turn = Content::user_text(text);
            let mut contents = self.history.lock().await.clone();
            contents.push(user_turn.clone());

            let request = GenerateContentRequest::new(contents)
                .with_system_instruction(GeminiClient::chat_system_instruction());
            let upstream = self
                .client
                .stream_generate_content(&self.model, &request)
                .await?;

            Ok(commit_on_completion(
                upstream,
                Arc::clone(&self.history),
                user_turn,
            ))
        })
    }
}

struct CommitState {
    upstream: FragmentStream,
    history: Arc<Mutex<Vec<Content>>>,
    user_turn: Option<Content>,
    reply: String,
    failed: bool,
}

/// Passes fragments through unchanged and, once the upstream ends cleanly,
/// records the exchange in `history`. A failed exchange is not recorded.
pub(crate) fn commit_on_completion(
    upstream: FragmentStream,
    history: Arc<Mutex<Vec<Content>>>,
    user_turn: Content,
) -> FragmentStream {
    let state = CommitState {
        upstream,
        history,
        user_turn: Some(user_turn),
        reply: String::new(),
        failed: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        let item = state.upstream.next().await;
        match item {
            Some(Ok(fragment)) => {
                state.reply.push_str(fragment.text());
                Some((Ok(fragment), state))
            }
            Some(Err(error)) => {
                state.failed = true;
                Some((Err(error), state))
            }
            None => {
                if !state.failed
                    && let Some(user_turn) = state.user_turn.take()
                {
                    let mut history = state.history.lock().await;
                    history.push(user_turn);
                    history.push(Content::model_text(std::mem::take(&mut state.reply)));
                }
                None
            }
        }
    }))
}

/// Stream that yields exactly the given fragments.
pub fn scripted_stream(fragments: Vec<ProviderResult<ChatFragment>>) -> FragmentStream {
    Box::pin(futures::stream::iter(fragments))
}
