use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use snafu::Snafu;

use crate::model::{DEFAULT_CHAT_MODEL, DEFAULT_ENDPOINT, DEFAULT_REVIEW_MODEL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_key: String,
    pub endpoint: String,
    pub review_model: String,
    pub chat_model: String,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim().to_string();
        Self {
            api_key: api_key.into().trim().to_string(),
            endpoint: if endpoint.is_empty() {
                DEFAULT_ENDPOINT.to_string()
            } else {
                endpoint
            },
            review_model: DEFAULT_REVIEW_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
        }
    }

    pub fn with_review_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.review_model = model.trim().to_string();
        }
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.chat_model = model.trim().to_string();
        }
        self
    }
}

/// Document payload sent inline with a request: MIME type plus base64 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineDocument {
    pub mime_type: String,
    pub data: String,
}

impl InlineDocument {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// One incremental piece of a streamed reply.
///
/// Chunks without any text part are legal and carry `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatFragment {
    text: Option<String>,
}

impl ChatFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn empty() -> Self {
        Self { text: None }
    }

    pub fn from_optional(text: Option<String>) -> Self {
        Self { text }
    }

    /// Returns the payload, treating a missing one as the empty string.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }
}

/// Single-shot request whose reply must match `response_schema`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    pub document: InlineDocument,
    pub system_instruction: String,
    pub prompt: String,
    pub response_schema: serde_json::Value,
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ProviderResult<T> = Result<T, ProviderError>;
pub type FragmentStream = Pin<Box<dyn Stream<Item = ProviderResult<ChatFragment>> + Send + 'static>>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("missing API key for the generative language service"))]
    MissingApiKey { stage: &'static str },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("provider rate limited the request on `{stage}`"))]
    RateLimited { stage: &'static str },
    #[snafu(display("provider returned status {status} on `{stage}`: {body}"))]
    HttpStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode provider response on `{stage}`, {source}"))]
    ResponseDecode {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("failed to decode stream chunk on `{stage}`, {source}"))]
    ChunkDecode {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("stream transport broke on `{stage}`: {details}"))]
    StreamTransport {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("provider reported an error on `{stage}`: {details}"))]
    ApiReported {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("no fragment received for {seconds}s on `{stage}`"))]
    StreamIdle { stage: &'static str, seconds: u64 },
    #[snafu(display("no response text generated"))]
    EmptyResponse { stage: &'static str },
}

/// One-shot structured generation (the review request).
pub trait ReviewBackend: Send + Sync {
    fn generate_structured<'a>(
        &'a self,
        request: &'a StructuredRequest,
    ) -> BoxFuture<'a, ProviderResult<String>>;
}

/// Stateful conversation seeded with a document.
pub trait ChatBackend: Send + Sync {
    fn send_message_stream<'a>(
        &'a self,
        text: &'a str,
    ) -> BoxFuture<'a, ProviderResult<FragmentStream>>;
}
