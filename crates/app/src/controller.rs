use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use scholarsight_chat::StreamingMessageAggregator;
use scholarsight_llm::{
    ChatBootstrap, GeminiClient, InlineDocument, ProviderConfig, ProviderResult, ReviewBackend,
    bootstrap_chat,
};
use scholarsight_review::{
    Dashboard, DocumentIngestor, IngestResult, ReviewData, ReviewService, UploadedDocument,
};

pub const ANALYSIS_FAILED_MESSAGE: &str =
    "Failed to analyze the paper. Please try again or ensure the file content is valid text/PDF.";
pub const READING_STEP: &str = "Reading paper content...";
pub const ANALYZING_STEP: &str = "Analyzing methodology and significance...";

/// Which screen the session is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppView {
    #[default]
    Upload,
    Analyzing,
    Dashboard,
    Error,
}

/// Builds the remote collaborators for one document.
pub trait SessionBackends: Send + Sync {
    fn review_backend(&self) -> ProviderResult<Arc<dyn ReviewBackend>>;
    fn bootstrap_chat(&self, document: &InlineDocument) -> ChatBootstrap;
}

pub struct GeminiBackends {
    config: ProviderConfig,
}

impl GeminiBackends {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

impl SessionBackends for GeminiBackends {
    fn review_backend(&self) -> ProviderResult<Arc<dyn ReviewBackend>> {
        Ok(Arc::new(GeminiClient::new(self.config.clone())?))
    }

    fn bootstrap_chat(&self, document: &InlineDocument) -> ChatBootstrap {
        bootstrap_chat(&self.config, document)
    }
}

/// Owns everything tied to the current paper and drops it on `reset`.
pub struct SessionController {
    backends: Arc<dyn SessionBackends>,
    ingestor: DocumentIngestor,
    idle_timeout: Option<Duration>,
    view: AppView,
    loading_step: Option<&'static str>,
    upload_error: Option<String>,
    error_message: Option<String>,
    document: Option<UploadedDocument>,
    review: Option<ReviewData>,
    chat: Option<StreamingMessageAggregator>,
}

impl SessionController {
    pub fn new(
        backends: Arc<dyn SessionBackends>,
        ingestor: DocumentIngestor,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            backends,
            ingestor,
            idle_timeout,
            view: AppView::Upload,
            loading_step: None,
            upload_error: None,
            error_message: None,
            document: None,
            review: None,
            chat: None,
        }
    }

    pub fn view(&self) -> AppView {
        self.view
    }

    pub fn loading_step(&self) -> Option<&'static str> {
        self.loading_step
    }

    /// Inline validation message shown on the upload screen.
    pub fn upload_error(&self) -> Option<&str> {
        self.upload_error.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn document(&self) -> Option<&UploadedDocument> {
        self.document.as_ref()
    }

    pub fn review(&self) -> Option<&ReviewData> {
        self.review.as_ref()
    }

    pub fn dashboard(&self) -> Option<Dashboard> {
        self.review.as_ref().map(Dashboard::from_review)
    }

    pub fn chat(&self) -> Option<&StreamingMessageAggregator> {
        self.chat.as_ref()
    }

    pub fn chat_mut(&mut self) -> Option<&mut StreamingMessageAggregator> {
        self.chat.as_mut()
    }

    /// Validates a selected file. Rejections stay on the upload screen.
    pub fn select_file(&mut self, name: &str, bytes: &[u8], mime_type: &str) -> Option<UploadedDocument> {
        if self.view != AppView::Upload {
            tracing::debug!(view = ?self.view, "file selection ignored outside upload view");
            return None;
        }

        let outcome = self.ingestor.ingest(name, bytes, mime_type);
        self.accept_upload(name, outcome)
    }

    /// Like `select_file`, with the name and type taken from the path.
    pub fn select_path(&mut self, path: &Path, bytes: &[u8]) -> Option<UploadedDocument> {
        if self.view != AppView::Upload {
            tracing::debug!(view = ?self.view, "file selection ignored outside upload view");
            return None;
        }

        let outcome = self.ingestor.ingest_path(path, bytes);
        self.accept_upload(&path.display().to_string(), outcome)
    }

    fn accept_upload(
        &mut self,
        name: &str,
        outcome: IngestResult<UploadedDocument>,
    ) -> Option<UploadedDocument> {
        match outcome {
            Ok(document) => {
                self.upload_error = None;
                Some(document)
            }
            Err(error) => {
                tracing::warn!(name, error = ?error, "document rejected");
                self.upload_error = Some(error.to_string());
                None
            }
        }
    }

    /// Seeds chat for the document, then requests its review.
    pub async fn process_document(&mut self, document: UploadedDocument) {
        self.view = AppView::Analyzing;
        self.upload_error = None;
        self.error_message = None;
        self.review = None;
        self.set_loading_step(READING_STEP);

        let bootstrap = self.backends.bootstrap_chat(&document.to_inline());
        self.chat = Some(StreamingMessageAggregator::new(bootstrap, self.idle_timeout));

        self.set_loading_step(ANALYZING_STEP);
        let outcome = match self.backends.review_backend() {
            Ok(backend) => ReviewService::new(backend)
                .generate_review(&document)
                .await
                .map_err(|error| error.to_string()),
            Err(error) => Err(error.to_string()),
        };
        self.loading_step = None;
        self.document = Some(document);

        match outcome {
            Ok(review) => {
                self.review = Some(review);
                self.view = AppView::Dashboard;
            }
            Err(error) => {
                tracing::error!(error = %error, "paper analysis failed");
                self.chat = None;
                self.error_message = Some(ANALYSIS_FAILED_MESSAGE.to_string());
                self.view = AppView::Error;
            }
        }
    }

    /// Returns to the upload screen with no document, review or chat.
    pub fn reset(&mut self) {
        self.view = AppView::Upload;
        self.loading_step = None;
        self.upload_error = None;
        self.error_message = None;
        self.document = None;
        self.review = None;
        self.chat = None;
    }

    fn set_loading_step(&mut self, step: &'static str) {
        tracing::info!(step, "analysis progress");
        self.loading_step = Some(step);
    }
}
