use std::sync::Arc;

use scholarsight_llm::{ReviewBackend, StructuredRequest};
use snafu::ResultExt;

use crate::document::UploadedDocument;
use crate::error::{ReviewResult, TransportSnafu};
use crate::schema::{ReviewData, parse_review, review_response_schema};

pub const REVIEWER_SYSTEM_INSTRUCTION: &str = "You are a distinguished senior academic reviewer for a top-tier scientific journal. \
Your task is to analyze the provided research paper (PDF or text) and generate a structured, rigorous, and constructive peer review.

Focus on:
1. Novelty: Is the work original?
2. Methodology: Are the methods sound, reproducible, and appropriate?
3. Clarity: Is the writing clear and well-structured?
4. Significance: Does this contribute meaningfully to the field?
5. Citations: Is the work well-grounded in existing literature?

You must output PURE JSON matching the specific schema requested. \
Do not include markdown formatting or code blocks in the JSON output if possible, but the outer wrapper might be a code block.";

pub const REVIEW_PROMPT: &str = "Please review this uploaded research paper.";

/// Requests one structured review per document. Failures are terminal.
pub struct ReviewService {
    backend: Arc<dyn ReviewBackend>,
}

impl ReviewService {
    pub fn new(backend: Arc<dyn ReviewBackend>) -> Self {
        Self { backend }
    }

    pub fn request_for(document: &UploadedDocument) -> StructuredRequest {
        StructuredRequest {
            document: document.to_inline(),
            system_instruction: REVIEWER_SYSTEM_INSTRUCTION.to_string(),
            prompt: REVIEW_PROMPT.to_string(),
            response_schema: review_response_schema(),
        }
    }

    pub async fn generate_review(&self, document: &UploadedDocument) -> ReviewResult<ReviewData> {
        let request = Self::request_for(document);
        let text = self
            .backend
            .generate_structured(&request)
            .await
            .context(TransportSnafu {
                stage: "generate-review",
            })?;

        match parse_review(&text) {
            Ok(review) => {
                tracing::info!(
                    document = %document.name,
                    decision = %review.decision,
                    "review generated"
                );
                Ok(review)
            }
            Err(error) => {
                tracing::error!(document = %document.name, error = %error, "review response rejected");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use scholarsight_llm::{BoxFuture, ProviderError, ProviderResult};

    use super::*;
    use crate::document::DocumentIngestor;
    use crate::error::ReviewError;
    use crate::schema::Decision;

    struct CannedBackend {
        reply: Mutex<Option<ProviderResult<String>>>,
        seen: Mutex<Vec<StructuredRequest>>,
    }

    impl CannedBackend {
        fn new(reply: ProviderResult<String>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl ReviewBackend for CannedBackend {
        fn generate_structured<'a>(
            &'a self,
            request: &'a StructuredRequest,
        ) -> BoxFuture<'a, ProviderResult<String>> {
            self.seen.lock().unwrap().push(request.clone());
            let reply = self.reply.lock().unwrap().take().unwrap();
            Box::pin(async move { reply })
        }
    }

    fn document() -> UploadedDocument {
        DocumentIngestor::default()
            .ingest("paper.txt", b"We train on CIFAR-10.", "text/plain")
            .unwrap()
    }

    #[tokio::test]
    async fn fenced_reply_is_parsed_into_review() {
        let backend = CannedBackend::new(Ok(r#"```json
            {"title":"T","summary":"S","scores":{"novelty":7,"methodology":6,"clarity":8,
             "significance":7,"citations":5},"strengths":["a"],"weaknesses":["b"],
             "detailedFeedback":"F","decision":"Accept"}
            ```"#
            .to_string()));
        let service = ReviewService::new(backend.clone());

        let review = service.generate_review(&document()).await.unwrap();

        assert_eq!(review.decision, Decision::Accept);
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].prompt, REVIEW_PROMPT);
        assert_eq!(seen[0].document.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn transport_failure_is_terminal() {
        let backend = CannedBackend::new(Err(ProviderError::RateLimited { stage: "test" }));
        let service = ReviewService::new(backend);

        let error = service.generate_review(&document()).await.unwrap_err();

        assert!(matches!(error, ReviewError::Transport { .. }));
    }

    #[tokio::test]
    async fn non_conforming_reply_is_a_schema_error() {
        let backend = CannedBackend::new(Ok(r#"{"title":"only a title"}"#.to_string()));
        let service = ReviewService::new(backend);

        let error = service.generate_review(&document()).await.unwrap_err();

        assert!(matches!(error, ReviewError::SchemaViolation { .. }));
    }
}
