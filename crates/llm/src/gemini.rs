use snafu::{OptionExt, ResultExt, ensure};

use super::model::CHAT_SYSTEM_INSTRUCTION;
use super::provider::{
    ApiReportedSnafu, BoxFuture, EmptyResponseSnafu, FragmentStream, HttpClientSnafu, HttpStatusSnafu,
    MissingApiKeySnafu, ProviderConfig, ProviderResult, RateLimitedSnafu, ResponseDecodeSnafu,
    ReviewBackend, StructuredRequest,
};
use super::sse::fragment_stream;
use super::wire::{Content, GenerateContentRequest, GenerateContentResponse, Part};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// HTTP client for the generative language REST API.
pub struct GeminiClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl GeminiClient {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "gemini-client-new",
            }
        );

        let http = reqwest::Client::builder()
            .build()
            .context(HttpClientSnafu {
                stage: "build-client",
            })?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn method_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.endpoint.trim_end_matches('/'),
            model,
            method
        )
    }

    async fn post(
        &self,
        url: String,
        body: &GenerateContentRequest,
        stage: &'static str,
    ) -> ProviderResult<reqwest::Response> {
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(body)
            .send()
            .await
            .context(HttpClientSnafu { stage })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return RateLimitedSnafu { stage }.fail();
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return HttpStatusSnafu {
                stage,
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        Ok(response)
    }

    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> ProviderResult<GenerateContentResponse> {
        let url = self.method_url(model, "generateContent");
        let response = self.post(url, request, "generate-content").await?;

        response.json().await.context(ResponseDecodeSnafu {
            stage: "decode-generate-content",
        })
    }

    /// Opens a streamed generation; fragments arrive in server order.
    pub async fn stream_generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> ProviderResult<FragmentStream> {
        let url = format!(
            "{}?alt=sse",
            self.method_url(model, "streamGenerateContent")
        );
        let response = self.post(url, request, "stream-generate-content").await?;

        tracing::debug!(model_id = %model, "generation stream opened");
        Ok(fragment_stream(response.bytes_stream()))
    }

    pub(crate) fn chat_system_instruction() -> Content {
        Content::instruction(CHAT_SYSTEM_INSTRUCTION)
    }
}

pub(crate) fn structured_request_body(request: &StructuredRequest) -> GenerateContentRequest {
    GenerateContentRequest::new(vec![Content::user(vec![
        Part::document(&request.document),
        Part::text(request.prompt.clone()),
    ])])
    .with_system_instruction(Content::instruction(request.system_instruction.clone()))
    .with_json_schema(request.response_schema.clone())
}

impl ReviewBackend for GeminiClient {
    fn generate_structured<'a>(
        &'a self,
        request: &'a StructuredRequest,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(async move {
            let model = self.config.review_model.as_str();
            let body = structured_request_body(request);

            let response = match self.generate_content(model, &body).await {
                Ok(response) => response,
                Err(error) => {
                    tracing::error!(
                        model_id = %model,
                        error = %error,
                        "structured generation request failed"
                    );
                    return Err(error);
                }
            };

            structured_text(response)
        })
    }
}

/// Text of a structured reply. An in-band error or a blank reply is a failure.
fn structured_text(response: GenerateContentResponse) -> ProviderResult<String> {
    if let Some(error) = response.error {
        return ApiReportedSnafu {
            stage: "read-structured-text",
            details: error.describe(),
        }
        .fail();
    }

    response
        .text()
        .filter(|text| !text.trim().is_empty())
        .context(EmptyResponseSnafu {
            stage: "read-structured-text",
        })
}
