use scholarsight_llm::ProviderError;
use snafu::Snafu;

/// Rejections raised before anything is sent to the model.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum IngestError {
    #[snafu(display("File is too large. Max size is {max_mb}MB."))]
    TooLarge {
        stage: &'static str,
        size: usize,
        max_mb: usize,
    },
    #[snafu(display("Only PDF and TXT files are supported."))]
    UnsupportedType {
        stage: &'static str,
        mime_type: String,
    },
    #[snafu(display("document payload is not valid base64 on `{stage}`, {source}"))]
    DecodePayload {
        stage: &'static str,
        source: base64::DecodeError,
    },
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Terminal failures of the review request.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ReviewError {
    #[snafu(display("review request failed on `{stage}`, {source}"))]
    Transport {
        stage: &'static str,
        source: ProviderError,
    },
    #[snafu(display("review response is not valid JSON on `{stage}`, {source}"))]
    MalformedJson {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("review response does not match the schema on `{stage}`, {source}"))]
    SchemaViolation {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("review score `{field}` = {value} is outside 1..=10"))]
    ScoreOutOfRange {
        stage: &'static str,
        field: &'static str,
        value: f64,
    },
}

pub type ReviewResult<T> = Result<T, ReviewError>;
