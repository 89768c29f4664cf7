#![deny(unsafe_code)]

/// Render-ready dashboard built from a review.
pub mod dashboard;
/// Upload validation and transport encoding.
pub mod document;
pub mod error;
/// Review record, response schema and parsing.
pub mod schema;
pub mod service;

pub use dashboard::{BadgeTone, Dashboard, DecisionBadge, ScoreRow};
pub use document::{DocumentIngestor, DocumentKind, MAX_FILE_SIZE_MB, UploadedDocument};
pub use error::{IngestError, IngestResult, ReviewError, ReviewResult};
pub use schema::{
    Decision, PaperScores, ReviewData, ScoreDimension, parse_review, review_response_schema,
    strip_code_fences,
};
pub use service::{REVIEW_PROMPT, REVIEWER_SYSTEM_INSTRUCTION, ReviewService};
