use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use snafu::ensure;

use crate::error::{ReviewError, ReviewResult, ScoreOutOfRangeSnafu};

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Accept,
    #[serde(rename = "Minor Revision")]
    MinorRevision,
    #[serde(rename = "Major Revision")]
    MajorRevision,
    Reject,
}

impl Decision {
    pub const ALL: [Decision; 4] = [
        Self::Accept,
        Self::MinorRevision,
        Self::MajorRevision,
        Self::Reject,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Accept => "Accept",
            Self::MinorRevision => "Minor Revision",
            Self::MajorRevision => "Major Revision",
            Self::Reject => "Reject",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreDimension {
    Novelty,
    Methodology,
    Clarity,
    Significance,
    Citations,
}

impl ScoreDimension {
    /// Display order of the score rows.
    pub const ALL: [ScoreDimension; 5] = [
        Self::Novelty,
        Self::Methodology,
        Self::Clarity,
        Self::Significance,
        Self::Citations,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Novelty => "novelty",
            Self::Methodology => "methodology",
            Self::Clarity => "clarity",
            Self::Significance => "significance",
            Self::Citations => "citations",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Novelty => "Novelty",
            Self::Methodology => "Methodology",
            Self::Clarity => "Clarity",
            Self::Significance => "Significance",
            Self::Citations => "Citations",
        }
    }
}

/// Sub-scores; `None` means the model omitted the key.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperScores {
    pub novelty: Option<f64>,
    pub methodology: Option<f64>,
    pub clarity: Option<f64>,
    pub significance: Option<f64>,
    pub citations: Option<f64>,
}

impl PaperScores {
    pub fn get(&self, dimension: ScoreDimension) -> Option<f64> {
        match dimension {
            ScoreDimension::Novelty => self.novelty,
            ScoreDimension::Methodology => self.methodology,
            ScoreDimension::Clarity => self.clarity,
            ScoreDimension::Significance => self.significance,
            ScoreDimension::Citations => self.citations,
        }
    }

    /// Missing scores read as zero.
    pub fn value_or_zero(&self, dimension: ScoreDimension) -> f64 {
        self.get(dimension).unwrap_or(0.0)
    }

    pub fn missing(&self) -> Vec<ScoreDimension> {
        ScoreDimension::ALL
            .into_iter()
            .filter(|dimension| self.get(*dimension).is_none())
            .collect()
    }

    fn validate(&self) -> ReviewResult<()> {
        for dimension in ScoreDimension::ALL {
            if let Some(value) = self.get(dimension) {
                ensure!(
                    value.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&value),
                    ScoreOutOfRangeSnafu {
                        stage: "validate-scores",
                        field: dimension.key(),
                        value,
                    }
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewData {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    pub summary: String,
    #[serde(default)]
    pub scores: PaperScores,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub detailed_feedback: String,
    pub decision: Decision,
}

/// Response schema sent with the review request.
pub fn review_response_schema() -> serde_json::Value {
    let score = |dimension: &str| {
        json!({ "type": "NUMBER", "description": format!("{dimension} score from 1-10") })
    };
    let decisions = Decision::ALL.map(Decision::label);

    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING", "description": "The title of the paper" },
            "authors": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "List of authors if detected"
            },
            "summary": {
                "type": "STRING",
                "description": "A concise summary of the paper (max 200 words)"
            },
            "scores": {
                "type": "OBJECT",
                "properties": {
                    "novelty": score("Novelty"),
                    "methodology": score("Methodology"),
                    "clarity": score("Clarity"),
                    "significance": score("Significance"),
                    "citations": score("Citations"),
                },
                "required": ScoreDimension::ALL.map(ScoreDimension::key),
            },
            "strengths": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "List of 3-5 key strengths"
            },
            "weaknesses": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "List of 3-5 key weaknesses"
            },
            "detailedFeedback": {
                "type": "STRING",
                "description": "Detailed qualitative feedback and suggestions for improvement"
            },
            "decision": {
                "type": "STRING",
                "enum": decisions,
                "description": "Final recommendation"
            }
        },
        "required": [
            "title",
            "summary",
            "scores",
            "strengths",
            "weaknesses",
            "detailedFeedback",
            "decision"
        ]
    })
}

/// Removes markdown code fences the model sometimes wraps around JSON.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parses and validates raw model output into a review.
pub fn parse_review(text: &str) -> ReviewResult<ReviewData> {
    let clean = strip_code_fences(text);

    let review = serde_json::from_str::<ReviewData>(&clean).map_err(|source| {
        if source.is_data() {
            ReviewError::SchemaViolation {
                stage: "parse-review-json",
                source,
            }
        } else {
            ReviewError::MalformedJson {
                stage: "parse-review-json",
                source,
            }
        }
    })?;

    review.scores.validate()?;

    let missing = review.scores.missing();
    if !missing.is_empty() {
        tracing::warn!(
            missing = ?missing.iter().map(|dimension| dimension.key()).collect::<Vec<_>>(),
            "review response omitted scores; rendering them as zero"
        );
    }

    Ok(review)
}
