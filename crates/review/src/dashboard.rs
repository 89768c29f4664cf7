use std::fmt;

use crate::schema::{Decision, ReviewData, ScoreDimension};

const BAR_CELLS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeTone {
    Positive,
    Informative,
    Caution,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionBadge {
    pub decision: Decision,
    pub tone: BadgeTone,
}

impl DecisionBadge {
    pub fn new(decision: Decision) -> Self {
        let tone = match decision {
            Decision::Accept => BadgeTone::Positive,
            Decision::MinorRevision => BadgeTone::Informative,
            Decision::MajorRevision => BadgeTone::Caution,
            Decision::Reject => BadgeTone::Negative,
        };
        Self { decision, tone }
    }

    pub fn label(&self) -> &'static str {
        self.decision.label()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRow {
    pub dimension: ScoreDimension,
    pub score: f64,
    pub missing: bool,
}

impl ScoreRow {
    pub fn label(&self) -> &'static str {
        self.dimension.label()
    }

    pub fn bar_width_percent(&self) -> f64 {
        (self.score * 10.0).clamp(0.0, 100.0)
    }
}

/// Render-ready view of one review.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub title: String,
    pub authors_line: String,
    pub badge: DecisionBadge,
    pub summary: String,
    pub score_rows: Vec<ScoreRow>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub detailed_feedback: String,
}

impl Dashboard {
    pub fn from_review(review: &ReviewData) -> Self {
        let score_rows = ScoreDimension::ALL
            .into_iter()
            .map(|dimension| ScoreRow {
                dimension,
                score: review.scores.value_or_zero(dimension),
                missing: review.scores.get(dimension).is_none(),
            })
            .collect();

        let authors_line = if review.authors.is_empty() {
            "Unknown authors".to_string()
        } else {
            review.authors.join(", ")
        };

        Self {
            title: review.title.clone(),
            authors_line,
            badge: DecisionBadge::new(review.decision),
            summary: review.summary.clone(),
            score_rows,
            strengths: review.strengths.clone(),
            weaknesses: review.weaknesses.clone(),
            detailed_feedback: review.detailed_feedback.clone(),
        }
    }

    pub fn overall_score(&self) -> f64 {
        if self.score_rows.is_empty() {
            return 0.0;
        }
        let total = self.score_rows.iter().map(|row| row.score).sum::<f64>();
        total / self.score_rows.len() as f64
    }
}

fn bar(percent: f64) -> String {
    let filled = ((percent / 100.0) * BAR_CELLS as f64).round() as usize;
    let filled = filled.min(BAR_CELLS);
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_CELLS - filled))
}

fn write_list(formatter: &mut fmt::Formatter<'_>, heading: &str, items: &[String]) -> fmt::Result {
    writeln!(formatter, "{heading}")?;
    if items.is_empty() {
        return writeln!(formatter, "  (none)");
    }
    for item in items {
        writeln!(formatter, "  - {item}")?;
    }
    Ok(())
}

impl fmt::Display for Dashboard {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(formatter, "{}", self.title)?;
        writeln!(formatter, "{}", self.authors_line)?;
        writeln!(formatter, "Decision: [{}]", self.badge.label())?;
        writeln!(formatter)?;
        writeln!(formatter, "Summary")?;
        writeln!(formatter, "  {}", self.summary)?;
        writeln!(formatter)?;
        writeln!(formatter, "Scores (overall {:.1}/10)", self.overall_score())?;
        for row in &self.score_rows {
            writeln!(
                formatter,
                "  {:<13} {} {}/10",
                row.label(),
                bar(row.bar_width_percent()),
                row.score
            )?;
        }
        writeln!(formatter)?;
        write_list(formatter, "Strengths", &self.strengths)?;
        write_list(formatter, "Weaknesses", &self.weaknesses)?;
        writeln!(formatter)?;
        writeln!(formatter, "Detailed feedback")?;
        write!(formatter, "  {}", self.detailed_feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PaperScores;

    fn review(decision: Decision, scores: PaperScores) -> ReviewData {
        ReviewData {
            title: "Attention Is All You Need".to_string(),
            authors: Vec::new(),
            summary: "Transformers.".to_string(),
            scores,
            strengths: vec!["Parallelism".to_string()],
            weaknesses: Vec::new(),
            detailed_feedback: "Add ablations.".to_string(),
            decision,
        }
    }

    #[test]
    fn reject_review_renders_badge_and_all_five_rows() {
        let scores = PaperScores {
            novelty: Some(3.0),
            methodology: Some(4.0),
            clarity: Some(5.0),
            significance: Some(2.0),
            citations: Some(6.0),
        };
        let dashboard = Dashboard::from_review(&review(Decision::Reject, scores));

        assert_eq!(dashboard.badge.tone, BadgeTone::Negative);
        assert_eq!(dashboard.badge.label(), "Reject");
        assert_eq!(dashboard.score_rows.len(), 5);
        assert!(dashboard.score_rows.iter().all(|row| !row.missing));
        assert_eq!(
            dashboard
                .score_rows
                .iter()
                .map(|row| row.label())
                .collect::<Vec<_>>(),
            vec!["Novelty", "Methodology", "Clarity", "Significance", "Citations"]
        );
        assert_eq!(dashboard.score_rows[4].score, 6.0);
        assert_eq!(dashboard.score_rows[4].bar_width_percent(), 60.0);
    }

    #[test]
    fn absent_score_is_shown_as_zero() {
        let scores = PaperScores {
            novelty: Some(8.0),
            ..PaperScores::default()
        };
        let dashboard = Dashboard::from_review(&review(Decision::Accept, scores));

        assert_eq!(dashboard.badge.tone, BadgeTone::Positive);
        assert_eq!(dashboard.score_rows[0].score, 8.0);
        assert!(!dashboard.score_rows[0].missing);
        assert!(dashboard.score_rows[1..].iter().all(|row| row.missing && row.score == 0.0));
    }

    #[test]
    fn every_decision_has_a_distinct_tone() {
        let tones = Decision::ALL
            .map(|decision| DecisionBadge::new(decision).tone)
            .to_vec();
        assert_eq!(
            tones,
            vec![
                BadgeTone::Positive,
                BadgeTone::Informative,
                BadgeTone::Caution,
                BadgeTone::Negative
            ]
        );
    }

    #[test]
    fn text_rendering_mentions_decision_and_authors_fallback() {
        let dashboard = Dashboard::from_review(&review(Decision::MajorRevision, PaperScores::default()));
        let text = dashboard.to_string();

        assert!(text.contains("Decision: [Major Revision]"));
        assert!(text.contains("Unknown authors"));
        assert!(text.contains("(none)"));
        assert!(text.contains("Citations"));
    }
}
