//! Structured interview evaluation returned by the scoring endpoint.

use serde::{Deserialize, Serialize};

/// Hiring recommendation as emitted by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Strong Hire")]
    StrongHire,
    #[serde(rename = "Hire")]
    Hire,
    #[serde(rename = "No Hire")]
    NoHire,
    #[serde(rename = "Strong No Hire")]
    StrongNoHire,
}

/// Scored evaluation of one interview session.
///
/// Each dimension is scored 0-5; `total` is the 0-15 sum computed by the
/// evaluator, carried verbatim rather than recomputed client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub clarification: u8,
    pub reasoning: u8,
    pub solution: u8,
    pub total: u8,
    pub recommendation: Recommendation,
    pub explanation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_evaluator_payload() {
        let json = r#"{
            "clarification": 4,
            "reasoning": 3,
            "solution": 5,
            "total": 12,
            "recommendation": "Hire",
            "explanation": "Solid problem decomposition."
        }"#;
        let feedback: Feedback = serde_json::from_str(json).unwrap();
        assert_eq!(feedback.total, 12);
        assert_eq!(feedback.recommendation, Recommendation::Hire);
    }

    #[test]
    fn recommendation_uses_spaced_names() {
        let json = serde_json::to_string(&Recommendation::StrongNoHire).unwrap();
        assert_eq!(json, "\"Strong No Hire\"");
    }
}
