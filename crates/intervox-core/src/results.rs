//! End-of-interview results hand-off.

use async_trait::async_trait;
use intervox_types::Feedback;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{IntervoxError, Result};
use crate::session::InterviewOutcome;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// External collaborator that receives the frozen session outcome.
///
/// Injected into the coordinator; tests substitute a mock. A collaborator
/// may return a [`Feedback`] evaluation, which the coordinator records on
/// its final snapshot.
#[async_trait]
pub trait ResultsCollaborator: Send + Sync {
    /// Consumes one frozen interview outcome.
    ///
    /// # Errors
    ///
    /// Returns a scoring error if the outcome could not be delivered or
    /// evaluated. The coordinator surfaces this as status; it is never
    /// fatal to the session.
    async fn deliver(&self, outcome: InterviewOutcome) -> Result<Option<Feedback>>;
}

/// Response body of the scoring endpoint.
#[derive(Debug, Deserialize)]
struct ScoringResponse {
    success: bool,
    #[serde(default)]
    feedback: Option<Feedback>,
    #[serde(default)]
    message: Option<String>,
}

/// Results collaborator that posts the outcome to the interview service's
/// one-shot scoring endpoint.
pub struct HttpResultsClient {
    client: Client,
    endpoint: String,
}

impl HttpResultsClient {
    /// Creates a client posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
        }
    }

    /// Overrides the HTTP client after construction.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl ResultsCollaborator for HttpResultsClient {
    async fn deliver(&self, outcome: InterviewOutcome) -> Result<Option<Feedback>> {
        tracing::info!(
            endpoint = %self.endpoint,
            utterances = outcome.transcript.len(),
            "submitting interview outcome for scoring"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .json(&outcome)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntervoxError::Scoring(format!(
                "scoring endpoint returned {status}"
            )));
        }

        let body: ScoringResponse = response.json().await?;
        if !body.success {
            return Err(IntervoxError::Scoring(
                body.message
                    .unwrap_or_else(|| "scoring endpoint reported failure".to_string()),
            ));
        }
        Ok(body.feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoring_response_parses_with_feedback() {
        let body: ScoringResponse = serde_json::from_str(
            r#"{
                "success": true,
                "feedback": {
                    "clarification": 3,
                    "reasoning": 4,
                    "solution": 4,
                    "total": 11,
                    "recommendation": "Hire",
                    "explanation": "Asked the right questions early."
                },
                "message": "Interview ended and feedback generated successfully"
            }"#,
        )
        .unwrap();
        assert!(body.success);
        assert_eq!(body.feedback.unwrap().total, 11);
    }

    #[test]
    fn scoring_response_tolerates_missing_feedback() {
        let body: ScoringResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(!body.success);
        assert!(body.feedback.is_none());
        assert!(body.message.is_none());
    }
}
