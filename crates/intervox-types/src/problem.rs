//! The coding problem under interview.

use serde::{Deserialize, Serialize};

/// Problem difficulty as stored by the problem catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A coding problem selected for the interview.
///
/// Fetched by the app shell from the problem catalog before the session
/// starts and injected into the coordinator; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Catalog identifier.
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub solution_link: Option<String>,
    /// Companies known to ask this problem.
    #[serde(default)]
    pub companies: Vec<String>,
    #[serde(default)]
    pub related_topics: Vec<String>,
    #[serde(default)]
    pub similar_questions: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_catalog_payload() {
        let json = r#"{
            "id": 1,
            "title": "Two Sum",
            "description": "Given an array of integers...",
            "difficulty": "Easy",
            "is_premium": false,
            "url": "https://leetcode.com/problems/two-sum/",
            "companies": ["Amazon", "Google"],
            "related_topics": ["Array", "Hash Table"],
            "similar_questions": "3Sum, 4Sum"
        }"#;
        let problem: Problem = serde_json::from_str(json).unwrap();
        assert_eq!(problem.title, "Two Sum");
        assert_eq!(problem.difficulty, Difficulty::Easy);
        assert_eq!(problem.companies.len(), 2);
    }

    #[test]
    fn optional_fields_default() {
        let json = r#"{"id": 9, "title": "Palindrome Number", "difficulty": "Easy"}"#;
        let problem: Problem = serde_json::from_str(json).unwrap();
        assert!(problem.description.is_none());
        assert!(problem.companies.is_empty());
        assert!(!problem.is_premium);
    }
}
