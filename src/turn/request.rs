//! Turn and creation request bodies

use crate::core::error::{Result, SandboxError};
use crate::core::types::{StateId, TurnTarget};
use serde::Serialize;

/// The founding questionnaire; answers shape the new nation's policies
pub const POLICY_QUESTIONS: [&str; 10] = [
    "The government should prioritize economic growth over environmental protection",
    "Healthcare should be provided by the government for all citizens",
    "Education should be free at all levels",
    "Military spending should be increased",
    "Immigration policies should be more strict",
    "The tax system should be more progressive",
    "Public transportation should be prioritized over private vehicles",
    "The government should regulate big tech companies more strictly",
    "Renewable energy should be subsidized",
    "Social welfare programs should be expanded",
];

/// Likert answer, 1 (strongly disagree) to 5 (strongly agree)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    StronglyDisagree = 1,
    Disagree = 2,
    Neutral = 3,
    Agree = 4,
    StronglyAgree = 5,
}

impl Rating {
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Rating::StronglyDisagree => "Strongly Disagree",
            Rating::Disagree => "Disagree",
            Rating::Neutral => "Neutral",
            Rating::Agree => "Agree",
            Rating::StronglyAgree => "Strongly Agree",
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = SandboxError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Rating::StronglyDisagree),
            2 => Ok(Rating::Disagree),
            3 => Ok(Rating::Neutral),
            4 => Ok(Rating::Agree),
            5 => Ok(Rating::StronglyAgree),
            _ => Err(SandboxError::InvalidRequest(format!(
                "rating {} is outside 1..=5",
                value
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub value: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct PolicyBody<'a> {
    policy: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct CreateBody<'a> {
    name: &'a str,
    questions: &'a [QuestionAnswer],
}

/// A long-running simulation request
#[derive(Debug, Clone, PartialEq)]
pub enum TurnRequest {
    /// Advance an existing nation by one turn under `policy`
    Play { state_id: StateId, policy: String },
    /// Found a new nation
    Create { name: String, answers: Vec<QuestionAnswer> },
}

impl TurnRequest {
    pub fn play(state_id: StateId, policy: impl Into<String>) -> Self {
        TurnRequest::Play {
            state_id,
            policy: policy.into().trim().to_string(),
        }
    }

    /// Creation request answering every question of [`POLICY_QUESTIONS`] in order
    pub fn create(name: &str, ratings: &[u8]) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SandboxError::InvalidRequest("nation name is required".into()));
        }
        if ratings.len() != POLICY_QUESTIONS.len() {
            return Err(SandboxError::InvalidRequest(format!(
                "expected {} answers, got {}",
                POLICY_QUESTIONS.len(),
                ratings.len()
            )));
        }

        let answers = POLICY_QUESTIONS
            .iter()
            .zip(ratings)
            .map(|(question, &value)| {
                Ok(QuestionAnswer {
                    question: question.to_string(),
                    value: Rating::try_from(value)?.value(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TurnRequest::Create {
            name: name.to_string(),
            answers,
        })
    }

    /// Key of the in-flight lock
    pub fn target(&self) -> TurnTarget {
        match self {
            TurnRequest::Play { state_id, .. } => TurnTarget::Nation(*state_id),
            TurnRequest::Create { .. } => TurnTarget::Creation,
        }
    }

    /// Endpoint path relative to the API base URL
    pub fn path(&self) -> String {
        match self {
            TurnRequest::Play { state_id, .. } => format!("/api/states/{}/snapshots", state_id),
            TurnRequest::Create { .. } => "/api/states".to_string(),
        }
    }

    /// JSON request body
    pub fn body(&self) -> serde_json::Value {
        // Both bodies are plain structs of strings and integers
        let body = match self {
            TurnRequest::Play { policy, .. } => serde_json::to_value(PolicyBody { policy: policy.as_str() }),
            TurnRequest::Create { name, answers } => serde_json::to_value(CreateBody {
                name: name.as_str(),
                questions: answers.as_slice(),
            }),
        };
        body.unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_play_request() {
        let request = TurnRequest::play(StateId(12), "  Raise the minimum wage.\n");
        assert_eq!(request.target(), TurnTarget::Nation(StateId(12)));
        assert_eq!(request.path(), "/api/states/12/snapshots");
        assert_eq!(request.body(), json!({"policy": "Raise the minimum wage."}));
    }

    #[test]
    fn test_create_request() {
        let request = TurnRequest::create("Veloria", &[1, 2, 3, 4, 5, 5, 4, 3, 2, 1]).unwrap();
        assert_eq!(request.target(), TurnTarget::Creation);
        assert_eq!(request.path(), "/api/states");
        let body = request.body();
        assert_eq!(body["name"], "Veloria");
        assert_eq!(body["questions"].as_array().unwrap().len(), 10);
        assert_eq!(body["questions"][0]["question"], POLICY_QUESTIONS[0]);
        assert_eq!(body["questions"][4]["value"], 5);
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let result = TurnRequest::create("   ", &[3; 10]);
        assert!(matches!(result, Err(SandboxError::InvalidRequest(_))));
    }

    #[test]
    fn test_create_rejects_missing_answers() {
        assert!(TurnRequest::create("Veloria", &[3; 9]).is_err());
    }

    #[test]
    fn test_create_rejects_out_of_range_rating() {
        let mut ratings = [3u8; 10];
        ratings[7] = 6;
        assert!(TurnRequest::create("Veloria", &ratings).is_err());
    }

    #[test]
    fn test_rating_labels() {
        assert_eq!(Rating::try_from(1u8).unwrap().label(), "Strongly Disagree");
        assert_eq!(Rating::try_from(5u8).unwrap().label(), "Strongly Agree");
        assert!(Rating::try_from(0u8).is_err());
    }
}
