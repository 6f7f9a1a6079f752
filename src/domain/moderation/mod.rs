//! Input moderation applied before a chat model sees user input

use async_trait::async_trait;
use std::fmt::Debug;

use crate::domain::DomainError;

pub const DEFAULT_MODERATION_MESSAGE: &str =
    "Cannot Process! Input violates content moderation policies.";

/// Outcome of a moderation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationVerdict {
    Allowed,
    Rejected { message: String },
}

impl ModerationVerdict {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Checks user input before it reaches a model
#[async_trait]
pub trait InputModeration: Send + Sync + Debug {
    async fn check(&self, input: &str) -> Result<ModerationVerdict, DomainError>;
}

/// Rejects input containing any deny-listed phrase, ignoring case
#[derive(Debug, Clone)]
pub struct SimplePromptModeration {
    deny_list: Vec<String>,
    message: String,
}

impl SimplePromptModeration {
    pub fn new(deny_list: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            deny_list: deny_list
                .into_iter()
                .map(|phrase| phrase.into().trim().to_lowercase())
                .filter(|phrase| !phrase.is_empty())
                .collect(),
            message: DEFAULT_MODERATION_MESSAGE.to_string(),
        }
    }

    /// Build from newline-separated deny-list text
    pub fn from_text(text: &str) -> Self {
        Self::new(text.lines())
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        if !message.trim().is_empty() {
            self.message = message;
        }
        self
    }
}

#[async_trait]
impl InputModeration for SimplePromptModeration {
    async fn check(&self, input: &str) -> Result<ModerationVerdict, DomainError> {
        let lowered = input.to_lowercase();

        if self.deny_list.iter().any(|phrase| lowered.contains(phrase)) {
            return Ok(ModerationVerdict::Rejected {
                message: self.message.clone(),
            });
        }

        Ok(ModerationVerdict::Allowed)
    }
}

/// Run every moderation in order; the first rejection wins
pub async fn check_input_moderation(
    moderations: &[Box<dyn InputModeration>],
    input: &str,
) -> Result<ModerationVerdict, DomainError> {
    for moderation in moderations {
        let verdict = moderation.check(input).await?;
        if verdict.is_rejected() {
            return Ok(verdict);
        }
    }

    Ok(ModerationVerdict::Allowed)
}
