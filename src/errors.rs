use crate::models::EntryDetail;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("VALIDATION_FAILED: {0}")]
    Validation(String),
    #[error("NO_ACTIVE_GOAL: create a goal first before adding entries")]
    NoActiveGoal,
    #[error("NO_SUBCATEGORIES: add subcategories to your goal first")]
    NoSubcategories,
    #[error("DUPLICATE_ENTRY: an entry already exists for {}", .0.entry.date)]
    DuplicateEntry(Box<EntryDetail>),
    #[error("SCORING_UNAVAILABLE: {0}")]
    ScoringUnavailable(String),
    #[error("INVALID_WEIGHTS: {0}")]
    InvalidWeights(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::NoActiveGoal => "NO_ACTIVE_GOAL",
            Self::NoSubcategories => "NO_SUBCATEGORIES",
            Self::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            Self::ScoringUnavailable(_) => "SCORING_UNAVAILABLE",
            Self::InvalidWeights(_) => "INVALID_WEIGHTS",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Io(_) => "IO_FAILURE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Message safe to hand to a caller. Oracle and storage detail is only
    /// included when `expose_internal` is set.
    pub fn client_message(&self, expose_internal: bool) -> String {
        if expose_internal {
            return self.to_string();
        }
        match self {
            Self::ScoringUnavailable(_) => {
                format!("{}: entry analysis is temporarily unavailable, please try again", self.kind())
            }
            Self::Io(_) | Self::Internal(_) => format!("{}: something went wrong", self.kind()),
            _ => self.to_string(),
        }
    }

    pub fn existing_entry(&self) -> Option<&EntryDetail> {
        match self {
            Self::DuplicateEntry(existing) => Some(existing),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        Self::Io(value.without_url().to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn client_message_hides_internal_detail() {
        let error = AppError::Internal("no such table: entries".to_string());
        let message = error.client_message(false);
        assert!(message.starts_with("INTERNAL"));
        assert!(!message.contains("entries"));
        assert!(error.client_message(true).contains("no such table"));
    }

    #[test]
    fn client_message_keeps_domain_errors() {
        let error = AppError::InvalidWeights("weights must sum to a positive value".to_string());
        assert_eq!(
            error.client_message(false),
            "INVALID_WEIGHTS: weights must sum to a positive value"
        );
        assert_eq!(AppError::NoActiveGoal.kind(), "NO_ACTIVE_GOAL");
    }
}
