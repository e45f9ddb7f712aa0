use crate::errors::{AppError, AppResult};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub static ANALYSIS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::json!({
        "type": "object",
        "properties": {
            "subcategories": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "score": { "type": "number", "minimum": 0, "maximum": 10 },
                        "actions": { "type": "array", "items": { "type": "string" } },
                        "comment": { "type": "string" }
                    },
                    "required": ["name", "score", "actions", "comment"]
                }
            },
            "totalScore": { "type": "number", "minimum": 0, "maximum": 100 },
            "overallComment": { "type": "string" },
            "strengths": { "type": "array", "items": { "type": "string" } },
            "suggestions": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["subcategories", "totalScore", "overallComment", "strengths", "suggestions"]
    })
});

pub static SUGGESTIONS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::json!({
        "type": "object",
        "properties": {
            "subcategories": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "emoji": { "type": "string" },
                        "weight": { "type": "number", "minimum": 0.1, "maximum": 1.0 },
                        "color": { "type": "string" },
                        "description": { "type": "string" }
                    },
                    "required": ["name", "emoji", "weight", "color", "description"]
                }
            }
        },
        "required": ["subcategories"]
    })
});

pub static WEEKLY_REPORT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string" },
            "topCategory": { "type": "string" },
            "weakCategory": { "type": "string" },
            "trend": { "enum": ["improving", "declining", "stable"] },
            "insights": { "type": "array", "items": { "type": "string" } },
            "nextWeekFocus": { "type": "string" }
        },
        "required": ["summary", "topCategory", "weakCategory", "trend", "insights", "nextWeekFocus"]
    })
});

#[derive(Debug, Clone)]
pub struct StructuredOutputValidationResult {
    pub value: Option<Value>,
    pub error: Option<String>,
    pub errors: Vec<String>,
}

pub fn resolve_structured_output(content: Option<&str>) -> Option<Value> {
    content.and_then(parse_json_value)
}

fn parse_json_value(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Some models wrap json_object replies in a markdown fence.
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(unfenced.trim()).ok()
}

pub fn validate_structured_output(value: Option<Value>, schema: &Value) -> StructuredOutputValidationResult {
    let Some(value) = value else {
        return StructuredOutputValidationResult {
            value: None,
            error: Some("oracle reply is missing or invalid JSON".to_string()),
            errors: vec![],
        };
    };

    let compiled = match jsonschema::JSONSchema::compile(schema) {
        Ok(compiled) => compiled,
        Err(error) => {
            return StructuredOutputValidationResult {
                value: Some(value),
                error: Some(format!("failed to compile reply schema: {}", error)),
                errors: vec![],
            }
        }
    };

    let errors: Vec<String> = compiled
        .validate(&value)
        .err()
        .map(|errors| {
            errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("{}: {}", path, error)
                    }
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if errors.is_empty() {
        StructuredOutputValidationResult {
            value: Some(value),
            error: None,
            errors,
        }
    } else {
        StructuredOutputValidationResult {
            value: Some(value),
            error: Some("oracle reply did not match schema".to_string()),
            errors,
        }
    }
}

/// Parses and validates an oracle reply, then deserializes it. Every failure
/// is reported as `ScoringUnavailable`.
pub fn decode_reply<T: DeserializeOwned>(content: Option<&str>, schema: &Value) -> AppResult<T> {
    let validation = validate_structured_output(resolve_structured_output(content), schema);
    if let Some(error) = validation.error {
        let detail = if validation.errors.is_empty() {
            error
        } else {
            format!("{error}: {}", validation.errors.join("; "))
        };
        return Err(AppError::ScoringUnavailable(detail));
    }
    let value = validation
        .value
        .ok_or_else(|| AppError::ScoringUnavailable("oracle reply is empty".to_string()))?;
    serde_json::from_value(value)
        .map_err(|error| AppError::ScoringUnavailable(format!("oracle reply has unexpected shape: {error}")))
}
