use super::structured_output::{decode_reply, ANALYSIS_SCHEMA, SUGGESTIONS_SCHEMA, WEEKLY_REPORT_SCHEMA};
use super::ScoringOracle;
use crate::errors::{AppError, AppResult};
use crate::models::{
    AnalysisRequest, AnalysisResult, SuggestedSubcategory, TrackerSettings, WeeklyReport, WeeklySummaryItem,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct SuggestionEnvelope {
    subcategories: Vec<SuggestedSubcategory>,
}

struct CompletionParams {
    temperature: f64,
    max_tokens: u32,
}

const ANALYSIS_PARAMS: CompletionParams = CompletionParams {
    temperature: 0.3,
    max_tokens: 1000,
};
const SUGGESTION_PARAMS: CompletionParams = CompletionParams {
    temperature: 0.5,
    max_tokens: 500,
};
const WEEKLY_PARAMS: CompletionParams = CompletionParams {
    temperature: 0.4,
    max_tokens: 600,
};

/// OpenAI-compatible chat-completions client.
pub struct HttpOracle {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl HttpOracle {
    pub fn new(settings: &TrackerSettings, api_key: String) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.oracle_timeout_seconds.max(1)))
            .build()
            .map_err(|error| AppError::Internal(format!("failed to build oracle http client: {error}")))?;
        Ok(Self {
            client,
            api_base: settings.oracle_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.oracle_model.clone(),
        })
    }

    async fn complete(&self, prompt: String, params: &CompletionParams) -> AppResult<Option<String>> {
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "oracle request");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "response_format": { "type": "json_object" },
                "temperature": params.temperature,
                "max_tokens": params.max_tokens,
            }))
            .send()
            .await
            .map_err(|error| AppError::ScoringUnavailable(format!("oracle request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "oracle returned error status");
            return Err(AppError::ScoringUnavailable(format!("oracle returned status {status}")));
        }

        let data = response
            .json::<serde_json::Value>()
            .await
            .map_err(|error| AppError::ScoringUnavailable(format!("oracle reply was not JSON: {error}")))?;

        let content = data
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .filter(|content| !content.trim().is_empty())
            .map(ToString::to_string);
        tracing::debug!(
            model = %self.model,
            reply_chars = content.as_ref().map(String::len).unwrap_or(0),
            "oracle reply"
        );
        Ok(content)
    }
}

#[async_trait]
impl ScoringOracle for HttpOracle {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn analyze_entry(&self, request: &AnalysisRequest) -> AppResult<AnalysisResult> {
        let content = self.complete(analysis_prompt(request), &ANALYSIS_PARAMS).await?;
        if content.is_none() {
            return Err(AppError::ScoringUnavailable("empty response from oracle".to_string()));
        }
        decode_reply(content.as_deref(), &ANALYSIS_SCHEMA)
    }

    async fn suggest_subcategories(
        &self,
        goal_title: &str,
        goal_description: Option<&str>,
    ) -> AppResult<Vec<SuggestedSubcategory>> {
        let content = self
            .complete(suggestion_prompt(goal_title, goal_description), &SUGGESTION_PARAMS)
            .await?;
        if content.is_none() {
            return Err(AppError::ScoringUnavailable("empty response from oracle".to_string()));
        }
        let envelope: SuggestionEnvelope = decode_reply(content.as_deref(), &SUGGESTIONS_SCHEMA)?;
        Ok(envelope.subcategories)
    }

    async fn weekly_report(&self, goal_title: &str, entries: &[WeeklySummaryItem]) -> AppResult<WeeklyReport> {
        let content = self.complete(weekly_prompt(goal_title, entries), &WEEKLY_PARAMS).await?;
        if content.is_none() {
            return Err(AppError::ScoringUnavailable("empty response from oracle".to_string()));
        }
        decode_reply(content.as_deref(), &WEEKLY_REPORT_SCHEMA)
    }
}

fn analysis_prompt(request: &AnalysisRequest) -> String {
    format!(
        r#"You are an AI coach helping people reach big life goals.

User goal: "{title}"
Goal subcategories: {names}

What the user did today:
"{text}"

Analyze the text and return JSON with this structure:
{{
  "subcategories": [
    {{
      "name": "subcategory name from the list above",
      "score": number from 0 to 10 (0 = no actions, 10 = maximum contribution),
      "actions": ["concrete action 1", "concrete action 2"],
      "comment": "short comment on the contribution to this subcategory"
    }}
  ],
  "totalScore": number from 0 to 100 (weighted score for the whole day),
  "overallComment": "2-3 sentences: what went well and what to improve. Motivating and specific.",
  "strengths": ["strength 1", "strength 2"],
  "suggestions": ["concrete suggestion 1", "concrete suggestion 2"]
}}

Rules:
- Score only what is explicitly in the text. Do not invent actions.
- If a subcategory has no actions, score = 0 and actions = [].
- Return ONLY valid JSON, no explanations."#,
        title = request.goal_title,
        names = request.subcategory_names.join(", "),
        text = request.raw_text,
    )
}

fn suggestion_prompt(goal_title: &str, goal_description: Option<&str>) -> String {
    let description = goal_description
        .filter(|description| !description.trim().is_empty())
        .map(|description| format!("Description: \"{description}\"\n"))
        .unwrap_or_default();
    format!(
        r#"The user is setting a big life goal. Suggest 4-5 subcategories for tracking progress.

Goal: "{goal_title}"
{description}
Return JSON:
{{
  "subcategories": [
    {{
      "name": "short name (1-2 words)",
      "emoji": "one emoji",
      "weight": number from 0.1 to 1.0 (weights sum to 1.0),
      "color": "hex color",
      "description": "one sentence on what belongs here"
    }}
  ]
}}

Rules:
- Subcategories must be concrete and measurable through daily actions
- Weights reflect the real contribution to the goal
- The sum of all weights = 1.0
- Return ONLY valid JSON"#
    )
}

fn weekly_prompt(goal_title: &str, entries: &[WeeklySummaryItem]) -> String {
    let activity = entries
        .iter()
        .map(|item| {
            format!(
                "- {}: score {}, active categories: {}",
                item.date,
                item.total_score,
                item.top_categories.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"You are an AI coach. Write a weekly progress report for the user.

Goal: "{goal_title}"
Activity this week:
{activity}

Return JSON:
{{
  "summary": "2-3 sentences about the week overall",
  "topCategory": "name of the strongest category",
  "weakCategory": "name of the weakest category",
  "trend": "improving" | "declining" | "stable",
  "insights": ["insight 1", "insight 2", "insight 3"],
  "nextWeekFocus": "one concrete recommendation for next week"
}}

Tone: supportive, specific, no filler. Return ONLY valid JSON."#
    )
}
