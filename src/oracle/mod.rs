//! Scoring oracle seam.
//!
//! The engine never knows which model backs a [`ScoringOracle`]: the HTTP
//! implementation talks to an OpenAI-compatible chat-completions endpoint and
//! the mock returns fixed, deterministic replies when no key is configured.

pub mod http;
pub mod mock;
pub mod structured_output;

use crate::errors::AppResult;
use crate::models::{
    AnalysisRequest, AnalysisResult, SuggestedSubcategory, TrackerSettings, WeeklyReport, WeeklySummaryItem,
};
use async_trait::async_trait;
use std::sync::Arc;

pub use http::HttpOracle;
pub use mock::MockOracle;

#[async_trait]
pub trait ScoringOracle: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze_entry(&self, request: &AnalysisRequest) -> AppResult<AnalysisResult>;

    async fn suggest_subcategories(
        &self,
        goal_title: &str,
        goal_description: Option<&str>,
    ) -> AppResult<Vec<SuggestedSubcategory>>;

    async fn weekly_report(&self, goal_title: &str, entries: &[WeeklySummaryItem]) -> AppResult<WeeklyReport>;
}

pub fn build_oracle(settings: &TrackerSettings, api_key: Option<String>) -> AppResult<Arc<dyn ScoringOracle>> {
    match api_key.filter(|key| !key.trim().is_empty()) {
        Some(key) => Ok(Arc::new(HttpOracle::new(settings, key)?)),
        None => {
            tracing::warn!("oracle api key not set, using mock oracle");
            Ok(Arc::new(MockOracle))
        }
    }
}
