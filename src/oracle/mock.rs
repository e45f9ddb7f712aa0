use super::ScoringOracle;
use crate::errors::AppResult;
use crate::models::{
    AnalysisRequest, AnalysisResult, SubcategoryAnalysis, SuggestedSubcategory, Trend, WeeklyReport,
    WeeklySummaryItem,
};
use async_trait::async_trait;

const MOCK_SCORES: [f64; 5] = [8.0, 6.0, 4.0, 7.0, 5.0];

#[derive(Debug, Clone, Copy, Default)]
pub struct MockOracle;

#[async_trait]
impl ScoringOracle for MockOracle {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn analyze_entry(&self, request: &AnalysisRequest) -> AppResult<AnalysisResult> {
        let subcategories = request
            .subcategory_names
            .iter()
            .enumerate()
            .map(|(index, name)| SubcategoryAnalysis {
                name: name.clone(),
                score: MOCK_SCORES[index % MOCK_SCORES.len()],
                actions: vec![format!("Action from the text related to \"{name}\"")],
                comment: format!("Good activity in {name}."),
            })
            .collect::<Vec<_>>();

        let total_score = if subcategories.is_empty() {
            0.0
        } else {
            let mean = subcategories.iter().map(|item| item.score).sum::<f64>() / subcategories.len() as f64;
            (mean * 10.0).round()
        };

        Ok(AnalysisResult {
            subcategories,
            total_score,
            overall_comment: "Productive day! You are taking concrete steps toward the goal. Keep this pace."
                .to_string(),
            strengths: vec!["Systematic approach".to_string(), "Variety of actions".to_string()],
            suggestions: vec![
                "Try adding more networking actions".to_string(),
                "Plan one concrete task for tomorrow".to_string(),
            ],
        })
    }

    async fn suggest_subcategories(
        &self,
        _goal_title: &str,
        _goal_description: Option<&str>,
    ) -> AppResult<Vec<SuggestedSubcategory>> {
        Ok([
            ("Income", "💼", 0.4, "#10b981", "Actions that directly affect earnings"),
            ("Skills", "📚", 0.25, "#6366f1", "Learning, practice, building expertise"),
            ("Network", "🤝", 0.2, "#f59e0b", "Contacts, partnerships, connections"),
            ("Health", "💪", 0.15, "#ef4444", "Physical and mental health"),
        ]
        .into_iter()
        .map(|(name, emoji, weight, color, description)| SuggestedSubcategory {
            name: name.to_string(),
            emoji: emoji.to_string(),
            weight,
            color: color.to_string(),
            description: description.to_string(),
        })
        .collect())
    }

    async fn weekly_report(&self, _goal_title: &str, _entries: &[WeeklySummaryItem]) -> AppResult<WeeklyReport> {
        Ok(WeeklyReport {
            summary: "A good week: you were active on 5 of 7 days. Most progress came from income and skills."
                .to_string(),
            top_category: "Income".to_string(),
            weak_category: "Network".to_string(),
            trend: Trend::Improving,
            insights: vec![
                "You are most productive on Tuesday and Thursday".to_string(),
                "Networking actions were rare, only 2 this week".to_string(),
                "Activity grew 20% compared to last week".to_string(),
            ],
            next_week_focus: "Focus on networking: plan 3 concrete introductions or meetings.".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::MockOracle;
    use crate::models::AnalysisRequest;
    use crate::oracle::ScoringOracle;

    #[tokio::test]
    async fn analysis_cycles_scores_and_derives_total() {
        let request = AnalysisRequest {
            raw_text: "worked out and read".to_string(),
            goal_title: "Earn more".to_string(),
            subcategory_names: vec!["Income".to_string(), "Skills".to_string(), "Health".to_string()],
        };
        let result = MockOracle.analyze_entry(&request).await.expect("analysis");
        let scores = result.subcategories.iter().map(|item| item.score).collect::<Vec<_>>();
        assert_eq!(scores, vec![8.0, 6.0, 4.0]);
        assert_eq!(result.total_score, 60.0);
    }

    #[tokio::test]
    async fn suggestions_sum_to_one() {
        let suggestions = MockOracle.suggest_subcategories("Earn more", None).await.expect("suggest");
        assert_eq!(suggestions.len(), 4);
        let total: f64 = suggestions.iter().map(|item| item.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
