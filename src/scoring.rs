use crate::errors::AppResult;
use crate::models::{AnalysisRequest, AnalysisResult, Goal, NewEntryScore, Subcategory, SubcategoryAnalysis};
use crate::oracle::ScoringOracle;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub analysis: AnalysisResult,
    pub scores: Vec<NewEntryScore>,
}

/// Maps oracle labels onto the goal's subcategories by case-insensitive name.
/// Unknown labels are dropped; when a label repeats, the first one wins.
pub fn reconcile_scores(subcategories: &[Subcategory], analyses: &[SubcategoryAnalysis]) -> Vec<NewEntryScore> {
    let mut seen = HashSet::new();
    analyses
        .iter()
        .filter_map(|analysis| {
            let label = analysis.name.trim().to_lowercase();
            let subcategory = subcategories
                .iter()
                .find(|subcategory| subcategory.name.trim().to_lowercase() == label)?;
            if !seen.insert(subcategory.id.as_str()) {
                return None;
            }
            Some(NewEntryScore {
                subcategory_id: subcategory.id.clone(),
                subcategory_name: subcategory.name.clone(),
                score: analysis.score,
                actions: analysis.actions.clone(),
                comment: analysis.comment.clone(),
            })
        })
        .collect()
}

/// Runs the oracle for one entry. Holds no storage resources; failures
/// propagate unchanged so nothing is persisted.
pub async fn score_entry(
    oracle: &dyn ScoringOracle,
    goal: &Goal,
    subcategories: &[Subcategory],
    raw_text: &str,
) -> AppResult<ScoredEntry> {
    let request = AnalysisRequest {
        raw_text: raw_text.to_string(),
        goal_title: goal.title.clone(),
        subcategory_names: subcategories.iter().map(|subcategory| subcategory.name.clone()).collect(),
    };
    let analysis = oracle.analyze_entry(&request).await?;
    let scores = reconcile_scores(subcategories, &analysis.subcategories);
    let dropped = analysis.subcategories.len().saturating_sub(scores.len());
    if dropped > 0 {
        tracing::debug!(
            goal_id = %goal.id,
            oracle = oracle.name(),
            dropped,
            "dropped unmatched oracle labels"
        );
    }
    Ok(ScoredEntry { analysis, scores })
}
