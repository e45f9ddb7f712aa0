use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use goal_tracker_lib::models::{
    AnalysisRequest, AnalysisResult, CreateGoalPayload, SubcategoryAnalysis, SubcategoryInput, SubmitEntryPayload,
    SuggestedSubcategory, WeeklyReport, WeeklySummaryItem,
};
use goal_tracker_lib::{AppError, AppResult, Database, GoalTracker, LogNotifier, MockOracle, ScoringOracle};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Hands out queued total scores and labels every configured subcategory.
struct ScriptedOracle {
    totals: Mutex<VecDeque<f64>>,
}

impl ScriptedOracle {
    fn new(totals: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            totals: Mutex::new(totals.iter().copied().collect()),
        })
    }
}

#[async_trait]
impl ScoringOracle for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn analyze_entry(&self, request: &AnalysisRequest) -> AppResult<AnalysisResult> {
        let total = self
            .totals
            .lock()
            .expect("totals lock")
            .pop_front()
            .ok_or_else(|| AppError::ScoringUnavailable("script exhausted".to_string()))?;
        Ok(AnalysisResult {
            subcategories: request
                .subcategory_names
                .iter()
                .map(|name| SubcategoryAnalysis {
                    name: name.to_uppercase(),
                    score: total / 10.0,
                    actions: vec![format!("worked on {name}")],
                    comment: String::new(),
                })
                .collect(),
            total_score: total,
            overall_comment: "steady".to_string(),
            strengths: vec![],
            suggestions: vec![],
        })
    }

    async fn suggest_subcategories(
        &self,
        goal_title: &str,
        goal_description: Option<&str>,
    ) -> AppResult<Vec<SuggestedSubcategory>> {
        MockOracle.suggest_subcategories(goal_title, goal_description).await
    }

    async fn weekly_report(&self, goal_title: &str, entries: &[WeeklySummaryItem]) -> AppResult<WeeklyReport> {
        MockOracle.weekly_report(goal_title, entries).await
    }
}

fn tracker(dir: &tempfile::TempDir, oracle: Arc<dyn ScoringOracle>) -> Arc<GoalTracker> {
    let db = Arc::new(Database::new(&dir.path().join("tracker.db")).expect("db"));
    GoalTracker::with_components(db, oracle, Arc::new(LogNotifier)).expect("tracker")
}

fn goal(title: &str, deadline: Option<DateTime<Utc>>) -> CreateGoalPayload {
    CreateGoalPayload {
        title: title.to_string(),
        description: Some("Grow a consulting business".to_string()),
        deadline,
    }
}

fn entry_on(instant: DateTime<Utc>) -> SubmitEntryPayload {
    SubmitEntryPayload {
        raw_text: "called two clients and practiced pitching".to_string(),
        date: Some(instant),
    }
}

fn march(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn streak_and_progress_follow_daily_submissions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tracker = tracker(&dir, ScriptedOracle::new(&[60.0, 80.0, 50.0]));
    tracker.create_goal("user-1", goal("Earn 1M", None)).await.expect("goal");

    let first = tracker.submit_entry("user-1", entry_on(march(1))).await.expect("day 1");
    assert_eq!((first.streak.current_streak, first.streak.longest_streak), (1, 1));
    assert!(first.streak.is_new);

    let second = tracker.submit_entry("user-1", entry_on(march(2))).await.expect("day 2");
    assert_eq!((second.streak.current_streak, second.streak.longest_streak), (2, 2));

    let fourth = tracker.submit_entry("user-1", entry_on(march(4))).await.expect("day 4");
    assert_eq!((fourth.streak.current_streak, fourth.streak.longest_streak), (1, 2));

    let active = tracker.get_active_goal("user-1").expect("active").expect("exists");
    let stats = active.stats.expect("stats");
    assert_eq!(stats.progress_percent, 63.3);
    assert_eq!(stats.total_entries, 3);
    assert_eq!(active.entry_count, 3);
    assert_eq!(fourth.entry.scores.len(), active.subcategories.len());
}

#[tokio::test]
async fn same_day_resubmission_is_rejected_with_existing_entry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tracker = tracker(&dir, ScriptedOracle::new(&[60.0, 90.0]));
    tracker.create_goal("user-1", goal("Earn 1M", None)).await.expect("goal");

    let first = tracker.submit_entry("user-1", entry_on(march(1))).await.expect("first");
    let err = tracker
        .submit_entry("user-1", entry_on(march(1) + Duration::hours(3)))
        .await
        .expect_err("duplicate");
    assert_eq!(err.kind(), "DUPLICATE_ENTRY");
    assert_eq!(
        err.existing_entry().map(|detail| detail.entry.id.as_str()),
        Some(first.entry.entry.id.as_str())
    );

    let stats = tracker
        .get_active_goal("user-1")
        .expect("active")
        .and_then(|view| view.stats)
        .expect("stats");
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.total_score, 60.0);
    assert_eq!(stats.current_streak, 1);
}

#[tokio::test]
async fn chart_and_dashboard_cover_the_recent_window() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tracker = tracker(&dir, ScriptedOracle::new(&[40.0, 70.0]));
    let deadline = Utc::now() + Duration::days(60);
    tracker
        .create_goal("user-1", goal("Earn 1M", Some(deadline)))
        .await
        .expect("goal");

    tracker
        .submit_entry("user-1", entry_on(Utc::now() - Duration::days(2)))
        .await
        .expect("two days ago");
    tracker
        .submit_entry("user-1", SubmitEntryPayload {
            raw_text: "shipped the proposal".to_string(),
            date: None,
        })
        .await
        .expect("today");

    let chart = tracker.chart("user-1", Some(5)).expect("chart");
    assert_eq!(chart.chart_data.len(), 5);
    let last = chart.chart_data.last().expect("today point");
    assert!(last.has_entry);
    assert_eq!(last.score, 70.0);
    assert!(!chart.chart_data[3].has_entry);
    assert_eq!(chart.chart_data[3].score, 0.0);
    assert!(chart.chart_data[2].has_entry);
    assert_eq!(chart.category_charts.len(), 4);
    assert!(chart.category_charts.iter().all(|series| series.data.len() == 2));

    assert_eq!(tracker.chart("user-1", Some(500)).expect("chart").chart_data.len(), 90);
    assert_eq!(tracker.chart("user-1", None).expect("chart").chart_data.len(), 30);

    let dashboard = tracker.dashboard("user-1").expect("dashboard");
    assert_eq!(dashboard.recent_entries.len(), 2);
    assert_eq!(dashboard.week.entries, 2);
    assert_eq!(dashboard.week.avg_score, 55.0);
    assert_eq!(dashboard.stats.progress_percent, 55.0);
    assert_eq!(dashboard.forecast.days_left, Some(60));
    assert!(dashboard.forecast.on_track);
    assert!(tracker.today_entry("user-1").expect("today").has_entry);
}

#[tokio::test]
async fn subcategory_replacement_is_normalised_and_scoped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tracker = tracker(&dir, ScriptedOracle::new(&[]));
    let created = tracker.create_goal("user-1", goal("Earn 1M", None)).await.expect("goal");
    let goal_id = created.goal.goal.id.clone();

    let input = |name: &str, weight: f64| SubcategoryInput {
        name: name.to_string(),
        emoji: "⭐".to_string(),
        color: "#8b5cf6".to_string(),
        weight,
    };

    let replaced = tracker
        .replace_subcategories("user-1", &goal_id, &[input("Sales", 1.0), input("Craft", 3.0)])
        .expect("replace");
    assert_eq!(replaced.len(), 2);
    assert_eq!(replaced[0].name, "Craft");
    assert_eq!(replaced[0].weight, 0.75);
    assert_eq!(replaced[1].weight, 0.25);

    let err = tracker
        .replace_subcategories("user-1", &goal_id, &[input("Sales", 0.0)])
        .expect_err("zero weights");
    assert!(matches!(err, AppError::InvalidWeights(_)));
    assert_eq!(tracker.get_active_goal("user-1").expect("active").expect("goal").subcategories.len(), 2);

    let err = tracker
        .replace_subcategories("user-2", &goal_id, &[input("Sales", 1.0)])
        .expect_err("foreign goal");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn completion_finalises_progress_and_deletion_cascades() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tracker = tracker(&dir, ScriptedOracle::new(&[30.0, 45.0]));
    let created = tracker.create_goal("user-1", goal("Earn 1M", None)).await.expect("goal");
    let goal_id = created.goal.goal.id.clone();

    let first = tracker.submit_entry("user-1", entry_on(march(10))).await.expect("entry");
    let completed = tracker.complete_goal("user-1", &goal_id).expect("complete");
    assert_eq!(completed.progress_percent, 100.0);

    tracker.submit_entry("user-1", entry_on(march(11))).await.expect("entry");
    let stats = tracker
        .get_active_goal("user-1")
        .expect("active")
        .and_then(|view| view.stats)
        .expect("stats");
    assert_eq!(stats.progress_percent, 100.0);
    assert_eq!(stats.current_streak, 2);

    assert!(tracker.delete_goal("user-1", &goal_id).expect("delete").success);
    let err = tracker.get_entry("user-1", &first.entry.entry.id).expect_err("gone");
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(tracker.get_active_goal("user-1").expect("active").is_none());
    assert!(matches!(
        tracker.delete_goal("user-1", &goal_id),
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn mock_oracle_drives_the_whole_flow_offline() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tracker = tracker(&dir, Arc::new(MockOracle));
    let created = tracker.create_goal("user-1", goal("Earn 1M", None)).await.expect("goal");
    assert_eq!(created.suggested.len(), 4);
    let total_weight: f64 = created.goal.subcategories.iter().map(|item| item.weight).sum();
    assert!((total_weight - 1.0).abs() <= 0.001);

    let response = tracker
        .submit_entry("user-1", entry_on(march(20)))
        .await
        .expect("submit");
    // Scores 8, 6, 4, 7 -> mean 6.25 -> 63 after rounding.
    assert_eq!(response.entry.entry.total_score, 63.0);
    assert_eq!(response.entry.scores.len(), 4);

    let goals = tracker.list_goals("user-1").expect("goals");
    assert_eq!(goals.len(), 1);
}
