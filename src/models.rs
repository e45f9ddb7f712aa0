use crate::calendar::DayKey;
use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    pub id: String,
    pub goal_id: String,
    pub name: String,
    pub emoji: String,
    pub color: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub user_id: String,
    pub goal_id: String,
    pub raw_text: String,
    pub date: DayKey,
    pub total_score: f64,
    pub ai_comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryScore {
    pub id: String,
    pub entry_id: String,
    /// `None` once the subcategory has been replaced.
    pub subcategory_id: Option<String>,
    pub subcategory_name: String,
    pub score: f64,
    pub actions: Vec<String>,
    pub ai_comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryDetail {
    pub entry: Entry,
    pub scores: Vec<EntryScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub user_id: String,
    pub goal_id: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_score: f64,
    pub total_entries: u32,
    pub last_entry_date: Option<DayKey>,
    pub progress_percent: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub telegram_id: Option<String>,
    pub first_name: Option<String>,
    pub username: Option<String>,
}

impl UserRecord {
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.username.as_deref().filter(|name| !name.trim().is_empty()))
            .unwrap_or("friend")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreakUpdate {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub is_new: bool,
}

/// A reconciled per-subcategory score ready to be persisted with its entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntryScore {
    pub subcategory_id: String,
    pub subcategory_name: String,
    pub score: f64,
    pub actions: Vec<String>,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalDetail {
    pub goal: Goal,
    pub subcategories: Vec<Subcategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveGoalView {
    pub goal: Goal,
    pub subcategories: Vec<Subcategory>,
    pub entry_count: u32,
    pub stats: Option<UserStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalPayload {
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalResponse {
    pub goal: GoalDetail,
    pub suggested: Vec<SuggestedSubcategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryInput {
    pub name: String,
    pub emoji: String,
    pub color: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubmitEntryPayload {
    pub raw_text: String,
    /// Defaults to now when absent.
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitEntryResponse {
    pub entry: EntryDetail,
    pub analysis: AnalysisResult,
    pub streak: StreakUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u32,
    pub pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPage {
    pub entries: Vec<EntryDetail>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayEntry {
    pub has_entry: bool,
    pub entry: Option<EntryDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalSummary {
    pub id: String,
    pub title: String,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_entries: u32,
    pub progress_percent: f64,
    pub last_entry_date: Option<DayKey>,
}

impl From<Option<&UserStats>> for StatsSnapshot {
    fn from(stats: Option<&UserStats>) -> Self {
        match stats {
            Some(stats) => Self {
                current_streak: stats.current_streak,
                longest_streak: stats.longest_streak,
                total_entries: stats.total_entries,
                progress_percent: stats.progress_percent,
                last_entry_date: stats.last_entry_date,
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryWeek {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub color: String,
    pub weight: f64,
    pub week_avg_score: f64,
    pub week_entries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeekSummary {
    pub entries: u32,
    pub avg_score: f64,
    pub subcategories: Vec<SubcategoryWeek>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecentEntry {
    pub id: String,
    pub date: DayKey,
    pub total_score: f64,
    pub ai_comment: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub days_left: Option<i64>,
    pub on_track: bool,
    pub projected_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub goal: GoalSummary,
    pub stats: StatsSnapshot,
    pub week: WeekSummary,
    pub recent_entries: Vec<RecentEntry>,
    pub forecast: Forecast,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub date: DayKey,
    pub score: f64,
    pub has_entry: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPoint {
    pub date: DayKey,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryChart {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub color: String,
    pub data: Vec<CategoryPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub chart_data: Vec<ChartPoint>,
    pub category_charts: Vec<CategoryChart>,
}

// Oracle contract.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryAnalysis {
    pub name: String,
    pub score: f64,
    pub actions: Vec<String>,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub subcategories: Vec<SubcategoryAnalysis>,
    pub total_score: f64,
    pub overall_comment: String,
    pub strengths: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub raw_text: String,
    pub goal_title: String,
    pub subcategory_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedSubcategory {
    pub name: String,
    pub emoji: String,
    pub weight: f64,
    pub color: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub summary: String,
    pub top_category: String,
    pub weak_category: String,
    pub trend: Trend,
    pub insights: Vec<String>,
    pub next_week_focus: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummaryItem {
    pub date: String,
    pub total_score: f64,
    pub top_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum WeeklyReportOutcome {
    #[serde(rename_all = "camelCase")]
    Report {
        report: WeeklyReport,
        entries_count: u32,
    },
    InsufficientData {
        message: String,
    },
}

// Notification sweeps.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepKind {
    DailyReminder,
    WeeklyDigest,
}

impl SweepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DailyReminder => "daily-reminder",
            Self::WeeklyDigest => "weekly-digest",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub attempted: u32,
    pub delivered: u32,
    pub failed: u32,
}

/// Recipient row produced by the sweep queries.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepTarget {
    pub user: UserRecord,
    pub goal_id: String,
    pub current_streak: u32,
    pub total_entries: u32,
    pub progress_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Secret {
    OracleApiKey,
    TelegramBotToken,
}

impl Secret {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OracleApiKey => "oracle-api-key",
            Self::TelegramBotToken => "telegram-bot-token",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanResponse {
    pub success: bool,
}

// Settings.

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyTime {
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyTime {
    pub weekday: Weekday,
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerSettings {
    pub oracle_base_url: String,
    pub oracle_model: String,
    pub oracle_timeout_seconds: u64,
    pub telegram_api_base: String,
    /// UTC.
    pub daily_reminder: DailyTime,
    /// UTC.
    pub weekly_report: WeeklyTime,
    pub sweeps_enabled: bool,
    pub expose_internal_errors: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            oracle_base_url: "https://api.groq.com/openai/v1".to_string(),
            oracle_model: "llama-3.3-70b-versatile".to_string(),
            oracle_timeout_seconds: 60,
            telegram_api_base: "https://api.telegram.org".to_string(),
            daily_reminder: DailyTime { hour: 18, minute: 0 },
            weekly_report: WeeklyTime {
                weekday: Weekday::Sun,
                hour: 7,
                minute: 0,
            },
            sweeps_enabled: true,
            expose_internal_errors: false,
        }
    }
}
