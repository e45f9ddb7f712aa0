use crate::aggregation::{
    category_charts, chart_days, entries_since, fill_chart_series, week_summary, week_window_start,
    weekly_summary_items, RECENT_ENTRY_PREVIEW, RECENT_ENTRY_WINDOW,
};
use crate::calendar::DayKey;
use crate::db::{Database, NewEntry};
use crate::errors::{AppError, AppResult};
use crate::forecast::forecast;
use crate::models::{
    ActiveGoalView, BooleanResponse, ChartView, CreateGoalPayload, CreateGoalResponse, Dashboard, EntryDetail,
    EntryPage, GoalDetail, GoalSummary, Pagination, RecentEntry, Secret, StatsSnapshot, Subcategory,
    SubcategoryInput, SubmitEntryPayload, SubmitEntryResponse, SuggestedSubcategory, SweepKind, SweepReport,
    SweepTarget, TodayEntry, TrackerSettings, UserRecord, UserStats, WeeklyReportOutcome,
};
use crate::notify::{
    build_notifier, crossed_milestone, daily_reminder_message, milestone_message, weekly_digest_message, Notifier,
};
use crate::oracle::{build_oracle, ScoringOracle};
use crate::scheduler::{SweepJob, SweepScheduler};
use crate::scoring::score_entry;
use crate::weights::{is_hex_color, normalize_subcategory_set};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub const KEYRING_SERVICE: &str = "goal-tracker";

const MIN_ENTRY_CHARS: usize = 5;
const MAX_ENTRY_CHARS: usize = 3000;
const MIN_TITLE_CHARS: usize = 3;
const MAX_TITLE_CHARS: usize = 200;
const MAX_DESCRIPTION_CHARS: usize = 1000;
const DEFAULT_PAGE_LIMIT: u32 = 20;
const MAX_PAGE_LIMIT: u32 = 50;
const FALLBACK_COLORS: [&str; 5] = ["#10b981", "#6366f1", "#f59e0b", "#ef4444", "#8b5cf6"];

/// Engine facade. Owns storage, the scoring oracle, the notification channel
/// and the sweep scheduler.
#[derive(Clone)]
pub struct GoalTracker {
    db: Arc<Database>,
    oracle: Arc<RwLock<Arc<dyn ScoringOracle>>>,
    notifier: Arc<RwLock<Arc<dyn Notifier>>>,
    scheduler: SweepScheduler,
    keyring_lock: Arc<Mutex<()>>,
}

impl GoalTracker {
    /// Opens `<data_dir>/goal-tracker.sqlite` and wires the oracle and
    /// notifier from the stored secrets.
    pub fn new(data_dir: PathBuf) -> AppResult<Arc<Self>> {
        let db = Arc::new(Database::new(&data_dir.join("goal-tracker.sqlite"))?);
        let settings = db.get_settings()?;
        let oracle = build_oracle(&settings, read_secret(Secret::OracleApiKey))?;
        let notifier = build_notifier(&settings, read_secret(Secret::TelegramBotToken))?;
        Self::assemble(db, oracle, notifier)
    }

    pub fn with_components(
        db: Arc<Database>,
        oracle: Arc<dyn ScoringOracle>,
        notifier: Arc<dyn Notifier>,
    ) -> AppResult<Arc<Self>> {
        Self::assemble(db, oracle, notifier)
    }

    fn assemble(
        db: Arc<Database>,
        oracle: Arc<dyn ScoringOracle>,
        notifier: Arc<dyn Notifier>,
    ) -> AppResult<Arc<Self>> {
        let settings = db.get_settings()?;
        let scheduler = SweepScheduler::new(SweepJob::from_settings(&settings));
        tracing::info!(oracle = oracle.name(), notifier = notifier.name(), "goal tracker ready");

        let this = Arc::new(Self {
            db,
            oracle: Arc::new(RwLock::new(oracle)),
            notifier: Arc::new(RwLock::new(notifier)),
            scheduler: scheduler.clone(),
            keyring_lock: Arc::new(Mutex::new(())),
        });

        let weak = Arc::downgrade(&this);
        scheduler.set_executor(Arc::new(move |kind: SweepKind| {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(strong) = weak.upgrade() {
                    strong.run_sweep(kind).await.is_err()
                } else {
                    true
                }
            })
        }));

        Ok(this)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn get_settings(&self) -> AppResult<TrackerSettings> {
        self.db.get_settings()
    }

    /// Applies a partial JSON settings patch and reschedules the sweeps.
    pub async fn update_settings(&self, update: serde_json::Value) -> AppResult<TrackerSettings> {
        let settings = self.db.update_settings(update)?;
        self.scheduler.set_jobs(SweepJob::from_settings(&settings)).await;
        Ok(settings)
    }

    /// Caller-facing message for an error under the configured exposure posture.
    pub fn client_error(&self, error: &AppError) -> String {
        let expose = self
            .db
            .get_settings()
            .map(|settings| settings.expose_internal_errors)
            .unwrap_or(false);
        error.client_message(expose)
    }

    pub fn upsert_user(&self, user: &UserRecord) -> AppResult<UserRecord> {
        if user.id.trim().is_empty() {
            return Err(AppError::Validation("user id is required".to_string()));
        }
        self.db.upsert_user(user)
    }

    /// Asks the oracle for subcategories before writing anything, then
    /// replaces the user's active goal.
    pub async fn create_goal(&self, user_id: &str, payload: CreateGoalPayload) -> AppResult<CreateGoalResponse> {
        let title_len = payload.title.trim().chars().count();
        if !(MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&title_len) {
            return Err(AppError::Validation(format!(
                "goal title must be {MIN_TITLE_CHARS}-{MAX_TITLE_CHARS} characters"
            )));
        }
        if payload
            .description
            .as_deref()
            .map(|description| description.chars().count() > MAX_DESCRIPTION_CHARS)
            .unwrap_or(false)
        {
            return Err(AppError::Validation(format!(
                "goal description must be at most {MAX_DESCRIPTION_CHARS} characters"
            )));
        }

        let oracle = self.oracle.read().await.clone();
        let suggested = oracle
            .suggest_subcategories(payload.title.trim(), payload.description.as_deref())
            .await
            .inspect_err(|error| {
                tracing::warn!(user_id = %user_id, error = %error, "subcategory suggestion failed");
            })?;

        let inputs = suggestion_inputs(&suggested);
        let subcategories = if inputs.is_empty() {
            Vec::new()
        } else {
            normalize_subcategory_set(&inputs)?
        };

        let goal = self.db.create_goal(user_id, &payload, &subcategories)?;
        tracing::info!(
            user_id = %user_id,
            goal_id = %goal.goal.id,
            subcategories = goal.subcategories.len(),
            "goal created"
        );
        Ok(CreateGoalResponse { goal, suggested })
    }

    pub fn list_goals(&self, user_id: &str) -> AppResult<Vec<GoalDetail>> {
        self.db.list_goals(user_id)
    }

    pub fn get_active_goal(&self, user_id: &str) -> AppResult<Option<ActiveGoalView>> {
        let Some(goal) = self.db.get_active_goal(user_id)? else {
            return Ok(None);
        };
        let subcategories = self.db.list_subcategories(&goal.id)?;
        let entry_count = self.db.count_entries(user_id, &goal.id)?;
        let stats = self.goal_stats(user_id, &goal.id)?;
        Ok(Some(ActiveGoalView {
            goal,
            subcategories,
            entry_count,
            stats,
        }))
    }

    pub fn replace_subcategories(
        &self,
        user_id: &str,
        goal_id: &str,
        subcategories: &[SubcategoryInput],
    ) -> AppResult<Vec<Subcategory>> {
        let goal = self
            .db
            .get_goal(user_id, goal_id)?
            .ok_or_else(|| AppError::NotFound("goal not found".to_string()))?;
        let normalized = normalize_subcategory_set(subcategories)?;
        let replaced = self.db.replace_subcategories(&goal.id, &normalized)?;
        tracing::info!(goal_id = %goal.id, count = replaced.len(), "subcategories replaced");
        Ok(replaced)
    }

    pub fn delete_goal(&self, user_id: &str, goal_id: &str) -> AppResult<BooleanResponse> {
        if !self.db.delete_goal(user_id, goal_id)? {
            return Err(AppError::NotFound("goal not found".to_string()));
        }
        tracing::info!(user_id = %user_id, goal_id = %goal_id, "goal deleted");
        Ok(BooleanResponse { success: true })
    }

    /// Finalizes the goal's progress at 100%.
    pub fn complete_goal(&self, user_id: &str, goal_id: &str) -> AppResult<UserStats> {
        self.db
            .get_goal(user_id, goal_id)?
            .ok_or_else(|| AppError::NotFound("goal not found".to_string()))?;
        let stats = self
            .db
            .complete_goal(user_id, goal_id)?
            .ok_or_else(|| AppError::NotFound("no progress recorded for this goal".to_string()))?;
        tracing::info!(user_id = %user_id, goal_id = %goal_id, "goal completed");
        Ok(stats)
    }

    pub async fn submit_entry(&self, user_id: &str, payload: SubmitEntryPayload) -> AppResult<SubmitEntryResponse> {
        let raw_text = payload.raw_text.as_str();
        let text_len = raw_text.chars().count();
        if !(MIN_ENTRY_CHARS..=MAX_ENTRY_CHARS).contains(&text_len) {
            return Err(AppError::Validation(format!(
                "entry text must be {MIN_ENTRY_CHARS}-{MAX_ENTRY_CHARS} characters"
            )));
        }

        let goal = self.db.get_active_goal(user_id)?.ok_or(AppError::NoActiveGoal)?;
        let subcategories = self.db.list_subcategories(&goal.id)?;
        if subcategories.is_empty() {
            return Err(AppError::NoSubcategories);
        }

        let day = payload.date.map(DayKey::from_instant).unwrap_or_else(DayKey::today);
        if let Some(existing) = self.db.get_entry_for_day(user_id, &goal.id, day)? {
            return Err(AppError::DuplicateEntry(Box::new(existing)));
        }

        let oracle = self.oracle.read().await.clone();
        let scored = score_entry(oracle.as_ref(), &goal, &subcategories, raw_text)
            .await
            .inspect_err(|error| {
                tracing::warn!(user_id = %user_id, goal_id = %goal.id, error = %error, "entry scoring failed");
            })?;

        let committed = self
            .db
            .commit_scored_entry(
                &NewEntry {
                    user_id,
                    goal_id: &goal.id,
                    raw_text,
                    date: day,
                    total_score: scored.analysis.total_score,
                    ai_comment: &scored.analysis.overall_comment,
                },
                &scored.scores,
            )
            .inspect_err(|error| {
                if matches!(error, AppError::DuplicateEntry(_)) {
                    tracing::warn!(user_id = %user_id, date = %day, "concurrent submission lost the insert race");
                }
            })?;

        tracing::info!(
            user_id = %user_id,
            goal_id = %goal.id,
            date = %day,
            total_score = scored.analysis.total_score,
            current_streak = committed.streak.current_streak,
            "entry accepted"
        );

        if let Some(milestone) = crossed_milestone(committed.previous_progress, committed.stats.progress_percent) {
            self.send_milestone(user_id, milestone).await;
        }

        Ok(SubmitEntryResponse {
            entry: committed.entry,
            analysis: scored.analysis,
            streak: committed.streak,
        })
    }

    pub fn list_entries(&self, user_id: &str, page: Option<u32>, limit: Option<u32>) -> AppResult<EntryPage> {
        let goal = self.db.get_active_goal(user_id)?.ok_or(AppError::NoActiveGoal)?;
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
        let total = self.db.count_entries(user_id, &goal.id)?;
        let offset = (page - 1).saturating_mul(limit);
        let entries = self.db.list_entries(user_id, &goal.id, limit, offset)?;
        Ok(EntryPage {
            entries,
            pagination: Pagination {
                page,
                limit,
                total,
                pages: total.div_ceil(limit),
            },
        })
    }

    pub fn get_entry(&self, user_id: &str, entry_id: &str) -> AppResult<EntryDetail> {
        self.db
            .get_entry(user_id, entry_id)?
            .ok_or_else(|| AppError::NotFound("entry not found".to_string()))
    }

    pub fn today_entry(&self, user_id: &str) -> AppResult<TodayEntry> {
        let Some(goal) = self.db.get_active_goal(user_id)? else {
            return Ok(TodayEntry {
                has_entry: false,
                entry: None,
            });
        };
        let entry = self.db.get_entry_for_day(user_id, &goal.id, DayKey::today())?;
        Ok(TodayEntry {
            has_entry: entry.is_some(),
            entry,
        })
    }

    pub fn dashboard(&self, user_id: &str) -> AppResult<Dashboard> {
        let goal = self.db.get_active_goal(user_id)?.ok_or(AppError::NoActiveGoal)?;
        let subcategories = self.db.list_subcategories(&goal.id)?;
        let stats = self.goal_stats(user_id, &goal.id)?;
        let recent = self.db.list_entries(user_id, &goal.id, RECENT_ENTRY_WINDOW, 0)?;

        let week_entries = entries_since(&recent, week_window_start(DayKey::today()));
        let week = week_summary(&subcategories, &week_entries);
        let recent_entries = recent
            .iter()
            .take(RECENT_ENTRY_PREVIEW)
            .map(|detail| RecentEntry {
                id: detail.entry.id.clone(),
                date: detail.entry.date,
                total_score: detail.entry.total_score,
                ai_comment: detail.entry.ai_comment.clone(),
            })
            .collect();
        let progress = stats.as_ref().map(|stats| stats.progress_percent).unwrap_or(0.0);

        Ok(Dashboard {
            goal: GoalSummary {
                id: goal.id.clone(),
                title: goal.title.clone(),
                deadline: goal.deadline,
            },
            stats: StatsSnapshot::from(stats.as_ref()),
            week,
            recent_entries,
            forecast: forecast(goal.deadline, progress),
        })
    }

    pub fn chart(&self, user_id: &str, days: Option<i64>) -> AppResult<ChartView> {
        let goal = self.db.get_active_goal(user_id)?.ok_or(AppError::NoActiveGoal)?;
        let subcategories = self.db.list_subcategories(&goal.id)?;
        let days = chart_days(days);
        let today = DayKey::today();
        let entries = self
            .db
            .list_entries_since(user_id, &goal.id, today.minus_days(i64::from(days) - 1))?;
        Ok(ChartView {
            chart_data: fill_chart_series(&entries, days, today),
            category_charts: category_charts(&subcategories, &entries),
        })
    }

    /// Never calls the oracle when the trailing week is empty.
    pub async fn weekly_report(&self, user_id: &str) -> AppResult<WeeklyReportOutcome> {
        let goal = self.db.get_active_goal(user_id)?.ok_or(AppError::NoActiveGoal)?;
        let entries = self
            .db
            .list_entries_since(user_id, &goal.id, week_window_start(DayKey::today()))?;
        if entries.is_empty() {
            return Ok(WeeklyReportOutcome::InsufficientData {
                message: "No entries in the last 7 days yet. Add an entry to get a weekly report.".to_string(),
            });
        }

        let refs = entries.iter().collect::<Vec<_>>();
        let items = weekly_summary_items(&refs);
        let oracle = self.oracle.read().await.clone();
        let report = oracle
            .weekly_report(&goal.title, &items)
            .await
            .inspect_err(|error| {
                tracing::warn!(user_id = %user_id, error = %error, "weekly report failed");
            })?;
        Ok(WeeklyReportOutcome::Report {
            report,
            entries_count: entries.len() as u32,
        })
    }

    pub async fn run_sweep(&self, kind: SweepKind) -> AppResult<SweepReport> {
        match kind {
            SweepKind::DailyReminder => self.run_daily_reminders().await,
            SweepKind::WeeklyDigest => self.run_weekly_digest().await,
        }
    }

    /// Reminds users with an active goal who have not written today.
    pub async fn run_daily_reminders(&self) -> AppResult<SweepReport> {
        let targets = self.db.list_reminder_targets(DayKey::today())?;
        Ok(self
            .deliver(SweepKind::DailyReminder, &targets, daily_reminder_message)
            .await)
    }

    pub async fn run_weekly_digest(&self) -> AppResult<SweepReport> {
        let targets = self.db.list_digest_targets()?;
        Ok(self
            .deliver(SweepKind::WeeklyDigest, &targets, weekly_digest_message)
            .await)
    }

    /// Returns false when sweeps are disabled or already running.
    pub fn start_sweeps(&self) -> AppResult<bool> {
        if !self.db.get_settings()?.sweeps_enabled {
            tracing::info!("notification sweeps disabled in settings");
            return Ok(false);
        }
        Ok(self.scheduler.start())
    }

    pub fn stop_sweeps(&self) {
        self.scheduler.stop();
    }

    pub fn sweeps_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub async fn save_secret(&self, secret: Secret, value: String) -> AppResult<BooleanResponse> {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{} must not be empty", secret.as_str())));
        }
        {
            let _guard = self.keyring_lock.lock().await;
            let entry = keyring::Entry::new(KEYRING_SERVICE, secret.as_str())
                .map_err(|error| AppError::Io(error.to_string()))?;
            entry
                .set_password(&value)
                .map_err(|error| AppError::Io(error.to_string()))?;
        }
        self.rewire(secret, Some(value)).await?;
        Ok(BooleanResponse { success: true })
    }

    pub async fn clear_secret(&self, secret: Secret) -> AppResult<BooleanResponse> {
        {
            let _guard = self.keyring_lock.lock().await;
            let entry = keyring::Entry::new(KEYRING_SERVICE, secret.as_str())
                .map_err(|error| AppError::Io(error.to_string()))?;
            match entry.delete_credential() {
                Ok(_) | Err(keyring::Error::NoEntry) => {}
                Err(error) => return Err(AppError::Io(error.to_string())),
            }
        }
        self.rewire(secret, None).await?;
        Ok(BooleanResponse { success: true })
    }

    pub async fn has_secret(&self, secret: Secret) -> AppResult<BooleanResponse> {
        let _guard = self.keyring_lock.lock().await;
        let entry = keyring::Entry::new(KEYRING_SERVICE, secret.as_str())
            .map_err(|error| AppError::Io(error.to_string()))?;
        match entry.get_password() {
            Ok(value) => Ok(BooleanResponse {
                success: !value.trim().is_empty(),
            }),
            Err(keyring::Error::NoEntry) => Ok(BooleanResponse { success: false }),
            Err(error) => Err(AppError::Io(error.to_string())),
        }
    }

    async fn rewire(&self, secret: Secret, value: Option<String>) -> AppResult<()> {
        let settings = self.db.get_settings()?;
        match secret {
            Secret::OracleApiKey => {
                let oracle = build_oracle(&settings, value)?;
                tracing::info!(oracle = oracle.name(), "scoring oracle rewired");
                *self.oracle.write().await = oracle;
            }
            Secret::TelegramBotToken => {
                let notifier = build_notifier(&settings, value)?;
                tracing::info!(notifier = notifier.name(), "notifier rewired");
                *self.notifier.write().await = notifier;
            }
        }
        Ok(())
    }

    fn goal_stats(&self, user_id: &str, goal_id: &str) -> AppResult<Option<UserStats>> {
        Ok(self
            .db
            .get_user_stats(user_id)?
            .filter(|stats| stats.goal_id == goal_id))
    }

    async fn send_milestone(&self, user_id: &str, milestone: u32) {
        let Some(text) = milestone_message(milestone) else {
            return;
        };
        let chat_id = match self.db.get_user(user_id) {
            Ok(user) => user.and_then(|user| user.telegram_id),
            Err(error) => {
                tracing::warn!(user_id = %user_id, error = %error, "failed to load user for milestone");
                None
            }
        };
        let Some(chat_id) = chat_id else {
            return;
        };
        let notifier = self.notifier.read().await.clone();
        match notifier.send(&chat_id, text).await {
            Ok(()) => tracing::info!(user_id = %user_id, milestone, "milestone notification sent"),
            Err(error) => {
                tracing::warn!(user_id = %user_id, milestone, error = %error, "milestone notification failed")
            }
        }
    }

    async fn deliver(
        &self,
        kind: SweepKind,
        targets: &[SweepTarget],
        build_message: fn(&SweepTarget) -> String,
    ) -> SweepReport {
        let notifier = self.notifier.read().await.clone();
        let mut report = SweepReport::default();
        for target in targets {
            let Some(chat_id) = target.user.telegram_id.as_deref() else {
                continue;
            };
            report.attempted += 1;
            match notifier.send(chat_id, &build_message(target)).await {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!(
                        sweep = kind.as_str(),
                        user_id = %target.user.id,
                        error = %error,
                        "notification delivery failed"
                    );
                }
            }
        }
        tracing::info!(
            sweep = kind.as_str(),
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "sweep finished"
        );
        report
    }
}

fn read_secret(secret: Secret) -> Option<String> {
    let entry = match keyring::Entry::new(KEYRING_SERVICE, secret.as_str()) {
        Ok(entry) => entry,
        Err(error) => {
            tracing::warn!(secret = secret.as_str(), error = %error, "keyring unavailable");
            return None;
        }
    };
    match entry.get_password() {
        Ok(value) => Some(value),
        Err(keyring::Error::NoEntry) => None,
        Err(error) => {
            tracing::warn!(secret = secret.as_str(), error = %error, "failed to read secret");
            None
        }
    }
}

/// Oracle suggestions with out-of-contract names, emoji or colors repaired so
/// goal creation does not fail on cosmetic fields.
fn suggestion_inputs(suggested: &[SuggestedSubcategory]) -> Vec<SubcategoryInput> {
    suggested
        .iter()
        .filter(|suggestion| !suggestion.name.trim().is_empty())
        .enumerate()
        .map(|(index, suggestion)| SubcategoryInput {
            name: suggestion.name.trim().chars().take(50).collect(),
            emoji: suggestion.emoji.chars().take(10).collect(),
            color: if is_hex_color(&suggestion.color) {
                suggestion.color.clone()
            } else {
                FALLBACK_COLORS[index % FALLBACK_COLORS.len()].to_string()
            },
            weight: suggestion.weight,
        })
        .collect()
}
