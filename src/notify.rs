use crate::errors::{AppError, AppResult};
use crate::models::{SweepTarget, TrackerSettings};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const MILESTONES: [u32; 4] = [25, 50, 75, 90];

const TELEGRAM_TIMEOUT_SECONDS: u64 = 15;

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Delivers `text` to a messaging address. HTML markup is allowed.
    async fn send(&self, chat_id: &str, text: &str) -> AppResult<()>;
}

/// Telegram Bot API `sendMessage`.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramNotifier {
    pub fn new(settings: &TrackerSettings, token: String) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TELEGRAM_TIMEOUT_SECONDS))
            .build()
            .map_err(|error| AppError::Internal(format!("failed to build telegram http client: {error}")))?;
        Ok(Self {
            client,
            api_base: settings.telegram_api_base.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, chat_id: &str, text: &str) -> AppResult<()> {
        let response = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_base, self.token))
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()
            .await
            .map_err(|error| AppError::Io(format!("telegram request failed: {}", error.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Io(format!("telegram returned status {status}: {body}")));
        }
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, chat_id: &str, text: &str) -> AppResult<()> {
        tracing::info!(chat_id = %chat_id, text = %text, "notification (not delivered)");
        Ok(())
    }
}

pub fn build_notifier(settings: &TrackerSettings, token: Option<String>) -> AppResult<Arc<dyn Notifier>> {
    match token.filter(|token| !token.trim().is_empty()) {
        Some(token) => Ok(Arc::new(TelegramNotifier::new(settings, token)?)),
        None => {
            tracing::warn!("telegram bot token not set, notifications go to the log");
            Ok(Arc::new(LogNotifier))
        }
    }
}

pub fn daily_reminder_message(target: &SweepTarget) -> String {
    let streak = if target.current_streak > 0 {
        format!(" 🔥 Streak: {} days", target.current_streak)
    } else {
        String::new()
    };
    format!(
        "Hi, {}! How did your day go?{streak}\n\nWrite what you did for your goal today, it takes one minute 💪",
        escape_html(target.user.display_name())
    )
}

pub fn weekly_digest_message(target: &SweepTarget) -> String {
    format!(
        "📊 <b>Weekly summary, {name}!</b>\n\n\
         📈 Progress toward your goal: <b>{progress:.0}%</b>\n\
         🔥 Current streak: <b>{streak} days</b>\n\
         📝 Total entries: <b>{entries}</b>\n\n\
         Open the app to see the full AI analysis of your week 👇",
        name = escape_html(target.user.display_name()),
        progress = target.progress_percent,
        streak = target.current_streak,
        entries = target.total_entries,
    )
}

/// Highest milestone strictly above `previous` and at or below `current`.
pub fn crossed_milestone(previous: f64, current: f64) -> Option<u32> {
    MILESTONES
        .iter()
        .rev()
        .copied()
        .find(|milestone| previous < f64::from(*milestone) && current >= f64::from(*milestone))
}

pub fn milestone_message(milestone: u32) -> Option<&'static str> {
    match milestone {
        25 => Some("🎉 You are 25% of the way to your goal! The first quarter is behind you, keep it up!"),
        50 => Some("🚀 Halfway there! You are in the middle of the road to your goal. Don't stop!"),
        75 => Some("💥 75%! The home stretch. A little more and the goal is reached!"),
        90 => Some("🏁 90%! You are almost there. Don't give up now, you are so close!"),
        _ => None,
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
