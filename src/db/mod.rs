use crate::calendar::DayKey;
use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateGoalPayload, Entry, EntryDetail, EntryScore, Goal, GoalDetail, NewEntryScore, StreakUpdate,
    Subcategory, SubcategoryInput, SweepTarget, TrackerSettings, UserRecord, UserStats,
};
use crate::streak::{accumulate, COMPLETED_PROGRESS};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");
const SETTINGS_KEY: &str = "tracker";

const GOAL_COLUMNS: &str = "id, user_id, title, description, deadline, is_active, created_at";
const SUBCATEGORY_COLUMNS: &str = "id, goal_id, name, emoji, color, weight";
const ENTRY_COLUMNS: &str = "id, user_id, goal_id, raw_text, date, total_score, ai_comment, created_at";
const STATS_COLUMNS: &str =
    "user_id, goal_id, current_streak, longest_streak, total_score, total_entries, last_entry_date, progress_percent, updated_at";

/// A scored entry ready to be committed.
#[derive(Debug, Clone)]
pub struct NewEntry<'a> {
    pub user_id: &'a str,
    pub goal_id: &'a str,
    pub raw_text: &'a str,
    pub date: DayKey,
    pub total_score: f64,
    pub ai_comment: &'a str,
}

#[derive(Debug, Clone)]
pub struct CommittedEntry {
    pub entry: EntryDetail,
    pub streak: StreakUpdate,
    pub stats: UserStats,
    /// Progress before this entry, 0 when the aggregate was created by it.
    pub previous_progress: f64,
}

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.ensure_default_settings()?;
        Ok(db)
    }

    pub fn get_settings(&self) -> AppResult<TrackerSettings> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?1",
                [SETTINGS_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str::<TrackerSettings>(&raw).unwrap_or_default()),
            None => Ok(TrackerSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<TrackerSettings> {
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: TrackerSettings = serde_json::from_value(merged)
            .map_err(|error| AppError::Validation(format!("invalid settings: {error}")))?;

        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![SETTINGS_KEY, serde_json::to_string(&settings)?, Utc::now().to_rfc3339()],
        )?;

        Ok(settings)
    }

    pub fn upsert_user(&self, user: &UserRecord) -> AppResult<UserRecord> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO users (id, telegram_id, first_name, username, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(id) DO UPDATE SET
               telegram_id = excluded.telegram_id,
               first_name = excluded.first_name,
               username = excluded.username,
               updated_at = excluded.updated_at",
            params![user.id, user.telegram_id, user.first_name, user.username, now],
        )?;
        Ok(user.clone())
    }

    pub fn get_user(&self, user_id: &str) -> AppResult<Option<UserRecord>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.query_row(
            "SELECT id, telegram_id, first_name, username FROM users WHERE id = ?1",
            [user_id],
            parse_user_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Deactivates the user's current goal and inserts the new one with its
    /// subcategories in one transaction.
    pub fn create_goal(
        &self,
        user_id: &str,
        payload: &CreateGoalPayload,
        subcategories: &[SubcategoryInput],
    ) -> AppResult<GoalDetail> {
        let now = Utc::now();
        let goal = Goal {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: payload.title.trim().to_string(),
            description: payload.description.clone(),
            deadline: payload.deadline,
            is_active: true,
            created_at: now,
        };

        let mut conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE goals SET is_active = 0 WHERE user_id = ?1 AND is_active = 1",
            [user_id],
        )?;
        tx.execute(
            "INSERT INTO goals (id, user_id, title, description, deadline, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
            params![
                goal.id,
                goal.user_id,
                goal.title,
                goal.description,
                goal.deadline.map(|deadline| deadline.to_rfc3339()),
                now.to_rfc3339(),
            ],
        )?;
        insert_subcategories(&tx, &goal.id, subcategories)?;
        let subcategories = query_subcategories(&tx, &goal.id)?;
        tx.commit()?;

        Ok(GoalDetail { goal, subcategories })
    }

    pub fn get_active_goal(&self, user_id: &str) -> AppResult<Option<Goal>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.query_row(
            &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE user_id = ?1 AND is_active = 1"),
            [user_id],
            parse_goal_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn get_goal(&self, user_id: &str, goal_id: &str) -> AppResult<Option<Goal>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.query_row(
            &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1 AND user_id = ?2"),
            params![goal_id, user_id],
            parse_goal_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn list_goals(&self, user_id: &str) -> AppResult<Vec<GoalDetail>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE user_id = ?1 ORDER BY created_at DESC"
        ))?;
        let goals = stmt
            .query_map([user_id], parse_goal_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut details = Vec::with_capacity(goals.len());
        for goal in goals {
            let subcategories = query_subcategories(&conn, &goal.id)?;
            details.push(GoalDetail { goal, subcategories });
        }
        Ok(details)
    }

    pub fn list_subcategories(&self, goal_id: &str) -> AppResult<Vec<Subcategory>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        Ok(query_subcategories(&conn, goal_id)?)
    }

    /// Replaces the whole subcategory set. Existing entry scores keep their
    /// name snapshot and lose the back-reference.
    pub fn replace_subcategories(
        &self,
        goal_id: &str,
        subcategories: &[SubcategoryInput],
    ) -> AppResult<Vec<Subcategory>> {
        let mut conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM subcategories WHERE goal_id = ?1", [goal_id])?;
        insert_subcategories(&tx, goal_id, subcategories)?;
        let replaced = query_subcategories(&tx, goal_id)?;
        tx.commit()?;
        Ok(replaced)
    }

    /// Deletes a goal with its subcategories, entries, scores and aggregate.
    pub fn delete_goal(&self, user_id: &str, goal_id: &str) -> AppResult<bool> {
        let mut conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM user_stats WHERE user_id = ?1 AND goal_id = ?2",
            params![user_id, goal_id],
        )?;
        let deleted = tx.execute(
            "DELETE FROM goals WHERE id = ?1 AND user_id = ?2",
            params![goal_id, user_id],
        )?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    pub fn count_entries(&self, user_id: &str, goal_id: &str) -> AppResult<u32> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(1) FROM entries WHERE user_id = ?1 AND goal_id = ?2",
            params![user_id, goal_id],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    pub fn get_entry_for_day(&self, user_id: &str, goal_id: &str, date: DayKey) -> AppResult<Option<EntryDetail>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        Ok(query_entry_for_day(&conn, user_id, goal_id, date)?)
    }

    pub fn get_entry(&self, user_id: &str, entry_id: &str) -> AppResult<Option<EntryDetail>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let entry = conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1 AND user_id = ?2"),
                params![entry_id, user_id],
                parse_entry_row,
            )
            .optional()?;
        match entry {
            Some(entry) => Ok(Some(with_scores(&conn, entry)?)),
            None => Ok(None),
        }
    }

    /// Newest first.
    pub fn list_entries(&self, user_id: &str, goal_id: &str, limit: u32, offset: u32) -> AppResult<Vec<EntryDetail>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries
             WHERE user_id = ?1 AND goal_id = ?2
             ORDER BY date DESC LIMIT ?3 OFFSET ?4"
        ))?;
        let entries = stmt
            .query_map(params![user_id, goal_id, limit, offset], parse_entry_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        entries
            .into_iter()
            .map(|entry| with_scores(&conn, entry).map_err(AppError::from))
            .collect()
    }

    /// Oldest first, `since` inclusive.
    pub fn list_entries_since(&self, user_id: &str, goal_id: &str, since: DayKey) -> AppResult<Vec<EntryDetail>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries
             WHERE user_id = ?1 AND goal_id = ?2 AND date >= ?3
             ORDER BY date ASC"
        ))?;
        let entries = stmt
            .query_map(params![user_id, goal_id, since.iso()], parse_entry_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        entries
            .into_iter()
            .map(|entry| with_scores(&conn, entry).map_err(AppError::from))
            .collect()
    }

    pub fn get_user_stats(&self, user_id: &str) -> AppResult<Option<UserStats>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        Ok(query_user_stats(&conn, user_id)?)
    }

    /// Inserts the entry and its scores and applies the streak accumulator as
    /// one transaction. A lost race on the (user, goal, date) constraint comes
    /// back as `DuplicateEntry` carrying the winner.
    pub fn commit_scored_entry(&self, entry: &NewEntry<'_>, scores: &[NewEntryScore]) -> AppResult<CommittedEntry> {
        let now = Utc::now();
        let entry_id = Uuid::new_v4().to_string();

        let mut conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO entries (id, user_id, goal_id, raw_text, date, total_score, ai_comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry_id,
                entry.user_id,
                entry.goal_id,
                entry.raw_text,
                entry.date.iso(),
                entry.total_score,
                entry.ai_comment,
                now.to_rfc3339(),
            ],
        );
        if let Err(error) = inserted {
            if !is_unique_violation(&error) {
                return Err(error.into());
            }
            drop(tx);
            return match query_entry_for_day(&conn, entry.user_id, entry.goal_id, entry.date)? {
                Some(existing) => Err(AppError::DuplicateEntry(Box::new(existing))),
                None => Err(error.into()),
            };
        }

        for (position, score) in scores.iter().enumerate() {
            tx.execute(
                "INSERT INTO entry_scores (id, entry_id, subcategory_id, subcategory_name, score, actions_json, ai_comment, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    Uuid::new_v4().to_string(),
                    entry_id,
                    score.subcategory_id,
                    score.subcategory_name,
                    score.score,
                    serde_json::to_string(&score.actions)?,
                    score.comment,
                    position as i64,
                ],
            )?;
        }

        let existing_stats = query_user_stats(&tx, entry.user_id)?;
        let previous_progress = existing_stats
            .as_ref()
            .filter(|stats| stats.goal_id == entry.goal_id)
            .map(|stats| stats.progress_percent)
            .unwrap_or(0.0);
        let accumulation = accumulate(
            existing_stats.as_ref(),
            entry.user_id,
            entry.goal_id,
            entry.date,
            entry.total_score,
            now,
        );
        write_user_stats(&tx, &accumulation.stats)?;

        let stored = tx.query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"),
            [entry_id.as_str()],
            parse_entry_row,
        )?;
        let detail = with_scores(&tx, stored)?;
        tx.commit()?;

        Ok(CommittedEntry {
            entry: detail,
            streak: accumulation.update,
            stats: accumulation.stats,
            previous_progress,
        })
    }

    /// Finalizes the goal's aggregate at 100%.
    pub fn complete_goal(&self, user_id: &str, goal_id: &str) -> AppResult<Option<UserStats>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let changed = conn.execute(
            "UPDATE user_stats SET progress_percent = ?1, updated_at = ?2 WHERE user_id = ?3 AND goal_id = ?4",
            params![COMPLETED_PROGRESS, Utc::now().to_rfc3339(), user_id, goal_id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(query_user_stats(&conn, user_id)?)
    }

    /// Users with a messaging address and an active goal but no entry for `today`.
    pub fn list_reminder_targets(&self, today: DayKey) -> AppResult<Vec<SweepTarget>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT u.id, u.telegram_id, u.first_name, u.username, g.id,
                    COALESCE(s.current_streak, 0), COALESCE(s.total_entries, 0), COALESCE(s.progress_percent, 0)
             FROM users u
             JOIN goals g ON g.user_id = u.id AND g.is_active = 1
             LEFT JOIN user_stats s ON s.user_id = u.id AND s.goal_id = g.id
             WHERE u.telegram_id IS NOT NULL AND u.telegram_id <> ''
               AND NOT EXISTS (
                 SELECT 1 FROM entries e
                 WHERE e.user_id = u.id AND e.goal_id = g.id AND e.date = ?1
               )
             ORDER BY u.id ASC",
        )?;
        let targets = stmt
            .query_map([today.iso()], parse_sweep_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(targets)
    }

    /// Users with a messaging address, an active goal and at least one counted entry.
    pub fn list_digest_targets(&self) -> AppResult<Vec<SweepTarget>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT u.id, u.telegram_id, u.first_name, u.username, g.id,
                    s.current_streak, s.total_entries, s.progress_percent
             FROM users u
             JOIN goals g ON g.user_id = u.id AND g.is_active = 1
             JOIN user_stats s ON s.user_id = u.id AND s.goal_id = g.id
             WHERE u.telegram_id IS NOT NULL AND u.telegram_id <> ''
               AND s.total_entries > 0
             ORDER BY u.id ASC",
        )?;
        let targets = stmt
            .query_map([], parse_sweep_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(targets)
    }

    fn ensure_default_settings(&self) -> AppResult<()> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(1) FROM settings WHERE key = ?1",
            [SETTINGS_KEY],
            |row| row.get(0),
        )?;
        if count == 0 {
            conn.execute(
                "INSERT INTO settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)",
                params![
                    SETTINGS_KEY,
                    serde_json::to_string(&TrackerSettings::default())?,
                    Utc::now().to_rfc3339()
                ],
            )?;
        }
        Ok(())
    }
}

fn insert_subcategories(conn: &Connection, goal_id: &str, subcategories: &[SubcategoryInput]) -> rusqlite::Result<()> {
    for (position, subcategory) in subcategories.iter().enumerate() {
        conn.execute(
            "INSERT INTO subcategories (id, goal_id, name, emoji, color, weight, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Uuid::new_v4().to_string(),
                goal_id,
                subcategory.name,
                subcategory.emoji,
                subcategory.color,
                subcategory.weight,
                position as i64,
            ],
        )?;
    }
    Ok(())
}

fn query_subcategories(conn: &Connection, goal_id: &str) -> rusqlite::Result<Vec<Subcategory>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SUBCATEGORY_COLUMNS} FROM subcategories WHERE goal_id = ?1 ORDER BY weight DESC, position ASC"
    ))?;
    let rows = stmt.query_map([goal_id], |row| {
        Ok(Subcategory {
            id: row.get(0)?,
            goal_id: row.get(1)?,
            name: row.get(2)?,
            emoji: row.get(3)?,
            color: row.get(4)?,
            weight: row.get(5)?,
        })
    })?;
    rows.collect()
}

fn query_entry_for_day(
    conn: &Connection,
    user_id: &str,
    goal_id: &str,
    date: DayKey,
) -> rusqlite::Result<Option<EntryDetail>> {
    let entry = conn
        .query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE user_id = ?1 AND goal_id = ?2 AND date = ?3"),
            params![user_id, goal_id, date.iso()],
            parse_entry_row,
        )
        .optional()?;
    match entry {
        Some(entry) => with_scores(conn, entry).map(Some),
        None => Ok(None),
    }
}

fn with_scores(conn: &Connection, entry: Entry) -> rusqlite::Result<EntryDetail> {
    let mut stmt = conn.prepare(
        "SELECT id, entry_id, subcategory_id, subcategory_name, score, actions_json, ai_comment
         FROM entry_scores WHERE entry_id = ?1 ORDER BY position ASC",
    )?;
    let scores = stmt
        .query_map([entry.id.as_str()], |row| {
            Ok(EntryScore {
                id: row.get(0)?,
                entry_id: row.get(1)?,
                subcategory_id: row.get(2)?,
                subcategory_name: row.get(3)?,
                score: row.get(4)?,
                actions: serde_json::from_str::<Vec<String>>(&row.get::<_, String>(5)?).unwrap_or_default(),
                ai_comment: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(EntryDetail { entry, scores })
}

fn query_user_stats(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<UserStats>> {
    conn.query_row(
        &format!("SELECT {STATS_COLUMNS} FROM user_stats WHERE user_id = ?1"),
        [user_id],
        |row| {
            Ok(UserStats {
                user_id: row.get(0)?,
                goal_id: row.get(1)?,
                current_streak: row.get(2)?,
                longest_streak: row.get(3)?,
                total_score: row.get(4)?,
                total_entries: row.get(5)?,
                last_entry_date: row
                    .get::<_, Option<String>>(6)?
                    .map(|raw| parse_day(&raw))
                    .transpose()?,
                progress_percent: row.get(7)?,
                updated_at: parse_time(&row.get::<_, String>(8)?)?,
            })
        },
    )
    .optional()
}

fn write_user_stats(conn: &Connection, stats: &UserStats) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO user_stats ({STATS_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(user_id) DO UPDATE SET
               goal_id = excluded.goal_id,
               current_streak = excluded.current_streak,
               longest_streak = excluded.longest_streak,
               total_score = excluded.total_score,
               total_entries = excluded.total_entries,
               last_entry_date = excluded.last_entry_date,
               progress_percent = excluded.progress_percent,
               updated_at = excluded.updated_at"
        ),
        params![
            stats.user_id,
            stats.goal_id,
            stats.current_streak,
            stats.longest_streak,
            stats.total_score,
            stats.total_entries,
            stats.last_entry_date.map(DayKey::iso),
            stats.progress_percent,
            stats.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}

fn parse_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        first_name: row.get(2)?,
        username: row.get(3)?,
    })
}

fn parse_goal_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        deadline: row
            .get::<_, Option<String>>(4)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
        is_active: row.get::<_, i64>(5)? != 0,
        created_at: parse_time(&row.get::<_, String>(6)?)?,
    })
}

fn parse_entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        goal_id: row.get(2)?,
        raw_text: row.get(3)?,
        date: parse_day(&row.get::<_, String>(4)?)?,
        total_score: row.get(5)?,
        ai_comment: row.get(6)?,
        created_at: parse_time(&row.get::<_, String>(7)?)?,
    })
}

fn parse_sweep_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SweepTarget> {
    Ok(SweepTarget {
        user: UserRecord {
            id: row.get(0)?,
            telegram_id: row.get(1)?,
            first_name: row.get(2)?,
            username: row.get(3)?,
        },
        goal_id: row.get(4)?,
        current_streak: row.get(5)?,
        total_entries: row.get(6)?,
        progress_percent: row.get(7)?,
    })
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}

fn parse_day(raw: &str) -> rusqlite::Result<DayKey> {
    DayKey::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid calendar date: {raw}"),
            )),
        )
    })
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Database, NewEntry};
    use crate::calendar::DayKey;
    use crate::errors::AppError;
    use crate::models::{CreateGoalPayload, NewEntryScore, SubcategoryInput, UserRecord};
    use chrono::NaiveDate;

    fn day(d: u32) -> DayKey {
        DayKey::from_date(NaiveDate::from_ymd_opt(2026, 4, d).expect("valid date"))
    }

    fn inputs() -> Vec<SubcategoryInput> {
        vec![
            SubcategoryInput {
                name: "Income".to_string(),
                emoji: "💼".to_string(),
                color: "#10b981".to_string(),
                weight: 0.6,
            },
            SubcategoryInput {
                name: "Skills".to_string(),
                emoji: "📚".to_string(),
                color: "#6366f1".to_string(),
                weight: 0.4,
            },
        ]
    }

    fn goal_payload(title: &str) -> CreateGoalPayload {
        CreateGoalPayload {
            title: title.to_string(),
            ..CreateGoalPayload::default()
        }
    }

    fn new_entry<'a>(goal_id: &'a str, date: DayKey, total: f64) -> NewEntry<'a> {
        NewEntry {
            user_id: "user-1",
            goal_id,
            raw_text: "shipped the landing page",
            date,
            total_score: total,
            ai_comment: "solid day",
        }
    }

    #[test]
    fn creating_goal_deactivates_previous_one() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");

        let first = db.create_goal("user-1", &goal_payload("First goal"), &inputs()).expect("first");
        let second = db.create_goal("user-1", &goal_payload("Second goal"), &inputs()).expect("second");

        let active = db.get_active_goal("user-1").expect("active").expect("exists");
        assert_eq!(active.id, second.goal.id);
        let goals = db.list_goals("user-1").expect("list");
        assert_eq!(goals.len(), 2);
        let old = goals.iter().find(|detail| detail.goal.id == first.goal.id).expect("old goal");
        assert!(!old.goal.is_active);
        assert_eq!(second.subcategories[0].name, "Income");
    }

    #[test]
    fn committing_entry_persists_scores_and_stats() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let goal = db.create_goal("user-1", &goal_payload("Earn more"), &inputs()).expect("goal");
        let income = &goal.subcategories[0];

        let committed = db
            .commit_scored_entry(
                &new_entry(&goal.goal.id, day(1), 60.0),
                &[NewEntryScore {
                    subcategory_id: income.id.clone(),
                    subcategory_name: income.name.clone(),
                    score: 8.0,
                    actions: vec!["called two clients".to_string()],
                    comment: "good".to_string(),
                }],
            )
            .expect("commit");
        assert_eq!(committed.streak.current_streak, 1);
        assert_eq!(committed.entry.scores.len(), 1);
        assert_eq!(committed.entry.scores[0].actions, vec!["called two clients".to_string()]);

        let stats = db.get_user_stats("user-1").expect("stats").expect("exists");
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.last_entry_date, Some(day(1)));
        assert_eq!(db.count_entries("user-1", &goal.goal.id).expect("count"), 1);
    }

    #[test]
    fn unique_violation_surfaces_existing_entry_without_touching_stats() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let goal = db.create_goal("user-1", &goal_payload("Earn more"), &inputs()).expect("goal");

        let first = db
            .commit_scored_entry(&new_entry(&goal.goal.id, day(2), 50.0), &[])
            .expect("first");
        let err = db
            .commit_scored_entry(&new_entry(&goal.goal.id, day(2), 90.0), &[])
            .expect_err("duplicate");
        match err {
            AppError::DuplicateEntry(existing) => assert_eq!(existing.entry.id, first.entry.entry.id),
            other => panic!("unexpected error: {other}"),
        }

        let stats = db.get_user_stats("user-1").expect("stats").expect("exists");
        assert_eq!(stats.total_score, 50.0);
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn replacing_subcategories_keeps_score_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let goal = db.create_goal("user-1", &goal_payload("Earn more"), &inputs()).expect("goal");
        let income = goal.subcategories[0].clone();
        let committed = db
            .commit_scored_entry(
                &new_entry(&goal.goal.id, day(3), 70.0),
                &[NewEntryScore {
                    subcategory_id: income.id.clone(),
                    subcategory_name: income.name.clone(),
                    score: 6.0,
                    actions: vec![],
                    comment: String::new(),
                }],
            )
            .expect("commit");

        let replaced = db
            .replace_subcategories(&goal.goal.id, &inputs()[1..])
            .expect("replace");
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced[0].name, "Skills");

        let entry = db
            .get_entry("user-1", &committed.entry.entry.id)
            .expect("get entry")
            .expect("exists");
        assert_eq!(entry.scores.len(), 1);
        assert_eq!(entry.scores[0].subcategory_id, None);
        assert_eq!(entry.scores[0].subcategory_name, "Income");
    }

    #[test]
    fn deleting_goal_cascades_and_is_scoped_to_owner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let goal = db.create_goal("user-1", &goal_payload("Earn more"), &inputs()).expect("goal");
        db.commit_scored_entry(&new_entry(&goal.goal.id, day(4), 40.0), &[])
            .expect("commit");

        assert!(!db.delete_goal("user-2", &goal.goal.id).expect("foreign delete"));
        assert!(db.delete_goal("user-1", &goal.goal.id).expect("delete"));

        assert!(db.get_active_goal("user-1").expect("active").is_none());
        assert!(db.list_subcategories(&goal.goal.id).expect("subcategories").is_empty());
        assert_eq!(db.count_entries("user-1", &goal.goal.id).expect("count"), 0);
        assert!(db.get_user_stats("user-1").expect("stats").is_none());
    }

    #[test]
    fn reminder_targets_skip_users_with_entry_today() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        for (id, chat) in [("user-1", Some("111")), ("user-2", Some("222")), ("user-3", None)] {
            db.upsert_user(&UserRecord {
                id: id.to_string(),
                telegram_id: chat.map(ToString::to_string),
                first_name: None,
                username: None,
            })
            .expect("upsert user");
            db.create_goal(id, &goal_payload("Earn more"), &inputs()).expect("goal");
        }
        let goal = db.get_active_goal("user-1").expect("active").expect("exists");
        db.commit_scored_entry(&new_entry(&goal.id, day(5), 40.0), &[])
            .expect("commit");

        let reminders = db.list_reminder_targets(day(5)).expect("reminders");
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].user.id, "user-2");

        let digests = db.list_digest_targets().expect("digests");
        assert_eq!(digests.len(), 1);
        assert_eq!(digests[0].user.id, "user-1");
        assert_eq!(digests[0].total_entries, 1);
    }

    #[test]
    fn settings_merge_partial_updates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let updated = db
            .update_settings(serde_json::json!({ "oracleModel": "mixtral", "dailyReminder": { "hour": 20 } }))
            .expect("update");
        assert_eq!(updated.oracle_model, "mixtral");
        assert_eq!(updated.daily_reminder.hour, 20);
        assert_eq!(updated.daily_reminder.minute, 0);
        assert_eq!(db.get_settings().expect("settings").oracle_model, "mixtral");
    }
}
