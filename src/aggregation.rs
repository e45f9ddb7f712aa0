use crate::calendar::DayKey;
use crate::models::{
    CategoryChart, CategoryPoint, ChartPoint, EntryDetail, Subcategory, SubcategoryWeek,
    WeekSummary, WeeklySummaryItem,
};
use std::collections::HashMap;

pub const WEEK_WINDOW_DAYS: i64 = 7;
pub const RECENT_ENTRY_WINDOW: u32 = 30;
pub const RECENT_ENTRY_PREVIEW: usize = 7;
pub const DEFAULT_CHART_DAYS: u32 = 30;
pub const MAX_CHART_DAYS: u32 = 90;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// First calendar day of the trailing week that ends today.
pub fn week_window_start(today: DayKey) -> DayKey {
    today.minus_days(WEEK_WINDOW_DAYS - 1)
}

pub fn chart_days(requested: Option<i64>) -> u32 {
    let days = requested
        .unwrap_or(i64::from(DEFAULT_CHART_DAYS))
        .clamp(1, i64::from(MAX_CHART_DAYS));
    days as u32
}

pub fn entries_since(entries: &[EntryDetail], since: DayKey) -> Vec<&EntryDetail> {
    entries
        .iter()
        .filter(|detail| detail.entry.date >= since)
        .collect()
}

pub fn week_summary(subcategories: &[Subcategory], week_entries: &[&EntryDetail]) -> WeekSummary {
    let subcategories = subcategories
        .iter()
        .map(|subcategory| {
            let scores = week_entries
                .iter()
                .flat_map(|detail| detail.scores.iter())
                .filter(|score| score.subcategory_id.as_deref() == Some(subcategory.id.as_str()))
                .map(|score| score.score)
                .collect::<Vec<_>>();
            SubcategoryWeek {
                id: subcategory.id.clone(),
                name: subcategory.name.clone(),
                emoji: subcategory.emoji.clone(),
                color: subcategory.color.clone(),
                weight: subcategory.weight,
                week_avg_score: mean_rounded(&scores),
                week_entries: scores.len() as u32,
            }
        })
        .collect();

    let totals = week_entries
        .iter()
        .map(|detail| detail.entry.total_score)
        .collect::<Vec<_>>();

    WeekSummary {
        entries: week_entries.len() as u32,
        avg_score: mean_rounded(&totals),
        subcategories,
    }
}

/// Exactly `days` points ending today, oldest first. Days without an entry
/// are emitted as zero points.
pub fn fill_chart_series(entries: &[EntryDetail], days: u32, today: DayKey) -> Vec<ChartPoint> {
    let by_day = entries
        .iter()
        .map(|detail| (detail.entry.date, detail.entry.total_score))
        .collect::<HashMap<_, _>>();

    (0..days)
        .rev()
        .map(|offset| {
            let date = today.minus_days(i64::from(offset));
            match by_day.get(&date) {
                Some(score) => ChartPoint {
                    date,
                    score: *score,
                    has_entry: true,
                },
                None => ChartPoint {
                    date,
                    score: 0.0,
                    has_entry: false,
                },
            }
        })
        .collect()
}

pub fn category_charts(subcategories: &[Subcategory], entries: &[EntryDetail]) -> Vec<CategoryChart> {
    subcategories
        .iter()
        .map(|subcategory| CategoryChart {
            id: subcategory.id.clone(),
            name: subcategory.name.clone(),
            emoji: subcategory.emoji.clone(),
            color: subcategory.color.clone(),
            data: entries
                .iter()
                .map(|detail| CategoryPoint {
                    date: detail.entry.date,
                    score: detail
                        .scores
                        .iter()
                        .find(|score| score.subcategory_id.as_deref() == Some(subcategory.id.as_str()))
                        .map(|score| score.score)
                        .unwrap_or(0.0),
                })
                .collect(),
        })
        .collect()
}

pub fn weekly_summary_items(entries: &[&EntryDetail]) -> Vec<WeeklySummaryItem> {
    entries
        .iter()
        .map(|detail| {
            let mut ranked = detail.scores.iter().collect::<Vec<_>>();
            ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
            WeeklySummaryItem {
                date: detail.entry.date.iso(),
                total_score: detail.entry.total_score,
                top_categories: ranked
                    .into_iter()
                    .take(2)
                    .map(|score| score.subcategory_name.clone())
                    .collect(),
            }
        })
        .collect()
}

fn mean_rounded(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    round_to(values.iter().sum::<f64>() / values.len() as f64, 1)
}
