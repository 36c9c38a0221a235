use chrono::Datelike;
use serde::Serialize;

use crate::database::Aggregate;
use crate::lifecycle::SessionSpan;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoidSummary {
    pub total_seconds: i64,
    pub seconds_this_year: i64,
    pub current_session_seconds: i64,
    pub total_label: String,
    pub year_label: String,
    pub yearly_goal_hours: i64,
    pub goal_percentage: i64,
    pub progress_bar: String,
}

impl VoidSummary {
    /// Stored aggregate plus the session still running, which is only
    /// written at exit. The running session counts towards this year only
    /// when it started this year, as the stored row will.
    pub fn new(aggregate: Aggregate, running: Option<SessionSpan>, yearly_goal_hours: i64) -> Self {
        let (current, in_this_year) = match running {
            Some(span) => (span.seconds().max(0), span.start.year() == span.end.year()),
            None => (0, false),
        };
        let total_seconds = aggregate.total_seconds + current;
        let seconds_this_year = aggregate.seconds_this_year + if in_this_year { current } else { 0 };
        let goal_percentage = goal_percentage(seconds_this_year, yearly_goal_hours);

        VoidSummary {
            total_seconds,
            seconds_this_year,
            current_session_seconds: current,
            total_label: format_duration(total_seconds),
            year_label: format_duration(seconds_this_year),
            yearly_goal_hours,
            goal_percentage,
            progress_bar: create_progress_bar(goal_percentage),
        }
    }
}

pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Share of the yearly goal reached, clamped to 0..=100.
pub fn goal_percentage(seconds: i64, goal_hours: i64) -> i64 {
    if goal_hours <= 0 {
        return 0;
    }
    let goal_seconds = goal_hours as f64 * 3600.0;
    ((seconds as f64 / goal_seconds) * 100.0).round().clamp(0.0, 100.0) as i64
}

pub fn create_progress_bar(percentage: i64) -> String {
    let percentage = percentage.clamp(0, 100);
    let filled = (percentage as f64 / 100.0 * 10.0).round() as usize;
    let empty = 10 - filled;

    format!("{}{} {}%", "▰".repeat(filled), "▱".repeat(empty), percentage)
}
