use chrono::Utc;
use std::sync::Mutex;
use tauri::State;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::database::{SessionRecord, SessionStore};
use crate::shell::{self, Lifecycle};
use crate::summary::VoidSummary;

const DEFAULT_RECENT_LIMIT: u32 = 20;

#[tauri::command]
pub async fn get_void_summary(
    store: State<'_, SessionStore>,
    lifecycle: State<'_, Lifecycle>,
    config: State<'_, Mutex<AppConfig>>,
) -> Result<VoidSummary, String> {
    get_void_summary_internal(&store, &lifecycle, &config).await
}

pub async fn get_void_summary_internal(
    store: &SessionStore,
    lifecycle: &Lifecycle,
    config: &Mutex<AppConfig>,
) -> Result<VoidSummary, String> {
    let aggregate = store.read_aggregate().await.map_err(|e| e.to_string())?;

    let running = lifecycle
        .lock()
        .map_err(|e| e.to_string())?
        .running_span(Utc::now());
    let yearly_goal_hours = config.lock().map_err(|e| e.to_string())?.yearly_goal_hours;

    let summary = VoidSummary::new(aggregate, running, yearly_goal_hours);
    debug!("Summary: {:?}", summary);
    Ok(summary)
}

#[tauri::command]
pub async fn get_recent_sessions(
    store: State<'_, SessionStore>,
    limit: Option<u32>,
) -> Result<Vec<SessionRecord>, String> {
    store
        .recent_sessions(limit.unwrap_or(DEFAULT_RECENT_LIMIT))
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_yearly_goal(config: State<'_, Mutex<AppConfig>>) -> Result<i64, String> {
    let config = config.lock().map_err(|e| e.to_string())?;
    Ok(config.yearly_goal_hours)
}

#[tauri::command]
pub async fn set_yearly_goal(
    app: tauri::AppHandle,
    config: State<'_, Mutex<AppConfig>>,
    hours: i64,
) -> Result<(), String> {
    info!("Setting yearly goal to {} hours", hours);

    // Persist against the file as written, without environment overrides.
    let mut stored = AppConfig::load().map_err(|e| e.to_string())?;
    stored.set_yearly_goal_hours(hours).map_err(|e| e.to_string())?;
    stored.save().map_err(|e| e.to_string())?;

    config.lock().map_err(|e| e.to_string())?.yearly_goal_hours = hours;

    shell::refresh_tray(&app);
    Ok(())
}
