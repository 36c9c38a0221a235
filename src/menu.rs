use std::sync::Mutex;
use std::time::Duration;
use tauri::{
    AppHandle, CustomMenuItem, Manager, SystemTray, SystemTrayEvent, SystemTrayMenu,
    SystemTrayMenuItem,
};
use tracing::{debug, info};

use crate::commands::get_void_summary_internal;
use crate::config::AppConfig;
use crate::database::SessionStore;
use crate::shell::{self, Lifecycle};
use crate::summary::{create_progress_bar, VoidSummary};

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

fn build_menu(summary: Option<&VoidSummary>) -> SystemTrayMenu {
    let (year, total, progress) = match summary {
        Some(summary) => (
            format!("This year: {}", summary.year_label),
            format!("All time: {}", summary.total_label),
            summary.progress_bar.clone(),
        ),
        None => (
            "This year: --".to_string(),
            "All time: --".to_string(),
            create_progress_bar(0),
        ),
    };

    SystemTrayMenu::new()
        .add_item(CustomMenuItem::new("this_year", year).disabled())
        .add_item(CustomMenuItem::new("all_time", total).disabled())
        .add_item(CustomMenuItem::new("progress", progress).disabled())
        .add_native_item(SystemTrayMenuItem::Separator)
        .add_item(CustomMenuItem::new("show", "Show Voidspace"))
        .add_item(CustomMenuItem::new("quit", "Quit"))
}

pub fn create_tray_menu() -> SystemTray {
    SystemTray::new().with_menu(build_menu(None))
}

pub fn handle_tray_event(app: &AppHandle, event: SystemTrayEvent) {
    match event {
        SystemTrayEvent::LeftClick { .. } => shell::activate(app),
        SystemTrayEvent::MenuItemClick { id, .. } => match id.as_str() {
            "show" => shell::activate(app),
            "quit" => shell::quit(app),
            _ => {}
        },
        _ => {}
    }
}

pub async fn update_tray_menu(app: &AppHandle) -> Result<(), String> {
    debug!("Updating tray menu");

    let store = app.state::<SessionStore>();
    let lifecycle = app.state::<Lifecycle>();
    let config = app.state::<Mutex<AppConfig>>();

    let summary = match get_void_summary_internal(&store, &lifecycle, &config).await {
        Ok(summary) => Some(summary),
        Err(e) => {
            info!("Error reading void summary: {}", e);
            None
        }
    };

    app.tray_handle()
        .set_menu(build_menu(summary.as_ref()))
        .map_err(|e| e.to_string())?;

    Ok(())
}
