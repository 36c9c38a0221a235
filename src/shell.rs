use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Mutex;
use tauri::{AppHandle, Manager, RunEvent, Window, WindowBuilder, WindowEvent, WindowUrl};
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::config::AppConfig;
use crate::database::{self, SessionStore};
use crate::lifecycle::{persist_session, AppLifecycle, LifecycleAction, Platform};
use crate::logging;
use crate::menu;
use crate::paths;

pub const MAIN_WINDOW: &str = "main";

pub type Lifecycle = Mutex<AppLifecycle<Window>>;

pub fn run() -> Result<()> {
    // The session starts with the process, before anything can fail.
    let started_at = Utc::now();

    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    let config = config.with_env();

    let log_dir = logging::init_with_fallback(paths::get_log_dir(), config.debug);

    info!("Starting Voidspace");
    debug!("Log directory: {:?}", log_dir);
    if let Some(e) = config_error {
        warn!("Failed to load configuration, using defaults: {}", e);
    }
    debug!("Configuration: {:?}", config);

    let mut lifecycle: AppLifecycle<Window> = AppLifecycle::new(Platform::current());
    lifecycle.start(started_at)?;

    // Storage problems fall back to an in-memory store; only a failing
    // in-memory database stops startup.
    let store = tauri::async_runtime::block_on(database::open_session_store(
        paths::get_database_path(),
    ))
    .context("Failed to initialize session store")?;

    debug!("Starting Tauri application...");
    let app = tauri::Builder::default()
        .manage(store)
        .manage(Mutex::new(config))
        .manage(Mutex::new(lifecycle))
        .system_tray(menu::create_tray_menu())
        .on_system_tray_event(menu::handle_tray_event)
        .invoke_handler(tauri::generate_handler![
            commands::get_void_summary,
            commands::get_recent_sessions,
            commands::get_yearly_goal,
            commands::set_yearly_goal,
        ])
        .setup(|app| {
            let handle = app.handle();
            open_main_window(&handle)?;

            tauri::async_runtime::spawn(async move {
                let mut interval = tokio::time::interval(menu::REFRESH_INTERVAL);
                loop {
                    interval.tick().await;
                    if let Err(e) = menu::update_tray_menu(&handle).await {
                        error!("Failed to update tray menu: {}", e);
                    }
                }
            });

            Ok(())
        })
        .build(tauri::generate_context!())
        .context("Failed to build Tauri application")?;

    app.run(handle_run_event);
    Ok(())
}

fn handle_run_event(app: &AppHandle, event: RunEvent) {
    match event {
        RunEvent::ExitRequested { api, .. } => {
            let action = match app.state::<Lifecycle>().lock() {
                Ok(lifecycle) => lifecycle.on_all_windows_closed(),
                Err(e) => {
                    error!("Lifecycle lock poisoned: {}", e);
                    LifecycleAction::Quit
                }
            };
            if action == LifecycleAction::StayResident {
                api.prevent_exit();
            }
        }
        RunEvent::WindowEvent {
            label,
            event: WindowEvent::Destroyed,
            ..
        } if label == MAIN_WINDOW => {
            if let Ok(mut lifecycle) = app.state::<Lifecycle>().lock() {
                lifecycle.on_window_destroyed();
            }
        }
        RunEvent::Exit => {
            before_quit(app);
            info!("Application exited");
        }
        _ => {}
    }
}

fn create_main_window(app: &AppHandle) -> Result<Window> {
    let (width, height) = {
        let config = app.state::<Mutex<AppConfig>>();
        let config = config
            .lock()
            .map_err(|e| anyhow::anyhow!("Config lock poisoned: {}", e))?;
        (config.window_width, config.window_height)
    };

    let window = WindowBuilder::new(app, MAIN_WINDOW, WindowUrl::App("index.html".into()))
        .title("Voidspace")
        .inner_size(width, height)
        .visible(false)
        .build()?;
    Ok(window)
}

/// Creates the main window and shows it, or minimizes it when asked to
/// start minimized.
pub fn open_main_window(app: &AppHandle) -> Result<()> {
    debug!("Setting up main window...");
    let window = create_main_window(app)?;
    let start_minimized = app
        .state::<Mutex<AppConfig>>()
        .lock()
        .map(|config| config.start_minimized)
        .unwrap_or(false);

    let lifecycle = app.state::<Lifecycle>();
    let mut lifecycle = lifecycle
        .lock()
        .map_err(|e| anyhow::anyhow!("Lifecycle lock poisoned: {}", e))?;
    lifecycle.attach_window(window);

    let window = lifecycle.window()?;
    if start_minimized {
        window.minimize()?;
    } else {
        window.show()?;
    }
    Ok(())
}

/// Re-opens the main window when none exists, otherwise brings it forward.
pub fn activate(app: &AppHandle) {
    let action = match app.state::<Lifecycle>().lock() {
        Ok(lifecycle) => lifecycle.on_activate(),
        Err(e) => {
            error!("Lifecycle lock poisoned: {}", e);
            return;
        }
    };

    match action {
        LifecycleAction::CreateWindow => {
            if let Err(e) = open_main_window(app) {
                error!("Failed to recreate main window: {}", e);
            }
        }
        LifecycleAction::FocusWindow => {
            if let Some(window) = app.get_window(MAIN_WINDOW) {
                if let Err(e) = window.show().and_then(|_| window.set_focus()) {
                    error!("Failed to focus main window: {}", e);
                }
            }
        }
        _ => {}
    }
}

/// Persists the running session, then exits the process.
pub fn quit(app: &AppHandle) {
    before_quit(app);
    app.exit(0);
}

fn before_quit(app: &AppHandle) {
    let span = match app.state::<Lifecycle>().lock() {
        Ok(mut lifecycle) => lifecycle.on_before_quit(Utc::now()),
        Err(e) => {
            error!("Lifecycle lock poisoned: {}", e);
            None
        }
    };

    let store = app.state::<SessionStore>().inner().clone();
    tauri::async_runtime::block_on(async move {
        if let Some(span) = span {
            persist_session(&store, span).await;
        }
        if let Err(e) = store.close().await {
            error!("Error closing database: {}", e);
        }
    });

    if let Ok(mut lifecycle) = app.state::<Lifecycle>().lock() {
        lifecycle.terminate();
    }
}

/// Refreshes the tray in the background.
pub(crate) fn refresh_tray(app: &AppHandle) {
    let handle = app.clone();
    tauri::async_runtime::spawn(async move {
        if let Err(e) = menu::update_tray_menu(&handle).await {
            error!("Failed to update tray menu: {}", e);
        }
    });
}
