//! Application lifecycle context.
//!
//! Holds what the shell needs between host events: the session start
//! instant, the session state and the (optional) main window handle. The
//! context is generic over the window type so the transitions can be driven
//! without a windowing runtime.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::database::{seconds_between, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Running,
    Closing,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }

    /// Whether applications conventionally stay alive with no open window.
    pub fn keeps_apps_resident(self) -> bool {
        matches!(self, Platform::MacOs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Quit,
    StayResident,
    CreateWindow,
    FocusWindow,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("\"main\" window is not defined")]
    MissingWindow,
    #[error("Session already started at {0}")]
    AlreadyStarted(DateTime<Utc>),
}

/// Start and end of a session, finished or measured up to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SessionSpan {
    /// Whole seconds, rounded the same way the stored row will be.
    pub fn seconds(&self) -> i64 {
        seconds_between(self.start, self.end)
    }
}

pub struct AppLifecycle<W> {
    platform: Platform,
    state: SessionState,
    started_at: Option<DateTime<Utc>>,
    window: Option<W>,
}

impl<W> AppLifecycle<W> {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            state: SessionState::NotStarted,
            started_at: None,
            window: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Span of the session still running at `now`, not yet persisted.
    pub fn running_span(&self, now: DateTime<Utc>) -> Option<SessionSpan> {
        match (self.state, self.started_at) {
            (SessionState::Running, Some(start)) => Some(SessionSpan { start, end: now }),
            _ => None,
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        if let Some(started_at) = self.started_at {
            return Err(LifecycleError::AlreadyStarted(started_at));
        }
        info!("Session started at {}", now.to_rfc3339());
        self.started_at = Some(now);
        self.state = SessionState::Running;
        Ok(())
    }

    pub fn attach_window(&mut self, window: W) {
        if self.window.replace(window).is_some() {
            warn!("Replacing an existing main window handle");
        }
    }

    pub fn window(&self) -> Result<&W, LifecycleError> {
        self.window.as_ref().ok_or(LifecycleError::MissingWindow)
    }

    pub fn on_window_destroyed(&mut self) -> Option<W> {
        debug!("Main window destroyed");
        self.window.take()
    }

    pub fn on_all_windows_closed(&self) -> LifecycleAction {
        if self.platform.keeps_apps_resident() {
            debug!("All windows closed, staying resident on {:?}", self.platform);
            LifecycleAction::StayResident
        } else {
            debug!("All windows closed, quitting on {:?}", self.platform);
            LifecycleAction::Quit
        }
    }

    pub fn on_activate(&self) -> LifecycleAction {
        if self.window.is_some() {
            LifecycleAction::FocusWindow
        } else {
            LifecycleAction::CreateWindow
        }
    }

    /// Moves a running session to `Closing` and hands back its span.
    /// Returns `None` when the session was never started or is already
    /// closing, so a session is persisted at most once.
    pub fn on_before_quit(&mut self, now: DateTime<Utc>) -> Option<SessionSpan> {
        if self.state != SessionState::Running {
            debug!("Before-quit ignored in state {:?}", self.state);
            return None;
        }
        self.state = SessionState::Closing;
        let start = self.started_at?;
        info!("Session ending at {}", now.to_rfc3339());
        Some(SessionSpan { start, end: now })
    }

    pub fn terminate(&mut self) {
        self.window = None;
        self.state = SessionState::Terminated;
    }
}

/// Writes a finished session, logging instead of surfacing failures.
pub async fn persist_session(store: &SessionStore, span: SessionSpan) -> bool {
    match store.record_session(span.start, span.end).await {
        Ok(record) => {
            info!("Void time recorded: {}s", record.seconds_difference);
            true
        }
        Err(e) => {
            error!("Failed to record session: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-09-10T18:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn session_walks_through_states() {
        let mut lifecycle: AppLifecycle<()> = AppLifecycle::new(Platform::Linux);
        assert_eq!(lifecycle.state(), SessionState::NotStarted);

        lifecycle.start(t0()).unwrap();
        assert_eq!(lifecycle.state(), SessionState::Running);

        let span = lifecycle.on_before_quit(t0() + Duration::seconds(5)).unwrap();
        assert_eq!(span.start, t0());
        assert_eq!(lifecycle.state(), SessionState::Closing);

        lifecycle.terminate();
        assert_eq!(lifecycle.state(), SessionState::Terminated);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut lifecycle: AppLifecycle<()> = AppLifecycle::new(Platform::Linux);
        lifecycle.start(t0()).unwrap();
        assert!(matches!(
            lifecycle.start(t0() + Duration::seconds(1)),
            Err(LifecycleError::AlreadyStarted(at)) if at == t0()
        ));
    }

    #[test]
    fn before_quit_yields_span_only_once() {
        let mut lifecycle: AppLifecycle<()> = AppLifecycle::new(Platform::Windows);
        lifecycle.start(t0()).unwrap();
        assert!(lifecycle.on_before_quit(t0() + Duration::seconds(3)).is_some());
        assert!(lifecycle.on_before_quit(t0() + Duration::seconds(4)).is_none());
    }

    #[test]
    fn before_quit_without_start_yields_nothing() {
        let mut lifecycle: AppLifecycle<()> = AppLifecycle::new(Platform::Linux);
        assert!(lifecycle.on_before_quit(t0()).is_none());
        assert_eq!(lifecycle.state(), SessionState::NotStarted);
    }

    #[test]
    fn all_windows_closed_follows_platform_convention() {
        let mac: AppLifecycle<()> = AppLifecycle::new(Platform::MacOs);
        assert_eq!(mac.on_all_windows_closed(), LifecycleAction::StayResident);

        for platform in [Platform::Windows, Platform::Linux, Platform::Other] {
            let lifecycle: AppLifecycle<()> = AppLifecycle::new(platform);
            assert_eq!(lifecycle.on_all_windows_closed(), LifecycleAction::Quit);
        }
    }

    #[test]
    fn activate_recreates_a_missing_window() {
        let mut lifecycle = AppLifecycle::new(Platform::MacOs);
        assert_eq!(lifecycle.on_activate(), LifecycleAction::CreateWindow);

        lifecycle.attach_window("main");
        assert_eq!(lifecycle.on_activate(), LifecycleAction::FocusWindow);

        assert_eq!(lifecycle.on_window_destroyed(), Some("main"));
        assert_eq!(lifecycle.on_activate(), LifecycleAction::CreateWindow);
    }

    #[test]
    fn missing_window_is_an_error() {
        let lifecycle: AppLifecycle<&str> = AppLifecycle::new(Platform::Linux);
        assert!(matches!(lifecycle.window(), Err(LifecycleError::MissingWindow)));
    }

    #[test]
    fn running_span_exists_only_while_running() {
        let mut lifecycle: AppLifecycle<()> = AppLifecycle::new(Platform::Linux);
        assert!(lifecycle.running_span(t0()).is_none());

        lifecycle.start(t0()).unwrap();
        let span = lifecycle.running_span(t0() + Duration::seconds(42)).unwrap();
        assert_eq!(span.start, t0());
        assert_eq!(span.seconds(), 42);

        lifecycle.on_before_quit(t0() + Duration::seconds(50));
        assert!(lifecycle.running_span(t0() + Duration::seconds(60)).is_none());
    }

    #[tokio::test]
    async fn running_seconds_match_the_stored_row() {
        let store = SessionStore::open_in_memory().unwrap();
        store.ensure_schema().await.unwrap();

        let mut lifecycle: AppLifecycle<()> = AppLifecycle::new(Platform::Linux);
        lifecycle.start(t0()).unwrap();
        let now = t0() + Duration::milliseconds(59_700);

        let shown = lifecycle.running_span(now).unwrap().seconds();
        let span = lifecycle.on_before_quit(now).unwrap();
        assert!(persist_session(&store, span).await);

        let stored = store.recent_sessions(1).await.unwrap()[0].seconds_difference;
        assert_eq!(shown, 60);
        assert_eq!(shown, stored);
    }

    #[tokio::test]
    async fn before_quit_five_seconds_after_start_records_five() {
        let store = SessionStore::open_in_memory().unwrap();
        store.ensure_schema().await.unwrap();

        let mut lifecycle: AppLifecycle<()> = AppLifecycle::new(Platform::Linux);
        lifecycle.start(t0()).unwrap();
        let span = lifecycle.on_before_quit(t0() + Duration::seconds(5)).unwrap();
        assert!(persist_session(&store, span).await);

        let sessions = store.recent_sessions(10).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].seconds_difference, 5);
    }

    #[tokio::test]
    async fn persist_failure_is_swallowed() {
        let store = SessionStore::open_in_memory().unwrap();
        let span = SessionSpan {
            start: t0(),
            end: t0() + Duration::seconds(1),
        };
        // No schema: the insert fails and is only logged.
        assert!(!persist_session(&store, span).await);
    }
}
