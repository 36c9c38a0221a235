pub mod config;
pub mod database;
pub mod lifecycle;
pub mod logging;
pub mod paths;
pub mod summary;

#[cfg(feature = "desktop")]
mod commands;
#[cfg(feature = "desktop")]
pub mod menu;
#[cfg(feature = "desktop")]
pub mod shell;

pub use config::AppConfig;
pub use database::{Aggregate, SchemaStatus, SessionRecord, SessionStore, StoreError};
pub use lifecycle::{AppLifecycle, LifecycleAction, LifecycleError, Platform, SessionState, SessionSpan};
pub use summary::VoidSummary;

#[cfg(feature = "desktop")]
pub use shell::run;
