#![deny(unsafe_code)]

pub mod cli;
/// Per-document session state: view, review and chat.
pub mod controller;
pub mod error;
/// Layered, persisted settings.
pub mod settings;
pub mod terminal;

pub use controller::{AppView, GeminiBackends, SessionBackends, SessionController};
pub use error::{AppError, AppResult};
pub use settings::{AppSettings, SettingsError, SettingsPatch, SettingsStore};
