use std::path::PathBuf;
use std::sync::Arc;

use scholarsight_review::DocumentIngestor;
use snafu::{OptionExt, ResultExt};

use super::args::{Cli, Commands, ConfigAction, SetArgs};
use crate::controller::{ANALYSIS_FAILED_MESSAGE, AppView, GeminiBackends, SessionController};
use crate::error::{
    AnalysisFailedSnafu, AppResult, DocumentRejectedSnafu, NothingToSetSnafu, ReadDocumentSnafu,
    SettingsSnafu,
};
use crate::settings::{AppSettings, SettingsStore};
use crate::terminal;

pub async fn execute(cli: Cli) -> AppResult<()> {
    match cli.command {
        Commands::Review { file, no_chat } => review(file, no_chat).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                show_config();
                Ok(())
            }
            ConfigAction::Set(args) => set_config(args),
        },
    }
}

async fn review(path: PathBuf, no_chat: bool) -> AppResult<()> {
    let settings = SettingsStore::load().settings();
    if !settings.is_valid() {
        tracing::warn!("no API key configured; run `scholarsight config set --api-key <KEY>`");
    }

    let bytes = std::fs::read(&path).context(ReadDocumentSnafu {
        stage: "read-document",
        path: path.clone(),
    })?;

    let backends = Arc::new(GeminiBackends::new(settings.to_provider_config()));
    let mut session = SessionController::new(
        backends,
        DocumentIngestor::new(settings.max_file_size_mb),
        settings.stream_idle_timeout(),
    );

    let document = session
        .select_path(&path, &bytes)
        .with_context(|| DocumentRejectedSnafu {
            stage: "select-document",
            message: session.upload_error().unwrap_or_default().to_string(),
        })?;

    eprintln!("Analyzing {}...", document.name);
    session.process_document(document).await;
    if session.view() != AppView::Dashboard {
        return AnalysisFailedSnafu {
            stage: "process-document",
            message: session
                .error_message()
                .unwrap_or(ANALYSIS_FAILED_MESSAGE)
                .to_string(),
        }
        .fail();
    }

    if let Some(dashboard) = session.dashboard() {
        println!("{dashboard}\n");
    }

    if no_chat {
        return Ok(());
    }
    match session.chat_mut() {
        Some(chat) => terminal::run_chat(chat).await,
        None => Ok(()),
    }
}

fn show_config() {
    let settings = SettingsStore::load().settings();
    println!("settings file:            {}", SettingsStore::default_config_path().display());
    println!("api_key:                  {}", settings.masked_api_key());
    println!("endpoint:                 {}", settings.endpoint);
    println!("review_model:             {}", settings.review_model);
    println!("chat_model:               {}", settings.chat_model);
    println!("stream_idle_timeout_secs: {}", settings.stream_idle_timeout_secs);
    println!("max_file_size_mb:         {}", settings.max_file_size_mb);
}

fn set_config(args: SetArgs) -> AppResult<()> {
    let patch = args.into_patch();
    if patch.is_empty() {
        return NothingToSetSnafu {
            stage: "config-set",
        }
        .fail();
    }

    // File layer only, so environment overrides are never written to disk.
    let store = SettingsStore::from_file(SettingsStore::default_config_path());
    let updated: AppSettings = patch.apply(store.settings().as_ref().clone());
    store.update(updated).context(SettingsSnafu {
        stage: "config-set",
    })?;

    println!("Saved settings to {}", store.config_path().display());
    Ok(())
}
