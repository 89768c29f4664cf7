use std::path::PathBuf;

use snafu::Snafu;

use crate::settings::SettingsError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("failed to read document at {path:?} on `{stage}`: {source}"))]
    ReadDocument {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("{message}"))]
    DocumentRejected {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("{message}"))]
    AnalysisFailed {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("failed to update settings on `{stage}`: {source}"))]
    Settings {
        stage: &'static str,
        source: SettingsError,
    },
    #[snafu(display("nothing to set; pass at least one option on `{stage}`"))]
    NothingToSet { stage: &'static str },
    #[snafu(display("terminal i/o failed on `{stage}`: {source}"))]
    Terminal {
        stage: &'static str,
        source: std::io::Error,
    },
}

pub type AppResult<T> = Result<T, AppError>;
