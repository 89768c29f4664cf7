use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::settings::SettingsPatch;

/// ScholarSight - AI peer review for research papers
#[derive(Parser, Debug)]
#[command(name = "scholarsight")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Review a PDF or TXT paper, then chat about it
    Review {
        /// Path to the paper (.pdf or .txt)
        file: PathBuf,

        /// Print the review and exit without starting a chat
        #[arg(long)]
        no_chat: bool,
    },

    /// Inspect or change stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print effective settings (API key masked)
    Show,

    /// Persist one or more settings
    Set(SetArgs),
}

#[derive(Args, Debug, Default)]
pub struct SetArgs {
    /// Gemini API key
    #[arg(long)]
    pub api_key: Option<String>,

    /// Model used for the structured review
    #[arg(long)]
    pub review_model: Option<String>,

    /// Model used for the follow-up chat
    #[arg(long)]
    pub chat_model: Option<String>,

    /// Base URL of the generative language API
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Seconds to wait for each chat fragment (0 waits forever)
    #[arg(long)]
    pub stream_idle_timeout_secs: Option<u64>,
}

impl SetArgs {
    pub fn into_patch(self) -> SettingsPatch {
        SettingsPatch {
            api_key: self.api_key,
            endpoint: self.endpoint,
            review_model: self.review_model,
            chat_model: self.chat_model,
            stream_idle_timeout_secs: self.stream_idle_timeout_secs,
        }
    }
}
