use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use scholarsight_llm::{DEFAULT_CHAT_MODEL, DEFAULT_ENDPOINT, DEFAULT_REVIEW_MODEL, ProviderConfig};
use scholarsight_review::MAX_FILE_SIZE_MB;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "scholarsight";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const SETTINGS_ENV_PREFIX: &str = "SCHOLARSIGHT_";
pub const API_KEY_FALLBACK_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_review_model")]
    pub review_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Seconds to wait for each chat fragment. `0` waits forever.
    #[serde(default = "default_stream_idle_timeout_secs")]
    pub stream_idle_timeout_secs: u64,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_endpoint(),
            review_model: default_review_model(),
            chat_model: default_chat_model(),
            stream_idle_timeout_secs: default_stream_idle_timeout_secs(),
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

impl AppSettings {
    pub fn is_valid(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(&self.api_key, &self.endpoint)
            .with_review_model(&self.review_model)
            .with_chat_model(&self.chat_model)
    }

    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        (self.stream_idle_timeout_secs > 0)
            .then(|| Duration::from_secs(self.stream_idle_timeout_secs))
    }

    /// Last four characters only, for display.
    pub fn masked_api_key(&self) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return "(not set)".to_string();
        }
        let tail: String = key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{tail}")
    }

    pub fn normalized(mut self) -> Self {
        self.api_key = self.api_key.trim().to_string();
        self.endpoint = non_blank_or(self.endpoint, default_endpoint);
        self.review_model = non_blank_or(self.review_model, default_review_model);
        self.chat_model = non_blank_or(self.chat_model, default_chat_model);
        if self.max_file_size_mb == 0 {
            self.max_file_size_mb = default_max_file_size_mb();
        }
        self
    }

    /// Fills a blank key from the conventional provider variable.
    pub fn with_api_key_fallback(mut self, fallback: Option<String>) -> Self {
        if self.api_key.trim().is_empty()
            && let Some(key) = fallback.filter(|key| !key.trim().is_empty())
        {
            self.api_key = key.trim().to_string();
        }
        self
    }
}

/// Partial update applied by `config set`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub review_model: Option<String>,
    pub chat_model: Option<String>,
    pub stream_idle_timeout_secs: Option<u64>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(self, mut settings: AppSettings) -> AppSettings {
        if let Some(api_key) = self.api_key {
            settings.api_key = api_key;
        }
        if let Some(endpoint) = self.endpoint {
            settings.endpoint = endpoint;
        }
        if let Some(review_model) = self.review_model {
            settings.review_model = review_model;
        }
        if let Some(chat_model) = self.chat_model {
            settings.chat_model = chat_model;
        }
        if let Some(seconds) = self.stream_idle_timeout_secs {
            settings.stream_idle_timeout_secs = seconds;
        }
        settings
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<AppSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".scholarsight"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Loads file and environment layers, then the provider key fallback.
    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_layers(&config_path)
            .with_api_key_fallback(std::env::var(API_KEY_FALLBACK_ENV).ok());
        Self::from_settings(config_path, settings)
    }

    /// Loads only the file layer. Used where the process environment must not leak in.
    pub fn from_file(config_path: PathBuf) -> Self {
        let settings = Self::load_from_figment(Self::file_figment(&config_path), &config_path);
        Self::from_settings(config_path, settings)
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<AppSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: AppSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    fn from_settings(config_path: PathBuf, settings: AppSettings) -> Self {
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    fn file_figment(path: &Path) -> Figment {
        let figment = Figment::from(Serialized::defaults(AppSettings::default()));
        if path.exists() {
            figment.merge(Json::file(path))
        } else {
            tracing::info!("settings file not found at {:?}, using defaults", path);
            figment
        }
    }

    fn load_layers(path: &Path) -> AppSettings {
        let figment = Self::file_figment(path).merge(Env::prefixed(SETTINGS_ENV_PREFIX));
        Self::load_from_figment(figment, path)
    }

    fn load_from_figment(figment: Figment, path: &Path) -> AppSettings {
        match figment.extract::<AppSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                AppSettings::default()
            }
        }
    }

    fn persist(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn non_blank_or(value: String, fallback: fn() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_review_model() -> String {
    DEFAULT_REVIEW_MODEL.to_string()
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_stream_idle_timeout_secs() -> u64 {
    DEFAULT_STREAM_IDLE_TIMEOUT_SECS
}

fn default_max_file_size_mb() -> usize {
    MAX_FILE_SIZE_MB
}
