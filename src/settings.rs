use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Resolved configuration, read once at startup and handed to each component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub openai: OpenAiSettings,
    pub server: ServerSettings,
    pub hotkeys: HotkeySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeySettings {
    pub recognition: String,
    pub interruption: String,
    pub exit: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            model: "doubao-seed-1-6-250615".into(),
            base_url: "https://ark.cn-beijing.volces.com/api/v3".into(),
            api_key: String::new(),
            prompt: "Identify the content of the screenshot, think it through and \
                     answer. Keep the answer concise."
                .into(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 5678 }
    }
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            recognition: "space".into(),
            interruption: "ctrl".into(),
            exit: "ctrl+q".into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("settings serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl Settings {
    /// Load settings from `path`, creating the file with defaults when absent.
    ///
    /// Returns the resolved settings plus whether the file was just created,
    /// so the caller can notify the user. Missing individual fields fall back
    /// per-field; a malformed value (e.g. a non-integer port) is a hard error.
    pub fn load_or_create(path: &Path) -> Result<(Self, bool), SettingsError> {
        if !path.exists() {
            let defaults = Self::default();
            fs::write(path, toml::to_string_pretty(&defaults)?)?;
            log::info!("created default settings at {}", path.display());
            return Ok((defaults, true));
        }
        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok((settings, false))
    }
}
