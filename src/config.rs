use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::history::HistoryPolicy;
use crate::progress::{self, AnimationSettings};
use crate::session::SessionOptions;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub window: WindowConfig,
}

fn default_host() -> String {
    "http://localhost:5000".to_string()
}

fn default_ask_path() -> String {
    "/api/ask".to_string()
}

fn default_upload_path() -> String {
    "/api/upload".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_ask_path")]
    pub ask_path: String,
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            ask_path: default_ask_path(),
            upload_path: default_upload_path(),
        }
    }
}

/// Which chat page to run: the plain SQL view or the agentic one with the
/// thinking indicator, explanations and reasoning traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Agentic,
    Simple,
}

impl Variant {
    pub fn default_policy(self) -> HistoryPolicy {
        match self {
            Variant::Agentic => HistoryPolicy::Rich,
            Variant::Simple => HistoryPolicy::Simple,
        }
    }

    pub fn animates(self) -> bool {
        matches!(self, Variant::Agentic)
    }

    pub fn no_data_text(self) -> &'static str {
        match self {
            Variant::Agentic => "No results found",
            Variant::Simple => "No column information available",
        }
    }
}

fn default_thinking_label() -> String {
    progress::DEFAULT_LABEL.to_string()
}

fn default_tick_interval_ms() -> u64 {
    progress::DEFAULT_INTERVAL.as_millis() as u64
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub variant: Variant,
    /// Overrides the variant's history policy when set.
    #[serde(default)]
    pub history_policy: Option<HistoryPolicy>,
    #[serde(default = "default_thinking_label")]
    pub thinking_label: String,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatConfig {
            variant: Variant::default(),
            history_policy: None,
            thinking_label: default_thinking_label(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl ChatConfig {
    pub fn policy(&self) -> HistoryPolicy {
        self.history_policy
            .unwrap_or_else(|| self.variant.default_policy())
    }

    pub fn animation(&self) -> Option<AnimationSettings> {
        if !self.variant.animates() {
            return None;
        }
        let interval = if self.tick_interval_ms == 0 {
            warn!("tick_interval_ms must be positive; using the default");
            progress::DEFAULT_INTERVAL
        } else {
            Duration::from_millis(self.tick_interval_ms)
        };
        Some(AnimationSettings {
            label: self.thinking_label.clone(),
            interval,
        })
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            policy: self.policy(),
            animation: self.animation(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 900,
            height: 700,
            min_width: 480,
            min_height: 360,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        if config_path.exists() {
            match Self::read(&config_path) {
                Ok(config) => return config,
                Err(e) => warn!("{:#}. Using defaults.", e),
            }
        } else if let Some(parent) = config_path.parent() {
            // Create config directory if it doesn't exist
            let _ = fs::create_dir_all(parent);
        }

        Config::default()
    }

    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Error reading {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Error parsing {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn get_config_path() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/db-chat/config.toml")
        } else {
            PathBuf::from("config.toml")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.host, "http://localhost:5000");
        assert_eq!(config.server.ask_path, "/api/ask");
        assert_eq!(config.chat.variant, Variant::Agentic);
        assert_eq!(config.chat.policy(), HistoryPolicy::Rich);
        assert_eq!(config.chat.animation(), Some(AnimationSettings::default()));
        assert_eq!(config.window.width, 900);
    }

    #[test]
    fn test_simple_variant() {
        let config = Config::parse(
            r#"
            [server]
            host = "http://10.0.0.2:5000"

            [chat]
            variant = "simple"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.host, "http://10.0.0.2:5000");
        assert_eq!(config.server.upload_path, "/api/upload");
        let options = config.chat.session_options();
        assert_eq!(options.policy, HistoryPolicy::Simple);
        assert_eq!(options.animation, None);
        assert_eq!(config.chat.variant.no_data_text(), "No column information available");
    }

    #[test]
    fn test_policy_override_and_zero_interval() {
        let config = Config::parse(
            r#"
            [chat]
            history_policy = "simple"
            thinking_label = "Thinking"
            tick_interval_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.chat.policy(), HistoryPolicy::Simple);
        let animation = config.chat.animation().unwrap();
        assert_eq!(animation.label, "Thinking");
        assert_eq!(animation.interval, progress::DEFAULT_INTERVAL);
    }

    #[test]
    fn test_partial_window_section_keeps_other_fields() {
        let config = Config::parse(
            r#"
            [server]
            host = "http://10.0.0.2:5000"

            [window]
            width = 1200
            "#,
        )
        .unwrap();
        assert_eq!(config.server.host, "http://10.0.0.2:5000");
        assert_eq!(config.window.width, 1200);
        assert_eq!(config.window.height, 700);
        assert_eq!(config.window.min_width, 480);
    }

    #[test]
    fn test_read_reports_path() {
        let missing = Path::new("/nonexistent/db-chat/config.toml");
        let err = Config::read(missing).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/db-chat/config.toml"));
    }

    #[test]
    fn test_unknown_variant_is_rejected() {
        assert!(Config::parse("[chat]\nvariant = \"streaming\"").is_err());
    }
}
