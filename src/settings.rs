use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DompetError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Shared secret the Gmail relay must present in `x-api-key`.
    #[serde(default)]
    pub ingest_api_key: String,
    #[serde(default)]
    pub telegram_bot_token: String,
    /// Chat that receives pending-transaction notifications.
    #[serde(default)]
    pub telegram_chat_id: String,
    /// UUID identity budget rows are attributed to. Telegram chat ids
    /// are numeric and never valid here.
    #[serde(default)]
    pub owner_user_id: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8787".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            ingest_api_key: String::new(),
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            owner_user_id: String::new(),
            bind_addr: default_bind_addr(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("dompet")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("dompet")
}

/// Load settings from disk, then let the environment override the
/// secrets, matching how the hosted deployment was configured.
pub fn load_settings() -> Settings {
    let path = settings_path();
    let mut settings = if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    };
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_env_overrides<F>(settings: &mut Settings, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = var("DOMPET_INGEST_API_KEY") {
        settings.ingest_api_key = v;
    }
    if let Some(v) = var("TELEGRAM_BOT_TOKEN") {
        settings.telegram_bot_token = v;
    }
    if let Some(v) = var("TELEGRAM_CHAT_ID") {
        settings.telegram_chat_id = v;
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| DompetError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn db_path() -> PathBuf {
    get_data_dir().join("dompet.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            ingest_api_key: "secret".to_string(),
            telegram_bot_token: "123:abc".to_string(),
            telegram_chat_id: "42".to_string(),
            owner_user_id: "354ef27f-64ae-4c6a-8833-2ee14885331e".to_string(),
            bind_addr: "0.0.0.0:9999".to_string(),
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let loaded: Settings =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.ingest_api_key, "secret");
        assert_eq!(loaded.bind_addr, "0.0.0.0:9999");
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.ingest_api_key.is_empty());
        assert_eq!(s.bind_addr, "127.0.0.1:8787");
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_partial_json_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.bind_addr, "127.0.0.1:8787");
        assert!(s.telegram_bot_token.is_empty());
    }

    #[test]
    fn test_env_overrides_secrets() {
        let mut s = Settings::default();
        apply_env_overrides(&mut s, |key| match key {
            "DOMPET_INGEST_API_KEY" => Some("from-env".to_string()),
            "TELEGRAM_CHAT_ID" => Some("777".to_string()),
            _ => None,
        });
        assert_eq!(s.ingest_api_key, "from-env");
        assert_eq!(s.telegram_chat_id, "777");
        assert!(s.telegram_bot_token.is_empty());
    }
}
