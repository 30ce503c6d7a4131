use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use teloxide::types::{ChatId, UserId};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file '{}': {source}", path.display())]
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    #[error("failed to parse config file '{}': {source}", path.display())]
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Invalid cron expression for the notification scan.
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
    /// Validation error.
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Deserialize)]
struct ConfigFile {
    owner_ids: Vec<u64>,
    /// Falls back to the TELEGRAM_TOKEN environment variable when empty.
    #[serde(default)]
    telegram_bot_token: String,
    /// Falls back to the GOOGLE_API_KEY environment variable when empty.
    #[serde(default)]
    gemini_api_key: String,
    #[serde(default = "default_gemini_model")]
    gemini_model: String,
    /// Directory for state files (logs, user files). Defaults to current directory.
    data_dir: Option<String>,
    /// Channel users must join before using the bot.
    required_channel: Option<ChannelFile>,
    /// Path to Whisper model file (.bin) for voice transcription.
    whisper_model_path: Option<String>,
    semantic_scholar_api_key: Option<String>,
    #[serde(default = "default_max_papers_to_compare")]
    max_papers_to_compare: usize,
    #[serde(default = "default_daily_comparison_limit")]
    daily_comparison_limit: u32,
    #[serde(default = "default_comparison_cache_hours")]
    comparison_cache_hours: i64,
    /// 7-field cron (sec min hour day month dow year).
    #[serde(default = "default_notification_scan_cron")]
    notification_scan_cron: String,
    #[serde(default = "default_chunk_delay_ms")]
    chunk_delay_ms: u64,
    #[serde(default = "default_latest_query")]
    latest_query: String,
}

#[derive(Deserialize)]
struct ChannelFile {
    id: i64,
    username: String,
}

fn default_gemini_model() -> String {
    "gemini-1.5-pro".to_string()
}

fn default_max_papers_to_compare() -> usize {
    3
}

fn default_daily_comparison_limit() -> u32 {
    10
}

fn default_comparison_cache_hours() -> i64 {
    24
}

fn default_notification_scan_cron() -> String {
    "0 0 * * * * *".to_string()
}

fn default_chunk_delay_ms() -> u64 {
    500
}

fn default_latest_query() -> String {
    "cat:cs.AI OR cat:cs.LG OR cat:cs.CL".to_string()
}

/// Channel membership gate.
#[derive(Debug, Clone)]
pub struct RequiredChannel {
    pub id: ChatId,
    /// Public username without the leading `@`.
    pub username: String,
}

impl RequiredChannel {
    pub fn join_url(&self) -> String {
        format!("https://t.me/{}", self.username)
    }
}

pub struct Config {
    /// Owner IDs - first ID is the primary owner (admin panel owner).
    pub owner_ids: Vec<UserId>,
    pub telegram_bot_token: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub data_dir: PathBuf,
    pub required_channel: Option<RequiredChannel>,
    pub whisper_model_path: Option<PathBuf>,
    pub semantic_scholar_api_key: Option<String>,
    pub max_papers_to_compare: usize,
    pub daily_comparison_limit: u32,
    pub comparison_cache_hours: i64,
    pub notification_scan_cron: String,
    pub chunk_delay_ms: u64,
    pub latest_query: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        Self::from_file(file, |key| std::env::var(key).ok())
    }

    fn from_file(file: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if file.owner_ids.is_empty() {
            return Err(ConfigError::Validation("owner_ids must contain at least one owner ID".into()));
        }

        let telegram_bot_token = non_empty_or_env(file.telegram_bot_token, "TELEGRAM_TOKEN", &env);
        if telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }

        let gemini_api_key = non_empty_or_env(file.gemini_api_key, "GOOGLE_API_KEY", &env);
        if gemini_api_key.is_empty() {
            return Err(ConfigError::Validation("gemini_api_key is required".into()));
        }

        if file.max_papers_to_compare < 2 {
            return Err(ConfigError::Validation("max_papers_to_compare must be at least 2".into()));
        }
        if file.comparison_cache_hours <= 0 {
            return Err(ConfigError::Validation("comparison_cache_hours must be positive".into()));
        }

        cron::Schedule::from_str(&file.notification_scan_cron).map_err(|e| ConfigError::InvalidCron {
            expr: file.notification_scan_cron.clone(),
            reason: e.to_string(),
        })?;

        let required_channel = file.required_channel.map(|c| RequiredChannel {
            id: ChatId(c.id),
            username: c.username.trim_start_matches('@').to_string(),
        });

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            owner_ids: file.owner_ids.into_iter().map(UserId).collect(),
            telegram_bot_token,
            gemini_api_key,
            gemini_model: file.gemini_model,
            data_dir,
            required_channel,
            whisper_model_path: file.whisper_model_path.map(PathBuf::from),
            semantic_scholar_api_key: file
                .semantic_scholar_api_key
                .filter(|k| !k.is_empty())
                .or_else(|| env("SEMANTIC_SCHOLAR_API_KEY")),
            max_papers_to_compare: file.max_papers_to_compare,
            daily_comparison_limit: file.daily_comparison_limit,
            comparison_cache_hours: file.comparison_cache_hours,
            notification_scan_cron: file.notification_scan_cron,
            chunk_delay_ms: file.chunk_delay_ms,
            latest_query: file.latest_query,
        })
    }

    /// The primary owner, who manages admins and broadcasts.
    pub fn primary_owner(&self) -> UserId {
        self.owner_ids[0]
    }
}

fn non_empty_or_env(value: String, key: &str, env: &impl Fn(&str) -> Option<String>) -> String {
    if value.is_empty() {
        env(key).unwrap_or_default()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn parse(content: &str) -> Result<Config, ConfigError> {
        let file: ConfigFile = serde_json::from_str(content).unwrap();
        Config::from_file(file, |_| None)
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_valid_config() {
        let file = write_config(r#"{
            "owner_ids": [123456],
            "telegram_bot_token": "123456789:ABCdefGHIjklMNOpqrsTUVwxyz",
            "gemini_api_key": "g-key"
        }"#);
        let config = Config::load(file.path()).expect("should load valid config");
        assert_eq!(config.owner_ids, vec![UserId(123456)]);
        assert_eq!(config.primary_owner(), UserId(123456));
        assert_eq!(config.gemini_model, "gemini-1.5-pro");
        assert_eq!(config.max_papers_to_compare, 3);
        assert_eq!(config.daily_comparison_limit, 10);
        assert_eq!(config.comparison_cache_hours, 24);
        assert_eq!(config.chunk_delay_ms, 500);
        assert!(config.required_channel.is_none());
    }

    #[test]
    fn test_required_channel_strips_at() {
        let config = parse(r#"{
            "owner_ids": [1],
            "telegram_bot_token": "1:abc",
            "gemini_api_key": "g",
            "required_channel": { "id": -1001234, "username": "@paperpilot_news" }
        }"#).unwrap();
        let channel = config.required_channel.unwrap();
        assert_eq!(channel.id, ChatId(-1001234));
        assert_eq!(channel.join_url(), "https://t.me/paperpilot_news");
    }

    #[test]
    fn test_env_fallback_for_keys() {
        let file: ConfigFile = serde_json::from_str(r#"{ "owner_ids": [1] }"#).unwrap();
        let config = Config::from_file(file, |key| match key {
            "TELEGRAM_TOKEN" => Some("42:secret".to_string()),
            "GOOGLE_API_KEY" => Some("from-env".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.telegram_bot_token, "42:secret");
        assert_eq!(config.gemini_api_key, "from-env");
    }

    #[test]
    fn test_empty_owner_ids() {
        let err = assert_err(parse(r#"{
            "owner_ids": [],
            "telegram_bot_token": "123456789:ABCdef",
            "gemini_api_key": "g"
        }"#));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("owner_ids"));
    }

    #[test]
    fn test_empty_token() {
        let err = assert_err(parse(r#"{
            "owner_ids": [123],
            "telegram_bot_token": "",
            "gemini_api_key": "g"
        }"#));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("telegram_bot_token"));
    }

    #[test]
    fn test_invalid_token_format() {
        for token in ["invalid_token_no_colon", "notanumber:ABCdef", "123456789:"] {
            let content = format!(
                r#"{{ "owner_ids": [123], "telegram_bot_token": "{token}", "gemini_api_key": "g" }}"#
            );
            let err = assert_err(parse(&content));
            assert!(matches!(err, ConfigError::Validation(_)), "token {token}");
        }
    }

    #[test]
    fn test_missing_gemini_key() {
        let err = assert_err(parse(r#"{
            "owner_ids": [123],
            "telegram_bot_token": "123:abc"
        }"#));
        assert!(err.to_string().contains("gemini_api_key"));
    }

    #[test]
    fn test_invalid_cron() {
        let err = assert_err(parse(r#"{
            "owner_ids": [123],
            "telegram_bot_token": "123:abc",
            "gemini_api_key": "g",
            "notification_scan_cron": "every hour"
        }"#));
        assert!(matches!(err, ConfigError::InvalidCron { .. }));
    }

    #[test]
    fn test_compare_limit_too_small() {
        let err = assert_err(parse(r#"{
            "owner_ids": [123],
            "telegram_bot_token": "123:abc",
            "gemini_api_key": "g",
            "max_papers_to_compare": 1
        }"#));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_file_not_found() {
        let err = assert_err(Config::load("/nonexistent/path/config.json"));
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_config("{ invalid json }");
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }
}
