use serde::Deserialize;
use std::path::Path;

use crate::error::AppError;

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub database: DbConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub nlu: NluConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BotConfig {
    /// Período padrão do Brag Document, em dias.
    #[serde(default = "default_period_days")]
    pub default_period_days: u32,
    #[serde(default = "default_max_activity_len")]
    pub max_activity_len: usize,
    /// Offset do fuso usado para interpretar "hoje", "ontem" etc.
    #[serde(default = "default_tz_offset")]
    pub timezone_offset_hours: i32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Sem chave, o resumo por IA fica desativado.
    pub api_key: Option<String>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct NluConfig {
    #[serde(default = "default_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_max_command_words")]
    pub max_command_words: usize,
}

fn default_period_days() -> u32 {
    7
}
fn default_max_activity_len() -> usize {
    500
}
fn default_tz_offset() -> i32 {
    -3
}
fn default_db_path() -> String {
    "bragfy.db".to_string()
}
fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_llm_model() -> String {
    "openai/gpt-4o-mini".to_string()
}
fn default_llm_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_port() -> u16 {
    3000
}
fn default_threshold() -> f64 {
    0.75
}
fn default_max_command_words() -> usize {
    8
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            default_period_days: default_period_days(),
            max_activity_len: default_max_activity_len(),
            timezone_offset_hours: default_tz_offset(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            port: default_port(),
        }
    }
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_threshold(),
            max_command_words: default_max_command_words(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("{:?}: {}", path, e)))?;
        Ok(config)
    }

    /// Sem config.toml, sobe com os valores padrão. Valida depois do env.
    pub fn load_or_default(path: &Path) -> Result<Self, AppError> {
        let mut cfg = if path.exists() {
            Self::load(path)?
        } else {
            tracing::warn!(path = ?path, "config file not found, using defaults");
            Self::default()
        };
        cfg.apply_env(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Environment variables win over the file.
    pub fn apply_env<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = var("DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(key) = var("LLM_API_KEY").or_else(|| var("OPENROUTER_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = var("LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.health.port = port;
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.bot.default_period_days == 0 {
            return Err(AppError::Config(
                "bot.default_period_days must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.nlu.confidence_threshold) {
            return Err(AppError::Config(
                "nlu.confidence_threshold must be within 0.0..=1.0".into(),
            ));
        }
        if !(-12..=14).contains(&self.bot.timezone_offset_hours) {
            return Err(AppError::Config(
                "bot.timezone_offset_hours out of range".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[bot]
default_period_days = 14
timezone_offset_hours = -3

[database]
path = "test.db"

[llm]
model = "anthropic/claude-3-haiku"
api_key = "sk-test"

[health]
port = 8080

[nlu]
confidence_threshold = 0.8
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bot.default_period_days, 14);
        assert_eq!(config.bot.max_activity_len, 500);
        assert_eq!(config.database.path, "test.db");
        assert_eq!(config.llm.model, "anthropic/claude-3-haiku");
        assert_eq!(config.llm.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.health.port, 8080);
        assert!(config.health.enabled);
        assert!((config.nlu.confidence_threshold - 0.8).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.bot.default_period_days, 7);
        assert_eq!(config.database.path, "bragfy.db");
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.nlu.max_command_words, 8);
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("DATABASE_PATH", "/data/brag.db"),
            ("OPENROUTER_API_KEY", "sk-or"),
            ("PORT", "9090"),
            ("LLM_MODEL", ""),
        ]);
        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.database.path, "/data/brag.db");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-or"));
        assert_eq!(config.health.port, 9090);
        // valores vazios são ignorados
        assert_eq!(config.llm.model, "openai/gpt-4o-mini");
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let config: Config = toml::from_str("[nlu]\nconfidence_threshold = 1.5").unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_load_or_default_validates_file() {
        let dir = std::env::temp_dir();
        let missing = dir.join(format!("bragfy-missing-{}.toml", std::process::id()));
        let cfg = Config::load_or_default(&missing).unwrap();
        assert_eq!(cfg.bot.default_period_days, 7);

        let bad = dir.join(format!("bragfy-bad-{}.toml", std::process::id()));
        std::fs::write(&bad, "[nlu]\nconfidence_threshold = 1.5\n").unwrap();
        // load só lê; a validação acontece depois dos overrides
        assert!(Config::load(&bad).is_ok());
        let result = Config::load_or_default(&bad);
        std::fs::remove_file(&bad).ok();
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
