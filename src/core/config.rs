use std::env;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Settings {
    runtime: RuntimeSettings,
    database: DatabaseSettings,
    ai: AiSettings,
    ocr: OcrSettings,
    grading: GradingSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub environment: Environment,
    pub strict_config: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub postgres_server: String,
    pub postgres_port: u16,
    pub postgres_user: String,
    pub postgres_password: String,
    pub postgres_db: String,
    pub database_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub request_timeout: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub api_key: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub poll_interval_seconds: u64,
    pub max_poll_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct GradingSettings {
    pub stale_attempt_minutes: i64,
    pub sweep_interval_seconds: u64,
    pub reminder_sweep_interval_seconds: u64,
    pub reminder_hours_before_deadline: i64,
    pub ai_worker_concurrency: usize,
    pub ai_retry_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub log_level: String,
    pub json: bool,
    pub prometheus_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Test => "test",
        }
    }

    fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            parse_environment(env_optional("EGELAB_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("EGELAB_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "egelab");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "egelab_db");
        let database_url = env_optional("DATABASE_URL");

        let ai_api_key = env_or_default("AI_API_KEY", "");
        let ai_base_url = env_or_default("AI_BASE_URL", "");
        let ai_model = env_or_default("AI_MODEL", "gpt-4o");
        let ai_max_tokens = parse_u32("AI_MAX_TOKENS", env_or_default("AI_MAX_TOKENS", "4000"))?;
        let ai_temperature = parse_f64("AI_TEMPERATURE", env_or_default("AI_TEMPERATURE", "0.2"))?;
        let ai_request_timeout =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "300"))?;
        let ai_max_retries = parse_u32("AI_MAX_RETRIES", env_or_default("AI_MAX_RETRIES", "3"))?;

        let ocr_api_key = env_or_default("OCR_API_KEY", "");
        let ocr_base_url = env_or_default("OCR_BASE_URL", "");
        let ocr_timeout_seconds =
            parse_u64("OCR_TIMEOUT_SECONDS", env_or_default("OCR_TIMEOUT_SECONDS", "120"))?;
        let ocr_poll_interval_seconds = parse_u64(
            "OCR_POLL_INTERVAL_SECONDS",
            env_or_default("OCR_POLL_INTERVAL_SECONDS", "3"),
        )?;
        let ocr_max_poll_attempts =
            parse_u32("OCR_MAX_POLL_ATTEMPTS", env_or_default("OCR_MAX_POLL_ATTEMPTS", "40"))?;

        let stale_attempt_minutes =
            parse_i64("STALE_ATTEMPT_MINUTES", env_or_default("STALE_ATTEMPT_MINUTES", "120"))?;
        let sweep_interval_seconds =
            parse_u64("SWEEP_INTERVAL_SECONDS", env_or_default("SWEEP_INTERVAL_SECONDS", "300"))?;
        let reminder_sweep_interval_seconds = parse_u64(
            "REMINDER_SWEEP_INTERVAL_SECONDS",
            env_or_default("REMINDER_SWEEP_INTERVAL_SECONDS", "900"),
        )?;
        let reminder_hours_before_deadline = parse_i64(
            "REMINDER_HOURS_BEFORE_DEADLINE",
            env_or_default("REMINDER_HOURS_BEFORE_DEADLINE", "24"),
        )?;
        let ai_worker_concurrency = parse_u64(
            "AI_WORKER_CONCURRENCY",
            env_or_default("AI_WORKER_CONCURRENCY", "3"),
        )? as usize;
        let ai_retry_interval_seconds = parse_u64(
            "AI_RETRY_INTERVAL_SECONDS",
            env_or_default("AI_RETRY_INTERVAL_SECONDS", "900"),
        )?;

        let log_level = env_or_default("EGELAB_LOG_LEVEL", "info");
        let json = env_optional("EGELAB_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            ai: AiSettings {
                api_key: ai_api_key,
                base_url: ai_base_url,
                model: ai_model,
                max_tokens: ai_max_tokens,
                temperature: ai_temperature,
                request_timeout: ai_request_timeout,
                max_retries: ai_max_retries,
            },
            ocr: OcrSettings {
                api_key: ocr_api_key,
                base_url: ocr_base_url,
                timeout_seconds: ocr_timeout_seconds,
                poll_interval_seconds: ocr_poll_interval_seconds,
                max_poll_attempts: ocr_max_poll_attempts,
            },
            grading: GradingSettings {
                stale_attempt_minutes,
                sweep_interval_seconds,
                reminder_sweep_interval_seconds,
                reminder_hours_before_deadline,
                ai_worker_concurrency,
                ai_retry_interval_seconds,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub fn ocr(&self) -> &OcrSettings {
        &self.ocr
    }

    pub fn grading(&self) -> &GradingSettings {
        &self.grading
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.grading.stale_attempt_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "STALE_ATTEMPT_MINUTES",
                value: self.grading.stale_attempt_minutes.to_string(),
            });
        }
        if self.grading.ai_worker_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AI_WORKER_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.ai.api_key.is_empty() {
            return Err(ConfigError::MissingSecret("AI_API_KEY"));
        }
        if self.ai.base_url.is_empty() {
            return Err(ConfigError::MissingSecret("AI_BASE_URL"));
        }

        Ok(())
    }
}

impl DatabaseSettings {
    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.postgres_user,
            self.postgres_password,
            self.postgres_server,
            self.postgres_port,
            self.postgres_db
        )
    }
}

fn env_optional(name: &str) -> Option<String> {
    env::var(name).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

fn parse_environment(raw: Option<String>) -> Environment {
    match raw.as_deref() {
        Some("production") | Some("prod") => Environment::Production,
        Some("staging") => Environment::Staging,
        Some("test") => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw, "1" | "true" | "TRUE" | "yes" | "YES")
}

fn parse_u16(field: &'static str, raw: String) -> Result<u16, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue { field, value: raw })
}

fn parse_u32(field: &'static str, raw: String) -> Result<u32, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue { field, value: raw })
}

fn parse_u64(field: &'static str, raw: String) -> Result<u64, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue { field, value: raw })
}

fn parse_i64(field: &'static str, raw: String) -> Result<i64, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue { field, value: raw })
}

fn parse_f64(field: &'static str, raw: String) -> Result<f64, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue { field, value: raw })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_truthy_values() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("YES"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("off"));
    }

    #[test]
    fn database_url_falls_back_to_components() {
        let settings = DatabaseSettings {
            postgres_server: "db.local".to_string(),
            postgres_port: 5433,
            postgres_user: "grader".to_string(),
            postgres_password: "pw".to_string(),
            postgres_db: "bank".to_string(),
            database_url: None,
        };
        assert_eq!(settings.database_url(), "postgresql://grader:pw@db.local:5433/bank");
    }
}
