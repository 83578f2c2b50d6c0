//! Configuration types.
//!
//! Everything is read from the environment (a `.env` file is loaded first by
//! `main`). [`AppConfig::from_lookup`] takes any key lookup so tests can
//! build configs without touching process state.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::channels::email::EmailConfig;
use crate::error::ConfigError;
use crate::llm::LlmConfig;
use crate::pipeline::processor::ProcessorConfig;

/// Gmail app passwords are 16 characters once spaces are removed.
const APP_PASSWORD_LEN: usize = 16;

/// Upper bound for any look-back window, in days.
const MAX_WINDOW_DAYS: u32 = 3650;

/// Full runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub email: EmailConfig,
    pub processor: ProcessorConfig,
    /// Sleep between poll cycles.
    pub check_interval: Duration,
    /// libSQL file holding processed-message records.
    pub tracker_db_path: PathBuf,
    /// How long processed records are kept before pruning.
    pub history_days: u32,
    /// Log file written alongside stderr output.
    pub log_file: PathBuf,
    /// Default log level becomes `debug` when set.
    pub debug_mode: bool,
}

impl AppConfig {
    /// Build config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = required(&lookup, "GEMINI_API_KEY", "Create one at https://aistudio.google.com/app/apikey")?;
        let address = required(&lookup, "EMAIL_ADDRESS", "Set it to the Gmail address to answer from")?;
        let password = required(
            &lookup,
            "EMAIL_PASSWORD",
            "Use a Gmail app password (Google Account > Security > App passwords)",
        )?;

        if !address.contains('@') {
            return Err(ConfigError::InvalidValue {
                key: "EMAIL_ADDRESS".into(),
                message: format!("'{address}' is not an email address"),
            });
        }

        let temperature: f64 = parse_or(&lookup, "GEMINI_TEMPERATURE", 0.7)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "GEMINI_TEMPERATURE".into(),
                message: format!("{temperature} is outside 0.0..=2.0"),
            });
        }

        let spam_threshold: f64 = parse_or(&lookup, "SPAM_THRESHOLD", 0.5)?;
        if !(0.0..=1.0).contains(&spam_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "SPAM_THRESHOLD".into(),
                message: format!("{spam_threshold} is outside 0.0..=1.0"),
            });
        }

        let llm = LlmConfig {
            api_key: SecretString::from(api_key),
            model: lookup("GEMINI_MODEL")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            temperature,
            max_output_tokens: parse_or(&lookup, "MAX_OUTPUT_TOKENS", 1024)?,
            top_p: parse_or(&lookup, "TOP_P", 0.95)?,
            top_k: parse_or(&lookup, "TOP_K", 40)?,
            timeout: Duration::from_secs(parse_or(&lookup, "GENERATION_TIMEOUT_SECS", 60)?),
        };

        let email = EmailConfig {
            imap_host: lookup("IMAP_SERVER").unwrap_or_else(|| "imap.gmail.com".to_string()),
            imap_port: parse_or(&lookup, "IMAP_PORT", 993)?,
            smtp_host: lookup("SMTP_SERVER").unwrap_or_else(|| "smtp.gmail.com".to_string()),
            smtp_port: parse_or(&lookup, "SMTP_PORT", 587)?,
            address,
            password: SecretString::from(password.replace(' ', "")),
        };

        let days_to_check = bounded_days(&lookup, "DAYS_TO_CHECK", 7)?;
        let history_days = bounded_days(&lookup, "HISTORY_DAYS", 7)?;
        let window_hours: u64 = parse_or(&lookup, "RATE_LIMIT_WINDOW_HOURS", 24)?;
        let window_secs = window_hours
            .checked_mul(3600)
            .filter(|secs| *secs <= u64::from(MAX_WINDOW_DAYS) * 86_400)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "RATE_LIMIT_WINDOW_HOURS".into(),
                message: format!("{window_hours} is longer than {MAX_WINDOW_DAYS} days"),
            })?;

        let processor = ProcessorConfig {
            max_per_cycle: parse_or(&lookup, "MAX_EMAILS_PER_CYCLE", 1)?,
            days_to_check,
            spam_threshold,
            max_per_sender: parse_or(&lookup, "MAX_EMAILS_PER_SENDER", 3)?,
            rate_limit_window: Duration::from_secs(window_secs),
            use_html: flag_or(&lookup, "USE_HTML_EMAILS", true)?,
            ai_categorization: flag_or(&lookup, "AI_CATEGORIZATION", false)?,
            own_address: email.address.to_lowercase(),
        };

        let check_interval = Duration::from_secs(parse_or(&lookup, "EMAIL_CHECK_INTERVAL", 30)?);
        if check_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "EMAIL_CHECK_INTERVAL".into(),
                message: "must be at least 1 second".into(),
            });
        }

        Ok(Self {
            llm,
            email,
            processor,
            check_interval,
            tracker_db_path: lookup("TRACKER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/processed_emails.db")),
            history_days,
            log_file: lookup("LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("email_automation.log")),
            debug_mode: flag_or(&lookup, "DEBUG_MODE", false)?,
        })
    }

    /// Non-fatal configuration problems worth logging at startup.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let len = self.email.password.expose_secret().chars().count();
        if len != APP_PASSWORD_LEN {
            warnings.push(format!(
                "EMAIL_PASSWORD is {len} characters; Gmail app passwords are {APP_PASSWORD_LEN}"
            ));
        }
        if self.processor.max_per_cycle == 0 {
            warnings.push("MAX_EMAILS_PER_CYCLE is 0; no messages will be processed".into());
        }
        warnings
    }

    /// Days of tracker history to keep. Never shorter than the fetch window
    /// or the rate-limit window, otherwise pruning would re-expose messages.
    pub fn retention(&self) -> chrono::Duration {
        let days = self
            .history_days
            .max(self.processor.days_to_check)
            .max(1);
        let retention = chrono::Duration::days(i64::from(days));
        let window = chrono::Duration::from_std(self.processor.rate_limit_window)
            .unwrap_or(chrono::Duration::hours(24));
        retention.max(window)
    }
}

/// Value is absent, blank, or still a `.env.example` placeholder.
fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.starts_with("your_") || v.starts_with("your-")
}

fn required<F>(lookup: &F, key: &str, hint: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Err(ConfigError::MissingEnvVar(key.to_string())),
        Some(v) if is_placeholder(&v) => Err(ConfigError::MissingRequired {
            key: key.to_string(),
            hint: hint.to_string(),
        }),
        Some(v) => Ok(v.trim().to_string()),
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{v}': {e}"),
        }),
    }
}

fn bounded_days<F>(lookup: &F, key: &str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let days: u32 = parse_or(lookup, key, default)?;
    if days > MAX_WINDOW_DAYS {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{days} is more than {MAX_WINDOW_DAYS} days"),
        });
    }
    Ok(days)
}

fn flag_or<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(v) = lookup(key) else {
        return Ok(default);
    };
    match v.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{other}' is not a boolean"),
        }),
    }
}
