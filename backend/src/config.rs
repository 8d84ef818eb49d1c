use anyhow::{anyhow, Context, Result};
use std::env;
use std::str::FromStr;

use crate::locale::Locale;

const DEFAULT_AI_URL: &str = "https://apps.abacus.ai/v1/chat/completions";

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub locale: Locale,
    pub ai: AiConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let locale = env::var("REPORT_LOCALE")
            .ok()
            .map(|v| Locale::from_str(&v).map_err(|e| anyhow!(e)))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            max_connections: parsed_or("DB_MAX_CONNECTIONS", 10)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            locale,
            ai: AiConfig {
                api_url: env::var("AI_API_URL").unwrap_or_else(|_| DEFAULT_AI_URL.to_string()),
                api_key: required("AI_API_KEY")?,
                model: env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string()),
                max_tokens: parsed_or("AI_MAX_TOKENS", 1500)?,
                timeout_secs: parsed_or("AI_TIMEOUT_SECS", 120)?,
                connect_timeout_secs: parsed_or("AI_CONNECT_TIMEOUT_SECS", 10)?,
            },
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
