//! Environment-backed settings shared by every program.
//!
//! Values come from the process environment. [`Settings::load`] first lets
//! `dotenv` fill the environment from a local `.env` file when one exists.

use std::path::PathBuf;

use thiserror::Error;

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const WEATHER_API_KEY: &str = "WEATHER_API_KEY";
pub const WEATHER_API_URL: &str = "WEATHER_API_URL";
pub const VECTOR_DIR: &str = "RIGBOOK_VECTOR_DIR";

pub const DEFAULT_WEATHER_API_URL: &str = "http://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_VECTOR_DIR: &str = "./chroma_db";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not found in environment variables")]
    MissingVar(&'static str),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub weather_api_key: Option<String>,
    pub weather_api_url: String,
    pub vector_dir: PathBuf,
}

impl Settings {
    /// Load `.env` (if present) and read the settings.
    pub fn load() -> Self {
        if let Err(err) = dotenv::dotenv() {
            tracing::debug!(%err, "no .env file loaded");
        }
        Self::from_env()
    }

    /// Read the settings from the current process environment only.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            openai_api_key: read(OPENAI_API_KEY),
            google_api_key: read(GOOGLE_API_KEY),
            weather_api_key: read(WEATHER_API_KEY),
            weather_api_url: read(WEATHER_API_URL)
                .unwrap_or_else(|| DEFAULT_WEATHER_API_URL.to_owned()),
            vector_dir: read(VECTOR_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_VECTOR_DIR)),
        }
    }

    pub fn openai_api_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or(ConfigError::MissingVar(OPENAI_API_KEY))
    }

    pub fn google_api_key(&self) -> Result<&str, ConfigError> {
        self.google_api_key
            .as_deref()
            .ok_or(ConfigError::MissingVar(GOOGLE_API_KEY))
    }
}
