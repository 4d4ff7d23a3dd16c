use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use crate::backends::{BackendKind, FragmentSource, build_source};
use crate::error::{AppError, ErrorCode};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backend: BackendKind,
    pub ai: AiConfig,
    /// Pause between streamed fragments.
    pub fragment_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub url: String,
    pub model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            backend: BackendKind::Mock,
            ai: AiConfig::default(),
            fragment_delay: Duration::from_millis(30),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:11434".to_string(),
            model: "llama3.2".to_string(),
        }
    }
}

impl Config {
    /// Reads the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    /// Builds the config from any key lookup, `from_env` passes the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Box<dyn Error>> {
        let defaults = Config::default();

        let backend = match lookup("BACKEND") {
            Some(raw) => raw.parse::<BackendKind>().map_err(|_| {
                AppError::new(
                    ErrorCode::ConfigError,
                    format!("BACKEND must be mock or ollama, got {:?}", raw),
                )
            })?,
            None => defaults.backend,
        };

        let fragment_delay = match lookup("FRAGMENT_DELAY_MS") {
            Some(raw) => Duration::from_millis(raw.parse()?),
            None => defaults.fragment_delay,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: match lookup("PORT") {
                Some(raw) => raw.parse()?,
                None => defaults.port,
            },
            backend,
            ai: AiConfig {
                url: lookup("AI_URL").unwrap_or(defaults.ai.url),
                model: lookup("SUMMARY_MODEL").unwrap_or(defaults.ai.model),
            },
            fragment_delay,
        })
    }
}

// ============================================================================
// Application state
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn FragmentSource>,
    pub config: Config,
}

pub async fn app_init() -> Result<(Config, Arc<AppState>), Box<dyn Error>> {
    let config = Config::from_env()?;
    log::info!("✅ Configuration loaded");

    log::info!("🤖 Initializing {} backend...", config.backend);
    let source = build_source(config.backend, &config.ai)?;
    log::info!("✅ Backend ready: {}", source.name());

    let state = Arc::new(AppState {
        source,
        config: config.clone(),
    });
    Ok((config, state))
}
