use std::{path::PathBuf, time::Duration};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_DB_PATH: &str = "chat_history.db";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/**
 * \brief Process configuration, built once at startup and shared read-only.
 */
#[derive(Debug, Clone)]
pub struct Config {
    /** \brief Completion API credential. Not validated until a call is made. */
    pub api_key: Option<String>,
    /** \brief API base address, without the `/v1/...` suffix */
    pub api_base: String,
    pub model: String,
    pub temperature: f64,
    /** \brief SQLite file holding the chat log */
    pub db_path: PathBuf,
    /** \brief Listen port; the service binds all interfaces */
    pub port: u16,
    /** \brief Upper bound on a single completion call */
    pub completion_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            port: DEFAULT_PORT,
            completion_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /**
     * \brief Socket address the HTTP service binds to.
     */
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
