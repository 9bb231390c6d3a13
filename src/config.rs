//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the Telegram platform constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Largest file the Bot API lets a bot download (20 MB).
pub const MAX_FILESIZE_DOWNLOAD: u64 = 20 * 1024 * 1024;
/// Largest file the Bot API lets a bot upload (50 MB).
pub const MAX_FILESIZE_UPLOAD: u64 = 50 * 1024 * 1024;

/// Accepted MIME type for image documents.
pub const IMAGE_MIME_TYPE: &str = "image/jpeg";
/// Accepted MIME type for PDF documents.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Default idle time before an unconsumed conversation entry is evicted.
pub const CONVERSATION_TTL_SECS: u64 = 3600;
/// Upper bound on stored conversation entries.
pub const CONVERSATION_MAX_ENTRIES: u64 = 100_000;

/// Default wall-clock limit for one document-processing run.
pub const PROCESSOR_TIMEOUT_SECS: u64 = 300;

/// Maximum retry attempts for Telegram API operations
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff delay in milliseconds
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff delay in milliseconds
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Download ceiling in bytes (raise only for a local Bot API server)
    #[serde(default = "default_max_download_size")]
    pub max_download_size: u64,
    /// Upload ceiling in bytes
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,

    /// Directory for temporary files, OS default when unset
    pub temp_dir: Option<PathBuf>,

    /// Idle TTL for conversation entries in seconds
    #[serde(default = "default_conversation_ttl")]
    pub conversation_ttl_secs: u64,

    /// External document-processing program
    pub processor_command: Option<String>,
    /// Wall-clock limit for one processing run in seconds
    #[serde(default = "default_processor_timeout")]
    pub processor_timeout_secs: u64,

    /// Link behind the "Support" inline button
    pub support_url: Option<String>,
}

const fn default_max_download_size() -> u64 {
    MAX_FILESIZE_DOWNLOAD
}

const fn default_max_upload_size() -> u64 {
    MAX_FILESIZE_UPLOAD
}

const fn default_conversation_ttl() -> u64 {
    CONVERSATION_TTL_SECS
}

const fn default_processor_timeout() -> u64 {
    PROCESSOR_TIMEOUT_SECS
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if any source fails to load.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP_TEMP_DIR=/tmp/x ./target/app`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // UPPER_SNAKE_CASE is mapped onto snake_case; empty vars count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pdf_courier::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Size ceilings configured for this deployment.
    #[must_use]
    pub const fn size_validator(&self) -> crate::gateway::SizeValidator {
        crate::gateway::SizeValidator {
            max_download: self.max_download_size,
            max_upload: self.max_upload_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Everything touching process env lives in one test to avoid races
    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        env::set_var("TELEGRAM_TOKEN", "dummy_token");
        env::set_var("MAX_UPLOAD_SIZE", "1024");
        env::set_var("PROCESSOR_COMMAND", "");

        let settings = Settings::new()?;
        assert_eq!(settings.telegram_token, "dummy_token");
        assert_eq!(settings.max_upload_size, 1024);
        assert_eq!(settings.max_download_size, MAX_FILESIZE_DOWNLOAD);
        assert_eq!(settings.conversation_ttl_secs, CONVERSATION_TTL_SECS);
        assert_eq!(settings.processor_command, None);
        assert_eq!(settings.processor_timeout_secs, PROCESSOR_TIMEOUT_SECS);

        let limits = settings.size_validator();
        assert_eq!(limits.max_upload, 1024);
        assert_eq!(limits.max_download, MAX_FILESIZE_DOWNLOAD);

        env::remove_var("TELEGRAM_TOKEN");
        env::remove_var("MAX_UPLOAD_SIZE");
        env::remove_var("PROCESSOR_COMMAND");
        Ok(())
    }
}
