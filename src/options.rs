use crate::error::ConfigError;
use serde::Deserialize;
use std::time::Duration;

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum BalanceStrategy {
    /// Append the deficit of `}` then `]` by raw counts. Braces inside string literals
    /// are counted too, so the output can still be invalid JSON.
    CountBased,
    /// Track open containers outside string literals and close them innermost first.
    StackBased,
}

#[derive(Clone, Debug)]
pub struct Options {
    /// Drop characters in U+0000..=U+001F and U+007F..=U+009F before any parse attempt.
    pub strip_control_chars: bool,
    /// How the repair pass closes unbalanced braces and brackets.
    pub bracket_balance: BalanceStrategy,
    /// Fall back to pattern extraction of the first question when both decodes fail.
    pub partial_extraction: bool,
    /// Title used for a partial payload when no `"title"` can be found in the text.
    pub fallback_title: String,
    /// Record repair log entries. Use `repair_with_log` to retrieve them.
    pub logging: bool,
    /// Characters captured on each side of a position in log context snippets.
    pub log_context_window: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            strip_control_chars: true,
            bracket_balance: BalanceStrategy::CountBased,
            partial_extraction: true,
            fallback_title: "Quiz".to_string(),
            logging: false,
            log_context_window: 10,
        }
    }
}

/// Remote endpoints and the local identity key.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub quiz_path: String,
    #[serde(with = "secs")]
    pub request_timeout: Duration,
    pub max_retries: usize,
    #[serde(with = "secs")]
    pub retry_base_delay: Duration,
    pub identity_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.askbibleverse.com".to_string(),
            quiz_path: "/api/quiz".to_string(),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            identity_key: "anonymous_user_id".to_string(),
        }
    }
}

impl ApiConfig {
    /// Defaults overlaid with `APP__*` environment variables (after loading `.env` if any),
    /// e.g. `APP__BASE_URL` or `APP__MAX_RETRIES`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn migrate_url(&self) -> String {
        format!("{}/api/user-data/migrate", self.base_url.trim_end_matches('/'))
    }

    pub fn quiz_url(&self, suffix: &str) -> String {
        format!("{}{}{}", self.base_url.trim_end_matches('/'), self.quiz_path, suffix)
    }

    pub fn stream_url(&self, lesson_id: &str) -> String {
        self.quiz_url(&format!("/streaming-quiz/{}", lesson_id))
    }
}

mod secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
