//! Client configuration

use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_PERSONA: &str = "user_001";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the coach backend
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend root, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Persona the conversation starts with
    pub persona_id: String,
    pub connect_timeout: Duration,
    /// Applies to non-streaming calls only. The chat stream has no overall deadline.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            persona_id: DEFAULT_PERSONA.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank or unparsable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str| {
            non_empty(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
        };

        Self {
            base_url: non_empty("COACH_API_URL").unwrap_or(defaults.base_url),
            persona_id: non_empty("COACH_PERSONA").unwrap_or(defaults.persona_id),
            connect_timeout: secs("COACH_CONNECT_TIMEOUT_SECS").unwrap_or(defaults.connect_timeout),
            request_timeout: secs("COACH_REQUEST_TIMEOUT_SECS").unwrap_or(defaults.request_timeout),
        }
    }

    /// Join an API path onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn chat_url(&self) -> String {
        self.endpoint("api/chat")
    }
}
