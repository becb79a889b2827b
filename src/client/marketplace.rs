//! Coach marketplace, consent and onboarding calls
//!
//! None of these stream; each is a single JSON request/response.

use crate::config::ClientConfig;
use crate::rich_content::RichContentItem;
use crate::wire::{ChatError, HistoryEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Most questions onboarding shows at once
const MAX_QUESTIONS: usize = 6;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachCategory {
    RealEstate,
    Auto,
    Credit,
    Mortgage,
    HomeServices,
    Insurance,
}

/// Specialist assistant offered in the marketplace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coach {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: CoachCategory,
    /// e.g. "Zillow.com"
    pub powered_by: String,
    pub icon: String,
    #[serde(default)]
    pub required_data: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    Active,
    Revoked,
    Expired,
}

/// Request to share profile fields with a coach for a limited time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRequest {
    pub coach_id: String,
    pub data_fields: Vec<String>,
    /// 24, 72 or 168 in the consent dialog
    pub duration_hours: u32,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consent {
    pub id: String,
    pub coach_id: String,
    pub user_id: String,
    pub data_fields: Vec<String>,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ConsentStatus,
    #[serde(default)]
    pub audit_log: Vec<Value>,
}

impl Consent {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ConsentStatus::Active && now < self.expires_at
    }
}

/// Normalized reply from a coach
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoachReply {
    pub response: String,
    pub rich_content: Vec<RichContentItem>,
    pub suggestions: Vec<String>,
}

/// Coach endpoints answer either with an object or with a bare string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CoachReplyWire {
    Structured {
        response: String,
        #[serde(default, alias = "richContent")]
        rich_content: Vec<RichContentItem>,
        #[serde(default)]
        suggestions: Vec<String>,
    },
    Bare(String),
}

impl From<CoachReplyWire> for CoachReply {
    fn from(wire: CoachReplyWire) -> Self {
        match wire {
            CoachReplyWire::Structured {
                response,
                rich_content,
                suggestions,
            } => CoachReply {
                response,
                rich_content,
                suggestions,
            },
            CoachReplyWire::Bare(response) => CoachReply {
                response,
                ..CoachReply::default()
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionsWire {
    List(Vec<String>),
    Wrapped { questions: Vec<String> },
}

/// Questions onboarding shows when personalized ones cannot be fetched
pub fn fallback_questions() -> Vec<String> {
    [
        "What is my readiness score?",
        "What's my debt-to-income ratio?",
        "Can I afford a $400k home?",
        "Analyze my spending patterns",
        "Should I create an emergency fund goal?",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

// ============================================================================
// Client
// ============================================================================

/// Marketplace and consent service, plus the onboarding question generator
#[async_trait]
pub trait CoachApi: Send + Sync {
    async fn get_coaches(&self) -> Result<Vec<Coach>, ChatError>;

    async fn create_consent(&self, request: &ConsentRequest) -> Result<Consent, ChatError>;

    /// `true` when an active consent was revoked
    async fn revoke_consent(&self, user_id: &str, coach_id: &str) -> Result<bool, ChatError>;

    async fn send_coach_message(
        &self,
        coach_id: &str,
        message: &str,
        persona_id: &str,
        history: &[HistoryEntry],
    ) -> Result<CoachReply, ChatError>;

    async fn get_personalized_questions(
        &self,
        user_id: &str,
        existing_goals: &[Value],
    ) -> Result<Vec<String>, ChatError>;
}

#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    client: Client,
    config: ClientConfig,
}

impl MarketplaceClient {
    pub fn new(config: ClientConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ChatError::invalid_request(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ChatError> {
        let request = self.client.get(self.config.endpoint(path));
        Self::execute(request).await
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ChatError> {
        let request = self.client.post(self.config.endpoint(path)).json(body);
        Self::execute(request).await
    }

    async fn execute<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, ChatError> {
        let response = request
            .send()
            .await
            .map_err(|e| ChatError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(ChatError::http(status.as_u16(), format!("HTTP {status}: {body}")));
        }

        serde_json::from_str(&body)
            .map_err(|e| ChatError::decode(format!("Failed to parse response: {e} - body: {body}")))
    }
}

#[async_trait]
impl CoachApi for MarketplaceClient {
    async fn get_coaches(&self) -> Result<Vec<Coach>, ChatError> {
        let coaches: Vec<Coach> = self.get_json("api/coaches").await?;
        Ok(coaches.into_iter().filter(|c| c.is_active).collect())
    }

    async fn create_consent(&self, request: &ConsentRequest) -> Result<Consent, ChatError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ChatError::invalid_request(format!("Failed to encode consent: {e}")))?;
        let consent: Consent = self.post_json("api/consent", &body).await?;
        tracing::info!(
            coach = %consent.coach_id,
            user = %consent.user_id,
            expires_at = %consent.expires_at,
            "Consent granted"
        );
        Ok(consent)
    }

    async fn revoke_consent(&self, user_id: &str, coach_id: &str) -> Result<bool, ChatError> {
        let body = json!({"user_id": user_id, "coach_id": coach_id});
        let value: Value = self.post_json("api/consent/revoke", &body).await?;
        let revoked = match &value {
            Value::Bool(b) => *b,
            other => other
                .get("revoked")
                .or_else(|| other.get("success"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
        };
        tracing::info!(coach = %coach_id, user = %user_id, revoked, "Consent revoke requested");
        Ok(revoked)
    }

    async fn send_coach_message(
        &self,
        coach_id: &str,
        message: &str,
        persona_id: &str,
        history: &[HistoryEntry],
    ) -> Result<CoachReply, ChatError> {
        let body = json!({
            "message": message,
            "persona_id": persona_id,
            "history": history,
        });
        let wire: CoachReplyWire = self
            .post_json(&format!("api/coaches/{coach_id}/chat"), &body)
            .await?;
        Ok(wire.into())
    }

    async fn get_personalized_questions(
        &self,
        user_id: &str,
        existing_goals: &[Value],
    ) -> Result<Vec<String>, ChatError> {
        let body = json!({"user_id": user_id, "existing_goals": existing_goals});
        let wire: QuestionsWire = self.post_json("api/questions", &body).await?;
        let mut questions = match wire {
            QuestionsWire::List(q) | QuestionsWire::Wrapped { questions: q } => q,
        };
        questions.truncate(MAX_QUESTIONS);
        Ok(questions)
    }
}
