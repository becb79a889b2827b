//! Message records

use crate::calculation::CalculationResult;
use crate::client::Coach;
use crate::rich_content::RichContentItem;
use crate::wire::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque message identifier, unique for the life of the process
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which coach produced an assistant message
///
/// Each field present in a patch overwrites the message's value; absent
/// fields leave it alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachAttribution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coach_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coach_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coach_icon: Option<String>,
}

impl CoachAttribution {
    pub fn is_empty(&self) -> bool {
        self.coach_id.is_none() && self.coach_name.is_none() && self.coach_icon.is_none()
    }

    pub(crate) fn apply(&mut self, patch: CoachAttribution) {
        if let Some(id) = patch.coach_id {
            self.coach_id = Some(id);
        }
        if let Some(name) = patch.coach_name {
            self.coach_name = Some(name);
        }
        if let Some(icon) = patch.coach_icon {
            self.coach_icon = Some(icon);
        }
    }
}

impl From<&Coach> for CoachAttribution {
    fn from(coach: &Coach) -> Self {
        Self {
            coach_id: Some(coach.id.clone()),
            coach_name: Some(coach.name.clone()),
            coach_icon: Some(coach.icon.clone()),
        }
    }
}

/// One entry of the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation_result: Option<CalculationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rich_content: Option<Vec<RichContentItem>>,
    #[serde(flatten)]
    pub coach: CoachAttribution,
}

/// Everything about a message except what the store assigns (id, timestamp)
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub is_streaming: bool,
    pub calculation_result: Option<CalculationResult>,
    pub rich_content: Option<Vec<RichContentItem>>,
    pub coach: CoachAttribution,
}

impl NewMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            is_streaming: false,
            calculation_result: None,
            rich_content: None,
            coach: CoachAttribution::default(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Empty assistant message that a streaming turn fills in
    pub fn assistant_placeholder() -> Self {
        Self::assistant("").streaming(true)
    }

    #[must_use]
    pub fn streaming(mut self, is_streaming: bool) -> Self {
        self.is_streaming = is_streaming;
        self
    }

    #[must_use]
    pub fn with_coach(mut self, coach: CoachAttribution) -> Self {
        self.coach = coach;
        self
    }

    #[must_use]
    pub fn with_calculation(mut self, result: CalculationResult) -> Self {
        self.calculation_result = Some(result);
        self
    }

    #[must_use]
    pub fn with_rich_content(mut self, items: Vec<RichContentItem>) -> Self {
        self.rich_content = Some(items);
        self
    }

    pub(crate) fn into_message(self, id: MessageId, timestamp: DateTime<Utc>) -> Message {
        Message {
            id,
            role: self.role,
            content: self.content,
            timestamp,
            is_streaming: self.is_streaming,
            calculation_result: self.calculation_result,
            rich_content: self.rich_content,
            coach: self.coach,
        }
    }
}
