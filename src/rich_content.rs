//! Rich content attached to assistant messages
//!
//! Rendered by the UI only; the core passes these through untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Common payload shared by every rich content variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichContentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Variant-specific structured data (listing details, score history, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichContentItem {
    Link(RichContentPayload),
    Youtube(RichContentPayload),
    Overlay(RichContentPayload),
    Card(RichContentPayload),
    Image(RichContentPayload),
    PropertyListing(RichContentPayload),
    CreditDashboard(RichContentPayload),
    CreditImprovementPlan(RichContentPayload),
    CreditScoreSimulator(RichContentPayload),
    CreditMonitoringDashboard(RichContentPayload),
    CreditCardComparison(RichContentPayload),
}

impl RichContentItem {
    pub fn payload(&self) -> &RichContentPayload {
        match self {
            RichContentItem::Link(p)
            | RichContentItem::Youtube(p)
            | RichContentItem::Overlay(p)
            | RichContentItem::Card(p)
            | RichContentItem::Image(p)
            | RichContentItem::PropertyListing(p)
            | RichContentItem::CreditDashboard(p)
            | RichContentItem::CreditImprovementPlan(p)
            | RichContentItem::CreditScoreSimulator(p)
            | RichContentItem::CreditMonitoringDashboard(p)
            | RichContentItem::CreditCardComparison(p) => p,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RichContentItem::Link(_) => "link",
            RichContentItem::Youtube(_) => "youtube",
            RichContentItem::Overlay(_) => "overlay",
            RichContentItem::Card(_) => "card",
            RichContentItem::Image(_) => "image",
            RichContentItem::PropertyListing(_) => "property_listing",
            RichContentItem::CreditDashboard(_) => "credit_dashboard",
            RichContentItem::CreditImprovementPlan(_) => "credit_improvement_plan",
            RichContentItem::CreditScoreSimulator(_) => "credit_score_simulator",
            RichContentItem::CreditMonitoringDashboard(_) => "credit_monitoring_dashboard",
            RichContentItem::CreditCardComparison(_) => "credit_card_comparison",
        }
    }
}
