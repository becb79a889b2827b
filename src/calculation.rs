//! Calculation results streamed alongside assistant text
//!
//! The backend sends these as untagged JSON objects. What kind of result an
//! object is follows from which keys it carries, so the payload is kept as an
//! open map and [`classify`] does the key-presence dispatch at the boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open-ended calculation payload (DTI, readiness, affordability, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalculationResult(Map<String, Value>);

impl CalculationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; anything other than an object is rejected
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Shallow merge: every top-level key of `other` overwrites ours
    pub fn merge(&mut self, other: CalculationResult) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Key is present and not JSON null
    pub fn has(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn dti(&self) -> Option<f64> {
        self.number("dti")
    }

    pub fn readiness_score(&self) -> Option<f64> {
        self.number("readiness_score")
    }

    pub fn is_affordable(&self) -> Option<bool> {
        self.0.get("is_affordable").and_then(Value::as_bool)
    }

    /// The plan object, whether nested under `action_plan` or sent flat
    pub fn action_plan(&self) -> Option<&Value> {
        match self.0.get("action_plan") {
            Some(plan) if !plan.is_null() => Some(plan),
            _ => None,
        }
    }

    /// Every kind this (possibly merged) result carries, in display precedence
    pub fn kinds(&self) -> Vec<CalculationKind> {
        CalculationKind::ALL
            .into_iter()
            .filter(|kind| kind.matches(self))
            .collect()
    }
}

impl From<Map<String, Value>> for CalculationResult {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Shape-derived kind of a calculation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalculationKind {
    /// `dti` without affordability fields
    DebtToIncome,
    /// `home_price` or `is_affordable`
    Affordability,
    /// `action_plan`, `goal` or `priority_actions`
    ActionPlan,
    /// `readiness_score`
    Readiness,
    /// `spending_by_category` or `overspending_alerts`
    SpendingAnalysis,
    /// `target_amount`/`targetAmount` with a `reason`
    GoalRecommendation,
}

impl CalculationKind {
    pub const ALL: [CalculationKind; 6] = [
        CalculationKind::DebtToIncome,
        CalculationKind::Affordability,
        CalculationKind::ActionPlan,
        CalculationKind::Readiness,
        CalculationKind::SpendingAnalysis,
        CalculationKind::GoalRecommendation,
    ];

    pub fn matches(self, result: &CalculationResult) -> bool {
        match self {
            CalculationKind::DebtToIncome => result.has("dti") && !result.has("is_affordable"),
            CalculationKind::Affordability => {
                result.has("home_price") || result.has("is_affordable")
            }
            CalculationKind::ActionPlan => {
                result.has("action_plan") || result.has("goal") || result.has("priority_actions")
            }
            CalculationKind::Readiness => result.has("readiness_score"),
            CalculationKind::SpendingAnalysis => {
                result.has("spending_by_category") || result.has("overspending_alerts")
            }
            CalculationKind::GoalRecommendation => {
                (result.has("target_amount") || result.has("targetAmount")) && result.has("reason")
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CalculationKind::DebtToIncome => "dti",
            CalculationKind::Affordability => "affordability",
            CalculationKind::ActionPlan => "action_plan",
            CalculationKind::Readiness => "readiness",
            CalculationKind::SpendingAnalysis => "spending",
            CalculationKind::GoalRecommendation => "goal_recommendation",
        }
    }
}

/// Primary kind of a result, or `None` when no known key is present
pub fn classify(result: &CalculationResult) -> Option<CalculationKind> {
    CalculationKind::ALL
        .into_iter()
        .find(|kind| kind.matches(result))
}
