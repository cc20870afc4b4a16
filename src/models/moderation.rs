use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyCategory {
    pub category: String,
    pub confidence: f64,
    pub severity: Severity,
}

/// Verdict returned by `/moderate`. Constructed per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationResult {
    pub is_safe: bool,
    pub overall_confidence: f64,
    pub categories: Vec<SafetyCategory>,
    pub analysis_timestamp: DateTime<Utc>,
    pub image_hash: Option<String>,
}

impl ModerationResult {
    /// Shape a verdict from the emitted categories: unsafe iff any category
    /// reached high severity, overall confidence is the arithmetic mean of
    /// the emitted confidences (0.0 when nothing cleared the threshold).
    pub fn from_categories(categories: Vec<SafetyCategory>, image_hash: Option<String>) -> Self {
        let is_safe = !categories.iter().any(|c| c.severity == Severity::High);
        let overall_confidence = if categories.is_empty() {
            0.0
        } else {
            categories.iter().map(|c| c.confidence).sum::<f64>() / categories.len() as f64
        };

        Self {
            is_safe,
            overall_confidence,
            categories,
            analysis_timestamp: Utc::now(),
            image_hash,
        }
    }
}
