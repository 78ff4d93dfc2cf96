//! Content analysis for vidscan.
//!
//! A [`ContentAnalyzer`] turns a transcript plus video metadata into a
//! [`Verdict`]: how likely the content is AI-generated and whether it contains
//! harmful material.

mod llm;

pub use llm::LlmAnalyzer;

use crate::error::{Result, VidscanError};
use crate::media::VideoMetadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Severity of harmful content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::str::FromStr for Severity {
    type Err = VidscanError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" | "moderate" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" | "severe" => Ok(Severity::Critical),
            other => Err(VidscanError::Analysis(format!("Unknown severity: {}", other))),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Structured analysis outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Likelihood the content is AI-generated, 0..=100.
    pub ai_generated_score: u8,
    pub dangerous_content: bool,
    pub danger_categories: Vec<String>,
    /// Present only when `dangerous_content` is true.
    pub danger_severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Verdict {
    /// Build a verdict from a loosely-typed model response.
    ///
    /// Scores are clamped to 0..=100, categories are trimmed, lowercased and
    /// de-duplicated, and a non-dangerous verdict carries no categories or severity.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let score = match &value["ai_generated_score"] {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| VidscanError::Analysis("Missing ai_generated_score".to_string()))?;

        let dangerous_content = match &value["dangerous_content"] {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::String(s) => s.eq_ignore_ascii_case("true"),
            _ => false,
        };

        let mut danger_categories: Vec<String> = Vec::new();
        let mut danger_severity = None;

        if dangerous_content {
            if let Some(items) = value["danger_categories"].as_array() {
                for item in items.iter().filter_map(|v| v.as_str()) {
                    let category = item.trim().to_lowercase();
                    if !category.is_empty() && !danger_categories.contains(&category) {
                        danger_categories.push(category);
                    }
                }
            }
            danger_severity = value["danger_severity"]
                .as_str()
                .map(str::parse::<Severity>)
                .transpose()?;
        }

        let explanation = value["explanation"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            ai_generated_score: score.clamp(0.0, 100.0).round() as u8,
            dangerous_content,
            danger_categories,
            danger_severity,
            explanation,
        })
    }
}

/// Trait for content analyzers.
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    /// Analyze a transcript in the context of its video metadata.
    async fn analyze(&self, transcript: &str, metadata: &VideoMetadata) -> Result<Verdict>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verdict_normalization() {
        let verdict = Verdict::from_json(&json!({
            "ai_generated_score": 142.7,
            "dangerous_content": true,
            "danger_categories": ["Violence", "violence ", "", "self-harm"],
            "danger_severity": "HIGH",
            "explanation": "  Synthetic narration.  "
        }))
        .unwrap();

        assert_eq!(verdict.ai_generated_score, 100);
        assert_eq!(verdict.danger_categories, vec!["violence", "self-harm"]);
        assert_eq!(verdict.danger_severity, Some(Severity::High));
        assert_eq!(verdict.explanation.as_deref(), Some("Synthetic narration."));
    }

    #[test]
    fn test_safe_verdict_drops_danger_fields() {
        let verdict = Verdict::from_json(&json!({
            "ai_generated_score": "35%",
            "dangerous_content": false,
            "danger_categories": ["spam"],
            "danger_severity": "low"
        }))
        .unwrap();

        assert_eq!(verdict.ai_generated_score, 35);
        assert!(verdict.danger_categories.is_empty());
        assert_eq!(verdict.danger_severity, None);
    }

    #[test]
    fn test_missing_score_is_analysis_error() {
        let err = Verdict::from_json(&json!({"dangerous_content": false})).unwrap_err();
        assert!(matches!(err, VidscanError::Analysis(_)));

        let negative = Verdict::from_json(&json!({"ai_generated_score": -4})).unwrap();
        assert_eq!(negative.ai_generated_score, 0);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("Moderate".parse::<Severity>().unwrap(), Severity::Medium);
        assert!("unknown".parse::<Severity>().is_err());
    }
}
