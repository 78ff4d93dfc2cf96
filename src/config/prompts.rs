//! Prompt templates for vidscan.
//!
//! The analysis prompt can be customized by placing an `analysis.toml` file in
//! the configured prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub analysis: AnalysisPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for AI-generation and harmful-content analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisPrompts {
    pub system: String,
    pub user: String,
}

impl Default for AnalysisPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a content integrity analyst. You review video transcripts and decide two things:

1. How likely the video's content is AI-generated (synthetic narration, text-to-speech scripts, templated filler, unnatural repetition, generic phrasing, absence of personal detail).
2. Whether the content is dangerous or harmful.

Harmful categories include: violence, self-harm, hate speech, harassment, sexual content involving minors, dangerous challenges, weapons or explosives instructions, drug manufacturing, scams or fraud, medical misinformation, extremism.

Rules:
- Judge only what the transcript and metadata support; do not speculate beyond them
- A high AI score requires concrete signals, not just a polished script
- Severity reflects real-world risk: low, medium, high, or critical
- Respond with a single JSON object and nothing else"#
                .to_string(),

            user: r#"Analyze this video.

Title: {{title}}
Uploader: {{uploader}}
Duration (seconds): {{duration}}
Description excerpt:
{{description}}

Transcript:
{{transcript}}

Respond with JSON:
{
  "ai_generated_score": <integer 0-100>,
  "dangerous_content": <true|false>,
  "danger_categories": [<category>, ...],
  "danger_severity": "low" | "medium" | "high" | "critical" | null,
  "explanation": "<one or two sentences>"
}"#
            .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let analysis_path = custom_path.join("analysis.toml");
            if analysis_path.exists() {
                let content = std::fs::read_to_string(&analysis_path)?;
                prompts.analysis = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render with both provided variables and custom config variables.
    /// Provided variables take precedence.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.analysis.system.is_empty());
        assert!(prompts.analysis.user.contains("{{transcript}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_custom_variables_yield_to_provided() {
        let mut prompts = Prompts::default();
        prompts.variables.insert("audience".to_string(), "parents".to_string());
        prompts.variables.insert("title".to_string(), "ignored".to_string());

        let mut vars = HashMap::new();
        vars.insert("title".to_string(), "Real".to_string());

        let out = prompts.render_with_custom("{{title}} for {{audience}}", &vars);
        assert_eq!(out, "Real for parents");
    }

    #[test]
    fn test_load_override_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("analysis.toml"),
            "system = \"sys\"\nuser = \"usr {{transcript}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.analysis.system, "sys");
        assert_eq!(prompts.analysis.user, "usr {{transcript}}");
    }
}
