//! LLM-backed content analyzer.

use super::{ContentAnalyzer, Verdict};
use crate::config::{AnalysisSettings, Prompts};
use crate::error::{Result, VidscanError};
use crate::media::{excerpt, VideoMetadata};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Analyzer asking an OpenAI chat model for a JSON verdict.
pub struct LlmAnalyzer {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_transcript_chars: usize,
    prompts: Prompts,
}

impl LlmAnalyzer {
    pub fn new(settings: &AnalysisSettings, prompts: Prompts) -> Self {
        Self {
            client: create_client(Duration::from_secs(settings.request_timeout_seconds)),
            model: settings.model.clone(),
            max_transcript_chars: settings.max_transcript_chars,
            prompts,
        }
    }

    /// Fill the user prompt template for one video.
    fn user_prompt(&self, transcript: &str, metadata: &VideoMetadata) -> String {
        let mut vars = HashMap::new();
        vars.insert("title".to_string(), metadata.title.clone());
        vars.insert(
            "uploader".to_string(),
            metadata.uploader.clone().unwrap_or_else(|| "unknown".to_string()),
        );
        vars.insert(
            "duration".to_string(),
            metadata
                .duration_seconds
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        );
        vars.insert("description".to_string(), metadata.description_excerpt.clone());
        vars.insert(
            "transcript".to_string(),
            excerpt(transcript, self.max_transcript_chars),
        );

        self.prompts.render_with_custom(&self.prompts.analysis.user, &vars)
    }
}

/// Pull the JSON object out of a response that may be wrapped in prose or fences.
fn extract_json(content: &str) -> Result<serde_json::Value> {
    let start = content.find('{');
    let end = content.rfind('}');

    let json_str = match (start, end) {
        (Some(s), Some(e)) if e > s => &content[s..=e],
        _ => content,
    };

    serde_json::from_str(json_str).map_err(|e| {
        VidscanError::Analysis(format!(
            "Invalid JSON in analysis response: {}. Response was: {}",
            e,
            excerpt(content, 300)
        ))
    })
}

#[async_trait]
impl ContentAnalyzer for LlmAnalyzer {
    #[instrument(skip(self, transcript, metadata), fields(video_id = %metadata.id))]
    async fn analyze(&self, transcript: &str, metadata: &VideoMetadata) -> Result<Verdict> {
        if transcript.trim().is_empty() {
            return Err(VidscanError::Analysis("Transcript is empty".to_string()));
        }

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.analysis.system.clone())
                .build()
                .map_err(|e| VidscanError::Analysis(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(self.user_prompt(transcript, metadata))
                .build()
                .map_err(|e| VidscanError::Analysis(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.0)
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| VidscanError::Analysis(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| VidscanError::Analysis(format!("OpenAI API error: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| VidscanError::Analysis("Empty response from model".to_string()))?;

        debug!("Analysis response: {} chars", content.len());

        let verdict = Verdict::from_json(&extract_json(content)?)?;
        info!(
            "Verdict: ai_score={} dangerous={}",
            verdict.ai_generated_score, verdict.dangerous_content
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_fenced_response() {
        let content = "```json\n{\"ai_generated_score\": 80, \"dangerous_content\": false}\n```";
        let value = extract_json(content).unwrap();
        assert_eq!(value["ai_generated_score"], 80);
    }

    #[test]
    fn test_extract_json_rejects_garbage() {
        assert!(matches!(extract_json("no json here"), Err(VidscanError::Analysis(_))));
    }

    #[test]
    fn test_user_prompt_truncates_transcript() {
        let settings = AnalysisSettings {
            max_transcript_chars: 10,
            ..Default::default()
        };
        let analyzer = LlmAnalyzer::new(&settings, Prompts::default());
        let metadata = VideoMetadata {
            id: "dQw4w9WgXcQ".to_string(),
            title: "A Title".to_string(),
            ..Default::default()
        };

        let prompt = analyzer.user_prompt("0123456789ABCDEF", &metadata);
        assert!(prompt.contains("Title: A Title"));
        assert!(prompt.contains("Uploader: unknown"));
        assert!(prompt.contains("0123456789"));
        assert!(!prompt.contains("ABCDEF"));
    }
}
