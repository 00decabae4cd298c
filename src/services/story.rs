use crate::core::config::{Config, StoryConfig};
use crate::core::error::GenerationError;
use crate::core::state::{Story, StoryPage};
use crate::services::llm::{GeminiClient, GenerateContentRequest, GenerationConfig};
use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;

/// Produces the title and page list of a story. Does not touch run state.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    async fn generate_structure(
        &self,
        keywords: &str,
        moral: &str,
        style: &str,
    ) -> Result<Story, GenerationError>;
}

#[derive(Debug)]
pub struct GeminiStoryGenerator {
    client: GeminiClient,
    story: StoryConfig,
}

impl GeminiStoryGenerator {
    pub fn new(config: &Config) -> Self {
        Self::with_client(GeminiClient::new(&config.llm), &config.story)
    }

    pub fn with_client(client: GeminiClient, story: &StoryConfig) -> Self {
        Self {
            client,
            story: story.clone(),
        }
    }
}

#[async_trait]
impl StoryGenerator for GeminiStoryGenerator {
    async fn generate_structure(
        &self,
        keywords: &str,
        moral: &str,
        style: &str,
    ) -> Result<Story, GenerationError> {
        let prompt = build_prompt(&self.story, keywords, moral, style);
        let request = GenerateContentRequest::from_text(&prompt).with_config(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(story_schema()),
            ..Default::default()
        });

        info!("Requesting story structure from {}", self.client.text_model());
        let response = self
            .client
            .generate_content(self.client.text_model(), &request)
            .await?;

        let text = response.text();
        if text.trim().is_empty() {
            let reason = response.stop_reason().to_string();
            debug!("Story response had no text ({})", reason);
            return Err(GenerationError::Empty { reason });
        }
        let story = parse_story(&text)?;
        info!("Story \"{}\" has {} pages", story.title, story.pages.len());
        Ok(story)
    }
}

pub fn build_prompt(cfg: &StoryConfig, keywords: &str, moral: &str, style: &str) -> String {
    format!(
        "You are a world-class children's picture-book author and elementary school teacher.\n\
        Write a vivid, fun short story based on the following:\n\
        Keywords: {keywords}\n\
        Moral or learning goal: {moral}\n\
        Suggested illustration style: {style}\n\
        \n\
        Create a picture-book story of {min} to {max} pages.\n\
        Each page must contain:\n\
        1. The story text in {language}, suitable for elementary school students to read aloud.\n\
        2. An English visual description (visualPrompt) used to generate the illustration with AI. \
        Keep the characters consistent from page to page and match the \"{style}\" style.\n\
        \n\
        Respond in JSON with a title and a pages array.",
        keywords = keywords.trim(),
        moral = moral.trim(),
        style = style.trim(),
        min = cfg.min_pages,
        max = cfg.max_pages,
        language = cfg.language,
    )
}

/// Response layout the model is constrained to.
pub fn story_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "pages": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "text": { "type": "STRING" },
                        "visualPrompt": { "type": "STRING" }
                    },
                    "required": ["text", "visualPrompt"]
                }
            }
        },
        "required": ["title", "pages"]
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructurePage {
    text: String,
    visual_prompt: String,
}

#[derive(Deserialize)]
struct StructureResponse {
    title: String,
    pages: Vec<StructurePage>,
}

/// Parses the model's JSON into a [`Story`] whose pages all lack an image.
pub fn parse_story(response: &str) -> Result<Story, GenerationError> {
    let clean = strip_code_blocks(response);
    let clean = if clean.is_empty() { "{}" } else { clean.as_str() };

    let parsed: StructureResponse = serde_json::from_str(clean)?;
    if parsed.pages.is_empty() {
        return Err(GenerationError::NoPages);
    }

    Ok(Story {
        title: parsed.title,
        pages: parsed
            .pages
            .into_iter()
            .map(|p| StoryPage {
                text: p.text,
                visual_prompt: p.visual_prompt,
                image_url: None,
            })
            .collect(),
    })
}

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ApiError;
    use crate::services::llm::test_server::{local_client, serve_once};

    fn model_reply(text: &str) -> String {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
        .to_string()
    }

    async fn structure_from(status: &str, body: &str) -> Result<Story, GenerationError> {
        let (base_url, server) = serve_once(status, body).await;
        let writer =
            GeminiStoryGenerator::with_client(local_client(&base_url), &StoryConfig::default());
        let result = writer
            .generate_structure("a friendly robot", "honesty", "watercolor")
            .await;
        server.await.unwrap();
        result
    }

    const FOUR_PAGES: &str = r#"{
        "title": "The Friendly Robot",
        "pages": [
            { "text": "Once upon a time...", "visualPrompt": "A small robot in a classroom" },
            { "text": "The robot broke a vase.", "visualPrompt": "A robot next to a broken vase" },
            { "text": "It told the truth.", "visualPrompt": "A robot talking to a teacher" },
            { "text": "Everyone cheered.", "visualPrompt": "Children cheering for a robot", "imageUrl": "data:bogus" }
        ]
    }"#;

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("json"), "json");
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("  ```json  \n  {}  \n  ```  "), "{}");
    }

    #[test]
    fn test_parse_story() {
        let story = parse_story(FOUR_PAGES).unwrap();
        assert_eq!(story.title, "The Friendly Robot");
        assert_eq!(story.pages.len(), 4);
        assert_eq!(story.pages[1].visual_prompt, "A robot next to a broken vase");
        assert!(story.pages.iter().all(|p| p.image_url.is_none()));
    }

    #[test]
    fn test_parse_story_in_code_fence() {
        let fenced = format!("```json\n{}\n```", FOUR_PAGES);
        assert_eq!(parse_story(&fenced).unwrap().pages.len(), 4);
    }

    #[test]
    fn test_empty_response_is_malformed() {
        assert!(matches!(parse_story(""), Err(GenerationError::Malformed(_))));
        assert!(matches!(parse_story("   "), Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn test_missing_visual_prompt_is_malformed() {
        let json = r#"{"title": "T", "pages": [{"text": "only text"}]}"#;
        assert!(matches!(parse_story(json), Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn test_zero_pages_rejected() {
        let json = r#"{"title": "T", "pages": []}"#;
        assert!(matches!(parse_story(json), Err(GenerationError::NoPages)));
    }

    #[test]
    fn test_prompt_contains_inputs() {
        let cfg = StoryConfig::default();
        let prompt = build_prompt(&cfg, " a friendly robot ", "honesty", "watercolor");
        assert!(prompt.contains("Keywords: a friendly robot\n"));
        assert!(prompt.contains("Moral or learning goal: honesty"));
        assert!(prompt.contains("\"watercolor\" style"));
        assert!(prompt.contains("4 to 5 pages"));
        assert!(prompt.contains("Traditional Chinese"));
    }

    #[test]
    fn test_schema_requires_both_page_fields() {
        let schema = story_schema();
        assert_eq!(
            schema["properties"]["pages"]["items"]["required"],
            json!(["text", "visualPrompt"])
        );
        assert_eq!(schema["required"], json!(["title", "pages"]));
    }

    #[tokio::test]
    async fn test_structure_request_asks_for_json_with_schema() {
        let (base_url, server) = serve_once("200 OK", &model_reply(FOUR_PAGES)).await;
        let writer =
            GeminiStoryGenerator::with_client(local_client(&base_url), &StoryConfig::default());

        let story = writer
            .generate_structure("a friendly robot", "honesty", "watercolor")
            .await
            .unwrap();
        assert_eq!(story.title, "The Friendly Robot");
        assert_eq!(story.pages.len(), 4);

        let request = server.await.unwrap();
        assert!(request
            .head
            .starts_with("POST /models/text-model:generateContent HTTP/1.1"));
        let body = request.json();
        let config = &body["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"], story_schema());
        assert!(config.get("imageConfig").is_none());
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("Keywords: a friendly robot"));
    }

    #[tokio::test]
    async fn test_blocked_prompt_reports_block_reason() {
        let blocked = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let err = structure_from("200 OK", blocked).await.unwrap_err();

        match &err {
            GenerationError::Empty { reason } => assert_eq!(reason, "SAFETY"),
            other => panic!("Expected empty response error, got {:?}", other),
        }
        assert_eq!(err.to_string(), "story service returned no text (reason: SAFETY)");
    }

    #[tokio::test]
    async fn test_candidate_without_text_reports_finish_reason() {
        let truncated = r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#;
        match structure_from("200 OK", truncated).await {
            Err(GenerationError::Empty { reason }) => assert_eq!(reason, "MAX_TOKENS"),
            other => panic!("Expected empty response error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_service_error_message_surfaces_unchanged() {
        let err = structure_from(
            "400 Bad Request",
            r#"{"error":{"code":400,"message":"API key not valid."}}"#,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, GenerationError::Api(ApiError::Service(_))));
        assert_eq!(err.to_string(), "API key not valid.");
    }

    #[tokio::test]
    async fn test_fenced_reply_over_the_wire() {
        let fenced = format!("```json\n{}\n```", FOUR_PAGES);
        let story = structure_from("200 OK", &model_reply(&fenced)).await.unwrap();
        assert_eq!(story.pages[3].text, "Everyone cheered.");
        assert!(story.pages.iter().all(|p| p.image_url.is_none()));
    }
}
