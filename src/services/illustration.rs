use crate::core::config::Config;
use crate::core::error::IllustrationError;
use crate::services::llm::{
    GeminiClient, GenerateContentRequest, GenerateContentResponse, GenerationConfig, ImageConfig,
};
use crate::utils::data_url;
use async_trait::async_trait;
use log::debug;

/// Turns one page's visual prompt into an image data URL.
#[async_trait]
pub trait Illustrator: Send + Sync {
    async fn generate_illustration(&self, visual_prompt: &str) -> Result<String, IllustrationError>;
}

#[derive(Debug)]
pub struct GeminiIllustrator {
    client: GeminiClient,
    aspect_ratio: String,
}

impl GeminiIllustrator {
    pub fn new(config: &Config) -> Self {
        Self::with_client(
            GeminiClient::new(&config.llm),
            &config.illustration.aspect_ratio,
        )
    }

    pub fn with_client(client: GeminiClient, aspect_ratio: &str) -> Self {
        Self {
            client,
            aspect_ratio: aspect_ratio.to_string(),
        }
    }
}

#[async_trait]
impl Illustrator for GeminiIllustrator {
    async fn generate_illustration(&self, visual_prompt: &str) -> Result<String, IllustrationError> {
        if visual_prompt.trim().is_empty() {
            return Err(IllustrationError::EmptyPrompt);
        }

        let request = GenerateContentRequest::from_text(visual_prompt).with_config(
            GenerationConfig {
                image_config: Some(ImageConfig {
                    aspect_ratio: self.aspect_ratio.clone(),
                }),
                ..Default::default()
            },
        );

        debug!("Requesting illustration from {}", self.client.image_model());
        let response = self
            .client
            .generate_content(self.client.image_model(), &request)
            .await?;

        extract_image(&response)
    }
}

/// Data URL of the first inline image in the response.
pub fn extract_image(response: &GenerateContentResponse) -> Result<String, IllustrationError> {
    response
        .first_inline_data()
        .map(|d| data_url::from_base64(d.mime_type.as_deref(), &d.data))
        .ok_or_else(|| IllustrationError::NoImage {
            finish_reason: response.stop_reason().to_string(),
        })
}
