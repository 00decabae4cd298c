use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::ApiError;
use crate::core::state::{DEFAULT_MORAL, DEFAULT_STYLE};

pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub unattended: bool,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub story: StoryConfig,

    #[serde(default)]
    pub illustration: IllustrationConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    /// Inline key. When unset the key is read from `api_key_env` on every call.
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoryConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_min_pages")]
    pub min_pages: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_moral")]
    pub default_moral: String,
    #[serde(default = "default_style")]
    pub default_style: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IllustrationConfig {
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    /// Number of illustration requests in flight at once. 1 keeps them sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_output() -> String {
    "output".to_string()
}
fn default_api_key_env() -> String {
    "API_KEY".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_text_model() -> String {
    "gemini-3-flash-preview".to_string()
}
fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}
fn default_language() -> String {
    "Traditional Chinese".to_string()
}
fn default_min_pages() -> usize {
    4
}
fn default_max_pages() -> usize {
    5
}
fn default_moral() -> String {
    DEFAULT_MORAL.to_string()
}
fn default_style() -> String {
    DEFAULT_STYLE.to_string()
}
fn default_aspect_ratio() -> String {
    "4:3".to_string()
}
fn default_concurrency() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_folder: default_output(),
            unattended: false,
            llm: LlmConfig::default(),
            story: StoryConfig::default(),
            illustration: IllustrationConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            text_model: default_text_model(),
            image_model: default_image_model(),
        }
    }
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            min_pages: default_min_pages(),
            max_pages: default_max_pages(),
            default_moral: default_moral(),
            default_style: default_style(),
        }
    }
}

impl Default for IllustrationConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: default_aspect_ratio(),
            concurrency: default_concurrency(),
        }
    }
}

impl LlmConfig {
    /// Resolves the API key at call time so a key exported after startup is picked up.
    pub fn resolve_api_key(&self) -> Result<String, ApiError> {
        if let Some(key) = self.api_key.as_deref().map(str::trim) {
            if !key.is_empty() {
                return Ok(key.to_string());
            }
        }
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(ApiError::MissingApiKey(self.api_key_env.clone())),
        }
    }
}

impl Config {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("{} not found, using default settings", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.story.min_pages == 0 || self.story.min_pages > self.story.max_pages {
            anyhow::bail!(
                "story.min_pages ({}) must be at least 1 and not exceed story.max_pages ({})",
                self.story.min_pages,
                self.story.max_pages
            );
        }
        if self.illustration.concurrency == 0 {
            anyhow::bail!("illustration.concurrency must be at least 1");
        }
        Ok(())
    }
}
