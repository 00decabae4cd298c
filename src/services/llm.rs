use crate::core::config::LlmConfig;
use crate::core::error::{body_excerpt, ApiError};
use log::debug;
use serde::{Deserialize, Serialize};

// --- Gemini ---

/// Thin `generateContent` client shared by the story writer and the illustrator.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            config: config.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub fn text_model(&self) -> &str {
        &self.config.text_model
    }

    pub fn image_model(&self) -> &str {
        &self.config.image_model
    }

    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ApiError> {
        // Re-read per call so a key configured after startup is used.
        let api_key = self.config.resolve_api_key()?;
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );
        debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<GenerateContentResponse>(&body) {
                Ok(GenerateContentResponse { error: Some(err), .. }) => {
                    ApiError::Service(err.message)
                }
                _ => ApiError::Status {
                    status: status.as_u16(),
                    body: body_excerpt(&body),
                },
            });
        }

        parse_response(&body)
    }
}

pub(crate) fn parse_response(body: &str) -> Result<GenerateContentResponse, ApiError> {
    let result: GenerateContentResponse =
        serde_json::from_str(body).map_err(|source| ApiError::Decode {
            source,
            body: body_excerpt(body),
        })?;

    if let Some(err) = result.error {
        return Err(ApiError::Service(err.message));
    }
    Ok(result)
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// Single user turn containing one text part.
    pub fn from_text(text: &str) -> Self {
        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: text.to_string(),
                }],
            }],
            generation_config: None,
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Serialize, Debug, Clone)]
pub struct Part {
    pub text: String,
}

#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub error: Option<ServiceError>,
}

/// Present when the prompt itself was refused.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePart {
    pub text: Option<String>,
    pub inline_data: Option<InlineData>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Deserialize, Debug)]
pub struct ServiceError {
    pub message: String,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[ResponsePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// All text parts of the first candidate, concatenated.
    pub fn text(&self) -> String {
        self.first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    /// First non-empty inline payload of the first candidate.
    pub fn first_inline_data(&self) -> Option<&InlineData> {
        self.first_parts()
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| !d.data.trim().is_empty())
    }

    pub fn finish_reason(&self) -> &str {
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .unwrap_or("UNKNOWN")
    }

    /// Why nothing usable came back: the prompt block reason if any, else the finish reason.
    pub fn stop_reason(&self) -> &str {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
            .unwrap_or_else(|| self.finish_reason())
    }
}

/// One-shot HTTP/1.1 server for exercising the client against real sockets.
#[cfg(test)]
pub(crate) mod test_server {
    use super::GeminiClient;
    use crate::core::config::LlmConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    pub struct CapturedRequest {
        /// Request line and headers, as sent.
        pub head: String,
        pub body: String,
    }

    impl CapturedRequest {
        pub fn header(&self, name: &str) -> Option<String> {
            self.head.lines().skip(1).find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case(name)
                    .then(|| value.trim().to_string())
            })
        }

        pub fn json(&self) -> serde_json::Value {
            serde_json::from_str(&self.body).unwrap()
        }
    }

    /// Client with an inline key that talks to `base_url` directly, ignoring proxy settings.
    pub fn local_client(base_url: &str) -> GeminiClient {
        GeminiClient {
            config: LlmConfig {
                api_key: Some("test-key".to_string()),
                base_url: base_url.to_string(),
                text_model: "text-model".to_string(),
                image_model: "image-model".to_string(),
                ..LlmConfig::default()
            },
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
        }
    }

    /// Answers the first connection with `status` and `body`, then hands back what was sent.
    pub async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before the request was complete");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos;
                }
            };
            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let mut captured = CapturedRequest {
                head,
                body: String::new(),
            };
            let body_len: usize = captured
                .header("content-length")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            while buf.len() < header_end + 4 + body_len {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before the body was complete");
                buf.extend_from_slice(&chunk[..n]);
            }
            captured.body = String::from_utf8_lossy(&buf[header_end + 4..]).to_string();

            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            captured
        });

        (format!("http://{}", addr), handle)
    }
}
