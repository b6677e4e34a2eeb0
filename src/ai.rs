//! AI collaborators: image description (for renaming) and image
//! generation (for variants), over OpenAI-compatible HTTP APIs.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::error::{DescriptionError, GenerationError};

/// Produces a short filename stem describing an image.
pub trait Describer: Send + Sync {
    fn describe(&self, image: &[u8]) -> Result<String, DescriptionError>;
}

/// Produces a new image from a prompt, optionally seeded with a
/// reference image and target dimensions.
pub trait Generator: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        reference: Option<&[u8]>,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<Vec<u8>, GenerationError>;
}

// Request/response structs for the chat-completions vision call
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

fn naming_prompt() -> &'static str {
    "Look at this product photo and return a short filename stem for it: \
     two to four lowercase words joined by hyphens, no extension, no \
     quotes, nothing else. Describe the product, its color, and one \
     distinguishing detail. Example: zapatilla-urbana-blanca"
}

/// Describes images through an OpenAI-compatible chat-completions
/// endpoint with vision support.
pub struct ChatDescriber {
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ChatDescriber {
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            model: config.vision_model.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

impl Describer for ChatDescriber {
    fn describe(&self, image: &[u8]) -> Result<String, DescriptionError> {
        // buffers are canonical JPEG by the time they reach this call
        let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(image));

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: naming_prompt().to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: 60,
            temperature: 0.4,
        };

        let url = format!("{}/chat/completions", self.endpoint);

        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(120))
            .build();

        let mut req = agent.post(&url).set("Content-Type", "application/json");
        if let Some(ref api_key) = self.api_key {
            req = req.set("Authorization", &format!("Bearer {}", api_key));
        }

        let response = req
            .send_json(&request)
            .map_err(|e| DescriptionError(e.to_string()))?;

        let chat_response: ChatResponse = response
            .into_json()
            .map_err(|e| DescriptionError(format!("unparseable response: {e}")))?;

        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| DescriptionError("empty response".to_string()))?;

        // models occasionally wrap the stem in prose; keep the first line
        let stem = content.lines().next().unwrap_or("").trim().to_string();
        if stem.is_empty() {
            return Err(DescriptionError("blank filename stem".to_string()));
        }
        Ok(stem)
    }
}

// Request/response structs for the image-generation call
#[derive(Debug, Serialize)]
struct GenerationRequest {
    model: String,
    prompt: String,
    size: String,
    response_format: String,
    /// Base64 reference image, for backends that support image-to-image
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    b64_json: String,
}

const DEFAULT_GENERATION_SIZE: u32 = 1024;

/// Generates images through an OpenAI-compatible images endpoint.
pub struct HttpGenerator {
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpGenerator {
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            model: config.image_model.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

impl Generator for HttpGenerator {
    fn generate(
        &self,
        prompt: &str,
        reference: Option<&[u8]>,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<Vec<u8>, GenerationError> {
        let width = width.unwrap_or(DEFAULT_GENERATION_SIZE);
        let height = height.unwrap_or(DEFAULT_GENERATION_SIZE);

        let request = GenerationRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            size: format!("{width}x{height}"),
            response_format: "b64_json".to_string(),
            image: reference.map(|bytes| BASE64.encode(bytes)),
        };

        let url = format!("{}/images/generations", self.endpoint);

        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(300))
            .build();

        let mut req = agent.post(&url).set("Content-Type", "application/json");
        if let Some(ref api_key) = self.api_key {
            req = req.set("Authorization", &format!("Bearer {}", api_key));
        }

        let response = req
            .send_json(&request)
            .map_err(|e| GenerationError(e.to_string()))?;

        let generation: GenerationResponse = response
            .into_json()
            .map_err(|e| GenerationError(format!("unparseable response: {e}")))?;

        let first = generation
            .data
            .first()
            .ok_or_else(|| GenerationError("no image in response".to_string()))?;

        BASE64
            .decode(&first.b64_json)
            .map_err(|e| GenerationError(format!("invalid base64 payload: {e}")))
    }
}
