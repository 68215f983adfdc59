use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Instruction sent with every captured image
pub const POEM_PROMPT: &str = "Look at this image and write a beautiful, creative short poem about what you see. \
The poem should be 8 lines long, capture the mood and essence of the scene, \
and have a thoughtful, artistic quality. Focus on the visual elements, emotions, \
and atmosphere present in the image.";

/// Body of `POST /api/generate`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub images: Vec<String>,
    pub stream: bool,
}

impl GenerateRequest {
    /// Single-shot poem request for one JPEG image
    pub fn poem(model: &str, image: &[u8]) -> Self {
        Self {
            model: model.to_string(),
            prompt: POEM_PROMPT.to_string(),
            images: vec![BASE64_STANDARD.encode(image)],
            stream: false,
        }
    }
}

/// The part of the generate reply we use; other fields are ignored
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: Option<String>,
}
