mod client;
mod request;

pub use client::{InferenceClient, OllamaClient};
pub use request::{GenerateRequest, GenerateResponse, POEM_PROMPT};
