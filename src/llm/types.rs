use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::prompts::TemplateKind;

/// A fully rendered prompt, ready for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub kind: TemplateKind,
    pub system: String,
    pub user: String,
    /// JSON response schema forwarded to the service for structured flows.
    /// Advisory only: the engine never assumes the service honors it.
    pub response_schema: Option<Value>,
    /// The chat flow gets the search tool; JSON flows must not, since tool
    /// output breaks strict JSON responses.
    pub enable_search: bool,
}

// --- generateContent wire types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part {
                text: text.into(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

/// Tool declarations attached to a request. Only the Google search tool is
/// used, and only for the chat flow.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub google_search: Value,
}

impl Tool {
    pub fn google_search() -> Self {
        Self {
            google_search: Value::Object(serde_json::Map::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: CandidateContent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}
