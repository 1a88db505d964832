//! The "prophecy": a one-shot text generation request made in the
//! background. Whatever happens, callers only ever see a pending state or a
//! string to show; failures turn into a fixed fallback sentence.

use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use thiserror::Error;

pub const PROMPT: &str = "Generate a short, mysterious, and inspiring 'fortune cookie' style prediction for the year 2026. Keep it under 30 words. Tone: Futuristic, hopeful, slightly cyberpunk.";
pub const EMPTY_FALLBACK: &str = "The future is unwritten, but your potential is infinite.";
pub const FAILURE_FALLBACK: &str = "Connection to the future timeline unstable. Try again later.";

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Http(#[from] ureq::Error),
    #[error("could not start the request thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub trait Oracle: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, PredictionError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    thinking_config: ThinkingConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Deserialize, Debug, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default()
    }
}

/// Gemini `generateContent` over HTTPS.
pub struct GeminiOracle {
    agent: ureq::Agent,
    api_key: Option<String>,
    model: String,
}

impl GeminiOracle {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
        }
    }
}

impl Oracle for GeminiOracle {
    fn generate(&self, prompt: &str) -> Result<String, PredictionError> {
        let key = self.api_key.as_deref().ok_or(PredictionError::MissingApiKey)?;
        let url = format!("{API_BASE}/{}:generateContent", self.model);
        let request = GenerateRequest {
            contents: [Content { parts: [RequestPart { text: prompt }] }],
            generation_config: GenerationConfig {
                thinking_config: ThinkingConfig { thinking_budget: 0 },
            },
        };

        let resp = self.agent.post(&url).header("x-goog-api-key", key).send_json(&request)?;
        let mut body = resp.into_body();
        let parsed: GenerateResponse = body.read_json()?;
        Ok(parsed.text())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictionStatus {
    Idle,
    Pending,
    Ready(String),
    Failed(&'static str),
}

impl PredictionStatus {
    /// Text to show, once there is any.
    pub fn text(&self) -> Option<&str> {
        match self {
            PredictionStatus::Ready(text) => Some(text),
            PredictionStatus::Failed(fallback) => Some(fallback),
            PredictionStatus::Idle | PredictionStatus::Pending => None,
        }
    }

    fn from_result(result: Result<String, PredictionError>) -> Self {
        match result {
            Ok(text) if text.trim().is_empty() => PredictionStatus::Ready(EMPTY_FALLBACK.to_string()),
            Ok(text) => PredictionStatus::Ready(text.trim().to_string()),
            Err(e) => {
                error!("Error generating prediction: {e}");
                PredictionStatus::Failed(FAILURE_FALLBACK)
            }
        }
    }
}

/// Owns the shared status cell and issues the request at most once.
pub struct Prophecy {
    oracle: Arc<dyn Oracle>,
    status: Arc<Mutex<PredictionStatus>>,
}

impl Prophecy {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            status: Arc::new(Mutex::new(PredictionStatus::Idle)),
        }
    }

    pub fn status(&self) -> PredictionStatus {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_status(status: &Mutex<PredictionStatus>, new_status: PredictionStatus) {
        *status.lock().unwrap_or_else(PoisonError::into_inner) = new_status;
    }

    /// Starts the background request unless one was already made. Returns
    /// whether a request was started.
    pub fn request(&self) -> bool {
        {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            if *status != PredictionStatus::Idle {
                return false;
            }
            *status = PredictionStatus::Pending;
        }
        info!("Consulting the oracle...");

        let oracle = Arc::clone(&self.oracle);
        let status = Arc::clone(&self.status);
        let spawned = thread::Builder::new().name("prophecy".into()).spawn(move || {
            let result = PredictionStatus::from_result(oracle.generate(PROMPT));
            info!("Prediction resolved: {result:?}");
            Self::set_status(&status, result);
        });
        if let Err(e) = spawned {
            Self::set_status(&self.status, PredictionStatus::from_result(Err(e.into())));
        }
        true
    }
}
