//! Text → speech through the Gemini `generateContent` API.
//!
//! Gemini TTS models answer a normal `generateContent` request when the
//! generation config asks for the `AUDIO` response modality. The audio comes
//! back as an `inlineData` part: base64 headerless PCM tagged
//! `audio/L16;codec=pcm;rate=24000`. Container encoding happens later, at the
//! action boundary.

use super::{SpeechSynthesizer, SynthesizedAudio};
use crate::config::NarratorConfig;
use crate::error::PipelineError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Environment variables consulted, in order, when no key is configured.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: [&'static str; 1],
    speech_config: SpeechConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig<'a> {
    voice_name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

fn build_request<'a>(text: &'a str, voice: &'a str) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![TextPart { text }],
        }],
        generation_config: GenerationConfig {
            response_modalities: ["AUDIO"],
            speech_config: SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig { voice_name: voice },
                },
            },
        },
    }
}

/// Pull the first inline audio part out of a response.
fn extract_audio(response: GenerateResponse) -> Result<SynthesizedAudio, PipelineError> {
    let inline = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.inline_data.filter(|d| !d.data.is_empty()))
        .ok_or(PipelineError::NoAudio)?;

    let data = STANDARD
        .decode(inline.data.trim())
        .map_err(|e| PipelineError::Internal(format!("audio payload is not base64: {e}")))?;
    if data.is_empty() {
        return Err(PipelineError::NoAudio);
    }

    Ok(SynthesizedAudio {
        data,
        mime_type: inline.mime_type,
    })
}

// ── Synthesizer ──────────────────────────────────────────────────────────

/// [`SpeechSynthesizer`] backed by a Gemini TTS model.
#[derive(Clone)]
pub struct GeminiSpeechSynthesizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    voice: String,
    api_key: Option<String>,
}

impl GeminiSpeechSynthesizer {
    pub fn from_config(config: &NarratorConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.tts_connect_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.tts_base_url.trim_end_matches('/').to_string(),
            model: config.tts_model.clone(),
            voice: config.voice.clone(),
            api_key: config.tts_api_key.clone(),
        })
    }

    /// `{base}/models/{model}:generateContent`
    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn api_key(&self) -> Result<String, PipelineError> {
        if let Some(ref key) = self.api_key {
            return Ok(key.clone());
        }
        API_KEY_ENV_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
            .ok_or_else(|| PipelineError::ProviderNotConfigured {
                provider: "gemini-tts".to_string(),
                hint: format!("Set {} or pass --gemini-api-key.", API_KEY_ENV_VARS.join(" or ")),
            })
    }
}

impl fmt::Debug for GeminiSpeechSynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiSpeechSynthesizer")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .finish()
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiSpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, PipelineError> {
        let key = self.api_key()?;
        let start = Instant::now();
        info!(
            "Synthesizing {} chars with {} (voice {})",
            text.len(),
            self.model,
            self.voice
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(&build_request(text, &self.voice))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Api {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let audio = extract_audio(parsed)?;
        debug!(
            "Received {} audio bytes ({:?}) in {:?}",
            audio.data.len(),
            audio.mime_type,
            start.elapsed()
        );
        Ok(audio)
    }
}
