//! Collaborators the wizard drives: PDF → text, text → enhanced text,
//! text → audio.
//!
//! Each collaborator is an async trait so the wizard can be tested with fakes
//! and the CLI can plug in the real backends:
//!
//! ```text
//! PDF (base64) ──▶ extract ──▶ Markdown ──▶ enhance ──▶ Markdown ──▶ speech ──▶ PCM
//!                 (pdfium)                  (LLM)                   (Gemini TTS)
//! ```
//!
//! 1. [`extract`] — pdfium text layer, run in `spawn_blocking`
//! 2. [`enhance`] — narration rewrite through an `edgequake-llm` provider
//! 3. [`speech`]  — Gemini `generateContent` with an audio response modality
//! 4. [`cleanup`] — deterministic text tidying shared by 1 and 2
//!
//! None of the collaborators retry; a failure goes straight back to the
//! action boundary in [`crate::actions`].

pub mod cleanup;
pub mod enhance;
pub mod extract;
pub mod speech;

use crate::config::NarratorConfig;
use crate::error::PipelineError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub use enhance::LlmEnhancer;
pub use extract::PdfiumExtractor;
pub use speech::GeminiSpeechSynthesizer;

/// Turns a PDF into plain text / Markdown.
#[async_trait]
pub trait PdfExtractor: Send + Sync {
    /// `pdf_base64` is the whole PDF file, base64-encoded.
    async fn extract(&self, pdf_base64: &str) -> Result<String, PipelineError>;
}

/// Rewrites Markdown so it reads well aloud.
#[async_trait]
pub trait TextEnhancer: Send + Sync {
    async fn enhance(&self, markdown: &str) -> Result<String, PipelineError>;
}

/// Audio as returned by a speech provider, before container encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    /// Raw provider bytes; headerless linear PCM for Gemini.
    pub data: Vec<u8>,
    /// Provider MIME type, e.g. `audio/L16;codec=pcm;rate=24000`.
    pub mime_type: Option<String>,
}

impl SynthesizedAudio {
    pub fn pcm(data: Vec<u8>) -> Self {
        Self {
            data,
            mime_type: None,
        }
    }
}

/// Turns text into speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, PipelineError>;
}

/// The three collaborators a [`crate::wizard::Wizard`] needs.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn PdfExtractor>,
    pub enhancer: Arc<dyn TextEnhancer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl Collaborators {
    pub fn new(
        extractor: Arc<dyn PdfExtractor>,
        enhancer: Arc<dyn TextEnhancer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            extractor,
            enhancer,
            synthesizer,
        }
    }

    /// The production backends: pdfium, an `edgequake-llm` provider and Gemini TTS.
    ///
    /// Provider resolution and API-key lookup are deferred to the first call,
    /// so a session that never enhances does not need LLM credentials.
    pub fn from_config(config: &NarratorConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            extractor: Arc::new(PdfiumExtractor::new(config.pdf_password.clone())),
            enhancer: Arc::new(LlmEnhancer::from_config(config)),
            synthesizer: Arc::new(GeminiSpeechSynthesizer::from_config(config)?),
        })
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("extractor", &"<dyn PdfExtractor>")
            .field("enhancer", &"<dyn TextEnhancer>")
            .field("synthesizer", &"<dyn SpeechSynthesizer>")
            .finish()
    }
}
