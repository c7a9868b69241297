//! # pdf-narrator
//!
//! Turn a PDF into narrated audio in three steps: upload, edit, play.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Upload   type + size check (application/pdf, ≤ 10 MiB)
//!  ├─ 2. Convert  pdfium text layer → Markdown (CPU-bound, spawn_blocking)
//!  ├─ 3. Edit     user edits, optional LLM "enhance for narration" rewrite
//!  ├─ 4. Speak    Gemini TTS → 16-bit mono 24 kHz PCM
//!  └─ 5. Encode   44-byte RIFF header → data:audio/wav;base64,… URI
//! ```
//!
//! [`Wizard`] owns the state machine. It never talks to a backend directly:
//! the PDF extractor, the text enhancer and the speech synthesizer are
//! injected as [`Collaborators`], and the Markdown / audio entries are
//! persisted through a [`SessionStore`] so a restarted session resumes where
//! it left off.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_narrator::{Collaborators, FileStore, NarratorConfig, UploadedFile, Wizard};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // LLM provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …,
//!     // speech from GEMINI_API_KEY.
//!     let config = NarratorConfig::default();
//!     let wizard = Wizard::new(
//!         Collaborators::from_config(&config)?,
//!         Arc::new(FileStore::in_dir(FileStore::default_dir())),
//!         &config,
//!     );
//!
//!     let pdf = UploadedFile::from_path("document.pdf", config.max_file_bytes).await?;
//!     wizard.accept_file(pdf)?;
//!     wizard.convert().await?;
//!     wizard.enhance().await?;
//!     wizard.generate().await?;
//!
//!     let wav = pdf_narrator::wav::decode_data_uri(
//!         wizard.snapshot().audio_resource.as_deref().unwrap_or_default(),
//!     )?;
//!     std::fs::write("narratorai_audio.wav", wav)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `narrator` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-narrator = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod actions;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod session;
pub mod wav;
pub mod wizard;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use actions::ActionResult;
pub use config::{NarratorConfig, NarratorConfigBuilder};
pub use error::{EncodingError, NarratorError, PipelineError, StoreError, ValidationError};
pub use pipeline::{
    Collaborators, GeminiSpeechSynthesizer, LlmEnhancer, PdfExtractor, PdfiumExtractor,
    SpeechSynthesizer, SynthesizedAudio, TextEnhancer,
};
pub use session::{FileStore, MemoryStore, SessionStore, AUDIO_KEY, MARKDOWN_KEY};
pub use wav::{encode_wav, WavFormat, WavHeader};
pub use wizard::{
    Outcome, SkipReason, Status, Step, TextStats, UploadedFile, Wizard, WizardState,
};
