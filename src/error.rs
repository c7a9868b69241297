//! Error types for the pdf-narrator library.
//!
//! The error types follow the layers of the wizard:
//!
//! * [`ValidationError`] — an upload candidate was refused before it ever
//!   reached the wizard state (wrong MIME type, too large).
//!
//! * [`EncodingError`] — the WAV encoder could not build a container from the
//!   PCM it was given.
//!
//! * [`PipelineError`] — a collaborator (pdfium, the LLM, the TTS API) failed.
//!   These never reach the wizard directly; the action boundary in
//!   [`crate::actions`] logs them and turns them into a user-facing message.
//!
//! * [`StoreError`] — the session store could not read or write.
//!
//! * [`NarratorError`] — what wizard actions return to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// An upload candidate was rejected. State is never mutated when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The MIME type is not exactly `application/pdf`.
    #[error("Invalid file type '{mime_type}'. Please upload a PDF file.")]
    InvalidType { mime_type: String },

    /// The file exceeds the configured upload limit.
    #[error("File too large ({size} bytes). Please upload a PDF up to {max} bytes.")]
    TooLarge { size: u64, max: u64 },
}

/// Failures of the PCM → WAV encoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// No PCM bytes were supplied.
    #[error("PCM payload is empty")]
    EmptyPayload,

    /// Channel count, sample rate or sample width is zero.
    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),

    /// The payload does not fit the 32-bit RIFF size fields.
    #[error("PCM payload of {len} bytes exceeds the WAV size limit")]
    PayloadTooLarge { len: usize },

    /// A byte stream handed to the decoder is not a canonical WAV file.
    #[error("Malformed WAV header: {0}")]
    MalformedHeader(String),

    /// A string is not a `data:audio/wav;base64,` URI.
    #[error("Invalid audio data URI: {0}")]
    InvalidDataUri(String),
}

/// Collaborator failures: PDF extraction, text enhancement, speech synthesis.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── PDF extraction ────────────────────────────────────────────────────
    /// The PDF payload was not valid base64.
    #[error("PDF payload is not valid base64: {0}")]
    InvalidBase64(String),

    /// The decoded bytes do not start with `%PDF`.
    #[error("Content is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// pdfium refused to open the document.
    #[error("PDF is corrupt or encrypted: {0}")]
    CorruptPdf(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or place the library next to the binary."
    )]
    PdfiumBindingFailed(String),

    // ── LLM / TTS ─────────────────────────────────────────────────────────
    /// The configured provider could not be created (missing API key etc.).
    #[error("Provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM call itself failed.
    #[error("LLM call failed: {0}")]
    Llm(String),

    /// The HTTP request to the TTS API failed in transport.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The TTS API returned a non-success status.
    #[error("API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// The TTS API answered but carried no audio part.
    #[error("no audio returned")]
    NoAudio,

    /// A collaborator answered with nothing usable.
    #[error("{0} is empty")]
    EmptyResult(&'static str),

    /// The provider audio could not be wrapped into a WAV container.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Unexpected internal error (task join failure etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Session-store failures. Persistence is best-effort, so the wizard only logs these.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access session file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session file '{path}' is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory store's lock was poisoned by a panicking writer.
    #[error("Session store lock poisoned")]
    Poisoned,
}

/// Errors returned by wizard actions.
///
/// The collaborator variants carry the user-facing message produced at the
/// action boundary, not the underlying cause (that is logged instead).
#[derive(Debug, Error)]
pub enum NarratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Conversion failed: {message}")]
    Conversion { message: String },

    #[error("Enhancement failed: {message}")]
    Enhancement { message: String },

    #[error("Audio generation failed: {message}")]
    AudioGeneration { message: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

}
