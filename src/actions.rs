//! The action boundary between the wizard and its collaborators.
//!
//! Every collaborator call goes through one of the `handle_*` functions here.
//! They never return an error type: failures are logged with full detail and
//! folded into [`ActionResult::Failure`] carrying a short user-facing message,
//! so the state machine only ever sees success data or a message to show.

use crate::error::PipelineError;
use crate::pipeline::{PdfExtractor, SpeechSynthesizer, TextEnhancer};
use crate::wav::{self, WavFormat};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::error;

pub const CONVERT_FAILED: &str = "Failed to convert PDF.";
pub const ENHANCE_FAILED: &str = "Failed to enhance content.";
pub const GENERATE_FAILED: &str = "Failed to generate audio.";

/// Uniform outcome of a collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult<T> {
    Success { data: T },
    Failure { message: String },
}

impl<T> ActionResult<T> {
    fn failure(what: &str, err: &PipelineError, message: &str) -> Self {
        error!("Error {}: {}", what, err);
        ActionResult::Failure {
            message: message.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success { .. })
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            ActionResult::Success { data } => Ok(data),
            ActionResult::Failure { message } => Err(message),
        }
    }
}

/// Extract text from PDF bytes. An empty extraction counts as a failure.
pub async fn handle_pdf_to_markdown(
    extractor: &dyn PdfExtractor,
    pdf_bytes: &[u8],
) -> ActionResult<String> {
    let payload = STANDARD.encode(pdf_bytes);
    let outcome = extractor.extract(&payload).await.and_then(|text| {
        if text.trim().is_empty() {
            Err(PipelineError::EmptyResult("Extracted text"))
        } else {
            Ok(text)
        }
    });
    match outcome {
        Ok(data) => ActionResult::Success { data },
        Err(e) => ActionResult::failure("converting PDF", &e, CONVERT_FAILED),
    }
}

/// Rewrite Markdown for narration. An empty reply counts as a failure.
pub async fn handle_enhance_content(
    enhancer: &dyn TextEnhancer,
    markdown: &str,
) -> ActionResult<String> {
    let outcome = enhancer.enhance(markdown).await.and_then(|text| {
        if text.is_empty() {
            Err(PipelineError::EmptyResult("Enhanced content"))
        } else {
            Ok(text)
        }
    });
    match outcome {
        Ok(data) => ActionResult::Success { data },
        Err(e) => ActionResult::failure("enhancing content", &e, ENHANCE_FAILED),
    }
}

/// Synthesize speech and wrap it into a `data:audio/wav;base64,` URI.
///
/// The provider MIME type refines `format` (Gemini reports its sample rate);
/// encoder failures are reported like any other generation failure.
pub async fn handle_generate_audio(
    synthesizer: &dyn SpeechSynthesizer,
    text: &str,
    format: WavFormat,
) -> ActionResult<String> {
    let outcome = async {
        let audio = synthesizer.synthesize(text).await?;
        if audio.data.is_empty() {
            return Err(PipelineError::NoAudio);
        }
        let format = audio
            .mime_type
            .as_deref()
            .map(|m| WavFormat::from_mime_type(m, format))
            .unwrap_or(format);
        Ok::<_, PipelineError>(wav::pcm_to_data_uri(&audio.data, &format)?)
    }
    .await;

    match outcome {
        Ok(data) => ActionResult::Success { data },
        Err(e) => ActionResult::failure("generating audio", &e, GENERATE_FAILED),
    }
}
