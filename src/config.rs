//! Configuration for the narrator pipeline.
//!
//! Every knob lives in [`NarratorConfig`], built via its
//! [`NarratorConfigBuilder`]. Collaborators read the slice of the config they
//! need when they are constructed; the wizard itself only looks at
//! [`NarratorConfig::max_file_bytes`].

use crate::error::NarratorError;
use crate::wav::WavFormat;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Upload limit applied by [`crate::wizard::Wizard::accept_file`]: 10 MiB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Gemini model used for speech synthesis.
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Prebuilt Gemini voice.
pub const DEFAULT_VOICE: &str = "Algenib";

/// Base URL of the Generative Language API.
pub const DEFAULT_TTS_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Configuration for a narrator session.
///
/// # Example
/// ```rust
/// use pdf_narrator::NarratorConfig;
///
/// let config = NarratorConfig::builder()
///     .model("gpt-4.1-mini")
///     .voice("Kore")
///     .build()
///     .unwrap();
/// assert_eq!(config.voice, "Kore");
/// ```
#[derive(Clone)]
pub struct NarratorConfig {
    /// Largest accepted upload in bytes. Default: 10 MiB.
    pub max_file_bytes: u64,

    /// LLM model identifier for the enhancement step.
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini", "ollama").
    /// If None along with `provider`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the enhancement call. Default: 0.7.
    ///
    /// Enhancement is a creative rewrite, so the default sits well above
    /// what transcription would use.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate. Default: 8192.
    pub max_tokens: usize,

    /// Custom enhancement prompt. `{markdown}` is replaced with the text.
    /// If None, uses the built-in narration prompt.
    pub enhance_prompt: Option<String>,

    /// Gemini TTS model. Default: [`DEFAULT_TTS_MODEL`].
    pub tts_model: String,

    /// Prebuilt voice name. Default: [`DEFAULT_VOICE`].
    pub voice: String,

    /// API base URL for the TTS call. Default: [`DEFAULT_TTS_BASE_URL`].
    pub tts_base_url: String,

    /// API key for the TTS call. If None, read from `GEMINI_API_KEY` or
    /// `GOOGLE_API_KEY` when the synthesizer is created.
    pub tts_api_key: Option<String>,

    /// Connect timeout for the TTS HTTP client in seconds. Default: 30.
    ///
    /// Only bounds connection setup; the synthesis request itself is awaited
    /// to completion.
    pub tts_connect_timeout_secs: u64,

    /// Format assumed for provider PCM when its MIME type does not say.
    pub wav_format: WavFormat,

    /// PDF user password for encrypted documents.
    pub pdf_password: Option<String>,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.7,
            max_tokens: 8192,
            enhance_prompt: None,
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            tts_base_url: DEFAULT_TTS_BASE_URL.to_string(),
            tts_api_key: None,
            tts_connect_timeout_secs: 30,
            wav_format: WavFormat::default(),
            pdf_password: None,
        }
    }
}

impl fmt::Debug for NarratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NarratorConfig")
            .field("max_file_bytes", &self.max_file_bytes)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("tts_model", &self.tts_model)
            .field("voice", &self.voice)
            .field("tts_base_url", &self.tts_base_url)
            .field("tts_api_key", &self.tts_api_key.as_ref().map(|_| "<redacted>"))
            .field("wav_format", &self.wav_format)
            .finish()
    }
}

impl NarratorConfig {
    /// Create a new builder for `NarratorConfig`.
    pub fn builder() -> NarratorConfigBuilder {
        NarratorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`NarratorConfig`].
#[derive(Debug)]
pub struct NarratorConfigBuilder {
    config: NarratorConfig,
}

impl NarratorConfigBuilder {
    pub fn max_file_bytes(mut self, n: u64) -> Self {
        self.config.max_file_bytes = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn enhance_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.enhance_prompt = Some(prompt.into());
        self
    }

    pub fn tts_model(mut self, model: impl Into<String>) -> Self {
        self.config.tts_model = model.into();
        self
    }

    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.config.voice = voice.into();
        self
    }

    pub fn tts_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.tts_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn tts_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.tts_api_key = Some(key.into());
        self
    }

    pub fn tts_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tts_connect_timeout_secs = secs.max(1);
        self
    }

    pub fn wav_format(mut self, format: WavFormat) -> Self {
        self.config.wav_format = format;
        self
    }

    pub fn pdf_password(mut self, pwd: impl Into<String>) -> Self {
        self.config.pdf_password = Some(pwd.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<NarratorConfig, NarratorError> {
        let c = &self.config;
        if c.max_file_bytes == 0 {
            return Err(NarratorError::InvalidConfig(
                "Maximum upload size must be ≥ 1 byte".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(NarratorError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.tts_model.trim().is_empty() {
            return Err(NarratorError::InvalidConfig("TTS model must not be empty".into()));
        }
        if c.voice.trim().is_empty() {
            return Err(NarratorError::InvalidConfig("Voice must not be empty".into()));
        }
        if !c.tts_base_url.starts_with("http://") && !c.tts_base_url.starts_with("https://") {
            return Err(NarratorError::InvalidConfig(format!(
                "TTS base URL must be HTTP(S), got '{}'",
                c.tts_base_url
            )));
        }
        if let Some(ref prompt) = c.enhance_prompt {
            if !prompt.contains("{markdown}") {
                return Err(NarratorError::InvalidConfig(
                    "Custom enhancement prompt must contain a {markdown} placeholder".into(),
                ));
            }
        }
        c.wav_format
            .validate()
            .map_err(|e| NarratorError::InvalidConfig(e.to_string()))?;
        Ok(self.config)
    }
}
