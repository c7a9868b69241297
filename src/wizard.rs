//! The Upload → Edit → Play wizard.
//!
//! [`Wizard`] owns the single [`WizardState`] record and is the only thing
//! that mutates it. Every action follows the same shape:
//!
//! 1. atomically check that no other action is running and claim the busy
//!    status ([`BusyGuard`]);
//! 2. call one collaborator through the action boundary in [`crate::actions`];
//! 3. apply the result, unless a `reset` happened in the meantime;
//! 4. persist the changed Markdown / audio entry (best-effort);
//! 5. release the busy status when the guard drops, on every exit path.
//!
//! ```text
//!            accept_file            convert                generate
//!  Upload ───────────────▶ Upload ─────────▶ Edit ─(enhance)─▶ Edit ─────────▶ Play
//!    ▲                                        │                                  │
//!    └─────────────────── go_back ────────────┘                                  │
//!    └─────────────────────────────────── reset ─────────────────────────────────┘
//! ```
//!
//! The state lives in a [`tokio::sync::watch`] channel: front-ends call
//! [`Wizard::subscribe`] and re-render whenever a new snapshot arrives.
//! No lock is ever held across an `.await`.

use crate::actions::{self, ActionResult};
use crate::config::NarratorConfig;
use crate::error::{NarratorError, ValidationError};
use crate::pipeline::Collaborators;
use crate::session::{SessionStore, AUDIO_KEY, MARKDOWN_KEY};
use crate::wav::WavFormat;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The only MIME type [`Wizard::accept_file`] lets through.
pub const PDF_MIME_TYPE: &str = "application/pdf";

// ── Step / Status ────────────────────────────────────────────────────────

/// Which page of the wizard is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Upload,
    Edit,
    Play,
}

impl Step {
    /// Zero-based position in the wizard.
    pub fn index(self) -> usize {
        match self {
            Step::Upload => 0,
            Step::Edit => 1,
            Step::Play => 2,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Upload => "Step 1: Upload PDF",
            Step::Edit => "Step 2: Edit & Enhance",
            Step::Play => "Step 3: Your Audio is Ready!",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Step::Upload => "Start by uploading your document.",
            Step::Edit => "Review the extracted text and use AI to enrich the narrative.",
            Step::Play => "Listen to, and download your generated audio.",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Upload => "Upload",
            Step::Edit => "Edit",
            Step::Play => "Play",
        })
    }
}

/// Busy/idle status. Anything other than `Idle` blocks every action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Converting,
    Enhancing,
    Generating,
}

impl Status {
    pub fn is_busy(self) -> bool {
        self != Status::Idle
    }

    /// Human-readable label shown while the status is active.
    pub fn message(self) -> &'static str {
        match self {
            Status::Idle => "",
            Status::Converting => "Converting PDF to Markdown…",
            Status::Enhancing => "Enhancing content with AI…",
            Status::Generating => "Generating audio…",
        }
    }
}

// ── Uploaded file ────────────────────────────────────────────────────────

/// A candidate or accepted upload.
///
/// `byte_size` is the size the file claims to have; validation uses it
/// rather than `contents.len()`, the same way a browser `File` reports it.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    pub name: String,
    pub byte_size: u64,
    pub mime_type: String,
    #[serde(skip)]
    pub contents: Arc<[u8]>,
}

impl UploadedFile {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        contents: impl Into<Arc<[u8]>>,
    ) -> Self {
        let contents = contents.into();
        Self {
            name: name.into(),
            byte_size: contents.len() as u64,
            mime_type: mime_type.into(),
            contents,
        }
    }

    /// Read a file from disk; the MIME type is sniffed from its content.
    ///
    /// Files larger than `max_bytes` are not loaded: the candidate carries
    /// the on-disk size and the sniffed type but no contents, so
    /// [`Wizard::accept_file`] rejects it without the allocation.
    pub async fn from_path(path: impl AsRef<Path>, max_bytes: u64) -> std::io::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let byte_size = tokio::fs::metadata(path).await?.len();
        if byte_size > max_bytes {
            let mut head = Vec::with_capacity(MAGIC_LEN);
            tokio::fs::File::open(path)
                .await?
                .take(MAGIC_LEN as u64)
                .read_to_end(&mut head)
                .await?;
            let mime = sniff_mime_type(&head);
            debug!("'{}' is {} bytes, over the limit; contents not read", name, byte_size);
            return Ok(Self {
                name,
                byte_size,
                mime_type: mime.to_string(),
                contents: Arc::from(Vec::new()),
            });
        }

        let bytes = tokio::fs::read(path).await?;
        let mime = sniff_mime_type(&bytes);
        debug!("Read '{}': {} bytes, {}", name, bytes.len(), mime);
        Ok(Self::from_bytes(name, mime, bytes))
    }

    /// Size in MiB, for display.
    pub fn size_mib(&self) -> f64 {
        self.byte_size as f64 / (1024.0 * 1024.0)
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("byte_size", &self.byte_size)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

// Bytes needed by `sniff_mime_type`.
const MAGIC_LEN: usize = 4;

/// `application/pdf` when the bytes start with `%PDF`, else `application/octet-stream`.
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"%PDF") {
        PDF_MIME_TYPE
    } else {
        "application/octet-stream"
    }
}

/// Check an upload candidate against the type and size rules.
pub fn validate_upload(file: &UploadedFile, max_bytes: u64) -> Result<(), ValidationError> {
    if file.mime_type != PDF_MIME_TYPE {
        return Err(ValidationError::InvalidType {
            mime_type: file.mime_type.clone(),
        });
    }
    if file.byte_size > max_bytes {
        return Err(ValidationError::TooLarge {
            size: file.byte_size,
            max: max_bytes,
        });
    }
    Ok(())
}

// ── State ────────────────────────────────────────────────────────────────

/// Snapshot of the wizard.
///
/// Invariants: `step == Play` implies `audio_resource.is_some()`;
/// `status == Idle` implies `status_message` is empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WizardState {
    pub step: Step,
    pub file: Option<UploadedFile>,
    pub markdown_text: String,
    pub audio_resource: Option<String>,
    pub status: Status,
    pub status_message: String,
    // Bumped by every reset; results of actions started in an older session are dropped.
    #[serde(skip)]
    session: u64,
}

impl WizardState {
    /// State rebuilt from persisted entries: audio → Play, Markdown → Edit.
    pub fn restored(markdown: Option<String>, audio: Option<String>) -> Self {
        let step = if audio.is_some() {
            Step::Play
        } else if markdown.is_some() {
            Step::Edit
        } else {
            Step::Upload
        };
        Self {
            step,
            markdown_text: markdown.unwrap_or_default(),
            audio_resource: audio,
            ..Self::default()
        }
    }

    pub fn is_busy(&self) -> bool {
        self.status.is_busy()
    }

    pub fn can_convert(&self) -> bool {
        self.step == Step::Upload && self.file.is_some() && !self.is_busy()
    }

    pub fn can_enhance(&self) -> bool {
        self.step == Step::Edit && !self.markdown_text.is_empty() && !self.is_busy()
    }

    pub fn can_generate(&self) -> bool {
        self.step == Step::Edit && !self.markdown_text.trim().is_empty() && !self.is_busy()
    }

    pub fn can_go_back(&self) -> bool {
        self.step == Step::Edit && !self.is_busy()
    }

    pub fn can_download(&self) -> bool {
        self.step == Step::Play && self.audio_resource.is_some()
    }

    pub fn text_stats(&self) -> TextStats {
        TextStats::of(&self.markdown_text)
    }
}

/// Word count and narration estimate shown under the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextStats {
    pub words: usize,
    pub chars: usize,
    /// `ceil(chars / 5 / 150)`: five characters per word, 150 words per minute.
    pub estimated_minutes: usize,
}

impl TextStats {
    pub fn of(text: &str) -> Self {
        let chars = text.chars().count();
        Self {
            words: text.split_whitespace().count(),
            chars,
            estimated_minutes: chars.div_ceil(5 * 150),
        }
    }
}

// ── Outcomes ─────────────────────────────────────────────────────────────

/// Why an action did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another action holds the busy status.
    Busy,
    /// There is no text to work on.
    EmptyInput,
    /// `convert` was called before a file was accepted.
    NoFile,
    /// The action does not apply to the current step.
    WrongStep,
    /// A `reset` happened while the action was running; its result was dropped.
    Superseded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::Busy => "another action is still running",
            SkipReason::EmptyInput => "there is no text to work on",
            SkipReason::NoFile => "no PDF has been selected",
            SkipReason::WrongStep => "not available at this step",
            SkipReason::Superseded => "the session was reset while the action ran",
        })
    }
}

/// Result of a wizard action that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped(SkipReason),
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        self == Outcome::Applied
    }
}

// ── Busy guard ───────────────────────────────────────────────────────────

/// Holds the busy status; dropping it returns the wizard to `Idle`.
///
/// Released on success, on error, on panic and when the action future is
/// dropped mid-flight.
struct BusyGuard<'a> {
    state: &'a watch::Sender<WizardState>,
    session: u64,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| {
            s.status = Status::Idle;
            s.status_message.clear();
        });
    }
}

// ── Wizard ───────────────────────────────────────────────────────────────

/// The wizard state machine.
///
/// All methods take `&self`; share it with `Arc<Wizard>` to drive it from
/// several tasks. Only one action runs at a time, the rest are skipped with
/// [`SkipReason::Busy`].
pub struct Wizard {
    state: watch::Sender<WizardState>,
    collaborators: Collaborators,
    store: Arc<dyn SessionStore>,
    max_file_bytes: u64,
    wav_format: WavFormat,
}

impl fmt::Debug for Wizard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wizard")
            .field("state", &*self.state.borrow())
            .field("max_file_bytes", &self.max_file_bytes)
            .field("wav_format", &self.wav_format)
            .finish()
    }
}

impl Wizard {
    /// Create a wizard and rehydrate it from `store`.
    pub fn new(
        collaborators: Collaborators,
        store: Arc<dyn SessionStore>,
        config: &NarratorConfig,
    ) -> Self {
        let initial = restore_state(store.as_ref());
        info!(
            "Session restored at step {} ({} chars, audio: {})",
            initial.step,
            initial.markdown_text.len(),
            initial.audio_resource.is_some()
        );
        let (state, _rx) = watch::channel(initial);
        Self {
            state,
            collaborators,
            store,
            max_file_bytes: config.max_file_bytes,
            wav_format: config.wav_format,
        }
    }

    /// Current state.
    pub fn snapshot(&self) -> WizardState {
        self.state.borrow().clone()
    }

    /// Largest upload [`Wizard::accept_file`] lets through.
    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<WizardState> {
        self.state.subscribe()
    }

    // ── Actions ──────────────────────────────────────────────────────────

    /// Accept an upload candidate if it is a PDF within the size limit.
    ///
    /// A rejected candidate leaves the state untouched.
    pub fn accept_file(&self, candidate: UploadedFile) -> Result<(), NarratorError> {
        if let Err(e) = validate_upload(&candidate, self.max_file_bytes) {
            warn!("Rejected '{}': {}", candidate.name, e);
            return Err(e.into());
        }
        info!(
            "Accepted '{}' ({:.2} MiB)",
            candidate.name,
            candidate.size_mib()
        );
        self.state.send_modify(|s| s.file = Some(candidate));
        Ok(())
    }

    /// Convert the accepted PDF to Markdown and move to Edit.
    pub async fn convert(&self) -> Result<Outcome, NarratorError> {
        let (guard, file) = match self.begin(Status::Converting, |s| {
            if s.step != Step::Upload {
                return Err(SkipReason::WrongStep);
            }
            s.file.clone().ok_or(SkipReason::NoFile)
        }) {
            Ok(claimed) => claimed,
            Err(reason) => return Ok(Outcome::Skipped(reason)),
        };

        info!("Converting '{}'", file.name);
        let result =
            actions::handle_pdf_to_markdown(self.collaborators.extractor.as_ref(), &file.contents)
                .await;

        match result {
            ActionResult::Success { data } => {
                let outcome = self.commit(guard.session, MARKDOWN_KEY, &data, |s| {
                    s.markdown_text = data.clone();
                    s.step = Step::Edit;
                });
                if outcome.is_applied() {
                    info!("Converted '{}' → {} chars", file.name, data.len());
                }
                Ok(outcome)
            }
            ActionResult::Failure { message } => Err(NarratorError::Conversion { message }),
        }
    }

    /// Replace the Markdown with an enhanced version. No-op on empty text.
    ///
    /// Only valid in Edit.
    pub async fn enhance(&self) -> Result<Outcome, NarratorError> {
        let (guard, markdown) = match self.begin(Status::Enhancing, |s| {
            if s.step != Step::Edit {
                Err(SkipReason::WrongStep)
            } else if s.markdown_text.is_empty() {
                Err(SkipReason::EmptyInput)
            } else {
                Ok(s.markdown_text.clone())
            }
        }) {
            Ok(claimed) => claimed,
            Err(reason) => return Ok(Outcome::Skipped(reason)),
        };

        let result =
            actions::handle_enhance_content(self.collaborators.enhancer.as_ref(), &markdown).await;

        match result {
            ActionResult::Success { data } => {
                let outcome = self.commit(guard.session, MARKDOWN_KEY, &data, |s| {
                    s.markdown_text = data.clone();
                });
                if outcome.is_applied() {
                    info!("Content enhanced: {} → {} chars", markdown.len(), data.len());
                }
                Ok(outcome)
            }
            ActionResult::Failure { message } => Err(NarratorError::Enhancement { message }),
        }
    }

    /// Synthesize the Markdown to audio and move to Play. No-op on blank text.
    ///
    /// Only valid in Edit.
    pub async fn generate(&self) -> Result<Outcome, NarratorError> {
        let (guard, markdown) = match self.begin(Status::Generating, |s| {
            if s.step != Step::Edit {
                Err(SkipReason::WrongStep)
            } else if s.markdown_text.trim().is_empty() {
                Err(SkipReason::EmptyInput)
            } else {
                Ok(s.markdown_text.clone())
            }
        }) {
            Ok(claimed) => claimed,
            Err(reason) => return Ok(Outcome::Skipped(reason)),
        };

        let result = actions::handle_generate_audio(
            self.collaborators.synthesizer.as_ref(),
            &markdown,
            self.wav_format,
        )
        .await;

        match result {
            ActionResult::Success { data } => {
                let outcome = self.commit(guard.session, AUDIO_KEY, &data, |s| {
                    s.audio_resource = Some(data.clone());
                    s.step = Step::Play;
                });
                if outcome.is_applied() {
                    info!("Audio ready: {} byte data URI", data.len());
                }
                Ok(outcome)
            }
            ActionResult::Failure { message } => Err(NarratorError::AudioGeneration { message }),
        }
    }

    /// The user's own edit of the Markdown text. Only valid in Edit.
    pub fn set_markdown(&self, text: impl Into<String>) -> Outcome {
        let text = text.into();
        let mut session = None;
        self.state.send_if_modified(|s| {
            if s.step != Step::Edit {
                return false;
            }
            s.markdown_text = text.clone();
            session = Some(s.session);
            true
        });
        match session {
            Some(session) => self.persist_for(session, MARKDOWN_KEY, &text),
            None => Outcome::Skipped(SkipReason::WrongStep),
        }
    }

    /// Edit → Upload, dropping the file but keeping the Markdown.
    pub fn go_back(&self) -> Outcome {
        let mut outcome = Outcome::Applied;
        self.state.send_if_modified(|s| {
            if s.status.is_busy() {
                outcome = Outcome::Skipped(SkipReason::Busy);
                return false;
            }
            if s.step != Step::Edit {
                outcome = Outcome::Skipped(SkipReason::WrongStep);
                return false;
            }
            s.step = Step::Upload;
            s.file = None;
            true
        });
        if outcome.is_applied() {
            info!("Back to upload");
        }
        outcome
    }

    /// Start over: clear everything, return to Upload and wipe the session store.
    ///
    /// An action still in flight keeps the busy status until it returns, but
    /// its result is discarded.
    pub fn reset(&self) {
        self.state.send_modify(|s| {
            s.step = Step::Upload;
            s.file = None;
            s.markdown_text.clear();
            s.audio_resource = None;
            s.session += 1;
        });
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear session store: {}", e);
        }
        info!("Session reset");
    }

    // ── Internals ────────────────────────────────────────────────────────

    /// Atomically claim the busy status and capture the action input.
    fn begin<T>(
        &self,
        status: Status,
        prepare: impl FnOnce(&WizardState) -> Result<T, SkipReason>,
    ) -> Result<(BusyGuard<'_>, T), SkipReason> {
        let mut claimed = Err(SkipReason::Busy);
        self.state.send_if_modified(|s| {
            if s.status.is_busy() {
                return false;
            }
            match prepare(s) {
                Ok(input) => {
                    s.status = status;
                    s.status_message = status.message().to_string();
                    claimed = Ok((input, s.session));
                    true
                }
                Err(reason) => {
                    claimed = Err(reason);
                    false
                }
            }
        });

        match claimed {
            Ok((input, session)) => {
                debug!("{:?} started", status);
                Ok((
                    BusyGuard {
                        state: &self.state,
                        session,
                    },
                    input,
                ))
            }
            Err(reason) => {
                debug!("{:?} skipped: {}", status, reason);
                Err(reason)
            }
        }
    }

    /// Apply a result to the state and persist `value` under `key`, unless
    /// the session started at `session` has been reset.
    ///
    /// A reset landing between the state change and the store write has
    /// already cleared the store, so the write is rolled back and the result
    /// counts as superseded. Reset bumps the session before it clears the
    /// store; whichever order the two race in, the store ends up empty.
    fn commit(
        &self,
        session: u64,
        key: &str,
        value: &str,
        f: impl FnOnce(&mut WizardState),
    ) -> Outcome {
        let applied = self.state.send_if_modified(|s| {
            if s.session != session {
                return false;
            }
            f(s);
            true
        });
        if !applied {
            info!("Discarding result: session was reset");
            return Outcome::Skipped(SkipReason::Superseded);
        }
        self.persist_for(session, key, value)
    }

    /// Persist `value` for `session`; roll the write back if a reset overtook it.
    fn persist_for(&self, session: u64, key: &str, value: &str) -> Outcome {
        self.persist(key, value);

        if self.state.borrow().session != session {
            info!("Session reset while saving '{}'; rolling back", key);
            if let Err(e) = self.store.remove(key) {
                warn!("Failed to roll back '{}': {}", key, e);
            }
            return Outcome::Skipped(SkipReason::Superseded);
        }
        Outcome::Applied
    }

    /// Best-effort write of one session entry; empty values remove the key.
    fn persist(&self, key: &str, value: &str) {
        let result = if value.is_empty() {
            self.store.remove(key)
        } else {
            self.store.set(key, value)
        };
        if let Err(e) = result {
            warn!("Failed to persist '{}': {}", key, e);
        }
    }
}

/// Read the persisted entries into a fresh state. Store errors count as "not set".
pub fn restore_state(store: &dyn SessionStore) -> WizardState {
    let read = |key: &str| match store.get(key) {
        Ok(value) => value.filter(|v| !v.is_empty()),
        Err(e) => {
            warn!("Failed to read '{}' from session store: {}", key, e);
            None
        }
    };
    WizardState::restored(read(MARKDOWN_KEY), read(AUDIO_KEY))
}
