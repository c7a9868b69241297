//! Wizard integration tests.
//!
//! The collaborators are in-process fakes, so these run offline and without
//! pdfium. Live backends are covered by `tests/e2e.rs`.

use async_trait::async_trait;
use pdf_narrator::wav::{self, WavHeader, WAV_DATA_URI_PREFIX, WAV_HEADER_LEN};
use pdf_narrator::{
    encode_wav, Collaborators, FileStore, MemoryStore, NarratorConfig, NarratorError, Outcome,
    PdfExtractor, PipelineError, SessionStore, SkipReason, SpeechSynthesizer, Status, Step,
    StoreError, SynthesizedAudio, TextEnhancer, UploadedFile, ValidationError, WavFormat, Wizard,
    AUDIO_KEY, MARKDOWN_KEY,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::Notify;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Returns fixed text, or fails when constructed with `None`.
struct FakeExtractor {
    text: Option<&'static str>,
    calls: AtomicUsize,
}

impl FakeExtractor {
    fn returning(text: &'static str) -> Arc<Self> {
        Arc::new(Self {
            text: Some(text),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            text: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PdfExtractor for FakeExtractor {
    async fn extract(&self, _pdf_base64: &str) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text
            .map(str::to_string)
            .ok_or_else(|| PipelineError::CorruptPdf("xref table missing".into()))
    }
}

/// Applies a fixed rewrite to its input.
struct FakeEnhancer {
    rewrite: fn(&str) -> String,
    calls: AtomicUsize,
}

impl FakeEnhancer {
    fn new(rewrite: fn(&str) -> String) -> Arc<Self> {
        Arc::new(Self {
            rewrite,
            calls: AtomicUsize::new(0),
        })
    }

    fn echo() -> Arc<Self> {
        Self::new(str::to_string)
    }
}

#[async_trait]
impl TextEnhancer for FakeEnhancer {
    async fn enhance(&self, markdown: &str) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.rewrite)(markdown))
    }
}

/// Returns `pcm`, optionally pausing until the test releases it.
#[derive(Default)]
struct FakeSynthesizer {
    pcm: Vec<u8>,
    fail: bool,
    gated: bool,
    calls: AtomicUsize,
    started: Notify,
    release: Notify,
}

impl FakeSynthesizer {
    fn returning(pcm: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            pcm,
            ..Self::default()
        })
    }

    fn gated(pcm: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            pcm,
            gated: true,
            ..Self::default()
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<SynthesizedAudio, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated {
            self.started.notify_one();
            self.release.notified().await;
        }
        if self.fail {
            return Err(PipelineError::NoAudio);
        }
        Ok(SynthesizedAudio::pcm(self.pcm.clone()))
    }
}

struct FailingEnhancer;

#[async_trait]
impl TextEnhancer for FailingEnhancer {
    async fn enhance(&self, _markdown: &str) -> Result<String, PipelineError> {
        Err(PipelineError::Llm("503 Service Unavailable".into()))
    }
}

struct PanickingSynthesizer;

#[async_trait]
impl SpeechSynthesizer for PanickingSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<SynthesizedAudio, PipelineError> {
        panic!("synthesizer exploded");
    }
}

/// Every call fails.
struct BrokenStore;

impl SessionStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Poisoned)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }

    fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }

    fn clear(&self) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }
}

/// Resets the wizard from inside the first audio write, then performs the write.
#[derive(Default)]
struct ResetOnAudioWrite {
    inner: MemoryStore,
    wizard: OnceLock<Weak<Wizard>>,
    fired: AtomicBool,
}

impl SessionStore for ResetOnAudioWrite {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if key == AUDIO_KEY && !self.fired.swap(true, Ordering::SeqCst) {
            if let Some(wizard) = self.wizard.get().and_then(Weak::upgrade) {
                wizard.reset();
            }
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear()
    }
}

// ── Test helpers ─────────────────────────────────────────────────────────────

fn build(
    extractor: Arc<dyn PdfExtractor>,
    enhancer: Arc<dyn TextEnhancer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Arc<dyn SessionStore>,
) -> Arc<Wizard> {
    let config = NarratorConfig::default();
    Arc::new(Wizard::new(
        Collaborators::new(extractor, enhancer, synthesizer),
        store,
        &config,
    ))
}

fn pdf(name: &str) -> UploadedFile {
    UploadedFile::from_bytes(name, "application/pdf", b"%PDF-1.7\n%%EOF\n".to_vec())
}

/// A wizard already in Edit with `text`, restored from the store.
fn wizard_in_edit(
    text: &str,
    enhancer: Arc<dyn TextEnhancer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
) -> (Arc<Wizard>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store.set(MARKDOWN_KEY, text).unwrap();
    let wizard = build(
        FakeExtractor::returning("unused"),
        enhancer,
        synthesizer,
        store.clone(),
    );
    assert_eq!(wizard.snapshot().step, Step::Edit);
    (wizard, store)
}

// ── Upload validation ────────────────────────────────────────────────────────

#[tokio::test]
async fn non_pdf_is_rejected_without_state_change() {
    let wizard = build(
        FakeExtractor::returning("text"),
        FakeEnhancer::echo(),
        FakeSynthesizer::returning(vec![0; 4]),
        Arc::new(MemoryStore::new()),
    );
    let before = wizard.snapshot();

    for mime in ["image/png", "text/plain", "application/octet-stream", ""] {
        let candidate = UploadedFile::from_bytes("notes", mime, b"hello".to_vec());
        let err = wizard.accept_file(candidate).unwrap_err();
        assert!(
            matches!(
                err,
                NarratorError::Validation(ValidationError::InvalidType { .. })
            ),
            "{mime}: {err}"
        );
        assert_eq!(wizard.snapshot(), before);
    }
}

#[tokio::test]
async fn oversized_pdf_is_rejected_without_state_change() {
    let wizard = build(
        FakeExtractor::returning("text"),
        FakeEnhancer::echo(),
        FakeSynthesizer::returning(vec![0; 4]),
        Arc::new(MemoryStore::new()),
    );
    wizard.accept_file(pdf("first.pdf")).unwrap();
    let before = wizard.snapshot();

    let mut big = pdf("big.pdf");
    big.byte_size = 10 * 1024 * 1024 + 1;
    let err = wizard.accept_file(big).unwrap_err();
    assert!(matches!(
        err,
        NarratorError::Validation(ValidationError::TooLarge { .. })
    ));
    assert_eq!(wizard.snapshot(), before);
    assert_eq!(wizard.snapshot().file.unwrap().name, "first.pdf");

    let mut limit = pdf("limit.pdf");
    limit.byte_size = 10 * 1024 * 1024;
    wizard.accept_file(limit).unwrap();
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn convert_enhance_generate_ends_in_play() {
    let store = Arc::new(MemoryStore::new());
    let wizard = build(
        FakeExtractor::returning("Chapter one."),
        FakeEnhancer::new(|s| format!("{s} It was a dark night.")),
        FakeSynthesizer::returning(vec![1, 0, 2, 0]),
        store.clone(),
    );

    wizard.accept_file(pdf("story.pdf")).unwrap();
    assert_eq!(wizard.convert().await.unwrap(), Outcome::Applied);
    let state = wizard.snapshot();
    assert_eq!(state.step, Step::Edit);
    assert_eq!(state.markdown_text, "Chapter one.");
    assert_eq!(
        store.get(MARKDOWN_KEY).unwrap().as_deref(),
        Some("Chapter one.")
    );

    assert_eq!(wizard.enhance().await.unwrap(), Outcome::Applied);
    assert_eq!(
        wizard.snapshot().markdown_text,
        "Chapter one. It was a dark night."
    );

    assert_eq!(wizard.generate().await.unwrap(), Outcome::Applied);
    let state = wizard.snapshot();
    assert_eq!(state.step, Step::Play);
    assert_eq!(state.status, Status::Idle);
    assert!(state.status_message.is_empty());
    let audio = state.audio_resource.expect("audio after generate");
    assert_eq!(store.get(AUDIO_KEY).unwrap(), Some(audio));
}

#[tokio::test]
async fn hello_world_end_to_end() {
    let wizard = build(
        FakeExtractor::returning("Hello world"),
        FakeEnhancer::new(|_| "Hello, world!".to_string()),
        FakeSynthesizer::returning(vec![0x10, 0x00, 0x20, 0x00]),
        Arc::new(MemoryStore::new()),
    );

    wizard.accept_file(pdf("hello.pdf")).unwrap();
    wizard.convert().await.unwrap();
    assert_eq!(wizard.snapshot().markdown_text, "Hello world");

    wizard.enhance().await.unwrap();
    assert_eq!(wizard.snapshot().markdown_text, "Hello, world!");

    wizard.generate().await.unwrap();
    let state = wizard.snapshot();
    assert_eq!(state.step, Step::Play);
    let uri = state.audio_resource.unwrap();
    assert!(uri.starts_with(WAV_DATA_URI_PREFIX));

    let bytes = wav::decode_data_uri(&uri).unwrap();
    assert_eq!(bytes.len(), WAV_HEADER_LEN + 4);
    let header = WavHeader::parse(&bytes).unwrap();
    assert_eq!(header.format, WavFormat::default());
    assert_eq!(header.data_len, 4);
}

#[tokio::test]
async fn echo_enhance_leaves_text_unchanged() {
    let enhancer = FakeEnhancer::echo();
    let (wizard, _store) = wizard_in_edit(
        "# Title\n\nSome *text*.",
        enhancer.clone(),
        FakeSynthesizer::returning(vec![0; 2]),
    );

    wizard.enhance().await.unwrap();
    wizard.enhance().await.unwrap();
    assert_eq!(wizard.snapshot().markdown_text, "# Title\n\nSome *text*.");
    assert_eq!(enhancer.calls.load(Ordering::SeqCst), 2);
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn conversion_failure_stays_at_upload() {
    let wizard = build(
        FakeExtractor::failing(),
        FakeEnhancer::echo(),
        FakeSynthesizer::returning(vec![0; 2]),
        Arc::new(MemoryStore::new()),
    );
    wizard.accept_file(pdf("broken.pdf")).unwrap();

    let err = wizard.convert().await.unwrap_err();
    assert!(matches!(
        err,
        NarratorError::Conversion { ref message } if message == "Failed to convert PDF."
    ));
    let state = wizard.snapshot();
    assert_eq!(state.step, Step::Upload);
    assert_eq!(state.status, Status::Idle);
    assert!(state.file.is_some());
    assert!(state.markdown_text.is_empty());
}

#[tokio::test]
async fn generation_failure_stays_in_edit() {
    let (wizard, store) = wizard_in_edit(
        "Some text",
        FakeEnhancer::echo(),
        FakeSynthesizer::failing(),
    );

    let err = wizard.generate().await.unwrap_err();
    assert_eq!(err.to_string(), "Audio generation failed: Failed to generate audio.");
    let state = wizard.snapshot();
    assert_eq!(state.step, Step::Edit);
    assert_eq!(state.status, Status::Idle);
    assert!(state.audio_resource.is_none());
    assert_eq!(store.get(AUDIO_KEY).unwrap(), None);
}

#[tokio::test]
async fn enhancement_failure_keeps_text() {
    let (wizard, store) = wizard_in_edit(
        "Original draft",
        Arc::new(FailingEnhancer),
        FakeSynthesizer::returning(vec![0; 2]),
    );

    let err = wizard.enhance().await.unwrap_err();
    assert!(matches!(
        err,
        NarratorError::Enhancement { ref message } if message == "Failed to enhance content."
    ));
    let state = wizard.snapshot();
    assert_eq!(state.step, Step::Edit);
    assert_eq!(state.status, Status::Idle);
    assert!(state.status_message.is_empty());
    assert_eq!(state.markdown_text, "Original draft");
    assert_eq!(
        store.get(MARKDOWN_KEY).unwrap().as_deref(),
        Some("Original draft")
    );
}

#[tokio::test]
async fn store_failures_do_not_block_the_wizard() {
    let wizard = build(
        FakeExtractor::returning("Text"),
        FakeEnhancer::echo(),
        FakeSynthesizer::returning(vec![0; 4]),
        Arc::new(BrokenStore),
    );
    assert_eq!(wizard.snapshot().step, Step::Upload);

    wizard.accept_file(pdf("a.pdf")).unwrap();
    assert_eq!(wizard.convert().await.unwrap(), Outcome::Applied);
    assert_eq!(wizard.set_markdown("Edited"), Outcome::Applied);
    assert_eq!(wizard.generate().await.unwrap(), Outcome::Applied);
    let state = wizard.snapshot();
    assert_eq!(state.step, Step::Play);
    assert!(state.audio_resource.is_some());

    wizard.reset();
    assert_eq!(wizard.snapshot().step, Step::Upload);
}

#[tokio::test]
async fn panicking_collaborator_releases_busy_status() {
    let (wizard, _store) = wizard_in_edit(
        "Some text",
        FakeEnhancer::echo(),
        Arc::new(PanickingSynthesizer),
    );

    let task = {
        let wizard = wizard.clone();
        tokio::spawn(async move { wizard.generate().await })
    };
    assert!(task.await.unwrap_err().is_panic());
    assert_eq!(wizard.snapshot().status, Status::Idle);
    assert_eq!(wizard.snapshot().step, Step::Edit);
}

// ── Skips ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn generate_while_generating_is_a_no_op() {
    let synth = FakeSynthesizer::gated(vec![0; 4]);
    let (wizard, _store) = wizard_in_edit("Some text", FakeEnhancer::echo(), synth.clone());

    let first = {
        let wizard = wizard.clone();
        tokio::spawn(async move { wizard.generate().await })
    };
    synth.started.notified().await;

    let during = wizard.snapshot();
    assert_eq!(during.status, Status::Generating);
    assert_eq!(during.status_message, "Generating audio…");

    assert_eq!(
        wizard.generate().await.unwrap(),
        Outcome::Skipped(SkipReason::Busy)
    );
    assert_eq!(
        wizard.enhance().await.unwrap(),
        Outcome::Skipped(SkipReason::Busy)
    );
    assert_eq!(wizard.go_back(), Outcome::Skipped(SkipReason::Busy));
    assert_eq!(wizard.snapshot(), during);
    assert_eq!(synth.calls.load(Ordering::SeqCst), 1);

    synth.release.notify_one();
    assert_eq!(first.await.unwrap().unwrap(), Outcome::Applied);
    assert_eq!(synth.calls.load(Ordering::SeqCst), 1);
    assert_eq!(wizard.snapshot().step, Step::Play);
}

#[tokio::test]
async fn actions_without_input_are_skipped() {
    let extractor = FakeExtractor::returning("text");
    let enhancer = FakeEnhancer::echo();
    let synth = FakeSynthesizer::returning(vec![0; 2]);
    let wizard = build(
        extractor.clone(),
        enhancer.clone(),
        synth.clone(),
        Arc::new(MemoryStore::new()),
    );

    assert_eq!(
        wizard.convert().await.unwrap(),
        Outcome::Skipped(SkipReason::NoFile)
    );
    assert_eq!(
        wizard.enhance().await.unwrap(),
        Outcome::Skipped(SkipReason::WrongStep)
    );
    assert_eq!(
        wizard.generate().await.unwrap(),
        Outcome::Skipped(SkipReason::WrongStep)
    );
    assert_eq!(wizard.go_back(), Outcome::Skipped(SkipReason::WrongStep));
    assert_eq!(
        wizard.set_markdown("typed too early"),
        Outcome::Skipped(SkipReason::WrongStep)
    );
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert_eq!(enhancer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_text_skips_enhance_and_generate() {
    let enhancer = FakeEnhancer::echo();
    let synth = FakeSynthesizer::returning(vec![0; 2]);
    let (wizard, store) = wizard_in_edit("draft", enhancer.clone(), synth.clone());

    assert_eq!(wizard.set_markdown(""), Outcome::Applied);
    assert_eq!(store.get(MARKDOWN_KEY).unwrap(), None);
    assert_eq!(
        wizard.enhance().await.unwrap(),
        Outcome::Skipped(SkipReason::EmptyInput)
    );

    wizard.set_markdown("  \n\t ");
    assert_eq!(
        wizard.generate().await.unwrap(),
        Outcome::Skipped(SkipReason::EmptyInput)
    );
    assert_eq!(enhancer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
}

// ── Back / reset ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn go_back_drops_file_but_keeps_text() {
    let wizard = build(
        FakeExtractor::returning("Converted"),
        FakeEnhancer::echo(),
        FakeSynthesizer::returning(vec![0; 2]),
        Arc::new(MemoryStore::new()),
    );
    wizard.accept_file(pdf("a.pdf")).unwrap();
    wizard.convert().await.unwrap();

    assert_eq!(wizard.go_back(), Outcome::Applied);
    let state = wizard.snapshot();
    assert_eq!(state.step, Step::Upload);
    assert!(state.file.is_none());
    assert_eq!(state.markdown_text, "Converted");
}

#[tokio::test]
async fn reset_from_every_step_yields_empty_upload() {
    let store = Arc::new(MemoryStore::new());
    let wizard = build(
        FakeExtractor::returning("Text"),
        FakeEnhancer::echo(),
        FakeSynthesizer::returning(vec![0; 2]),
        store.clone(),
    );

    let assert_empty = |wizard: &Wizard| {
        let s = wizard.snapshot();
        assert_eq!(s.step, Step::Upload);
        assert!(s.file.is_none());
        assert!(s.markdown_text.is_empty());
        assert!(s.audio_resource.is_none());
        assert!(store.is_empty());
    };

    wizard.reset();
    assert_empty(&wizard);

    wizard.accept_file(pdf("a.pdf")).unwrap();
    wizard.reset();
    assert_empty(&wizard);

    wizard.accept_file(pdf("a.pdf")).unwrap();
    wizard.convert().await.unwrap();
    wizard.reset();
    assert_empty(&wizard);

    wizard.accept_file(pdf("a.pdf")).unwrap();
    wizard.convert().await.unwrap();
    wizard.generate().await.unwrap();
    assert_eq!(wizard.snapshot().step, Step::Play);
    wizard.reset();
    assert_empty(&wizard);
}

#[tokio::test]
async fn reset_during_generation_discards_the_result() {
    let synth = FakeSynthesizer::gated(vec![0; 4]);
    let (wizard, store) = wizard_in_edit("Some text", FakeEnhancer::echo(), synth.clone());

    let pending = {
        let wizard = wizard.clone();
        tokio::spawn(async move { wizard.generate().await })
    };
    synth.started.notified().await;

    wizard.reset();
    synth.release.notify_one();

    assert_eq!(
        pending.await.unwrap().unwrap(),
        Outcome::Skipped(SkipReason::Superseded)
    );
    let state = wizard.snapshot();
    assert_eq!(state.step, Step::Upload);
    assert_eq!(state.status, Status::Idle);
    assert!(state.audio_resource.is_none());
    assert!(store.is_empty());
}

#[tokio::test]
async fn reset_racing_the_audio_write_leaves_the_store_empty() {
    let store = Arc::new(ResetOnAudioWrite::default());
    store.inner.set(MARKDOWN_KEY, "Some text").unwrap();
    let wizard = build(
        FakeExtractor::returning("unused"),
        FakeEnhancer::echo(),
        FakeSynthesizer::returning(vec![0; 4]),
        store.clone(),
    );
    store.wizard.set(Arc::downgrade(&wizard)).ok();
    assert_eq!(wizard.snapshot().step, Step::Edit);

    assert_eq!(
        wizard.generate().await.unwrap(),
        Outcome::Skipped(SkipReason::Superseded)
    );
    assert!(store.fired.load(Ordering::SeqCst));
    let state = wizard.snapshot();
    assert_eq!(state.step, Step::Upload);
    assert!(state.audio_resource.is_none());
    assert_eq!(store.get(AUDIO_KEY).unwrap(), None);
    assert!(store.inner.is_empty());

    let restarted = build(
        FakeExtractor::returning("unused"),
        FakeEnhancer::echo(),
        FakeSynthesizer::returning(vec![0; 4]),
        store,
    );
    assert_eq!(restarted.snapshot().step, Step::Upload);
}

#[tokio::test]
async fn oversized_file_from_disk_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.pdf");
    let file = std::fs::File::create(&path).unwrap();
    std::io::Write::write_all(&mut &file, b"%PDF-1.5\n").unwrap();
    file.set_len(10 * 1024 * 1024 + 1).unwrap();
    drop(file);

    let wizard = build(
        FakeExtractor::returning("text"),
        FakeEnhancer::echo(),
        FakeSynthesizer::returning(vec![0; 2]),
        Arc::new(MemoryStore::new()),
    );
    let before = wizard.snapshot();

    let candidate = UploadedFile::from_path(&path, wizard.max_file_bytes())
        .await
        .unwrap();
    assert!(candidate.contents.is_empty());
    let err = wizard.accept_file(candidate).unwrap_err();
    assert!(matches!(
        err,
        NarratorError::Validation(ValidationError::TooLarge { .. })
    ));
    assert_eq!(wizard.snapshot(), before);
}

// ── Restore / subscribe ──────────────────────────────────────────────────────

#[tokio::test]
async fn restore_prefers_audio_then_markdown() {
    let store = Arc::new(MemoryStore::new());
    store.set(MARKDOWN_KEY, "Saved text").unwrap();
    store.set(AUDIO_KEY, "data:audio/wav;base64,UklGRg==").unwrap();
    let wizard = build(
        FakeExtractor::returning("x"),
        FakeEnhancer::echo(),
        FakeSynthesizer::returning(vec![0; 2]),
        store.clone(),
    );
    let state = wizard.snapshot();
    assert_eq!(state.step, Step::Play);
    assert_eq!(state.markdown_text, "Saved text");

    store.remove(AUDIO_KEY).unwrap();
    let wizard = build(
        FakeExtractor::returning("x"),
        FakeEnhancer::echo(),
        FakeSynthesizer::returning(vec![0; 2]),
        store,
    );
    assert_eq!(wizard.snapshot().step, Step::Edit);
}

#[tokio::test]
async fn file_store_session_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = NarratorConfig::default();
    let collaborators = || {
        Collaborators::new(
            FakeExtractor::returning("Persisted text"),
            FakeEnhancer::echo(),
            FakeSynthesizer::returning(vec![0; 2]),
        )
    };

    let first = Wizard::new(
        collaborators(),
        Arc::new(FileStore::in_dir(dir.path())),
        &config,
    );
    first.accept_file(pdf("a.pdf")).unwrap();
    first.convert().await.unwrap();
    drop(first);

    let second = Wizard::new(
        collaborators(),
        Arc::new(FileStore::in_dir(dir.path())),
        &config,
    );
    let state = second.snapshot();
    assert_eq!(state.step, Step::Edit);
    assert_eq!(state.markdown_text, "Persisted text");
    assert!(state.file.is_none());
}

#[tokio::test]
async fn subscribers_observe_status_changes() {
    let (wizard, _store) = wizard_in_edit(
        "Some text",
        FakeEnhancer::echo(),
        FakeSynthesizer::returning(vec![0; 2]),
    );
    let mut rx = wizard.subscribe();

    wizard.enhance().await.unwrap();
    assert!(rx.has_changed().unwrap());
    let latest = rx.borrow_and_update().clone();
    assert_eq!(latest.status, Status::Idle);
    assert_eq!(latest.step, Step::Edit);
}

// ── Encoder ──────────────────────────────────────────────────────────────────

#[test]
fn encoder_round_trip() {
    for n in [2usize, 480, 48_000] {
        let pcm: Vec<u8> = (0..n).map(|i| (i % 251) as u8).collect();
        let bytes = encode_wav(&pcm, &WavFormat::default()).unwrap();
        assert_eq!(bytes.len(), WAV_HEADER_LEN + n);

        let header = WavHeader::parse(&bytes).unwrap();
        assert_eq!(header.format.channels, 1);
        assert_eq!(header.format.sample_rate, 24_000);
        assert_eq!(header.format.sample_width, 2);
        assert_eq!(header.data_len as usize, n);
        assert_eq!(&bytes[WAV_HEADER_LEN..], &pcm[..]);
    }
}
