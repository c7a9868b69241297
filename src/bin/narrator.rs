//! CLI binary for pdf-narrator.
//!
//! Each invocation restores the wizard from the session directory, runs one
//! or more actions and prints where the wizard ended up.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_narrator::{
    wav, Collaborators, FileStore, NarratorConfig, Outcome, Step, UploadedFile, Wizard,
    WizardState,
};
use std::future::Future;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// File name the audio is exported under when `-o` is not given.
const DEFAULT_AUDIO_FILE: &str = "narratorai_audio.wav";

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Whole pipeline in one go
  narrator run paper.pdf --enhance -o paper.wav

  # Step by step
  narrator convert paper.pdf -o paper.md    # Upload → Edit
  $EDITOR paper.md
  narrator edit paper.md                    # replace the text with your edit
  narrator enhance                          # AI rewrite for narration
  narrator generate -o paper.wav            # Edit → Play

  # Where am I?
  narrator status
  narrator status --json

  # Start over
  narrator reset

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (speech synthesis)
  OPENAI_API_KEY          OpenAI API key (enhancement, default provider)
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Enhancement provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Enhancement model ID
  NARRATOR_SESSION_DIR    Where the session is kept between invocations
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
"#;

/// Turn PDF documents into narrated audio.
#[derive(Parser, Debug)]
#[command(
    name = "narrator",
    version,
    about = "Turn PDF documents into narrated audio",
    long_about = "Turn PDF documents into narrated audio: extract the text to Markdown, \
optionally rewrite it for listening with an LLM, and synthesize it to a WAV file with \
Gemini text-to-speech. Progress is kept in a session directory, so each step can be run \
as a separate command.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the session between invocations.
    #[arg(long, global = true, env = "NARRATOR_SESSION_DIR")]
    session_dir: Option<PathBuf>,

    /// LLM provider for enhancement: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID for enhancement.
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Gemini text-to-speech model.
    #[arg(long, global = true, env = "NARRATOR_TTS_MODEL")]
    tts_model: Option<String>,

    /// Prebuilt Gemini voice.
    #[arg(long, global = true, env = "NARRATOR_VOICE")]
    voice: Option<String>,

    /// Gemini API key for speech synthesis.
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Path to a text file with a custom enhancement prompt ({markdown} placeholder).
    #[arg(long, global = true, env = "NARRATOR_ENHANCE_PROMPT")]
    prompt_file: Option<PathBuf>,

    /// LLM temperature for enhancement (0.0–2.0).
    #[arg(long, global = true, env = "NARRATOR_TEMPERATURE")]
    temperature: Option<f32>,

    /// PDF user password for encrypted documents.
    #[arg(long, global = true, env = "NARRATOR_PDF_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Disable the spinner.
    #[arg(long, global = true, env = "NARRATOR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "NARRATOR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "NARRATOR_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PDF and convert it to Markdown (Upload → Edit).
    Convert {
        pdf: PathBuf,
        /// Also write the Markdown to this file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the Markdown with the contents of FILE ("-" for stdin).
    Edit { file: PathBuf },
    /// Rewrite the Markdown for narration with an LLM.
    Enhance,
    /// Synthesize the Markdown to audio (Edit → Play).
    Generate {
        /// Also write the WAV file here.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Start over and run the whole pipeline on a PDF.
    Run {
        pdf: PathBuf,
        /// Enhance the text before synthesis.
        #[arg(long)]
        enhance: bool,
        /// Where to write the WAV file.
        #[arg(short, long, default_value = DEFAULT_AUDIO_FILE)]
        output: PathBuf,
    },
    /// Show the current step, text statistics and audio.
    Status {
        /// Print the state as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the current Markdown to stdout.
    Show,
    /// Leave the Edit step and go back to Upload, keeping the text.
    Back,
    /// Clear the session and return to Upload.
    Reset,
    /// Write the generated audio to a WAV file.
    Export {
        #[arg(short, long, default_value = DEFAULT_AUDIO_FILE)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already says what is going on; keep INFO logs out of its way.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli).await?;
    let session_dir = cli
        .session_dir
        .clone()
        .unwrap_or_else(FileStore::default_dir);
    let store = FileStore::in_dir(&session_dir);
    tracing::debug!("Session file: {}", store.path().display());

    let collaborators =
        Collaborators::from_config(&config).context("Failed to set up collaborators")?;
    let wizard = Wizard::new(collaborators, Arc::new(store), &config);
    let ui = Ui {
        show_progress,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Convert { pdf, output } => {
            upload_and_convert(&wizard, &ui, &pdf).await?;
            if let Some(path) = output {
                let markdown = wizard.snapshot().markdown_text;
                write_atomic(&path, markdown.as_bytes()).await?;
                ui.note(&format!("Markdown written to {}", bold(&path.display().to_string())));
            }
        }
        Command::Edit { file } => {
            let text = read_text(&file).await?;
            require_applied(wizard.set_markdown(text), "edit")?;
        }
        Command::Enhance => {
            let outcome = ui.spin(&wizard, wizard.enhance()).await?;
            require_applied(outcome, "enhance")?;
        }
        Command::Generate { output } => {
            let outcome = ui.spin(&wizard, wizard.generate()).await?;
            require_applied(outcome, "generate")?;
            if let Some(path) = output {
                export_audio(&wizard.snapshot(), &path).await?;
                ui.note(&format!("Audio written to {}", bold(&path.display().to_string())));
            }
        }
        Command::Run {
            pdf,
            enhance,
            output,
        } => {
            wizard.reset();
            upload_and_convert(&wizard, &ui, &pdf).await?;
            if enhance {
                let outcome = ui.spin(&wizard, wizard.enhance()).await?;
                require_applied(outcome, "enhance")?;
            }
            let outcome = ui.spin(&wizard, wizard.generate()).await?;
            require_applied(outcome, "generate")?;
            export_audio(&wizard.snapshot(), &output).await?;
            ui.note(&format!("Audio written to {}", bold(&output.display().to_string())));
        }
        Command::Status { json } => {
            let state = wizard.snapshot();
            if json {
                println!("{}", status_json(&state)?);
            } else {
                print_status(&state, &session_dir);
            }
            return Ok(());
        }
        Command::Show => {
            let state = wizard.snapshot();
            if state.markdown_text.is_empty() {
                bail!("There is no text yet; run `narrator convert <PDF>` first");
            }
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(state.markdown_text.as_bytes())
                .context("Failed to write to stdout")?;
            if !state.markdown_text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
            return Ok(());
        }
        Command::Back => {
            require_applied(wizard.go_back(), "back")?;
        }
        Command::Reset => wizard.reset(),
        Command::Export { output } => {
            export_audio(&wizard.snapshot(), &output).await?;
            ui.note(&format!("Audio written to {}", bold(&output.display().to_string())));
            return Ok(());
        }
    }

    ui.step(&wizard.snapshot());
    Ok(())
}

// ── Terminal output ─────────────────────────────────────────────────────────

struct Ui {
    show_progress: bool,
    quiet: bool,
}

impl Ui {
    /// Await `action` while a spinner mirrors the wizard's status message.
    async fn spin<F: Future>(&self, wizard: &Wizard, action: F) -> F::Output {
        if !self.show_progress {
            return action.await;
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.enable_steady_tick(Duration::from_millis(80));

        let mut rx = wizard.subscribe();
        let watcher = {
            let bar = bar.clone();
            tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let message = {
                        let state = rx.borrow_and_update();
                        state
                            .status
                            .is_busy()
                            .then(|| state.status_message.clone())
                    };
                    if let Some(message) = message {
                        bar.set_message(message);
                    }
                }
            })
        };

        let out = action.await;
        watcher.abort();
        bar.finish_and_clear();
        out
    }

    fn note(&self, line: &str) {
        if !self.quiet {
            eprintln!("{} {}", green("✔"), line);
        }
    }

    fn step(&self, state: &WizardState) {
        if self.quiet {
            return;
        }
        eprintln!("{} {}", green("◆"), bold(state.step.title()));
        eprintln!("  {}", dim(state.step.description()));
        if state.step == Step::Edit {
            let stats = state.text_stats();
            eprintln!(
                "  {}",
                dim(&format!(
                    "{} words · ~{} min narration",
                    stats.words, stats.estimated_minutes
                ))
            );
        }
    }
}

fn print_status(state: &WizardState, session_dir: &Path) {
    println!("Step:         {} ({})", state.step, state.step.title());
    if let Some(ref file) = state.file {
        println!("File:         {} ({:.2} MiB)", file.name, file.size_mib());
    }
    let stats = state.text_stats();
    println!("Words:        {}", stats.words);
    println!("Characters:   {}", stats.chars);
    println!("Narration:    ~{} min", stats.estimated_minutes);
    match state.audio_resource.as_deref().map(wav::decode_data_uri) {
        Some(Ok(bytes)) => match wav::WavHeader::parse(&bytes) {
            Ok(header) => println!(
                "Audio:        {} bytes, {} Hz, {} ch, {}-bit",
                bytes.len(),
                header.format.sample_rate,
                header.format.channels,
                header.format.bits_per_sample()
            ),
            Err(e) => println!("Audio:        {}", yellow(&e.to_string())),
        },
        Some(Err(e)) => println!("Audio:        {}", yellow(&e.to_string())),
        None => println!("Audio:        none"),
    }
    println!("Session:      {}", session_dir.display());
}

/// Snapshot for `status --json`; the audio URI is summarised, not dumped.
fn status_json(state: &WizardState) -> Result<String> {
    let mut value = serde_json::to_value(state).context("Failed to serialise state")?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "audio_resource".into(),
            serde_json::json!(state.audio_resource.as_ref().map(|uri| uri.len())),
        );
        obj.insert(
            "text_stats".into(),
            serde_json::to_value(state.text_stats()).context("Failed to serialise stats")?,
        );
    }
    serde_json::to_string_pretty(&value).context("Failed to serialise state")
}

// ── Actions ─────────────────────────────────────────────────────────────────

/// Accept `pdf` as the upload and convert it. From Edit, the old text is
/// left behind first; from Play the session has to be reset explicitly.
async fn upload_and_convert(wizard: &Wizard, ui: &Ui, pdf: &Path) -> Result<()> {
    match wizard.snapshot().step {
        Step::Upload => {}
        Step::Edit => {
            wizard.go_back();
        }
        Step::Play => bail!("Audio has already been generated; run `narrator reset` first"),
    }

    let file = UploadedFile::from_path(pdf, wizard.max_file_bytes())
        .await
        .with_context(|| format!("Failed to read {}", pdf.display()))?;
    wizard.accept_file(file)?;

    let outcome = ui.spin(wizard, wizard.convert()).await?;
    require_applied(outcome, "convert")
}

fn require_applied(outcome: Outcome, action: &str) -> Result<()> {
    match outcome {
        Outcome::Applied => Ok(()),
        Outcome::Skipped(reason) => bail!("Nothing to {action}: {reason}"),
    }
}

async fn read_text(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        return tokio::task::spawn_blocking(|| {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).map(|_| buf)
        })
        .await
        .context("stdin reader panicked")?
        .context("Failed to read stdin");
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn export_audio(state: &WizardState, path: &Path) -> Result<()> {
    let Some(uri) = state.audio_resource.as_deref() else {
        bail!("No audio yet; run `narrator generate` first");
    };
    let bytes = wav::decode_data_uri(uri).context("Stored audio is not a WAV data URI")?;
    write_atomic(path, &bytes).await
}

/// Write via a sibling temp file and rename, so readers never see a partial file.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to move output into {}", path.display()))
}

/// Map CLI args to `NarratorConfig`.
async fn build_config(cli: &Cli) -> Result<NarratorConfig> {
    let mut builder = NarratorConfig::builder();

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref tts_model) = cli.tts_model {
        builder = builder.tts_model(tts_model);
    }
    if let Some(ref voice) = cli.voice {
        builder = builder.voice(voice);
    }
    if let Some(ref key) = cli.gemini_api_key {
        builder = builder.tts_api_key(key);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(ref password) = cli.password {
        builder = builder.pdf_password(password);
    }
    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read enhancement prompt from {:?}", path))?;
        builder = builder.enhance_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}
