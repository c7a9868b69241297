//! Deterministic cleanup of collaborator text.
//!
//! Two inputs need tidying before they reach the editor:
//!
//! - pdfium's text layer, which arrives with CRLF line endings, form feeds
//!   between pages, trailing spaces on every line and long runs of blank lines;
//! - LLM replies, which occasionally wrap the whole answer in a
//!   ```` ```markdown ```` fence despite the prompt saying not to.
//!
//! Every rule is a pure `&str → String` pass so it can be tested on its own.

use once_cell::sync::Lazy;
use regex::Regex;

/// Tidy the raw pdfium text layer.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF) and form feeds to blank lines
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to one blank line
/// 5. Ensure the text ends with exactly one newline (empty stays empty)
pub fn clean_extracted_text(input: &str) -> String {
    let s = normalise_line_endings(input).replace('\u{000C}', "\n\n");
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

/// Tidy an LLM enhancement reply.
///
/// Strips an outer fence, normalises line endings and invisible characters.
/// Surrounding whitespace is trimmed only together with a fence, so a reply
/// identical to cleaned input (trailing newline included) comes back identical.
pub fn clean_enhanced_markdown(input: &str) -> String {
    let unfenced = strip_markdown_fences(input);
    let fenced = unfenced != input;
    let s = normalise_line_endings(&unfenced);
    let s = remove_invisible_chars(&s);
    if fenced {
        s.trim().to_string()
    } else {
        s
    }
}

// ── Rule: Strip outer markdown fences ────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule: Normalise line endings ─────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule: Trim trailing whitespace per line ──────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule: Collapse excessive blank lines ─────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule: Remove invisible Unicode characters ────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule: Ensure single final newline ────────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
