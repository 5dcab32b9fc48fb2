// src/extractors/normalize.rs

use once_cell::sync::Lazy;
use regex::Regex;

// --- Regex Patterns (Lazy Static) ---
// Hyphenated line break followed by a word character: "exam-\nple"
static HYPHEN_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-\n(\w)").expect("Failed to compile HYPHEN_BREAK_RE"));

static TRAILING_SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+\n").expect("Failed to compile TRAILING_SPACE_RE"));

static BLANK_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("Failed to compile BLANK_RUN_RE"));

static INLINE_SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("Failed to compile INLINE_SPACE_RE"));

/// Normalizes raw document text so heading patterns see consistent line structure.
///
/// Carriage returns become newlines, hyphenated line breaks are re-joined,
/// trailing blanks are dropped, blank-line runs collapse to one empty line and
/// runs of spaces/tabs collapse to a single space.
pub fn normalize_text(raw: &str) -> String {
    let text = raw.replace('\r', "\n");
    let text = HYPHEN_BREAK_RE.replace_all(&text, "$1");
    let text = TRAILING_SPACE_RE.replace_all(&text, "\n");
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n");
    let text = INLINE_SPACE_RE.replace_all(&text, " ");
    text.trim().to_string()
}
