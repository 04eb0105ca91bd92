//! Response sanitising: recover the useful payload from raw oracle text.
//!
//! ## Why is sanitising necessary?
//!
//! Even firmly-prompted oracles wrap output in artefacts that are
//! *semantically correct* from the model's perspective but break a strict
//! parser — for example:
//!
//! - Wrapping JSON in ` ```json ... ``` ` fences despite the prompt saying
//!   "no code blocks"
//! - Prefacing the object with "Here is the extracted information:"
//! - Trailing an apology or a summary sentence after the closing brace
//!
//! The rules here are cheap, deterministic string operations that isolate
//! the payload without touching its content. When no payload can be found
//! the input passes through unchanged — the caller's parse then fails
//! explicitly and is handled as a JSON-recovery error, never silently.

use once_cell::sync::Lazy;
use regex::Regex;

// ── JSON payload isolation ───────────────────────────────────────────────

static RE_JSON_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```json\s*").unwrap());
static RE_BARE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\s*").unwrap());

/// Isolate the substring most likely to be the JSON payload.
///
/// Removes fence markers (with or without a language tag), trims, then
/// slices from the first `{` to the last `}` inclusive. If no brace pair
/// exists, the trimmed text is returned unchanged so the caller can fail
/// its parse explicitly.
pub fn extract_json_payload(raw: &str) -> String {
    let text = RE_JSON_FENCE.replace_all(raw, "");
    let text = RE_BARE_FENCE.replace_all(&text, "");
    let text = text.trim();

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start <= end => text[start..=end].to_string(),
        _ => text.to_string(),
    }
}

// ── Markdown transcription cleanup ───────────────────────────────────────

static RE_MARKDOWN_FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^```markdown\s*").unwrap());
static RE_MARKDOWN_FENCE_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^```\s*$").unwrap());

/// Clean a markdown-task response: drop wrapper fences, trim whitespace.
///
/// The transcription content itself is left untouched — fenced code blocks
/// *inside* the document survive because only a bare ``` on its own line or
/// a leading ```markdown marker is a wrapper artefact.
pub fn clean_markdown_response(raw: &str) -> String {
    let text = RE_MARKDOWN_FENCE_OPEN.replace_all(raw, "");
    let text = RE_MARKDOWN_FENCE_BARE.replace_all(&text, "");
    text.trim().to_string()
}
