//! Sentence Splitter: Unicode-aware sentence boundaries with code-block and
//! heading protection.
//!
//! Splitting runs in four passes: isolate code spans behind placeholders,
//! pre-split on paragraph boundaries, pass Markdown headings through whole,
//! then apply UAX #29 sentence segmentation to whatever remains. Known,
//! accepted imprecision: abbreviations like "Mr." or "e.g." can produce short
//! fragments — the chunker's minimum-length filter absorbs these rather than
//! this module trying to special-case them.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

static FENCED_CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`\n]+`").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s").unwrap());

const PLACEHOLDER_PREFIX: &str = "\u{0}CODEBLOCK";

/// Split arbitrary text into an ordered sequence of sentences.
///
/// Empty or whitespace-only input yields an empty sequence.
pub fn split_sentences(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let (isolated, placeholders) = isolate_code_spans(text);

    let mut sentences = Vec::new();
    for paragraph in split_paragraphs(&isolated) {
        let trimmed = paragraph.trim();
        if trimmed.is_empty() {
            continue;
        }
        if HEADING.is_match(trimmed) {
            sentences.push(trimmed.to_string());
            continue;
        }
        for segment in trimmed.split_sentence_bounds() {
            let s = segment.trim();
            if !s.is_empty() {
                sentences.push(s.to_string());
            }
        }
    }

    sentences
        .into_iter()
        .map(|s| restore_placeholders(&s, &placeholders))
        .collect()
}

/// Replace fenced and inline code spans with single-token placeholders so
/// that sentence segmentation never splits inside a code span. Returns the
/// rewritten text and the placeholder → original-span table.
fn isolate_code_spans(text: &str) -> (String, Vec<String>) {
    let mut placeholders = Vec::new();

    let after_fenced = FENCED_CODE_BLOCK.replace_all(text, |caps: &regex::Captures| {
        placeholders.push(caps[0].to_string());
        format!("{}{}\u{0}", PLACEHOLDER_PREFIX, placeholders.len() - 1)
    });

    let after_inline = INLINE_CODE.replace_all(&after_fenced, |caps: &regex::Captures| {
        placeholders.push(caps[0].to_string());
        format!("{}{}\u{0}", PLACEHOLDER_PREFIX, placeholders.len() - 1)
    });

    (after_inline.into_owned(), placeholders)
}

fn restore_placeholders(sentence: &str, placeholders: &[String]) -> String {
    let mut out = sentence.to_string();
    for (i, original) in placeholders.iter().enumerate() {
        let token = format!("{}{}\u{0}", PLACEHOLDER_PREFIX, i);
        if out.contains(&token) {
            out = out.replace(&token, original);
        }
    }
    out
}

/// Split on blank-line boundaries and on newlines immediately preceding
/// non-whitespace, so each resulting paragraph can be segmented
/// independently.
///
/// A line whose first character is whitespace is a continuation of the
/// paragraph in progress (the newline before it does *not* precede
/// non-whitespace) and is joined onto it with a space; any other non-blank
/// line starts a new paragraph. This is what keeps e.g. a heading
/// immediately followed by body text on the next line (`"# Title\nBody"`,
/// no blank line between them) from being merged into one paragraph.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for line in text.split('\n') {
        if line.trim().is_empty() {
            if !current.trim().is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            continue;
        }

        let is_continuation = line.chars().next().map(|c| c.is_whitespace()).unwrap_or(false);
        if is_continuation && !current.is_empty() {
            current.push(' ');
            current.push_str(line);
        } else {
            if !current.trim().is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            current = line.to_string();
        }
    }
    if !current.trim().is_empty() {
        paragraphs.push(current);
    }

    if paragraphs.is_empty() {
        paragraphs.push(text.to_string());
    }

    paragraphs
}
