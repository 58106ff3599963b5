//! Title Extractor: per-format display title derivation.
//!
//! The extracted title is strictly cosmetic — it is surfaced to callers for
//! display and never influences chunking, embedding, or ranking. Every
//! format's precedence chain bottoms out at a filename-derived title, so
//! extraction never fails.

use once_cell::sync::Lazy;
use regex::Regex;

static MARKDOWN_H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#\s+(.+)$").unwrap());
static FRONTMATTER_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^title:\s*["']?(.+?)["']?\s*$"#).unwrap());
static FRONTMATTER_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^---\n(.*?)\n---").unwrap());

/// Where a title ultimately came from, kept for telemetry only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSource {
    Metadata,
    Content,
    Filename,
}

#[derive(Debug, Clone)]
pub struct TitleResult {
    pub title: String,
    pub source: TitleSource,
}

/// Strip the final extension and replace `-`/`_` with spaces.
pub fn derive_filename_title(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    };
    stem.chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect()
}

fn filename_fallback(file_name: &str) -> TitleResult {
    TitleResult {
        title: derive_filename_title(file_name),
        source: TitleSource::Filename,
    }
}

/// Markdown: YAML frontmatter `title:` → first `# H1` → filename.
pub fn extract_markdown_title(content: &str, file_name: &str) -> TitleResult {
    if let Some(block) = FRONTMATTER_BLOCK.captures(content) {
        if let Some(title) = FRONTMATTER_TITLE.captures(&block[1]) {
            let t = title[1].trim();
            if !t.is_empty() {
                return TitleResult {
                    title: t.to_string(),
                    source: TitleSource::Metadata,
                };
            }
        }
    }

    if let Some(h1) = MARKDOWN_H1.captures(content) {
        let t = h1[1].trim();
        if !t.is_empty() {
            return TitleResult {
                title: t.to_string(),
                source: TitleSource::Content,
            };
        }
    }

    filename_fallback(file_name)
}

/// Plain text: first non-empty line, but only if it is followed by a blank
/// line (otherwise it's ordinary running prose, not a title) → filename.
pub fn extract_plain_text_title(content: &str, file_name: &str) -> TitleResult {
    let lines: Vec<&str> = content.lines().collect();
    if let Some(first_idx) = lines.iter().position(|l| !l.trim().is_empty()) {
        if let Some(next) = lines.get(first_idx + 1) {
            if next.trim().is_empty() {
                return TitleResult {
                    title: lines[first_idx].trim().to_string(),
                    source: TitleSource::Content,
                };
            }
        }
    }
    filename_fallback(file_name)
}

/// HTML: readability-provided title (trimmed) → filename.
pub fn extract_html_title(readability_title: Option<&str>, file_name: &str) -> TitleResult {
    if let Some(t) = readability_title.map(|t| t.trim()) {
        if !t.is_empty() {
            return TitleResult {
                title: t.to_string(),
                source: TitleSource::Metadata,
            };
        }
    }
    filename_fallback(file_name)
}

/// PDF: `/Title` metadata (rejected if empty/whitespace or containing a path
/// separator) → largest-font text on page 1 → filename.
pub fn extract_pdf_title(
    metadata_title: Option<&str>,
    largest_font_text_page1: Option<&str>,
    file_name: &str,
) -> TitleResult {
    if let Some(t) = metadata_title {
        let trimmed = t.trim();
        if !trimmed.is_empty() && !trimmed.contains('/') && !trimmed.contains('\\') {
            return TitleResult {
                title: trimmed.to_string(),
                source: TitleSource::Metadata,
            };
        }
    }

    if let Some(t) = largest_font_text_page1.map(|t| t.trim()) {
        if !t.is_empty() {
            return TitleResult {
                title: t.to_string(),
                source: TitleSource::Content,
            };
        }
    }

    filename_fallback(file_name)
}

/// DOCX: first `<h1>` in the mammoth-equivalent HTML output → filename.
pub fn extract_docx_title(first_h1: Option<&str>, file_name: &str) -> TitleResult {
    if let Some(t) = first_h1.map(|t| t.trim()) {
        if !t.is_empty() {
            return TitleResult {
                title: t.to_string(),
                source: TitleSource::Content,
            };
        }
    }
    filename_fallback(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_title_strips_extension_and_separators() {
        assert_eq!(derive_filename_title("my-doc_name.md"), "my doc name");
        assert_eq!(derive_filename_title("noext"), "noext");
    }

    #[test]
    fn markdown_prefers_frontmatter_over_h1() {
        let content = "---\ntitle: Frontmatter Title\n---\n\n# H1 Title\n\nbody";
        let result = extract_markdown_title(content, "doc.md");
        assert_eq!(result.title, "Frontmatter Title");
        assert_eq!(result.source, TitleSource::Metadata);
    }

    #[test]
    fn markdown_falls_back_to_h1() {
        let content = "# The Real Title\n\nSome body text.";
        let result = extract_markdown_title(content, "doc.md");
        assert_eq!(result.title, "The Real Title");
        assert_eq!(result.source, TitleSource::Content);
    }

    #[test]
    fn markdown_falls_back_to_filename() {
        let result = extract_markdown_title("just a paragraph, no heading", "my-doc.md");
        assert_eq!(result.title, "my doc");
        assert_eq!(result.source, TitleSource::Filename);
    }

    #[test]
    fn plain_text_requires_blank_line_after_first() {
        let with_blank = "Title Line\n\nBody text.";
        let result = extract_plain_text_title(with_blank, "notes.txt");
        assert_eq!(result.title, "Title Line");

        let without_blank = "Not a title\njust flows into body.";
        let result = extract_plain_text_title(without_blank, "notes.txt");
        assert_eq!(result.source, TitleSource::Filename);
    }

    #[test]
    fn pdf_title_rejects_path_like_metadata() {
        let result = extract_pdf_title(Some("C:\\bad\\title"), Some("Big Font Heading"), "x.pdf");
        assert_eq!(result.title, "Big Font Heading");
        assert_eq!(result.source, TitleSource::Content);
    }

    #[test]
    fn pdf_title_rejects_blank_metadata() {
        let result = extract_pdf_title(Some("   "), None, "report-final.pdf");
        assert_eq!(result.title, "report final");
        assert_eq!(result.source, TitleSource::Filename);
    }
}
