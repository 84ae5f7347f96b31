//! Markdown and text handling shared by the parsers, the schema analyzer
//! and the indexer.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use serde_json::Value;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static UNDERSCORES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").expect("valid regex"));

/// Plain text derived from markdown that may embed HTML fragments.
///
/// Parses the fragment and collects text nodes; the regex fallback covers
/// input the HTML parser cannot make sense of.
#[must_use]
pub fn strip_html(markdown: &str) -> String {
    if !markdown.contains('<') {
        return markdown.to_string();
    }
    let fragment = Html::parse_fragment(markdown);
    let text: String = fragment
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    if text.trim().is_empty() {
        TAG_RE.replace_all(markdown, " ").to_string()
    } else {
        text
    }
}

/// Lowercased snake_case form of a header cell, "column" when nothing
/// survives cleaning.
#[must_use]
pub fn to_snake_case(text: &str) -> String {
    let cleaned = NON_WORD_RE.replace_all(text.trim(), "");
    let underscored = SPACE_RE.replace_all(&cleaned, "_");
    let collapsed = UNDERSCORES_RE.replace_all(&underscored, "_");
    let out = collapsed.trim_matches('_').to_lowercase();
    if out.is_empty() {
        "column".to_string()
    } else {
        out
    }
}

/// Strip currency and separator decoration from a numeric cell.
#[must_use]
pub fn clean_numeric(raw: &str) -> String {
    raw.replace([',', '$'], "").trim().to_string()
}

/// Parse a cell as a number when the cleaned string is fully numeric.
#[must_use]
pub fn parse_numeric_cell(raw: &str) -> Option<Value> {
    let cleaned = clean_numeric(raw);
    if cleaned.is_empty() {
        return None;
    }
    let body = cleaned.strip_prefix('-').unwrap_or(&cleaned);
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    if !body.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if cleaned.contains('.') {
        cleaned.parse::<f64>().ok().map(|f| serde_json::json!(f))
    } else {
        cleaned.parse::<i64>().ok().map(|i| serde_json::json!(i))
    }
}

/// Read a JSON value as f64, accepting decorated numeric strings.
#[must_use]
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = clean_numeric(s);
            if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("null") {
                None
            } else {
                cleaned.parse().ok()
            }
        }
        _ => None,
    }
}

/// Split text into chunks at paragraph boundaries, each roughly
/// `chunk_size` characters.
#[must_use]
pub fn chunk_paragraphs(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for para in text.split("\n\n") {
        if !current.is_empty() && current.len() + para.len() > chunk_size {
            chunks.push(std::mem::take(&mut current));
        }
        if current.is_empty() {
            current.push_str(para);
        } else {
            current.push_str("\n\n");
            current.push_str(para);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_html_tables_to_text() {
        let md = "<table><tr><td>City</td><td>County</td></tr></table>";
        let text = strip_html(md);
        assert!(text.contains("City"));
        assert!(text.contains("County"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn snake_cases_headers() {
        assert_eq!(to_snake_case("Total Assets"), "total_assets");
        assert_eq!(to_snake_case("  Cash & Cash Equivalents "), "cash_cash_equivalents");
        assert_eq!(to_snake_case("%$!"), "column");
    }

    #[test]
    fn numeric_cells_coerce_only_when_fully_numeric() {
        assert_eq!(parse_numeric_cell("$1,250"), Some(serde_json::json!(1250)));
        assert_eq!(parse_numeric_cell("3.5"), Some(serde_json::json!(3.5)));
        assert_eq!(parse_numeric_cell("-42"), Some(serde_json::json!(-42)));
        assert_eq!(parse_numeric_cell("Summit County"), None);
        assert_eq!(parse_numeric_cell(""), None);
    }

    #[test]
    fn paragraph_chunking_respects_boundaries() {
        let text = format!("{}\n\n{}\n\n{}", "a".repeat(600), "b".repeat(600), "c".repeat(100));
        let chunks = chunk_paragraphs(&text, 1000);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].contains('a'));
        assert!(chunks[1].starts_with('b'));
        assert!(chunks[1].contains('c'));
    }
}
