use regex::Regex;

use crate::models::EvidenceSpan;

/// Tolerant grammar for the evidence markers the model is instructed to emit:
/// `<<highlight page=N>> quoted text <</highlight>>`. Models drift on the
/// bracket counts, so the opening tag accepts two or more angle brackets on
/// each side, the `page=N` attribute is optional, and the closing tag accepts
/// `<</highlight>>` as well as `</highlight>>` with any trailing brackets.
/// The body match is non-greedy: each opening marker pairs with the nearest
/// closing marker.
fn marker_regex() -> Regex {
    Regex::new(r"(?s)<{2,}\s*highlight(?:\s+page=(\d+))?\s*>{2,}(.*?)<+/\s*highlight\s*>+")
        .unwrap_or_else(|_| Regex::new("^$").unwrap())
}

/// Extracts evidence spans in first-occurrence order. Whitespace-only
/// interiors yield nothing; a non-numeric or missing page attribute leaves
/// the span unpinned.
pub fn extract_evidence(answer: &str) -> Vec<EvidenceSpan> {
    let re = marker_regex();
    let mut spans = Vec::new();

    for caps in re.captures_iter(answer) {
        let interior = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        if interior.is_empty() {
            continue;
        }
        let page_number = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        spans.push(EvidenceSpan {
            quoted_text: interior.to_string(),
            page_number,
        });
    }

    spans
}

/// Produces the user-facing answer text: every recognized marker becomes a
/// Markdown block quote, labeled `**Page N:**` when the page attribute was
/// present. Marker-like text that never closes is left verbatim rather than
/// silently deleted.
pub fn strip_markers(answer: &str) -> String {
    let re = marker_regex();
    re.replace_all(answer, |caps: &regex::Captures| {
        let interior = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        if interior.is_empty() {
            return String::new();
        }
        match caps.get(1) {
            Some(page) => format!("\n\n> **Page {}:** {}\n\n", page.as_str(), interior),
            None => format!("\n\n> {interior}\n\n"),
        }
    })
    .into_owned()
}
