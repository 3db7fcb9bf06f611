use crate::models::EvidenceSpan;
use crate::normalize::normalize;

/// Normalized fragments shorter than this can never match; highlighting stray
/// punctuation or single letters is worse than highlighting nothing.
const MIN_FRAGMENT_CHARS: usize = 3;

/// Tokens shorter than this are unreliable noise for the token criterion.
const MIN_TOKEN_CHARS: usize = 4;

/// Decides whether one renderable text fragment on the active page belongs to
/// the latest answer's evidence. Deliberately a cheap substring/token
/// heuristic rather than edit distance: it runs once per fragment per render
/// and must stay O(fragments x spans x tokens) with small constants.
pub fn is_fragment_highlighted(
    fragment: &str,
    active_page: u32,
    spans: &[EvidenceSpan],
) -> bool {
    let fragment_norm = normalize(fragment);
    if fragment_norm.len() < MIN_FRAGMENT_CHARS {
        return false;
    }

    spans
        .iter()
        .filter(|span| span.page_number.map_or(true, |page| page == active_page))
        .any(|span| span_matches(&fragment_norm, &normalize(&span.quoted_text)))
}

fn span_matches(fragment_norm: &str, span_norm: &str) -> bool {
    if span_norm.is_empty() {
        return false;
    }

    // Rendering splits page text into arbitrary runs, so the fragment is often
    // a strict sub- or super-string of the quoted evidence.
    if span_norm.contains(fragment_norm) || fragment_norm.contains(span_norm) {
        return true;
    }

    let fragment_tokens = qualifying_tokens(fragment_norm);
    if fragment_tokens.is_empty() {
        // A fragment made only of short words must not match vacuously.
        return false;
    }
    let span_tokens = qualifying_tokens(span_norm);
    if span_tokens.is_empty() {
        return false;
    }

    fragment_tokens.iter().all(|fragment_token| {
        span_tokens
            .iter()
            .any(|span_token| span_token.contains(fragment_token) || fragment_token.contains(span_token))
    })
}

/// Tokens the containment test may rely on. Purely numeric tokens are excluded
/// along with short ones: OCR and the model reformat figures ($5M versus
/// 5,000,000) too aggressively for containment to be meaningful.
fn qualifying_tokens(normalized: &str) -> Vec<&str> {
    normalized
        .split_whitespace()
        .filter(|token| token.len() >= MIN_TOKEN_CHARS)
        .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

/// Memoized highlight predicate for one rendered page, keyed explicitly by
/// `(evidence_version, page)` so callers can test staleness instead of relying
/// on implicit change detection.
#[derive(Debug, Clone)]
pub struct HighlightMap {
    version: u64,
    page: u32,
    flags: Vec<bool>,
}

impl HighlightMap {
    pub fn build(
        version: u64,
        page: u32,
        fragments: &[String],
        spans: &[EvidenceSpan],
    ) -> Self {
        let flags = fragments
            .iter()
            .map(|fragment| is_fragment_highlighted(fragment, page, spans))
            .collect();
        Self {
            version,
            page,
            flags,
        }
    }

    /// True while the map still describes the given evidence set and page.
    pub fn is_current(&self, version: u64, page: u32) -> bool {
        self.version == version && self.page == page
    }

    pub fn is_highlighted(&self, fragment_index: usize) -> bool {
        self.flags.get(fragment_index).copied().unwrap_or(false)
    }

    pub fn highlighted_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.flags
            .iter()
            .enumerate()
            .filter_map(|(index, flag)| flag.then_some(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, page: Option<u32>) -> EvidenceSpan {
        EvidenceSpan {
            quoted_text: text.to_string(),
            page_number: page,
        }
    }

    #[test]
    fn ocr_noisy_fragment_matches_quoted_evidence() {
        let spans = vec![span("Net sales were $5M", Some(3))];
        assert!(is_fragment_highlighted(
            "Net Sales Were $5,000,000",
            3,
            &spans
        ));
    }

    #[test]
    fn short_words_never_highlight() {
        let spans = vec![span("Net sales were $5M", Some(3))];
        assert!(!is_fragment_highlighted("the", 3, &spans));
        assert!(!is_fragment_highlighted("a.", 3, &spans));
    }

    #[test]
    fn fragment_substring_of_span_matches() {
        let spans = vec![span("total revenue increased by twelve percent", None)];
        assert!(is_fragment_highlighted("revenue increased", 1, &spans));
    }

    #[test]
    fn span_substring_of_fragment_matches() {
        let spans = vec![span("twelve percent", None)];
        assert!(is_fragment_highlighted(
            "Total revenue increased by twelve percent in Q3.",
            5,
            &spans
        ));
    }

    #[test]
    fn page_constraint_filters_spans() {
        let spans = vec![span("quarterly earnings report", Some(4))];
        assert!(is_fragment_highlighted("quarterly earnings", 4, &spans));
        assert!(!is_fragment_highlighted("quarterly earnings", 5, &spans));
    }

    #[test]
    fn unpinned_span_matches_on_any_page() {
        let spans = vec![span("quarterly earnings report", None)];
        assert!(is_fragment_highlighted("quarterly earnings", 1, &spans));
        assert!(is_fragment_highlighted("quarterly earnings", 9, &spans));
    }

    #[test]
    fn unrelated_fragment_does_not_match() {
        let spans = vec![span("Net sales were $5M", Some(3))];
        assert!(!is_fragment_highlighted("board of directors meeting", 3, &spans));
    }

    #[test]
    fn fragment_of_only_short_tokens_cannot_fire_token_criterion() {
        // Every token is under four chars and the substring criterion fails,
        // so nothing should highlight.
        let spans = vec![span("the big cat ran far", None)];
        assert!(!is_fragment_highlighted("far ran big", 1, &spans));
    }

    #[test]
    fn empty_span_text_never_matches() {
        let spans = vec![span("   ", None)];
        assert!(!is_fragment_highlighted("anything at all", 1, &spans));
    }

    #[test]
    fn highlight_map_is_keyed_by_version_and_page() {
        let spans = vec![span("net sales", Some(2))];
        let fragments = vec!["Net sales".to_string(), "unrelated".to_string()];
        let map = HighlightMap::build(7, 2, &fragments, &spans);

        assert!(map.is_current(7, 2));
        assert!(!map.is_current(8, 2));
        assert!(!map.is_current(7, 3));
        assert!(map.is_highlighted(0));
        assert!(!map.is_highlighted(1));
        assert!(!map.is_highlighted(99));
        assert_eq!(map.highlighted_indices().collect::<Vec<_>>(), vec![0]);
    }
}
