use regex::Regex;

use crate::models::EvidenceSpan;

/// Seam to the document renderer: per page, an enumerable set of renderable
/// text fragments the correlator can test against.
pub trait TextLayer {
    fn page_count(&self) -> u32;
    fn page_fragments(&self, page: u32) -> Vec<String>;
}

/// The viewer's position within the document. Pages are 1-indexed and
/// navigation is bounded to `[1, page_count]`; out-of-range requests are
/// ignored rather than clamped so a bad evidence page never moves the viewer.
#[derive(Debug, Clone)]
pub struct DocumentView {
    page_count: u32,
    current_page: u32,
}

impl DocumentView {
    pub fn new(page_count: u32) -> Self {
        Self {
            page_count: page_count.max(1),
            current_page: 1,
        }
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn next_page(&mut self) {
        if self.current_page < self.page_count {
            self.current_page += 1;
        }
    }

    pub fn prev_page(&mut self) {
        if self.current_page > 1 {
            self.current_page -= 1;
        }
    }

    pub fn goto(&mut self, page: u32) {
        if (1..=self.page_count).contains(&page) {
            self.current_page = page;
        }
    }

    /// Navigation policy for freshly correlated evidence: jump to the page of
    /// the first span (in extraction order) that carries one; stay put when
    /// none does. Returns the page actually navigated to.
    pub fn jump_to_evidence(&mut self, spans: &[EvidenceSpan]) -> Option<u32> {
        let target = first_evidence_page(spans)?;
        self.goto(target);
        (self.current_page == target).then_some(target)
    }
}

pub fn first_evidence_page(spans: &[EvidenceSpan]) -> Option<u32> {
    spans.iter().find_map(|span| span.page_number)
}

/// Text layer backed by the OCR pipeline's plain-text output: `[Page N]`
/// headers followed by that page's text, one fragment per non-empty line.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pages: Vec<Vec<String>>,
}

impl ExtractedText {
    pub fn parse(raw: &str) -> Self {
        let header =
            Regex::new(r"^\s*\[Page\s+(\d+)\]\s*$").unwrap_or_else(|_| Regex::new("^$").unwrap());

        let mut pages: Vec<Vec<String>> = Vec::new();
        let mut current: Option<usize> = None;

        for line in raw.lines() {
            if let Some(caps) = header.captures(line) {
                if let Some(number) = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) {
                    if number >= 1 {
                        if pages.len() < number {
                            pages.resize_with(number, Vec::new);
                        }
                        current = Some(number - 1);
                        continue;
                    }
                }
            }

            let Some(index) = current else {
                continue;
            };
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                pages[index].push(trimmed.to_string());
            }
        }

        if pages.is_empty() {
            pages.push(Vec::new());
        }
        Self { pages }
    }
}

impl TextLayer for ExtractedText {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_fragments(&self, page: u32) -> Vec<String> {
        if page < 1 {
            return Vec::new();
        }
        self.pages
            .get((page - 1) as usize)
            .cloned()
            .unwrap_or_default()
    }
}
