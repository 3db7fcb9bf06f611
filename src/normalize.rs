/// Canonicalizes text for evidence/fragment comparison: lower-cases, strips
/// everything that is not an ASCII letter, digit, or whitespace, and collapses
/// whitespace runs to single spaces. OCR output and model paraphrasing drift
/// in punctuation and casing; comparisons must not.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() {
            pending_space = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_lowercases() {
        assert_eq!(normalize("Net Sales Were $5,000,000!"), "net sales were 5000000");
    }

    #[test]
    fn collapses_whitespace_runs_and_trims() {
        assert_eq!(normalize("  a \t b\n\nc  "), "a b c");
    }

    #[test]
    fn drops_non_ascii_letters() {
        assert_eq!(normalize("naïve café"), "nave caf");
    }

    #[test]
    fn is_idempotent() {
        for input in ["", "  Mixed   CASE, text. ", "déjà-vu 42", "$5M (net)"] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn empty_and_symbol_only_inputs_normalize_to_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("$%^& ... !!"), "");
    }
}
