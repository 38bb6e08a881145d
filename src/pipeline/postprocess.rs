//! Post-processing: deterministic cleanup of OCR text.
//!
//! OCR output is faithful but noisy in predictable ways: CRLF line endings,
//! zero-width characters picked up from the PDF text layer, trailing spaces,
//! runs of blank lines where the page had whitespace, and (for non-Latin
//! books) stray Latin fragments read off page furniture. Each rule is a pure
//! `&str → String` pass; they run in a fixed order:
//!
//! 1. Normalise line endings (CRLF/CR → LF)
//! 2. Strip invisible Unicode (ZWSP, BOM, soft hyphen, ZWNJ/ZWJ, word joiner)
//! 3. Trim trailing whitespace per line
//! 4. Optionally keep only lines matching the configured filter
//! 5. Collapse 4+ consecutive newlines down to 3
//! 6. Trim, and end non-empty text with exactly one newline
//!
//! Text that is empty after cleaning is treated as "no text" by the caller.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to one page of OCR text.
pub fn clean_text(input: &str, line_filter: Option<&Regex>) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = match line_filter {
        Some(re) => retain_matching_lines(&s, re),
        None => s,
    };
    let s = collapse_blank_lines(&s);
    finish(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Keep lines matching a script/pattern filter ──────────────────────
//
// Blank lines survive so paragraph breaks are kept; rule 5 tidies the gaps
// left by dropped lines.

fn retain_matching_lines(input: &str, re: &Regex) -> String {
    input
        .lines()
        .filter(|line| line.trim().is_empty() || re.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 6: Trim and terminate ───────────────────────────────────────────────

fn finish(input: &str) -> String {
    let trimmed = input.trim_matches(|c: char| c == '\n' || c.is_whitespace());
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ARABIC_SCRIPT_PATTERN;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  hello   \nworld  "),
            "  hello\nworld"
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_retain_arabic_script_lines() {
        let re = Regex::new(ARABIC_SCRIPT_PATTERN).unwrap();
        let input = "باب اول\nPage 12 ~~ scan\n\nیہ کتاب ہے\n|||";
        assert_eq!(retain_matching_lines(input, &re), "باب اول\n\nیہ کتاب ہے");
    }

    #[test]
    fn test_finish() {
        assert_eq!(finish("hello"), "hello\n");
        assert_eq!(finish("\n\nhello\n\n\n"), "hello\n");
        assert_eq!(finish("  \n \n"), "");
    }

    #[test]
    fn test_clean_text_full_pipeline() {
        let input = "Title\r\n\r\nSome text   \n\n\n\n\n\nMore\u{200B} text\r\n";
        let result = clean_text(input, None);
        assert_eq!(result, "Title\n\nSome text\n\n\nMore text\n");
    }

    #[test]
    fn test_clean_text_filtered_to_nothing() {
        let re = Regex::new(ARABIC_SCRIPT_PATTERN).unwrap();
        assert_eq!(clean_text("12\nISBN 978-0\n", Some(&re)), "");
    }
}
