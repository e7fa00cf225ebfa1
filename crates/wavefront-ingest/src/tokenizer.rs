// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Whitespace tokenizer that keeps quoted spans intact.
//!
//! ```text
//! docker.n.images 30 1496156870 engine_host="fib r10"
//! |-------------| || |--------| |-------------------|
//! ```
//!
//! A span opened by any Unicode quotation mark is closed only by the same
//! character. Differing quote characters inside an open span are plain
//! text. Quote characters are kept in the emitted tokens.

use regex::Regex;

/// Characters carrying the Unicode `Quotation_Mark` property.
pub const QUOTATION_MARKS: &[char] = &[
    '\u{0022}', '\u{0027}', '\u{00AB}', '\u{00BB}', '\u{2018}', '\u{2019}', '\u{201A}',
    '\u{201B}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201F}', '\u{2039}', '\u{203A}',
    '\u{2E42}', '\u{300C}', '\u{300D}', '\u{300E}', '\u{300F}', '\u{301D}', '\u{301E}',
    '\u{301F}', '\u{FE41}', '\u{FE42}', '\u{FE43}', '\u{FE44}', '\u{FF02}', '\u{FF07}',
    '\u{FF62}', '\u{FF63}',
];

/// Check whether `c` is a Unicode quotation mark.
#[inline]
pub fn is_quotation_mark(c: char) -> bool {
    QUOTATION_MARKS.contains(&c)
}

/// Line tokenizer.
///
/// Holds the compiled whitespace pattern so it is built once per pipeline
/// rather than once per line.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    blanks: Regex,
}

impl Tokenizer {
    /// Create a tokenizer.
    pub fn new() -> Self {
        Self {
            blanks: Regex::new(r"[ \t]+").expect("constant pattern compiles"),
        }
    }

    /// Split a raw line into tokens.
    ///
    /// Runs of spaces and tabs collapse to one space first, then the line
    /// is split on whitespace outside quoted spans. No token is empty.
    pub fn tokenize(&self, line: &str) -> Vec<String> {
        let collapsed = self.blanks.replace_all(line, " ");
        split_outside_quotes(collapsed.trim())
            .into_iter()
            .map(str::to_owned)
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `s` on whitespace, except inside matching quote pairs.
pub fn split_outside_quotes(s: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut open_quote: Option<char> = None;
    let mut start: Option<usize> = None;

    for (i, c) in s.char_indices() {
        let separator = match open_quote {
            Some(q) if c == q => {
                open_quote = None;
                false
            }
            Some(_) => false,
            None if is_quotation_mark(c) => {
                open_quote = Some(c);
                false
            }
            None => c.is_whitespace(),
        };

        if separator {
            if let Some(begin) = start.take() {
                tokens.push(&s[begin..i]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }

    if let Some(begin) = start {
        tokens.push(&s[begin..]);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_full_line() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize(
            r#"docker.n.images 30 1496156870 engine_host="fib-r10-u05" source="fib-r10-u05""#,
        );
        assert_eq!(
            tokens,
            vec![
                "docker.n.images",
                "30",
                "1496156870",
                r#"engine_host="fib-r10-u05""#,
                r#"source="fib-r10-u05""#,
            ]
        );
    }

    #[test]
    fn test_tokenize_collapses_blanks() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("  cpu.load \t\t 0.5   host=a\t");
        assert_eq!(tokens, vec!["cpu.load", "0.5", "host=a"]);
    }

    #[test]
    fn test_quoted_span_not_split() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize(r#"app.hits 1 dc="us  east 1" env=prod"#);
        // Blank runs collapse even inside quotes.
        assert_eq!(tokens, vec!["app.hits", "1", r#"dc="us east 1""#, "env=prod"]);
    }

    #[test]
    fn test_unicode_quotes() {
        let tokens = split_outside_quotes("a.b 1 label=\u{201C}two words\u{201C} x=y");
        assert_eq!(tokens, vec!["a.b", "1", "label=\u{201C}two words\u{201C}", "x=y"]);
    }

    #[test]
    fn test_nested_differing_quotes_are_text() {
        let tokens = split_outside_quotes(r#"a.b 1 t="it's here" u='say "hi" now'"#);
        assert_eq!(
            tokens,
            vec!["a.b", "1", r#"t="it's here""#, r#"u='say "hi" now'"#]
        );
    }

    #[test]
    fn test_unterminated_quote_swallows_rest() {
        let tokens = split_outside_quotes(r#"a.b 1 t="open ended x=y"#);
        assert_eq!(tokens, vec!["a.b", "1", r#"t="open ended x=y"#]);
    }

    #[test]
    fn test_no_empty_tokens() {
        assert!(split_outside_quotes("").is_empty());
        assert!(split_outside_quotes("   ").is_empty());
        assert!(Tokenizer::new().tokenize(" \t ").is_empty());
    }

    #[test]
    fn test_is_quotation_mark() {
        assert!(is_quotation_mark('"'));
        assert!(is_quotation_mark('\''));
        assert!(is_quotation_mark('\u{00AB}'));
        assert!(is_quotation_mark('\u{300C}'));
        assert!(!is_quotation_mark('`'));
        assert!(!is_quotation_mark('a'));
    }
}
