//! Code text cleanup
//!
//! Turns the raw text of a code block into something that can be pasted straight into an
//! editor or terminal: entities are decoded, line-number and prompt prefixes are dropped,
//! trailing whitespace and blank edges are trimmed, and the common indentation can be removed.

use once_cell::sync::Lazy;
use regex::Regex;

/// Line-number label (`12.`), shell prompt (`$`) or quote/REPL marker (`>>`) at line start.
static LINE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\d+\.?\s*|\$\s*|>+\s*)").expect("line prefix pattern is valid")
});

/// A terminated reference (`&name;`, `&#60;`, `&#x3c;`), or one of the legacy forms HTML
/// parsers still accept without the semicolon (`&lt`, `&#60`).
static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"&(?:(#[xX][0-9a-fA-F]+|#[0-9]+|[A-Za-z][A-Za-z0-9]*);|(#[xX][0-9a-fA-F]+|#[0-9]+|lt|gt|amp|quot|nbsp|copy|reg))",
    )
    .expect("entity pattern is valid")
});

/// Cleans raw code text. Total over all inputs; never touches anything but its arguments.
pub fn clean_code(raw: &str, preserve_indentation: bool) -> String {
    let decoded = decode_entities(raw);

    let mut lines: Vec<&str> = decoded
        .split('\n')
        .map(strip_line_prefix)
        .map(str::trim_end)
        .collect();

    let first = lines.iter().position(|line| !line.trim().is_empty());
    let last = lines.iter().rposition(|line| !line.trim().is_empty());
    lines = match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].to_vec(),
        _ => Vec::new(),
    };

    if !preserve_indentation {
        lines = normalize_indentation(lines);
    }

    lines.join("\n")
}

/// Decodes character entities and folds CR/CRLF line breaks into `\n` the way an HTML
/// parser does. Tags are left as literal text.
fn decode_entities(raw: &str) -> String {
    let decoded = ENTITY.replace_all(raw, |caps: &regex::Captures<'_>| {
        match (caps.get(1), caps.get(2)) {
            (Some(_), _) => html_escape::decode_html_entities(&caps[0]).into_owned(),
            (None, Some(legacy)) => {
                html_escape::decode_html_entities(&format!("&{};", legacy.as_str())).into_owned()
            }
            (None, None) => caps[0].to_string(),
        }
    });
    if decoded.contains('\r') {
        decoded.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        decoded.into_owned()
    }
}

fn strip_line_prefix(line: &str) -> &str {
    match LINE_PREFIX.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Removes the shortest indentation found on non-blank lines from every indented line.
/// Whitespace is counted per character, so tabs and spaces are not reconciled.
fn normalize_indentation(lines: Vec<&str>) -> Vec<&str> {
    let min_indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| leading_whitespace(line))
        .min();

    let Some(min_indent) = min_indent.filter(|n| *n > 0) else {
        return lines;
    };

    lines
        .into_iter()
        .map(|line| {
            if !line.starts_with(char::is_whitespace) {
                return line;
            }
            match line.char_indices().nth(min_indent) {
                Some((idx, _)) => &line[idx..],
                None => "",
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean_code("", true), "");
        assert_eq!(clean_code("", false), "");
    }

    #[test]
    fn strips_line_numbers() {
        assert_eq!(clean_code("1. foo\n2. bar", true), "foo\nbar");
        assert_eq!(clean_code("1 let a = 1;\n2 let b = 2;", true), "let a = 1;\nlet b = 2;");
        assert_eq!(clean_code("  10. x", true), "x");
    }

    #[test]
    fn strips_shell_prompts() {
        assert_eq!(clean_code("$ ls\n$ pwd", true), "ls\npwd");
        assert_eq!(clean_code("$cargo build", true), "cargo build");
    }

    #[test]
    fn strips_quote_markers() {
        assert_eq!(clean_code("> quoted\n>> nested", true), "quoted\nnested");
        assert_eq!(clean_code(">>> print(1)", true), "print(1)");
    }

    #[test]
    fn strips_only_one_prefix_at_line_start() {
        assert_eq!(clean_code("$ echo $HOME", true), "echo $HOME");
        assert_eq!(clean_code("x = 1 > 0", true), "x = 1 > 0");
        assert_eq!(clean_code("let n = 42;", true), "let n = 42;");
    }

    #[test]
    fn plain_indented_lines_keep_their_indentation() {
        assert_eq!(clean_code("fn main() {\n    run();\n}", true), "fn main() {\n    run();\n}");
    }

    #[test]
    fn trims_trailing_whitespace() {
        assert_eq!(clean_code("a   \n  b\t", true), "a\n  b");
    }

    #[test]
    fn trims_blank_edges_but_keeps_interior_blank_lines() {
        assert_eq!(clean_code("\n\n  x\n\n", true), "  x");
        assert_eq!(clean_code("\n\n  x\n\n", false), "x");
        assert_eq!(clean_code("\n\nx\n\n", true), "x");
        assert_eq!(clean_code("a\n\nb", true), "a\n\nb");
        assert_eq!(clean_code("   \n\t\n", false), "");
    }

    #[test]
    fn normalizes_common_indentation() {
        assert_eq!(clean_code("    a\n      b", false), "a\n  b");
        assert_eq!(clean_code("    a\n\n      b", false), "a\n\n  b");
    }

    #[test]
    fn preserve_indentation_leaves_leading_whitespace() {
        assert_eq!(clean_code("    a\n      b   \n", true), "    a\n      b");
    }

    #[test]
    fn normalization_counts_tabs_as_single_characters() {
        assert_eq!(clean_code("\tfoo\n    bar", false), "foo\n   bar");
    }

    #[test]
    fn unindented_line_disables_normalization() {
        assert_eq!(clean_code("a\n    b", false), "a\n    b");
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(clean_code("&lt;div&gt;", true), "<div>");
        assert_eq!(clean_code("a &amp;&amp; b", true), "a && b");
        assert_eq!(clean_code("&quot;x&quot;", true), "\"x\"");
    }

    #[test]
    fn decodes_entities_missing_their_semicolon() {
        assert_eq!(clean_code("&lt div &gt", true), "< div >");
        assert_eq!(clean_code("a &amp&amp b", true), "a && b");
        assert_eq!(clean_code("&ltdiv&#62", true), "<div>");
        assert_eq!(clean_code("x&nbspy", true), "x\u{a0}y");
    }

    #[test]
    fn decoding_happens_once() {
        assert_eq!(clean_code("&amp;lt;", true), "&lt;");
        assert_eq!(clean_code("&amp;lt", true), "&lt");
        assert_eq!(clean_code("&unknown; &foo", true), "&unknown; &foo");
    }

    #[test]
    fn tags_in_input_stay_literal() {
        assert_eq!(clean_code("<b>bold</b>", true), "<b>bold</b>");
    }

    #[test]
    fn crlf_line_breaks_are_folded() {
        assert_eq!(clean_code("1. a\r\n2. b\r\n", true), "a\nb");
    }

    #[test]
    fn cleaning_is_idempotent_on_typical_samples() {
        let samples = [
            "1. fn main() {\n2.     println!(\"hi\");\n3. }\n",
            "$ cargo build\n$ cargo test   \n",
            "\n\n    def f(x):\n        return x\n\n",
            ">>> import os\n>>> os.getcwd()",
            "&lt;ul&gt;\n  &lt;li&gt;item&lt;/li&gt;\n&lt;/ul&gt;",
        ];
        for sample in samples {
            for preserve in [true, false] {
                let once = clean_code(sample, preserve);
                assert_eq!(clean_code(&once, preserve), once, "sample: {sample:?}");
            }
        }
    }
}
