//! Output normalization applied before comparison.
//!
//! The policy is narrow on purpose:
//! - trailing spaces and tabs are stripped from every line
//! - trailing blank lines (and the final newline) are stripped
//! - everything else, including leading and internal whitespace and `\r`,
//!   is preserved and compared byte for byte

/// Normalize program or expected output.
pub fn normalize_output(text: &str) -> String {
    let mut lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.trim_end_matches([' ', '\t']))
        .collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Compare actual against expected output after normalizing both.
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize_output(actual) == normalize_output(expected)
}
