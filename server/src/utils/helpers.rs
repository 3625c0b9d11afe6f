//! Shared text helpers for the parsing layers.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // CSI sequences (colors, cursor movement) and OSC sequences (titles,
    // hyperlinks). Bounded bodies keep the scan linear on hostile input.
    static ref ANSI_CSI: Regex = Regex::new(r"\x1b\[[0-9;?]{0,32}[ -/]{0,4}[@-~]").unwrap();
    static ref ANSI_OSC: Regex = Regex::new(r"\x1b\][^\x07\x1b]{0,512}(?:\x07|\x1b\\)").unwrap();
}

/// Remove ANSI escape sequences from a line. Returns the input unchanged
/// (borrowed) when no escape byte is present, which is the common case.
pub fn strip_ansi(line: &str) -> Cow<'_, str> {
    if !line.contains('\x1b') {
        return Cow::Borrowed(line);
    }
    let stripped = ANSI_CSI.replace_all(line, "");
    Cow::Owned(ANSI_OSC.replace_all(&stripped, "").into_owned())
}

/// Parse a 1-based line/column capture. Substitutes 0 ("unknown") when the
/// digits overflow or the capture is malformed; extraction never fails on a
/// bad number.
pub fn parse_loc(digits: &str) -> u32 {
    digits.parse::<u32>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_plain_line_is_borrowed() {
        let line = "main.go:10:5: undefined: foo";
        assert!(matches!(strip_ansi(line), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_ansi_color_codes() {
        let line = "\x1b[31merror\x1b[0m: something failed";
        assert_eq!(strip_ansi(line), "error: something failed");
    }

    #[test]
    fn test_strip_ansi_bold_and_cursor() {
        let line = "\x1b[1;33mwarning\x1b[0m: unused variable \x1b[2K";
        assert_eq!(strip_ansi(line), "warning: unused variable ");
    }

    #[test]
    fn test_strip_ansi_osc_hyperlink() {
        let line = "\x1b]8;;https://example.com\x07link\x1b]8;;\x07 done";
        assert_eq!(strip_ansi(line), "link done");
    }

    #[test]
    fn test_parse_loc_valid() {
        assert_eq!(parse_loc("42"), 42);
    }

    #[test]
    fn test_parse_loc_overflow_is_zero() {
        assert_eq!(parse_loc("99999999999999999999"), 0);
    }
}
