//! Column-aware string helpers for the text and terminal views.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Terminal columns taken by `s` (wide CJK and emoji count as two).
pub(crate) fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Cut `s` to at most `width` columns, ending in ".." when something was cut.
pub(crate) fn truncate_display(s: &str, width: usize) -> String {
    if display_width(s) <= width {
        return s.to_string();
    }
    if width < 3 {
        // No room for the marker; keep whatever single char fits
        return s
            .chars()
            .find(|ch| ch.width().unwrap_or(0) <= width)
            .map(String::from)
            .unwrap_or_default();
    }

    let budget = width - 2;
    let mut used = 0;
    let mut kept = String::new();
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        kept.push(ch);
    }
    kept.push_str("..");
    kept
}

/// Exactly `width` columns: padded with spaces, or truncated.
pub(crate) fn pad_right(s: &str, width: usize) -> String {
    let w = display_width(s);
    if w > width {
        truncate_display(s, width)
    } else {
        format!("{}{}", s, " ".repeat(width - w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_counts_wide_chars() {
        assert_eq!(display_width("add"), 3);
        assert_eq!(display_width(""), 0);
        assert_eq!(display_width("\u{4e16}\u{754c}"), 4);
    }

    #[test]
    fn short_names_are_untouched() {
        assert_eq!(truncate_display("add", 5), "add");
        assert_eq!(truncate_display("add", 3), "add");
        assert_eq!(truncate_display("", 0), "");
    }

    #[test]
    fn long_names_get_marker() {
        assert_eq!(truncate_display("shortest_path", 8), "shorte..");
        assert_eq!(truncate_display("divide", 4), "di..");
    }

    #[test]
    fn very_narrow_keeps_one_char() {
        assert_eq!(truncate_display("range", 2), "r");
        assert_eq!(truncate_display("range", 1), "r");
    }

    #[test]
    fn wide_chars_cut_on_boundary() {
        let s = "\u{4e16}\u{754c}\u{4f60}\u{597d}";
        let t = truncate_display(s, 7);
        assert_eq!(t, "\u{4e16}\u{754c}..");
        assert!(display_width(&t) <= 7);
    }

    #[test]
    fn pad_to_width() {
        assert_eq!(pad_right("ab", 5), "ab   ");
        assert_eq!(pad_right("total", 5), "total");
        assert_eq!(pad_right("average", 5), "ave..");
    }
}
