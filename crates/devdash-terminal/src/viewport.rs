//! Scrollback windowing over captured pane content.

use std::ops::Range;

const ESC: char = '\x1b';
const RESET: &str = "\x1b[0m";

/// Lines of the last snapshot plus a scroll position counted from the bottom.
#[derive(Debug, Clone, Default)]
pub struct ScrollbackViewport {
    lines: Vec<String>,
    scroll_offset: usize,
}

impl ScrollbackViewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the buffer with a new snapshot and re-clamp the offset.
    pub fn set_content(&mut self, content: &str, height: usize) {
        self.lines = split_lines(content);
        self.clamp(height);
    }

    pub fn total_lines(&self) -> usize {
        self.lines.len()
    }

    /// Lines scrolled up from the bottom; 0 means pinned to the live tail.
    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn max_offset(&self, height: usize) -> usize {
        self.lines.len().saturating_sub(height)
    }

    pub fn scroll_up(&mut self, n: usize, height: usize) {
        self.scroll_offset = self
            .scroll_offset
            .saturating_add(n)
            .min(self.max_offset(height));
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
    }

    pub fn to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    pub fn clamp(&mut self, height: usize) {
        self.scroll_offset = self.scroll_offset.min(self.max_offset(height));
    }

    /// Indices of the lines visible in a window of `height` rows.
    pub fn visible_range(&self, height: usize) -> Range<usize> {
        let total = self.lines.len();
        if total == 0 {
            return 0..0;
        }
        let end = total.saturating_sub(self.scroll_offset).clamp(1, total);
        let start = end.saturating_sub(height);
        start..end
    }

    pub fn visible_lines(&self, height: usize) -> &[String] {
        &self.lines[self.visible_range(height)]
    }

    /// Number of lines below the visible window.
    pub fn hidden_below(&self, height: usize) -> usize {
        self.lines.len() - self.visible_range(height).end
    }

    /// Render the visible window, each line cut to `width` columns, with an
    /// indicator line when scrolled away from the bottom.
    pub fn render(&self, width: usize, height: usize) -> String {
        let mut out: Vec<String> = self
            .visible_lines(height)
            .iter()
            .map(|line| truncate_ansi(line, width))
            .collect();
        if self.scroll_offset > 0 {
            let hidden = self.hidden_below(height);
            out.push(format!(
                "\x1b[2m-- {} more line{} below (pgdown to scroll) --{}",
                hidden,
                if hidden == 1 { "" } else { "s" },
                RESET
            ));
        }
        out.join("\n")
    }
}

/// Split a snapshot into lines, dropping trailing lines with no visible text.
pub fn split_lines(content: &str) -> Vec<String> {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    while lines.last().is_some_and(|line| is_blank(line)) {
        lines.pop();
    }
    lines
}

fn is_blank(line: &str) -> bool {
    strip_ansi(line).trim().is_empty()
}

/// Remove escape sequences, keeping only visible characters.
pub fn strip_ansi(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_escape = false;
    for ch in line.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if ch == ESC {
            in_escape = true;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Count of visible (non-escape) characters in a line.
pub fn visible_width(line: &str) -> usize {
    strip_ansi(line).chars().count()
}

/// Cut a line to `width` visible columns without splitting escape sequences.
///
/// An escape sequence runs from ESC through the next ASCII letter and is copied
/// through without counting against the budget.
pub fn truncate_ansi(line: &str, width: usize) -> String {
    let mut out = String::with_capacity(line.len().min(width * 4));
    let mut visible = 0;
    let mut in_escape = false;
    let mut saw_escape = false;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        if in_escape {
            out.push(ch);
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
            continue;
        }
        if ch == ESC {
            in_escape = true;
            saw_escape = true;
            out.push(ch);
            continue;
        }
        if visible == width {
            // cut; close any open styling
            if saw_escape {
                out.push_str(RESET);
            }
            return out;
        }
        out.push(ch);
        visible += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n")
    }

    fn viewport(n: usize, height: usize) -> ScrollbackViewport {
        let mut vp = ScrollbackViewport::new();
        vp.set_content(&numbered(n), height);
        vp
    }

    #[test]
    fn test_bottom_shows_last_lines() {
        let vp = viewport(50, 10);
        let visible = vp.visible_lines(10);
        assert_eq!(visible.len(), 10);
        assert_eq!(visible.first().unwrap(), "line 41");
        assert_eq!(visible.last().unwrap(), "line 50");
    }

    #[test]
    fn test_short_content_shows_everything() {
        let vp = viewport(3, 10);
        assert_eq!(vp.visible_lines(10), &["line 1", "line 2", "line 3"]);
        assert_eq!(vp.render(80, 10), "line 1\nline 2\nline 3");
    }

    #[test]
    fn test_trailing_blank_lines_are_stripped() {
        let mut vp = ScrollbackViewport::new();
        vp.set_content("prompt $\n\n   \n\x1b[0m\n", 5);
        assert_eq!(vp.total_lines(), 1);
    }

    #[test]
    fn test_scroll_clamps() {
        let mut vp = viewport(30, 10);
        vp.scroll_up(1000, 10);
        assert_eq!(vp.scroll_offset(), 20);
        assert_eq!(vp.visible_lines(10).first().unwrap(), "line 1");
        vp.scroll_down(1000);
        assert_eq!(vp.scroll_offset(), 0);

        let mut short = viewport(4, 10);
        short.scroll_up(3, 10);
        assert_eq!(short.scroll_offset(), 0);
    }

    #[test]
    fn test_scroll_up_then_down_round_trips() {
        for k in 0..40 {
            let mut vp = viewport(30, 10);
            let before = vp.visible_lines(10).to_vec();
            vp.scroll_up(k, 10);
            vp.scroll_down(k);
            assert_eq!(vp.visible_lines(10), before.as_slice(), "k = {}", k);
        }
    }

    #[test]
    fn test_indicator_when_scrolled() {
        let mut vp = viewport(30, 10);
        vp.scroll_up(5, 10);
        let rendered = vp.render(80, 10);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[9], "line 25");
        assert!(lines[10].contains("5 more lines below"));
    }

    #[test]
    fn test_new_snapshot_reclamps_offset() {
        let mut vp = viewport(30, 10);
        vp.scroll_up(20, 10);
        vp.set_content(&numbered(12), 10);
        assert_eq!(vp.scroll_offset(), 2);
    }

    #[test]
    fn test_truncate_plain() {
        assert_eq!(truncate_ansi("hello world", 5), "hello");
        assert_eq!(truncate_ansi("hi", 5), "hi");
        assert_eq!(truncate_ansi("abc", 0), "");
    }

    #[test]
    fn test_truncate_never_splits_escapes() {
        let line = "\x1b[1;31merror\x1b[0m: something broke";
        let cut = truncate_ansi(line, 7);
        assert!(cut.starts_with("\x1b[1;31merror\x1b[0m: "));
        assert_eq!(visible_width(&cut), 7);
        assert!(cut.ends_with(RESET));

        for width in 0..line.len() {
            let cut = truncate_ansi(line, width);
            assert!(visible_width(&cut) <= width);
            // every ESC in the output is followed by a complete sequence
            let mut rest = cut.as_str();
            while let Some(pos) = rest.find('\x1b') {
                let tail = &rest[pos + 1..];
                let end = tail.find(|c: char| c.is_ascii_alphabetic());
                assert!(end.is_some(), "split escape in {:?}", cut);
                rest = &tail[end.unwrap() + 1..];
            }
        }
    }

    #[test]
    fn test_escape_only_tail_is_kept() {
        assert_eq!(truncate_ansi("ab\x1b[0m", 2), "ab\x1b[0m");
    }
}
