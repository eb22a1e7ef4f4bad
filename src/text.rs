use std::ops::Range;

use crate::geometry::{Bounds, Point};
use crate::shape::ObjectId;
use crate::style::{TextStyle, TextStylePatch};

/// Style override for a half-open range of character indices.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleRun {
    pub range: Range<usize>,
    pub patch: TextStylePatch,
}

/// Editable text annotation. Indices are in chars, never bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBox {
    pub origin: Point,
    pub content: String,
    pub style: TextStyle,
    /// Applied in order; a later run wins where runs overlap.
    pub runs: Vec<StyleRun>,
    pub editing: bool,
}

impl TextBox {
    pub fn new(origin: Point, style: TextStyle) -> Self {
        Self {
            origin,
            content: String::new(),
            style,
            runs: Vec::new(),
            editing: false,
        }
    }

    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    /// Insert `text` at char index `at`. Runs that strictly contain `at`
    /// grow to cover the new text; runs after it shift right.
    pub fn insert(&mut self, at: usize, text: &str, patch: &TextStylePatch) {
        let at = at.min(self.char_len());
        let n = text.chars().count();
        if n == 0 {
            return;
        }
        let byte = self.byte_index(at);
        self.content.insert_str(byte, text);

        for run in &mut self.runs {
            if run.range.start >= at {
                run.range.start += n;
                run.range.end += n;
            } else if run.range.end > at {
                run.range.end += n;
            }
        }
        if !patch.is_empty() {
            self.runs.push(StyleRun {
                range: at..at + n,
                patch: patch.clone(),
            });
        }
    }

    pub fn remove(&mut self, range: Range<usize>) {
        let len = self.char_len();
        let start = range.start.min(len);
        let end = range.end.min(len);
        if start >= end {
            return;
        }
        let (b0, b1) = (self.byte_index(start), self.byte_index(end));
        self.content.replace_range(b0..b1, "");

        let removed = end - start;
        let map = |i: usize| {
            if i <= start {
                i
            } else if i >= end {
                i - removed
            } else {
                start
            }
        };
        for run in &mut self.runs {
            run.range = map(run.range.start)..map(run.range.end);
        }
        self.runs.retain(|run| !run.range.is_empty());
    }

    pub fn apply_patch(&mut self, range: Range<usize>, patch: TextStylePatch) {
        let end = range.end.min(self.char_len());
        if range.start >= end || patch.is_empty() {
            return;
        }
        self.runs.push(StyleRun {
            range: range.start..end,
            patch,
        });
    }

    pub fn style_at(&self, index: usize) -> TextStyle {
        let mut style = self.style.clone();
        for run in self.runs.iter().filter(|r| r.range.contains(&index)) {
            run.patch.apply_to(&mut style);
        }
        style
    }

    /// Content split into maximal pieces sharing one resolved style.
    pub fn segments(&self) -> Vec<(String, TextStyle)> {
        let mut out: Vec<(String, TextStyle)> = Vec::new();
        for (i, ch) in self.content.chars().enumerate() {
            let style = self.style_at(i);
            match out.last_mut() {
                Some((text, last)) if *last == style => text.push(ch),
                _ => out.push((ch.to_string(), style)),
            }
        }
        out
    }

    /// Rough layout box used for hit-testing and selection outlines. The UI
    /// and the exporter measure real glyphs.
    pub fn approx_bounds(&self) -> Bounds {
        let mut width: f32 = 0.0;
        let mut height: f32 = 0.0;
        let mut line_width: f32 = 0.0;
        let mut line_height: f32 = self.style.font_size;
        for (i, ch) in self.content.chars().enumerate() {
            let size = self.style_at(i).font_size;
            if ch == '\n' {
                width = width.max(line_width);
                height += line_height * 1.2;
                line_width = 0.0;
                line_height = self.style.font_size;
                continue;
            }
            line_width += size * 0.6;
            line_height = line_height.max(size);
        }
        width = width.max(line_width).max(self.style.font_size * 0.5);
        height += line_height * 1.2;
        Bounds {
            left: self.origin.x,
            top: self.origin.y,
            width,
            height,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaretMotion {
    Left,
    Right,
    Home,
    End,
}

/// In-place editing state for the text object currently being typed into.
#[derive(Clone, Debug, PartialEq)]
pub struct TextEditSession {
    pub object: ObjectId,
    pub caret: usize,
    anchor: Option<usize>,
    /// Style for the next typed characters when nothing is selected.
    pub pending: TextStylePatch,
}

impl TextEditSession {
    pub fn new(object: ObjectId, caret: usize) -> Self {
        Self {
            object,
            caret,
            anchor: None,
            pending: TextStylePatch::default(),
        }
    }

    pub fn selection(&self) -> Option<Range<usize>> {
        let anchor = self.anchor?;
        if anchor == self.caret {
            return None;
        }
        Some(anchor.min(self.caret)..anchor.max(self.caret))
    }

    pub fn select(&mut self, range: Range<usize>, text: &TextBox) {
        let len = text.char_len();
        self.anchor = Some(range.start.min(len));
        self.caret = range.end.min(len);
    }

    pub fn select_all(&mut self, text: &TextBox) {
        self.select(0..text.char_len(), text);
    }

    pub fn move_caret(&mut self, motion: CaretMotion, extend: bool, text: &TextBox) {
        let len = text.char_len();
        if extend {
            if self.anchor.is_none() {
                self.anchor = Some(self.caret);
            }
        } else if let Some(sel) = self.selection() {
            // Collapse onto the matching edge of the selection.
            self.anchor = None;
            self.caret = match motion {
                CaretMotion::Left => sel.start,
                CaretMotion::Right => sel.end,
                CaretMotion::Home => 0,
                CaretMotion::End => len,
            };
            return;
        } else {
            self.anchor = None;
        }
        self.caret = match motion {
            CaretMotion::Left => self.caret.saturating_sub(1),
            CaretMotion::Right => (self.caret + 1).min(len),
            CaretMotion::Home => 0,
            CaretMotion::End => len,
        };
    }

    fn delete_selection(&mut self, text: &mut TextBox) -> bool {
        let Some(sel) = self.selection() else {
            return false;
        };
        self.caret = sel.start;
        self.anchor = None;
        text.remove(sel);
        true
    }

    pub fn insert(&mut self, text: &mut TextBox, input: &str) {
        self.delete_selection(text);
        text.insert(self.caret, input, &self.pending);
        self.caret += input.chars().count();
    }

    pub fn backspace(&mut self, text: &mut TextBox) {
        if self.delete_selection(text) || self.caret == 0 {
            return;
        }
        text.remove(self.caret - 1..self.caret);
        self.caret -= 1;
    }

    pub fn delete_forward(&mut self, text: &mut TextBox) {
        if self.delete_selection(text) {
            return;
        }
        text.remove(self.caret..self.caret + 1);
    }

    /// Style the selected sub-range, or remember the style for upcoming
    /// input when nothing is selected.
    pub fn apply_style(&mut self, text: &mut TextBox, patch: &TextStylePatch) {
        match self.selection() {
            Some(sel) => text.apply_patch(sel, patch.clone()),
            None => self.pending.merge(patch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;

    fn bold() -> TextStylePatch {
        TextStylePatch {
            bold: Some(true),
            ..Default::default()
        }
    }

    fn text(content: &str) -> TextBox {
        let mut t = TextBox::new(Point::new(0.0, 0.0), TextStyle::default());
        t.content = content.to_string();
        t
    }

    #[test]
    fn insert_grows_inner_runs_and_shifts_later_ones() {
        let mut t = text("hello world");
        t.apply_patch(0..5, bold());
        t.apply_patch(6..11, bold());

        t.insert(2, "XY", &TextStylePatch::default());
        assert_eq!(t.content, "heXYllo world");
        assert_eq!(t.runs[0].range, 0..7);
        assert_eq!(t.runs[1].range, 8..13);
    }

    #[test]
    fn remove_trims_and_drops_runs() {
        let mut t = text("abcdefgh");
        t.apply_patch(2..4, bold());
        t.apply_patch(5..8, bold());

        t.remove(1..5);
        assert_eq!(t.content, "afgh");
        assert_eq!(t.runs.len(), 1);
        assert_eq!(t.runs[0].range, 1..4);
    }

    #[test]
    fn multibyte_content_uses_char_indices() {
        let mut t = text("héllo");
        t.insert(2, "ß", &TextStylePatch::default());
        assert_eq!(t.content, "héßllo");
        t.remove(0..2);
        assert_eq!(t.content, "ßllo");
    }

    #[test]
    fn segments_merge_equal_styles() {
        let mut t = text("abcdef");
        t.apply_patch(2..4, bold());
        let segs = t.segments();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0].0, "ab");
        assert_eq!(segs[1].0, "cd");
        assert!(segs[1].1.bold);
        assert_eq!(segs[2].0, "ef");
    }

    #[test]
    fn later_runs_win() {
        let mut t = text("abc");
        t.apply_patch(
            0..3,
            TextStylePatch {
                color: Some(Color::WHITE),
                ..Default::default()
            },
        );
        t.apply_patch(
            1..2,
            TextStylePatch {
                color: Some(Color::YELLOW),
                ..Default::default()
            },
        );
        assert_eq!(t.style_at(0).color, Color::WHITE);
        assert_eq!(t.style_at(1).color, Color::YELLOW);
    }

    #[test]
    fn session_styles_selection_or_pending_input() {
        let mut t = text("");
        let mut s = TextEditSession::new(1, 0);

        s.insert(&mut t, "ab");
        s.apply_style(&mut t, &bold());
        assert!(t.runs.is_empty());
        s.insert(&mut t, "cd");
        assert_eq!(t.content, "abcd");
        assert!(!t.style_at(1).bold);
        assert!(t.style_at(2).bold);

        s.select(0..1, &t);
        s.apply_style(
            &mut t,
            &TextStylePatch {
                underline: Some(true),
                ..Default::default()
            },
        );
        assert!(t.style_at(0).underline);
        assert!(!t.style_at(1).underline);
    }

    #[test]
    fn caret_editing() {
        let mut t = text("");
        let mut s = TextEditSession::new(1, 0);
        s.insert(&mut t, "abc");
        s.move_caret(CaretMotion::Left, false, &t);
        s.backspace(&mut t);
        assert_eq!(t.content, "ac");
        assert_eq!(s.caret, 1);
        s.delete_forward(&mut t);
        assert_eq!(t.content, "a");

        s.move_caret(CaretMotion::End, false, &t);
        s.insert(&mut t, "bcd");
        s.move_caret(CaretMotion::Left, true, &t);
        s.move_caret(CaretMotion::Left, true, &t);
        assert_eq!(s.selection(), Some(2..4));
        s.insert(&mut t, "Z");
        assert_eq!(t.content, "abZ");
        assert_eq!(s.selection(), None);

        s.select_all(&t);
        s.backspace(&mut t);
        assert!(t.is_empty());
        assert_eq!(s.caret, 0);
    }
}
