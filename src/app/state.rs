use std::borrow::Cow;

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::notes::Note;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Search,
    List,
    Title,
    Content,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Focus::Search => Focus::List,
            Focus::List => Focus::Title,
            Focus::Title => Focus::Content,
            Focus::Content => Focus::Search,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Focus::Search => Focus::Content,
            Focus::List => Focus::Search,
            Focus::Title => Focus::List,
            Focus::Content => Focus::Title,
        }
    }
}

/// Editable text with a byte cursor that always sits on a grapheme boundary.
#[derive(Debug, Clone, Default)]
pub struct TextField {
    text: String,
    cursor: usize,
    preferred_column: Option<usize>,
    multiline: bool,
}

impl TextField {
    pub fn single_line() -> Self {
        Self::default()
    }

    pub fn multi_line() -> Self {
        Self {
            multiline: true,
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    // kept verbatim, line breaks included
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.text.len();
        self.preferred_column = None;
    }

    /// Same byte length as `text()`, with line breaks shown as spaces.
    pub fn display_line(&self) -> Cow<'_, str> {
        if self.text.contains(['\r', '\n']) {
            Cow::Owned(self.text.replace(['\r', '\n'], " "))
        } else {
            Cow::Borrowed(&self.text)
        }
    }

    pub fn clear(&mut self) -> bool {
        if self.text.is_empty() {
            return false;
        }
        self.set_text(String::new());
        true
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        if ch == '\n' {
            return self.insert_newline();
        }
        self.text.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
        self.preferred_column = None;
        true
    }

    pub fn insert_newline(&mut self) -> bool {
        if !self.multiline {
            return false;
        }
        self.text.insert(self.cursor, '\n');
        self.cursor += 1;
        self.preferred_column = Some(0);
        true
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = prev_grapheme_boundary(&self.text, self.cursor);
        self.text.drain(prev..self.cursor);
        self.cursor = prev;
        self.preferred_column = None;
        true
    }

    pub fn delete(&mut self) -> bool {
        let next = next_grapheme_boundary(&self.text, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.text.drain(self.cursor..next);
        self.preferred_column = None;
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor = prev_grapheme_boundary(&self.text, self.cursor);
        self.preferred_column = None;
        true
    }

    pub fn move_right(&mut self) -> bool {
        let next = next_grapheme_boundary(&self.text, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.cursor = next;
        self.preferred_column = None;
        true
    }

    pub fn move_home(&mut self) -> bool {
        let start = if self.multiline {
            line_start(&self.text, self.cursor)
        } else {
            0
        };
        if self.cursor == start {
            return false;
        }
        self.cursor = start;
        self.preferred_column = Some(0);
        true
    }

    pub fn move_end(&mut self) -> bool {
        if !self.multiline {
            let end = self.text.len();
            if self.cursor == end {
                return false;
            }
            self.cursor = end;
            self.preferred_column = None;
            return true;
        }
        let end = line_end(&self.text, self.cursor);
        if self.cursor == end {
            return false;
        }
        self.cursor = end;
        self.preferred_column = Some(column_at(
            &self.text,
            line_start(&self.text, self.cursor),
            self.cursor,
        ));
        true
    }

    pub fn move_up(&mut self) -> bool {
        if !self.multiline {
            return false;
        }
        let current_start = line_start(&self.text, self.cursor);
        if current_start == 0 {
            return false;
        }
        let column = self
            .preferred_column
            .unwrap_or_else(|| column_at(&self.text, current_start, self.cursor));
        let prev_start = line_start(&self.text, current_start - 1);
        self.cursor = position_for_column(&self.text, prev_start, column);
        self.preferred_column = Some(column);
        true
    }

    pub fn move_down(&mut self) -> bool {
        if !self.multiline {
            return false;
        }
        let current_end = line_end(&self.text, self.cursor);
        if current_end == self.text.len() {
            return false;
        }
        let column = self.preferred_column.unwrap_or_else(|| {
            column_at(&self.text, line_start(&self.text, self.cursor), self.cursor)
        });
        self.cursor = position_for_column(&self.text, current_end + 1, column);
        self.preferred_column = Some(column);
        true
    }

    pub fn cursor_row_col(&self) -> (usize, usize) {
        let before = &self.text[..self.cursor];
        let row = before.matches('\n').count();
        let start = line_start(&self.text, self.cursor);
        (row, UnicodeWidthStr::width(&self.text[start..self.cursor]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    ConfirmDelete { note_id: String, title: String },
}

#[derive(Debug, Clone)]
pub struct UiState {
    pub focus: Focus,
    pub search: TextField,
    pub title: TextField,
    pub content: TextField,
    pub new_row_focused: bool,
    pub content_scroll: u16,
    editing_id: Option<String>,
    overlay: Option<Overlay>,
    status_message: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

impl UiState {
    pub fn new() -> Self {
        Self {
            focus: Focus::List,
            search: TextField::single_line(),
            title: TextField::single_line(),
            content: TextField::multi_line(),
            new_row_focused: false,
            content_scroll: 0,
            editing_id: None,
            overlay: None,
            status_message: None,
        }
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    pub fn editing_id(&self) -> Option<&str> {
        self.editing_id.as_deref()
    }

    pub fn sync_editor(&mut self, selected: Option<&Note>) -> bool {
        let selected_id = selected.map(|note| note.id.as_str());
        if selected_id == self.editing_id.as_deref() {
            return false;
        }
        match selected {
            Some(note) => {
                self.title.set_text(note.title.clone());
                self.content.set_text(note.content.clone());
                self.editing_id = Some(note.id.clone());
            }
            None => {
                self.title.clear();
                self.content.clear();
                self.editing_id = None;
            }
        }
        self.content_scroll = 0;
        true
    }

    pub fn scroll_content_to_cursor(&mut self, height: u16) {
        if height == 0 {
            return;
        }
        let (row, _) = self.content.cursor_row_col();
        let row = u16::try_from(row).unwrap_or(u16::MAX);
        if row < self.content_scroll {
            self.content_scroll = row;
        } else if row >= self.content_scroll.saturating_add(height) {
            self.content_scroll = row.saturating_sub(height - 1);
        }
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn open_confirm_delete(&mut self, note: &Note) {
        self.overlay = Some(Overlay::ConfirmDelete {
            note_id: note.id.clone(),
            title: note.title.clone(),
        });
    }

    pub fn take_overlay(&mut self) -> Option<Overlay> {
        self.overlay.take()
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[..cursor]
        .grapheme_indices(true)
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .graphemes(true)
        .next()
        .map(|grapheme| cursor + grapheme.len())
        .unwrap_or(text.len())
}

fn line_start(text: &str, cursor: usize) -> usize {
    text[..cursor].rfind('\n').map(|idx| idx + 1).unwrap_or(0)
}

fn line_end(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .find('\n')
        .map(|idx| cursor + idx)
        .unwrap_or(text.len())
}

fn column_at(text: &str, line_start: usize, cursor: usize) -> usize {
    text[line_start..cursor].graphemes(true).count()
}

fn position_for_column(text: &str, line_start: usize, column: usize) -> usize {
    let end = line_end(text, line_start);
    text[line_start..end]
        .grapheme_indices(true)
        .nth(column)
        .map(|(idx, _)| line_start + idx)
        .unwrap_or(end)
}
