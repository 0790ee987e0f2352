use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use regex::Regex;
use time::OffsetDateTime;
use unicode_width::UnicodeWidthStr;

use crate::app::{Focus, Overlay, SaveOutcome, StateView, TextField, UiState};
use crate::config::AppConfig;
use crate::highlight::{build_query_regex, split_matches};
use crate::humanize::format_relative;
use crate::notes::Note;

pub const DELETE_PROMPT: &str = "Delete this note? This action cannot be undone. (y/n)";
const NEW_NOTE_ROW: &str = "+ New note";

pub struct Screen<'a> {
    pub view: StateView<'a>,
    pub config: &'a AppConfig,
    pub last_save: Option<&'a SaveOutcome>,
    pub now: OffsetDateTime,
}

pub fn draw_app(frame: &mut Frame, screen: &Screen<'_>, ui: &mut UiState, list_state: &mut ListState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(vertical[1]);

    render_navbar(frame, vertical[0]);
    render_sidebar(frame, columns[0], screen, ui, list_state);
    render_editor(frame, columns[1], screen, ui);
    render_status(frame, vertical[2], screen, ui);
    render_overlay(frame, ui);
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn render_navbar(frame: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(
            " Note Manager ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("  Ctrl-n New note", Style::default().fg(Color::Gray)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_sidebar(
    frame: &mut Frame,
    area: Rect,
    screen: &Screen<'_>,
    ui: &UiState,
    list_state: &mut ListState,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(area);

    let search_focused = ui.focus == Focus::Search;
    let search_text = if ui.search.text().is_empty() && !search_focused {
        Line::from(Span::styled("Search notes…", Style::default().fg(Color::DarkGray)))
    } else {
        Line::from(ui.search.display_line().into_owned())
    };
    let search = Paragraph::new(search_text).block(
        Block::default()
            .title("Search")
            .borders(Borders::ALL)
            .border_style(focus_style(search_focused)),
    );
    frame.render_widget(search, rows[0]);
    if search_focused && ui.overlay().is_none() {
        place_single_line_cursor(frame, &ui.search, rows[0]);
    }

    let view = &screen.view;
    let count = format!(" {} of {} notes", view.visible.len(), view.notes.len());
    frame.render_widget(
        Paragraph::new(Span::styled(count, Style::default().fg(Color::Gray))),
        rows[1],
    );

    let regex = if screen.config.search.highlight_matches {
        build_query_regex(view.query)
    } else {
        None
    };
    let mut items = Vec::with_capacity(view.visible.len() + 1);
    items.push(ListItem::new(Line::from(Span::styled(
        NEW_NOTE_ROW,
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
    ))));
    for note in &view.visible {
        items.push(note_item(
            note,
            regex.as_ref(),
            screen.config.preview_lines,
            screen.now,
        ));
    }
    if view.visible.is_empty() {
        let empty = if view.notes.is_empty() {
            "No notes yet."
        } else {
            "No notes match your search."
        };
        items.push(ListItem::new(Span::styled(
            empty,
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    let selected_row = if ui.new_row_focused {
        Some(0)
    } else {
        view.selected_id
            .and_then(|id| view.visible.iter().position(|note| note.id == id))
            .map(|idx| idx + 1)
    };
    list_state.select(selected_row);

    let list = List::new(items)
        .block(
            Block::default()
                .title("Notes")
                .borders(Borders::ALL)
                .border_style(focus_style(ui.focus == Focus::List)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, rows[2], list_state);
}

fn note_item(
    note: &Note,
    regex: Option<&Regex>,
    preview_lines: u16,
    now: OffsetDateTime,
) -> ListItem<'static> {
    let mut lines = Vec::new();
    lines.push(Line::from(highlight_spans(
        &note.title,
        regex,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(Span::styled(
        format_relative(Some(note.updated_at), now),
        Style::default().fg(Color::Gray),
    )));
    if preview_lines > 0 {
        let preview = note.preview_lines(usize::from(preview_lines));
        if preview.is_empty() {
            lines.push(Line::from(Span::styled(
                "No content",
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
        }
        for line in preview {
            lines.push(Line::from(highlight_spans(line, regex, Style::default())));
        }
    }
    ListItem::new(lines)
}

fn highlight_spans(text: &str, regex: Option<&Regex>, base: Style) -> Vec<Span<'static>> {
    let hit = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    split_matches(text, regex)
        .into_iter()
        .map(|(range, matched)| {
            let style = if matched { hit } else { base };
            Span::styled(text[range].to_string(), style)
        })
        .collect()
}

fn render_editor(frame: &mut Frame, area: Rect, screen: &Screen<'_>, ui: &mut UiState) {
    frame.render_widget(Clear, area);
    let Some(note) = screen.view.selected else {
        let placeholder = Paragraph::new(Text::from(vec![
            Line::from(""),
            Line::from("No note selected."),
            Line::from(Span::styled(
                "Press Ctrl-n to create one.",
                Style::default().fg(Color::Gray),
            )),
        ]))
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });
        frame.render_widget(placeholder, area);
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(3),
        ])
        .split(area);

    let title_focused = ui.focus == Focus::Title;
    let title = Paragraph::new(Span::styled(
        ui.title.display_line().into_owned(),
        Style::default().add_modifier(Modifier::BOLD),
    ))
    .block(
        Block::default()
            .title("Title")
            .borders(Borders::ALL)
            .border_style(focus_style(title_focused)),
    );
    frame.render_widget(title, rows[0]);

    let meta = Line::from(vec![
        Span::styled(
            format!(" Updated {}", format_relative(Some(note.updated_at), screen.now)),
            Style::default().fg(Color::Gray),
        ),
        Span::styled("  •  Ctrl-d delete", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(meta), rows[1]);

    let content_focused = ui.focus == Focus::Content;
    let inner_height = rows[2].height.saturating_sub(2);
    ui.scroll_content_to_cursor(inner_height);
    let body: Vec<Line> = if ui.content.text().is_empty() && !content_focused {
        vec![Line::from(Span::styled(
            "Start writing…",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        ui.content
            .text()
            .split('\n')
            .map(|line| Line::from(line.to_string()))
            .collect()
    };
    let content = Paragraph::new(body)
        .block(
            Block::default()
                .title("Content")
                .borders(Borders::ALL)
                .border_style(focus_style(content_focused)),
        )
        .scroll((ui.content_scroll, 0));
    frame.render_widget(content, rows[2]);

    if ui.overlay().is_some() {
        return;
    }
    if title_focused {
        place_single_line_cursor(frame, &ui.title, rows[0]);
    } else if content_focused {
        let (row, col) = ui.content.cursor_row_col();
        let row = u16::try_from(row)
            .unwrap_or(u16::MAX)
            .saturating_sub(ui.content_scroll);
        if let Some(position) = cursor_in(rows[2], row, col) {
            frame.set_cursor(position.0, position.1);
        }
    }
}

fn place_single_line_cursor(frame: &mut Frame, field: &TextField, area: Rect) {
    let col = UnicodeWidthStr::width(&field.display_line()[..field.cursor()]);
    if let Some((x, y)) = cursor_in(area, 0, col) {
        frame.set_cursor(x, y);
    }
}

fn cursor_in(area: Rect, row: u16, col: usize) -> Option<(u16, u16)> {
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    if inner_width == 0 || inner_height == 0 || row >= inner_height {
        return None;
    }
    let col = u16::try_from(col).unwrap_or(u16::MAX).min(inner_width - 1);
    Some((area.x + 1 + col, area.y + 1 + row))
}

fn render_status(frame: &mut Frame, area: Rect, screen: &Screen<'_>, ui: &UiState) {
    let mut spans = Vec::new();
    if let Some(SaveOutcome::Failed { .. }) = screen.last_save {
        spans.push(Span::styled(
            "[not saved] ",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
    match ui.status_message() {
        Some(message) => spans.push(Span::raw(message.to_string())),
        None => spans.push(Span::styled(
            "Tab focus • Ctrl-n new • Ctrl-d delete • Ctrl-q quit",
            Style::default().fg(Color::Gray),
        )),
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_overlay(frame: &mut Frame, ui: &UiState) {
    let Some(Overlay::ConfirmDelete { title, .. }) = ui.overlay() else {
        return;
    };
    let area = centered_rect(60, 30, frame.size());
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(vec![
        Line::from(Span::styled(
            DELETE_PROMPT,
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("\"{title}\""),
            Style::default().fg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "y delete • n / Esc cancel",
            Style::default().fg(Color::Gray),
        )),
    ])
    .block(
        Block::default()
            .title("Delete Note")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red)),
    )
    .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppController;
    use crate::notes::{Intent, NotePatch};
    use crate::storage::{MemorySlot, NoteStore};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use time::macros::datetime;
    use time::Duration;

    fn render(
        controller: &AppController<MemorySlot>,
        ui: &mut UiState,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let config = AppConfig::default();
        let mut terminal = Terminal::new(TestBackend::new(100, 30))?;
        let mut list_state = ListState::default();
        terminal.draw(|frame| {
            let screen = Screen {
                view: controller.view(),
                config: &config,
                last_save: controller.last_save(),
                now,
            };
            draw_app(frame, &screen, ui, &mut list_state);
        })?;
        let buffer = terminal.backend().buffer();
        let width = usize::from(buffer.area.width);
        let lines: Vec<String> = buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect())
            .collect();
        Ok(lines.join("\n"))
    }

    #[test]
    fn renders_brand_list_and_editor() -> anyhow::Result<()> {
        let start = datetime!(2024-05-05 09:00 UTC);
        let mut controller =
            AppController::bootstrap_at(NoteStore::new(MemorySlot::new()), start);
        controller.dispatch_at(Intent::Create, start + Duration::minutes(1));
        controller.dispatch_at(
            Intent::Update(NotePatch::title("Groceries").with_content("milk\neggs")),
            start + Duration::minutes(2),
        );
        let mut ui = UiState::new();
        ui.sync_editor(controller.selected());

        let screen = render(&controller, &mut ui, start + Duration::minutes(5))?;
        assert!(screen.contains("Note Manager"));
        assert!(screen.contains(NEW_NOTE_ROW));
        assert!(screen.contains("2 of 2 notes"));
        assert!(screen.contains("Groceries"));
        assert!(screen.contains("3 minutes ago"));
        assert!(screen.contains("Updated 3 minutes ago"));
        assert!(screen.contains("Welcome to Note Manager"));
        Ok(())
    }

    #[test]
    fn filtered_count_and_empty_message() -> anyhow::Result<()> {
        let start = datetime!(2024-05-05 09:00 UTC);
        let mut controller =
            AppController::bootstrap_at(NoteStore::new(MemorySlot::new()), start);
        controller.dispatch_at(Intent::Search("no such words".into()), start);
        let mut ui = UiState::new();
        ui.sync_editor(controller.selected());

        let screen = render(&controller, &mut ui, start)?;
        assert!(screen.contains("0 of 1 notes"));
        assert!(screen.contains("No notes match your search."));
        Ok(())
    }

    #[test]
    fn confirm_overlay_shows_prompt() -> anyhow::Result<()> {
        let start = datetime!(2024-05-05 09:00 UTC);
        let controller = AppController::bootstrap_at(NoteStore::new(MemorySlot::new()), start);
        let mut ui = UiState::new();
        ui.sync_editor(controller.selected());
        if let Some(note) = controller.selected() {
            ui.open_confirm_delete(note);
        }

        let screen = render(&controller, &mut ui, start)?;
        assert!(screen.contains("Delete this note? This action cannot be undone. (y/n)"));
        Ok(())
    }

    #[test]
    fn empty_collection_shows_placeholder() -> anyhow::Result<()> {
        let start = datetime!(2024-05-05 09:00 UTC);
        let mut controller =
            AppController::bootstrap_at(NoteStore::new(MemorySlot::new()), start);
        controller.dispatch_at(Intent::Delete, start);
        let mut ui = UiState::new();
        ui.sync_editor(controller.selected());

        let screen = render(&controller, &mut ui, start)?;
        assert!(screen.contains("0 of 0 notes"));
        assert!(screen.contains("No notes yet."));
        assert!(screen.contains("No note selected."));
        Ok(())
    }

    #[test]
    fn cursor_stays_inside_block() {
        let area = Rect::new(10, 5, 20, 4);
        assert_eq!(cursor_in(area, 0, 3), Some((14, 6)));
        assert_eq!(cursor_in(area, 1, 500), Some((28, 7)));
        assert_eq!(cursor_in(area, 2, 0), None);
    }
}
