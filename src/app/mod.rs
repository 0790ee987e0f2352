use std::cell::Cell;
use std::io::Stdout;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;
use time::OffsetDateTime;

use crate::config::AppConfig;
use crate::notes::{Intent, NotePatch};
use crate::storage::{KeyValueSlot, NoteStore, SqliteSlot};
use crate::ui::{self, Screen, DELETE_PROMPT};

pub mod controller;
pub mod state;

pub use controller::{AppController, SaveOutcome, StateObserver, StateView};
pub use state::{Focus, Overlay, TextField, UiState};

pub struct App<S: KeyValueSlot = SqliteSlot> {
    pub config: Arc<AppConfig>,
    controller: AppController<S>,
    ui: UiState,
    list_state: ListState,
    state_changed: Rc<Cell<bool>>,
    should_quit: bool,
}

impl<S: KeyValueSlot> App<S> {
    pub fn new(config: Arc<AppConfig>, store: NoteStore<S>) -> Self {
        let mut controller = AppController::bootstrap(store);
        let state_changed = Rc::new(Cell::new(false));
        let flag = Rc::clone(&state_changed);
        controller.subscribe(Box::new(move |_: &StateView<'_>| flag.set(true)));

        let mut ui = UiState::new();
        ui.sync_editor(controller.selected());
        if let Some(SaveOutcome::Failed { message }) = controller.last_save() {
            ui.set_status_message(Some(format!("Notes are not being saved: {message}")));
        }
        Self {
            config,
            controller,
            ui,
            list_state: ListState::default(),
            state_changed,
            should_quit: false,
        }
    }

    pub fn controller(&self) -> &AppController<S> {
        &self.controller
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal
                .draw(|frame| {
                    let screen = Screen {
                        view: self.controller.view(),
                        config: &self.config,
                        last_save: self.controller.last_save(),
                        now: OffsetDateTime::now_utc(),
                    };
                    ui::draw_app(frame, &screen, &mut self.ui, &mut self.list_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            // blocks until the next input; there is nothing to do between events
            match event::read().context("reading terminal event")? {
                Event::Key(key) => self.handle_key(key),
                Event::Paste(text) => self.handle_paste(&text),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.ui.overlay().is_some() {
            self.handle_overlay_key(key);
            return;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') if ctrl => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char('n') if ctrl => {
                self.create_note();
                return;
            }
            KeyCode::Char('d') if ctrl => {
                self.request_delete();
                return;
            }
            KeyCode::Tab => {
                self.ui.focus_next();
                return;
            }
            KeyCode::BackTab => {
                self.ui.focus_prev();
                return;
            }
            _ => {}
        }

        match self.ui.focus {
            Focus::Search => self.handle_search_key(key),
            Focus::List => self.handle_list_key(key),
            Focus::Title | Focus::Content => self.handle_editor_key(key),
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) {
        if key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
        {
            return;
        }
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Some(Overlay::ConfirmDelete { note_id, title }) = self.ui.take_overlay() {
                    // ignore a stale prompt whose note is no longer selected
                    if self.controller.selected_id() == Some(note_id.as_str()) {
                        self.dispatch(Intent::Delete);
                        self.ui
                            .set_status_message(Some(format!("Deleted \"{title}\"")));
                    }
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.ui.take_overlay();
                self.ui.set_status_message(Some("Delete canceled"));
            }
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let changed = match key.code {
            KeyCode::Esc => self.ui.search.clear(),
            KeyCode::Enter | KeyCode::Down => {
                self.ui.focus = Focus::List;
                false
            }
            _ => edit_field(&mut self.ui.search, key),
        };
        if changed {
            let query = self.ui.search.text().to_string();
            self.dispatch(Intent::Search(query));
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        if key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
        {
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('n') => self.create_note(),
            KeyCode::Char('d') | KeyCode::Delete => self.request_delete(),
            KeyCode::Char('/') => self.ui.focus = Focus::Search,
            KeyCode::Enter if self.ui.new_row_focused => self.create_note(),
            KeyCode::Enter => {
                if self.controller.selected().is_some() {
                    self.ui.focus = Focus::Content;
                }
            }
            _ => {}
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc {
            self.ui.focus = Focus::List;
            return;
        }
        if self.controller.selected().is_none() {
            self.ui
                .set_status_message(Some("No note selected. Press Ctrl-n to create one."));
            return;
        }
        if self.ui.focus == Focus::Title && matches!(key.code, KeyCode::Enter | KeyCode::Down) {
            self.ui.focus = Focus::Content;
            return;
        }

        let field = match self.ui.focus {
            Focus::Title => &mut self.ui.title,
            _ => &mut self.ui.content,
        };
        if edit_field(field, key) {
            self.push_editor_change();
        }
    }

    fn handle_paste(&mut self, text: &str) {
        let field = match self.ui.focus {
            Focus::Search => &mut self.ui.search,
            Focus::Title if self.controller.selected().is_some() => &mut self.ui.title,
            Focus::Content if self.controller.selected().is_some() => &mut self.ui.content,
            _ => return,
        };
        let mut changed = false;
        for ch in text.chars().filter(|ch| *ch != '\r') {
            changed |= field.insert_char(ch);
        }
        if !changed {
            return;
        }
        if self.ui.focus == Focus::Search {
            let query = self.ui.search.text().to_string();
            self.dispatch(Intent::Search(query));
        } else {
            self.push_editor_change();
        }
    }

    fn push_editor_change(&mut self) {
        let patch = match self.ui.focus {
            Focus::Title => NotePatch::title(self.ui.title.text()),
            _ => NotePatch::content(self.ui.content.text()),
        };
        self.dispatch(Intent::Update(patch));
    }

    fn create_note(&mut self) {
        self.dispatch(Intent::Create);
        self.ui.search.clear();
        self.ui.new_row_focused = false;
        self.ui.focus = Focus::Title;
        self.ui.title.move_end();
        self.ui.set_status_message(Some("New note created"));
    }

    fn request_delete(&mut self) {
        match self.controller.selected() {
            Some(note) => {
                self.ui.open_confirm_delete(note);
                self.ui.set_status_message(Some(DELETE_PROMPT));
            }
            None => self.ui.set_status_message(Some("No note selected")),
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let target = {
            let visible = self.controller.visible_notes();
            let current = if self.ui.new_row_focused {
                Some(0)
            } else {
                self.controller
                    .selected_id()
                    .and_then(|id| visible.iter().position(|note| note.id == id))
                    .map(|idx| idx + 1)
            };
            let rows = visible.len() + 1;
            let next = match current {
                Some(row) => (row as isize + delta).clamp(0, rows as isize - 1) as usize,
                None if visible.is_empty() => 0,
                None => 1,
            };
            if next == 0 {
                None
            } else {
                Some(visible[next - 1].id.clone())
            }
        };
        match target {
            Some(id) => {
                self.ui.new_row_focused = false;
                self.dispatch(Intent::Select(id));
            }
            None => self.ui.new_row_focused = true,
        }
    }

    fn dispatch(&mut self, intent: Intent) {
        self.controller.dispatch(intent);
        if self.state_changed.replace(false) {
            if self.ui.sync_editor(self.controller.selected()) {
                tracing::trace!(id = ?self.ui.editing_id(), "editor switched note");
            }
            if let Some(SaveOutcome::Failed { message }) = self.controller.last_save() {
                self.ui
                    .set_status_message(Some(format!("Could not save notes: {message}")));
            }
        }
    }
}

fn edit_field(field: &mut TextField, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Enter => field.insert_newline(),
        KeyCode::Backspace => field.backspace(),
        KeyCode::Delete => field.delete(),
        KeyCode::Char(ch)
            if !key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER) =>
        {
            field.insert_char(ch)
        }
        KeyCode::Left => {
            field.move_left();
            false
        }
        KeyCode::Right => {
            field.move_right();
            false
        }
        KeyCode::Up => {
            field.move_up();
            false
        }
        KeyCode::Down => {
            field.move_down();
            false
        }
        KeyCode::Home => {
            field.move_home();
            false
        }
        KeyCode::End => {
            field.move_end();
            false
        }
        _ => false,
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("creating terminal backend")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}
