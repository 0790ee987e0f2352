use std::collections::HashSet;

use time::OffsetDateTime;

use super::{generate_unique_id, sort_newest_first, Note, NotePatch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Create,
    Select(String),
    Update(NotePatch),
    Delete,
    Search(String),
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Create => "create",
            Intent::Select(_) => "select",
            Intent::Update(_) => "update",
            Intent::Delete => "delete",
            Intent::Search(_) => "search",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: NoteCollection,
    pub changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteCollection {
    notes: Vec<Note>,
    selected_id: Option<String>,
}

impl NoteCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_loaded(mut notes: Vec<Note>, selected_id: Option<String>) -> Self {
        sort_newest_first(&mut notes);
        let selected_id = match selected_id {
            Some(id) if notes.iter().any(|note| note.id == id) => Some(id),
            _ => notes.first().map(|note| note.id.clone()),
        };
        Self { notes, selected_id }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    pub fn selected(&self) -> Option<&Note> {
        self.selected_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.notes.iter().position(|note| note.id == id)
    }

    pub fn create(&mut self, now: OffsetDateTime) -> Note {
        let id = {
            let taken: HashSet<&str> = self.notes.iter().map(|note| note.id.as_str()).collect();
            generate_unique_id(now, &taken)
        };
        let note = Note::untitled(id, now);
        // head insert keeps newest-first only while `now` is not older than the head
        self.notes.insert(0, note.clone());
        self.selected_id = Some(note.id.clone());
        tracing::debug!(note_id = %note.id, total = self.notes.len(), "created note");
        note
    }

    pub fn update(&mut self, patch: &NotePatch, now: OffsetDateTime) -> bool {
        let Some(idx) = self.selected_index() else {
            return false;
        };
        self.notes[idx].apply_patch(patch, now);
        sort_newest_first(&mut self.notes);
        true
    }

    pub fn select(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.selected_id.as_deref() == Some(id.as_str()) {
            return false;
        }
        self.selected_id = Some(id);
        true
    }

    /// Removes the selected note and moves the selection to its neighbour:
    /// the note that slid into its slot, else the one before it.
    pub fn delete(&mut self) -> Option<Note> {
        let idx = self.selected_index()?;
        let removed = self.notes.remove(idx);
        self.selected_id = if self.notes.is_empty() {
            None
        } else if idx < self.notes.len() {
            Some(self.notes[idx].id.clone())
        } else {
            idx.checked_sub(1)
                .and_then(|prev| self.notes.get(prev))
                .or_else(|| self.notes.first())
                .map(|note| note.id.clone())
        };
        tracing::debug!(
            note_id = %removed.id,
            next = ?self.selected_id,
            remaining = self.notes.len(),
            "deleted note"
        );
        Some(removed)
    }

    fn selected_index(&self) -> Option<usize> {
        self.selected_id
            .as_deref()
            .and_then(|id| self.position(id))
    }
}

pub fn apply(mut state: NoteCollection, intent: &Intent, now: OffsetDateTime) -> Transition {
    let changed = match intent {
        Intent::Create => {
            state.create(now);
            true
        }
        Intent::Select(id) => state.select(id.clone()),
        Intent::Update(patch) => state.update(patch, now),
        Intent::Delete => state.delete().is_some(),
        Intent::Search(_) => false,
    };
    Transition { state, changed }
}
