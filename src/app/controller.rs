use time::OffsetDateTime;

use crate::notes::{self, Intent, Note, NoteCollection, Transition};
use crate::search;
use crate::storage::{KeyValueSlot, LoadSource, NoteStore, SqliteSlot};

#[derive(Debug)]
pub struct StateView<'a> {
    pub notes: &'a [Note],
    pub visible: Vec<&'a Note>,
    pub selected_id: Option<&'a str>,
    pub selected: Option<&'a Note>,
    pub query: &'a str,
}

impl<'a> StateView<'a> {
    fn new(collection: &'a NoteCollection, query: &'a str) -> Self {
        Self {
            notes: collection.notes(),
            visible: search::filter(collection.notes(), query),
            selected_id: collection.selected_id(),
            selected: collection.selected(),
            query,
        }
    }
}

pub trait StateObserver {
    fn on_state_change(&mut self, view: &StateView<'_>);
}

impl<F> StateObserver for F
where
    F: FnMut(&StateView<'_>),
{
    fn on_state_change(&mut self, view: &StateView<'_>) {
        self(view)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { bytes: usize },
    Failed { message: String },
}

pub struct AppController<S: KeyValueSlot = SqliteSlot> {
    collection: NoteCollection,
    query: String,
    store: NoteStore<S>,
    observers: Vec<Box<dyn StateObserver>>,
    last_save: Option<SaveOutcome>,
    load_source: LoadSource,
}

impl<S: KeyValueSlot> AppController<S> {
    pub fn bootstrap(store: NoteStore<S>) -> Self {
        Self::bootstrap_at(store, OffsetDateTime::now_utc())
    }

    pub fn bootstrap_at(store: NoteStore<S>, now: OffsetDateTime) -> Self {
        let loaded = store.load_at(now);
        if let LoadSource::Seeded(reason) = &loaded.source {
            tracing::info!(?reason, "starting with seeded notes");
        }
        let collection = NoteCollection::from_loaded(loaded.notes, loaded.selected_id);
        let mut controller = Self {
            collection,
            query: String::new(),
            store,
            observers: Vec::new(),
            last_save: None,
            load_source: loaded.source,
        };
        controller.persist();
        controller
    }

    pub fn subscribe(&mut self, observer: Box<dyn StateObserver>) {
        self.observers.push(observer);
    }

    pub fn dispatch(&mut self, intent: Intent) {
        self.dispatch_at(intent, OffsetDateTime::now_utc());
    }

    pub fn dispatch_at(&mut self, intent: Intent, now: OffsetDateTime) {
        let span = tracing::debug_span!("dispatch", intent = intent.name());
        let _guard = span.enter();

        match &intent {
            Intent::Search(query) => self.query.clone_from(query),
            // a fresh note must be visible in the list
            Intent::Create => self.query.clear(),
            _ => {}
        }

        let state = std::mem::take(&mut self.collection);
        let Transition { state, changed } = notes::apply(state, &intent, now);
        self.collection = state;

        if changed {
            self.persist();
        }
        self.notify();
    }

    pub fn collection(&self) -> &NoteCollection {
        &self.collection
    }

    pub fn notes(&self) -> &[Note] {
        self.collection.notes()
    }

    pub fn selected(&self) -> Option<&Note> {
        self.collection.selected()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.collection.selected_id()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn visible_notes(&self) -> Vec<&Note> {
        search::filter(self.collection.notes(), &self.query)
    }

    pub fn view(&self) -> StateView<'_> {
        StateView::new(&self.collection, &self.query)
    }

    pub fn last_save(&self) -> Option<&SaveOutcome> {
        self.last_save.as_ref()
    }

    pub fn load_source(&self) -> &LoadSource {
        &self.load_source
    }

    pub fn store(&self) -> &NoteStore<S> {
        &self.store
    }

    fn persist(&mut self) {
        let outcome = match self
            .store
            .save(self.collection.notes(), self.collection.selected_id())
        {
            Ok(bytes) => {
                tracing::debug!(bytes, notes = self.collection.len(), "persisted notes");
                SaveOutcome::Saved { bytes }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to persist notes; continuing in memory");
                SaveOutcome::Failed {
                    message: err.to_string(),
                }
            }
        };
        self.last_save = Some(outcome);
    }

    fn notify(&mut self) {
        let view = StateView::new(&self.collection, &self.query);
        for observer in self.observers.iter_mut() {
            observer.on_state_change(&view);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::{NotePatch, DEFAULT_TITLE};
    use crate::storage::{MemorySlot, SeedReason};
    use assert_matches::assert_matches;
    use std::cell::RefCell;
    use std::rc::Rc;
    use time::macros::datetime;
    use time::Duration;

    fn t(minutes: i64) -> OffsetDateTime {
        datetime!(2024-02-02 08:00 UTC) + Duration::minutes(minutes)
    }

    fn fresh() -> AppController<MemorySlot> {
        AppController::bootstrap_at(NoteStore::new(MemorySlot::new()), t(0))
    }

    #[test]
    fn bootstrap_seeds_and_persists_on_empty_slot() {
        let controller = fresh();
        assert_eq!(
            controller.load_source(),
            &LoadSource::Seeded(SeedReason::Missing)
        );
        assert_eq!(controller.notes().len(), 1);
        let seeded = controller.selected().expect("seed selected");
        assert_eq!(controller.selected_id(), Some(seeded.id.as_str()));
        assert_matches!(controller.last_save(), Some(SaveOutcome::Saved { .. }));
        assert_eq!(controller.store().slot().write_count(), 1);
    }

    #[test]
    fn create_clears_search_and_selects_new_note() {
        let mut controller = fresh();
        controller.dispatch_at(Intent::Search("welcome".into()), t(1));
        assert_eq!(controller.visible_notes().len(), 1);

        controller.dispatch_at(Intent::Create, t(2));
        assert_eq!(controller.query(), "");
        let selected = controller.selected().expect("new note");
        assert_eq!(selected.title, DEFAULT_TITLE);
        assert_eq!(controller.notes()[0].id, selected.id);
        assert_eq!(controller.visible_notes().len(), 2);
    }

    #[test]
    fn search_does_not_persist() {
        let mut controller = fresh();
        let writes = controller.store().slot().write_count();
        controller.dispatch_at(Intent::Search("zzz".into()), t(1));
        assert!(controller.visible_notes().is_empty());
        assert_eq!(controller.store().slot().write_count(), writes);
    }

    #[test]
    fn every_change_is_written_through() {
        let mut controller = fresh();
        controller.dispatch_at(Intent::Create, t(1));
        controller.dispatch_at(Intent::Update(NotePatch::title("Plan")), t(2));
        assert_eq!(controller.store().slot().write_count(), 3);

        let reloaded = controller.store().load_at(t(3));
        assert_eq!(reloaded.source, LoadSource::Stored);
        assert_eq!(reloaded.notes, controller.notes());
        assert_eq!(reloaded.selected_id.as_deref(), controller.selected_id());
        assert_eq!(reloaded.notes[0].title, "Plan");
    }

    #[test]
    fn failed_writes_keep_session_running() {
        let mut controller = fresh();
        controller.store().slot().set_fail_writes(true);
        controller.dispatch_at(Intent::Create, t(1));
        controller.dispatch_at(Intent::Update(NotePatch::content("still here")), t(2));

        assert_matches!(controller.last_save(), Some(SaveOutcome::Failed { .. }));
        assert_eq!(controller.notes().len(), 2);
        assert_eq!(
            controller.selected().map(|note| note.content.as_str()),
            Some("still here")
        );

        controller.store().slot().set_fail_writes(false);
        controller.dispatch_at(Intent::Update(NotePatch::content("saved now")), t(3));
        assert_matches!(controller.last_save(), Some(SaveOutcome::Saved { .. }));
    }

    #[test]
    fn observers_see_filtered_view_after_each_intent() {
        let seen: Rc<RefCell<Vec<(usize, usize, String)>>> = Rc::default();
        let mut controller = fresh();
        let sink = Rc::clone(&seen);
        controller.subscribe(Box::new(move |view: &StateView<'_>| {
            sink.borrow_mut()
                .push((view.notes.len(), view.visible.len(), view.query.to_string()));
        }));

        controller.dispatch_at(Intent::Create, t(1));
        controller.dispatch_at(Intent::Search("welcome".into()), t(2));
        controller.dispatch_at(Intent::Delete, t(3));

        assert_eq!(
            *seen.borrow(),
            vec![
                (2, 2, String::new()),
                (2, 1, "welcome".to_string()),
                (1, 1, "welcome".to_string()),
            ]
        );
    }

    #[test]
    fn restart_restores_selection_and_order() {
        let slot_payload = {
            let mut controller = fresh();
            controller.dispatch_at(Intent::Create, t(1));
            controller.dispatch_at(Intent::Update(NotePatch::title("second")), t(2));
            controller.dispatch_at(Intent::Create, t(3));
            controller.dispatch_at(Intent::Update(NotePatch::title("third")), t(4));
            let id = controller.notes()[1].id.clone();
            controller.dispatch_at(Intent::Select(id), t(5));
            controller.store().slot().value().expect("payload written")
        };

        let restarted = AppController::bootstrap_at(
            NoteStore::new(MemorySlot::with_value(slot_payload)),
            t(10),
        );
        assert_eq!(restarted.load_source(), &LoadSource::Stored);
        let titles: Vec<&str> = restarted
            .notes()
            .iter()
            .map(|note| note.title.as_str())
            .collect();
        assert_eq!(titles[..2], ["third", "second"]);
        assert_eq!(restarted.selected().map(|note| note.title.as_str()), Some("second"));
    }
}
