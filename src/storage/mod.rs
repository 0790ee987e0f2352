use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::config::{ConfigPaths, StorageOptions};
use crate::notes::{
    generate_unique_id, sort_newest_first, Note, DEFAULT_TITLE,
};

mod schema;
pub mod slot;

pub use slot::{KeyValueSlot, MemorySlot, SqliteSlot};

pub const DEFAULT_STORAGE_KEY: &str = "notes_app_notes_v1";

const SEED_TITLE: &str = "Welcome to Note Manager";
const SEED_CONTENT: &str = "This is your first note. Use the left panel to browse and search notes.\n\n\
Tips:\n\
- Press Ctrl-n (or n in the list) to create a note.\n\
- Edit the title and content on the right.\n\
- Your notes are saved automatically on this machine.\n";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("creating data directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serializing notes: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("payload of {size} bytes exceeds the {limit}-byte storage quota")]
    QuotaExceeded { size: usize, limit: usize },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedReason {
    Missing,
    Unreadable(String),
    Malformed(String),
    NotAnObject,
    NotesNotAList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    Stored,
    Seeded(SeedReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub notes: Vec<Note>,
    pub selected_id: Option<String>,
    pub source: LoadSource,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord<'a> {
    notes: &'a [Note],
    selected_id: Option<&'a str>,
}

pub struct NoteStore<S = SqliteSlot> {
    slot: S,
}

impl<S: KeyValueSlot> NoteStore<S> {
    pub fn new(slot: S) -> Self {
        Self { slot }
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    pub fn load(&self) -> Loaded {
        self.load_at(OffsetDateTime::now_utc())
    }

    /// Never fails: anything unusable in the slot resolves to one seeded note.
    pub fn load_at(&self, now: OffsetDateTime) -> Loaded {
        match self.read_record(now) {
            Ok(loaded) => {
                tracing::debug!(
                    notes = loaded.notes.len(),
                    selected = ?loaded.selected_id,
                    "loaded notes from storage"
                );
                loaded
            }
            Err(SeedReason::Missing) => {
                tracing::info!("no stored notes, seeding example note");
                seeded(now, SeedReason::Missing)
            }
            Err(reason) => {
                tracing::warn!(?reason, "stored notes unusable, seeding example note");
                seeded(now, reason)
            }
        }
    }

    pub fn save(&self, notes: &[Note], selected_id: Option<&str>) -> Result<usize, StoreError> {
        let payload = serialize_record(notes, selected_id)?;
        self.slot.write(&payload)?;
        Ok(payload.len())
    }

    fn read_record(&self, now: OffsetDateTime) -> Result<Loaded, SeedReason> {
        let raw = match self.slot.read() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Err(SeedReason::Missing),
            Err(err) => return Err(SeedReason::Unreadable(err.to_string())),
        };
        let value: Value =
            serde_json::from_str(&raw).map_err(|err| SeedReason::Malformed(err.to_string()))?;
        let Value::Object(record) = value else {
            return Err(SeedReason::NotAnObject);
        };
        let Some(Value::Array(raw_notes)) = record.get("notes") else {
            return Err(SeedReason::NotesNotAList);
        };
        let selected_id = match record.get("selectedId") {
            Some(Value::String(id)) => Some(id.clone()),
            _ => None,
        };
        Ok(Loaded {
            notes: normalize(raw_notes, now),
            selected_id,
            source: LoadSource::Stored,
        })
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<NoteStore<SqliteSlot>> {
    let slot = SqliteSlot::open(storage).with_context(|| {
        format!(
            "preparing note storage under {}",
            paths.data_dir.display()
        )
    })?;
    tracing::debug!(
        database = %slot.database_path().display(),
        key = slot.key(),
        "note storage ready"
    );
    Ok(NoteStore::new(slot))
}

pub fn serialize_record(notes: &[Note], selected_id: Option<&str>) -> Result<String, StoreError> {
    let notes = normalize_notes(notes.to_vec());
    let record = StoredRecord {
        notes: &notes,
        selected_id: selected_id.filter(|id| !id.is_empty()),
    };
    Ok(serde_json::to_string(&record)?)
}

pub fn normalize(raw_notes: &[Value], now: OffsetDateTime) -> Vec<Note> {
    let repaired = raw_notes
        .iter()
        .filter(|value| !is_falsy(value))
        .map(|value| repair_record(value, now))
        .collect();
    normalize_notes_at(repaired, now)
}

pub fn normalize_notes(notes: Vec<Note>) -> Vec<Note> {
    normalize_notes_at(notes, OffsetDateTime::now_utc())
}

pub fn seed_example_note(now: OffsetDateTime) -> Note {
    let taken: HashSet<String> = HashSet::new();
    Note {
        id: generate_unique_id(now, &taken),
        title: SEED_TITLE.to_string(),
        content: SEED_CONTENT.to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn seeded(now: OffsetDateTime, reason: SeedReason) -> Loaded {
    let note = seed_example_note(now);
    let selected_id = Some(note.id.clone());
    Loaded {
        notes: vec![note],
        selected_id,
        source: LoadSource::Seeded(reason),
    }
}

fn normalize_notes_at(mut notes: Vec<Note>, now: OffsetDateTime) -> Vec<Note> {
    let mut reserved: HashSet<String> = notes
        .iter()
        .filter(|note| !note.id.is_empty())
        .map(|note| note.id.clone())
        .collect();
    let mut seen = HashSet::with_capacity(notes.len());
    for note in &mut notes {
        if note.id.is_empty() || !seen.insert(note.id.clone()) {
            let fresh = generate_unique_id(now, &reserved);
            tracing::debug!(old = %note.id, new = %fresh, "regenerated note id");
            reserved.insert(fresh.clone());
            seen.insert(fresh.clone());
            note.id = fresh;
        }
    }
    sort_newest_first(&mut notes);
    notes
}

fn repair_record(value: &Value, now: OffsetDateTime) -> Note {
    let empty = Map::new();
    let record = value.as_object().unwrap_or(&empty);
    let updated_at = parse_timestamp(record.get("updatedAt")).unwrap_or(now);
    let created_at = parse_timestamp(record.get("createdAt")).unwrap_or(updated_at);
    Note {
        id: stored_id(record.get("id")).unwrap_or_default(),
        title: text_field(record.get("title")).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        content: text_field(record.get("content")).unwrap_or_default(),
        created_at,
        updated_at,
    }
}

fn stored_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(number) if !is_zero(number) => Some(number.to_string()),
        _ => None,
    }
}

fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        _ => None,
    }
}

fn parse_timestamp(value: Option<&Value>) -> Option<OffsetDateTime> {
    let parsed = match value? {
        Value::String(raw) => OffsetDateTime::parse(raw.trim(), &Rfc3339).ok()?,
        Value::Number(number) => {
            let millis = number
                .as_i64()
                .or_else(|| number.as_f64().map(|value| value as i64))?;
            OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()?
        }
        _ => return None,
    };
    (0..=9999).contains(&parsed.year()).then_some(parsed)
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => is_zero(number),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn is_zero(number: &serde_json::Number) -> bool {
    number.as_f64().map(|value| value == 0.0).unwrap_or(false)
}
