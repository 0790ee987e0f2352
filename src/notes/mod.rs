use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub mod collection;

pub use collection::{apply, Intent, NoteCollection, Transition};

pub const DEFAULT_TITLE: &str = "Untitled";

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_PREFIX: &str = "n_";
const ID_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Note {
    pub fn untitled(id: String, now: OffsetDateTime) -> Self {
        Self {
            id,
            title: DEFAULT_TITLE.to_string(),
            content: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_patch(&mut self, patch: &NotePatch, now: OffsetDateTime) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(content) = &patch.content {
            self.content.clone_from(content);
        }
        self.updated_at = now;
    }

    pub fn preview_lines(&self, limit: usize) -> Vec<&str> {
        self.content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(limit)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl NotePatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: None,
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            title: None,
            content: Some(content.into()),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

pub fn generate_id(now: OffsetDateTime) -> String {
    let millis = (now.unix_timestamp_nanos() / 1_000_000).max(0) as u128;
    format!("{ID_PREFIX}{}_{}", to_base36(millis), random_suffix())
}

pub fn generate_unique_id<S>(now: OffsetDateTime, taken: &HashSet<S>) -> String
where
    S: std::borrow::Borrow<str> + std::hash::Hash + Eq,
{
    loop {
        let candidate = generate_id(now);
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        tracing::debug!(%candidate, "generated note id collided, retrying");
    }
}

/// Stable sort, newest `updated_at` first. Equal timestamps keep their order.
pub fn sort_newest_first(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

fn random_suffix() -> String {
    let encoded = to_base36(Uuid::new_v4().as_u128());
    let start = encoded.len().saturating_sub(ID_SUFFIX_LEN);
    format!("{:0>width$}", &encoded[start..], width = ID_SUFFIX_LEN)
}

fn to_base36(mut value: u128) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(26);
    while value > 0 {
        digits.push(BASE36_ALPHABET[(value % 36) as usize] as char);
        value /= 36;
    }
    digits.iter().rev().collect()
}
