use crate::notes::Note;

pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Case-insensitive substring filter over title and content. A blank query
/// returns every note; order is always preserved.
pub fn filter<'a>(notes: &'a [Note], query: &str) -> Vec<&'a Note> {
    let Some(needle) = normalize_query(query) else {
        return notes.iter().collect();
    };
    notes
        .iter()
        .filter(|note| matches_needle(note, &needle))
        .collect()
}

fn matches_needle(note: &Note, needle: &str) -> bool {
    note.title.to_lowercase().contains(needle) || note.content.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn note(id: &str, title: &str, content: &str) -> Note {
        let at = datetime!(2024-01-01 00:00 UTC);
        Note {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            created_at: at,
            updated_at: at,
        }
    }

    fn ids(found: &[&Note]) -> Vec<String> {
        found.iter().map(|note| note.id.clone()).collect()
    }

    #[test]
    fn blank_query_returns_everything_in_order() {
        let notes = vec![note("1", "b", ""), note("2", "a", "")];
        assert_eq!(ids(&filter(&notes, "")), vec!["1", "2"]);
        assert_eq!(ids(&filter(&notes, "   \t")), vec!["1", "2"]);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let notes = vec![note("1", "Hello", "x")];
        assert_eq!(ids(&filter(&notes, "hello")), vec!["1"]);
        assert_eq!(ids(&filter(&notes, "  HELL ")), vec!["1"]);
    }

    #[test]
    fn matches_title_or_content_and_preserves_order() {
        let notes = vec![
            note("1", "Shopping", "Buy Milk"),
            note("2", "Work", "standup"),
            note("3", "milkshake recipe", ""),
        ];
        assert_eq!(ids(&filter(&notes, "milk")), vec!["1", "3"]);
        assert_eq!(ids(&filter(&notes, "STAND")), vec!["2"]);
        assert_eq!(filter(&notes, " ").len(), 3);
    }

    #[test]
    fn no_match_yields_empty() {
        let notes = vec![note("1", "Hello", "world")];
        assert!(filter(&notes, "zzz").is_empty());
    }

    #[test]
    fn inner_whitespace_is_part_of_the_needle() {
        let notes = vec![note("1", "two words", ""), note("2", "twowords", "")];
        assert_eq!(ids(&filter(&notes, "two words")), vec!["1"]);
    }
}
