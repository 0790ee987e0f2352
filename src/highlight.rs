use std::ops::Range;

use regex::{Regex, RegexBuilder};

use crate::search::normalize_query;

pub fn build_query_regex(query: &str) -> Option<Regex> {
    normalize_query(query)?;
    RegexBuilder::new(&regex::escape(query.trim()))
        .case_insensitive(true)
        .build()
        .ok()
}

pub fn split_matches(text: &str, regex: Option<&Regex>) -> Vec<(Range<usize>, bool)> {
    let Some(regex) = regex else {
        return vec![(0..text.len(), false)];
    };
    let mut segments = Vec::new();
    let mut last = 0;
    for mat in regex.find_iter(text) {
        if mat.start() > last {
            segments.push((last..mat.start(), false));
        }
        segments.push((mat.range(), true));
        last = mat.end();
    }
    if last < text.len() || segments.is_empty() {
        segments.push((last..text.len(), false));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pieces<'a>(text: &'a str, regex: Option<&Regex>) -> Vec<(&'a str, bool)> {
        split_matches(text, regex)
            .into_iter()
            .map(|(range, hit)| (&text[range], hit))
            .collect()
    }

    #[test]
    fn blank_query_builds_nothing() {
        assert!(build_query_regex("").is_none());
        assert!(build_query_regex("   ").is_none());
    }

    #[test]
    fn matches_ignore_case() {
        let regex = build_query_regex("note").expect("regex");
        assert_eq!(
            pieces("My Notebook notes", Some(&regex)),
            vec![("My ", false), ("Note", true), ("book ", false), ("note", true), ("s", false)]
        );
    }

    #[test]
    fn query_metacharacters_are_literal() {
        let regex = build_query_regex("a+b").expect("regex");
        assert_eq!(pieces("aab a+b", Some(&regex)), vec![("aab ", false), ("a+b", true)]);
    }

    #[test]
    fn no_regex_yields_single_plain_segment() {
        assert_eq!(pieces("plain", None), vec![("plain", false)]);
        assert_eq!(pieces("", None), vec![("", false)]);
    }
}
