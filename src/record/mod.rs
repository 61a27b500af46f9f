//! Normalized login record shared by both export formats.
//!
//! Both readers reduce their native representation to an [`Entry`], and the
//! reconciler joins the two sides on [`Entry::name`] using exact, case-sensitive
//! string comparison.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// A raw JSON object as found in the export (an item or its `login` object).
pub type RawRecord = serde_json::Map<String, Value>;

/// Entries keyed by name.
pub type EntryMap = HashMap<String, Entry>;

/// One login credential.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    /// Join key across both stores
    pub name: String,
    pub username: String,
    pub password: String,
    /// Empty when the source carries no URL
    #[serde(default)]
    pub url: String,
}

impl Entry {
    pub fn new(
        name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            password: password.into(),
            url: url.into(),
        }
    }
}

// Passwords stay out of debug output.
impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("url", &self.url)
            .finish()
    }
}

/// Extract the best-effort URL of a raw login object.
///
/// A direct `url` string wins; otherwise the `uri` of the first element of
/// `uris` is used. Anything else yields an empty string.
pub fn extract_url(raw: &RawRecord) -> String {
    if let Some(url) = raw.get("url").and_then(Value::as_str) {
        return url.to_string();
    }

    raw.get("uris")
        .and_then(Value::as_array)
        .and_then(|uris| uris.first())
        .and_then(|first| first.get("uri"))
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_default()
}

/// Build a name-keyed map from a sequence of entries.
///
/// When a name repeats, the entry seen last replaces the earlier one.
pub fn collect_last_wins<I>(entries: I) -> EntryMap
where
    I: IntoIterator<Item = Entry>,
{
    let mut map = EntryMap::new();
    for entry in entries {
        if let Some(previous) = map.insert(entry.name.clone(), entry) {
            log::debug!(
                "duplicate entry name '{}', keeping last occurrence",
                previous.name
            );
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_extract_url_direct_field() {
        let login = raw(json!({ "username": "u", "password": "p", "url": "https://a.test" }));
        assert_eq!(extract_url(&login), "https://a.test");
    }

    #[test]
    fn test_extract_url_prefers_direct_field_over_uris() {
        let login = raw(json!({
            "url": "https://direct.test",
            "uris": [{ "uri": "https://listed.test" }]
        }));
        assert_eq!(extract_url(&login), "https://direct.test");
    }

    #[test]
    fn test_extract_url_from_uris() {
        let login = raw(json!({ "uris": [{ "uri": "https://x.test" }, { "uri": "https://y.test" }] }));
        assert_eq!(extract_url(&login), "https://x.test");
    }

    #[test]
    fn test_extract_url_missing_degrades_to_empty() {
        assert_eq!(extract_url(&raw(json!({ "username": "u" }))), "");
        assert_eq!(extract_url(&raw(json!({ "uris": [] }))), "");
        assert_eq!(extract_url(&raw(json!({ "uris": null }))), "");
        assert_eq!(extract_url(&raw(json!({ "uris": [{ "match": null }] }))), "");
    }

    #[test]
    fn test_debug_hides_password() {
        let entry = Entry::new("Mail", "alice", "hunter22", "");
        let printed = format!("{:?}", entry);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter22"));
    }

    #[test]
    fn test_collect_last_wins_keeps_last() {
        let map = collect_last_wins(vec![
            Entry::new("Mail", "first", "p1", ""),
            Entry::new("Bank", "b", "p2", ""),
            Entry::new("Mail", "second", "p3", ""),
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(map["Mail"].username, "second");
        assert_eq!(map["Mail"].password, "p3");
    }

    proptest! {
        #[test]
        fn test_collect_last_wins_properties(
            rows in prop::collection::vec(("[a-c]", "[a-z]{0,6}"), 0..30)
        ) {
            let entries: Vec<Entry> = rows
                .iter()
                .map(|(name, user)| Entry::new(name.as_str(), user.as_str(), "", ""))
                .collect();
            let map = collect_last_wins(entries);

            for (name, entry) in &map {
                let last = rows.iter().rev().find(|(n, _)| n == name).map(|(_, u)| u);
                prop_assert_eq!(Some(&entry.username), last);
            }
            for (name, _) in &rows {
                prop_assert!(map.contains_key(name));
            }
        }
    }
}
