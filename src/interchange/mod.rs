//! Generic interchange CSV for re-importing unmatched entries.
//!
//! The column layout is the generic Bitwarden CSV import format, which KeePass
//! can import as well.

use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::error::{SyncError, SyncResult};
use crate::record::Entry;

/// Column names in output order.
pub const COLUMNS: [&str; 10] = [
    "folder",
    "favorite",
    "type",
    "name",
    "notes",
    "fields",
    "login_uri",
    "login_username",
    "login_password",
    "login_totp",
];

/// Type discriminant written for every row.
pub const LOGIN_TYPE: &str = "login";

/// File holding entries known only to Bitwarden.
pub const TO_KEEPASS_FILE: &str = "to-keepass.csv";
/// File holding entries known only to KeePass.
pub const TO_BITWARDEN_FILE: &str = "to-bitwarden.csv";

/// One interchange row. Field order matches [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterchangeRow {
    pub folder: String,
    pub favorite: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub notes: String,
    pub fields: String,
    pub login_uri: String,
    pub login_username: String,
    pub login_password: String,
    pub login_totp: String,
}

impl InterchangeRow {
    /// Build a login row for `name`. Folder, favorite, notes, fields and TOTP stay empty.
    pub fn from_entry(name: &str, entry: &Entry) -> Self {
        Self {
            folder: String::new(),
            favorite: String::new(),
            kind: LOGIN_TYPE.to_string(),
            name: name.to_string(),
            notes: String::new(),
            fields: String::new(),
            login_uri: entry.url.clone(),
            login_username: entry.username.clone(),
            login_password: entry.password.clone(),
            login_totp: String::new(),
        }
    }
}

/// Build rows for `(name, entry)` pairs, sorted by name.
pub fn rows<'a, I>(entries: I) -> Vec<InterchangeRow>
where
    I: IntoIterator<Item = (&'a str, &'a Entry)>,
{
    let mut rows: Vec<InterchangeRow> = entries
        .into_iter()
        .map(|(name, entry)| InterchangeRow::from_entry(name, entry))
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}

/// Write rows as comma-delimited CSV with a header row.
pub fn write_rows<W: Write>(writer: W, rows: &[InterchangeRow]) -> SyncResult<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b',')
        .from_writer(writer);

    // Written explicitly so an empty row set still gets its header.
    wtr.write_record(COLUMNS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(|e| SyncError::Csv(e.to_string()))?;
    Ok(())
}

/// Write rows to `path`, replacing any existing file.
pub fn write_file(path: &Path, rows: &[InterchangeRow]) -> SyncResult<()> {
    let file = std::fs::File::create(path).map_err(|e| SyncError::io(path, e))?;
    write_rows(file, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(rows: &[InterchangeRow]) -> String {
        let mut buffer = Vec::new();
        write_rows(&mut buffer, rows).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_header_and_row_layout() {
        let entry = Entry::new("Mail", "alice", "p1", "https://mail.test");
        let output = render(&[InterchangeRow::from_entry("Mail", &entry)]);

        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some("folder,favorite,type,name,notes,fields,login_uri,login_username,login_password,login_totp")
        );
        assert_eq!(lines.next(), Some(",,login,Mail,,,https://mail.test,alice,p1,"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_values_are_quoted_when_needed() {
        let entry = Entry::new("Shop, Inc", "bob", "a\"b", "");
        let output = render(&[InterchangeRow::from_entry("Shop, Inc", &entry)]);

        assert!(output.contains(",,login,\"Shop, Inc\",,,,bob,\"a\"\"b\","));
    }

    #[test]
    fn test_empty_row_set_has_header_only() {
        let output = render(&[]);
        assert_eq!(output.lines().count(), 1);
    }

    #[test]
    fn test_rows_are_sorted_by_name() {
        let b = Entry::new("b", "u", "p", "");
        let a = Entry::new("a", "u", "p", "");
        let sorted = rows(vec![("b", &b), ("a", &a)]);
        assert_eq!(sorted[0].name, "a");
        assert_eq!(sorted[1].name, "b");
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TO_KEEPASS_FILE);
        let entry = Entry::new("Bank", "carol", "p2", "");

        write_file(&path, &[InterchangeRow::from_entry("Bank", &entry)]).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.trim_end().ends_with(",,login,Bank,,,,carol,p2,"));
    }
}
