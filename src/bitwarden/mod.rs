//! Reader for Bitwarden unencrypted JSON exports.
//!
//! Only login items are kept; notes, cards, identities and SSH keys are
//! dropped before the name-keyed map is built.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::error::{SyncError, SyncResult};
use crate::record::{collect_last_wins, extract_url, Entry, EntryMap, RawRecord};

/// Item type discriminant for logins in Bitwarden exports.
pub const LOGIN_ITEM_TYPE: u64 = 1;

/// Top level of a Bitwarden JSON export.
#[derive(Debug, Clone, Deserialize)]
pub struct BitwardenExport {
    #[serde(default)]
    pub encrypted: bool,
    /// All exported items, kept raw so missing keys can be reported by name.
    /// Absent in encrypted exports.
    pub items: Option<Vec<RawRecord>>,
}

/// Parse a JSON export and return its login entries keyed by name.
pub fn read_entries(json: &str) -> SyncResult<EntryMap> {
    let items = parse_items(json)?;
    let total = items.len();

    let mut logins = Vec::new();
    for item in &items {
        if let Some(entry) = login_entry(item)? {
            logins.push(entry);
        }
    }

    log::debug!(
        "read {} login items out of {} exported items",
        logins.len(),
        total
    );
    Ok(collect_last_wins(logins))
}

/// Read a JSON export from disk.
pub fn read_entries_from_path(path: &Path) -> SyncResult<EntryMap> {
    let json = std::fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
    read_entries(&json)
}

fn parse_items(json: &str) -> SyncResult<Vec<RawRecord>> {
    let export: BitwardenExport = serde_json::from_str(json)?;
    if export.encrypted {
        return Err(SyncError::EncryptedExport);
    }
    export
        .items
        .ok_or_else(|| SyncError::Json("missing field `items`".to_string()))
}

/// Convert one exported item into an entry, or `None` when it is not a login.
fn login_entry(item: &RawRecord) -> SyncResult<Option<Entry>> {
    let name = item_name(item)?;

    let item_type = item
        .get("type")
        .ok_or_else(|| missing_key(&name, "type"))?
        .as_u64()
        .ok_or_else(|| invalid_value(&name, "type", "an integer"))?;
    if item_type != LOGIN_ITEM_TYPE {
        log::debug!("skipping non-login item '{}' (type {})", name, item_type);
        return Ok(None);
    }

    if name.is_empty() {
        return Err(SyncError::EmptyName {
            source_kind: "JSON export",
        });
    }

    let login = item
        .get("login")
        .ok_or_else(|| missing_key(&name, "login"))?
        .as_object()
        .ok_or_else(|| invalid_value(&name, "login", "an object"))?;

    let username = credential_field(login, &name, "username")?;
    let password = credential_field(login, &name, "password")?;
    let url = extract_url(login);

    Ok(Some(Entry {
        name,
        username,
        password,
        url,
    }))
}

fn item_name(item: &RawRecord) -> SyncResult<String> {
    match item.get("name") {
        Some(Value::String(name)) => Ok(name.clone()),
        Some(_) => Err(invalid_value("<unnamed>", "name", "a string")),
        None => Err(missing_key("<unnamed>", "name")),
    }
}

/// Read a required credential key. `null` is an empty value, absence is an error.
fn credential_field(login: &RawRecord, item: &str, key: &str) -> SyncResult<String> {
    match login.get(key) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(Value::Null) => Ok(String::new()),
        Some(_) => Err(invalid_value(item, &format!("login.{}", key), "a string")),
        None => Err(missing_key(item, &format!("login.{}", key))),
    }
}

fn missing_key(item: &str, key: &str) -> SyncError {
    SyncError::MissingKey {
        item: item.to_string(),
        key: key.to_string(),
    }
}

fn invalid_value(item: &str, key: &str, expected: &'static str) -> SyncError {
    SyncError::InvalidValue {
        item: item.to_string(),
        key: key.to_string(),
        expected,
    }
}
