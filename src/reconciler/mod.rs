//! Three-way reconciliation between a KeePass tree and Bitwarden entries.
//!
//! For every name present on both sides the Bitwarden username and password
//! are authoritative and are written into the KeePass tree. Names present on
//! one side only are reported so they can be exported for re-import.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::SyncResult;
use crate::keepass::{KeePassDatabase, PASSWORD, USERNAME};
use crate::record::{Entry, EntryMap};

/// A single field rewritten in the KeePass tree.
///
/// Password changes only ever hold a redacted hint, so the full secret cannot
/// leak through logs or console output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldChange {
    Username {
        entry: String,
        old: String,
        new: String,
    },
    Password {
        entry: String,
        old_hint: String,
        new_hint: String,
    },
}

impl FieldChange {
    pub fn entry(&self) -> &str {
        match self {
            FieldChange::Username { entry, .. } | FieldChange::Password { entry, .. } => entry,
        }
    }
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldChange::Username { entry, old, new } => {
                write!(f, "{}: Username changed from '{}' to '{}'", entry, old, new)
            }
            FieldChange::Password {
                entry,
                old_hint,
                new_hint,
            } => write!(
                f,
                "{}: Password changed from '{}...' to '{}...'",
                entry, old_hint, new_hint
            ),
        }
    }
}

/// Statistics about a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// KeePass entries visited
    pub entries_visited: u32,
    /// KeePass entries whose name also exists in Bitwarden
    pub entries_matched: u32,
    pub usernames_updated: u32,
    pub passwords_updated: u32,
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutput {
    /// Whether any field of the KeePass tree was rewritten
    pub changed: bool,
    /// Entries found in KeePass but not in Bitwarden, copied from the tree
    pub missing_in_xml: BTreeMap<String, Entry>,
    /// Names found in Bitwarden but never seen in the KeePass tree
    pub missing_in_json: BTreeSet<String>,
    /// Every field rewritten, in tree order
    pub changes: Vec<FieldChange>,
    pub stats: ReconcileStats,
}

/// Reconcile the KeePass tree against the Bitwarden entries, updating the tree in place.
///
/// All four fields of an entry are validated before it is touched; a malformed
/// entry aborts the pass with an error naming it. Entries without a Bitwarden
/// counterpart are only read.
pub fn reconcile(db: &mut KeePassDatabase, json_entries: &EntryMap) -> SyncResult<ReconcileOutput> {
    let mut output = ReconcileOutput::default();
    let mut xml_names: BTreeSet<String> = BTreeSet::new();

    db.for_each_entry(|node| {
        let current = node.read()?;
        output.stats.entries_visited += 1;
        xml_names.insert(current.name.clone());

        let Some(wanted) = json_entries.get(&current.name) else {
            output.missing_in_xml.insert(current.name.clone(), current);
            return Ok(());
        };
        output.stats.entries_matched += 1;

        if wanted.username != current.username {
            node.set_field(USERNAME, &current.name, &wanted.username)?;
            record_change(
                &mut output,
                FieldChange::Username {
                    entry: current.name.clone(),
                    old: current.username.clone(),
                    new: wanted.username.clone(),
                },
            );
            output.stats.usernames_updated += 1;
        }

        if wanted.password != current.password {
            node.set_field(PASSWORD, &current.name, &wanted.password)?;
            record_change(
                &mut output,
                FieldChange::Password {
                    entry: current.name.clone(),
                    old_hint: password_hint(&current.password),
                    new_hint: password_hint(&wanted.password),
                },
            );
            output.stats.passwords_updated += 1;
        }

        Ok(())
    })?;

    output.missing_in_json = json_entries
        .keys()
        .filter(|name| !xml_names.contains(*name))
        .cloned()
        .collect();

    log::debug!(
        "visited {} KeePass entries, {} matched, {} only in KeePass, {} only in Bitwarden",
        output.stats.entries_visited,
        output.stats.entries_matched,
        output.missing_in_xml.len(),
        output.missing_in_json.len()
    );

    Ok(output)
}

fn record_change(output: &mut ReconcileOutput, change: FieldChange) {
    log::info!("{}", change);
    output.changed = true;
    output.changes.push(change);
}

/// First character of a password, or nothing when that would reveal all of it.
pub fn password_hint(password: &str) -> String {
    let mut chars = password.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(_)) => first.to_string(),
        _ => String::new(),
    }
}
