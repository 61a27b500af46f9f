//! Vault Reconcile Library
//!
//! Reconciles login entries between a Bitwarden JSON export and a KeePass 2
//! XML export:
//! - **record**: normalized login entry and URL extraction
//! - **bitwarden**: reads login items from the JSON export
//! - **keepass**: loads the XML export as a mutable document tree
//! - **reconciler**: three-way diff that pushes Bitwarden credentials into KeePass
//! - **interchange**: generic CSV rows for re-importing unmatched entries
//! - **pipeline**: one complete run over files on disk
//!
//! # Example (conceptual)
//! ```ignore
//! let json_entries = bitwarden::read_entries(&json)?;
//! let mut db = KeePassDatabase::parse(&xml)?;
//! let output = reconcile(&mut db, &json_entries)?;
//! if output.changed {
//!     db.save(Path::new("db-out.xml"))?;
//! }
//! ```

pub mod bitwarden;
pub mod error;
pub mod interchange;
pub mod keepass;
pub mod pipeline;
pub mod reconciler;
pub mod record;

pub use error::{SyncError, SyncResult};
pub use interchange::{InterchangeRow, TO_BITWARDEN_FILE, TO_KEEPASS_FILE};
pub use keepass::{EntryNode, KeePassDatabase};
pub use pipeline::{reconcile_documents, run, SyncOptions, SyncReport};
pub use reconciler::{reconcile, FieldChange, ReconcileOutput, ReconcileStats};
pub use record::{extract_url, Entry, EntryMap};
