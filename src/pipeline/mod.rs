//! One reconcile run: read both exports, reconcile, write what was requested.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bitwarden;
use crate::error::SyncResult;
use crate::interchange::{self, TO_BITWARDEN_FILE, TO_KEEPASS_FILE};
use crate::keepass::KeePassDatabase;
use crate::reconciler::{reconcile, ReconcileOutput};
use crate::record::EntryMap;

/// Suffix appended to the KeePass file stem when no output path is given.
pub const DEFAULT_OUTPUT_SUFFIX: &str = "-out";

/// Options for a reconcile run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Bitwarden JSON export
    pub bitwarden_path: PathBuf,
    /// KeePass 2 XML export
    pub keepass_path: PathBuf,
    /// Where to write the updated KeePass export
    #[serde(default)]
    pub out_xml: Option<PathBuf>,
    /// Also write interchange CSV files for unmatched entries
    #[serde(default)]
    pub write_difference: bool,
    /// Directory for the interchange CSV files
    #[serde(default = "default_csv_dir")]
    pub csv_dir: PathBuf,
}

fn default_csv_dir() -> PathBuf {
    PathBuf::from(".")
}

impl SyncOptions {
    pub fn new(bitwarden_path: impl Into<PathBuf>, keepass_path: impl Into<PathBuf>) -> Self {
        Self {
            bitwarden_path: bitwarden_path.into(),
            keepass_path: keepass_path.into(),
            out_xml: None,
            write_difference: false,
            csv_dir: default_csv_dir(),
        }
    }

    /// The explicit output path, or `<stem>-out<.ext>` next to the KeePass input.
    pub fn output_xml_path(&self) -> PathBuf {
        match &self.out_xml {
            Some(path) => path.clone(),
            None => default_output_path(&self.keepass_path),
        }
    }
}

/// Append [`DEFAULT_OUTPUT_SUFFIX`] to the file stem, keeping directory and extension.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, DEFAULT_OUTPUT_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, DEFAULT_OUTPUT_SUFFIX),
    };
    input.with_file_name(file_name)
}

/// What a run found and which files it wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub output: ReconcileOutput,
    /// Updated KeePass export, if any field changed
    pub xml_written: Option<PathBuf>,
    /// Interchange files written
    pub csv_written: Vec<PathBuf>,
}

/// Run a full reconcile pass with the given options.
///
/// The KeePass export is only written when a field changed; CSV files are only
/// written when requested and when their entry set is non-empty, after the
/// KeePass export has been saved.
pub fn run(options: &SyncOptions) -> SyncResult<SyncReport> {
    let json_entries = bitwarden::read_entries_from_path(&options.bitwarden_path)?;
    let mut db = KeePassDatabase::load(&options.keepass_path)?;
    log::debug!(
        "loaded {} Bitwarden logins from {}",
        json_entries.len(),
        options.bitwarden_path.display()
    );

    let output = reconcile(&mut db, &json_entries)?;

    // The tree goes first so a failed save leaves no interchange files behind.
    let mut xml_written = None;
    if output.changed {
        let path = options.output_xml_path();
        db.save(&path)?;
        log::debug!("wrote {}", path.display());
        xml_written = Some(path);
    }

    let mut csv_written = Vec::new();
    if options.write_difference {
        csv_written = write_difference(options, &json_entries, &output)?;
    }

    Ok(SyncReport {
        output,
        xml_written,
        csv_written,
    })
}

fn write_difference(
    options: &SyncOptions,
    json_entries: &EntryMap,
    output: &ReconcileOutput,
) -> SyncResult<Vec<PathBuf>> {
    let mut written = Vec::new();

    let to_keepass = interchange::rows(
        output
            .missing_in_json
            .iter()
            .filter_map(|name| json_entries.get(name).map(|entry| (name.as_str(), entry))),
    );
    if !to_keepass.is_empty() {
        let path = options.csv_dir.join(TO_KEEPASS_FILE);
        interchange::write_file(&path, &to_keepass)?;
        log::debug!("wrote {}", path.display());
        written.push(path);
    }

    let to_bitwarden = interchange::rows(
        output
            .missing_in_xml
            .iter()
            .map(|(name, entry)| (name.as_str(), entry)),
    );
    if !to_bitwarden.is_empty() {
        let path = options.csv_dir.join(TO_BITWARDEN_FILE);
        interchange::write_file(&path, &to_bitwarden)?;
        log::debug!("wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}

/// Reconcile two in-memory exports.
///
/// Returns the reconcile output and the updated KeePass XML when a field changed.
pub fn reconcile_documents(
    bitwarden_json: &str,
    keepass_xml: &str,
) -> SyncResult<(ReconcileOutput, Option<String>)> {
    let json_entries = bitwarden::read_entries(bitwarden_json)?;
    let mut db = KeePassDatabase::parse(keepass_xml)?;
    let output = reconcile(&mut db, &json_entries)?;

    let xml = if output.changed {
        Some(db.to_xml_string()?)
    } else {
        None
    };
    Ok((output, xml))
}
