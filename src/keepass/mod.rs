//! KeePass 2 XML export, loaded as a mutable document.
//!
//! Entries are `Entry` elements directly under a `Group` element, at any group
//! depth. Entries stored in an entry's `History` are snapshots and are never
//! visited. Each entry keeps its fields as
//! `<String><Key>Title</Key><Value>...</Value></String>` children.

pub mod xml;

use std::io::Write;
use std::path::Path;

use crate::error::{SyncError, SyncResult};
use crate::record::Entry;
use xml::{Document, Element};

pub const TITLE: &str = "Title";
pub const USERNAME: &str = "UserName";
pub const PASSWORD: &str = "Password";
pub const URL: &str = "URL";

const ROOT_ELEMENT: &str = "KeePassFile";
const GROUP_ELEMENT: &str = "Group";
const ENTRY_ELEMENT: &str = "Entry";

/// Label used in errors for an entry whose title cannot be read.
const UNTITLED: &str = "<entry without title>";

/// A loaded KeePass XML export.
#[derive(Debug, Clone, PartialEq)]
pub struct KeePassDatabase {
    document: Document,
}

impl KeePassDatabase {
    /// Parse an export from a string.
    pub fn parse(xml: &str) -> SyncResult<Self> {
        let document = Document::parse(xml)?;
        match document.root() {
            Some(root) if root.name == ROOT_ELEMENT => Ok(Self { document }),
            Some(root) => Err(SyncError::Xml(format!(
                "expected <{}> root element, found <{}>",
                ROOT_ELEMENT, root.name
            ))),
            None => Err(SyncError::Xml("document has no root element".to_string())),
        }
    }

    /// Load an export from disk.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let xml = std::fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
        Self::parse(&xml)
    }

    pub fn to_xml_string(&self) -> SyncResult<String> {
        self.document.to_xml_string()
    }

    /// Write the export to `path`, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        let xml = self.to_xml_string()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| SyncError::io(path, e))?;
        file.write_all(xml.as_bytes())
            .map_err(|e| SyncError::io(path, e))?;
        file.persist(path).map_err(|e| SyncError::io(path, e))?;
        Ok(())
    }

    /// Call `f` for every login entry in document order, stopping at the first error.
    pub fn for_each_entry<F>(&mut self, mut f: F) -> SyncResult<()>
    where
        F: FnMut(&mut EntryNode<'_>) -> SyncResult<()>,
    {
        match self.document.root_mut() {
            Some(root) => visit_entries(root, &mut f),
            None => Ok(()),
        }
    }

    /// Read and validate all entries in document order.
    pub fn entries(&self) -> SyncResult<Vec<Entry>> {
        let mut entries = Vec::new();
        if let Some(root) = self.document.root() {
            visit_entry_elements(root, &mut |element| {
                entries.push(read_entry(element)?);
                Ok(())
            })?;
        }
        Ok(entries)
    }
}

fn visit_entry_elements<F>(element: &Element, f: &mut F) -> SyncResult<()>
where
    F: FnMut(&Element) -> SyncResult<()>,
{
    let in_group = element.name == GROUP_ELEMENT;
    for child in element.child_elements() {
        if in_group && child.name == ENTRY_ELEMENT {
            f(child)?;
        } else {
            visit_entry_elements(child, f)?;
        }
    }
    Ok(())
}

fn visit_entries<F>(element: &mut Element, f: &mut F) -> SyncResult<()>
where
    F: FnMut(&mut EntryNode<'_>) -> SyncResult<()>,
{
    let in_group = element.name == GROUP_ELEMENT;
    for child in element.child_elements_mut() {
        if in_group && child.name == ENTRY_ELEMENT {
            f(&mut EntryNode { element: child })?;
        } else {
            visit_entries(child, f)?;
        }
    }
    Ok(())
}

/// A mutable view of one `Entry` element.
#[derive(Debug)]
pub struct EntryNode<'a> {
    element: &'a mut Element,
}

impl EntryNode<'_> {
    /// Read and validate all four fields.
    pub fn read(&self) -> SyncResult<Entry> {
        read_entry(self.element)
    }

    /// Text of the `Value` belonging to `key`.
    pub fn field(&self, key: &str, entry: &str) -> SyncResult<String> {
        field_text(self.element, key, entry)
    }

    /// Overwrite the `Value` belonging to `key`. Attributes such as
    /// `ProtectInMemory` are kept.
    pub fn set_field(&mut self, key: &str, entry: &str, value: &str) -> SyncResult<()> {
        let target = self
            .element
            .child_elements_mut()
            .find(|s| is_string_for(s, key))
            .and_then(|s| s.child_mut("Value"))
            .ok_or_else(|| missing_field(entry, key))?;
        target.set_text(value);
        Ok(())
    }
}

fn read_entry(element: &Element) -> SyncResult<Entry> {
    let name = field_text(element, TITLE, UNTITLED)?;
    if name.is_empty() {
        return Err(SyncError::EmptyName {
            source_kind: "KeePass export",
        });
    }

    let username = field_text(element, USERNAME, &name)?;
    let password = field_text(element, PASSWORD, &name)?;
    let url = field_text(element, URL, &name)?;

    Ok(Entry {
        name,
        username,
        password,
        url,
    })
}

fn field_text(element: &Element, key: &str, entry: &str) -> SyncResult<String> {
    element
        .child_elements()
        .find(|s| is_string_for(s, key))
        .and_then(|s| s.child("Value"))
        .map(Element::text)
        .ok_or_else(|| missing_field(entry, key))
}

fn is_string_for(element: &Element, key: &str) -> bool {
    element.name == "String" && element.child("Key").is_some_and(|k| k.text() == key)
}

fn missing_field(entry: &str, key: &str) -> SyncError {
    SyncError::MissingField {
        entry: entry.to_string(),
        field: key.to_string(),
    }
}
