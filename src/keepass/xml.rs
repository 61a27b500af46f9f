//! Owned, mutable XML document tree.
//!
//! The tree keeps every node it does not understand (declaration, comments,
//! processing instructions, whitespace) so that a load/save cycle only changes
//! the values that were explicitly rewritten.

use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{SyncError, SyncResult};

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    /// Declaration, comment, processing instruction or doctype, written back as read
    Verbatim(Event<'static>),
}

/// An element with its attributes (in document order) and children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    /// Iterate over child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Iterate mutably over child elements.
    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.child_elements_mut().find(|e| e.name == name)
    }

    /// Concatenated text and CDATA content of this element's direct children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) | Node::CData(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all text content with `text`, keeping child elements.
    pub fn set_text(&mut self, text: &str) {
        self.children
            .retain(|node| !matches!(node, Node::Text(_) | Node::CData(_)));
        if !text.is_empty() {
            self.children.insert(0, Node::Text(text.to_string()));
        }
    }
}

/// A parsed XML document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// Top-level nodes, including the root element
    pub nodes: Vec<Node>,
}

impl Document {
    /// Parse a document from a string. A leading byte-order mark is ignored.
    pub fn parse(xml: &str) -> SyncResult<Self> {
        let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
        let mut reader = Reader::from_str(xml);

        let mut document = Document::default();
        let mut stack: Vec<Element> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(start_element(&start)?),
                Event::Empty(start) => {
                    let element = start_element(&start)?;
                    push_node(&mut document, &mut stack, Node::Element(element));
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| SyncError::Xml("unexpected closing tag".to_string()))?;
                    push_node(&mut document, &mut stack, Node::Element(element));
                }
                Event::Text(text) => {
                    let raw = std::str::from_utf8(&text).map_err(|e| SyncError::Xml(e.to_string()))?;
                    let text = unescape(&normalize_line_endings(raw))
                        .map_err(|e| SyncError::Xml(e.to_string()))?
                        .into_owned();
                    push_node(&mut document, &mut stack, Node::Text(text));
                }
                Event::CData(cdata) => {
                    let text = std::str::from_utf8(&cdata)
                        .map_err(|e| SyncError::Xml(e.to_string()))?
                        .to_string();
                    push_node(&mut document, &mut stack, Node::CData(text));
                }
                Event::Eof => break,
                other => push_node(&mut document, &mut stack, Node::Verbatim(other.into_owned())),
            }
        }

        if let Some(open) = stack.last() {
            return Err(SyncError::Xml(format!("unclosed element <{}>", open.name)));
        }
        if document.root().is_none() {
            return Err(SyncError::Xml("document has no root element".to_string()));
        }
        Ok(document)
    }

    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Serialize the document back to a string.
    pub fn to_xml_string(&self) -> SyncResult<String> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }
        String::from_utf8(writer.into_inner()).map_err(|e| SyncError::Xml(e.to_string()))
    }
}

/// Literal line breaks read as `\n`; a carriage return only survives as `&#xD;`.
fn normalize_line_endings(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

fn start_element(start: &BytesStart<'_>) -> SyncResult<Element> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| SyncError::Xml(e.to_string()))?
        .to_string();

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|e| SyncError::Xml(e.to_string()))?
            .to_string();
        let value = attribute.unescape_value()?.into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn push_node(document: &mut Document, stack: &mut [Element], node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => document.nodes.push(node),
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> SyncResult<()> {
    match node {
        Node::Element(element) => write_element(writer, element),
        Node::Text(text) => {
            let escaped = escape(text.as_str()).replace('\r', "&#xD;");
            write_event(writer, Event::Text(BytesText::from_escaped(escaped)))
        }
        Node::CData(text) => write_event(writer, Event::CData(BytesCData::new(text.as_str()))),
        Node::Verbatim(event) => write_event(writer, event.clone()),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> SyncResult<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return write_event(writer, Event::Empty(start));
    }

    write_event(writer, Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    write_event(writer, Event::End(BytesEnd::new(element.name.as_str())))
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> SyncResult<()> {
    writer
        .write_event(event)
        .map_err(|e| SyncError::Xml(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_write_preserves_structure() {
        let xml = "<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>\n\
                   <!-- exported -->\n\
                   <Root a=\"1\"><Item>text &amp; more</Item><Empty/><Raw><![CDATA[<raw>]]></Raw></Root>";
        let document = Document::parse(xml).unwrap();
        let written = document.to_xml_string().unwrap();

        assert!(written.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>"));
        assert!(written.contains("<!-- exported -->"));
        assert!(written.contains("<Root a=\"1\">"));
        assert!(written.contains("<Item>text &amp; more</Item>"));
        assert!(written.contains("<Empty/>"));
        assert!(written.contains("<![CDATA[<raw>]]>"));

        assert_eq!(Document::parse(&written).unwrap(), document);
    }

    #[test]
    fn test_text_is_unescaped() {
        let document = Document::parse("<a><b>x &lt; y</b></a>").unwrap();
        let b = document.root().unwrap().child("b").unwrap();
        assert_eq!(b.text(), "x < y");
    }

    #[test]
    fn test_set_text_on_empty_element() {
        let mut document = Document::parse("<a><b/></a>").unwrap();
        document.root_mut().unwrap().child_mut("b").unwrap().set_text("new");
        assert_eq!(document.to_xml_string().unwrap(), "<a><b>new</b></a>");
    }

    #[test]
    fn test_set_text_to_empty_collapses_element() {
        let mut document = Document::parse("<a><b>old</b></a>").unwrap();
        document.root_mut().unwrap().child_mut("b").unwrap().set_text("");
        assert_eq!(document.to_xml_string().unwrap(), "<a><b/></a>");
    }

    #[test]
    fn test_carriage_return_reference_survives_save() {
        let document = Document::parse("<a><b>x&#xD;y</b>\r\n</a>").unwrap();
        let root = document.root().unwrap();
        assert_eq!(root.child("b").unwrap().text(), "x\ry");
        assert_eq!(root.children[1], Node::Text("\n".to_string()));

        let written = document.to_xml_string().unwrap();
        assert_eq!(written, "<a><b>x&#xD;y</b>\n</a>");
        assert_eq!(Document::parse(&written).unwrap(), document);
    }

    #[test]
    fn test_byte_order_mark_is_ignored() {
        let document = Document::parse("\u{feff}<a/>").unwrap();
        assert_eq!(document.root().unwrap().name, "a");
    }

    #[test]
    fn test_unclosed_element_is_error() {
        assert!(matches!(Document::parse("<a><b>"), Err(SyncError::Xml(_))));
    }

    #[test]
    fn test_document_without_root_is_error() {
        assert!(matches!(Document::parse("<!-- nothing -->"), Err(SyncError::Xml(_))));
    }

    #[test]
    fn test_mismatched_closing_tag_is_error() {
        assert!(Document::parse("<a><b></a></b>").is_err());
    }
}
