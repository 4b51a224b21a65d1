//! Parsed input feed.
//!
//! [`SourceDocument`] is an immutable arena tree built in one pass with
//! `quick-xml`. Nodes are stored in document order (pre-order), so the
//! descendants of a node occupy a contiguous id range and document-order
//! comparison is a plain integer comparison. Gzip input is detected by its
//! magic bytes and decoded transparently.
//!
//! Only elements and text survive parsing; comments, processing
//! instructions and the DOCTYPE carry nothing a sitemap needs. Namespace
//! declarations are not exposed as attributes.

use flate2::bufread::MultiGzDecoder;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Index of a node in the document arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// The document node, parent of the root element.
    pub const DOCUMENT: NodeId = NodeId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Anything a selector can yield: a tree node or one attribute of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Node(NodeId),
    Attribute(NodeId, u32),
}

impl NodeRef {
    /// Document-order key: an element precedes its attributes, which
    /// precede its children.
    fn order_key(self) -> (u32, u32) {
        match self {
            NodeRef::Node(id) => (id.0, 0),
            NodeRef::Attribute(id, slot) => (id.0, slot + 1),
        }
    }
}

impl PartialOrd for NodeRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element,
    Text,
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    /// Interned element name, unused for other kinds.
    name: u32,
    /// Text content for text nodes.
    text: Box<str>,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    next_sibling: Option<NodeId>,
    /// One past the last descendant.
    end: u32,
    attrs_start: u32,
    attrs_len: u32,
}

#[derive(Debug)]
pub struct Attribute {
    pub name: Box<str>,
    pub value: Box<str>,
}

#[derive(Debug)]
pub struct SourceDocument {
    path: PathBuf,
    nodes: Vec<Node>,
    attributes: Vec<Attribute>,
    names: Vec<Box<str>>,
}

impl SourceDocument {
    /// Parse the feed at `path`, plain or gzip-compressed.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::SourceNotFound {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut reader = BufReader::new(file);
        let gzipped = reader
            .fill_buf()
            .map_err(|e| Error::SourceNotFound {
                path: path.to_path_buf(),
                source: e,
            })?
            .starts_with(&GZIP_MAGIC);

        debug!(path = %path.display(), gzipped, "parsing source document");
        let doc = if gzipped {
            Self::parse_reader(path, BufReader::new(MultiGzDecoder::new(reader)))?
        } else {
            Self::parse_reader(path, reader)?
        };
        debug!(
            nodes = doc.nodes.len(),
            attributes = doc.attributes.len(),
            "source document parsed"
        );
        Ok(doc)
    }

    /// Parse an in-memory document.
    pub fn parse_str(xml: &str) -> Result<Self> {
        Self::parse_reader(Path::new("<memory>"), xml.as_bytes())
    }

    fn parse_reader<R: BufRead>(path: &Path, input: R) -> Result<Self> {
        let mut reader = Reader::from_reader(input);
        let mut builder = TreeBuilder::new();
        let mut buf = Vec::new();

        let malformed = |reader: &Reader<R>, message: String| Error::SourceMalformed {
            path: path.to_path_buf(),
            message: format!("{} (at byte {})", message, reader.buffer_position()),
        };

        loop {
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(quick_xml::Error::Io(e)) => {
                    return Err(match e.kind() {
                        std::io::ErrorKind::InvalidData
                        | std::io::ErrorKind::InvalidInput
                        | std::io::ErrorKind::UnexpectedEof => {
                            malformed(&reader, e.to_string())
                        }
                        kind => Error::SourceNotFound {
                            path: path.to_path_buf(),
                            source: std::io::Error::new(kind, e.to_string()),
                        },
                    });
                }
                Err(e) => return Err(malformed(&reader, e.to_string())),
            };
            let decoder = reader.decoder();
            match event {
                Event::Start(e) => {
                    let (name, attrs) =
                        read_start(&e, decoder).map_err(|m| malformed(&reader, m))?;
                    builder
                        .open_element(name, attrs)
                        .map_err(|m| malformed(&reader, m))?;
                }
                Event::Empty(e) => {
                    let (name, attrs) =
                        read_start(&e, decoder).map_err(|m| malformed(&reader, m))?;
                    builder
                        .open_element(name, attrs)
                        .map_err(|m| malformed(&reader, m))?;
                    builder.close_element();
                }
                Event::End(_) => builder.close_element(),
                Event::Text(e) => {
                    let text = e.unescape().map_err(|e| malformed(&reader, e.to_string()))?;
                    builder.text(&text).map_err(|m| malformed(&reader, m))?;
                }
                Event::CData(e) => {
                    let text = decoder
                        .decode(&e)
                        .map_err(|e| malformed(&reader, e.to_string()))?;
                    builder.text(&text).map_err(|m| malformed(&reader, m))?;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        builder
            .finish(path.to_path_buf())
            .map_err(|m| malformed(&reader, m))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of arena nodes, the document node included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// The single top-level element.
    pub fn root_element(&self) -> NodeId {
        self.nodes[0].first_child.unwrap_or(NodeId::DOCUMENT)
    }

    /// All node ids in document order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + Clone {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Every node in document order, each element followed by its
    /// attributes when `include_attributes` is set.
    pub fn refs(&self, include_attributes: bool) -> Refs<'_> {
        Refs {
            doc: self,
            next: 0,
            pending_attr: None,
            include_attributes,
        }
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.index()].kind
    }

    /// Qualified name as written (`prefix:local`), empty for non-elements.
    pub fn name(&self, id: NodeId) -> &str {
        let node = &self.nodes[id.index()];
        match node.kind {
            NodeKind::Element => &self.names[node.name as usize],
            _ => "",
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].first_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].next_sibling
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.first_child(id),
        }
    }

    /// Descendants in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + Clone {
        (id.0 + 1..self.nodes[id.index()].end).map(NodeId)
    }

    /// Whether `ancestor` is a proper ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        ancestor < id && id.0 < self.nodes[ancestor.index()].end
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        let node = &self.nodes[id.index()];
        let start = node.attrs_start as usize;
        &self.attributes[start..start + node.attrs_len as usize]
    }

    pub fn attribute(&self, id: NodeId, slot: u32) -> &Attribute {
        &self.attributes[self.nodes[id.index()].attrs_start as usize + slot as usize]
    }

    /// Name of a node or attribute.
    pub fn ref_name(&self, node: NodeRef) -> &str {
        match node {
            NodeRef::Node(id) => self.name(id),
            NodeRef::Attribute(id, slot) => &self.attribute(id, slot).name,
        }
    }

    /// Address text of a node: direct text and CDATA of an element, the
    /// value of an attribute, or the content of a text node.
    pub fn text(&self, node: NodeRef) -> Cow<'_, str> {
        match node {
            NodeRef::Attribute(id, slot) => Cow::Borrowed(&self.attribute(id, slot).value),
            NodeRef::Node(id) => match self.kind(id) {
                NodeKind::Text => Cow::Borrowed(&self.nodes[id.index()].text),
                NodeKind::Document => self.text(NodeRef::Node(self.root_element())),
                NodeKind::Element => {
                    let mut texts = self
                        .children(id)
                        .filter(|c| self.kind(*c) == NodeKind::Text)
                        .map(|c| &*self.nodes[c.index()].text);
                    match (texts.next(), texts.next()) {
                        (None, _) => Cow::Borrowed(""),
                        (Some(only), None) => Cow::Borrowed(only),
                        (Some(first), Some(second)) => {
                            let mut joined = String::from(first);
                            joined.push_str(second);
                            texts.for_each(|t| joined.push_str(t));
                            Cow::Owned(joined)
                        }
                    }
                }
            },
        }
    }

    /// XPath string-value: all descendant text for elements.
    pub fn string_value(&self, node: NodeRef) -> Cow<'_, str> {
        match node {
            NodeRef::Node(id) if self.kind(id) != NodeKind::Text => {
                let mut out = String::new();
                for d in self.descendants(id) {
                    if self.kind(d) == NodeKind::Text {
                        out.push_str(&self.nodes[d.index()].text);
                    }
                }
                Cow::Owned(out)
            }
            other => self.text(other),
        }
    }
}

#[derive(Clone)]
pub struct Children<'a> {
    doc: &'a SourceDocument,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.next_sibling(current);
        Some(current)
    }
}

#[derive(Clone)]
pub struct Refs<'a> {
    doc: &'a SourceDocument,
    next: u32,
    pending_attr: Option<(NodeId, u32)>,
    include_attributes: bool,
}

impl Iterator for Refs<'_> {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        if let Some((id, slot)) = self.pending_attr {
            if slot < self.doc.nodes[id.index()].attrs_len {
                self.pending_attr = Some((id, slot + 1));
                return Some(NodeRef::Attribute(id, slot));
            }
            self.pending_attr = None;
        }
        if self.next as usize >= self.doc.nodes.len() {
            return None;
        }
        let id = NodeId(self.next);
        self.next += 1;
        if self.include_attributes && self.doc.nodes[id.index()].attrs_len > 0 {
            self.pending_attr = Some((id, 0));
        }
        Some(NodeRef::Node(id))
    }
}

fn read_start(
    e: &BytesStart<'_>,
    decoder: Decoder,
) -> std::result::Result<(String, Vec<Attribute>), String> {
    let name = decoder
        .decode(e.name().as_ref())
        .map_err(|e| e.to_string())?
        .into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = decoder.decode(attr.key.as_ref()).map_err(|e| e.to_string())?;
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|e| e.to_string())?;
        attrs.push(Attribute {
            name: key.as_ref().into(),
            value: value.as_ref().into(),
        });
    }
    Ok((name, attrs))
}

/// Incremental arena construction with well-formedness checks quick-xml
/// leaves to the caller (single root, nothing unclosed, no stray text).
struct TreeBuilder {
    nodes: Vec<Node>,
    attributes: Vec<Attribute>,
    names: Vec<Box<str>>,
    name_ids: HashMap<Box<str>, u32>,
    /// Open elements, the document node at the bottom.
    stack: Vec<NodeId>,
    /// Last child appended to each open element, parallel to `stack`.
    last_child: Vec<Option<NodeId>>,
    root_closed: bool,
}

impl TreeBuilder {
    fn new() -> Self {
        TreeBuilder {
            nodes: vec![Node {
                kind: NodeKind::Document,
                name: 0,
                text: "".into(),
                parent: None,
                first_child: None,
                next_sibling: None,
                end: 1,
                attrs_start: 0,
                attrs_len: 0,
            }],
            attributes: Vec::new(),
            names: Vec::new(),
            name_ids: HashMap::new(),
            stack: vec![NodeId::DOCUMENT],
            last_child: vec![None],
            root_closed: false,
        }
    }

    fn intern(&mut self, name: String) -> u32 {
        if let Some(id) = self.name_ids.get(name.as_str()) {
            return *id;
        }
        let id = self.names.len() as u32;
        let boxed: Box<str> = name.into_boxed_str();
        self.names.push(boxed.clone());
        self.name_ids.insert(boxed, id);
        id
    }

    fn append(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let depth = self.stack.len() - 1;
        let parent = self.stack[depth];
        match self.last_child[depth] {
            Some(prev) => self.nodes[prev.index()].next_sibling = Some(id),
            None => self.nodes[parent.index()].first_child = Some(id),
        }
        self.last_child[depth] = Some(id);
        node.parent = Some(parent);
        node.end = id.0 + 1;
        self.nodes.push(node);
        id
    }

    fn open_element(
        &mut self,
        name: String,
        attrs: Vec<Attribute>,
    ) -> std::result::Result<(), String> {
        if self.stack.len() == 1 && (self.root_closed || self.nodes[0].first_child.is_some()) {
            return Err(format!("multiple root elements: <{}>", name));
        }
        let name = self.intern(name);
        let attrs_start = self.attributes.len() as u32;
        let attrs_len = attrs.len() as u32;
        self.attributes.extend(attrs);
        let id = self.append(Node {
            kind: NodeKind::Element,
            name,
            text: "".into(),
            parent: None,
            first_child: None,
            next_sibling: None,
            end: 0,
            attrs_start,
            attrs_len,
        });
        self.stack.push(id);
        self.last_child.push(None);
        Ok(())
    }

    fn close_element(&mut self) {
        // quick-xml rejects unmatched end tags, so the stack is never just the document here
        if self.stack.len() > 1 {
            if let Some(id) = self.stack.pop() {
                self.last_child.pop();
                self.nodes[id.index()].end = self.nodes.len() as u32;
                if self.stack.len() == 1 {
                    self.root_closed = true;
                }
            }
        }
    }

    fn text(&mut self, text: &str) -> std::result::Result<(), String> {
        let depth = self.stack.len() - 1;
        if depth == 0 {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err("text outside the root element".to_string());
        }
        // Adjacent text and CDATA runs form one text node.
        if let Some(prev) = self.last_child[depth] {
            let prev = &mut self.nodes[prev.index()];
            if prev.kind == NodeKind::Text {
                let mut merged = String::from(std::mem::take(&mut prev.text));
                merged.push_str(text);
                prev.text = merged.into_boxed_str();
                return Ok(());
            }
        }
        if text.trim().is_empty() {
            return Ok(());
        }
        self.append(Node {
            kind: NodeKind::Text,
            name: 0,
            text: text.into(),
            parent: None,
            first_child: None,
            next_sibling: None,
            end: 0,
            attrs_start: 0,
            attrs_len: 0,
        });
        Ok(())
    }

    fn finish(mut self, path: PathBuf) -> std::result::Result<SourceDocument, String> {
        if self.stack.len() > 1 {
            let open = self.stack[self.stack.len() - 1];
            return Err(format!(
                "unexpected end of document, <{}> is not closed",
                self.names[self.nodes[open.index()].name as usize]
            ));
        }
        if self.nodes[0].first_child.is_none() {
            return Err("no root element".to_string());
        }
        self.nodes[0].end = self.nodes.len() as u32;
        Ok(SourceDocument {
            path,
            nodes: self.nodes,
            attributes: self.attributes,
            names: self.names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<yml_catalog date="2024-01-01">
  <shop>
    <url>https://shop.example/</url>
    <offers>
      <offer id="1"><url>https://shop.example/p/1</url></offer>
      <offer id="2"><url><![CDATA[https://shop.example/p/2?a=1&b=2]]></url></offer>
      <offer id="3"><url>https://shop.example/p/3?a=1&amp;b=2</url></offer>
    </offers>
  </shop>
</yml_catalog>"#;

    fn element_named<'a>(doc: &'a SourceDocument, name: &'a str) -> Vec<NodeId> {
        doc.node_ids()
            .filter(|id| doc.kind(*id) == NodeKind::Element && doc.name(*id) == name)
            .collect()
    }

    #[test]
    fn parses_tree_in_document_order() {
        let doc = SourceDocument::parse_str(FEED).unwrap();
        let root = doc.root_element();
        assert_eq!(doc.name(root), "yml_catalog");
        assert_eq!(doc.attributes(root)[0].value.as_ref(), "2024-01-01");

        let urls = element_named(&doc, "url");
        assert_eq!(urls.len(), 4);
        let texts: Vec<String> = urls
            .iter()
            .map(|id| doc.text(NodeRef::Node(*id)).into_owned())
            .collect();
        assert_eq!(
            texts,
            vec![
                "https://shop.example/",
                "https://shop.example/p/1",
                "https://shop.example/p/2?a=1&b=2",
                "https://shop.example/p/3?a=1&b=2",
            ]
        );
    }

    #[test]
    fn descendant_ranges_are_contiguous() {
        let doc = SourceDocument::parse_str(FEED).unwrap();
        let offers = element_named(&doc, "offers")[0];
        let inner: Vec<&str> = doc
            .descendants(offers)
            .filter(|d| doc.kind(*d) == NodeKind::Element)
            .map(|d| doc.name(d))
            .collect();
        assert_eq!(inner, vec!["offer", "url", "offer", "url", "offer", "url"]);
        let shop = element_named(&doc, "shop")[0];
        assert!(doc.is_ancestor(shop, offers));
        assert!(!doc.is_ancestor(offers, shop));
    }

    #[test]
    fn string_value_concatenates_descendants() {
        let doc = SourceDocument::parse_str("<a>x<b>y</b>z</a>").unwrap();
        let root = NodeRef::Node(doc.root_element());
        assert_eq!(doc.string_value(root), "xyz");
        assert_eq!(doc.text(root), "xz");
    }

    #[test]
    fn rejects_unclosed_and_multiple_roots() {
        for bad in [
            "<a><b></b>",
            "<a></a><b></b>",
            "<a></b>",
            "text only",
            "",
            "<a x='1' x='2'/>",
            "<a>&bogus;</a>",
        ] {
            let err = SourceDocument::parse_str(bad).unwrap_err();
            assert!(
                matches!(err, Error::SourceMalformed { .. }),
                "accepted {:?}: {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = SourceDocument::open(Path::new("/definitely/not/here.xml")).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }

    #[test]
    fn reads_gzip_transparently() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("offers.xml.gz");
        let file = File::create(&path).unwrap();
        let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        enc.write_all(FEED.as_bytes()).unwrap();
        enc.finish().unwrap();

        let doc = SourceDocument::open(&path).unwrap();
        assert_eq!(element_named(&doc, "offer").len(), 3);
    }

    /// "Товар" in windows-1251.
    const CP1251_NAME: &[u8] = &[0xD2, 0xEE, 0xE2, 0xE0, 0xF0];

    #[test]
    fn decodes_declared_windows_1251() {
        let mut feed = b"<?xml version=\"1.0\" encoding=\"windows-1251\"?>\n<offers>".to_vec();
        feed.extend_from_slice(b"<offer title=\"");
        feed.extend_from_slice(CP1251_NAME);
        feed.extend_from_slice(b"\"><name>");
        feed.extend_from_slice(CP1251_NAME);
        feed.extend_from_slice(b"</name><url>https://shop.example/p/1</url></offer></offers>");

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cp1251.xml");
        std::fs::write(&path, &feed).unwrap();

        let doc = SourceDocument::open(&path).unwrap();
        let offer = element_named(&doc, "offer")[0];
        assert_eq!(doc.attributes(offer)[0].value.as_ref(), "Товар");
        let name = element_named(&doc, "name")[0];
        assert_eq!(doc.text(NodeRef::Node(name)), "Товар");
        let url = element_named(&doc, "url")[0];
        assert_eq!(doc.text(NodeRef::Node(url)), "https://shop.example/p/1");
    }

    #[test]
    fn corrupt_gzip_is_malformed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.xml.gz");
        std::fs::write(&path, [0x1f, 0x8b, 0x08, 0x00, 0xde, 0xad]).unwrap();
        let err = SourceDocument::open(&path).unwrap_err();
        assert!(matches!(err, Error::SourceMalformed { .. }), "{:?}", err);
    }
}
