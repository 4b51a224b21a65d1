//! Sitemap documents and their XML serialization.
//!
//! Output follows the sitemaps.org 0.9 protocol: UTF-8, an XML declaration,
//! two-space indentation, and the protocol namespace on the root element.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://shop.example/p/1</loc>
//!     <priority>0.3</priority>
//!   </url>
//! </urlset>
//! ```

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io;

use crate::models::AddressEntry;

pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// A `<urlset>` holding at least one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapDocument {
    entries: Vec<AddressEntry>,
}

impl SitemapDocument {
    /// Build a document from a batch, keeping its order. `None` for an
    /// empty batch: a sitemap without urls is never produced.
    pub fn build(entries: Vec<AddressEntry>) -> Option<Self> {
        if entries.is_empty() {
            None
        } else {
            Some(SitemapDocument { entries })
        }
    }

    pub fn entries(&self) -> &[AddressEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to UTF-8 bytes.
    pub fn to_xml(&self) -> io::Result<Vec<u8>> {
        write_document("urlset", |writer| {
            for entry in &self.entries {
                writer.write_event(Event::Start(BytesStart::new("url")))?;
                write_text_element(writer, "loc", &entry.loc)?;
                write_text_element(writer, "priority", &entry.priority.to_string())?;
                writer.write_event(Event::End(BytesEnd::new("url")))?;
            }
            Ok(())
        })
    }
}

/// Write a declaration and a `root` element in the sitemap namespace whose
/// content is produced by `body`.
pub(crate) fn write_document<F>(root: &str, body: F) -> io::Result<Vec<u8>>
where
    F: FnOnce(&mut Writer<Vec<u8>>) -> quick_xml::Result<()>,
{
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_root(&mut writer, root, body).map_err(into_io)?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_root<F>(writer: &mut Writer<Vec<u8>>, root: &str, body: F) -> quick_xml::Result<()>
where
    F: FnOnce(&mut Writer<Vec<u8>>) -> quick_xml::Result<()>,
{
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut start = BytesStart::new(root);
    start.push_attribute(("xmlns", SITEMAP_NS));
    writer.write_event(Event::Start(start))?;
    body(writer)?;
    writer.write_event(Event::End(BytesEnd::new(root)))?;
    Ok(())
}

/// `<name>text</name>`, with `text` escaped.
pub(crate) fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn into_io(err: quick_xml::Error) -> io::Error {
    match err {
        quick_xml::Error::Io(inner) => io::Error::new(inner.kind(), inner.to_string()),
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::source::{NodeRef, SourceDocument};

    fn entry(loc: &str) -> AddressEntry {
        AddressEntry {
            loc: loc.to_string(),
            priority: Priority::DEFAULT,
        }
    }

    #[test]
    fn empty_batch_builds_nothing() {
        assert!(SitemapDocument::build(Vec::new()).is_none());
    }

    #[test]
    fn serializes_declaration_namespace_and_entries() {
        let doc = SitemapDocument::build(vec![entry("https://a/1"), entry("https://a/2")]).unwrap();
        let xml = String::from_utf8(doc.to_xml().unwrap()).unwrap();
        let expected = concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
            "  <url>\n",
            "    <loc>https://a/1</loc>\n",
            "    <priority>0.3</priority>\n",
            "  </url>\n",
            "  <url>\n",
            "    <loc>https://a/2</loc>\n",
            "    <priority>0.3</priority>\n",
            "  </url>\n",
            "</urlset>\n",
        );
        assert_eq!(xml, expected);
    }

    #[test]
    fn loc_is_escaped_and_round_trips() {
        let raw = "https://a/p?x=1&y=<2>";
        let doc = SitemapDocument::build(vec![entry(raw)]).unwrap();
        let xml = String::from_utf8(doc.to_xml().unwrap()).unwrap();
        assert!(xml.contains("x=1&amp;y=&lt;2"));

        let parsed = SourceDocument::parse_str(&xml).unwrap();
        let url = parsed.children(parsed.root_element()).next().unwrap();
        let loc = parsed.children(url).next().unwrap();
        assert_eq!(parsed.name(loc), "loc");
        assert_eq!(parsed.text(NodeRef::Node(loc)), raw);
    }
}
