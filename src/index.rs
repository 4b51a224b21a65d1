//! Sitemap index accumulation.
//!
//! Every written sitemap is recorded here. Once the run is over, the index is
//! only worth writing when it lists two or more sitemaps; a lone sitemap is
//! self-sufficient and an empty run has nothing to list.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use std::io;

use crate::models::IndexEntry;
use crate::sitemap::{write_document, write_text_element};

#[derive(Debug, Default)]
pub struct IndexAccumulator {
    entries: Vec<IndexEntry>,
}

impl IndexAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, loc: impl Into<String>) {
        self.entries.push(IndexEntry { loc: loc.into() });
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The serialized `<sitemapindex>`, or `None` with fewer than two entries.
    pub fn finish(&self) -> io::Result<Option<Vec<u8>>> {
        if self.entries.len() <= 1 {
            return Ok(None);
        }
        write_document("sitemapindex", |writer| {
            for entry in &self.entries {
                writer.write_event(Event::Start(BytesStart::new("sitemap")))?;
                write_text_element(writer, "loc", &entry.loc)?;
                writer.write_event(Event::End(BytesEnd::new("sitemap")))?;
            }
            Ok(())
        })
        .map(Some)
    }
}
