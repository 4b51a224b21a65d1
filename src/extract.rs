//! Merged extraction sequence.
//!
//! Concatenates the per-selector match sequences in configuration order,
//! pulling from one selector until it is exhausted before starting the next.
//! Nothing is buffered: each item is computed when it is pulled, so memory
//! stays bounded by the source document itself.

use std::borrow::Cow;

use crate::selector::Matches;
use crate::source::{NodeRef, SourceDocument};

/// A matched node tagged with the selector that produced it.
#[derive(Debug, Clone, Copy)]
pub struct ExtractedItem<'d> {
    pub node: NodeRef,
    pub selector: &'d str,
    doc: &'d SourceDocument,
}

impl<'d> ExtractedItem<'d> {
    /// Text content of the node, untrimmed.
    pub fn text(&self) -> Cow<'d, str> {
        self.doc.text(self.node)
    }
}

/// Lazy, single-pass flattening of the selector sequences.
pub struct Extraction<'d> {
    doc: &'d SourceDocument,
    pending: std::vec::IntoIter<Matches<'d>>,
    current: Option<Matches<'d>>,
}

impl<'d> Extraction<'d> {
    pub fn new(doc: &'d SourceDocument, sequences: Vec<Matches<'d>>) -> Self {
        let mut pending = sequences.into_iter();
        let current = pending.next();
        Extraction {
            doc,
            pending,
            current,
        }
    }
}

impl<'d> Iterator for Extraction<'d> {
    type Item = ExtractedItem<'d>;

    fn next(&mut self) -> Option<ExtractedItem<'d>> {
        loop {
            let matches = self.current.as_mut()?;
            if let Some(node) = matches.next() {
                return Some(ExtractedItem {
                    node,
                    selector: matches.selector().expression(),
                    doc: self.doc,
                });
            }
            self.current = self.pending.next();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SelectorSet;
    use crate::stats::RunReport;

    #[test]
    fn selector_order_outer_document_order_inner() {
        let doc = SourceDocument::parse_str(
            r#"<feed>
                 <offer><url>o1</url></offer>
                 <category href="c1"/>
                 <offer><url>o2</url></offer>
                 <category href="c2"/>
               </feed>"#,
        )
        .unwrap();
        let set = SelectorSet::compile(
            &["//category/@href".to_string(), "//offer/url".to_string()],
            None,
        )
        .unwrap();
        let mut report = RunReport::default();
        let items: Vec<(String, String)> = Extraction::new(&doc, set.resolve(&doc, &mut report))
            .map(|i| (i.selector.to_string(), i.text().into_owned()))
            .collect();
        assert_eq!(
            items,
            vec![
                ("//category/@href".to_string(), "c1".to_string()),
                ("//category/@href".to_string(), "c2".to_string()),
                ("//offer/url".to_string(), "o1".to_string()),
                ("//offer/url".to_string(), "o2".to_string()),
            ]
        );
    }

    #[test]
    fn selectors_without_matches_are_skipped() {
        let doc = SourceDocument::parse_str("<feed><url>a</url></feed>").unwrap();
        let set = SelectorSet::compile(
            &["//nothing".to_string(), "//url".to_string(), "//none".to_string()],
            None,
        )
        .unwrap();
        let mut report = RunReport::default();
        let mut extraction = Extraction::new(&doc, set.resolve(&doc, &mut report));
        assert_eq!(extraction.next().map(|i| i.text().into_owned()), Some("a".into()));
        assert!(extraction.next().is_none());
        assert!(extraction.next().is_none());
    }

    #[test]
    fn empty_selector_list_is_exhausted() {
        let doc = SourceDocument::parse_str("<feed/>").unwrap();
        assert!(Extraction::new(&doc, Vec::new()).next().is_none());
    }
}
