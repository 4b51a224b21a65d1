//! Selector language and resolver.
//!
//! Selectors are XPath 1.0 location paths (plus top-level `|` unions) over
//! the [`SourceDocument`]. A compiled [`Selector`] yields a lazy
//! [`Matches`] sequence: one forward scan over the document in which every
//! candidate is tested against the path. Matches therefore come out in
//! document order, without duplicates, and the full match set is never held
//! in memory.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`lexer`] | Tokenizer |
//! | [`parser`] | Recursive descent parser producing the AST |
//! | [`eval`] | Path matching, predicates, functions |

pub mod eval;
pub mod lexer;
pub mod parser;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::source::{NodeId, NodeKind, NodeRef, Refs, SourceDocument};
use crate::stats::RunReport;
use lexer::Lexer;
use parser::{Axis, Expr, LocationPath, Parser};

/// A compiled selector expression.
#[derive(Debug, Clone)]
pub struct Selector {
    expression: String,
    branches: Vec<LocationPath>,
    yields_attributes: bool,
}

impl Selector {
    /// Compile `expression`. Anything other than a location path or a union
    /// of location paths is rejected: it could not select address nodes.
    pub fn compile(expression: &str) -> Result<Self> {
        let tokens = Lexer::new(expression)
            .tokenize()
            .map_err(|m| Error::selector(expression, m))?;
        let expr = Parser::new(tokens)
            .parse()
            .map_err(|m| Error::selector(expression, m))?;

        let branches = match expr {
            Expr::Path(path) => vec![path],
            Expr::Union(branches) => branches
                .into_iter()
                .filter_map(|b| match b {
                    Expr::Path(path) => Some(path),
                    _ => None,
                })
                .collect(),
            _ => {
                return Err(Error::selector(
                    expression,
                    "expression does not select nodes",
                ))
            }
        };
        let yields_attributes = branches
            .iter()
            .any(|b| b.steps.iter().any(|s| s.axis == Axis::Attribute));

        debug!(expression, branches = branches.len(), "compiled selector");
        Ok(Selector {
            expression: expression.to_string(),
            branches,
            yields_attributes,
        })
    }

    /// The expression text, which doubles as the selector's counting key.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Lazily select matching nodes. Relative branches are evaluated from
    /// `context`; with no context they select nothing.
    pub fn select<'d>(&'d self, doc: &'d SourceDocument, context: Option<NodeId>) -> Matches<'d> {
        Matches {
            doc,
            selector: self,
            context: context.map(NodeRef::Node),
            candidates: doc.refs(self.yields_attributes),
            positions: self.branches.iter().map(|_| eval::PositionCache::new()).collect(),
        }
    }
}

/// Lazy, single-pass sequence of one selector's matches in document order.
pub struct Matches<'d> {
    doc: &'d SourceDocument,
    selector: &'d Selector,
    context: Option<NodeRef>,
    candidates: Refs<'d>,
    /// One per branch.
    positions: Vec<eval::PositionCache>,
}

impl<'d> Matches<'d> {
    pub fn selector(&self) -> &'d Selector {
        self.selector
    }
}

impl Iterator for Matches<'_> {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        let document = NodeRef::Node(NodeId::DOCUMENT);
        for candidate in self.candidates.by_ref() {
            let selected = self
                .selector
                .branches
                .iter()
                .zip(self.positions.iter_mut())
                .any(|(path, cache)| {
                    let origin = if path.absolute {
                        Some(document)
                    } else {
                        self.context
                    };
                    origin.is_some_and(|origin| {
                        eval::path_matches(self.doc, path, candidate, origin, cache)
                    })
                });
            if selected {
                return Some(candidate);
            }
        }
        None
    }
}

/// The configured selectors, compiled once per run.
#[derive(Debug)]
pub struct SelectorSet {
    selectors: Vec<Selector>,
    context: Option<Selector>,
}

impl SelectorSet {
    /// Compile every expression, failing on the first invalid one.
    pub fn compile(expressions: &[String], context: Option<&str>) -> Result<Self> {
        let selectors = expressions
            .iter()
            .map(|e| Selector::compile(e))
            .collect::<Result<Vec<_>>>()?;
        let context = context.map(Selector::compile).transpose()?;
        Ok(SelectorSet { selectors, context })
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// One lazy sequence per selector, in configuration order. Registers a
    /// zero count for every selector in `report`.
    pub fn resolve<'d>(
        &'d self,
        doc: &'d SourceDocument,
        report: &mut RunReport,
    ) -> Vec<Matches<'d>> {
        for selector in &self.selectors {
            report.register_selector(selector.expression());
        }

        let context = match &self.context {
            None => Some(doc.root_element()),
            Some(ctx) => {
                let found = ctx
                    .select(doc, Some(doc.root_element()))
                    .find_map(|n| match n {
                        NodeRef::Node(id) if doc.kind(id) == NodeKind::Element => Some(id),
                        _ => None,
                    });
                if found.is_none() {
                    warn!(
                        context = ctx.expression(),
                        "context selector matched no element; relative selectors will select nothing"
                    );
                }
                found
            }
        };

        self.selectors
            .iter()
            .map(|s| s.select(doc, context))
            .collect()
    }
}
