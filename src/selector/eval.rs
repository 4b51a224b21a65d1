//! Selector evaluation.
//!
//! Two strategies share the axis and predicate logic:
//!
//! - [`path_matches`] decides whether one candidate node is selected by a
//!   location path, walking the steps backwards through inverse axes. The
//!   top-level scan uses it so results come out unique, in document order,
//!   and without materializing the match set.
//! - [`select`] evaluates a path forwards into a node list. Predicates use
//!   it for their nested paths (`offer[url]`, `@available='true'`), which are
//!   bounded by the subtree they start from.

use std::collections::HashMap;

use super::parser::{Axis, CompareOp, Expr, Function, LocationPath, NodeTest, Step};
use crate::source::{NodeId, NodeKind, NodeRef, SourceDocument};

#[derive(Debug, Clone)]
pub enum Value {
    Nodes(Vec<NodeRef>),
    Str(String),
    Num(f64),
    Bool(bool),
}

/// Evaluation context: the context node plus its proximity position and
/// the size of the set it was drawn from.
#[derive(Debug, Clone, Copy)]
struct Context {
    node: NodeRef,
    position: usize,
    size: usize,
}

/// Nodes kept by a positional step, per step index and context node.
///
/// Positional predicates (`offer[1]`) depend on the whole axis around a
/// candidate. Without the cache every sibling would rebuild that axis.
#[derive(Debug, Default)]
pub struct PositionCache {
    kept: HashMap<(usize, NodeRef), Vec<NodeRef>>,
}

impl PositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn keeps(
        &mut self,
        doc: &SourceDocument,
        k: usize,
        step: &Step,
        context: NodeRef,
        node: NodeRef,
    ) -> bool {
        self.kept
            .entry((k, context))
            .or_insert_with(|| {
                let candidates = axis_nodes(doc, step.axis, context)
                    .into_iter()
                    .filter(|n| node_test(doc, step, *n))
                    .collect();
                let mut kept = filter_predicates(doc, &step.predicates, candidates);
                kept.sort();
                kept
            })
            .binary_search(&node)
            .is_ok()
    }
}

/// Whether `node` is selected by `path` evaluated from `origin`.
///
/// `origin` is the document node for absolute paths and the context element
/// for relative ones. `cache` must only ever be used with the same `path`.
pub fn path_matches(
    doc: &SourceDocument,
    path: &LocationPath,
    node: NodeRef,
    origin: NodeRef,
    cache: &mut PositionCache,
) -> bool {
    match path.steps.len() {
        0 => node == origin,
        n => step_matches(doc, &path.steps, n - 1, node, origin, cache),
    }
}

fn step_matches(
    doc: &SourceDocument,
    steps: &[Step],
    k: usize,
    node: NodeRef,
    origin: NodeRef,
    cache: &mut PositionCache,
) -> bool {
    let step = &steps[k];
    if !node_test(doc, step, node) {
        return false;
    }
    let positional = step.has_positional_predicate();
    if !positional && !predicates_hold(doc, &step.predicates, node) {
        return false;
    }
    inverse_axis(doc, step.axis, node).into_iter().any(|context| {
        let reached = if k == 0 {
            context == origin
        } else {
            step_matches(doc, steps, k - 1, context, origin, cache)
        };
        reached && (!positional || cache.keeps(doc, k, step, context, node))
    })
}

fn predicates_hold(doc: &SourceDocument, predicates: &[Expr], node: NodeRef) -> bool {
    let ctx = Context {
        node,
        position: 1,
        size: 1,
    };
    predicates
        .iter()
        .all(|p| predicate_true(&eval(doc, p, ctx), ctx.position))
}

/// Forward evaluation of a location path from `origin`, in document order
/// without duplicates.
pub fn select(doc: &SourceDocument, path: &LocationPath, origin: NodeRef) -> Vec<NodeRef> {
    let start = if path.absolute {
        NodeRef::Node(NodeId::DOCUMENT)
    } else {
        origin
    };
    let mut current = vec![start];
    for step in &path.steps {
        let mut next = Vec::new();
        for context in &current {
            let candidates = axis_nodes(doc, step.axis, *context)
                .into_iter()
                .filter(|n| node_test(doc, step, *n))
                .collect();
            next.extend(filter_predicates(doc, &step.predicates, candidates));
        }
        next.sort();
        next.dedup();
        current = next;
        if current.is_empty() {
            break;
        }
    }
    current
}

fn filter_predicates(
    doc: &SourceDocument,
    predicates: &[Expr],
    mut nodes: Vec<NodeRef>,
) -> Vec<NodeRef> {
    for predicate in predicates {
        let size = nodes.len();
        nodes = nodes
            .into_iter()
            .enumerate()
            .filter(|(i, node)| {
                let ctx = Context {
                    node: *node,
                    position: i + 1,
                    size,
                };
                predicate_true(&eval(doc, predicate, ctx), ctx.position)
            })
            .map(|(_, node)| node)
            .collect();
    }
    nodes
}

fn predicate_true(value: &Value, position: usize) -> bool {
    match value {
        Value::Num(n) => *n == position as f64,
        other => to_bool(other),
    }
}

fn node_test(doc: &SourceDocument, step: &Step, node: NodeRef) -> bool {
    match &step.test {
        NodeTest::Node => true,
        NodeTest::Text => matches!(node, NodeRef::Node(id) if doc.kind(id) == NodeKind::Text),
        test => {
            // Name tests select the axis' principal node type.
            let principal = match (step.axis, node) {
                (Axis::Attribute, NodeRef::Attribute(..)) => true,
                (Axis::Attribute, _) => false,
                (_, NodeRef::Node(id)) => doc.kind(id) == NodeKind::Element,
                (_, NodeRef::Attribute(..)) => false,
            };
            principal
                && match test {
                    NodeTest::Any => true,
                    NodeTest::Name(name) => doc.ref_name(node) == name,
                    NodeTest::Prefix(prefix) => doc
                        .ref_name(node)
                        .split_once(':')
                        .is_some_and(|(p, _)| p == prefix),
                    NodeTest::Node | NodeTest::Text => false,
                }
        }
    }
}

fn parent_of(doc: &SourceDocument, node: NodeRef) -> Option<NodeRef> {
    match node {
        NodeRef::Node(id) => doc.parent(id).map(NodeRef::Node),
        NodeRef::Attribute(owner, _) => Some(NodeRef::Node(owner)),
    }
}

fn ancestors(doc: &SourceDocument, node: NodeRef) -> Vec<NodeRef> {
    let mut out = Vec::new();
    let mut current = parent_of(doc, node);
    while let Some(n) = current {
        out.push(n);
        current = parent_of(doc, n);
    }
    out
}

fn with_attributes(doc: &SourceDocument, ids: impl Iterator<Item = NodeId>) -> Vec<NodeRef> {
    let mut out = Vec::new();
    for id in ids {
        out.push(NodeRef::Node(id));
        out.extend((0..doc.attributes(id).len() as u32).map(|slot| NodeRef::Attribute(id, slot)));
    }
    out
}

/// Nodes on `axis` from `node`, in proximity order (reverse document order
/// for reverse axes).
fn axis_nodes(doc: &SourceDocument, axis: Axis, node: NodeRef) -> Vec<NodeRef> {
    let id = match node {
        NodeRef::Node(id) => Some(id),
        NodeRef::Attribute(..) => None,
    };
    match axis {
        Axis::SelfAxis => vec![node],
        Axis::Child => id
            .map(|id| doc.children(id).map(NodeRef::Node).collect())
            .unwrap_or_default(),
        Axis::Descendant => id
            .map(|id| doc.descendants(id).map(NodeRef::Node).collect())
            .unwrap_or_default(),
        Axis::DescendantOrSelf => {
            let mut out = vec![node];
            if let Some(id) = id {
                out.extend(doc.descendants(id).map(NodeRef::Node));
            }
            out
        }
        Axis::Parent => parent_of(doc, node).into_iter().collect(),
        Axis::Ancestor => ancestors(doc, node),
        Axis::AncestorOrSelf => {
            let mut out = vec![node];
            out.extend(ancestors(doc, node));
            out
        }
        Axis::FollowingSibling => match id {
            Some(id) => {
                let mut out = Vec::new();
                let mut current = doc.next_sibling(id);
                while let Some(s) = current {
                    out.push(NodeRef::Node(s));
                    current = doc.next_sibling(s);
                }
                out
            }
            None => Vec::new(),
        },
        Axis::PrecedingSibling => match id.and_then(|id| doc.parent(id).map(|p| (id, p))) {
            Some((id, parent)) => {
                let mut out: Vec<NodeRef> = doc
                    .children(parent)
                    .take_while(|c| *c != id)
                    .map(NodeRef::Node)
                    .collect();
                out.reverse();
                out
            }
            None => Vec::new(),
        },
        Axis::Attribute => match id {
            Some(id) if doc.kind(id) == NodeKind::Element => (0..doc.attributes(id).len()
                as u32)
                .map(|slot| NodeRef::Attribute(id, slot))
                .collect(),
            _ => Vec::new(),
        },
    }
}

/// Every context from which `axis` reaches `node`.
fn inverse_axis(doc: &SourceDocument, axis: Axis, node: NodeRef) -> Vec<NodeRef> {
    match axis {
        Axis::SelfAxis => vec![node],
        Axis::Child => match node {
            NodeRef::Node(id) => doc.parent(id).map(NodeRef::Node).into_iter().collect(),
            NodeRef::Attribute(..) => Vec::new(),
        },
        Axis::Descendant => match node {
            NodeRef::Node(_) => ancestors(doc, node),
            NodeRef::Attribute(..) => Vec::new(),
        },
        Axis::DescendantOrSelf => match node {
            NodeRef::Node(_) => {
                let mut out = vec![node];
                out.extend(ancestors(doc, node));
                out
            }
            NodeRef::Attribute(..) => vec![node],
        },
        Axis::Parent => match node {
            NodeRef::Node(id) => {
                let mut out: Vec<NodeRef> = doc.children(id).map(NodeRef::Node).collect();
                out.extend(
                    (0..doc.attributes(id).len() as u32).map(|slot| NodeRef::Attribute(id, slot)),
                );
                out
            }
            NodeRef::Attribute(..) => Vec::new(),
        },
        Axis::Ancestor | Axis::AncestorOrSelf => match node {
            NodeRef::Node(id) => {
                let mut out = with_attributes(doc, doc.descendants(id));
                out.extend(
                    (0..doc.attributes(id).len() as u32).map(|slot| NodeRef::Attribute(id, slot)),
                );
                if axis == Axis::AncestorOrSelf {
                    out.push(node);
                }
                out
            }
            NodeRef::Attribute(..) if axis == Axis::AncestorOrSelf => vec![node],
            NodeRef::Attribute(..) => Vec::new(),
        },
        Axis::FollowingSibling => match node {
            NodeRef::Node(id) => axis_nodes(doc, Axis::PrecedingSibling, NodeRef::Node(id)),
            NodeRef::Attribute(..) => Vec::new(),
        },
        Axis::PrecedingSibling => match node {
            NodeRef::Node(id) => axis_nodes(doc, Axis::FollowingSibling, NodeRef::Node(id)),
            NodeRef::Attribute(..) => Vec::new(),
        },
        Axis::Attribute => match node {
            NodeRef::Attribute(owner, _) => vec![NodeRef::Node(owner)],
            NodeRef::Node(_) => Vec::new(),
        },
    }
}

fn eval(doc: &SourceDocument, expr: &Expr, ctx: Context) -> Value {
    match expr {
        Expr::Path(path) => Value::Nodes(select(doc, path, ctx.node)),
        Expr::Union(branches) => {
            let mut nodes = Vec::new();
            for branch in branches {
                if let Value::Nodes(found) = eval(doc, branch, ctx) {
                    nodes.extend(found);
                }
            }
            nodes.sort();
            nodes.dedup();
            Value::Nodes(nodes)
        }
        Expr::Or(a, b) => Value::Bool(to_bool(&eval(doc, a, ctx)) || to_bool(&eval(doc, b, ctx))),
        Expr::And(a, b) => {
            Value::Bool(to_bool(&eval(doc, a, ctx)) && to_bool(&eval(doc, b, ctx)))
        }
        Expr::Compare(a, op, b) => {
            Value::Bool(compare(doc, &eval(doc, a, ctx), *op, &eval(doc, b, ctx)))
        }
        Expr::Literal(s) => Value::Str(s.clone()),
        Expr::Number(n) => Value::Num(*n),
        Expr::Function(function, args) => call(doc, *function, args, ctx),
    }
}

fn call(doc: &SourceDocument, function: Function, args: &[Expr], ctx: Context) -> Value {
    let arg = |i: usize| eval(doc, &args[i], ctx);
    let string_arg = |i: usize| match args.get(i) {
        Some(_) => to_string(doc, &arg(i)),
        None => doc.string_value(ctx.node).into_owned(),
    };
    let node_arg = || match args.first() {
        Some(_) => match arg(0) {
            Value::Nodes(nodes) => nodes.first().copied(),
            _ => None,
        },
        None => Some(ctx.node),
    };
    match function {
        Function::Not => Value::Bool(!to_bool(&arg(0))),
        Function::Contains => Value::Bool(string_arg(0).contains(string_arg(1).as_str())),
        Function::StartsWith => Value::Bool(string_arg(0).starts_with(string_arg(1).as_str())),
        Function::NormalizeSpace => Value::Str(
            string_arg(0)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Function::String => Value::Str(string_arg(0)),
        Function::Count => match arg(0) {
            Value::Nodes(nodes) => Value::Num(nodes.len() as f64),
            _ => Value::Num(f64::NAN),
        },
        Function::Position => Value::Num(ctx.position as f64),
        Function::Last => Value::Num(ctx.size as f64),
        Function::Name => Value::Str(
            node_arg()
                .map(|n| doc.ref_name(n).to_string())
                .unwrap_or_default(),
        ),
        Function::LocalName => Value::Str(
            node_arg()
                .map(|n| {
                    let name = doc.ref_name(n);
                    name.rsplit_once(':')
                        .map_or(name, |(_, local)| local)
                        .to_string()
                })
                .unwrap_or_default(),
        ),
        Function::True => Value::Bool(true),
        Function::False => Value::Bool(false),
    }
}

fn compare(doc: &SourceDocument, left: &Value, op: CompareOp, right: &Value) -> bool {
    match (left, right) {
        (Value::Nodes(a), Value::Nodes(b)) => a.iter().any(|x| {
            let sx = Value::Str(doc.string_value(*x).into_owned());
            b.iter().any(|y| {
                compare_scalar(&sx, op, &Value::Str(doc.string_value(*y).into_owned()))
            })
        }),
        (Value::Nodes(a), Value::Bool(_)) => {
            compare_scalar(&Value::Bool(!a.is_empty()), op, right)
        }
        (Value::Bool(_), Value::Nodes(b)) => {
            compare_scalar(left, op, &Value::Bool(!b.is_empty()))
        }
        (Value::Nodes(a), scalar) => a.iter().any(|x| {
            compare_scalar(&Value::Str(doc.string_value(*x).into_owned()), op, scalar)
        }),
        (scalar, Value::Nodes(b)) => b.iter().any(|y| {
            compare_scalar(scalar, op, &Value::Str(doc.string_value(*y).into_owned()))
        }),
        (a, b) => compare_scalar(a, op, b),
    }
}

fn compare_scalar(a: &Value, op: CompareOp, b: &Value) -> bool {
    match op {
        CompareOp::Eq | CompareOp::NotEq => {
            let equal = match (a, b) {
                (Value::Bool(_), _) | (_, Value::Bool(_)) => to_bool(a) == to_bool(b),
                (Value::Num(_), _) | (_, Value::Num(_)) => to_number(a) == to_number(b),
                _ => scalar_string(a) == scalar_string(b),
            };
            equal == (op == CompareOp::Eq)
        }
        CompareOp::Lt => to_number(a) < to_number(b),
        CompareOp::LtEq => to_number(a) <= to_number(b),
        CompareOp::Gt => to_number(a) > to_number(b),
        CompareOp::GtEq => to_number(a) >= to_number(b),
    }
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Nodes(nodes) => !nodes.is_empty(),
        Value::Str(s) => !s.is_empty(),
        Value::Num(n) => *n != 0.0 && !n.is_nan(),
        Value::Bool(b) => *b,
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Num(n) => *n,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
        // Node sets only reach here through `compare`, which stringifies them first.
        Value::Nodes(_) => f64::NAN,
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Num(n) => format_number(*n),
        Value::Bool(b) => b.to_string(),
        Value::Nodes(_) => String::new(),
    }
}

fn to_string(doc: &SourceDocument, value: &Value) -> String {
    match value {
        Value::Nodes(nodes) => nodes
            .first()
            .map(|n| doc.string_value(*n).into_owned())
            .unwrap_or_default(),
        other => scalar_string(other),
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::Lexer;
    use super::super::parser::Parser;
    use super::*;

    const DOC: &str = r#"<catalog>
  <shop>
    <offers>
      <offer id="1" available="true"><url>u1</url><price>10</price></offer>
      <offer id="2" available="false"><url>u2</url><price>25</price></offer>
      <offer id="3" available="true"><url>u3</url><price>7</price></offer>
    </offers>
  </shop>
</catalog>"#;

    fn path(expr: &str) -> LocationPath {
        match Parser::new(Lexer::new(expr).tokenize().unwrap())
            .parse()
            .unwrap()
        {
            Expr::Path(p) => p,
            other => panic!("not a path: {:?}", other),
        }
    }

    fn forward(doc: &SourceDocument, expr: &str) -> Vec<String> {
        let origin = NodeRef::Node(doc.root_element());
        select(doc, &path(expr), origin)
            .into_iter()
            .map(|n| doc.text(n).into_owned())
            .collect()
    }

    fn backward(doc: &SourceDocument, expr: &str) -> Vec<String> {
        let p = path(expr);
        let origin = if p.absolute {
            NodeRef::Node(NodeId::DOCUMENT)
        } else {
            NodeRef::Node(doc.root_element())
        };
        let mut cache = PositionCache::new();
        doc.refs(true)
            .filter(|n| path_matches(doc, &p, *n, origin, &mut cache))
            .map(|n| doc.text(n).into_owned())
            .collect()
    }

    #[test]
    fn positional_axis_is_built_once_per_context() {
        let doc = SourceDocument::parse_str(DOC).unwrap();
        let p = path("//offer[2]/url");
        let mut cache = PositionCache::new();
        let hits: Vec<String> = doc
            .refs(false)
            .filter(|n| path_matches(&doc, &p, *n, NodeRef::Node(NodeId::DOCUMENT), &mut cache))
            .map(|n| doc.text(n).into_owned())
            .collect();
        assert_eq!(hits, vec!["u2"]);
        // Every offer shares the `offers` parent.
        assert_eq!(cache.kept.len(), 1);
    }

    #[test]
    fn forward_and_backward_agree() {
        let doc = SourceDocument::parse_str(DOC).unwrap();
        for expr in [
            "//offer/url",
            "shop/offers/offer/url",
            "//offer[@available='true']/url",
            "//offer[2]/url",
            "//offer[last()]/url",
            "//offer[price > 9]/url",
            "//offer[not(@available='true')]/@id",
            "//url[../@id='3']",
            "//*[local-name()='url'][position() < 3]",
            "//offer/@*",
            "//offer[starts-with(url, 'u')][2]/url",
            "/catalog/shop/offers/offer[1]/following-sibling::offer/url",
            "//price/preceding-sibling::url",
            "//url/text()",
            "//offer[count(url) = 1][@id != '1']/url",
        ] {
            assert_eq!(forward(&doc, expr), backward(&doc, expr), "{}", expr);
        }
    }

    #[test]
    fn selects_expected_nodes() {
        let doc = SourceDocument::parse_str(DOC).unwrap();
        assert_eq!(backward(&doc, "//offer/url"), vec!["u1", "u2", "u3"]);
        assert_eq!(
            backward(&doc, "//offer[@available='true']/url"),
            vec!["u1", "u3"]
        );
        assert_eq!(backward(&doc, "//offer[2]/url"), vec!["u2"]);
        assert_eq!(backward(&doc, "//offer[last()]/@id"), vec!["3"]);
        assert_eq!(backward(&doc, "//offer[price > 9]/url"), vec!["u1", "u2"]);
        assert_eq!(backward(&doc, "shop/offers/offer/url"), vec!["u1", "u2", "u3"]);
        assert!(backward(&doc, "offers/offer/url").is_empty());
    }

    #[test]
    fn nested_descendants_are_unique() {
        let doc = SourceDocument::parse_str("<a><a><b>x</b></a><b>y</b></a>").unwrap();
        assert_eq!(backward(&doc, "//a//b"), vec!["x", "y"]);
        assert_eq!(forward(&doc, "//a//b"), vec!["x", "y"]);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(f64::NAN), "NaN");
    }
}
