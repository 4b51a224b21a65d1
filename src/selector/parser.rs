//! Recursive descent parser for the selector language.
//!
//! Grammar (precedence low to high):
//!
//! ```text
//! Expr       := AndExpr ('or' AndExpr)*
//! AndExpr    := EqExpr ('and' EqExpr)*
//! EqExpr     := RelExpr (('=' | '!=') RelExpr)*
//! RelExpr    := UnionExpr (('<' | '<=' | '>' | '>=') UnionExpr)*
//! UnionExpr  := Primary ('|' Primary)*
//! Primary    := Literal | Number | FunctionCall | '(' Expr ')' | LocationPath
//! ```

use super::lexer::Token;

#[derive(Debug, Clone)]
pub enum Expr {
    Path(LocationPath),
    Union(Vec<Expr>),
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CompareOp, Box<Expr>),
    Function(Function, Vec<Expr>),
    Literal(String),
    Number(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone)]
pub struct LocationPath {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    fn any_node(axis: Axis) -> Self {
        Step {
            axis,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }

    /// Whether some predicate depends on the node's position in the axis.
    pub fn has_positional_predicate(&self) -> bool {
        self.predicates.iter().any(is_positional)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    SelfAxis,
    Attribute,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "child" => Some(Axis::Child),
            "descendant" => Some(Axis::Descendant),
            "descendant-or-self" => Some(Axis::DescendantOrSelf),
            "parent" => Some(Axis::Parent),
            "ancestor" => Some(Axis::Ancestor),
            "ancestor-or-self" => Some(Axis::AncestorOrSelf),
            "following-sibling" => Some(Axis::FollowingSibling),
            "preceding-sibling" => Some(Axis::PrecedingSibling),
            "self" => Some(Axis::SelfAxis),
            "attribute" => Some(Axis::Attribute),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// `*`
    Any,
    /// Qualified name as written.
    Name(String),
    /// `prefix:*`
    Prefix(String),
    /// `text()`
    Text,
    /// `node()`
    Node,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Not,
    Contains,
    StartsWith,
    NormalizeSpace,
    String,
    Count,
    Position,
    Last,
    Name,
    LocalName,
    True,
    False,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "not" => Some(Function::Not),
            "contains" => Some(Function::Contains),
            "starts-with" => Some(Function::StartsWith),
            "normalize-space" => Some(Function::NormalizeSpace),
            "string" => Some(Function::String),
            "count" => Some(Function::Count),
            "position" => Some(Function::Position),
            "last" => Some(Function::Last),
            "name" => Some(Function::Name),
            "local-name" => Some(Function::LocalName),
            "true" => Some(Function::True),
            "false" => Some(Function::False),
            _ => None,
        }
    }

    /// Accepted argument counts, inclusive.
    fn arity(self) -> (usize, usize) {
        match self {
            Function::Not | Function::Count => (1, 1),
            Function::Contains | Function::StartsWith => (2, 2),
            Function::NormalizeSpace | Function::String | Function::Name | Function::LocalName => {
                (0, 1)
            }
            Function::Position | Function::Last | Function::True | Function::False => (0, 0),
        }
    }
}

/// A predicate is positional when it yields a number or asks for
/// `position()`/`last()` outside any nested path.
fn is_positional(expr: &Expr) -> bool {
    match expr {
        Expr::Number(_) => true,
        Expr::Function(Function::Position | Function::Last | Function::Count, _) => true,
        Expr::Function(_, args) => args.iter().any(uses_position),
        Expr::Or(a, b) | Expr::And(a, b) | Expr::Compare(a, _, b) => {
            uses_position(a) || uses_position(b)
        }
        Expr::Union(_) | Expr::Path(_) | Expr::Literal(_) => false,
    }
}

fn uses_position(expr: &Expr) -> bool {
    match expr {
        Expr::Function(Function::Position | Function::Last, _) => true,
        Expr::Function(_, args) => args.iter().any(uses_position),
        Expr::Or(a, b) | Expr::And(a, b) | Expr::Compare(a, _, b) => {
            uses_position(a) || uses_position(b)
        }
        Expr::Union(_) | Expr::Path(_) | Expr::Literal(_) | Expr::Number(_) => false,
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    /// Parse a complete expression; trailing tokens are an error.
    pub fn parse(mut self) -> Result<Expr, String> {
        let expr = self.parse_or()?;
        match self.peek() {
            Token::Eof => Ok(expr),
            other => Err(format!("unexpected {}", other.describe())),
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        let found = self.advance();
        if found == expected {
            Ok(())
        } else {
            Err(format!(
                "expected {}, found {}",
                expected.describe(),
                found.describe()
            ))
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Name(n) if n == keyword)
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.at_keyword("or") {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_equality()?;
        while self.at_keyword("and") {
            self.advance();
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Token::Eq => CompareOp::Eq,
                Token::NotEq => CompareOp::NotEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_relational()?;
            left = Expr::Compare(Box::new(left), op, Box::new(right));
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_union()?;
        loop {
            let op = match self.peek() {
                Token::Lt => CompareOp::Lt,
                Token::LtEq => CompareOp::LtEq,
                Token::Gt => CompareOp::Gt,
                Token::GtEq => CompareOp::GtEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_union()?;
            left = Expr::Compare(Box::new(left), op, Box::new(right));
        }
    }

    fn parse_union(&mut self) -> Result<Expr, String> {
        let first = self.parse_primary()?;
        if *self.peek() != Token::Pipe {
            return Ok(first);
        }
        let mut branches = vec![first];
        while *self.peek() == Token::Pipe {
            self.advance();
            branches.push(self.parse_primary()?);
        }
        if branches.iter().any(|b| !matches!(b, Expr::Path(_))) {
            return Err("'|' operands must be location paths".to_string());
        }
        Ok(Expr::Union(branches))
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.peek().clone() {
            Token::Literal(s) => {
                self.advance();
                Ok(Expr::Literal(s))
            }
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Token::LeftParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            Token::Name(name)
                if *self.peek_at(1) == Token::LeftParen && !is_node_type(&name) =>
            {
                self.parse_function(&name)
            }
            _ => self.parse_location_path().map(Expr::Path),
        }
    }

    fn parse_function(&mut self, name: &str) -> Result<Expr, String> {
        let function =
            Function::from_name(name).ok_or_else(|| format!("unknown function '{}()'", name))?;
        self.advance();
        self.expect(Token::LeftParen)?;
        let mut args = Vec::new();
        if *self.peek() != Token::RightParen {
            loop {
                args.push(self.parse_or()?);
                if *self.peek() == Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RightParen)?;
        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(format!(
                "{}() takes {} argument(s), got {}",
                name,
                if min == max {
                    min.to_string()
                } else {
                    format!("{} to {}", min, max)
                },
                args.len()
            ));
        }
        Ok(Expr::Function(function, args))
    }

    fn parse_location_path(&mut self) -> Result<LocationPath, String> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Token::Slash => {
                self.advance();
                if !self.at_step_start() {
                    return Ok(LocationPath {
                        absolute: true,
                        steps,
                    });
                }
                true
            }
            Token::DoubleSlash => {
                self.advance();
                steps.push(Step::any_node(Axis::DescendantOrSelf));
                true
            }
            _ => false,
        };

        steps.push(self.parse_step()?);
        loop {
            match self.peek() {
                Token::Slash => {
                    self.advance();
                }
                Token::DoubleSlash => {
                    self.advance();
                    steps.push(Step::any_node(Axis::DescendantOrSelf));
                }
                _ => break,
            }
            steps.push(self.parse_step()?);
        }
        Ok(LocationPath { absolute, steps })
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Token::Dot | Token::DoubleDot | Token::At | Token::Star | Token::Name(_)
        )
    }

    fn parse_step(&mut self) -> Result<Step, String> {
        match self.peek() {
            Token::Dot => {
                self.advance();
                return Ok(Step::any_node(Axis::SelfAxis));
            }
            Token::DoubleDot => {
                self.advance();
                return Ok(Step::any_node(Axis::Parent));
            }
            _ => {}
        }

        let axis = if *self.peek() == Token::At {
            self.advance();
            Axis::Attribute
        } else if let (Token::Name(name), Token::DoubleColon) = (self.peek(), self.peek_at(1)) {
            let axis = Axis::from_name(name).ok_or_else(|| format!("unknown axis '{}'", name))?;
            self.advance();
            self.advance();
            axis
        } else {
            Axis::Child
        };

        let test = match self.advance() {
            Token::Star => NodeTest::Any,
            Token::Name(name) if is_node_type(&name) && *self.peek() == Token::LeftParen => {
                self.advance();
                self.expect(Token::RightParen)?;
                match name.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::Node,
                    other => return Err(format!("unsupported node type '{}()'", other)),
                }
            }
            Token::Name(name) => match name.strip_suffix(":*") {
                Some(prefix) => NodeTest::Prefix(prefix.to_string()),
                None => NodeTest::Name(name),
            },
            other => return Err(format!("expected node test, found {}", other.describe())),
        };

        let mut predicates = Vec::new();
        while *self.peek() == Token::LeftBracket {
            self.advance();
            predicates.push(self.parse_or()?);
            self.expect(Token::RightBracket)?;
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }
}

fn is_node_type(name: &str) -> bool {
    matches!(
        name,
        "text" | "node" | "comment" | "processing-instruction"
    )
}
