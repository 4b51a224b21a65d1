//! Selector tokenizer.

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Slash,       // /
    DoubleSlash, // //
    Dot,         // .
    DoubleDot,   // ..
    At,          // @
    Pipe,        // |
    Star,        // *
    Eq,          // =
    NotEq,       // !=
    Lt,          // <
    LtEq,        // <=
    Gt,          // >
    GtEq,        // >=
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    DoubleColon, // ::
    Number(f64),
    Literal(String),
    /// NCName, QName, or `prefix:*`.
    Name(String),
    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Literal(s) => format!("string '{}'", s),
            Token::Name(n) => format!("name '{}'", n),
            Token::Eof => "end of expression".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Slash => "/",
            Token::DoubleSlash => "//",
            Token::Dot => ".",
            Token::DoubleDot => "..",
            Token::At => "@",
            Token::Pipe => "|",
            Token::Star => "*",
            Token::Eq => "=",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::LtEq => "<=",
            Token::Gt => ">",
            Token::GtEq => ">=",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::Comma => ",",
            Token::DoubleColon => "::",
            _ => "",
        }
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, pos: 0 }
    }

    /// Tokenize the whole input; the last token is always [`Token::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.remaining().chars().nth(offset)
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, String> {
        self.skip_whitespace();

        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        let token = match c {
            '/' => {
                self.advance(1);
                if self.peek() == Some('/') {
                    self.advance(1);
                    Token::DoubleSlash
                } else {
                    Token::Slash
                }
            }
            '.' => {
                if self.peek_at(1) == Some('.') {
                    self.advance(2);
                    Token::DoubleDot
                } else if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                    self.read_number()?
                } else {
                    self.advance(1);
                    Token::Dot
                }
            }
            '@' => self.single(Token::At),
            '|' => self.single(Token::Pipe),
            '*' => self.single(Token::Star),
            '=' => self.single(Token::Eq),
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            '[' => self.single(Token::LeftBracket),
            ']' => self.single(Token::RightBracket),
            ',' => self.single(Token::Comma),
            '!' => {
                if self.peek_at(1) == Some('=') {
                    self.advance(2);
                    Token::NotEq
                } else {
                    return Err(format!("unexpected '!' at offset {}", self.pos));
                }
            }
            '<' => {
                self.advance(1);
                if self.peek() == Some('=') {
                    self.advance(1);
                    Token::LtEq
                } else {
                    Token::Lt
                }
            }
            '>' => {
                self.advance(1);
                if self.peek() == Some('=') {
                    self.advance(1);
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            ':' => {
                if self.peek_at(1) == Some(':') {
                    self.advance(2);
                    Token::DoubleColon
                } else {
                    return Err(format!("unexpected ':' at offset {}", self.pos));
                }
            }
            '"' | '\'' => self.read_literal(c)?,
            c if c.is_ascii_digit() => self.read_number()?,
            c if is_name_start(c) => self.read_name(),
            other => {
                return Err(format!(
                    "unexpected character '{}' at offset {}",
                    other, self.pos
                ))
            }
        };
        Ok(token)
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance(1);
        token
    }

    fn read_literal(&mut self, quote: char) -> Result<Token, String> {
        let start = self.pos;
        self.advance(1);
        match self.remaining().find(quote) {
            Some(len) => {
                let value = self.remaining()[..len].to_string();
                self.advance(len + 1);
                Ok(Token::Literal(value))
            }
            None => Err(format!("unterminated string literal at offset {}", start)),
        }
    }

    fn read_number(&mut self) -> Result<Token, String> {
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance(1);
            } else if c == '.' && !seen_dot && self.peek_at(1) != Some('.') {
                seen_dot = true;
                self.advance(1);
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| format!("invalid number '{}'", text))
    }

    fn read_name(&mut self) -> Token {
        let start = self.pos;
        self.consume_ncname();
        // A single colon joins a prefix to a local name or `*`; `::` ends the name.
        if self.peek() == Some(':') {
            match self.peek_at(1) {
                Some('*') => self.advance(2),
                Some(c) if is_name_start(c) => {
                    self.advance(1);
                    self.consume_ncname();
                }
                _ => {}
            }
        }
        Token::Name(self.input[start..self.pos].to_string())
    }

    fn consume_ncname(&mut self) {
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}
