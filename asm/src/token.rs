use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Pos) -> Self {
        Token { kind, pos }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Number(i64),
    Text(String),
    Colon,
    Eol,
}

impl TokenKind {
    /// Short description used in "expected X, found Y" diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier `{name}`"),
            TokenKind::Number(num) => format!("integer `{num}`"),
            TokenKind::Text(text) => format!("string {text:?}"),
            TokenKind::Colon => "colon".to_string(),
            TokenKind::Eol => "end-of-line".to_string(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            TokenKind::Ident(name) => format!("ident   ~{name}~"),
            TokenKind::Number(num) => format!("integer ~{num}~"),
            TokenKind::Text(text) => format!("string  ~{text}~"),
            TokenKind::Colon => "colon".to_string(),
            TokenKind::Eol => "eol".to_string(),
        };
        write!(f, "{}  :  {}", self.pos, kind)
    }
}

/// Source position. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pos {
    pub file: Rc<str>,
    pub line: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(file: Rc<str>, line: usize, col: usize) -> Self {
        Pos { file, line, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}
