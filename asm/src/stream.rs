use crate::token::{Token, TokenKind};

/// Token arena with a read cursor.
///
/// Other streams can be spliced in at the cursor, which is how `.include`
/// works without re-scanning the including file. Each splice remembers where
/// its tokens end so the current nesting depth is known.
#[derive(Debug, Default)]
pub struct TokenStream {
    tokens: Vec<Token>,
    cursor: usize,
    spliced: Vec<usize>,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        TokenStream {
            tokens,
            cursor: 0,
            spliced: Vec::new(),
        }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.cursor + n)
    }

    pub fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    /// Next token of the current line. End-of-line is left in place.
    pub fn next_in_line(&mut self) -> Option<Token> {
        match self.peek() {
            Some(token) if token.kind != TokenKind::Eol => self.next(),
            _ => None,
        }
    }

    pub fn at_eol(&self) -> bool {
        matches!(self.peek(), None | Some(Token { kind: TokenKind::Eol, .. }))
    }

    /// Advance past the next end-of-line token.
    pub fn skip_line(&mut self) {
        while let Some(token) = self.next() {
            if token.kind == TokenKind::Eol {
                break;
            }
        }
    }

    /// The token under the cursor, or the last one once the stream is drained.
    pub fn here(&self) -> Option<&Token> {
        self.peek().or_else(|| self.tokens.last())
    }

    /// Insert `tokens` at the cursor; they are read before the remaining tail.
    /// A splice that ends exactly at the cursor encloses the new tokens.
    pub fn splice(&mut self, tokens: Vec<Token>) {
        let len = tokens.len();
        let cursor = self.cursor;
        self.tokens.splice(cursor..cursor, tokens);
        self.spliced.retain(|&end| end >= cursor);
        for end in self.spliced.iter_mut() {
            *end += len;
        }
        self.spliced.push(self.cursor + len);
    }

    /// Number of spliced streams the cursor is currently inside.
    pub fn depth(&mut self) -> usize {
        let cursor = self.cursor;
        self.spliced.retain(|&end| end > cursor);
        self.spliced.len()
    }
}
