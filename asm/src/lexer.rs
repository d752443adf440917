use std::iter::Peekable;
use std::rc::Rc;
use std::str::CharIndices;

use crate::error::{Diag, Error};
use crate::token::{Pos, Token, TokenKind};

pub struct Lexer<'a> {
    file: Rc<str>,
    code: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(file: Rc<str>, code: &'a str) -> Self {
        Self { file, code }
    }

    /// Every line yields its tokens followed by one end-of-line token.
    pub fn parse(self) -> (Vec<Token>, Vec<Diag>) {
        let mut tokens = Vec::new();
        let mut diags = Vec::new();
        for (idx, line) in self.code.lines().enumerate() {
            let lexer = LineLexer::new(line, self.file.clone(), idx + 1);
            let (toks, errs) = lexer.parse();
            tokens.extend(toks);
            diags.extend(errs);
        }
        (tokens, diags)
    }
}

struct LineLexer<'a> {
    iter: Peekable<CharIndices<'a>>,
    width: usize,
    file: Rc<str>,
    line: usize,
}

impl<'a> LineLexer<'a> {
    fn new(line: &'a str, file: Rc<str>, line_no: usize) -> Self {
        Self {
            iter: line.char_indices().peekable(),
            width: line.len(),
            file,
            line: line_no,
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

impl<'a> LineLexer<'a> {
    fn peek_nth(&self, n: usize) -> Option<(usize, char)> {
        self.iter.clone().nth(n)
    }
    fn consume(&mut self) -> Option<(usize, char)> {
        self.iter.next()
    }
    fn pos(&self, idx: usize) -> Pos {
        Pos::new(self.file.clone(), self.line, idx + 1)
    }
}

fn is_ident(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '.' || ch == '_'
}

fn escape(ch: char) -> Option<char> {
    match ch {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        '0' => Some('\0'),
        '\\' => Some('\\'),
        '"' => Some('"'),
        '\'' => Some('\''),
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Scanner
// ----------------------------------------------------------------------------

impl<'a> LineLexer<'a> {
    fn parse(mut self) -> (Vec<Token>, Vec<Diag>) {
        let mut tokens = Vec::new();
        let mut diags = Vec::new();
        while let Some((idx, ch0)) = self.peek_nth(0) {
            // 0. Skip whitespaces
            if ch0.is_whitespace() {
                self.consume();
                continue;
            }

            let pos = self.pos(idx);

            // 1. Comment
            if ch0 == ';' {
                break;
            }

            // 2. Colon
            if ch0 == ':' {
                self.consume();
                tokens.push(Token::new(TokenKind::Colon, pos));
                continue;
            }

            // 3. String literal
            if ch0 == '"' {
                match self.parse_text() {
                    Ok(text) => tokens.push(Token::new(TokenKind::Text(text), pos)),
                    Err(err) => {
                        diags.push(Diag::error(err, pos));
                        break;
                    }
                }
                continue;
            }

            // 4. Char literal
            if ch0 == '\'' {
                match self.parse_char() {
                    Ok(ch) => tokens.push(Token::new(TokenKind::Number(ch as i64), pos)),
                    Err(err) => {
                        diags.push(Diag::error(err, pos));
                        break;
                    }
                }
                continue;
            }

            // 5. Number literal
            let negative = ch0 == '-' && matches!(self.peek_nth(1), Some((_, ch)) if ch.is_ascii_digit());
            if ch0.is_ascii_digit() || negative {
                match self.parse_number() {
                    Ok(num) => tokens.push(Token::new(TokenKind::Number(num), pos)),
                    Err(err) => diags.push(Diag::error(err, pos)),
                }
                continue;
            }

            // 6. Identifier
            if is_ident(ch0) {
                tokens.push(Token::new(TokenKind::Ident(self.parse_ident()), pos));
                continue;
            }

            // Error
            self.consume();
            diags.push(Diag::error(Error::UnexpectedChar(ch0), pos));
        }
        tokens.push(Token::new(TokenKind::Eol, self.pos(self.width)));
        (tokens, diags)
    }

    fn parse_ident(&mut self) -> String {
        let mut lexeme = String::new();
        while let Some((_, ch)) = self.iter.next_if(|&(_, ch)| is_ident(ch)) {
            lexeme.push(ch);
        }
        lexeme
    }

    // Text: "hoge\nfuga"
    fn parse_text(&mut self) -> Result<String, Error> {
        self.consume();
        let mut lexeme = String::new();
        loop {
            match self.consume() {
                None => return Err(Error::UnterminatedString),
                Some((_, '"')) => return Ok(lexeme),
                Some((_, '\\')) => match self.consume() {
                    Some((_, ch)) => lexeme.push(escape(ch).ok_or(Error::InvalidEscape(ch))?),
                    None => return Err(Error::UnterminatedString),
                },
                Some((_, ch)) => lexeme.push(ch),
            }
        }
    }

    // Char: 'a' or '\n'
    fn parse_char(&mut self) -> Result<char, Error> {
        self.consume();
        let ch = match self.consume() {
            Some((_, '\\')) => match self.consume() {
                Some((_, ch)) => escape(ch).ok_or(Error::InvalidEscape(ch))?,
                None => return Err(Error::InvalidChar),
            },
            Some((_, '\'')) | None => return Err(Error::InvalidChar),
            Some((_, ch)) => ch,
        };
        match self.consume() {
            Some((_, '\'')) => Ok(ch),
            _ => Err(Error::InvalidChar),
        }
    }

    // Number: 42, -7, 0x2A, 0b101010, 1_000
    fn parse_number(&mut self) -> Result<i64, Error> {
        let mut lexeme = String::new();
        if let Some((_, '-')) = self.iter.next_if(|&(_, ch)| ch == '-') {
            lexeme.push('-');
        }
        while let Some((_, ch)) = self.iter.next_if(|&(_, ch)| is_ident(ch)) {
            lexeme.push(ch);
        }

        let (negative, body) = match lexeme.strip_prefix('-') {
            Some(body) => (true, body),
            None => (false, lexeme.as_str()),
        };
        let (radix, digits) = if let Some(hex) = body.strip_prefix("0x") {
            (16, hex)
        } else if let Some(bin) = body.strip_prefix("0b") {
            (2, bin)
        } else {
            (10, body)
        };
        let digits = digits.replace('_', "");
        match i64::from_str_radix(&digits, radix) {
            Ok(num) if negative => Ok(-num),
            Ok(num) => Ok(num),
            Err(_) => Err(Error::InvalidInteger(lexeme)),
        }
    }
}
