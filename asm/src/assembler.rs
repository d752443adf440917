use std::fs;
use std::path::{Path, PathBuf};

use arch::image::{self, EXPORT_COUNT_OFFSET, EXPORT_ENTRY_SIZE, EXPORT_NAME_LEN};
use arch::op::Op;
use thiserror::Error;

use crate::error::{Diag, Error, Report};
use crate::label::{LabelType, Labels};
use crate::lexer::Lexer;
use crate::map::{MapData, TileMap};
use crate::output::{fits, Output};
use crate::stream::TokenStream;
use crate::token::{Pos, Token, TokenKind};
use crate::util::{Entry, Operand};

pub const MAX_INCLUDE_DEPTH: usize = 64;

/// Upper bound for a single `.zero` directive.
pub const MAX_ZERO_FILL: i64 = 1 << 24;

/// Left in operand slots whose symbol never gets defined.
pub const SENTINEL: i64 = -1;

/// Operand slot waiting for a symbol that was not yet defined when the slot
/// was written.
#[derive(Debug, Clone)]
pub struct Backpatch {
    pub offset: usize,
    pub width: usize,
    pub name: String,
    pub pos: Pos,
}

/// Result of a completed run. The image is only valid when
/// [`Assembly::error_count`] is zero.
#[derive(Debug)]
pub struct Assembly {
    pub image: Vec<u8>,
    pub labels: Labels,
    pub listing: Vec<Entry>,
    pub report: Report,
}

impl Assembly {
    pub fn error_count(&self) -> usize {
        self.report.error_count()
    }
}

/// Run stopped by a fatal error. No image is produced.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct Abort {
    pub error: Error,
    pub report: Report,
}

#[derive(Debug, Default)]
pub struct Assembler {
    stream: TokenStream,
    out: Output,
    labels: Labels,
    patches: Vec<Backpatch>,
    tiles: TileMap,
    exports: usize,
    done_initial: bool,
    listing: Vec<Entry>,
    report: Report,
}

// ----------------------------------------------------------------------------
// Entry points

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assemble_file(path: impl AsRef<Path>) -> Result<Assembly, Abort> {
        let mut asm = Assembler::new();
        match asm.scan_file(path.as_ref()) {
            Ok(tokens) => asm.run(tokens),
            Err(error) => Err(asm.abort(error)),
        }
    }

    /// Assemble in-memory source. `file` names it in diagnostics and anchors
    /// relative `.include` and `.mapdata` paths.
    pub fn assemble_str(file: &str, code: &str) -> Result<Assembly, Abort> {
        let mut asm = Assembler::new();
        match asm.scan_str(file, code) {
            Ok(tokens) => asm.run(tokens),
            Err(error) => Err(asm.abort(error)),
        }
    }

    fn run(mut self, tokens: Vec<Token>) -> Result<Assembly, Abort> {
        self.stream = TokenStream::new(tokens);
        while self.stream.peek().is_some() {
            if let Err(error) = self.statement() {
                return Err(self.abort(error));
            }
        }
        self.resolve();
        tracing::debug!(
            "assembled {} bytes, {} labels, {} exports, {} error(s)",
            self.out.here(),
            self.labels.len(),
            self.exports,
            self.report.error_count()
        );
        Ok(Assembly {
            image: self.out.finish(),
            labels: self.labels,
            listing: self.listing,
            report: self.report,
        })
    }

    fn abort(self, error: Error) -> Abort {
        Abort {
            error,
            report: self.report,
        }
    }

    fn scan_file(&mut self, path: &Path) -> Result<Vec<Token>, Error> {
        let name = path.display().to_string();
        let code =
            fs::read_to_string(path).map_err(|e| Error::FileOpen(name.clone(), e))?;
        self.scan_str(&name, &code)
    }

    fn scan_str(&mut self, file: &str, code: &str) -> Result<Vec<Token>, Error> {
        self.report.sources.insert(
            file.to_string(),
            code.lines().map(|line| line.to_string()).collect(),
        );
        let (tokens, diags) = Lexer::new(file.into(), code).parse();
        if diags.is_empty() {
            Ok(tokens)
        } else {
            self.report.diags.extend(diags);
            Err(Error::Scan(file.to_string()))
        }
    }
}

/// `target` relative to the directory of the file that names it.
fn relative_to(base: &str, target: &str) -> PathBuf {
    let target = Path::new(target);
    match Path::new(base).parent() {
        Some(dir) if target.is_relative() => dir.join(target),
        _ => target.to_path_buf(),
    }
}

// ----------------------------------------------------------------------------
// Statements

impl Assembler {
    /// Only fatal errors come back as `Err`; everything else is reported and
    /// the rest of the line is skipped.
    fn statement(&mut self) -> Result<(), Error> {
        let Some(token) = self.stream.peek().cloned() else {
            return Ok(());
        };
        let name = match token.kind {
            TokenKind::Eol => {
                self.stream.next();
                return Ok(());
            }
            TokenKind::Ident(name) => name,
            other => {
                let diag = Diag::error(Error::Expected("identifier", other.describe()), token.pos);
                self.recover(diag);
                return Ok(());
            }
        };

        let result = match name.as_str() {
            ".export" | ".tileinfo" | ".mapdata" if self.done_initial => {
                Err(Diag::error(Error::HeaderOrder(name.clone()), token.pos))
            }
            ".export" => self.export(),
            ".tileinfo" => self.tileinfo(),
            ".mapdata" => self.mapdata(token.pos),
            ".include" => return self.include(),
            _ => {
                self.done_initial = true;
                self.ordinary(&name, token.pos)
            }
        };
        if let Err(diag) = result {
            self.recover(diag);
        }
        Ok(())
    }

    fn recover(&mut self, diag: Diag) {
        self.report.push(diag);
        self.stream.skip_line();
    }

    fn ordinary(&mut self, name: &str, pos: Pos) -> Result<(), Diag> {
        if let Some(Token {
            kind: TokenKind::Colon,
            ..
        }) = self.stream.peek_nth(1)
        {
            self.stream.next();
            self.stream.next();
            let here = self.out.here();
            self.define(name, pos, LabelType::Code, here as i64);
            self.listing.push(Entry::Label {
                name: name.to_string(),
                addr: here,
            });
            return Ok(());
        }

        match name {
            ".string" => self.data_string(pos),
            ".byte" => self.data_values(name, 1, pos),
            ".short" => self.data_values(name, 2, pos),
            ".word" => self.data_values(name, 4, pos),
            ".zero" => self.data_zero(pos),
            ".define" => self.define_const(),
            _ => self.instruction(name, pos),
        }
    }

    /// Bind a name. A duplicate is reported together with the first binding,
    /// which stays in effect.
    fn define(&mut self, name: &str, pos: Pos, kind: LabelType, value: i64) {
        if let Err(prev) = self.labels.insert(name, pos.clone(), kind, value) {
            let prev = prev.pos.clone();
            self.report
                .push(Diag::error(Error::RedefinedLabel(name.to_string()), pos));
            self.report
                .push(Diag::note(Error::PreviousDefinition(name.to_string()), prev));
        }
    }
}

// ----------------------------------------------------------------------------
// Token helpers

impl Assembler {
    fn unexpected(&self, what: &'static str, token: Option<Token>) -> Diag {
        match token.or_else(|| self.stream.here().cloned()) {
            Some(token) => Diag::error(Error::Expected(what, token.kind.describe()), token.pos),
            None => Diag::error(
                Error::Expected(what, "end of input".to_string()),
                Pos::new("<input>".into(), 0, 0),
            ),
        }
    }

    fn expect_number(&mut self) -> Result<(i64, Pos), Diag> {
        match self.stream.peek().cloned() {
            Some(Token {
                kind: TokenKind::Number(num),
                pos,
            }) => {
                self.stream.next();
                Ok((num, pos))
            }
            other => Err(self.unexpected("integer", other)),
        }
    }

    fn expect_text(&mut self) -> Result<(String, Pos), Diag> {
        match self.stream.peek().cloned() {
            Some(Token {
                kind: TokenKind::Text(text),
                pos,
            }) => {
                self.stream.next();
                Ok((text, pos))
            }
            other => Err(self.unexpected("string", other)),
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Pos), Diag> {
        match self.stream.peek().cloned() {
            Some(Token {
                kind: TokenKind::Ident(name),
                pos,
            }) => {
                self.stream.next();
                Ok((name, pos))
            }
            other => Err(self.unexpected("identifier", other)),
        }
    }

    /// The statement must end here; consumes the end-of-line token.
    fn end_line(&mut self) -> Result<(), Diag> {
        match self.stream.next_in_line() {
            None => {
                self.stream.next();
                Ok(())
            }
            Some(token) => Err(Diag::error(
                Error::Expected("end-of-line", token.kind.describe()),
                token.pos,
            )),
        }
    }

    fn write_value(&mut self, value: i64, width: usize, pos: &Pos) -> Result<(), Diag> {
        if !fits(value, width) {
            return Err(Diag::error(Error::OutOfRange(value, width), pos.clone()));
        }
        self.out.write(value, width);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Header-only directives

impl Assembler {
    /// `.export a b c`, or `.export` alone followed by lines of names.
    fn export(&mut self) -> Result<(), Diag> {
        self.stream.next();
        if !self.stream.at_eol() {
            return self.export_names();
        }
        self.stream.next();
        loop {
            while let Some(Token {
                kind: TokenKind::Eol,
                ..
            }) = self.stream.peek()
            {
                self.stream.next();
            }
            if !self.is_export_line() {
                return Ok(());
            }
            self.export_names()?;
        }
    }

    fn export_names(&mut self) -> Result<(), Diag> {
        while let Some(token) = self.stream.next_in_line() {
            match token.kind {
                TokenKind::Ident(name) => self.add_export(&name, token.pos),
                other => {
                    return Err(Diag::error(
                        Error::Expected("identifier", other.describe()),
                        token.pos,
                    ))
                }
            }
        }
        self.end_line()
    }

    /// A continuation line of an `.export` block holds only identifiers and
    /// does not start with a directive or a mnemonic.
    fn is_export_line(&self) -> bool {
        match self.stream.peek() {
            Some(Token {
                kind: TokenKind::Ident(first),
                ..
            }) if !first.starts_with('.') && Op::parse(first).is_none() => {}
            _ => return false,
        }
        let mut n = 0;
        while let Some(token) = self.stream.peek_nth(n) {
            match token.kind {
                TokenKind::Ident(_) => n += 1,
                TokenKind::Eol => return true,
                _ => return false,
            }
        }
        true
    }

    /// Append one entry to the export table at the head of the image. Data
    /// already emitted behind the table is moved to make room.
    fn add_export(&mut self, name: &str, pos: Pos) {
        let (field, truncated) = image::encode_name(name);
        if truncated {
            let short = String::from_utf8_lossy(&field[..EXPORT_NAME_LEN]).into_owned();
            self.report.push(Diag::warn(
                Error::ExportTruncated(name.to_string(), short),
                pos.clone(),
            ));
        }

        let at = image::code_start(self.exports);
        if self.out.here() > at {
            self.labels.shift(at, EXPORT_ENTRY_SIZE);
            for patch in self.patches.iter_mut().filter(|p| p.offset >= at) {
                patch.offset += EXPORT_ENTRY_SIZE;
            }
            for entry in self.listing.iter_mut() {
                entry.shift(at, EXPORT_ENTRY_SIZE);
            }
        }
        self.out.insert(at, EXPORT_ENTRY_SIZE);
        self.out.put(at, &field);
        self.out.patch(at + EXPORT_NAME_LEN, SENTINEL, 4);
        self.patches.push(Backpatch {
            offset: at + EXPORT_NAME_LEN,
            width: 4,
            name: name.to_string(),
            pos,
        });

        self.exports += 1;
        self.out
            .patch(EXPORT_COUNT_OFFSET, self.exports as i64, 4);
    }

    fn tileinfo(&mut self) -> Result<(), Diag> {
        self.stream.next();
        let (ch, pos) = self.expect_number()?;
        let (tile, tile_pos) = self.expect_number()?;
        if !(0..=255).contains(&ch) {
            return Err(Diag::error(Error::TileRange("character", ch), pos));
        }
        if !(0..=255).contains(&tile) {
            return Err(Diag::error(Error::TileRange("value", tile), tile_pos));
        }
        self.tiles.set(ch as u8, tile as u8);
        self.end_line()
    }

    fn mapdata(&mut self, pos: Pos) -> Result<(), Diag> {
        self.stream.next();
        let here = self.out.here();
        self.define("mapdata", pos.clone(), LabelType::Code, here as i64);

        let (file, file_pos) = self.expect_text()?;
        let path = relative_to(&file_pos.file, &file);
        match MapData::read(&path) {
            Ok(map) => {
                tracing::debug!(
                    "map {} is {}x{} at 0x{:08X}",
                    path.display(),
                    map.width,
                    map.height,
                    here
                );
                let bytes = map.encode(&self.tiles);
                self.listing.push(Entry::Data {
                    addr: here,
                    len: bytes.len(),
                    directive: ".mapdata".to_string(),
                    pos,
                });
                self.out.extend(&bytes);
            }
            Err(err) => self
                .report
                .push(Diag::error(Error::MapData(file, err), file_pos)),
        }
        self.end_line()
    }
}

// ----------------------------------------------------------------------------
// Include

impl Assembler {
    /// Scan the named file and splice its tokens right after this line.
    fn include(&mut self) -> Result<(), Error> {
        let depth = self.stream.depth();
        self.stream.next();
        let parsed = self
            .expect_text()
            .and_then(|target| self.end_line().map(|_| target));
        let (file, file_pos) = match parsed {
            Ok(target) => target,
            Err(diag) => {
                self.recover(diag);
                return Ok(());
            }
        };

        if depth >= MAX_INCLUDE_DEPTH {
            return Err(Error::IncludeDepth(file));
        }
        let path = relative_to(&file_pos.file, &file);
        let tokens = self.scan_file(&path)?;
        tracing::debug!("include {} ({} tokens)", path.display(), tokens.len());
        self.stream.splice(tokens);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Data directives

impl Assembler {
    fn data_string(&mut self, pos: Pos) -> Result<(), Diag> {
        self.stream.next();
        let (text, _) = self.expect_text()?;
        let here = self.out.here();
        self.out.extend(text.as_bytes());
        self.out.push(0);
        self.listing.push(Entry::Data {
            addr: here,
            len: text.len() + 1,
            directive: ".string".to_string(),
            pos,
        });
        self.end_line()
    }

    fn data_values(&mut self, directive: &str, width: usize, pos: Pos) -> Result<(), Diag> {
        self.stream.next();
        let here = self.out.here();
        let mut count = 0;
        while let Some(token) = self.stream.next_in_line() {
            match token.kind {
                TokenKind::Number(value) => self.write_value(value, width, &token.pos)?,
                other => {
                    return Err(Diag::error(
                        Error::Expected("integer", other.describe()),
                        token.pos,
                    ))
                }
            }
            count += 1;
        }
        if count == 0 {
            return Err(Diag::error(Error::MissingOperand(directive.to_string()), pos));
        }
        self.listing.push(Entry::Data {
            addr: here,
            len: count * width,
            directive: directive.to_string(),
            pos,
        });
        self.end_line()
    }

    fn data_zero(&mut self, pos: Pos) -> Result<(), Diag> {
        self.stream.next();
        let (count, count_pos) = self.expect_number()?;
        if !(0..=MAX_ZERO_FILL).contains(&count) {
            return Err(Diag::error(Error::BadCount(count), count_pos));
        }
        let here = self.out.here();
        self.out.extend(&vec![0; count as usize]);
        self.listing.push(Entry::Data {
            addr: here,
            len: count as usize,
            directive: ".zero".to_string(),
            pos,
        });
        self.end_line()
    }

    fn define_const(&mut self) -> Result<(), Diag> {
        self.stream.next();
        let (name, pos) = self.expect_ident()?;
        let (value, _) = self.expect_number()?;
        self.define(&name, pos, LabelType::Const, value);
        self.end_line()
    }
}

// ----------------------------------------------------------------------------
// Instructions

impl Assembler {
    fn instruction(&mut self, name: &str, pos: Pos) -> Result<(), Diag> {
        let op = match Op::parse(name) {
            Some(op) => op,
            None => {
                return Err(Diag::error(
                    Error::UnknownMnemonic(name.to_string()),
                    pos,
                ))
            }
        };
        self.stream.next();
        let here = self.out.here();
        self.out.push(op.code());

        let operand = match (op.width(), self.stream.next_in_line()) {
            (0, None) => None,
            (0, Some(token)) => {
                return Err(Diag::error(
                    Error::UnexpectedOperand(name.to_string()),
                    token.pos,
                ))
            }
            (_, None) => return Err(Diag::error(Error::MissingOperand(name.to_string()), pos)),
            (width, Some(token)) => Some(self.operand(token, width)?),
        };
        self.listing.push(Entry::Code {
            addr: here,
            op,
            operand,
            pos,
        });
        self.end_line()
    }

    /// Literal and known symbols are written right away; an unknown symbol
    /// gets a sentinel and a backpatch.
    fn operand(&mut self, token: Token, width: usize) -> Result<Operand, Diag> {
        match token.kind {
            TokenKind::Number(value) => {
                self.write_value(value, width, &token.pos)?;
                Ok(Operand::Literal)
            }
            TokenKind::Ident(name) => {
                match self.labels.get_val(&name) {
                    Some(value) => self.write_value(value, width, &token.pos)?,
                    None => {
                        self.patches.push(Backpatch {
                            offset: self.out.here(),
                            width,
                            name: name.clone(),
                            pos: token.pos,
                        });
                        self.out.write(SENTINEL, width);
                    }
                }
                Ok(Operand::Symbol(name))
            }
            other => Err(Diag::error(Error::BadOperand(other.describe()), token.pos)),
        }
    }
}

// ----------------------------------------------------------------------------
// Finalization

impl Assembler {
    fn resolve(&mut self) {
        for patch in std::mem::take(&mut self.patches) {
            match self.labels.get_val(&patch.name) {
                Some(value) if fits(value, patch.width) => {
                    tracing::trace!(
                        "patch 0x{:08X} <- {} ({})",
                        patch.offset,
                        value,
                        patch.name
                    );
                    self.out.patch(patch.offset, value, patch.width);
                }
                Some(value) => self.report.push(Diag::error(
                    Error::OutOfRange(value, patch.width),
                    patch.pos,
                )),
                None => self
                    .report
                    .push(Diag::error(Error::UndefinedSymbol(patch.name), patch.pos)),
            }
        }
    }
}
