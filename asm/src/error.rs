use color_print::cprintln;
use indexmap::IndexMap;
use thiserror::Error;

use crate::map::MapError;
use crate::token::Pos;

#[derive(Error, Debug)]
pub enum Error {
    // Scanner
    #[error("Unexpected character `{0}`")]
    UnexpectedChar(char),

    #[error("Unterminated string")]
    UnterminatedString,

    #[error("Invalid character literal")]
    InvalidChar,

    #[error("Invalid escape sequence: `\\{0}`")]
    InvalidEscape(char),

    #[error("Invalid integer literal: `{0}`")]
    InvalidInteger(String),

    // Statements
    #[error("Expected {0}, but found {1}")]
    Expected(&'static str, String),

    #[error("Unknown mnemonic: `{0}`")]
    UnknownMnemonic(String),

    #[error("`{0}` requires an operand")]
    MissingOperand(String),

    #[error("`{0}` takes no operand")]
    UnexpectedOperand(String),

    #[error("Bad operand type: {0}")]
    BadOperand(String),

    #[error("Value {0} does not fit in {1} byte(s)")]
    OutOfRange(i64, usize),

    #[error("Invalid byte count: {0}")]
    BadCount(i64),

    #[error("`{0}` must precede other statements")]
    HeaderOrder(String),

    #[error("Tile {0} {1} is outside 0..=255")]
    TileRange(&'static str, i64),

    #[error("Failed to read map data `{0}`: {1}")]
    MapData(String, MapError),

    #[error("Export name `{0}` is longer than 16 bytes, truncated to `{1}`")]
    ExportTruncated(String, String),

    // Symbols
    #[error("Re-defined label: `{0}`")]
    RedefinedLabel(String),

    #[error("`{0}` is already defined here")]
    PreviousDefinition(String),

    #[error("Undefined symbol: `{0}`")]
    UndefinedSymbol(String),

    // Fatal
    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to write file: {0}")]
    FileWrite(String, #[source] std::io::Error),

    #[error("Failed to scan `{0}`")]
    Scan(String),

    #[error("Include nested too deeply: `{0}`")]
    IncludeDepth(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warn,
    Note,
}

/// A message attached to a source position.
#[derive(Debug)]
pub struct Diag {
    pub level: Level,
    pub error: Error,
    pub pos: Pos,
}

impl Diag {
    pub fn error(error: Error, pos: Pos) -> Self {
        Diag {
            level: Level::Error,
            error,
            pos,
        }
    }

    pub fn warn(error: Error, pos: Pos) -> Self {
        Diag {
            level: Level::Warn,
            error,
            pos,
        }
    }

    pub fn note(error: Error, pos: Pos) -> Self {
        Diag {
            level: Level::Note,
            error,
            pos,
        }
    }

    /// Print with the location and the offending source line.
    pub fn print_diag(&self, files: &Sources) {
        match self.level {
            Level::Error => cprintln!("<red,bold>error</>: {}", self.error),
            Level::Warn => cprintln!("<yellow,bold>warn</>: {}", self.error),
            Level::Note => cprintln!("<green,bold>note</>: {}", self.error),
        }
        cprintln!("     <blue>--></> <underline>{}</>", self.pos);
        cprintln!("      <blue>|</>");

        let line_content = files
            .get(&*self.pos.file)
            .and_then(|lines| lines.get(self.pos.line.wrapping_sub(1)))
            .map(|s| s.as_str())
            .unwrap_or("");

        cprintln!(" <blue>{:>4} |</> {}", self.pos.line, line_content);
        cprintln!("      <blue>|</>");
    }
}

/// Source lines of every scanned file, keyed by the name used in [`Pos`].
pub type Sources = IndexMap<String, Vec<String>>;

/// Diagnostics collected over one assembly run.
#[derive(Debug, Default)]
pub struct Report {
    pub diags: Vec<Diag>,
    pub sources: Sources,
}

impl Report {
    pub fn push(&mut self, diag: Diag) {
        self.diags.push(diag);
    }

    pub fn error_count(&self) -> usize {
        self.diags
            .iter()
            .filter(|diag| diag.level == Level::Error)
            .count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.diags
            .iter()
            .filter(|diag| diag.level == Level::Error)
            .map(|diag| &diag.error)
    }

    pub fn print(&self) {
        for diag in &self.diags {
            diag.print_diag(&self.sources);
        }
    }
}
