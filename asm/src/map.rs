use std::fs;
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("could not open file ({0})")]
    Open(#[source] std::io::Error),

    #[error("map is empty")]
    Empty,

    #[error("unexpected width of map line {line}: expected {expected}, found {found}")]
    Width {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("map of {0}x{1} is too large")]
    TooLarge(usize, usize),
}

/// Character code to tile byte translation. Unmapped characters become 0.
#[derive(Debug, Clone)]
pub struct TileMap([u8; 256]);

impl Default for TileMap {
    fn default() -> Self {
        TileMap([0; 256])
    }
}

impl TileMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, ch: u8, tile: u8) {
        self.0[ch as usize] = tile;
    }

    pub fn get(&self, ch: u8) -> u8 {
        self.0[ch as usize]
    }
}

/// Rectangular grid of equal-width lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapData {
    pub width: u16,
    pub height: u16,
    rows: Vec<Vec<u8>>,
}

impl MapData {
    pub fn read(path: &Path) -> Result<Self, MapError> {
        let bytes = fs::read(path).map_err(MapError::Open)?;
        Self::parse(&bytes)
    }

    /// Lines are trimmed of surrounding whitespace; trailing blank lines are
    /// ignored. Every line must be as wide as the first.
    pub fn parse(text: &[u8]) -> Result<Self, MapError> {
        let mut rows: Vec<Vec<u8>> = text
            .split(|&b| b == b'\n')
            .map(|line| line.trim_ascii().to_vec())
            .collect();
        while rows.last().is_some_and(|row| row.is_empty()) {
            rows.pop();
        }

        let width = match rows.first() {
            Some(row) => row.len(),
            None => return Err(MapError::Empty),
        };
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(MapError::Width {
                    line: idx + 1,
                    expected: width,
                    found: row.len(),
                });
            }
        }

        let height = rows.len();
        match (u16::try_from(width), u16::try_from(height)) {
            (Ok(w), Ok(h)) => Ok(MapData {
                width: w,
                height: h,
                rows,
            }),
            _ => Err(MapError::TooLarge(width, height)),
        }
    }

    /// Width (u16 LE), height (u16 LE), then one translated byte per cell.
    pub fn encode(&self, tiles: &TileMap) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.rows.len() * self.width as usize);
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        for row in &self.rows {
            out.extend(row.iter().map(|&ch| tiles.get(ch)));
        }
        out
    }
}
