use std::io::{self, Write};

use indexmap::IndexMap;

use crate::token::Pos;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelType {
    /// Absolute position in the image. Moves if the export table grows.
    Code,
    /// `.define` constant.
    Const,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub kind: LabelType,
    pub value: i64,
    pub pos: Pos,
}

/// Symbol table in definition order. The first definition of a name wins.
#[derive(Debug, Default)]
pub struct Labels {
    labels: IndexMap<String, Label>,
}

impl Labels {
    pub fn new() -> Self {
        Labels {
            labels: IndexMap::new(),
        }
    }

    /// Insert if absent. On a duplicate the existing label is returned and
    /// the table is left untouched.
    pub fn insert(
        &mut self,
        name: &str,
        pos: Pos,
        kind: LabelType,
        value: i64,
    ) -> Result<(), &Label> {
        if self.labels.contains_key(name) {
            return Err(&self.labels[name]);
        }
        self.labels
            .insert(name.to_string(), Label { kind, value, pos });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Label> {
        self.labels.get(name)
    }

    pub fn get_val(&self, name: &str) -> Option<i64> {
        self.labels.get(name).map(|label| label.value)
    }

    /// Move every code label at or past `from` forward by `by` bytes.
    pub fn shift(&mut self, from: usize, by: usize) {
        for label in self.labels.values_mut() {
            if label.kind == LabelType::Code && label.value >= from as i64 {
                label.value += by as i64;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Label)> {
        self.labels.iter()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// One `0x00000000  name` line per label.
    pub fn write_to(&self, mut out: impl Write) -> io::Result<()> {
        for (name, label) in &self.labels {
            writeln!(out, "0x{:08X}  {}", label.value as u32, name)?;
        }
        out.flush()
    }
}
