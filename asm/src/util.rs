use arch::op::Op;
use color_print::cformat;

use crate::token::{Pos, Token};

/// How an instruction operand was written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal,
    Symbol(String),
}

/// One line of the assembly listing, recorded while emitting.
#[derive(Debug, Clone)]
pub enum Entry {
    Label {
        name: String,
        addr: usize,
    },
    Code {
        addr: usize,
        op: Op,
        operand: Option<Operand>,
        pos: Pos,
    },
    Data {
        addr: usize,
        len: usize,
        directive: String,
        pos: Pos,
    },
}

impl Entry {
    pub fn addr(&self) -> usize {
        match self {
            Entry::Label { addr, .. } | Entry::Code { addr, .. } | Entry::Data { addr, .. } => *addr,
        }
    }

    /// Follow the image when bytes are inserted at `from`.
    pub fn shift(&mut self, from: usize, by: usize) {
        match self {
            Entry::Label { addr, .. } | Entry::Code { addr, .. } | Entry::Data { addr, .. } => {
                if *addr >= from {
                    *addr += by;
                }
            }
        }
    }
}

/// Little-endian operand at `at`, sign-extended from `width` bytes.
fn read_operand(image: &[u8], at: usize, width: usize) -> Option<i32> {
    let bytes = image.get(at..at + width)?;
    Some(match width {
        1 => bytes[0] as i8 as i32,
        2 => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
        _ => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    })
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn print_dump(listing: &[Entry], image: &[u8]) {
    println!("{}+{}", "-".repeat(27), "-".repeat(45));
    for entry in listing {
        let body = match entry {
            Entry::Label { name, .. } => {
                format!("{:27}| {}", "", cformat!("<g>{}:</>", name))
            }
            Entry::Code {
                addr,
                op,
                operand,
                pos,
            } => {
                let width = op.width();
                let end = (addr + 1 + width).min(image.len());
                let bin = hex(image.get(*addr..end).unwrap_or(&[]));
                let text = match operand {
                    None => op.cformat(None),
                    Some(Operand::Literal) => op.cformat(read_operand(image, addr + 1, width)),
                    Some(Operand::Symbol(sym)) => format!(
                        "{} {}",
                        op.cformat(read_operand(image, addr + 1, width)),
                        cformat!("<g>({})</>", sym)
                    ),
                };
                format!("[{:08X}] {:16} | {:>4}:   {}", addr, bin, pos.line, text)
            }
            Entry::Data {
                addr,
                len,
                directive,
                pos,
            } => {
                let shown = (*len).min(5);
                let mut bin = hex(image.get(*addr..addr + shown).unwrap_or(&[]));
                if *len > shown {
                    bin.push_str("..");
                }
                let text = cformat!("<c>{}</> ({} bytes)", directive, len);
                format!("[{:08X}] {:16} | {:>4}:   {}", addr, bin, pos.line, text)
            }
        };
        println!("{}", body);
    }
    println!("{}+{}", "-".repeat(27), "-".repeat(45));
}

pub fn print_tokens(tokens: &[Token]) {
    for token in tokens {
        println!("{}", token);
    }
}
