use color_print::cformat;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// One-byte instruction tag. The discriminant is the opcode byte in the image.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Display,
)]
#[repr(u8)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Op {
    EXIT,
    STKDUP,

    PUSHB,
    PUSHS,
    PUSHW,
    READB,
    READS,
    READW,
    STOREB,
    STORES,
    STOREW,

    ADD,
    SUB,
    MUL,
    DIV,
    MOD,
    INC,
    DEC,

    GETS,
    SAYNUM,
    SAYCHAR,
    SAYSTR,

    CALL,
    RET,
    JUMP,
    JUMPREL,
    JZ,
    JNZ,
}

impl Op {
    /// Look a mnemonic up by its exact (lowercase) name.
    pub fn parse(s: &str) -> Option<Self> {
        s.parse::<Self>().ok()
    }

    pub fn decode(byte: u8) -> Option<Self> {
        Self::try_from(byte).ok()
    }

    pub fn code(self) -> u8 {
        self.into()
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Width in bytes of the immediate operand that follows the opcode byte.
    pub fn width(self) -> usize {
        use Op::*;
        match self {
            PUSHB => 1,
            PUSHS => 2,
            PUSHW => 4,
            _ => 0,
        }
    }

    pub fn cformat(self, operand: Option<i32>) -> String {
        match operand {
            Some(imm) => cformat!("<r>{:<8}</><y>{}</>", self.name(), imm),
            None => cformat!("<r>{:<8}</>", self.name()),
        }
    }
}
