use std::ops::Range;

use arch::op::Op;

use crate::error::Fault;

pub const DEFAULT_STACK: usize = 4096;

/// Memory, operand stack and registers of the machine.
///
/// Memory is the loaded image itself. Cells on the stack are i32; addresses
/// taken from cells are read as unsigned, so a negative address is simply out
/// of bounds.
#[derive(Debug, Clone)]
pub struct State {
    mem: Vec<u8>,
    stack: Vec<i32>,
    limit: usize,
    pub fp: usize,
    pub pc: u32,
}

// Registers and stack
impl State {
    pub fn new(mem: Vec<u8>, limit: usize) -> Self {
        State {
            mem,
            stack: Vec::with_capacity(limit.min(DEFAULT_STACK)),
            limit,
            fp: 0,
            pc: 0,
        }
    }

    pub fn mem(&self) -> &[u8] {
        &self.mem
    }

    pub fn stack(&self) -> &[i32] {
        &self.stack
    }

    /// Cells above the frame pointer.
    pub fn frame(&self) -> &[i32] {
        &self.stack[self.fp.min(self.stack.len())..]
    }

    pub fn push(&mut self, value: i32) -> Result<(), Fault> {
        if self.stack.len() >= self.limit {
            return Err(Fault::StackOverflow(self.limit));
        }
        self.stack.push(value);
        Ok(())
    }

    /// Never reads below the current frame.
    pub fn pop(&mut self) -> Result<i32, Fault> {
        if self.stack.len() <= self.fp {
            return Err(Fault::StackUnderflow);
        }
        self.stack.pop().ok_or(Fault::StackUnderflow)
    }

    pub fn top_mut(&mut self) -> Result<&mut i32, Fault> {
        if self.stack.len() <= self.fp {
            return Err(Fault::StackUnderflow);
        }
        self.stack.last_mut().ok_or(Fault::StackUnderflow)
    }

    /// Open a frame: return address and caller's frame pointer go on the
    /// stack, the new frame starts above them.
    pub fn enter(&mut self, ret: u32) -> Result<(), Fault> {
        self.push(ret as i32)?;
        self.push(self.fp as i32)?;
        self.fp = self.stack.len();
        Ok(())
    }

    /// Drop the current frame and return the saved return address.
    pub fn leave(&mut self) -> Result<u32, Fault> {
        if self.fp < 2 || self.fp > self.stack.len() {
            return Err(Fault::StackUnderflow);
        }
        let saved_fp = self.stack[self.fp - 1];
        let ret = self.stack[self.fp - 2];
        self.stack.truncate(self.fp - 2);
        if saved_fp < 0 || saved_fp as usize > self.stack.len() {
            return Err(Fault::StackUnderflow);
        }
        self.fp = saved_fp as usize;
        Ok(ret as u32)
    }
}

// Memory access
impl State {
    pub fn range(&self, addr: u32, len: usize) -> Result<Range<usize>, Fault> {
        let start = addr as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.mem.len() => Ok(start..end),
            _ => Err(Fault::OutOfBounds { addr, len }),
        }
    }

    /// Little-endian, zero-extended.
    pub fn read(&self, addr: u32, width: usize) -> Result<u32, Fault> {
        let range = self.range(addr, width)?;
        Ok(self.mem[range]
            .iter()
            .rev()
            .fold(0, |acc, &b| (acc << 8) | b as u32))
    }

    pub fn write(&mut self, addr: u32, value: i32, width: usize) -> Result<(), Fault> {
        let range = self.range(addr, width)?;
        self.mem[range].copy_from_slice(&value.to_le_bytes()[..width]);
        Ok(())
    }

    pub fn bytes_mut(&mut self, addr: u32, len: usize) -> Result<&mut [u8], Fault> {
        let range = self.range(addr, len)?;
        Ok(&mut self.mem[range])
    }

    /// Bytes from `addr` up to, not including, the next NUL.
    pub fn cstr(&self, addr: u32) -> Result<&[u8], Fault> {
        let start = addr as usize;
        let tail = self.mem.get(start..).ok_or(Fault::OutOfBounds { addr, len: 1 })?;
        match tail.iter().position(|&b| b == 0) {
            Some(len) => Ok(&tail[..len]),
            None => Err(Fault::OutOfBounds {
                addr,
                len: tail.len() + 1,
            }),
        }
    }
}

// Instruction fetch
impl State {
    pub fn fetch_byte(&mut self) -> Result<u8, Fault> {
        let byte = *self
            .mem
            .get(self.pc as usize)
            .ok_or(Fault::PcOutOfBounds(self.pc))?;
        self.pc = self.pc.wrapping_add(1);
        Ok(byte)
    }

    /// Immediate of `width` bytes, sign-extended.
    pub fn fetch_imm(&mut self, width: usize) -> Result<i32, Fault> {
        let value = imm_at(&self.mem, self.pc, width).ok_or(Fault::PcOutOfBounds(self.pc))?;
        self.pc = self.pc.wrapping_add(width as u32);
        Ok(value)
    }

    /// Decode the instruction at `pc` without executing it.
    pub fn peek_op(&self) -> Option<(Op, Option<i32>)> {
        let op = Op::decode(*self.mem.get(self.pc as usize)?)?;
        match op.width() {
            0 => Some((op, None)),
            width => Some((op, imm_at(&self.mem, self.pc.wrapping_add(1), width))),
        }
    }
}

fn imm_at(mem: &[u8], at: u32, width: usize) -> Option<i32> {
    let start = at as usize;
    let bytes = mem.get(start..start.checked_add(width)?)?;
    Some(match width {
        1 => bytes[0] as i8 as i32,
        2 => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
        _ => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    })
}
