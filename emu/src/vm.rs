use arch::op::Op;

use crate::console::Console;
use crate::error::Fault;
use crate::hooks::Hook;
use crate::model::{State, DEFAULT_STACK};

/// What the machine does after one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Vm<'a> {
    state: State,
    console: Console<'a>,
    /// Address of the instruction being executed, kept for fault reports.
    inst_pc: u32,
}

impl<'a> Vm<'a> {
    pub fn new(image: Vec<u8>, console: Console<'a>) -> Self {
        Self::with_stack(image, console, DEFAULT_STACK)
    }

    pub fn with_stack(image: Vec<u8>, console: Console<'a>, cells: usize) -> Self {
        Vm {
            state: State::new(image, cells),
            console,
            inst_pc: 0,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Address of the last instruction fetched.
    pub fn inst_pc(&self) -> u32 {
        self.inst_pc
    }

    pub fn run(&mut self, start: u32) -> Result<u64, Fault> {
        self.run_with(start, &mut [], None)
    }

    /// Run from `start` until `exit`. Hooks see the state before every
    /// instruction. Returns the number of executed instructions.
    pub fn run_with(
        &mut self,
        start: u32,
        hooks: &mut [Box<dyn Hook + '_>],
        tmax: Option<u64>,
    ) -> Result<u64, Fault> {
        self.state.pc = start;
        for hook in hooks.iter_mut() {
            hook.init(&self.state);
        }

        let mut time = 0;
        let result = loop {
            if tmax.is_some_and(|tmax| time >= tmax) {
                break Err(Fault::TimeLimit(time));
            }
            for hook in hooks.iter_mut() {
                hook.exec(time, &self.state);
            }
            match self.step() {
                Ok(Flow::Continue) => time += 1,
                Ok(Flow::Exit) => break Ok(time + 1),
                Err(fault) => break Err(fault),
            }
        };

        match result {
            Ok(steps) => {
                self.console.flush()?;
                tracing::debug!("exit after {} steps", steps);
                Ok(steps)
            }
            Err(fault) => {
                // the fault is what gets reported
                let _ = self.console.flush();
                tracing::debug!("fault at 0x{:08X} after {} steps: {}", self.inst_pc, time, fault);
                Err(fault)
            }
        }
    }

    /// Fetch, decode and execute one instruction.
    pub fn step(&mut self) -> Result<Flow, Fault> {
        let state = &mut self.state;
        self.inst_pc = state.pc;
        let byte = state.fetch_byte()?;
        let op = Op::decode(byte).ok_or(Fault::UnknownOpcode(byte))?;
        let imm = match op.width() {
            0 => 0,
            width => state.fetch_imm(width)?,
        };

        match op {
            Op::EXIT => return Ok(Flow::Exit),
            Op::STKDUP => {
                let top = *state.top_mut()?;
                state.push(top)?;
            }

            Op::PUSHB | Op::PUSHS | Op::PUSHW => state.push(imm)?,
            Op::READB => self.read(1)?,
            Op::READS => self.read(2)?,
            Op::READW => self.read(4)?,
            Op::STOREB => self.store(1)?,
            Op::STORES => self.store(2)?,
            Op::STOREW => self.store(4)?,

            Op::ADD => self.binary(|a, b| Ok(a.wrapping_add(b)))?,
            Op::SUB => self.binary(|a, b| Ok(a.wrapping_sub(b)))?,
            Op::MUL => self.binary(|a, b| Ok(a.wrapping_mul(b)))?,
            Op::DIV => self.binary(|a, b| match b {
                0 => Err(Fault::DivideByZero),
                _ => Ok(a.wrapping_div(b)),
            })?,
            Op::MOD => self.binary(|a, b| match b {
                0 => Err(Fault::DivideByZero),
                _ => Ok(a.wrapping_rem(b)),
            })?,
            Op::INC => {
                let top = state.top_mut()?;
                *top = top.wrapping_add(1);
            }
            Op::DEC => {
                let top = state.top_mut()?;
                *top = top.wrapping_sub(1);
            }

            Op::GETS => self.gets()?,
            Op::SAYNUM => {
                let value = state.pop()?;
                self.console.say(value.to_string().as_bytes())?;
            }
            Op::SAYCHAR => {
                let value = state.pop()?;
                self.console.say(&[value as u8])?;
            }
            Op::SAYSTR => {
                let addr = state.pop()? as u32;
                self.console.say(self.state.cstr(addr)?)?;
            }

            Op::CALL => {
                let target = state.pop()? as u32;
                let ret = state.pc;
                state.enter(ret)?;
                state.pc = target;
            }
            Op::RET => {
                let value = state.pop()?;
                state.pc = state.leave()?;
                state.push(value)?;
            }
            Op::JUMP => state.pc = state.pop()? as u32,
            Op::JUMPREL => {
                let offset = state.pop()?;
                state.pc = state.pc.wrapping_add(offset as u32);
            }
            Op::JZ | Op::JNZ => {
                let target = state.pop()? as u32;
                let cond = state.pop()?;
                if (cond == 0) == (op == Op::JZ) {
                    state.pc = target;
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn binary(&mut self, f: impl Fn(i32, i32) -> Result<i32, Fault>) -> Result<(), Fault> {
        let b = self.state.pop()?;
        let a = self.state.pop()?;
        self.state.push(f(a, b)?)
    }

    fn read(&mut self, width: usize) -> Result<(), Fault> {
        let addr = self.state.pop()? as u32;
        let value = self.state.read(addr, width)?;
        self.state.push(value as i32)
    }

    fn store(&mut self, width: usize) -> Result<(), Fault> {
        let value = self.state.pop()?;
        let addr = self.state.pop()? as u32;
        self.state.write(addr, value, width)
    }

    /// Pops the destination, then the buffer size. The buffer receives a
    /// length byte, the text and a NUL.
    fn gets(&mut self) -> Result<(), Fault> {
        let dest = self.state.pop()? as u32;
        let max = self.state.pop()?;
        if max < 2 {
            return Err(Fault::BufferTooSmall(max));
        }
        let buf = self.state.bytes_mut(dest, max as usize)?;
        let limit = (max as usize - 2).min(u8::MAX as usize);
        let line = self.console.read_line(limit)?;
        buf[0] = line.len() as u8;
        buf[1..=line.len()].copy_from_slice(&line);
        buf[line.len() + 1] = 0;
        Ok(())
    }
}
