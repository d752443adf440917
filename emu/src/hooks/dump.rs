use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use arch::op::Op;
use serde::{Deserialize, Serialize};

use super::Hook;
use crate::error::ConfigError;
use crate::model::State;

/// Prints machine state at chosen addresses or before chosen instructions.
///
/// ```yaml
/// at:
///   36: { stack: true, memory: [100, 101] }
/// ops: [call, ret]
/// ```
#[derive(Debug, Default)]
pub struct Dump {
    file: Option<String>,
    list: List,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct List {
    #[serde(default)]
    at: HashMap<u32, Config>,
    #[serde(default)]
    ops: HashSet<Op>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Config {
    #[serde(default)]
    stack: bool,
    #[serde(default)]
    memory: Vec<u32>,
}

impl Dump {
    pub fn arg(file: Option<&Path>) -> Result<Self, ConfigError> {
        match file {
            Some(path) => {
                let name = path.display().to_string();
                let file = File::open(path).map_err(|e| ConfigError::Open(name.clone(), e))?;
                Self::from_reader(name, BufReader::new(file))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_reader(name: String, reader: impl std::io::Read) -> Result<Self, ConfigError> {
        let list: List =
            serde_yaml::from_reader(reader).map_err(|e| ConfigError::Parse(name.clone(), e))?;
        Ok(Self {
            file: Some(name),
            list,
        })
    }

    fn get(&self, pc: u32) -> Option<&Config> {
        self.list.at.get(&pc)
    }
}

impl Hook for Dump {
    fn init(&mut self, _state: &State) {
        if let Some(fname) = &self.file {
            println!(
                " * Dump[{}+{}] {:?}",
                self.list.at.len(),
                self.list.ops.len(),
                fname
            );
        }
    }

    fn exec(&mut self, time: u64, state: &State) {
        if let Some(cfg) = self.get(state.pc) {
            self.print_reg(time, state);
            if cfg.stack {
                self.print_stack(state);
            }
            self.print_memory(state, &cfg.memory);
        } else if state
            .peek_op()
            .is_some_and(|(op, _)| self.list.ops.contains(&op))
        {
            self.print_reg(time, state);
            self.print_stack(state);
        }
    }
}

impl Dump {
    fn print_reg(&self, time: u64, state: &State) {
        println!(" +----------------------------------------------+");
        println!(
            " | t: {:<8} pc: {:08X}  fp: {:<5} sp: {:<5} |",
            time,
            state.pc,
            state.fp,
            state.stack().len()
        );
        println!(" +----------------------------------------------+");
    }

    fn print_stack(&self, state: &State) {
        for (idx, cell) in state.stack().iter().enumerate().rev() {
            let mark = if idx == state.fp { "<- fp" } else { "" };
            println!(
                " | {:>5} : {:08X} {:>12} {:<14} |",
                idx, *cell as u32, cell, mark
            );
        }
        println!(" +----------------------------------------------+");
    }

    fn print_memory(&self, state: &State, addrs: &[u32]) {
        for &addr in addrs {
            match state.mem().get(addr as usize) {
                Some(byte) => println!(" | {:08X} : {:02X} {:<31} |", addr, byte, ""),
                None => println!(" | {:08X} : -- {:<31} |", addr, ""),
            }
        }
        if !addrs.is_empty() {
            println!(" +----------------------------------------------+");
        }
    }
}
