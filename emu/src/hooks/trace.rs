use color_print::cprintln;

use super::Hook;
use crate::model::State;

/// Print every instruction before it runs.
pub struct Trace;

impl Hook for Trace {
    fn init(&mut self, state: &State) {
        println!(" * Trace from 0x{:08X}", state.pc);
    }

    fn exec(&mut self, time: u64, state: &State) {
        match state.peek_op() {
            Some((op, imm)) => cprintln!(
                "[{:0>6}] <b>{:08X}</> {} <dim>[{} cells]</>",
                time,
                state.pc,
                op.cformat(imm),
                state.stack().len()
            ),
            None => cprintln!("[{:0>6}] <b>{:08X}</> <r>??</>", time, state.pc),
        }
    }
}
