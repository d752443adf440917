pub mod dump;
pub mod trace;

use crate::model::State;

/// Observer driven by [`crate::vm::Vm::run_with`].
pub trait Hook {
    fn init(&mut self, _state: &State) {}
    /// Called before the instruction at `state.pc` executes.
    fn exec(&mut self, time: u64, state: &State);
}
