pub mod console;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod model;
pub mod vm;

pub use console::Console;
pub use error::{ConfigError, Fault, LoadError};
pub use vm::{Flow, Vm};
