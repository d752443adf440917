pub mod assembler;
pub mod error;
pub mod label;
pub mod lexer;
pub mod map;
pub mod output;
pub mod stream;
pub mod token;
pub mod util;

pub use assembler::{Abort, Assembler, Assembly, Backpatch};
pub use error::{Diag, Error, Level, Report};
