pub mod image;
pub mod op;
