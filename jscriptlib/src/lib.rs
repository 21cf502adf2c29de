pub mod bytecode;
pub mod compiler;
pub mod diagnostic;
pub mod lines;
pub mod resolver;
pub mod types;
pub mod vm;
