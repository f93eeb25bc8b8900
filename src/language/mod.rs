pub mod ast;
pub mod compiler;
pub mod diagnostics;
pub mod errors;
pub mod options;
pub mod parser;
