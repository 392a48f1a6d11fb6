// Assembling
mod lexer;
pub use lexer::parse_int;
mod encoder;
pub mod assembler;
pub use assembler::{assemble, assemble_with_labels, Assembly};
pub mod symbol;
pub use symbol::{Label, Register, SymbolTable};
pub mod image;
pub use image::{Image, MEMORY_SIZE};

// Running
pub mod isa;
pub use isa::{disassemble, Instruction, Mnemonic};
pub mod runtime;
pub use runtime::Cpu;

pub mod error;
pub use error::{AsmError, AsmErrorKind, ErrorClass, Fault, FaultKind};
mod span;
pub use span::{Idx, Span};

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 4;
