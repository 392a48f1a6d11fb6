use std::error::Error;
use std::fmt;

use miette::{miette, LabeledSpan, Report, Severity};

use crate::span::Span;

/// Broad category an error belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorClass {
    /// Badly shaped token or statement.
    Syntax,
    /// Label could not be defined or resolved.
    Resolution,
    /// Value outside of the range the machine can hold.
    Range,
    /// Engine could not decode the byte stream.
    Decode,
}

/// Error assembling a single line. Always fatal to the whole assembly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsmError {
    pub kind: AsmErrorKind,
    /// Line number inside the source, counting from 1.
    pub line: usize,
    /// Raw text of the offending line.
    pub text: String,
    /// Offending token, or whole statement if no single token is at fault.
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsmErrorKind {
    BadRegister(String),
    BadImmediate(String),
    BadLabel(String),
    BracketSyntaxError {
        token: String,
        expected_brackets: bool,
    },
    MissingOperand {
        mnemonic: String,
        expected: usize,
        found: usize,
    },
    UnexpectedOperand(String),
    UnknownMnemonic(String),
    UnknownDirective(String),
    UnknownLabel(String),
    DuplicateLabel(String),
    TableFull {
        capacity: usize,
    },
    RegisterOutOfRange(u32),
    AddressOutOfRange(i64),
    MemoryOverflow,
}

impl AsmErrorKind {
    pub fn class(&self) -> ErrorClass {
        use AsmErrorKind::*;
        match self {
            BadRegister(_)
            | BadImmediate(_)
            | BadLabel(_)
            | BracketSyntaxError { .. }
            | MissingOperand { .. }
            | UnexpectedOperand(_)
            | UnknownMnemonic(_)
            | UnknownDirective(_) => ErrorClass::Syntax,
            UnknownLabel(_) | DuplicateLabel(_) | TableFull { .. } => ErrorClass::Resolution,
            RegisterOutOfRange(_) | AddressOutOfRange(_) | MemoryOverflow => ErrorClass::Range,
        }
    }

    /// Diagnostic code shown next to rendered reports.
    pub fn code(&self) -> &'static str {
        use AsmErrorKind::*;
        match self {
            BadRegister(_) => "asm::bad_register",
            BadImmediate(_) => "asm::bad_immediate",
            BadLabel(_) => "asm::bad_label",
            BracketSyntaxError { .. } => "asm::brackets",
            MissingOperand { .. } => "asm::missing_operand",
            UnexpectedOperand(_) => "asm::unexpected_operand",
            UnknownMnemonic(_) => "asm::unknown_mnemonic",
            UnknownDirective(_) => "asm::unknown_directive",
            UnknownLabel(_) => "asm::unknown_label",
            DuplicateLabel(_) => "asm::duplicate_label",
            TableFull { .. } => "asm::table_full",
            RegisterOutOfRange(_) => "asm::register_range",
            AddressOutOfRange(_) => "asm::address_range",
            MemoryOverflow => "asm::overflow",
        }
    }

    fn help(&self) -> &'static str {
        use AsmErrorKind::*;
        match self {
            BadRegister(_) | RegisterOutOfRange(_) => "registers are written as R0, R1, R2 or R3",
            BadImmediate(_) => "literals may be decimal, or prefixed with 0x, 0o or 0b",
            BadLabel(_) => "labels are written as `name:` at the start of a line",
            BracketSyntaxError {
                expected_brackets: true,
                ..
            } => "LD and ST take their address in brackets, like [0x0100]",
            BracketSyntaxError { .. } => "jump targets are written without brackets",
            MissingOperand { .. } | UnexpectedOperand(_) => {
                "check the operands for this instruction"
            }
            UnknownMnemonic(_) => "check the list of available instructions in the documentation",
            UnknownDirective(_) => "available directives are .ORG, .BYTE and .WORD",
            UnknownLabel(_) => "labels must be defined somewhere in the file",
            DuplicateLabel(_) => "labels are only allowed once per file",
            TableFull { .. } => "the symbol table is sized from the number of labels",
            AddressOutOfRange(_) => "addresses range from 0x0000 to 0xFFFF",
            MemoryOverflow => "the program does not fit below address 0xFFFF",
        }
    }

    fn label(&self) -> &'static str {
        use AsmErrorKind::*;
        match self {
            BadRegister(_) | RegisterOutOfRange(_) => "incorrect register",
            BadImmediate(_) => "incorrect literal",
            BadLabel(_) => "incorrect label",
            BracketSyntaxError { .. } => "incorrect address",
            MissingOperand { .. } => "missing operand",
            UnexpectedOperand(_) => "unexpected operand",
            UnknownMnemonic(_) => "unknown instruction",
            UnknownDirective(_) => "unknown directive",
            UnknownLabel(_) => "unknown label",
            DuplicateLabel(_) => "duplicate label",
            TableFull { .. } => "no room for label",
            AddressOutOfRange(_) => "out-of-range address",
            MemoryOverflow => "overflowing statement",
        }
    }
}

impl AsmError {
    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }
}

impl Error for AsmError {}
impl Error for AsmErrorKind {}

impl fmt::Display for AsmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use AsmErrorKind::*;
        match self {
            BadRegister(tok) => write!(f, "Bad register `{}`", tok),
            BadImmediate(tok) => write!(f, "Bad immediate `{}`", tok),
            BadLabel(tok) => write!(f, "Bad label definition `{}`", tok),
            BracketSyntaxError {
                token,
                expected_brackets,
            } => {
                if *expected_brackets {
                    write!(f, "Address must be in [brackets]: `{}`", token)
                } else {
                    write!(f, "Address should not be in [brackets]: `{}`", token)
                }
            }
            MissingOperand {
                mnemonic,
                expected,
                found,
            } => write!(
                f,
                "{} expects {} operand(s), found {}",
                mnemonic, expected, found
            ),
            UnexpectedOperand(tok) => write!(f, "Unexpected operand `{}`", tok),
            UnknownMnemonic(tok) => write!(f, "Unknown mnemonic `{}`", tok),
            UnknownDirective(tok) => write!(f, "Unknown directive `{}`", tok),
            UnknownLabel(name) => write!(f, "Unknown label `{}`", name),
            DuplicateLabel(name) => write!(f, "Duplicate label `{}`", name),
            TableFull { capacity } => {
                write!(f, "Symbol table has run out of slots (capacity {})", capacity)
            }
            RegisterOutOfRange(idx) => write!(f, "Register out of range: R{}", idx),
            AddressOutOfRange(addr) => write!(f, "Address out of range: {:#x}", addr),
            MemoryOverflow => write!(f, "Program overflows memory past 0xFFFF"),
        }
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on line {}: `{}`", self.kind, self.line, self.text.trim())
    }
}

/// Fatal condition raised by the engine while decoding an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    /// Opcode that could not be executed.
    pub opcode: u8,
    /// Address the opcode was fetched from.
    pub addr: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    UnknownOpcode,
    /// Register index encoded in the opcode or operand byte is above R3.
    InvalidRegister(u8),
}

impl Fault {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Decode
    }
}

impl Error for Fault {}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FaultKind::UnknownOpcode => write!(
                f,
                "Unknown opcode {:02X} at address {:#06x}",
                self.opcode, self.addr
            ),
            FaultKind::InvalidRegister(idx) => write!(
                f,
                "Invalid register R{} in opcode {:02X} at address {:#06x}",
                idx, self.opcode, self.addr
            ),
        }
    }
}

/// Render an assembler error against the source it came from.
pub fn asm_report(err: &AsmError, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = err.kind.code(),
        help = err.kind.help(),
        labels = vec![LabeledSpan::at(err.span, err.kind.label())],
        "{} (line {})",
        err.kind,
        err.line,
    )
    .with_source_code(src.to_owned())
}

pub fn fault_report(fault: &Fault) -> Report {
    let code = match fault.kind {
        FaultKind::UnknownOpcode => "run::unknown_opcode",
        FaultKind::InvalidRegister(_) => "run::invalid_register",
    };
    miette!(
        severity = Severity::Error,
        code = code,
        help = "the engine halted; check that execution did not run into data",
        "{}",
        fault,
    )
}
