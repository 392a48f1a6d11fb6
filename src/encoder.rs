use crate::error::{AsmError, AsmErrorKind};
use crate::isa::{Instruction, Mnemonic};
use crate::lexer::{parse_int, Line, Token};
use crate::symbol::{Register, SymbolTable};

/// Parse an immediate: optional `#`, then an integer literal masked to 8 bits.
pub(crate) fn parse_imm(tok: &str) -> Result<u8, AsmErrorKind> {
    let digits = tok.strip_prefix('#').unwrap_or(tok);
    parse_int(digits)
        .map(|val| (val & 0xFF) as u8)
        .ok_or_else(|| AsmErrorKind::BadImmediate(tok.to_owned()))
}

/// Resolve a numeric address, `label` or `label+offset`.
pub(crate) fn resolve_addr(expr: &str, labels: &SymbolTable) -> Result<u16, AsmErrorKind> {
    let expr = expr.trim();
    let addr = match parse_int(expr) {
        Some(val) => val,
        None => match expr.split_once('+') {
            Some((name, offs)) => {
                let offs = offs.trim();
                let offs =
                    parse_int(offs).ok_or_else(|| AsmErrorKind::BadImmediate(offs.to_owned()))?;
                (labels.lookup(name.trim())? as i64)
                    .checked_add(offs)
                    .ok_or(AsmErrorKind::AddressOutOfRange(offs))?
            }
            None => labels.lookup(expr)? as i64,
        },
    };
    u16::try_from(addr).map_err(|_| AsmErrorKind::AddressOutOfRange(addr))
}

/// Walks the operand tokens of a single instruction.
struct Operands<'l, 'a> {
    line: &'l Line<'a>,
    labels: &'l SymbolTable,
    toks: std::slice::Iter<'l, Token<'a>>,
}

impl<'l, 'a> Operands<'l, 'a> {
    /// Check the operand count up front so that later `expect_*` calls cannot run out of tokens.
    fn new(
        line: &'l Line<'a>,
        mnemonic: &Token<'a>,
        ops: &'l [Token<'a>],
        expected: usize,
        labels: &'l SymbolTable,
    ) -> Result<Self, AsmError> {
        if ops.len() < expected {
            return Err(line.error(
                AsmErrorKind::MissingOperand {
                    mnemonic: mnemonic.val.to_ascii_uppercase(),
                    expected,
                    found: ops.len(),
                },
                line.span,
            ));
        }
        if let Some(extra) = ops.get(expected) {
            return Err(line.error(
                AsmErrorKind::UnexpectedOperand(extra.val.to_owned()),
                extra.span,
            ));
        }
        Ok(Operands {
            line,
            labels,
            toks: ops.iter(),
        })
    }

    fn next(&mut self) -> &'l Token<'a> {
        self.toks
            .next()
            .expect("operand count was checked when constructing `Operands`")
    }

    fn peek(&self) -> Option<&'l Token<'a>> {
        self.toks.clone().next()
    }

    fn expect_reg(&mut self) -> Result<Register, AsmError> {
        let tok = self.next();
        tok.val
            .parse::<Register>()
            .map_err(|kind| self.line.error(kind, tok.span))
    }

    fn expect_imm(&mut self) -> Result<u8, AsmError> {
        let tok = self.next();
        parse_imm(tok.val).map_err(|kind| self.line.error(kind, tok.span))
    }

    /// Address operand. `LD`/`ST` take it in brackets, jumps take it bare.
    fn expect_addr(&mut self, brackets: bool) -> Result<u16, AsmError> {
        let tok = self.next();
        let val = tok.val;
        let inner = match (brackets, val.strip_prefix('[').and_then(|v| v.strip_suffix(']'))) {
            (true, Some(inner)) => inner,
            (false, None) if !val.starts_with('[') && !val.ends_with(']') => val,
            _ => {
                return Err(self.line.error(
                    AsmErrorKind::BracketSyntaxError {
                        token: val.to_owned(),
                        expected_brackets: brackets,
                    },
                    tok.span,
                ))
            }
        };
        resolve_addr(inner, self.labels).map_err(|kind| self.line.error(kind, tok.span))
    }
}

/// Turn a mnemonic and its operand tokens into an instruction, resolving labels on the way.
pub(crate) fn encode(
    line: &Line,
    mnemonic: Mnemonic,
    mnemonic_tok: &Token,
    ops: &[Token],
    labels: &SymbolTable,
) -> Result<Instruction, AsmError> {
    let expected = match mnemonic {
        Mnemonic::Nop | Mnemonic::Hlt => 0,
        Mnemonic::Jmp | Mnemonic::Jz | Mnemonic::Jnz => 1,
        _ => 2,
    };
    let mut ops = Operands::new(line, mnemonic_tok, ops, expected, labels)?;

    let instr = match mnemonic {
        Mnemonic::Nop => Instruction::Nop,
        Mnemonic::Hlt => Instruction::Hlt,
        Mnemonic::Ldi => {
            let dest = ops.expect_reg()?;
            let imm = ops.expect_imm()?;
            Instruction::Ldi { dest, imm }
        }
        Mnemonic::Ld => {
            let dest = ops.expect_reg()?;
            let addr = ops.expect_addr(true)?;
            Instruction::Ld { dest, addr }
        }
        Mnemonic::St => {
            let src = ops.expect_reg()?;
            let addr = ops.expect_addr(true)?;
            Instruction::St { src, addr }
        }
        Mnemonic::Add => {
            let dest = ops.expect_reg()?;
            match ops.peek() {
                Some(tok) if tok.val.starts_with(['R', 'r']) => {
                    let src = ops.expect_reg()?;
                    Instruction::AddReg { dest, src }
                }
                _ => {
                    let imm = ops.expect_imm()?;
                    Instruction::AddImm { dest, imm }
                }
            }
        }
        Mnemonic::Sub => {
            let dest = ops.expect_reg()?;
            let imm = ops.expect_imm()?;
            Instruction::Sub { dest, imm }
        }
        Mnemonic::And => {
            let dest = ops.expect_reg()?;
            let imm = ops.expect_imm()?;
            Instruction::And { dest, imm }
        }
        Mnemonic::Or => {
            let dest = ops.expect_reg()?;
            let imm = ops.expect_imm()?;
            Instruction::Or { dest, imm }
        }
        Mnemonic::Xor => {
            let dest = ops.expect_reg()?;
            let imm = ops.expect_imm()?;
            Instruction::Xor { dest, imm }
        }
        Mnemonic::Jmp => Instruction::Jmp {
            addr: ops.expect_addr(false)?,
        },
        Mnemonic::Jz => Instruction::Jz {
            addr: ops.expect_addr(false)?,
        },
        Mnemonic::Jnz => Instruction::Jnz {
            addr: ops.expect_addr(false)?,
        },
    };
    Ok(instr)
}
