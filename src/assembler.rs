//! Two-pass assembly of source text into a memory [`Image`].
//!
//! The first pass only walks the address cursor to find where each label lands. The second pass
//! walks it again and emits bytes. Both passes move the cursor through [`advance`], so a label's
//! address always matches where the bytes following it are written.

use crate::encoder::{encode, parse_imm, resolve_addr};
use crate::error::{AsmError, AsmErrorKind};
use crate::image::{Image, MEMORY_SIZE};
use crate::isa::Mnemonic;
use crate::lexer::{self, parse_int, Line, Token};
use crate::symbol::{Label, SymbolTable};

/// Output of a successful assembly.
pub struct Assembly {
    pub image: Image,
    /// Every label defined by the source, ordered by address.
    pub labels: Vec<Label>,
}

/// Assemble `src` into a memory image. The first error aborts assembly.
pub fn assemble(src: &str) -> Result<Image, AsmError> {
    assemble_with_labels(src).map(|asm| asm.image)
}

/// Like [`assemble`], also returning the resolved labels.
pub fn assemble_with_labels(src: &str) -> Result<Assembly, AsmError> {
    let lines = lexer::lines(src);
    let labels = discover(&lines)?;
    log::debug!(
        "pass 1 found {} label(s), table capacity {}",
        labels.len(),
        labels.capacity()
    );
    let image = emit(&lines, &labels)?;
    log::debug!(
        "pass 2 emitted image ending at {:?}",
        image.end().map(|end| format!("{end:#06x}"))
    );
    Ok(Assembly {
        image,
        labels: labels.into_sorted(),
    })
}

/// Statement remaining on a line once any label definition is removed.
enum Stmt<'l, 'a> {
    Org(u16),
    Byte(&'l [Token<'a>]),
    Word(&'l Token<'a>),
    Instr {
        /// `None` for mnemonics that do not exist. Only the second pass rejects these.
        mnemonic: Option<Mnemonic>,
        tok: &'l Token<'a>,
        ops: &'l [Token<'a>],
    },
}

/// Split a line into its label definition, if any, and the statement that follows.
fn split_line<'l, 'a>(
    line: &'l Line<'a>,
) -> Result<(Option<(&'a str, &'l Token<'a>)>, Option<Stmt<'l, 'a>>), AsmError> {
    let (label, rest) = match line.toks.split_first() {
        Some((first, rest)) if first.val.ends_with(':') => {
            let name = &first.val[..first.val.len() - 1];
            if name.is_empty() || name.starts_with(['.', '#', '[']) || name.contains(':') {
                return Err(line.error(AsmErrorKind::BadLabel(first.val.to_owned()), first.span));
            }
            (Some((name, first)), rest)
        }
        _ => (None, &line.toks[..]),
    };
    let stmt = match rest.split_first() {
        Some((first, ops)) => Some(classify(line, first, ops)?),
        None => None,
    };
    Ok((label, stmt))
}

fn classify<'l, 'a>(
    line: &'l Line<'a>,
    first: &'l Token<'a>,
    ops: &'l [Token<'a>],
) -> Result<Stmt<'l, 'a>, AsmError> {
    let Some(dir) = first.val.strip_prefix('.') else {
        return Ok(Stmt::Instr {
            mnemonic: first.val.parse().ok(),
            tok: first,
            ops,
        });
    };

    let single = |name: &str| -> Result<&'l Token<'a>, AsmError> {
        match ops {
            [tok] => Ok(tok),
            [] => Err(line.error(
                AsmErrorKind::MissingOperand {
                    mnemonic: name.to_owned(),
                    expected: 1,
                    found: 0,
                },
                line.span,
            )),
            [_, extra, ..] => Err(line.error(
                AsmErrorKind::UnexpectedOperand(extra.val.to_owned()),
                extra.span,
            )),
        }
    };

    match dir.to_ascii_uppercase().as_str() {
        "ORG" => {
            let tok = single(".ORG")?;
            let val = parse_int(tok.val).ok_or_else(|| {
                line.error(AsmErrorKind::BadImmediate(tok.val.to_owned()), tok.span)
            })?;
            let addr = u16::try_from(val)
                .map_err(|_| line.error(AsmErrorKind::AddressOutOfRange(val), tok.span))?;
            Ok(Stmt::Org(addr))
        }
        "BYTE" => Ok(Stmt::Byte(ops)),
        "WORD" => Ok(Stmt::Word(single(".WORD")?)),
        _ => Err(line.error(
            AsmErrorKind::UnknownDirective(first.val.to_owned()),
            first.span,
        )),
    }
}

/// Cursor position after `stmt`, shared by both passes.
///
/// The cursor may reach 0x10000 (memory filled to the last byte) but never pass it.
fn advance(line: &Line, stmt: &Stmt, pos: u32) -> Result<u32, AsmError> {
    let next = match stmt {
        Stmt::Org(addr) => return Ok(*addr as u32),
        Stmt::Byte(vals) => pos + vals.len() as u32,
        Stmt::Word(_) => pos + 2,
        Stmt::Instr { mnemonic, .. } => pos + mnemonic.map_or(0, Mnemonic::len),
    };
    if next as usize > MEMORY_SIZE {
        return Err(line.error(AsmErrorKind::MemoryOverflow, line.span));
    }
    Ok(next)
}

/// Number of lines defining a label, used to size the symbol table.
fn count_labels(lines: &[Line]) -> usize {
    lines
        .iter()
        .filter(|line| line.toks.first().is_some_and(|tok| tok.val.ends_with(':')))
        .count()
}

/// First pass: record the address of every label without emitting anything.
fn discover(lines: &[Line]) -> Result<SymbolTable, AsmError> {
    let mut labels = SymbolTable::with_labels(count_labels(lines));
    let mut pos: u32 = 0;
    for line in lines {
        let (label, stmt) = split_line(line)?;
        if let Some((name, tok)) = label {
            let addr = u16::try_from(pos)
                .map_err(|_| line.error(AsmErrorKind::MemoryOverflow, tok.span))?;
            labels
                .add(name, addr)
                .map_err(|kind| line.error(kind, tok.span))?;
            log::trace!("label `{name}` at {addr:#06x}");
        }
        if let Some(stmt) = stmt {
            pos = advance(line, &stmt, pos)?;
        }
    }
    Ok(labels)
}

/// Second pass: emit every statement into a fresh image.
fn emit(lines: &[Line], labels: &SymbolTable) -> Result<Image, AsmError> {
    let mut image = Image::new();
    let mut pos: u32 = 0;
    for line in lines {
        let (_, stmt) = split_line(line)?;
        let Some(stmt) = stmt else {
            continue;
        };
        let bytes = match &stmt {
            Stmt::Org(_) => Vec::new(),
            Stmt::Byte(vals) => vals
                .iter()
                .map(|tok| parse_imm(tok.val).map_err(|kind| line.error(kind, tok.span)))
                .collect::<Result<Vec<u8>, AsmError>>()?,
            Stmt::Word(tok) => resolve_addr(tok.val, labels)
                .map_err(|kind| line.error(kind, tok.span))?
                .to_le_bytes()
                .to_vec(),
            Stmt::Instr {
                mnemonic: Some(mnemonic),
                tok,
                ops,
            } => encode(line, *mnemonic, tok, ops, labels)?.emit(),
            Stmt::Instr {
                mnemonic: None,
                tok,
                ..
            } => {
                return Err(line.error(
                    AsmErrorKind::UnknownMnemonic(tok.val.to_ascii_uppercase()),
                    tok.span,
                ))
            }
        };
        image
            .write(pos, &bytes)
            .map_err(|kind| line.error(kind, line.span))?;
        let next = advance(line, &stmt, pos)?;
        debug_assert!(
            matches!(stmt, Stmt::Org(_)) || next - pos == bytes.len() as u32,
            "passes disagree on the size of line {}",
            line.number
        );
        pos = next;
    }
    Ok(image)
}
