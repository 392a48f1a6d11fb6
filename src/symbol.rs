use std::fmt;
use std::str::FromStr;

use crate::error::AsmErrorKind;

/// Represents the CPU registers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    R0 = 0,
    R1,
    R2,
    R3,
}

impl Register {
    pub const ALL: [Register; 4] = [Register::R0, Register::R1, Register::R2, Register::R3];

    /// Register for an index taken from the low nibble of an encoded byte.
    pub fn from_index(idx: u8) -> Option<Register> {
        Self::ALL.get(idx as usize).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Register {
    type Err = AsmErrorKind;

    /// Case-insensitive `R<digits>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = match s.strip_prefix(['R', 'r']) {
            Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                digits
            }
            _ => return Err(AsmErrorKind::BadRegister(s.to_owned())),
        };
        let idx: u32 = digits
            .parse()
            .map_err(|_| AsmErrorKind::RegisterOutOfRange(u32::MAX))?;
        u8::try_from(idx)
            .ok()
            .and_then(Register::from_index)
            .ok_or(AsmErrorKind::RegisterOutOfRange(idx))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.index())
    }
}

/// Label used to refer to a specific memory address.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Label {
    pub name: String,
    pub addr: u16,
}

impl Label {
    pub fn new(name: &str, addr: u16) -> Self {
        Label {
            name: name.to_owned(),
            addr,
        }
    }
}

const FNV_OFFSET: u32 = 2166136261;
const FNV_PRIME: u32 = 16777619;

/// 32-bit FNV-1a over the UTF-8 bytes of `name`.
pub fn fnv1a(name: &str) -> u32 {
    name.bytes()
        .fold(FNV_OFFSET, |hash, b| (hash ^ b as u32).wrapping_mul(FNV_PRIME))
}

/// Symbol table of label -> memory address.
///
/// Open addressing with linear probing over a fixed number of slots. The table never grows;
/// a probe that visits every slot without success fails instead of looping.
#[derive(Debug)]
pub struct SymbolTable {
    slots: Box<[Option<Label>]>,
    len: usize,
}

impl SymbolTable {
    /// Table sized for `count` labels, keeping the load factor at or below one half.
    pub fn with_labels(count: usize) -> Self {
        Self::with_capacity(usize::max(4, count * 2))
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        SymbolTable {
            slots: vec![None; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn start_index(&self, name: &str) -> usize {
        fnv1a(name) as usize % self.capacity()
    }

    pub fn add(&mut self, name: &str, addr: u16) -> Result<(), AsmErrorKind> {
        let cap = self.capacity();
        let start = self.start_index(name);
        for visited in 0..cap {
            let idx = (start + visited) % cap;
            match &self.slots[idx] {
                Some(label) if label.name == name => {
                    return Err(AsmErrorKind::DuplicateLabel(name.to_owned()))
                }
                Some(_) => continue,
                None => {}
            }
            self.slots[idx] = Some(Label::new(name, addr));
            self.len += 1;
            return Ok(());
        }
        Err(AsmErrorKind::TableFull { capacity: cap })
    }

    pub fn lookup(&self, name: &str) -> Result<u16, AsmErrorKind> {
        let cap = self.capacity();
        let start = self.start_index(name);
        for visited in 0..cap {
            match &self.slots[(start + visited) % cap] {
                Some(label) if label.name == name => return Ok(label.addr),
                Some(_) => continue,
                None => break,
            }
        }
        Err(AsmErrorKind::UnknownLabel(name.to_owned()))
    }

    /// Consume the table, returning its labels ordered by address then name.
    pub fn into_sorted(self) -> Vec<Label> {
        let mut labels: Vec<Label> = self.slots.into_vec().into_iter().flatten().collect();
        labels.sort_by(|a, b| a.addr.cmp(&b.addr).then_with(|| a.name.cmp(&b.name)));
        labels
    }
}
