//! Storage banks for the machine.
//!
//! This module consists of:
//! - [`Bank`]: A named sequence of fixed-width cells.
//! - [`BankId`] and [`Loc`]: Handles to a bank and to a cell within a bank.
//! - [`BankRegistry`]: The set of all banks of a machine.
//! - [`MachineInitStrategy`]: How the reserved banks are filled on creation.
//!
//! Every write into a bank is truncated to the bank's width,
//! so no cell ever holds a value that does not fit its bank.
//!
//! ```
//! use bitbench::sim::bank::{BankRegistry, BankId, Loc};
//!
//! let mut banks = BankRegistry::new(8, 4, 16, &mut 0u64);
//! banks.write(Loc::new(BankId::Reg, 0), 300);
//! assert_eq!(banks.read(Loc::new(BankId::Reg, 0)), Some(44));
//!
//! let acc = banks.add_bank("acc", 16, 2).unwrap();
//! assert_eq!(banks[acc].width(), 16);
//! assert!(banks.add_bank("acc", 4, 1).is_err());
//! ```
use std::collections::HashMap;

use logos::Logos;
use rand::rngs::StdRng;
use rand::Rng;

use crate::parse::lex::Token;

/// The value held by a cell.
///
/// A cell's logical width is given by its bank and is at most [`MAX_WIDTH`] bits.
pub type Value = u64;

/// The widest a bank's cells can be, in bits.
pub const MAX_WIDTH: u32 = Value::BITS;

/// Names that can never be given to a user bank.
pub const RESERVED_NAMES: [&str; 6] = ["r", "m", "i", "pc", "flag", "instruction"];

/// Computes the mask of all values that fit in `width` bits.
pub fn mask(width: u32) -> Value {
    match width {
        0 => 0,
        w if w >= MAX_WIDTH => Value::MAX,
        w => (1 << w) - 1
    }
}

/// Computes the number of bits needed to hold every address of a memory of `len` cells,
/// including the first address past its end.
pub fn address_width(len: usize) -> u32 {
    (usize::BITS - len.leading_zeros()).clamp(1, MAX_WIDTH)
}

/// A handle to a bank.
///
/// The reserved banks are addressed directly by variant.
/// Banks added at run time are addressed by [`BankId::User`],
/// which can only be obtained from the [`BankRegistry`] that created the bank.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy)]
pub enum BankId {
    /// `r`, the general purpose registers.
    Reg,
    /// `m`, the addressable memory.
    Mem,
    /// `i`, the immediate pool (cleared every cycle).
    Imm,
    /// `pc`, the program counter.
    Pc,
    /// A bank added at run time.
    User(UserBankId),
}
/// The handle of a bank added at run time.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy)]
pub struct UserBankId(usize);

impl BankId {
    const RESERVED: [BankId; 4] = [BankId::Reg, BankId::Mem, BankId::Imm, BankId::Pc];

    /// The position of this bank in the registry (and in the snapshot).
    pub(crate) fn slot(self) -> usize {
        match self {
            BankId::Reg => 0,
            BankId::Mem => 1,
            BankId::Imm => 2,
            BankId::Pc  => 3,
            BankId::User(UserBankId(n)) => Self::RESERVED.len() + n,
        }
    }
    fn from_slot(slot: usize) -> Self {
        Self::RESERVED.get(slot)
            .copied()
            .unwrap_or_else(|| BankId::User(UserBankId(slot - Self::RESERVED.len())))
    }
    /// The name of this bank if it is a reserved bank.
    pub fn reserved_name(self) -> Option<&'static str> {
        match self {
            BankId::Reg => Some("r"),
            BankId::Mem => Some("m"),
            BankId::Imm => Some("i"),
            BankId::Pc  => Some("pc"),
            BankId::User(_) => None,
        }
    }
}

/// A location of a cell: a bank and an index into it.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy)]
pub struct Loc {
    /// The bank.
    pub bank: BankId,
    /// The index of the cell in the bank.
    pub index: usize,
}
impl Loc {
    /// Creates a new location.
    pub fn new(bank: BankId, index: usize) -> Self {
        Self { bank, index }
    }
    /// The location of the program counter.
    pub const PC: Loc = Loc { bank: BankId::Pc, index: 0 };
}

/// Errors raised when creating or looking up banks.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum BankErr {
    /// A bank (or flag) with this name already exists, or the name is reserved.
    DuplicateName(String),
    /// The requested width is not between 1 and [`MAX_WIDTH`].
    InvalidWidth {
        /// The bank's name.
        name: String,
        /// The requested width.
        width: u32
    },
    /// The name is not a valid bank name.
    InvalidBankName(String),
    /// No bank with this name exists.
    UnknownBank(String),
}
impl std::fmt::Display for BankErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BankErr::DuplicateName(name)          => write!(f, "name {name:?} is already in use"),
            BankErr::InvalidWidth { name, width } => write!(f, "invalid width {width} for bank {name:?}"),
            BankErr::InvalidBankName(name)        => write!(f, "{name:?} is not a valid bank name"),
            BankErr::UnknownBank(name)            => write!(f, "unknown bank {name:?}"),
        }
    }
}
impl std::error::Error for BankErr {}
impl crate::err::Error for BankErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            BankErr::DuplicateName(_)   => Some(format!("the names {RESERVED_NAMES:?} are reserved by the machine").into()),
            BankErr::InvalidWidth { .. } => Some(format!("bank widths must be between 1 and {MAX_WIDTH} bits").into()),
            BankErr::InvalidBankName(_) => Some("bank names start with a letter or underscore, consist of letters, digits, and underscores, and do not end in a digit".into()),
            BankErr::UnknownBank(name) if matches!(&**name, "flag" | "instruction") => Some(format!(
                "{name:?} is reserved by the machine, but is not a bank that can be used as an operand"
            ).into()),
            BankErr::UnknownBank(_)     => Some("banks can be added with `Machine::add_bank`".into()),
        }
    }
}

/// A named sequence of cells which all share the same bit width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bank {
    name: Box<str>,
    width: u32,
    cells: Vec<Value>
}
impl Bank {
    /// Creates a new bank of `count` zeroed cells.
    pub fn new(name: &str, width: u32, count: usize) -> Result<Self, BankErr> {
        if !(1..=MAX_WIDTH).contains(&width) {
            return Err(BankErr::InvalidWidth { name: name.to_string(), width });
        }

        Ok(Self { name: name.into(), width, cells: vec![0; count] })
    }

    /// The bank's name.
    pub fn name(&self) -> &str {
        &self.name
    }
    /// The width of each cell, in bits.
    pub fn width(&self) -> u32 {
        self.width
    }
    /// The mask of all values that fit in this bank's cells.
    pub fn mask(&self) -> Value {
        mask(self.width)
    }
    /// The number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }
    /// Whether this bank has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
    /// Reads the cell at the given index.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.cells.get(index).copied()
    }
    /// Writes a value into the cell at the given index, truncating it to the bank's width.
    ///
    /// This returns the value that was stored, or `None` if the index is out of bounds.
    pub fn set(&mut self, index: usize, value: u128) -> Option<Value> {
        let mask = self.mask();
        let cell = self.cells.get_mut(index)?;
        *cell = (value & u128::from(mask)) as Value;
        Some(*cell)
    }
    /// All cells of this bank.
    pub fn as_slice(&self) -> &[Value] {
        &self.cells
    }

    /// Appends a truncated value, returning the index it was stored at.
    pub(crate) fn push(&mut self, value: u128) -> usize {
        let index = self.cells.len();
        self.cells.push((value & u128::from(self.mask())) as Value);
        index
    }
    /// Removes every cell.
    pub(crate) fn clear(&mut self) {
        self.cells.clear();
    }
    /// Overwrites every cell with the provided cells (used to roll back to a snapshot).
    pub(crate) fn restore(&mut self, cells: &[Value]) {
        self.cells.clear();
        self.cells.extend_from_slice(cells);
    }
    /// Fills every cell with values produced by the filler.
    pub(crate) fn fill(&mut self, filler: &mut impl CellFiller) {
        let mask = self.mask();
        for cell in &mut self.cells {
            *cell = filler.generate() & mask;
        }
    }
}

/// Checks that a name can be used for a user bank.
fn valid_bank_name(name: &str) -> bool {
    let is_ident = match Token::lexer(name).collect::<Result<Vec<_>, _>>().as_deref() {
        Ok([Token::Ident(s)]) => s == name,
        _ => false
    };

    is_ident && !name.ends_with(|c: char| c.is_ascii_digit())
}

/// All banks of a machine.
///
/// The reserved banks `r`, `m`, `i`, and `pc` always exist.
/// More banks can be added with [`BankRegistry::add_bank`]. Banks are never removed.
///
/// The registry can be indexed with a [`BankId`]:
/// ```
/// use bitbench::sim::bank::{BankRegistry, BankId};
///
/// let banks = BankRegistry::new(8, 4, 16, &mut 0u64);
/// assert_eq!(banks[BankId::Reg].len(), 4);
/// assert_eq!(banks[BankId::Mem].len(), 16);
/// ```
#[derive(Debug, Clone)]
pub struct BankRegistry {
    banks: Vec<Bank>,
    by_name: HashMap<Box<str>, BankId>
}
impl BankRegistry {
    /// Creates a registry with only the reserved banks.
    ///
    /// `r` and `m` are `bit_length` wide and are filled by the filler.
    /// `i` is `bit_length` wide and empty.
    /// `pc` is wide enough to address every cell of `m`.
    ///
    /// # Panics
    ///
    /// Panics if `bit_length` is not between 1 and [`MAX_WIDTH`].
    pub fn new(bit_length: u32, register_amount: usize, memory_amount: usize, filler: &mut impl CellFiller) -> Self {
        assert!((1..=MAX_WIDTH).contains(&bit_length), "bit length must be between 1 and {MAX_WIDTH}");

        let reserved = [
            (BankId::Reg, bit_length, register_amount),
            (BankId::Mem, bit_length, memory_amount),
            (BankId::Imm, bit_length, 0),
            (BankId::Pc, address_width(memory_amount), 1),
        ];

        let mut banks = Vec::with_capacity(reserved.len());
        let mut by_name = HashMap::new();
        for (id, width, count) in reserved {
            let name = id.reserved_name()
                .unwrap_or_else(|| unreachable!("reserved bank should have a name"));
            let bank = Bank::new(name, width, count)
                .unwrap_or_else(|_| unreachable!("reserved bank width should have been checked"));

            by_name.insert(name.into(), id);
            banks.push(bank);
        }

        banks[BankId::Reg.slot()].fill(filler);
        banks[BankId::Mem.slot()].fill(filler);

        Self { banks, by_name }
    }

    /// Adds a new bank of `count` zeroed cells which are `width` bits wide.
    pub fn add_bank(&mut self, name: &str, width: u32, count: usize) -> Result<BankId, BankErr> {
        if RESERVED_NAMES.contains(&name) || self.by_name.contains_key(name) {
            return Err(BankErr::DuplicateName(name.to_string()));
        }
        if !valid_bank_name(name) {
            return Err(BankErr::InvalidBankName(name.to_string()));
        }
        let bank = Bank::new(name, width, count)?;

        let id = BankId::from_slot(self.banks.len());
        self.banks.push(bank);
        self.by_name.insert(name.into(), id);

        log::debug!("added bank {name:?} ({count} cells, {width} bits)");
        Ok(id)
    }

    /// Looks up a bank by its name.
    pub fn get_bank(&self, name: &str) -> Result<&Bank, BankErr> {
        self.id_of(name)
            .map(|id| &self[id])
            .ok_or_else(|| BankErr::UnknownBank(name.to_string()))
    }
    /// Looks up the handle of a bank by its name.
    pub fn id_of(&self, name: &str) -> Option<BankId> {
        self.by_name.get(name).copied()
    }
    /// Iterates over all bank names (in no particular order).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(|k| &**k)
    }
    /// Iterates over all banks in creation order (reserved banks first).
    pub fn iter(&self) -> impl Iterator<Item = (BankId, &Bank)> {
        self.banks.iter()
            .enumerate()
            .map(|(slot, bank)| (BankId::from_slot(slot), bank))
    }
    /// The number of banks (including reserved banks).
    pub fn len(&self) -> usize {
        self.banks.len()
    }
    /// Whether there are no banks (never true, as the reserved banks always exist).
    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    /// Reads the value at a location, returning `None` if the location is out of bounds.
    pub fn read(&self, loc: Loc) -> Option<Value> {
        self.banks.get(loc.bank.slot())?.get(loc.index)
    }
    /// Writes a value at a location, truncated to the bank's width.
    ///
    /// This returns the value that was stored, or `None` if the location is out of bounds.
    pub fn write(&mut self, loc: Loc, value: u128) -> Option<Value> {
        self.banks.get_mut(loc.bank.slot())?.set(loc.index, value)
    }
    /// Checks whether a location exists.
    pub fn contains(&self, loc: Loc) -> bool {
        self.banks.get(loc.bank.slot())
            .is_some_and(|b| loc.index < b.len())
    }
    /// Formats a location as `name[index]`.
    pub fn describe(&self, loc: Loc) -> String {
        match self.banks.get(loc.bank.slot()) {
            Some(b) => format!("{}[{}]", b.name(), loc.index),
            None    => format!("{:?}[{}]", loc.bank, loc.index),
        }
    }

    /// The current value of the program counter.
    pub fn pc(&self) -> usize {
        // widths are at most 64 bits, so this only truncates on 32-bit targets
        self[BankId::Pc].get(0).unwrap_or(0) as usize
    }
    /// Sets the program counter, truncating to the `pc` bank's width.
    pub fn set_pc(&mut self, pc: usize) {
        self[BankId::Pc].set(0, pc as u128);
    }

    /// Appends a value to the immediate pool, returning its location.
    pub(crate) fn push_imm(&mut self, value: u128) -> Loc {
        let index = self[BankId::Imm].push(value);
        Loc::new(BankId::Imm, index)
    }

    pub(crate) fn slots(&self) -> &[Bank] {
        &self.banks
    }
    pub(crate) fn slots_mut(&mut self) -> &mut [Bank] {
        &mut self.banks
    }
}
impl std::ops::Index<BankId> for BankRegistry {
    type Output = Bank;

    fn index(&self, index: BankId) -> &Self::Output {
        &self.banks[index.slot()]
    }
}
impl std::ops::IndexMut<BankId> for BankRegistry {
    fn index_mut(&mut self, index: BankId) -> &mut Self::Output {
        &mut self.banks[index.slot()]
    }
}

/// Trait that describes types that can be used to create the initial values of cells.
///
/// This is used when creating the `r` and `m` banks.
pub trait CellFiller {
    /// Generate the data.
    fn generate(&mut self) -> Value;
}
impl CellFiller for () {
    /// This creates unseeded, non-deterministic values.
    fn generate(&mut self) -> Value {
        rand::random()
    }
}
impl CellFiller for Value {
    /// Sets each cell to the given value.
    fn generate(&mut self) -> Value {
        *self
    }
}
impl CellFiller for StdRng {
    /// This creates values from the standard random number generator.
    ///
    /// This can be used to create deterministic, seeded values.
    fn generate(&mut self) -> Value {
        self.gen()
    }
}

/// Strategy used to initialize the `r` and `m` banks of the [`Machine`].
///
/// Banks added at run time are always zeroed.
///
/// [`Machine`]: super::Machine
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MachineInitStrategy {
    /// Initializes each cell randomly and non-deterministically.
    Unseeded,

    /// Initializes each cell randomly and deterministically.
    Seeded {
        /// The seed the RNG was initialized with.
        seed: u64
    },

    /// Initializes each cell to a known value (truncated to the bank's width).
    Known {
        /// The value to initialize each cell to.
        value: Value
    }
}
impl Default for MachineInitStrategy {
    fn default() -> Self {
        Self::Known { value: 0 }
    }
}

impl MachineInitStrategy {
    pub(super) fn generator(&self) -> impl CellFiller {
        use rand::SeedableRng;

        match self {
            MachineInitStrategy::Unseeded => CFGenerator::Unseeded,
            MachineInitStrategy::Seeded { seed } => CFGenerator::Seeded(Box::new(StdRng::seed_from_u64(*seed))),
            MachineInitStrategy::Known { value } => CFGenerator::Known(*value),
        }
    }
}

enum CFGenerator {
    Unseeded,
    Seeded(Box<StdRng>),
    Known(Value)
}
impl CellFiller for CFGenerator {
    fn generate(&mut self) -> Value {
        match self {
            CFGenerator::Unseeded  => ().generate(),
            CFGenerator::Seeded(r) => r.generate(),
            CFGenerator::Known(k)  => k.generate(),
        }
    }
}
