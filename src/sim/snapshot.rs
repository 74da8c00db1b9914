//! The pre-cycle snapshot of machine state.
//!
//! At the start of every cycle, the machine copies every bank and every flag
//! into its [`Snapshot`] (a "refresh"), then clears the flags and the immediate pool.
//! During the cycle, instructions read their inputs exclusively from the snapshot and write
//! their outputs exclusively to the live banks. This is what lets every instruction in a bundle
//! observe the same inputs, regardless of the order the instructions are executed in.
//!
//! The snapshot is a second buffer alongside the live banks.
//! Refreshing copies into the existing buffers, so no allocation occurs
//! unless a bank grew or was added since the last refresh.
//!
//! Because the snapshot holds the complete pre-cycle state, it is also used
//! to roll back a cycle that failed part way (see [`Snapshot::restore`]).
use super::bank::{BankId, BankRegistry, Loc, Value};
use super::flags::{Flag, Flags};

/// An immutable copy of the machine state from before the current cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    banks: Vec<Vec<Value>>,
    flags: Vec<Value>,
    /// The immediates resolved for the current cycle.
    imm: Vec<Value>
}
impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Default::default()
    }

    /// Copies the live state into this snapshot,
    /// then clears the live flags and immediate pool.
    pub(crate) fn refresh(&mut self, banks: &mut BankRegistry, flags: &mut Flags) {
        let slots = banks.slots();
        self.banks.resize_with(slots.len(), Vec::new);
        for (buf, bank) in self.banks.iter_mut().zip(slots) {
            buf.clear();
            buf.extend_from_slice(bank.as_slice());
        }
        self.flags.clear();
        self.flags.extend_from_slice(flags.values());
        self.imm.clear();

        flags.clear();
        banks[BankId::Imm].clear();
    }

    /// Freezes the immediate pool for the current cycle.
    ///
    /// This is called once every operand of the cycle has been resolved.
    pub(crate) fn freeze_immediates(&mut self, banks: &BankRegistry) {
        self.imm.clear();
        self.imm.extend_from_slice(banks[BankId::Imm].as_slice());
    }

    /// Restores the live state to the state this snapshot holds.
    ///
    /// This undoes every write performed since the last refresh
    /// (including clearing the flags and the immediate pool).
    pub(crate) fn restore(&self, banks: &mut BankRegistry, flags: &mut Flags) {
        for (bank, buf) in banks.slots_mut().iter_mut().zip(&self.banks) {
            bank.restore(buf);
        }
        flags.restore(&self.flags);
    }

    /// Reads the value at a location as it was before the cycle.
    ///
    /// Reading from the immediate pool (`i`) gives the immediates of the current cycle.
    /// This returns `None` if the location did not exist before the cycle.
    pub fn read(&self, loc: Loc) -> Option<Value> {
        let cells = match loc.bank {
            BankId::Imm => &self.imm,
            bank => self.banks.get(bank.slot())?,
        };
        cells.get(loc.index).copied()
    }
    /// All cells of a bank as they were before the cycle.
    pub fn bank(&self, bank: BankId) -> Option<&[Value]> {
        match bank {
            BankId::Imm => Some(&self.imm),
            bank => self.banks.get(bank.slot()).map(|b| &**b),
        }
    }
    /// The value of a flag before the cycle (0 for flags added during the cycle).
    pub fn flag(&self, flag: Flag) -> Value {
        self.flags.get(flag.index()).copied().unwrap_or(0)
    }
    /// The program counter before the cycle.
    pub fn pc(&self) -> usize {
        self.read(Loc::PC).unwrap_or(0) as usize
    }
}
