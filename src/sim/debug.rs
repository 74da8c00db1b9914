//! Utilities to debug programs.
//!
//! The key type here is [`Breakpoint`], which can be appended to the [`Machine`]'s
//! breakpoint field to cause the machine to stop running.
//!
//! Breakpoints are checked after every committed cycle.
//!
//! [`Machine`]: super::Machine
use std::fmt::Write;

use super::bank::{Loc, Value};
use super::flags::Flag;
use super::Machine;

/// Common breakpoints.
#[derive(PartialEq, Eq, Hash)]
pub enum Breakpoint {
    /// Break when the PC is equal to the given value.
    Pc(usize),

    /// Break when the provided cell holds a given value.
    Cell {
        /// Cell to check.
        loc: Loc,
        /// Predicate to break against.
        value: Comparator
    },
    /// Break when the provided flag holds a given value.
    Flag {
        /// Flag to check.
        flag: Flag,
        /// Predicate to break against.
        value: Comparator
    },
}

impl Breakpoint where Breakpoint: Send + Sync { /* assert Breakpoint is send/sync */ }

impl Breakpoint {
    /// Checks if a break should occur.
    pub fn check(&self, machine: &Machine) -> bool {
        match self {
            Breakpoint::Pc(expected) => *expected == machine.banks().pc(),
            // a cell that does not exist never matches
            Breakpoint::Cell { loc, value: cmp } => machine.banks().read(*loc).is_some_and(|v| cmp.check(v)),
            Breakpoint::Flag { flag, value: cmp } => cmp.check(machine.flags().get(*flag)),
        }
    }

    fn fmt_bp(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Pc(expected) => {
                write!(f, "pc == {expected}")?;
            },
            Self::Cell { loc, value } => {
                write!(f, "{:?}[{}] ", loc.bank, loc.index)?;
                value.fmt_cmp(f)?;
            },
            Self::Flag { flag, value } => {
                write!(f, "{flag:?} ")?;
                value.fmt_cmp(f)?;
            },
        }
        Ok(())
    }
}
impl std::fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Breakpoint(")?;
        self.fmt_bp(f)?;
        f.write_char(')')
    }
}
/// Predicate checking whether the current value is equal to the value.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum Comparator {
    /// Never breaks.
    Never,
    /// Break if the desired value is less than the provided value.
    Lt(Value),
    /// Break if the desired value is equal to the provided value.
    Eq(Value),
    /// Break if the desired value is less than or equal to the provided value.
    Le(Value),
    /// Break if the desired value is greater than the provided value.
    Gt(Value),
    /// Break if the desired value is not equal to the provided value.
    Ne(Value),
    /// Break if the desired value is greater than or equal to the provided value.
    Ge(Value),
    /// Always breaks.
    Always
}
impl Comparator {
    /// Checks if the operand passes the comparator.
    pub fn check(&self, operand: Value) -> bool {
        match *self {
            Comparator::Never  => false,
            Comparator::Lt(r)  => operand < r,
            Comparator::Eq(r)  => operand == r,
            Comparator::Le(r)  => operand <= r,
            Comparator::Gt(r)  => operand > r,
            Comparator::Ne(r)  => operand != r,
            Comparator::Ge(r)  => operand >= r,
            Comparator::Always => true,
        }
    }

    fn fmt_cmp(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Comparator::Never  => f.write_str("never"),
            Comparator::Lt(r)  => write!(f, "< {r}"),
            Comparator::Eq(r)  => write!(f, "== {r}"),
            Comparator::Le(r)  => write!(f, "<= {r}"),
            Comparator::Gt(r)  => write!(f, "> {r}"),
            Comparator::Ne(r)  => write!(f, "!= {r}"),
            Comparator::Ge(r)  => write!(f, ">= {r}"),
            Comparator::Always => f.write_str("always"),
        }
    }
}
