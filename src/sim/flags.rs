//! Machine flags.
//!
//! Flags are a small, extensible set of named values which instructions set
//! as a side effect (e.g., `carry` after an addition that does not fit its destination).
//! Every flag is cleared at the start of every cycle.
//!
//! ```
//! use bitbench::sim::flags::{Flag, Flags};
//!
//! let mut flags = Flags::new();
//! flags.set(Flag::CARRY, 1);
//! assert_eq!(flags.get(Flag::CARRY), 1);
//! assert_eq!(flags.by_name("carry"), Some(Flag::CARRY));
//!
//! let zero = flags.add("zero").unwrap();
//! assert_eq!(flags.get(zero), 0);
//! ```
use super::bank::{BankErr, Value};

/// A handle to a flag.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy)]
pub struct Flag(usize);
impl Flag {
    /// Set when an arithmetic result did not fit its destination.
    pub const CARRY: Flag = Flag(0);
    /// Signed overflow. Not set by the default instruction set.
    pub const OVERFLOW: Flag = Flag(1);

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// The set of flags of a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flags {
    names: Vec<Box<str>>,
    values: Vec<Value>
}
impl Flags {
    /// Creates the default flags (`carry` and `overflow`), cleared.
    pub fn new() -> Self {
        Self {
            names: vec!["carry".into(), "overflow".into()],
            values: vec![0, 0]
        }
    }

    /// Registers a new flag.
    pub fn add(&mut self, name: &str) -> Result<Flag, BankErr> {
        if self.by_name(name).is_some() {
            return Err(BankErr::DuplicateName(name.to_string()));
        }

        self.names.push(name.into());
        self.values.push(0);
        Ok(Flag(self.names.len() - 1))
    }
    /// Looks up a flag by name.
    pub fn by_name(&self, name: &str) -> Option<Flag> {
        self.names.iter()
            .position(|n| &**n == name)
            .map(Flag)
    }
    /// The name of a flag, or `None` if the flag was not registered here.
    pub fn name(&self, flag: Flag) -> Option<&str> {
        self.names.get(flag.0).map(|n| &**n)
    }
    /// Gets the value of a flag.
    ///
    /// A flag registered on another machine reads as 0.
    pub fn get(&self, flag: Flag) -> Value {
        self.values.get(flag.0).copied().unwrap_or(0)
    }
    /// Sets the value of a flag.
    ///
    /// Setting a flag registered on another machine does nothing.
    pub fn set(&mut self, flag: Flag, value: Value) {
        match self.values.get_mut(flag.0) {
            Some(slot) => *slot = value,
            None => log::warn!("ignoring write to unregistered flag {flag:?}"),
        }
    }
    /// Clears every flag.
    pub fn clear(&mut self) {
        self.values.fill(0);
    }
    /// Iterates over every flag, its name, and its value.
    pub fn iter(&self) -> impl Iterator<Item = (Flag, &str, Value)> {
        self.names.iter()
            .zip(&self.values)
            .enumerate()
            .map(|(i, (n, &v))| (Flag(i), &**n, v))
    }

    pub(crate) fn values(&self) -> &[Value] {
        &self.values
    }
    pub(crate) fn restore(&mut self, values: &[Value]) {
        self.values.clear();
        self.values.extend_from_slice(values);
    }
}
impl Default for Flags {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::sim::bank::BankErr;

    use super::{Flag, Flags};

    #[test]
    fn test_defaults() {
        let flags = Flags::new();
        assert_eq!(flags.by_name("carry"), Some(Flag::CARRY));
        assert_eq!(flags.by_name("overflow"), Some(Flag::OVERFLOW));
        assert_eq!(flags.name(Flag::OVERFLOW), Some("overflow"));
        assert!(flags.iter().all(|(_, _, v)| v == 0));
    }

    #[test]
    fn test_add_and_clear() {
        let mut flags = Flags::new();
        let zero = flags.add("zero").unwrap();
        assert_eq!(flags.add("carry"), Err(BankErr::DuplicateName("carry".into())));

        flags.set(zero, 1);
        flags.set(Flag::CARRY, 1);
        assert_eq!(flags.iter().map(|(_, n, v)| (n, v)).collect::<Vec<_>>(), vec![
            ("carry", 1), ("overflow", 0), ("zero", 1)
        ]);

        flags.clear();
        assert_eq!(flags.get(zero), 0);
        assert_eq!(flags.get(Flag::CARRY), 0);
    }

    #[test]
    fn test_foreign_flag() {
        let mut other = Flags::new();
        let zero = other.add("zero").unwrap();

        let mut flags = Flags::new();
        assert_eq!(flags.get(zero), 0);
        assert_eq!(flags.name(zero), None);

        flags.set(zero, 1);
        assert_eq!(flags.get(zero), 0);
        assert_eq!(flags.iter().count(), 2);
    }
}
