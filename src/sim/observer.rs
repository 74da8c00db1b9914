//! Module handles access observers,
//! which store which accesses occur at a given location during a cycle.
//!
//! You would typically access an observer via [`Machine::observer`].
//! This [`AccessObserver`] can be used to query accesses via its [`get_accesses`]
//! method, or to list them with [`reads`] and [`writes`].
//!
//! The observer is cleared at the start of every cycle,
//! so it holds the accesses of the most recent cycle.
//!
//! [`Machine::observer`]: crate::sim::Machine::observer
//! [`get_accesses`]: AccessObserver::get_accesses
//! [`reads`]: AccessObserver::reads
//! [`writes`]: AccessObserver::writes

use std::collections::BTreeMap;

use super::bank::Loc;

/// The set of accesses which have occurred at this location.
///
/// ## Example
///
/// ```
/// # use bitbench::sim::observer::AccessSet;
///
/// let accesses = AccessSet::READ;
/// assert!(accesses.accessed());
/// assert!(accesses.read());
/// assert!(!accesses.written());
/// assert!(!accesses.modified());
/// ```
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct AccessSet(u8);
impl AccessSet {
    /// Set with only the read flag enabled.
    pub const READ: Self = Self(1 << 0);
    /// Set with only the write flag enabled.
    pub const WRITTEN: Self = Self(1 << 1);
    /// Set with only the modify flag enabled.
    pub const MODIFIED: Self = Self(1 << 2);

    /// True if any access has occurred.
    pub fn accessed(&self) -> bool {
        self.0 != 0
    }

    /// True if a read has occurred.
    pub fn read(&self) -> bool {
        self.0 & Self::READ.0 != 0
    }
    /// True if a write has occurred (does not necessarily have to change data).
    pub fn written(&self) -> bool {
        self.0 & Self::WRITTEN.0 != 0
    }
    /// True if a write has occurred (data must change).
    pub fn modified(&self) -> bool {
        self.0 & Self::MODIFIED.0 != 0
    }
}
impl std::ops::BitOr for AccessSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}
impl std::ops::BitOrAssign for AccessSet {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}
impl std::fmt::Debug for AccessSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessFlags")
            .field("accessed", &self.accessed())
            .field("read", &self.read())
            .field("written", &self.written())
            .field("modified", &self.modified())
            .finish()
    }
}

/// A struct that tracks accesses to bank cells.
#[derive(Debug, Default, Clone)]
pub struct AccessObserver {
    accesses: BTreeMap<Loc, AccessSet>
}
impl AccessObserver {
    /// Creates a new access observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all accesses.
    pub fn clear(&mut self) {
        self.accesses.clear();
    }

    /// Gets the access set for the given location.
    pub fn get_accesses(&self, loc: Loc) -> AccessSet {
        self.accesses.get(&loc).copied().unwrap_or_default()
    }

    /// Adds new flags to the access set for the given location.
    pub fn update_accesses(&mut self, loc: Loc, set: AccessSet) {
        *self.accesses.entry(loc).or_default() |= set;
    }

    /// All locations read since the last clear, in location order.
    pub fn reads(&self) -> Vec<Loc> {
        self.filtered(AccessSet::read)
    }
    /// All locations written since the last clear, in location order.
    pub fn writes(&self) -> Vec<Loc> {
        self.filtered(AccessSet::written)
    }

    fn filtered(&self, pred: impl Fn(&AccessSet) -> bool) -> Vec<Loc> {
        self.accesses.iter()
            .filter(|(_, set)| pred(set))
            .map(|(&loc, _)| loc)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::sim::bank::{BankId, Loc};

    use super::{AccessObserver, AccessSet};

    #[test]
    fn test_accesses() {
        let r0 = Loc::new(BankId::Reg, 0);
        let r1 = Loc::new(BankId::Reg, 1);
        let m0 = Loc::new(BankId::Mem, 0);

        let mut obs = AccessObserver::new();
        obs.update_accesses(r1, AccessSet::READ);
        obs.update_accesses(r0, AccessSet::READ);
        obs.update_accesses(m0, AccessSet::WRITTEN | AccessSet::MODIFIED);
        obs.update_accesses(r0, AccessSet::WRITTEN);

        assert!(obs.get_accesses(r0).read());
        assert!(obs.get_accesses(r0).written());
        assert!(!obs.get_accesses(r0).modified());
        assert!(obs.get_accesses(m0).modified());
        assert!(!obs.get_accesses(Loc::PC).accessed());

        assert_eq!(obs.reads(), vec![r0, r1]);
        assert_eq!(obs.writes(), vec![r0, m0]);

        obs.clear();
        assert!(obs.reads().is_empty());
    }
}
