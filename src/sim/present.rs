//! Presentation hooks.
//!
//! After every committed cycle, the [`Machine`] calls its [`Presenter`] with a [`CycleEvent`]
//! describing what the cycle did. Presenters are used purely for display:
//! they only receive shared references to the machine state, so they cannot affect execution.
//!
//! This module provides:
//! - [`NullPresenter`]: A presenter which does nothing (the default).
//! - [`LogPresenter`]: A presenter which logs every cycle at the `debug` level.
//! - [`ChannelPresenter`]: A presenter which sends a [`CycleReport`] for every cycle over a channel,
//!     so that a renderer can run on another thread.
//!
//! [`Machine`]: super::Machine
use crossbeam_channel as cbc;

use super::bank::{BankRegistry, Loc, Value};
use super::flags::Flags;

/// What a committed cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleEvent {
    /// The number of the cycle (starting at 1 after a reset).
    pub cycle: u64,
    /// The address of the bundle that was executed.
    pub pc: usize,
    /// The mnemonic of every instruction in the bundle.
    pub labels: Vec<String>,
    /// The locations read by the bundle (in location order).
    pub reads: Vec<Loc>,
    /// The locations written by the bundle (in location order).
    pub writes: Vec<Loc>,
}

/// A hook which displays the machine after every committed cycle.
pub trait Presenter: Send + Sync {
    /// Presents a committed cycle.
    ///
    /// `banks` and `flags` hold the state after the cycle.
    fn present(&mut self, event: &CycleEvent, banks: &BankRegistry, flags: &Flags);
}
impl dyn Presenter {} // assert Presenter is dyn safe

/// A presenter which does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;
impl Presenter for NullPresenter {
    fn present(&mut self, _event: &CycleEvent, _banks: &BankRegistry, _flags: &Flags) {}
}

/// A presenter which logs every cycle at the `debug` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;
impl Presenter for LogPresenter {
    fn present(&mut self, event: &CycleEvent, banks: &BankRegistry, flags: &Flags) {
        let report = CycleReport::new(event, banks, flags);
        log::debug!("{report}");
    }
}

/// An owned description of a committed cycle, detached from the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// The number of the cycle.
    pub cycle: u64,
    /// The address of the bundle that was executed.
    pub pc: usize,
    /// The mnemonic of every instruction in the bundle.
    pub labels: Vec<String>,
    /// The cells read (as `name[index]`).
    pub reads: Vec<String>,
    /// The cells written (as `name[index]`) and the value they hold after the cycle.
    pub writes: Vec<(String, Value)>,
    /// Every flag and its value after the cycle.
    pub flags: Vec<(String, Value)>,
}
impl CycleReport {
    /// Creates a report from a cycle event and the state after the cycle.
    pub fn new(event: &CycleEvent, banks: &BankRegistry, flags: &Flags) -> Self {
        Self {
            cycle: event.cycle,
            pc: event.pc,
            labels: event.labels.clone(),
            reads: event.reads.iter()
                .map(|&loc| banks.describe(loc))
                .collect(),
            writes: event.writes.iter()
                .map(|&loc| (banks.describe(loc), banks.read(loc).unwrap_or(0)))
                .collect(),
            flags: flags.iter()
                .map(|(_, name, value)| (name.to_string(), value))
                .collect(),
        }
    }
}
impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cycle {} @ {}: {}", self.cycle, self.pc, self.labels.join(" | "))?;
        if !self.writes.is_empty() {
            f.write_str(" ->")?;
            for (name, value) in &self.writes {
                write!(f, " {name}={value}")?;
            }
        }
        for (name, value) in &self.flags {
            if *value != 0 {
                write!(f, " [{name}]")?;
            }
        }
        Ok(())
    }
}

/// A presenter which sends a [`CycleReport`] for every cycle over a channel.
///
/// If the receiver has been dropped, reports are discarded.
/// With a bounded channel, the machine blocks once the channel is full,
/// which can be used to pace execution to a renderer.
///
/// ```
/// use bitbench::ast::{Instr, Program};
/// use bitbench::sim::Machine;
/// use bitbench::sim::present::ChannelPresenter;
///
/// let (presenter, rx) = ChannelPresenter::unbounded();
/// let mut machine = Machine::default();
/// machine.set_presenter(presenter);
///
/// let program: Program = [Instr::new("add", ["1", "2", "r0"]), Instr::new("halt", [] as [&str; 0])].into_iter().collect();
/// machine.load(&program).unwrap();
/// machine.run(None).unwrap();
///
/// let reports: Vec<_> = rx.try_iter().collect();
/// assert_eq!(reports.len(), 2);
/// assert_eq!(reports[0].writes, vec![("r[0]".to_string(), 3)]);
/// assert_eq!(reports[1].labels, ["halt"]);
/// ```
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    tx: cbc::Sender<CycleReport>
}
impl ChannelPresenter {
    /// Creates a presenter which sends over the given sender.
    pub fn new(tx: cbc::Sender<CycleReport>) -> Self {
        Self { tx }
    }
    /// Creates a presenter over a new unbounded channel.
    pub fn unbounded() -> (Self, cbc::Receiver<CycleReport>) {
        let (tx, rx) = cbc::unbounded();
        (Self::new(tx), rx)
    }
    /// Creates a presenter over a new channel which holds at most `cap` reports.
    pub fn bounded(cap: usize) -> (Self, cbc::Receiver<CycleReport>) {
        let (tx, rx) = cbc::bounded(cap);
        (Self::new(tx), rx)
    }
}
impl Presenter for ChannelPresenter {
    fn present(&mut self, event: &CycleEvent, banks: &BankRegistry, flags: &Flags) {
        if self.tx.send(CycleReport::new(event, banks, flags)).is_err() {
            log::trace!("presenter receiver disconnected, dropping cycle {}", event.cycle);
        }
    }
}
