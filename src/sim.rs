//! Simulating and execution for bank-based programs.
//!
//! This module is focused on executing programs (i.e., [`Program`]) on an abstract machine.
//!
//! This module consists of:
//! - [`Machine`]: The struct that executes programs.
//! - [`bank`]: The module handling the machine's storage banks.
//! - [`resolve`]: The module resolving operand tokens to storage locations.
//! - [`snapshot`]: The module handling the pre-cycle snapshot of the machine.
//! - [`flags`]: The module handling the machine's flags.
//! - [`isa`]: The module handling the instruction set.
//! - [`debug`]: The module handling types of breakpoints for the machine.
//! - [`observer`]: The module tracking which cells a cycle accessed.
//! - [`present`]: The module handling presentation hooks.
//!
//! # Usage
//!
//! To execute some code, you need to instantiate a Machine and load a program to it:
//!
//! ```
//! use bitbench::ast::{Instr, Program};
//! use bitbench::sim::Machine;
//!
//! let mut machine = Machine::default();
//! machine.inject("r0", 250).unwrap();
//! machine.inject("r1", 10).unwrap();
//!
//! let program: Program = [
//!     Instr::new("add", ["r0", "r1", "r2"]),
//!     Instr::new("halt", [] as [&str; 0]),
//! ].into_iter().collect();
//! machine.load(&program).unwrap();
//! machine.run(None).unwrap();
//!
//! assert_eq!(machine.extract("r2"), Ok(4));
//! ```
//!
//! ## Configuration
//!
//! Here, we define `machine` to have the default configuration.
//! We could also configure the machine by editing the configuration. For example,
//! if we wish to use 16-bit registers, we can edit the configuration like so:
//!
//! ```
//! # use bitbench::sim::{Machine, MachineConfig};
//! let machine = Machine::new(MachineConfig { bit_length: 16, ..Default::default() }).unwrap();
//! ```
//!
//! All of the available options can be found in [`MachineConfig`].
//!
//! ## Cycles
//!
//! A machine executes one bundle per cycle. Each cycle:
//! 1. takes a snapshot of every bank and flag, then clears the flags and the immediate pool (`i`),
//! 2. resolves every operand of the bundle,
//! 3. dispatches every instruction of the bundle in declaration order, where
//!     every instruction reads from the snapshot and writes to the live banks, and
//! 4. commits, advancing the program counter once for the whole bundle
//!     (unless a control transfer overwrote it).
//!
//! If any step fails, the cycle is rolled back: every bank and flag is left exactly as it was before the cycle,
//! and the observer holds no accesses.
//!
//! ## Execution
//!
//! Beyond the basic [`Machine::run`] (which runs until halting or until a cycle limit),
//! there are also:
//! - [`Machine::step`]: manual cycle-by-cycle execution
//! - [`Machine::run_while`]: more advanced programmatic execution
//!
//! ```
//! use bitbench::ast::{Bundle, Instr, Program};
//! use bitbench::sim::{Machine, StopReason};
//!
//! let mut machine = Machine::default();
//! machine.inject("r0", 1).unwrap();
//! machine.inject("r1", 2).unwrap();
//!
//! // swap r0 and r1 in one cycle, then loop forever
//! let program = Program::from_iter([
//!     Bundle::new([Instr::new("mov", ["r0", "r1"]), Instr::new("mov", ["r1", "r0"])]),
//!     Bundle::from(Instr::new("jmp", ["1"])),
//! ]);
//! machine.load(&program).unwrap();
//!
//! machine.step().unwrap();
//! assert_eq!(machine.extract("r0"), Ok(2));
//! assert_eq!(machine.extract("r1"), Ok(1));
//!
//! let outcome = machine.run(Some(10)).unwrap();
//! assert_eq!(outcome.reason, StopReason::CycleLimit);
//! assert_eq!(outcome.cycles, 10);
//! ```
pub mod bank;
pub mod debug;
pub mod flags;
pub mod isa;
pub mod observer;
pub mod present;
pub mod resolve;
pub mod snapshot;

use std::collections::HashSet;
use std::sync::Arc;

use crate::ast::{Bundle, Program};
use crate::parse::parse_operand;
use bank::{Bank, BankErr, BankId, BankRegistry, Loc, MachineInitStrategy, Value, MAX_WIDTH};
use debug::Breakpoint;
use flags::{Flag, Flags};
use isa::{ExecCtx, InstrDesc, InstrSet};
use observer::AccessObserver;
use present::{CycleEvent, NullPresenter, Presenter};
use resolve::{locate, resolve_all, ResolveErr, Target};
use snapshot::Snapshot;

/// Errors that can occur while loading a program.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum LoadErr {
    /// The mnemonic is not in the machine's instruction set.
    UnknownInstruction {
        /// The mnemonic.
        mnemonic: String,
        /// The address of the bundle holding the instruction.
        addr: usize
    },
    /// The instruction was given the wrong number of operands.
    WrongArity {
        /// The mnemonic.
        mnemonic: String,
        /// The address of the bundle holding the instruction.
        addr: usize,
        /// The number of operands the instruction takes.
        expected: usize,
        /// The number of operands provided.
        found: usize
    },
    /// The instruction does not support the machine's bit length.
    UnsupportedBitLength {
        /// The mnemonic.
        mnemonic: String,
        /// The machine's bit length.
        bit_length: u32
    },
    /// The program does not fit in memory at the given origin.
    ProgramTooLarge {
        /// The address the program was loaded at.
        origin: usize,
        /// The number of bundles in the program.
        len: usize,
        /// The number of cells in memory.
        capacity: usize
    },
}
impl std::fmt::Display for LoadErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadErr::UnknownInstruction { mnemonic, addr } => write!(f, "unknown instruction {mnemonic:?} at address {addr}"),
            LoadErr::WrongArity { mnemonic, addr, expected, found } => write!(f, "instruction {mnemonic:?} at address {addr} expects {expected} operands, found {found}"),
            LoadErr::UnsupportedBitLength { mnemonic, bit_length } => write!(f, "instruction {mnemonic:?} does not support a bit length of {bit_length}"),
            LoadErr::ProgramTooLarge { origin, len, capacity } => write!(f, "program of {len} bundles does not fit at address {origin} in a memory of {capacity} cells"),
        }
    }
}
impl std::error::Error for LoadErr {}
impl crate::err::Error for LoadErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LoadErr::UnknownInstruction { .. } => Some("custom instructions can be added with `Machine::define_instr`".into()),
            LoadErr::WrongArity { .. } => None,
            LoadErr::UnsupportedBitLength { .. } => Some("try a machine with a different `bit_length`".into()),
            LoadErr::ProgramTooLarge { .. } => Some("try a machine with a larger `memory_amount`".into()),
        }
    }
}

/// Errors that can occur during execution.
///
/// If a cycle fails with any of these errors, the cycle is rolled back.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SimErr {
    /// An operand of the executing bundle could not be resolved.
    Resolve(ResolveErr),
    /// The program counter points outside of memory.
    ProgramCounterOutOfRange {
        /// The program counter.
        pc: usize,
        /// The number of cells in memory.
        len: usize
    },
    /// The program counter points to a memory cell which holds no instruction.
    NoInstruction {
        /// The program counter.
        pc: usize
    },
    /// An instruction accessed (or jumped to) an address outside of memory.
    MemoryIndexOutOfRange {
        /// The address.
        addr: Value,
        /// The number of cells in memory.
        len: usize
    },
    /// The executing bundle holds an instruction which is not in the instruction set.
    ///
    /// [`Machine::load`] rejects unknown mnemonics and [`InstrSet`] has no way to remove an instruction,
    /// so a machine driven through its public API does not produce this.
    /// Dispatch reports it instead of panicking on a missing descriptor.
    UnknownInstruction(String),
    /// An instruction was dispatched with the wrong number of operands.
    InvalidInstrFormat {
        /// The number of operands the instruction takes.
        expected: usize,
        /// The number of operands provided.
        found: usize
    },
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::Resolve(e) => write!(f, "{e}"),
            SimErr::ProgramCounterOutOfRange { pc, len } => write!(f, "program counter {pc} is outside of memory ({len} cells)"),
            SimErr::NoInstruction { pc } => write!(f, "no instruction at address {pc}"),
            SimErr::MemoryIndexOutOfRange { addr, len } => write!(f, "address {addr} is outside of memory ({len} cells)"),
            SimErr::UnknownInstruction(m) => write!(f, "machine executed unknown instruction {m:?}"),
            SimErr::InvalidInstrFormat { expected, found } => write!(f, "machine executed instruction with {found} operands (expected {expected})"),
        }
    }
}
impl std::error::Error for SimErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimErr::Resolve(e) => Some(e),
            _ => None
        }
    }
}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            SimErr::Resolve(e) => crate::err::Error::help(e),
            SimErr::ProgramCounterOutOfRange { .. } => Some("the program may be missing a `halt`".into()),
            SimErr::NoInstruction { .. } => Some("the program may be missing a `halt`, or jumped outside of the loaded program".into()),
            SimErr::MemoryIndexOutOfRange { len, .. } => Some(format!("addresses must be between 0 and {}", len.saturating_sub(1)).into()),
            SimErr::UnknownInstruction(_) => None,
            SimErr::InvalidInstrFormat { .. } => Some("an instruction may have been redefined after the program was loaded".into()),
        }
    }
}
impl From<ResolveErr> for SimErr {
    fn from(value: ResolveErr) -> Self {
        SimErr::Resolve(value)
    }
}

/// Anything that can cause a step to abruptly fail to finish.
enum StepBreak {
    /// A halt was executed (or the machine was already halted).
    Halt,
    /// An execution error occurred.
    Err(SimErr),
}
impl From<SimErr> for StepBreak {
    fn from(value: SimErr) -> Self {
        Self::Err(value)
    }
}

/// Reason for why execution paused.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StopReason {
    /// A `halt` instruction executed (or the machine was already halted).
    Halted,
    /// The cycle limit was reached.
    CycleLimit,
    /// A breakpoint matched.
    Breakpoint,
    /// The tripwire condition of [`Machine::run_while`] returned false.
    Tripwire,
}

/// The result of a successful run.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RunOutcome {
    /// Why the run stopped.
    pub reason: StopReason,
    /// The number of cycles committed during the run.
    pub cycles: u64,
}

/// Configuration for [`Machine`].
///
/// These are fixed once the `Machine` is created with [`Machine::new`],
/// and are used again by [`Machine::reset`].
///
/// Read the field descriptions for more details.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct MachineConfig {
    /// The width (in bits) of the `r`, `m`, and `i` banks.
    ///
    /// This must be between 1 and 64.
    ///
    /// By default, this is `8`.
    pub bit_length: u32,

    /// The number of cells in memory (`m`).
    ///
    /// This is also the most bundles a program can have.
    ///
    /// By default, this is `256`.
    pub memory_amount: usize,

    /// The number of registers (`r`).
    ///
    /// By default, this is `8`.
    pub register_amount: usize,

    /// The creation strategy for the initial values of `r` and `m`.
    ///
    /// By default, this is [`MachineInitStrategy::default`] (every cell is 0).
    pub machine_init: MachineInitStrategy,
}

#[allow(clippy::derivable_impls)]
impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            bit_length: 8,
            memory_amount: 256,
            register_amount: 8,
            machine_init: Default::default(),
        }
    }
}

/// Executes programs.
pub struct Machine {
    // ------------------ MACHINE STATE ------------------
    // Calling [`Machine::reset`] resets these values.

    /// Every bank of the machine.
    banks: BankRegistry,

    /// The machine's flags.
    flags: Flags,

    /// The state from before the current (or most recent) cycle.
    snapshot: Snapshot,

    /// The bundle loaded at each memory cell (the `instruction` bank).
    instructions: Vec<Option<Arc<Bundle>>>,

    /// Whether a `halt` has executed.
    ///
    /// A halted machine executes nothing until a program is loaded or the machine is reset.
    halted: bool,

    /// The number of cycles committed since this `Machine` was created or reset.
    ///
    /// This can be set to 0 to reset the counter.
    pub cycles_run: u64,

    /// Indicates the reason why the last execution (via [`Machine::run_while`] and adjacent)
    /// had paused.
    pause_condition: Option<StopReason>,

    /// Tracks the accesses of the most recent cycle.
    observer: AccessObserver,

    // ------------------ CONFIG/DEBUG STATE ------------------
    // Calling [`Machine::reset`] does not reset these values.

    /// Configuration settings for the machine.
    config: MachineConfig,

    /// The instruction set.
    isa: InstrSet,

    /// Breakpoints for the machine.
    pub breakpoints: HashSet<Breakpoint>,

    /// Called after every committed cycle.
    presenter: Box<dyn Presenter>,
}
impl Machine where Machine: Send + Sync {}

impl Machine {
    /// Creates a new machine with the provided configuration and the default instruction set.
    ///
    /// This fails if the configured `bit_length` is not a valid width.
    pub fn new(config: MachineConfig) -> Result<Self, BankErr> {
        if !(1..=MAX_WIDTH).contains(&config.bit_length) {
            return Err(BankErr::InvalidWidth { name: "r".to_string(), width: config.bit_length });
        }

        Ok(Self {
            banks: Self::create_banks(&config),
            flags: Flags::new(),
            snapshot: Snapshot::new(),
            instructions: vec![None; config.memory_amount],
            halted: false,
            cycles_run: 0,
            pause_condition: None,
            observer: AccessObserver::new(),

            config,
            isa: InstrSet::default(),
            breakpoints: HashSet::new(),
            presenter: Box::new(NullPresenter),
        })
    }

    fn create_banks(config: &MachineConfig) -> BankRegistry {
        let mut filler = config.machine_init.generator();
        BankRegistry::new(config.bit_length, config.register_amount, config.memory_amount, &mut filler)
    }

    /// Resets the machine.
    ///
    /// This resets the state of the `Machine` back to before any execution calls,
    /// while preserving configuration and debug state.
    ///
    /// Note that this function preserves:
    /// - Configuration
    /// - Banks added with [`Machine::add_bank`] (their cells are zeroed)
    /// - Flags added with [`Machine::add_flag`] (their values are cleared)
    /// - The instruction set
    /// - Breakpoints
    /// - The presenter
    ///
    /// This does not reload programs. Any program has to be reloaded into the Machine.
    pub fn reset(&mut self) {
        let mut banks = Self::create_banks(&self.config);
        for (_, bank) in self.banks.iter().filter(|(id, _)| matches!(id, BankId::User(_))) {
            // names and widths were validated when the bank was first added
            if let Err(e) = banks.add_bank(bank.name(), bank.width(), bank.len()) {
                unreachable!("re-adding bank {:?} failed: {e}", bank.name());
            }
        }

        self.banks = banks;
        self.flags.clear();
        self.snapshot = Snapshot::new();
        self.instructions = vec![None; self.config.memory_amount];
        self.halted = false;
        self.cycles_run = 0;
        self.pause_condition = None;
        self.observer.clear();
        log::debug!("machine reset");
    }

    /// The configuration this machine was created with.
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }
    /// Every bank of the machine.
    pub fn banks(&self) -> &BankRegistry {
        &self.banks
    }
    /// The machine's flags.
    pub fn flags(&self) -> &Flags {
        &self.flags
    }
    /// The accesses of the most recent committed cycle.
    ///
    /// This is empty after a cycle is rolled back.
    pub fn observer(&self) -> &AccessObserver {
        &self.observer
    }
    /// The instruction set.
    pub fn isa(&self) -> &InstrSet {
        &self.isa
    }
    /// The state from before the most recent cycle.
    pub fn last_state(&self) -> &Snapshot {
        &self.snapshot
    }
    /// The bundle loaded at the given address.
    pub fn instruction(&self, addr: usize) -> Option<&Bundle> {
        self.instructions.get(addr)?.as_deref()
    }
    /// Whether a `halt` has executed since the last load or reset.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Adds a new bank of `count` zeroed cells which are `width` bits wide.
    ///
    /// The bank can be referred to by operands of every later cycle.
    pub fn add_bank(&mut self, name: &str, width: u32, count: usize) -> Result<BankId, BankErr> {
        self.banks.add_bank(name, width, count)
    }
    /// Looks up a bank by its name.
    pub fn get_bank(&self, name: &str) -> Result<&Bank, BankErr> {
        self.banks.get_bank(name)
    }
    /// Registers a new flag.
    pub fn add_flag(&mut self, name: &str) -> Result<Flag, BankErr> {
        self.flags.add(name)
    }
    /// Adds an instruction to the instruction set (or replaces the one with the same mnemonic).
    pub fn define_instr(&mut self, desc: InstrDesc) -> Option<InstrDesc> {
        self.isa.define(desc)
    }
    /// Sets the hook called after every committed cycle.
    pub fn set_presenter(&mut self, presenter: impl Presenter + 'static) {
        self.presenter = Box::new(presenter);
    }

    /// Resolves an operand token to a location.
    ///
    /// Literals are appended to the immediate pool, which is cleared at the start of the next cycle.
    pub fn resolve(&mut self, token: &str) -> Result<Loc, ResolveErr> {
        resolve::resolve(&mut self.banks, token)
    }

    fn locate(&self, token: &str) -> Result<Target, ResolveErr> {
        let operand = parse_operand(token)
            .map_err(|e| ResolveErr::UnresolvedOperand { token: token.to_string(), cause: Some(e) })?;
        locate(&self.banks, token, &operand)
    }

    /// Writes a value into the cell an operand token refers to, truncated to the cell's width.
    ///
    /// This returns the location that was written.
    /// Literal tokens do not refer to a cell and cannot be written to.
    pub fn inject(&mut self, target: &str, value: u128) -> Result<Loc, ResolveErr> {
        match self.locate(target)? {
            Target::Cell(loc) => {
                self.banks.write(loc, value);
                Ok(loc)
            },
            Target::Immediate(_) => Err(ResolveErr::UnresolvedOperand { token: target.to_string(), cause: None }),
        }
    }

    /// Reads the live value an operand token refers to.
    ///
    /// A literal token gives its value truncated to the machine's bit length.
    pub fn extract(&self, target: &str) -> Result<Value, ResolveErr> {
        match self.locate(target)? {
            Target::Cell(loc) => Ok(self.banks.read(loc).unwrap_or(0)),
            Target::Immediate(v) => Ok((v & u128::from(bank::mask(self.config.bit_length))) as Value),
        }
    }

    /// Takes a snapshot of the machine, then clears the flags and the immediate pool.
    ///
    /// This is done automatically at the start of every cycle.
    pub fn refresh(&mut self) {
        self.observer.clear();
        self.snapshot.refresh(&mut self.banks, &mut self.flags);
    }

    /// Loads a program into memory, starting at address 0.
    ///
    /// See [`Machine::load_at`].
    pub fn load(&mut self, program: &Program) -> Result<(), LoadErr> {
        self.load_at(0, program)
    }

    /// Loads a program into memory, starting at the given address.
    ///
    /// Every instruction is checked against the instruction set before anything is loaded.
    /// Operands are not resolved until their bundle executes,
    /// so they may refer to banks which are added after the program is loaded.
    ///
    /// This un-halts the machine, but does not move the program counter.
    pub fn load_at(&mut self, origin: usize, program: &Program) -> Result<(), LoadErr> {
        let capacity = self.instructions.len();
        if origin.checked_add(program.len()).map_or(true, |end| end > capacity) {
            return Err(LoadErr::ProgramTooLarge { origin, len: program.len(), capacity });
        }

        for (addr, bundle) in (origin..).zip(program.bundles()) {
            for instr in bundle.instrs() {
                self.validate(addr, &instr.mnemonic, instr.operands.len())?;
            }
        }

        for (slot, bundle) in self.instructions[origin..].iter_mut().zip(program.bundles()) {
            *slot = Some(Arc::new(bundle.clone()));
        }
        self.halted = false;

        log::debug!("loaded {} bundles at address {origin}", program.len());
        Ok(())
    }

    fn validate(&self, addr: usize, mnemonic: &str, found: usize) -> Result<(), LoadErr> {
        let desc = self.isa.get(mnemonic)
            .ok_or_else(|| LoadErr::UnknownInstruction { mnemonic: mnemonic.to_string(), addr })?;

        if desc.arity != found {
            return Err(LoadErr::WrongArity { mnemonic: mnemonic.to_string(), addr, expected: desc.arity, found });
        }
        if !(desc.bit_length_ok)(self.config.bit_length) {
            return Err(LoadErr::UnsupportedBitLength { mnemonic: mnemonic.to_string(), bit_length: self.config.bit_length });
        }
        Ok(())
    }

    /// Indicates whether the last execution of the machine hit a breakpoint.
    pub fn hit_breakpoint(&self) -> bool {
        matches!(self.pause_condition, Some(StopReason::Breakpoint))
    }

    /// Indicates whether the last execution of the machine stopped because of a `halt`.
    pub fn hit_halt(&self) -> bool {
        matches!(self.pause_condition, Some(StopReason::Halted))
    }

    /// Runs until the tripwire condition returns false (or any of the typical breaks occur).
    ///
    /// The typical break conditions are:
    /// - `halt` is executed
    /// - A breakpoint matches
    ///
    /// The tripwire is checked before every cycle and breakpoints are checked after every cycle.
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&mut Machine) -> bool) -> Result<RunOutcome, SimErr> {
        let start = self.cycles_run;
        self.pause_condition = None;

        // event loop
        // run until:
        // 1. the tripwire condition returns false
        // 2. a halt executes
        // 3. any of the breakpoints are hit
        let result = loop {
            if !tripwire(self) {
                break Ok(StopReason::Tripwire);
            }

            match self.step_inner() {
                Ok(()) => {},
                Err(StepBreak::Halt) => break Ok(StopReason::Halted),
                Err(StepBreak::Err(e)) => break Err(e)
            }

            if self.breakpoints.iter().any(|bp| bp.check(self)) {
                break Ok(StopReason::Breakpoint);
            }
        };

        let reason = result?;
        self.pause_condition = Some(reason);
        Ok(RunOutcome { reason, cycles: self.cycles_run.wrapping_sub(start) })
    }

    /// Executes the program.
    ///
    /// This blocks until the machine halts, a breakpoint matches,
    /// or (if a limit is provided) until `cycle_limit` cycles have been committed.
    pub fn run(&mut self, cycle_limit: Option<u64>) -> Result<RunOutcome, SimErr> {
        let Some(limit) = cycle_limit else {
            return self.run_while(|_| true);
        };

        let start = self.cycles_run;
        let mut outcome = self.run_while(|m| m.cycles_run.wrapping_sub(start) < limit)?;
        if outcome.reason == StopReason::Tripwire {
            outcome.reason = StopReason::CycleLimit;
            self.pause_condition = Some(StopReason::CycleLimit);
        }
        Ok(outcome)
    }

    /// Executes one cycle.
    ///
    /// This does nothing if the machine is halted.
    pub fn step(&mut self) -> Result<(), SimErr> {
        match self.step_inner() {
            Ok(()) => Ok(()),
            Err(StepBreak::Halt) => Ok(()),
            Err(StepBreak::Err(e)) => Err(e)
        }
    }

    fn fetch(&self, pc: usize) -> Result<Arc<Bundle>, SimErr> {
        let slot = self.instructions.get(pc)
            .ok_or(SimErr::ProgramCounterOutOfRange { pc, len: self.instructions.len() })?;
        slot.clone().ok_or(SimErr::NoInstruction { pc })
    }

    /// Executes one cycle, returning [`StepBreak::Halt`] if this cycle halted the machine.
    fn step_inner(&mut self) -> Result<(), StepBreak> {
        if self.halted {
            return Err(StepBreak::Halt);
        }

        let pc = self.banks.pc();
        let bundle = self.fetch(pc)?;

        self.refresh();
        let halted = match self.execute(pc, &bundle) {
            Ok(halted) => halted,
            Err(e) => {
                self.snapshot.restore(&mut self.banks, &mut self.flags);
                self.observer.clear();
                log::debug!("rolled back cycle at address {pc}: {e}");
                return Err(e.into());
            }
        };

        self.cycles_run += 1;
        self.halted = halted;
        log::trace!("cycle {} committed: {pc}: {bundle}", self.cycles_run);

        let event = CycleEvent {
            cycle: self.cycles_run,
            pc,
            labels: bundle.labels(),
            reads: self.observer.reads(),
            writes: self.observer.writes(),
        };
        self.presenter.present(&event, &self.banks, &self.flags);

        match halted {
            true  => Err(StepBreak::Halt),
            false => Ok(()),
        }
    }

    /// Resolves and dispatches a bundle on refreshed state, returning whether it halted.
    ///
    /// On error, the live state may be partially written and must be restored from the snapshot.
    fn execute(&mut self, pc: usize, bundle: &Bundle) -> Result<bool, SimErr> {
        let mut resolved = Vec::with_capacity(bundle.instrs().len());
        for instr in bundle.instrs() {
            let desc = *self.isa.get(&instr.mnemonic)
                .ok_or_else(|| SimErr::UnknownInstruction(instr.mnemonic.clone()))?;
            let locs = resolve_all(&mut self.banks, &instr.operands)?;
            resolved.push((desc, locs));
        }
        self.snapshot.freeze_immediates(&self.banks);

        self.banks.set_pc(pc + 1);

        let mut halted = false;
        for (desc, locs) in &resolved {
            let mut ctx = ExecCtx::new(&self.snapshot, &mut self.banks, &mut self.flags, &mut self.observer, desc.kind);
            (desc.semantics)(&mut ctx, locs)?;
            halted |= ctx.halted();
        }
        Ok(halted)
    }
}
impl Default for Machine {
    fn default() -> Self {
        Self::new(Default::default())
            .unwrap_or_else(|_| unreachable!("default configuration should be valid"))
    }
}
impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("banks", &self.banks)
            .field("flags", &self.flags)
            .field("halted", &self.halted)
            .field("cycles_run", &self.cycles_run)
            .field("config", &self.config)
            .field("breakpoints", &self.breakpoints)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Bundle, Instr, Program};

    use super::bank::{BankErr, BankId, Loc};
    use super::flags::Flag;
    use super::resolve::ResolveErr;
    use super::isa::InstrDesc;
    use super::{LoadErr, Machine, MachineConfig, SimErr, StopReason};

    fn instr<const N: usize>(mnemonic: &str, operands: [&str; N]) -> Instr {
        Instr::new(mnemonic, operands)
    }

    fn program<B: Into<Bundle>>(bundles: impl IntoIterator<Item = B>) -> Program {
        Program::from_iter(bundles)
    }

    #[test]
    fn test_config_validation() {
        let config = |bit_length| MachineConfig { bit_length, ..Default::default() };
        assert!(Machine::new(config(1)).is_ok());
        assert!(Machine::new(config(64)).is_ok());
        assert_eq!(Machine::new(config(0)).err(), Some(BankErr::InvalidWidth { name: "r".into(), width: 0 }));
        assert!(Machine::new(config(65)).is_err());
    }

    #[test]
    fn test_add_with_carry() {
        let mut m = Machine::default();
        m.inject("r0", 250).unwrap();
        m.inject("r1", 10).unwrap();
        m.load(&program([instr("add", ["r0", "r1", "r2"])])).unwrap();

        m.step().unwrap();
        assert_eq!(m.extract("r2"), Ok(4));
        assert_eq!(m.flags().get(Flag::CARRY), 1);
        assert_eq!(m.banks().pc(), 1);
        assert_eq!(m.cycles_run, 1);
    }

    #[test]
    fn test_halt_after_two_cycles() {
        let mut m = Machine::default();
        m.load(&program([instr("nop", []), instr("halt", [])])).unwrap();

        let outcome = m.run(None).unwrap();
        assert_eq!(outcome.reason, StopReason::Halted);
        assert_eq!(outcome.cycles, 2);
        assert!(m.hit_halt());
        assert!(m.is_halted());
        // halt leaves the pc on the halt
        assert_eq!(m.banks().pc(), 1);

        // a halted machine stays halted
        let outcome = m.run(Some(5)).unwrap();
        assert_eq!(outcome.reason, StopReason::Halted);
        assert_eq!(outcome.cycles, 0);
        m.step().unwrap();
        assert_eq!(m.cycles_run, 2);
    }

    #[test]
    fn test_inject_extract() {
        let mut m = Machine::default();
        assert_eq!(m.inject("r0", 300), Ok(Loc::new(BankId::Reg, 0)));
        assert_eq!(m.extract("r0"), Ok(44));
        assert_eq!(m.extract("r[0]"), Ok(44));
        assert_eq!(m.extract("0x1FF"), Ok(0xFF));
        assert!(matches!(m.inject("5", 1), Err(ResolveErr::UnresolvedOperand { .. })));
        assert!(matches!(m.extract("r8"), Err(ResolveErr::OperandIndex { .. })));
    }

    #[test]
    fn test_bundle_isolation() {
        let mut m = Machine::default();
        m.inject("r0", 5).unwrap();
        m.load(&program([
            Bundle::new([instr("mov", ["7", "r0"]), instr("mov", ["r0", "r1"])]),
            Bundle::new([instr("mov", ["r0", "r2"]), instr("mov", ["9", "r0"])]),
        ])).unwrap();

        m.step().unwrap();
        // reads see the value from before the cycle, regardless of order
        assert_eq!(m.extract("r0"), Ok(7));
        assert_eq!(m.extract("r1"), Ok(5));

        m.step().unwrap();
        assert_eq!(m.extract("r2"), Ok(7));
        assert_eq!(m.extract("r0"), Ok(9));
        // pc advanced once per bundle
        assert_eq!(m.banks().pc(), 2);
    }

    #[test]
    fn test_last_write_wins() {
        let mut m = Machine::default();
        m.load(&program([
            Bundle::new([instr("mov", ["1", "r0"]), instr("mov", ["2", "r0"])]),
            Bundle::new([instr("jmp", ["5"]), instr("jmp", ["7"])]),
        ])).unwrap();

        m.step().unwrap();
        assert_eq!(m.extract("r0"), Ok(2));
        m.step().unwrap();
        assert_eq!(m.banks().pc(), 7);
    }

    #[test]
    fn test_resolution_failure_is_atomic() {
        let mut m = Machine::default();
        m.inject("r0", 3).unwrap();
        m.load(&program([
            Bundle::new([instr("add", ["r0", "1", "r0"]), instr("mov", ["r0", "r99"])]),
        ])).unwrap();

        let err = m.step().unwrap_err();
        assert!(matches!(err, SimErr::Resolve(ResolveErr::OperandIndex { index: 99, .. })));
        assert_eq!(m.extract("r0"), Ok(3));
        assert_eq!(m.banks().pc(), 0);
        assert_eq!(m.cycles_run, 0);
        assert!(m.banks()[BankId::Imm].is_empty());
    }

    #[test]
    fn test_runtime_failure_is_atomic() {
        let mut m = Machine::new(MachineConfig { memory_amount: 16, ..Default::default() }).unwrap();
        m.inject("r0", 200).unwrap();
        m.load(&program([
            Bundle::new([instr("add", ["r0", "r0", "r1"]), instr("load", ["r0", "r2"])]),
        ])).unwrap();

        assert_eq!(m.step(), Err(SimErr::MemoryIndexOutOfRange { addr: 200, len: 16 }));
        assert_eq!(m.extract("r1"), Ok(0));
        assert_eq!(m.flags().get(Flag::CARRY), 0);
        assert_eq!(m.banks().pc(), 0);
    }

    #[test]
    fn test_rollback_clears_observer() {
        let mut m = Machine::new(MachineConfig { memory_amount: 16, ..Default::default() }).unwrap();
        m.inject("r0", 200).unwrap();
        m.load(&program([
            Bundle::new([instr("mov", ["r0", "r1"]), instr("load", ["r0", "r2"])]),
        ])).unwrap();

        assert!(m.step().is_err());
        assert_eq!(m.extract("r1"), Ok(0));
        assert!(m.observer().writes().is_empty());
        assert!(m.observer().reads().is_empty());
    }

    #[test]
    fn test_redefined_instruction_format() {
        let mut m = Machine::default();
        m.load(&program([instr("mov", ["r0", "r1"])])).unwrap();

        // mov now takes three operands, but the loaded bundle still has two
        let add = *m.isa().get("add").unwrap();
        m.define_instr(InstrDesc { name: "mov", ..add });
        m.inject("r0", 7).unwrap();

        assert_eq!(m.step(), Err(SimErr::InvalidInstrFormat { expected: 3, found: 2 }));
        assert_eq!(m.extract("r1"), Ok(0));
        assert_eq!(m.banks().pc(), 0);
    }

    #[test]
    fn test_rollback_keeps_previous_flags() {
        let mut m = Machine::default();
        m.inject("r0", 255).unwrap();
        m.load(&program([
            instr("add", ["r0", "1", "r1"]),
            instr("mov", ["nope", "r1"]),
        ])).unwrap();

        m.step().unwrap();
        assert_eq!(m.flags().get(Flag::CARRY), 1);
        assert!(m.step().is_err());
        assert_eq!(m.flags().get(Flag::CARRY), 1);
        assert_eq!(m.banks().pc(), 1);
    }

    #[test]
    fn test_pc_out_of_range() {
        let mut m = Machine::new(MachineConfig { memory_amount: 2, ..Default::default() }).unwrap();
        m.load(&program([instr("nop", []), instr("nop", [])])).unwrap();

        assert_eq!(m.run(None), Err(SimErr::ProgramCounterOutOfRange { pc: 2, len: 2 }));
        assert_eq!(m.cycles_run, 2);
        assert!(!m.hit_halt());
    }

    #[test]
    fn test_no_instruction() {
        let mut m = Machine::default();
        m.load(&program([instr("nop", [])])).unwrap();
        assert_eq!(m.run(None), Err(SimErr::NoInstruction { pc: 1 }));
    }

    #[test]
    fn test_load_errors() {
        let mut m = Machine::new(MachineConfig { memory_amount: 4, ..Default::default() }).unwrap();

        assert_eq!(
            m.load(&program([instr("nop", []), instr("frob", ["r0"])])),
            Err(LoadErr::UnknownInstruction { mnemonic: "frob".into(), addr: 1 })
        );
        assert_eq!(
            m.load(&program([instr("add", ["r0", "r1"])])),
            Err(LoadErr::WrongArity { mnemonic: "add".into(), addr: 0, expected: 3, found: 2 })
        );
        assert_eq!(
            m.load(&program([instr("bswap", ["r0", "r1"])])),
            Err(LoadErr::UnsupportedBitLength { mnemonic: "bswap".into(), bit_length: 8 })
        );
        assert_eq!(
            m.load_at(2, &program(vec![instr("nop", []); 3])),
            Err(LoadErr::ProgramTooLarge { origin: 2, len: 3, capacity: 4 })
        );
        // nothing was loaded by the failed calls
        assert!((0..4).all(|addr| m.instruction(addr).is_none()));

        m.load_at(2, &program([instr("NOP", []), instr("Halt", [])])).unwrap();
        assert!(m.instruction(2).is_some());
    }

    #[test]
    fn test_user_banks_and_flags() {
        let mut m = Machine::default();
        m.load(&program([instr("add", ["acc", "acc1", "acc2"])])).unwrap();
        // acc does not exist yet
        assert!(matches!(m.step(), Err(SimErr::Resolve(ResolveErr::UnresolvedOperand { .. }))));

        let acc = m.add_bank("acc", 4, 3).unwrap();
        m.inject("acc", 9).unwrap();
        m.inject("acc[1]", 9).unwrap();
        m.step().unwrap();
        assert_eq!(m.banks().read(Loc::new(acc, 2)), Some(2));
        assert_eq!(m.flags().get(Flag::CARRY), 1);

        let zero = m.add_flag("zero").unwrap();
        assert_eq!(m.flags().get(zero), 0);
        assert_eq!(m.add_flag("zero"), Err(BankErr::DuplicateName("zero".into())));
        assert_eq!(m.get_bank("acc").map(|b| b.width()), Ok(4));
    }

    #[test]
    fn test_immediates_cleared_on_refresh() {
        let mut m = Machine::default();
        m.load(&program([instr("add", ["0x1F", "1", "r0"])])).unwrap();
        m.step().unwrap();
        assert_eq!(m.banks()[BankId::Imm].as_slice(), &[31, 1]);
        assert_eq!(m.last_state().read(Loc::new(BankId::Imm, 0)), Some(31));

        m.refresh();
        assert!(m.banks()[BankId::Imm].is_empty());
    }

    #[test]
    fn test_reset() {
        let mut m = Machine::default();
        let acc = m.add_bank("acc", 4, 2).unwrap();
        m.inject("acc1", 3).unwrap();
        m.inject("r0", 3).unwrap();
        m.load(&program([instr("halt", [])])).unwrap();
        m.run(None).unwrap();

        m.reset();
        assert_eq!(m.cycles_run, 0);
        assert!(!m.is_halted());
        assert_eq!(m.extract("r0"), Ok(0));
        assert_eq!(m.banks().id_of("acc"), Some(acc));
        assert_eq!(m.extract("acc1"), Ok(0));
        assert!(m.instruction(0).is_none());
    }

    #[test]
    fn test_observer() {
        let mut m = Machine::default();
        m.load(&program([instr("mov", ["r0", "r1"])])).unwrap();
        m.step().unwrap();

        assert_eq!(m.observer().reads(), vec![Loc::new(BankId::Reg, 0)]);
        assert_eq!(m.observer().writes(), vec![Loc::new(BankId::Reg, 1)]);
    }
}
