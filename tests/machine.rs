//! End-to-end tests running small teaching programs on the machine.

use std::thread;

use bitbench::ast::{Bundle, Instr, Program};
use bitbench::err::Error;
use bitbench::sim::bank::{BankId, Loc, MachineInitStrategy};
use bitbench::sim::debug::{Breakpoint, Comparator};
use bitbench::sim::flags::Flag;
use bitbench::sim::isa::{ExecCtx, InstrDesc, InstrKind};
use bitbench::sim::present::ChannelPresenter;
use bitbench::sim::{LoadErr, Machine, MachineConfig, SimErr, StopReason};

fn i<const N: usize>(mnemonic: &str, operands: [&str; N]) -> Instr {
    Instr::new(mnemonic, operands)
}

/// Sums 5 + 4 + 3 + 2 + 1 into r1.
fn countdown() -> Program {
    Program::from_iter([
        i("mov", ["5", "r0"]),
        i("add", ["r1", "r0", "r1"]),
        i("sub", ["r0", "1", "r0"]),
        i("jnz", ["r0", "1"]),
        i("halt", []),
    ])
}

#[test]
fn test_countdown_loop() {
    let mut m = Machine::default();
    m.load(&countdown()).unwrap();

    let outcome = m.run(None).unwrap();
    assert_eq!(outcome.reason, StopReason::Halted);
    assert_eq!(outcome.cycles, 1 + 5 * 3 + 1);
    assert_eq!(m.extract("r1"), Ok(15));
    assert_eq!(m.extract("r0"), Ok(0));
}

#[test]
fn test_cycle_limit() {
    let mut m = Machine::default();
    m.load(&countdown()).unwrap();

    let outcome = m.run(Some(4)).unwrap();
    assert_eq!(outcome.reason, StopReason::CycleLimit);
    assert_eq!(outcome.cycles, 4);
    assert!(!m.hit_halt());

    // continue where it stopped
    let outcome = m.run(Some(100)).unwrap();
    assert_eq!(outcome.reason, StopReason::Halted);
    assert_eq!(outcome.cycles, 13);
    assert_eq!(m.cycles_run, 17);
}

#[test]
fn test_two_word_addition() {
    // (r0:r1) + (r2:r3) -> (r4:r5), low words first
    let mut m = Machine::default();
    for (reg, value) in [("r0", 0x12), ("r1", 0xFF), ("r2", 0x01), ("r3", 0x01)] {
        m.inject(reg, value).unwrap();
    }
    m.load(&Program::from_iter([
        i("add", ["r1", "r3", "r5"]),
        i("adc", ["r0", "r2", "r4"]),
        i("halt", []),
    ])).unwrap();
    m.run(None).unwrap();

    assert_eq!(m.extract("r4"), Ok(0x14));
    assert_eq!(m.extract("r5"), Ok(0x00));
}

#[test]
fn test_memory_round_trip() {
    let mut m = Machine::default();
    m.inject("r0", 0xAB).unwrap();
    m.load(&Program::from_iter([
        i("store", ["r0", "200"]),
        i("load", ["200", "r1"]),
        i("halt", []),
    ])).unwrap();
    m.run(None).unwrap();

    assert_eq!(m.extract("m200"), Ok(0xAB));
    assert_eq!(m.extract("r1"), Ok(0xAB));
}

#[test]
fn test_wide_machine() {
    let mut m = Machine::new(MachineConfig { bit_length: 64, ..Default::default() }).unwrap();
    m.inject("r0", u64::MAX.into()).unwrap();
    m.load(&Program::from_iter([
        Bundle::new([i("add", ["r0", "1", "r1"]), i("bswap", ["0x0102030405060708", "r2"])]),
        Bundle::from(i("halt", [])),
    ])).unwrap();

    m.step().unwrap();
    assert_eq!(m.extract("r1"), Ok(0));
    assert_eq!(m.flags().get(Flag::CARRY), 1);
    assert_eq!(m.extract("r2"), Ok(0x0807060504030201));
}

#[test]
fn test_breakpoints() {
    let mut m = Machine::default();
    m.load(&countdown()).unwrap();
    m.breakpoints.insert(Breakpoint::Cell {
        loc: Loc::new(BankId::Reg, 0),
        value: Comparator::Eq(2),
    });

    let outcome = m.run(None).unwrap();
    assert_eq!(outcome.reason, StopReason::Breakpoint);
    assert!(m.hit_breakpoint());
    assert_eq!(m.extract("r0"), Ok(2));
    assert_eq!(m.extract("r1"), Ok(5 + 4 + 3));

    m.breakpoints.clear();
    m.breakpoints.insert(Breakpoint::Pc(4));
    let outcome = m.run(None).unwrap();
    assert_eq!(outcome.reason, StopReason::Breakpoint);
    assert_eq!(m.banks().pc(), 4);

    m.breakpoints.clear();
    assert_eq!(m.run(None).map(|o| o.reason), Ok(StopReason::Halted));
    assert_eq!(m.extract("r1"), Ok(15));
}

#[test]
fn test_flag_breakpoint() {
    let mut m = Machine::default();
    m.inject("r0", 200).unwrap();
    m.load(&Program::from_iter([
        i("add", ["r0", "r0", "r1"]),
        i("add", ["r1", "r0", "r1"]),
        i("halt", []),
    ])).unwrap();
    m.breakpoints.insert(Breakpoint::Flag { flag: Flag::CARRY, value: Comparator::Ne(0) });

    let outcome = m.run(None).unwrap();
    assert_eq!(outcome.reason, StopReason::Breakpoint);
    assert_eq!(outcome.cycles, 1);
}

#[test]
fn test_flag_breakpoint_from_other_machine() {
    let mut other = Machine::default();
    let zero = other.add_flag("zero").unwrap();

    let mut m = Machine::default();
    m.load(&countdown()).unwrap();
    m.breakpoints.insert(Breakpoint::Flag { flag: zero, value: Comparator::Ne(0) });

    // the flag does not exist here, so it reads as 0 and never matches
    let outcome = m.run(None).unwrap();
    assert_eq!(outcome.reason, StopReason::Halted);
    assert_eq!(m.extract("r1"), Ok(15));
}

#[test]
fn test_presenter_thread() {
    let (presenter, rx) = ChannelPresenter::bounded(1);
    let renderer = thread::spawn(move || {
        rx.iter()
            .map(|report| report.to_string())
            .collect::<Vec<_>>()
    });

    let mut m = Machine::default();
    m.set_presenter(presenter);
    m.load(&countdown()).unwrap();
    m.run(None).unwrap();
    // dropping the machine closes the channel
    drop(m);

    let frames = renderer.join().unwrap();
    assert_eq!(frames.len(), 17);
    assert_eq!(frames[0], "cycle 1 @ 0: mov -> r[0]=5");
    assert_eq!(frames[16], "cycle 17 @ 4: halt");
}

#[test]
fn test_custom_instruction() {
    fn inc(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
        for &loc in ops {
            let v = ctx.read(loc);
            ctx.write(loc, u128::from(v) + 1);
        }
        Ok(())
    }

    let mut m = Machine::default();
    assert_eq!(
        m.load(&Program::from_iter([i("inc", ["r0"])])),
        Err(LoadErr::UnknownInstruction { mnemonic: "inc".into(), addr: 0 })
    );

    m.define_instr(InstrDesc::new("inc", 1, InstrKind::Arithmetic, inc));
    m.inject("r0", 255).unwrap();
    m.load(&Program::from_iter([i("inc", ["r0"]), i("halt", [])])).unwrap();
    m.step().unwrap();
    assert_eq!(m.extract("r0"), Ok(0));
    assert_eq!(m.flags().get(Flag::CARRY), 1);
}

#[test]
fn test_seeded_init() {
    let config = MachineConfig { machine_init: MachineInitStrategy::Seeded { seed: 2110 }, ..Default::default() };
    let a = Machine::new(config).unwrap();
    let mut b = Machine::new(config).unwrap();
    assert_eq!(a.banks()[BankId::Reg], b.banks()[BankId::Reg]);
    assert_eq!(a.banks()[BankId::Mem], b.banks()[BankId::Mem]);

    b.reset();
    assert_eq!(a.banks()[BankId::Mem], b.banks()[BankId::Mem]);
}

#[test]
fn test_error_messages() {
    let mut m = Machine::default();
    m.load(&Program::from_iter([i("mov", ["r0", "r[12]"])])).unwrap();

    let err = m.step().unwrap_err();
    assert_eq!(err.to_string(), "operand \"r[12]\" indexes r[12], but r has 8 cells");
    assert_eq!(err.help().as_deref(), Some("indices for this bank must be between 0 and 7"));

    let err = m.load_at(253, &countdown()).unwrap_err();
    assert!(err.help().is_some());
}
