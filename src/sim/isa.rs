//! The instruction set of the machine.
//!
//! Every instruction is described by an [`InstrDesc`], which holds its mnemonic, its operand count,
//! its [`InstrKind`], a predicate over the machine's bit length, and its semantic function.
//! An [`InstrSet`] maps mnemonics to these descriptors.
//! The default set ([`InstrSet::default`]) is listed below.
//! Operands are written sources first and destination last.
//!
//! | Mnemonic | Operands    | Kind       | Effect |
//! |----------|-------------|------------|--------|
//! | `nop`    |             | Data       | nothing |
//! | `halt`   |             | Halt       | stops the machine |
//! | `mov`    | `a d`       | Data       | `d = a` |
//! | `add`    | `a b d`     | Arithmetic | `d = a + b` |
//! | `adc`    | `a b d`     | Arithmetic | `d = a + b + carry` |
//! | `sub`    | `a b d`     | Arithmetic | `d = a - b` (carry on borrow) |
//! | `mul`    | `a b d`     | Arithmetic | `d = a * b` |
//! | `shl`    | `a n d`     | Arithmetic | `d = a << n` |
//! | `shr`    | `a n d`     | Data       | `d = a >> n` |
//! | `rol`    | `a n d`     | Data       | `d = a` rotated left by `n` within the width of `d` |
//! | `ror`    | `a n d`     | Data       | `d = a` rotated right by `n` within the width of `d` |
//! | `and`    | `a b d`     | Data       | `d = a & b` |
//! | `or`     | `a b d`     | Data       | `d = a \| b` |
//! | `xor`    | `a b d`     | Data       | `d = a ^ b` |
//! | `not`    | `a d`       | Data       | `d = !a` |
//! | `popcnt` | `a d`       | Data       | `d` = number of set bits of `a` |
//! | `bswap`  | `a d`       | Data       | `d` = `a` with its bytes reversed |
//! | `eq`     | `a b d`     | Data       | `d = (a == b)` |
//! | `lt`     | `a b d`     | Data       | `d = (a < b)` |
//! | `load`   | `addr d`    | Data       | `d = m[addr]` |
//! | `store`  | `v addr`    | Data       | `m[addr] = v` |
//! | `jmp`    | `t`         | Control    | `pc = t` |
//! | `jz`     | `a t`       | Control    | `pc = t` if `a == 0` |
//! | `jnz`    | `a t`       | Control    | `pc = t` if `a != 0` |
//! | `jc`     | `t`         | Control    | `pc = t` if `carry` is set |
//!
//! Semantic functions read through an [`ExecCtx`], which only exposes the pre-cycle snapshot for reads
//! and the live banks for writes.
use std::collections::HashMap;

use super::bank::{BankId, BankRegistry, Loc, Value};
use super::flags::{Flag, Flags};
use super::observer::{AccessObserver, AccessSet};
use super::snapshot::Snapshot;
use super::SimErr;

/// The semantic function of an instruction.
///
/// This is called with the resolved operands of the instruction (in declaration order).
pub type Semantics = fn(&mut ExecCtx<'_>, &[Loc]) -> Result<(), SimErr>;

/// The category of an instruction.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum InstrKind {
    /// Moves or transforms data. Writes are truncated, but never set `carry`.
    Data,
    /// Computes arithmetic. A write whose value does not fit its destination sets `carry`.
    Arithmetic,
    /// May overwrite the program counter.
    Control,
    /// Stops the machine.
    Halt,
}

/// The description of an instruction.
#[derive(Clone, Copy)]
pub struct InstrDesc {
    /// The mnemonic.
    pub name: &'static str,
    /// The number of operands.
    pub arity: usize,
    /// The kind of instruction.
    pub kind: InstrKind,
    /// Whether the instruction can run on a machine with the given bit length.
    pub bit_length_ok: fn(u32) -> bool,
    /// The semantic function.
    pub semantics: Semantics,
}
impl InstrDesc {
    /// Creates a new description of an instruction which supports every bit length.
    pub fn new(name: &'static str, arity: usize, kind: InstrKind, semantics: Semantics) -> Self {
        Self { name, arity, kind, bit_length_ok: |_| true, semantics }
    }

    /// Restricts the bit lengths this instruction supports.
    pub fn with_bit_length(self, bit_length_ok: fn(u32) -> bool) -> Self {
        Self { bit_length_ok, ..self }
    }
}

impl std::fmt::Debug for InstrDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrDesc")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A table of instructions, keyed by (case-insensitive) mnemonic.
#[derive(Debug, Clone)]
pub struct InstrSet {
    table: HashMap<Box<str>, InstrDesc>
}
impl InstrSet {
    /// Creates an instruction set with no instructions.
    pub fn empty() -> Self {
        Self { table: HashMap::new() }
    }

    /// Adds an instruction to the set,
    /// returning the description it replaced (if one had the same mnemonic).
    pub fn define(&mut self, desc: InstrDesc) -> Option<InstrDesc> {
        self.table.insert(desc.name.to_ascii_lowercase().into(), desc)
    }

    /// Looks up an instruction by mnemonic.
    pub fn get(&self, mnemonic: &str) -> Option<&InstrDesc> {
        self.table.get(&*mnemonic.to_ascii_lowercase())
    }

    /// Iterates over every instruction (in no particular order).
    pub fn iter(&self) -> impl Iterator<Item = &InstrDesc> {
        self.table.values()
    }

    /// The number of instructions.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether there are no instructions.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
impl Default for InstrSet {
    fn default() -> Self {
        use InstrKind::{Arithmetic, Control, Data, Halt};

        let descs = [
            InstrDesc::new("nop", 0, Data, nop),
            InstrDesc::new("halt", 0, Halt, halt),
            InstrDesc::new("mov", 2, Data, mov),
            InstrDesc::new("add", 3, Arithmetic, add),
            InstrDesc::new("adc", 3, Arithmetic, adc),
            InstrDesc::new("sub", 3, Arithmetic, sub),
            InstrDesc::new("mul", 3, Arithmetic, mul),
            InstrDesc::new("shl", 3, Arithmetic, shl),
            InstrDesc::new("shr", 3, Data, shr),
            InstrDesc::new("rol", 3, Data, rol),
            InstrDesc::new("ror", 3, Data, ror),
            InstrDesc::new("and", 3, Data, and),
            InstrDesc::new("or", 3, Data, or),
            InstrDesc::new("xor", 3, Data, xor),
            InstrDesc::new("not", 2, Data, not),
            InstrDesc::new("popcnt", 2, Data, popcnt),
            InstrDesc::new("bswap", 2, Data, bswap)
                .with_bit_length(|w| w % 8 == 0 && w >= 16),
            InstrDesc::new("eq", 3, Data, eq),
            InstrDesc::new("lt", 3, Data, lt),
            InstrDesc::new("load", 2, Data, load),
            InstrDesc::new("store", 2, Data, store),
            InstrDesc::new("jmp", 1, Control, jmp),
            InstrDesc::new("jz", 2, Control, jz),
            InstrDesc::new("jnz", 2, Control, jnz),
            InstrDesc::new("jc", 1, Control, jc),
        ];

        let mut set = Self::empty();
        for desc in descs {
            set.define(desc);
        }
        set
    }
}

/// The view of the machine given to a semantic function.
///
/// Reads come from the pre-cycle [`Snapshot`], writes go to the live banks.
/// Every access is recorded in the machine's [`AccessObserver`].
pub struct ExecCtx<'a> {
    snapshot: &'a Snapshot,
    banks: &'a mut BankRegistry,
    flags: &'a mut Flags,
    observer: &'a mut AccessObserver,
    kind: InstrKind,
    halted: bool
}
impl<'a> ExecCtx<'a> {
    pub(crate) fn new(
        snapshot: &'a Snapshot,
        banks: &'a mut BankRegistry,
        flags: &'a mut Flags,
        observer: &'a mut AccessObserver,
        kind: InstrKind
    ) -> Self {
        Self { snapshot, banks, flags, observer, kind, halted: false }
    }

    /// Reads the pre-cycle value at a location.
    pub fn read(&mut self, loc: Loc) -> Value {
        self.observer.update_accesses(loc, AccessSet::READ);
        // operands are validated against the banks before dispatch
        self.snapshot.read(loc).unwrap_or(0)
    }

    /// The width of the bank a location is in.
    pub fn width(&self, loc: Loc) -> u32 {
        self.banks[loc.bank].width()
    }

    /// Writes an (untruncated) value to a location.
    ///
    /// The value is truncated to the width of the location's bank.
    /// If this instruction is [`InstrKind::Arithmetic`] and the value does not fit, `carry` is set.
    pub fn write(&mut self, loc: Loc, value: u128) {
        let mask = u128::from(self.banks[loc.bank].mask());
        if self.kind == InstrKind::Arithmetic && value > mask {
            self.flags.set(Flag::CARRY, 1);
        }

        if self.observer.get_accesses(loc).written() {
            log::warn!("{} was written more than once in one cycle (last write wins)", self.banks.describe(loc));
        }

        let old = self.banks.read(loc);
        let new = self.banks.write(loc, value);
        let mut set = AccessSet::WRITTEN;
        if old != new {
            set |= AccessSet::MODIFIED;
        }
        self.observer.update_accesses(loc, set);
    }

    /// Reads the pre-cycle value of a flag.
    pub fn flag(&self, flag: Flag) -> Value {
        self.snapshot.flag(flag)
    }

    /// Sets the value of a flag.
    pub fn set_flag(&mut self, flag: Flag, value: Value) {
        self.flags.set(flag, value);
    }

    /// The pre-cycle program counter (the address of the executing bundle).
    pub fn pc(&self) -> usize {
        self.snapshot.pc()
    }

    /// Transfers control to the given address.
    pub fn jump(&mut self, target: Value) -> Result<(), SimErr> {
        let loc = self.mem_loc(target)?;
        self.write(Loc::PC, loc.index as u128);
        Ok(())
    }

    /// Stops the machine once this cycle commits. The program counter stays on the executing bundle.
    pub fn halt(&mut self) {
        self.banks.set_pc(self.snapshot.pc());
        self.halted = true;
    }

    /// Reads the pre-cycle value of the memory cell at an address.
    pub fn read_mem(&mut self, addr: Value) -> Result<Value, SimErr> {
        let loc = self.mem_loc(addr)?;
        Ok(self.read(loc))
    }

    /// Writes a value to the memory cell at an address.
    pub fn write_mem(&mut self, addr: Value, value: u128) -> Result<(), SimErr> {
        let loc = self.mem_loc(addr)?;
        self.write(loc, value);
        Ok(())
    }

    pub(crate) fn halted(&self) -> bool {
        self.halted
    }

    fn mem_loc(&self, addr: Value) -> Result<Loc, SimErr> {
        let len = self.banks[BankId::Mem].len();
        match usize::try_from(addr) {
            Ok(index) if index < len => Ok(Loc::new(BankId::Mem, index)),
            _ => Err(SimErr::MemoryIndexOutOfRange { addr, len }),
        }
    }
}

fn operands<const N: usize>(ops: &[Loc]) -> Result<[Loc; N], SimErr> {
    <[Loc; N]>::try_from(ops)
        .map_err(|_| SimErr::InvalidInstrFormat { expected: N, found: ops.len() })
}

fn unary(ctx: &mut ExecCtx, ops: &[Loc], f: impl FnOnce(u128, u32) -> u128) -> Result<(), SimErr> {
    let [a, d] = operands(ops)?;
    let a = ctx.read(a);
    let width = ctx.width(d);
    ctx.write(d, f(a.into(), width));
    Ok(())
}
fn binary(ctx: &mut ExecCtx, ops: &[Loc], f: impl FnOnce(u128, u128, u32) -> u128) -> Result<(), SimErr> {
    let [a, b, d] = operands(ops)?;
    let (a, b) = (ctx.read(a), ctx.read(b));
    let width = ctx.width(d);
    ctx.write(d, f(a.into(), b.into(), width));
    Ok(())
}

fn nop(_: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    operands::<0>(ops).map(|_| ())
}
fn halt(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    operands::<0>(ops)?;
    ctx.halt();
    Ok(())
}
fn mov(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    unary(ctx, ops, |a, _| a)
}

fn add(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    binary(ctx, ops, |a, b, _| a + b)
}
fn adc(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    let carry = u128::from(ctx.flag(Flag::CARRY) != 0);
    binary(ctx, ops, |a, b, _| a + b + carry)
}
fn sub(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    // a borrow wraps around to a value above any mask, which sets carry
    binary(ctx, ops, |a, b, _| a.wrapping_sub(b))
}
fn mul(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    binary(ctx, ops, |a, b, _| a * b)
}
fn shl(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    binary(ctx, ops, |a, n, w| match n < u128::from(w) {
        true  => a << n,
        // every bit leaves the width
        false => u128::from(a != 0) << w,
    })
}
fn shr(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    binary(ctx, ops, |a, n, _| {
        u32::try_from(n).ok()
            .and_then(|n| a.checked_shr(n))
            .unwrap_or(0)
    })
}
fn rol(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    binary(ctx, ops, |a, n, w| {
        let a = a & u128::from(super::bank::mask(w));
        let r = (n % u128::from(w)) as u32;
        (a << r) | (a >> (w - r))
    })
}
fn ror(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    binary(ctx, ops, |a, n, w| {
        let a = a & u128::from(super::bank::mask(w));
        let r = (n % u128::from(w)) as u32;
        (a >> r) | (a << (w - r))
    })
}
fn and(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    binary(ctx, ops, |a, b, _| a & b)
}
fn or(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    binary(ctx, ops, |a, b, _| a | b)
}
fn xor(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    binary(ctx, ops, |a, b, _| a ^ b)
}
fn not(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    unary(ctx, ops, |a, _| !a)
}
fn popcnt(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    unary(ctx, ops, |a, _| a.count_ones().into())
}
fn bswap(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    unary(ctx, ops, |a, w| {
        // round up to whole bytes
        let w = (w + 7) / 8 * 8;
        let a = a & u128::from(super::bank::mask(w));
        a.swap_bytes() >> (u128::BITS - w)
    })
}
fn eq(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    binary(ctx, ops, |a, b, _| u128::from(a == b))
}
fn lt(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    binary(ctx, ops, |a, b, _| u128::from(a < b))
}

fn load(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    let [addr, d] = operands(ops)?;
    let addr = ctx.read(addr);
    let value = ctx.read_mem(addr)?;
    ctx.write(d, value.into());
    Ok(())
}
fn store(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    let [v, addr] = operands(ops)?;
    let (v, addr) = (ctx.read(v), ctx.read(addr));
    ctx.write_mem(addr, v.into())
}

fn jmp(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    let [t] = operands(ops)?;
    let t = ctx.read(t);
    ctx.jump(t)
}
fn jz(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    let [a, t] = operands(ops)?;
    let (a, t) = (ctx.read(a), ctx.read(t));
    match a == 0 {
        true  => ctx.jump(t),
        false => Ok(()),
    }
}
fn jnz(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    let [a, t] = operands(ops)?;
    let (a, t) = (ctx.read(a), ctx.read(t));
    match a != 0 {
        true  => ctx.jump(t),
        false => Ok(()),
    }
}
fn jc(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
    let [t] = operands(ops)?;
    let t = ctx.read(t);
    match ctx.flag(Flag::CARRY) != 0 {
        true  => ctx.jump(t),
        false => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use crate::sim::bank::{BankId, BankRegistry, Loc, Value};
    use crate::sim::flags::{Flag, Flags};
    use crate::sim::observer::AccessObserver;
    use crate::sim::resolve::resolve_all;
    use crate::sim::snapshot::Snapshot;
    use crate::sim::SimErr;

    use super::{ExecCtx, InstrDesc, InstrKind, InstrSet};

    struct Bench {
        banks: BankRegistry,
        flags: Flags,
        observer: AccessObserver,
    }
    impl Bench {
        fn new() -> Self {
            Self {
                banks: BankRegistry::new(8, 4, 16, &mut 0u64),
                flags: Flags::new(),
                observer: AccessObserver::new(),
            }
        }

        fn set(&mut self, loc: Loc, value: u128) {
            self.banks.write(loc, value);
        }
        fn reg(&self, index: usize) -> Value {
            self.banks.read(r(index)).unwrap()
        }
        fn carry(&self) -> Value {
            self.flags.get(Flag::CARRY)
        }

        /// Runs one instruction as its own cycle (without advancing pc).
        fn exec(&mut self, mnemonic: &str, ops: &[&str]) -> Result<(), SimErr> {
            let set = InstrSet::default();
            let desc = set.get(mnemonic).unwrap();
            assert_eq!(desc.arity, ops.len());

            let mut snap = Snapshot::new();
            snap.refresh(&mut self.banks, &mut self.flags);
            self.observer.clear();
            let locs = resolve_all(&mut self.banks, ops).unwrap();
            snap.freeze_immediates(&self.banks);

            let mut ctx = ExecCtx::new(&snap, &mut self.banks, &mut self.flags, &mut self.observer, desc.kind);
            (desc.semantics)(&mut ctx, &locs)
        }
    }

    fn r(index: usize) -> Loc {
        Loc::new(BankId::Reg, index)
    }

    #[test]
    fn test_add_carry() {
        let mut b = Bench::new();
        b.set(r(0), 250);
        b.set(r(1), 10);
        b.exec("add", &["r0", "r1", "r2"]).unwrap();
        assert_eq!(b.reg(2), 4);
        assert_eq!(b.carry(), 1);

        b.exec("add", &["r0", "1", "r2"]).unwrap();
        assert_eq!(b.reg(2), 251);
        assert_eq!(b.carry(), 0);
    }

    #[test]
    fn test_adc_uses_previous_carry() {
        let mut b = Bench::new();
        b.set(r(0), 1);
        b.flags.set(Flag::CARRY, 1);
        b.exec("adc", &["r0", "r0", "r1"]).unwrap();
        assert_eq!(b.reg(1), 3);
        assert_eq!(b.carry(), 0);
    }

    #[test]
    fn test_sub_borrow() {
        let mut b = Bench::new();
        b.exec("sub", &["3", "5", "r0"]).unwrap();
        assert_eq!(b.reg(0), 254);
        assert_eq!(b.carry(), 1);

        b.exec("sub", &["5", "3", "r0"]).unwrap();
        assert_eq!(b.reg(0), 2);
        assert_eq!(b.carry(), 0);
    }

    #[test]
    fn test_mul() {
        let mut b = Bench::new();
        b.exec("mul", &["16", "16", "r0"]).unwrap();
        assert_eq!(b.reg(0), 0);
        assert_eq!(b.carry(), 1);

        b.exec("mul", &["12", "11", "r0"]).unwrap();
        assert_eq!(b.reg(0), 132);
        assert_eq!(b.carry(), 0);
    }

    #[test]
    fn test_shifts() {
        let mut b = Bench::new();
        b.set(r(0), 0x81);

        b.exec("shl", &["r0", "1", "r1"]).unwrap();
        assert_eq!(b.reg(1), 0x02);
        assert_eq!(b.carry(), 1);

        b.exec("shl", &["r0", "9", "r1"]).unwrap();
        assert_eq!(b.reg(1), 0);
        assert_eq!(b.carry(), 1);

        b.exec("shl", &["r3", "9", "r1"]).unwrap();
        assert_eq!(b.reg(1), 0);
        assert_eq!(b.carry(), 0);

        b.exec("shr", &["r0", "4", "r1"]).unwrap();
        assert_eq!(b.reg(1), 0x08);
        b.exec("shr", &["r0", "200", "r1"]).unwrap();
        assert_eq!(b.reg(1), 0);
        assert_eq!(b.carry(), 0);
    }

    #[test]
    fn test_rotates() {
        let mut b = Bench::new();
        b.set(r(0), 0b1000_0001);

        b.exec("rol", &["r0", "1", "r1"]).unwrap();
        assert_eq!(b.reg(1), 0b0000_0011);
        b.exec("ror", &["r0", "1", "r1"]).unwrap();
        assert_eq!(b.reg(1), 0b1100_0000);
        b.exec("rol", &["r0", "8", "r1"]).unwrap();
        assert_eq!(b.reg(1), 0b1000_0001);
        b.exec("ror", &["r0", "0", "r1"]).unwrap();
        assert_eq!(b.reg(1), 0b1000_0001);
        assert_eq!(b.carry(), 0);
    }

    #[test]
    fn test_bitwise() {
        let mut b = Bench::new();
        b.set(r(0), 0b1100);
        b.set(r(1), 0b1010);

        b.exec("and", &["r0", "r1", "r2"]).unwrap();
        assert_eq!(b.reg(2), 0b1000);
        b.exec("or", &["r0", "r1", "r2"]).unwrap();
        assert_eq!(b.reg(2), 0b1110);
        b.exec("xor", &["r0", "r1", "r2"]).unwrap();
        assert_eq!(b.reg(2), 0b0110);
        b.exec("not", &["r0", "r2"]).unwrap();
        assert_eq!(b.reg(2), 0xF3);
        // not is not arithmetic, so the truncated bits do not set carry
        assert_eq!(b.carry(), 0);
        b.exec("popcnt", &["0xFF", "r2"]).unwrap();
        assert_eq!(b.reg(2), 8);
    }

    #[test]
    fn test_bswap() {
        let mut b = Bench::new();
        let w = b.banks.add_bank("w", 16, 2).unwrap();
        b.set(Loc::new(w, 0), 0x1234);
        b.exec("bswap", &["w", "w1"]).unwrap();
        assert_eq!(b.banks.read(Loc::new(w, 1)), Some(0x3412));

        let set = InstrSet::default();
        let ok = set.get("bswap").unwrap().bit_length_ok;
        assert!(!ok(8));
        assert!(!ok(12));
        assert!(ok(16));
        assert!(ok(64));
    }

    #[test]
    fn test_comparisons() {
        let mut b = Bench::new();
        b.exec("eq", &["7", "0x7", "r0"]).unwrap();
        assert_eq!(b.reg(0), 1);
        b.exec("lt", &["7", "3", "r0"]).unwrap();
        assert_eq!(b.reg(0), 0);
        b.exec("lt", &["3", "7", "r0"]).unwrap();
        assert_eq!(b.reg(0), 1);
    }

    #[test]
    fn test_memory() {
        let mut b = Bench::new();
        b.set(Loc::new(BankId::Mem, 3), 42);
        b.exec("load", &["3", "r0"]).unwrap();
        assert_eq!(b.reg(0), 42);

        b.exec("store", &["r0", "5"]).unwrap();
        assert_eq!(b.banks.read(Loc::new(BankId::Mem, 5)), Some(42));

        assert_eq!(
            b.exec("load", &["20", "r0"]),
            Err(SimErr::MemoryIndexOutOfRange { addr: 20, len: 16 })
        );
    }

    #[test]
    fn test_jumps() {
        let mut b = Bench::new();
        b.exec("jmp", &["5"]).unwrap();
        assert_eq!(b.banks.pc(), 5);

        b.exec("jz", &["r0", "9"]).unwrap();
        assert_eq!(b.banks.pc(), 9);
        b.exec("jnz", &["r0", "2"]).unwrap();
        assert_eq!(b.banks.pc(), 9);

        b.flags.set(Flag::CARRY, 1);
        b.exec("jc", &["1"]).unwrap();
        assert_eq!(b.banks.pc(), 1);
        b.exec("jc", &["3"]).unwrap();
        assert_eq!(b.banks.pc(), 1);

        assert_eq!(
            b.exec("jmp", &["16"]),
            Err(SimErr::MemoryIndexOutOfRange { addr: 16, len: 16 })
        );
    }

    #[test]
    fn test_reads_come_from_snapshot() {
        let mut b = Bench::new();
        b.set(r(0), 1);
        // reading and writing the same cell in one instruction
        b.exec("mov", &["r0", "r0"]).unwrap();
        assert_eq!(b.reg(0), 1);
        assert!(b.observer.get_accesses(r(0)).read());
        assert!(b.observer.get_accesses(r(0)).written());
        assert!(!b.observer.get_accesses(r(0)).modified());
    }

    #[test]
    fn test_define() {
        fn inc(ctx: &mut ExecCtx, ops: &[Loc]) -> Result<(), SimErr> {
            let [a] = super::operands(ops)?;
            let v = ctx.read(a);
            ctx.write(a, u128::from(v) + 1);
            Ok(())
        }

        let mut set = InstrSet::default();
        let n = set.len();
        assert!(set.define(InstrDesc::new("INC", 1, InstrKind::Arithmetic, inc)).is_none());
        assert_eq!(set.len(), n + 1);
        assert_eq!(set.get("inc").map(|d| d.arity), Some(1));
        assert_eq!(set.get("Add").map(|d| d.kind), Some(InstrKind::Arithmetic));
        assert!(set.get("frobnicate").is_none());
        assert!(InstrSet::empty().is_empty());
    }
}
