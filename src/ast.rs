//! Components relating to the programs the machine executes.
//!
//! Programs are produced by an external assembler as an ordered list of
//! bundles. This module holds the data structures on that boundary:
//! - [`Instr`]: a mnemonic with its textual operand tokens,
//! - [`Bundle`]: one or more instructions issued in the same cycle,
//! - [`Program`]: an ordered list of bundles, one per memory cell,
//! - [`Operand`]: the parsed form of one operand token.
//!
//! # Example
//!
//! ```
//! use bitbench::ast::{Bundle, Instr, Program};
//!
//! let program = Program::from_iter([
//!     // r0 and r1 swap places, since both read the pre-cycle values:
//!     Bundle::new([
//!         Instr::new("mov", ["r0", "r1"]),
//!         Instr::new("mov", ["r1", "r0"]),
//!     ]),
//!     Bundle::from(Instr::new("halt", [] as [&str; 0])),
//! ]);
//! assert_eq!(program.len(), 2);
//! ```

use std::fmt::Write as _;

/// A parsed operand token.
///
/// The grammar of operand tokens is:
///
/// | form        | example        | variant                   |
/// |-------------|----------------|---------------------------|
/// | decimal     | `12`, `-4`     | [`Operand::Literal`]      |
/// | hex         | `0x1F`         | [`Operand::HexLiteral`]   |
/// | bank name   | `r`, `pc`      | [`Operand::BankRef`]      |
/// | glued index | `r3`, `m12`    | [`Operand::BankRef`]      |
/// | bracketed   | `r[3]`         | [`Operand::IndexedRef`]   |
///
/// Glued indices (`r3`) stay a [`Operand::BankRef`] after parsing,
/// because whether `r3` names a bank or indexes bank `r` can only be
/// decided against the banks registered at resolution time.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum Operand {
    /// A decimal literal.
    Literal(i128),
    /// A hexadecimal literal.
    HexLiteral(u128),
    /// A bare identifier (either a bank name or a bank name glued to an index).
    BankRef(String),
    /// A bank name with a bracketed index.
    IndexedRef(String, usize),
}
impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Literal(n)          => write!(f, "{n}"),
            Operand::HexLiteral(n)       => write!(f, "0x{n:X}"),
            Operand::BankRef(name)       => f.write_str(name),
            Operand::IndexedRef(name, i) => write!(f, "{name}[{i}]"),
        }
    }
}

/// A single instruction: a mnemonic and its operand tokens.
///
/// Operand tokens are kept as text. They are only resolved to
/// storage locations when the instruction's bundle is executed,
/// because banks may be added after a program is loaded.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Instr {
    /// The instruction's mnemonic (case-insensitive).
    pub mnemonic: String,
    /// The operand tokens, sources first and destination last.
    pub operands: Vec<String>,
}
impl Instr {
    /// Creates a new instruction.
    pub fn new<S: Into<String>>(mnemonic: impl Into<String>, operands: impl IntoIterator<Item = S>) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            operands: operands.into_iter().map(Into::into).collect(),
        }
    }
}
impl std::fmt::Display for Instr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.mnemonic)?;
        if let Some((first, rest)) = self.operands.split_first() {
            write!(f, " {first}")?;
            for op in rest {
                write!(f, ", {op}")?;
            }
        }
        Ok(())
    }
}

/// One or more instructions issued in the same cycle.
///
/// Every instruction in a bundle reads the state from before the cycle began,
/// so a bundle behaves as if all of its instructions ran in parallel.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Bundle(Vec<Instr>);
impl Bundle {
    /// Creates a bundle from its instructions (in declaration order).
    pub fn new(instrs: impl IntoIterator<Item = Instr>) -> Self {
        Self(instrs.into_iter().collect())
    }
    /// The instructions of this bundle, in declaration order.
    pub fn instrs(&self) -> &[Instr] {
        &self.0
    }
    /// The mnemonics of this bundle, in declaration order.
    pub fn labels(&self) -> Vec<String> {
        self.0.iter().map(|i| i.mnemonic.clone()).collect()
    }
}
impl From<Instr> for Bundle {
    fn from(value: Instr) -> Self {
        Self(vec![value])
    }
}
impl std::fmt::Display for Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, instr) in self.0.iter().enumerate() {
            if i != 0 { f.write_str(" | ")?; }
            write!(f, "{instr}")?;
        }
        Ok(())
    }
}

/// An ordered list of bundles.
///
/// When loaded, bundle `k` occupies the `k`-th cell after the load origin.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Default)]
pub struct Program(Vec<Bundle>);
impl Program {
    /// Creates an empty program.
    pub fn new() -> Self {
        Self(vec![])
    }
    /// Appends a bundle to the program.
    pub fn push(&mut self, bundle: impl Into<Bundle>) {
        self.0.push(bundle.into());
    }
    /// The number of bundles in this program.
    pub fn len(&self) -> usize {
        self.0.len()
    }
    /// Whether the program is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// The bundles of this program.
    pub fn bundles(&self) -> &[Bundle] {
        &self.0
    }
}
impl<B: Into<Bundle>> FromIterator<B> for Program {
    fn from_iter<T: IntoIterator<Item = B>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
impl From<Vec<Bundle>> for Program {
    fn from(value: Vec<Bundle>) -> Self {
        Self(value)
    }
}
impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for bundle in &self.0 {
            write!(f, "{bundle}")?;
            f.write_char('\n')?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Bundle, Instr, Operand, Program};

    #[test]
    fn test_display() {
        let program = Program::from_iter([
            Bundle::new([Instr::new("add", ["r0", "r1", "r2"]), Instr::new("not", ["r3", "r[3]"])]),
            Bundle::from(Instr::new("halt", [] as [&str; 0])),
        ]);
        assert_eq!(program.to_string(), "add r0, r1, r2 | not r3, r[3]\nhalt\n");
    }

    #[test]
    fn test_operand_display() {
        assert_eq!(Operand::Literal(-3).to_string(), "-3");
        assert_eq!(Operand::HexLiteral(31).to_string(), "0x1F");
        assert_eq!(Operand::BankRef("r3".into()).to_string(), "r3");
        assert_eq!(Operand::IndexedRef("m".into(), 12).to_string(), "m[12]");
    }

    #[test]
    fn test_labels() {
        let bundle = Bundle::new([Instr::new("MOV", ["r0", "r1"]), Instr::new("nop", [] as [&str; 0])]);
        assert_eq!(bundle.labels(), vec!["MOV".to_string(), "nop".to_string()]);
    }
}
