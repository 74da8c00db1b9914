//! Resolving operand tokens to storage locations.
//!
//! An operand token is resolved in two steps:
//! 1. [`parse_operand`] turns the text into an [`Operand`] (purely syntactic).
//! 2. [`locate`] maps the [`Operand`] onto the registered banks, producing a [`Target`].
//!
//! [`resolve`] performs both steps and additionally materializes literals
//! into the immediate pool (`i`), so that every operand ends up as a [`Loc`].
//!
//! Resolution rules, in order (first match wins):
//! 1. A token that is exactly a bank name resolves to cell 0 of that bank.
//! 2. A decimal literal is appended to `i`.
//! 3. A hex literal (`0x...`) is appended to `i`.
//! 4. `<bank><digits>` resolves to the given cell of the bank.
//! 5. `<bank>[<digits>]` resolves to the given cell of the bank.
//!
//! Since bank names never end in a digit, rule 4 can only split a token one way.
//!
//! ```
//! use bitbench::sim::bank::{BankRegistry, BankId, Loc};
//! use bitbench::sim::resolve::{resolve, ResolveErr};
//!
//! let mut banks = BankRegistry::new(8, 4, 16, &mut 0u64);
//! assert_eq!(resolve(&mut banks, "r[3]"), Ok(Loc::new(BankId::Reg, 3)));
//! assert_eq!(resolve(&mut banks, "r3"),   Ok(Loc::new(BankId::Reg, 3)));
//! assert!(matches!(resolve(&mut banks, "r99"), Err(ResolveErr::OperandIndex { .. })));
//!
//! let imm = resolve(&mut banks, "0x1F").unwrap();
//! assert_eq!(imm.bank, BankId::Imm);
//! assert_eq!(banks.read(imm), Some(31));
//! ```
use crate::ast::Operand;
use crate::parse::{parse_operand, ParseErr};

use super::bank::{BankRegistry, Loc};

/// Errors raised when resolving an operand.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ResolveErr {
    /// The token does not match any operand form, or names no bank.
    UnresolvedOperand {
        /// The offending token.
        token: String,
        /// The syntax error, if the token could not be parsed at all.
        cause: Option<ParseErr>
    },
    /// The token names a bank, but the index is past the end of the bank.
    OperandIndex {
        /// The offending token.
        token: String,
        /// The bank the token refers to.
        bank: String,
        /// The requested index.
        index: usize,
        /// The number of cells in the bank.
        len: usize
    },
}
impl ResolveErr {
    /// The token which failed to resolve.
    pub fn token(&self) -> &str {
        match self {
            ResolveErr::UnresolvedOperand { token, .. } => token,
            ResolveErr::OperandIndex { token, .. } => token,
        }
    }
}
impl std::fmt::Display for ResolveErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveErr::UnresolvedOperand { token, cause: Some(e) } => write!(f, "could not resolve operand {token:?}: {e}"),
            ResolveErr::UnresolvedOperand { token, cause: None } => write!(f, "could not resolve operand {token:?}"),
            ResolveErr::OperandIndex { token, bank, index, len } => write!(f, "operand {token:?} indexes {bank}[{index}], but {bank} has {len} cells"),
        }
    }
}
impl std::error::Error for ResolveErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveErr::UnresolvedOperand { cause: Some(e), .. } => Some(e),
            _ => None
        }
    }
}
impl crate::err::Error for ResolveErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        use crate::err::Error;

        match self {
            ResolveErr::UnresolvedOperand { cause: Some(e), .. } => e.help(),
            ResolveErr::UnresolvedOperand { cause: None, .. } => Some("this is not the name of any bank (or of a bank followed by an index)".into()),
            ResolveErr::OperandIndex { len: 0, .. } => Some("this bank has no cells".into()),
            ResolveErr::OperandIndex { len, .. } => Some(format!("indices for this bank must be between 0 and {}", len - 1).into()),
        }
    }
}

/// What an operand refers to, before immediates are materialized.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Target {
    /// A cell of a bank.
    Cell(Loc),
    /// A literal value (in two's complement for negative literals).
    Immediate(u128),
}

/// Maps an operand onto the registered banks.
///
/// This does not modify the banks.
/// The `token` is only used for error reporting.
pub fn locate(banks: &BankRegistry, token: &str, operand: &Operand) -> Result<Target, ResolveErr> {
    let unresolved = || ResolveErr::UnresolvedOperand { token: token.to_string(), cause: None };

    let (id, index) = match operand {
        // two's complement
        &Operand::Literal(n) => return Ok(Target::Immediate(n as u128)),
        &Operand::HexLiteral(n) => return Ok(Target::Immediate(n)),
        Operand::BankRef(name) => match banks.id_of(name) {
            Some(id) => (id, 0),
            None => {
                let prefix = name.trim_end_matches(|c: char| c.is_ascii_digit());
                let digits = &name[prefix.len()..];
                if digits.is_empty() { return Err(unresolved()) };

                let id = banks.id_of(prefix).ok_or_else(unresolved)?;
                // digits too long for usize can never be in range
                let index = digits.parse::<usize>().unwrap_or(usize::MAX);
                (id, index)
            }
        },
        Operand::IndexedRef(name, index) => {
            let id = banks.id_of(name).ok_or_else(unresolved)?;
            (id, *index)
        },
    };

    let loc = Loc::new(id, index);
    match banks.contains(loc) {
        true  => Ok(Target::Cell(loc)),
        false => {
            let bank = &banks[id];
            Err(ResolveErr::OperandIndex {
                token: token.to_string(),
                bank: bank.name().to_string(),
                index,
                len: bank.len()
            })
        }
    }
}

/// Resolves an operand token to a location.
///
/// Literals are appended to the immediate pool (`i`) and resolve to their cell in it.
pub fn resolve(banks: &mut BankRegistry, token: &str) -> Result<Loc, ResolveErr> {
    let operand = parse_operand(token)
        .map_err(|e| ResolveErr::UnresolvedOperand { token: token.to_string(), cause: Some(e) })?;

    match locate(banks, token, &operand)? {
        Target::Cell(loc) => Ok(loc),
        Target::Immediate(value) => Ok(banks.push_imm(value)),
    }
}

/// Resolves every operand token of an instruction.
///
/// This stops at the first failure. Immediates of the tokens before the failure
/// stay in `i`; the caller is responsible for rolling them back.
pub fn resolve_all<S: AsRef<str>>(banks: &mut BankRegistry, tokens: &[S]) -> Result<Vec<Loc>, ResolveErr> {
    tokens.iter()
        .map(|t| resolve(banks, t.as_ref()))
        .collect()
}
