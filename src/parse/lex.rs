//! Tokenizing operand text.
//!
//! This module holds the tokens that make up a single operand ([`Token`]).
//! This module is used by the operand parser to facilitate the conversion of
//! operand text (e.g., `r3`, `m[12]`, `0x1F`, `-4`) into an [`Operand`].
//!
//! [`Operand`]: crate::ast::Operand

use std::num::IntErrorKind;

use logos::{Lexer, Logos};

/// A unit of information in an operand.
#[derive(Debug, Logos, PartialEq, Eq)]
#[logos(skip r"[ \t]+", error = LexErr)]
pub enum Token {
    // Note, these regexes span over tokens that are technically invalid
    // (e.g., 23trst matches for decimal even though it shouldn't).
    // This is intended.
    // These regexes collect what would be considered one discernable unit
    // and validates it using the validator function.

    /// A decimal numeric value, optionally negative (e.g., `9`, `-14`).
    #[regex(r"-?\d\w*", lex_dec)]
    Dec(i128),

    /// A hexadecimal numeric value (e.g., `0x1F`, `0xff`).
    #[regex(r"0x\w*", lex_hex, priority = 5)]
    Hex(u128),

    /// An identifier.
    ///
    /// This is either a bank name (e.g., `r`, `acc`) or
    /// a bank name glued to an index (e.g., `r3`, `m12`).
    /// Which one it is can only be decided against the registered banks.
    #[regex(r"[A-Za-z_]\w*", |lx| lx.slice().to_string())]
    Ident(String),

    /// An opening bracket, which starts a bracketed index (e.g., `r[3]`).
    #[token("[")]
    LBracket,

    /// A closing bracket, which ends a bracketed index.
    #[token("]")]
    RBracket,
}

/// Any errors raised in attempting to tokenize an operand.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LexErr {
    /// Numeric literal cannot fit within 128 bits
    DoesNotFit128,
    /// Hex literal (starting with 0x) has invalid hex digits
    InvalidHex,
    /// Hex literal (starting with 0x) doesn't have digits after it
    InvalidHexEmpty,
    /// Numeric literal could not be parsed as a decimal literal because it has invalid digits (i.e., not 0-9)
    InvalidNumeric,
    /// Int parsing failed but the reason why is unknown
    UnknownIntErr,
    /// A symbol was used which is not allowed in an operand
    #[default]
    InvalidSymbol
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::DoesNotFit128   => f.write_str("numeric token does not fit in 128 bits"),
            LexErr::InvalidHex      => f.write_str("invalid hex literal"),
            LexErr::InvalidHexEmpty => f.write_str("invalid hex literal"),
            LexErr::InvalidNumeric  => f.write_str("invalid decimal literal"),
            LexErr::UnknownIntErr   => f.write_str("could not parse integer"),
            LexErr::InvalidSymbol   => f.write_str("unrecognized symbol"),
        }
    }
}
impl std::error::Error for LexErr {}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LexErr::DoesNotFit128   => Some(format!("decimal literals must be within [{}, {}]", i128::MIN, i128::MAX).into()),
            LexErr::InvalidHex      => Some("a hex literal starts with '0x' and consists of 0-9, A-F".into()),
            LexErr::InvalidHexEmpty => Some("there should be hex digits (0-9, A-F) here".into()),
            LexErr::InvalidNumeric  => Some("a decimal literal only consists of digits 0-9".into()),
            LexErr::UnknownIntErr   => None,
            LexErr::InvalidSymbol   => Some("operands consist of literals, bank names, and bracketed indices".into()),
        }
    }
}

/// Helper that converts an int error kind to its corresponding LexErr, based on the provided inputs.
fn convert_int_error(e: &IntErrorKind, invalid_digits_err: LexErr, empty_err: LexErr) -> LexErr {
    match e {
        IntErrorKind::Empty        => empty_err,
        IntErrorKind::InvalidDigit => invalid_digits_err,
        IntErrorKind::PosOverflow  => LexErr::DoesNotFit128,
        IntErrorKind::NegOverflow  => LexErr::DoesNotFit128,
        _ => LexErr::UnknownIntErr,
    }
}
fn lex_dec(lx: &Lexer<'_, Token>) -> Result<i128, LexErr> {
    lx.slice()
        .parse::<i128>()
        .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidNumeric, LexErr::InvalidNumeric))
}
fn lex_hex(lx: &Lexer<'_, Token>) -> Result<u128, LexErr> {
    let Some(hex) = lx.slice().strip_prefix("0x") else {
        unreachable!("Lexer slice should have started with 0x");
    };

    u128::from_str_radix(hex, 16)
        .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidHex, LexErr::InvalidHexEmpty))
}
