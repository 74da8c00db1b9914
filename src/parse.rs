//! Parsing operand tokens.
//!
//! Operand tokens are handed to the machine as plain text by an external assembler.
//! This module converts one such token into an [`Operand`] with [`parse_operand`].
//!
//! Parsing is purely syntactic: it does not know which banks exist.
//! Deciding what an operand refers to is left to the resolver
//! (see [`crate::sim::resolve`]).
//!
//! ```
//! use bitbench::ast::Operand;
//! use bitbench::parse::parse_operand;
//!
//! assert_eq!(parse_operand("0x1F"), Ok(Operand::HexLiteral(31)));
//! assert_eq!(parse_operand("r[3]"), Ok(Operand::IndexedRef("r".to_string(), 3)));
//! assert_eq!(parse_operand("r3"),   Ok(Operand::BankRef("r3".to_string())));
//! assert!(parse_operand("r[").is_err());
//! ```
pub mod lex;

use logos::Logos;

use crate::ast::Operand;
use self::lex::{LexErr, Token};

/// Any errors raised in attempting to parse an operand token.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErr {
    /// The token could not be tokenized.
    Lex(LexErr),
    /// The token was empty.
    Empty,
    /// The token was tokenized, but its pieces do not form an operand.
    Malformed,
    /// A bracketed index was negative.
    NegativeIndex,
    /// A bracketed index does not fit in an address.
    IndexTooLarge,
}
impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErr::Lex(e)        => write!(f, "{e}"),
            ParseErr::Empty         => f.write_str("empty operand"),
            ParseErr::Malformed     => f.write_str("malformed operand"),
            ParseErr::NegativeIndex => f.write_str("bracketed index is negative"),
            ParseErr::IndexTooLarge => f.write_str("bracketed index is too large"),
        }
    }
}
impl std::error::Error for ParseErr {}
impl crate::err::Error for ParseErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        use crate::err::Error;

        match self {
            ParseErr::Lex(e)        => e.help(),
            ParseErr::Empty         => None,
            ParseErr::Malformed     => Some("expected a literal, a bank name, or name[index]".into()),
            ParseErr::NegativeIndex => Some("bank indices start at 0".into()),
            ParseErr::IndexTooLarge => None,
        }
    }
}
impl From<LexErr> for ParseErr {
    fn from(value: LexErr) -> Self {
        Self::Lex(value)
    }
}

/// Parses one operand token.
pub fn parse_operand(token: &str) -> Result<Operand, ParseErr> {
    let tokens = Token::lexer(token).collect::<Result<Vec<_>, _>>()?;

    match tokens.as_slice() {
        [] => Err(ParseErr::Empty),
        &[Token::Dec(n)] => Ok(Operand::Literal(n)),
        &[Token::Hex(n)] => Ok(Operand::HexLiteral(n)),
        [Token::Ident(name)] => Ok(Operand::BankRef(name.clone())),
        [Token::Ident(name), Token::LBracket, Token::Dec(n), Token::RBracket] => {
            if *n < 0 { return Err(ParseErr::NegativeIndex) };
            let index = usize::try_from(*n).map_err(|_| ParseErr::IndexTooLarge)?;
            Ok(Operand::IndexedRef(name.clone(), index))
        },
        _ => Err(ParseErr::Malformed)
    }
}
