//! Error interface for this crate.
//!
//! Every error type in this crate implements [`Error`], which extends
//! [`std::error::Error`] with an optional help message that a front end
//! can show alongside the error.
//!
//! The error types themselves live next to the code that raises them
//! and are re-exported here:
//! - [`LexErr`]: errors from tokenizing an operand
//! - [`ParseErr`]: errors from parsing an operand
//! - [`BankErr`]: errors from creating or looking up banks
//! - [`ResolveErr`]: errors from resolving an operand to a location
//! - [`LoadErr`]: errors from loading a program
//! - [`SimErr`]: errors that stop execution
use std::borrow::Cow;

pub use crate::parse::lex::LexErr;
pub use crate::parse::ParseErr;
pub use crate::sim::bank::BankErr;
pub use crate::sim::resolve::ResolveErr;
pub use crate::sim::LoadErr;
pub use crate::sim::SimErr;

/// Unified error interface for all errors in this crate.
pub trait Error: std::error::Error {
    /// A clarifying message to help aid someone in how to fix the message.
    ///
    /// By default this is `None`.
    fn help(&self) -> Option<Cow<str>> {
        None
    }
}
