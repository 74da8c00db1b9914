//! A configurable bank-based abstract machine.
//!
//! This is meant to be a general core for running small assembly-like programs
//! which teach low-level bitwise algorithms (arithmetic, shifts, masking, carry).
//! A machine is made of named storage banks of any bit width,
//! and executes bundles of instructions whose operands refer to cells in those banks.
//!
//! # Usage
//!
//! Programs are handed to the machine as already-split instructions
//! (a mnemonic and its operand tokens), grouped into bundles:
//! ```
//! use bitbench::ast::{Bundle, Instr, Program};
//!
//! let program = Program::from_iter([
//!     Bundle::from(Instr::new("add", ["r0", "r1", "r2"])),
//!     Bundle::new([Instr::new("shl", ["r2", "1", "r3"]), Instr::new("shr", ["r2", "1", "r4"])]),
//!     Bundle::from(Instr::new("halt", [] as [&str; 0])),
//! ]);
//! ```
//!
//! Once a program has been created, it can be executed with the machine:
//! ```
//! # use bitbench::ast::{Bundle, Instr, Program};
//! # let program = Program::from_iter([
//! #     Bundle::from(Instr::new("add", ["r0", "r1", "r2"])),
//! #     Bundle::new([Instr::new("shl", ["r2", "1", "r3"]), Instr::new("shr", ["r2", "1", "r4"])]),
//! #     Bundle::from(Instr::new("halt", [] as [&str; 0])),
//! # ]);
//! use bitbench::sim::Machine;
//! use bitbench::sim::flags::Flag;
//!
//! let mut machine = Machine::default();
//! machine.inject("r0", 0x60).unwrap();
//! machine.inject("r[1]", 0x30).unwrap();
//! machine.load(&program).unwrap();
//! machine.run(None).unwrap(); // <-- Result can be handled accordingly
//!
//! assert_eq!(machine.extract("r2"), Ok(0x90));
//! assert_eq!(machine.extract("r3"), Ok(0x20));
//! assert_eq!(machine.extract("r4"), Ok(0x48));
//! assert_eq!(machine.flags().get(Flag::CARRY), 0);
//! ```
//!
//! Banks can be added at any time, and are immediately available to operands:
//! ```
//! use bitbench::sim::Machine;
//!
//! let mut machine = Machine::default();
//! machine.add_bank("wide", 32, 2).unwrap();
//! machine.inject("wide1", 0x1_0000_0001).unwrap();
//! assert_eq!(machine.extract("wide[1]"), Ok(1));
//! ```
//!
//! If more granularity is needed for execution, there are also step and breakpoint functions.
//! See the [`sim`] module for more details.
#![warn(missing_docs)]

pub mod parse;
pub mod ast;
pub mod sim;
pub mod err;
