//! GEMM problem descriptions for configuration synthesis.
//!
//! Problems enter either as benchmark invocations scraped from a log
//! ([`extract`]) or as declarative grids ([`grid`]); both end up as
//! [`ProblemRecord`]s pairing a [`ProblemShape`] with its
//! [`DatatypeDescriptor`].

pub mod config;
pub mod extract;
pub mod grid;
pub mod instruction;

pub use config::*;
pub use extract::{extract_problem, Invocation, OperandLayout};
pub use grid::{GridEntry, GridError, GridSpec, RangeSpec};
pub use instruction::*;
