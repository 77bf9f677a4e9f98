//! Accelerator architecture profiles and host probing.

pub mod arch;
pub mod probe;

pub use arch::*;
pub use probe::*;
