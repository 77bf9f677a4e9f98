//! Tuning configuration synthesis.
//!
//! Turns ranked problems into one filled-in tuning configuration per device:
//! [`pipeline`] reads the input and distributes problems, [`synth`] builds each
//! device's document from the [`template`].

#[cfg(feature = "cli")]
pub mod cli;
pub mod error;
pub mod pipeline;
pub mod synth;
pub mod template;

#[cfg(feature = "cli")]
pub use cli::*;
pub use error::*;
pub use pipeline::*;
pub use synth::*;
pub use template::BaseTemplate;
