//! Problem ranking, device distribution and matrix instruction search.

pub mod distribute;
pub mod ranker;
pub mod search;

pub use distribute::*;
pub use ranker::*;
pub use search::*;
