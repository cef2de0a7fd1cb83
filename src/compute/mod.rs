//! Compute module - Archives, emitters and the MAP-Elites loop.

mod archive;
mod emitter;
mod evaluate;
mod indexer;
mod multi_archive;
mod optimizer;
mod persist;
mod rng;
mod run;
mod solution;

pub use archive::*;
pub use emitter::*;
pub use evaluate::*;
pub use indexer::*;
pub use multi_archive::*;
pub use optimizer::*;
pub use persist::*;
pub use rng::*;
pub use run::*;
pub use solution::*;
