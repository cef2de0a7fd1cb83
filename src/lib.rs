//! Quality-Diversity - MAP-Elites archives and ask/tell emitters.
//!
//! This crate implements the core of a Quality-Diversity optimizer: an
//! archive that keeps the best solution found in each cell of a discretized
//! descriptor space, a family of emitters that propose new candidates from
//! the archive, and a run loop that evaluates candidates against a user
//! supplied [`Domain`](compute::Domain).
//!
//! # Architecture
//!
//! The crate is split into three modules:
//!
//! - `schema`: Configuration, statistics and history types
//! - `compute`: Archive, indexers, emitters, optimizer and run loop
//! - `domains`: Benchmark problems (Rastrigin, planar arm) and experiment files
//!
//! # Example
//!
//! ```rust,no_run
//! use quality_diversity::{
//!     compute::MapElites,
//!     domains::PlanarArm,
//!     schema::{ArchiveConfig, EmitterConfig, EmitterKind, RunConfig},
//! };
//!
//! let config = RunConfig {
//!     archive: ArchiveConfig::grid(vec![50, 50], vec![(0.0, 1.0), (0.0, 1.0)]),
//!     emitters: vec![EmitterConfig::new(EmitterKind::IsoLine {
//!         iso_sigma: 0.01,
//!         line_sigma: 0.2,
//!     })],
//!     generations: 500,
//!     seed: Some(0),
//!     ..RunConfig::default()
//! };
//!
//! let engine = MapElites::new(config, PlanarArm::new(10)).unwrap();
//! let result = engine.run().unwrap();
//!
//! println!("QD score after 500 generations: {}", result.stats.archive.qd_score);
//! ```

pub mod compute;
pub mod domains;
pub mod schema;

// Re-export commonly used types
pub use compute::{Archive, Domain, Evaluation, MapElites, MultiArchive, Optimizer};
pub use domains::{DomainConfig, ExperimentConfig};
pub use schema::{ArchiveConfig, ArchiveStats, EmitterConfig, RunConfig};
