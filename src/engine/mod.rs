//! Simulation engine: clock, price feed, positions, stats, narration and the
//! simulator that ties them together.

pub mod agent;
pub mod clock;
pub mod feed;
pub mod history;
pub mod positions;
pub mod seed;
pub mod simulator;
pub mod stats;
pub mod thoughts;

pub use simulator::{Simulator, Snapshot};
