//! Configuration module for the analysis desk.

// Can all be private now because we have a public re-export.
mod debug;
mod runtime;
mod simulation;
mod stream;

// Re-export commonly used items
pub use debug::DF;
pub use runtime::{ManagerConfig, SimulationSettings};
pub use simulation::SIMULATION;
pub use stream::STREAM;
