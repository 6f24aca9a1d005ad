//! Core of the event-driven two-reservoir gas simulator: the domain model,
//! the time-to-impact kernel, the per-particle planner and event scheduler,
//! and the gate admission/explosion protocol.

pub mod geometry;
pub mod particle;
pub mod raycast;
pub mod scheduler;
pub mod sim;

pub use geometry::{Geometry, Side};
pub use particle::Particle;
pub use scheduler::EventQueue;
pub use sim::{Config, Simulation};
