//! Event-driven kinetic simulation of a two-dimensional gas in a
//! dumbbell-shaped domain: two circular reservoirs joined by a narrow
//! bridge whose gate admits a bounded number of particles per side.
//!
//! Particles fly in straight lines at unit speed and reflect specularly off
//! the reservoir arcs and bridge rails; they never interact directly, only
//! through the shared gate occupancy. When a particle would push a gate side
//! over capacity the gate "explodes", retracting every occupant back into
//! its reservoir. The observables of interest are the mass imbalance
//! between the sides and the currents across the mid-line.
//!
//! ```no_run
//! use urnsim::{Config, Simulation};
//!
//! # fn main() -> urnsim::Result<()> {
//! let mut sim = Simulation::new(Config::new(1000, 0.1), Some(42))?;
//! sim.start(0.5)?;
//! while sim.time() < 100.0 {
//!     sim.update(0.0)?;
//! }
//! sim.finish()?; // writes totals.dat
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;

pub use crate::core::{Config, Geometry, Particle, Side, Simulation};
pub use crate::error::{Error, Result};
