use anyhow::Result;
use clap::Parser;
use urnsim::{Config, Simulation};

/// Run a population with asymmetric gate capacities and write the position
/// snapshot series (`results.dat`) for animation.
#[derive(Parser, Debug)]
#[command(name = "animate", about = "Write a snapshot series of the two-chamber gas")]
struct Args {
    /// Number of particles
    #[arg(long, default_value_t = 200)]
    num_particles: usize,
    /// Bridge height
    #[arg(long, default_value_t = 0.5)]
    bridge_height: f64,
    /// Gate capacity on the left side
    #[arg(long, default_value_t = 15)]
    left_capacity: usize,
    /// Gate capacity on the right side
    #[arg(long, default_value_t = 2)]
    right_capacity: usize,
    /// Initial fraction of particles in the left reservoir
    #[arg(long, default_value_t = 0.5)]
    left_ratio: f64,
    /// Simulation time to run for
    #[arg(long, default_value_t = 100.0)]
    final_time: f64,
    /// Snapshot sampling interval
    #[arg(long, default_value_t = 0.025)]
    write_dt: f64,
    /// RNG seed (entropy-seeded when absent)
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = Config::new(args.num_particles, args.bridge_height);
    config.left_gate_capacity = args.left_capacity;
    config.right_gate_capacity = args.right_capacity;

    let mut sim = Simulation::new(config, args.seed)?;
    sim.start(args.left_ratio)?;
    sim.write_snapshot(0.0)?;
    while sim.time() < args.final_time {
        sim.update(args.write_dt)?;
    }
    sim.finish()?;
    println!(
        "{} collisions in {:.1} time units; final mass spread {:.3}",
        sim.num_collisions(),
        sim.time(),
        sim.mass_spread()
    );
    Ok(())
}
