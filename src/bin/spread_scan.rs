use anyhow::{bail, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Write;
use urnsim::{Config, Error, Simulation};

/// Batch runner for parameter-regime explorations of the two-chamber
/// dynamics: one parameter point per invocation, one summary line appended
/// to the output file, so sweeps parallelise as independent processes.
#[derive(Parser, Debug)]
#[command(
    name = "spread_scan",
    about = "Average mass spread and gate currents for one parameter point"
)]
struct Args {
    /// Length of the connecting channel
    channel_length: f64,
    /// Width of the connecting channel
    channel_width: f64,
    /// Gate capacity, applied to both sides
    threshold: usize,
    /// Radius of the reservoirs
    radius: f64,
    /// Length of the back channel (reserved; accepted but unused)
    second_length: f64,
    /// Width of the back channel (reserved; accepted but unused)
    second_width: f64,
    /// Number of particles
    num_particles: usize,
    /// Initial fraction of particles in the left reservoir
    left_ratio: f64,
    /// Transient window, in collisions, excluded from the averages
    transient_collisions: u64,
    /// Total run length, in collisions
    final_collisions: u64,
    /// Output file stem; the summary is appended to <FILE_ID>.out
    file_id: String,
    /// Identifier written at the start of the summary line
    sim_id: String,
    /// Also write a 500-point evolution series to <FILE_ID>.chi
    #[arg(long)]
    chi: bool,
    /// RNG seed (entropy-seeded when absent)
    #[arg(long)]
    seed: Option<u64>,
}

fn append_summary(file_id: &str, sim_id: &str, avg_chi: f64, currents: [f64; 4]) -> Result<()> {
    let mut out_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(format!("{file_id}.out"))?;
    writeln!(
        out_file,
        "{},{},{},{},{},{}",
        sim_id, avg_chi, currents[0], currents[1], currents[2], currents[3]
    )?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    if args.final_collisions <= args.transient_collisions {
        bail!("final_collisions must exceed transient_collisions");
    }

    let mut config = Config::new(args.num_particles, args.channel_width);
    config.circle_radius = args.radius;
    config.circle_distance = args.channel_length;
    config.left_gate_capacity = args.threshold;
    config.right_gate_capacity = args.threshold;
    config.gate_is_flat = true;
    config.distance_as_channel_length = true;
    config.expected_collisions = args.final_collisions as usize;
    config.second_length = args.second_length;
    config.second_width = args.second_width;

    // An infeasible parameter point (e.g. a channel wider than the reservoir
    // allows) gets a zero-valued summary line instead of aborting the sweep.
    let started = Simulation::new(config, args.seed)
        .and_then(|mut sim| sim.start(args.left_ratio).map(|()| sim));
    let mut sim = match started {
        Ok(sim) => sim,
        Err(Error::InvalidParam(msg)) => {
            println!(
                "Not running for bridge width {} and radius {}, returning 0 ({msg})",
                args.channel_width, args.radius
            );
            return append_summary(&args.file_id, &args.sim_id, 0.0, [0.0; 4]);
        }
        Err(e) => return Err(e.into()),
    };

    while sim.num_collisions() < args.transient_collisions {
        sim.update(0.0)?;
    }

    let count_offset = sim.current_counters();
    let time_offset = sim.time();
    let weight = 1.0 / (args.final_collisions - args.transient_collisions) as f64;
    let chi_step = (args.final_collisions / 500).max(1);

    let mut avg_chi = 0.0;
    let mut chi_rows = String::new();
    while sim.num_collisions() < args.final_collisions {
        sim.update(0.0)?;
        avg_chi += weight * sim.mass_spread();
        if args.chi && sim.num_collisions() % chi_step == 0 {
            chi_rows.push_str(&format!(
                "{},{},{},{}\n",
                sim.num_collisions(),
                sim.time(),
                sim.in_left(),
                sim.mass_spread().abs()
            ));
        }
    }

    let elapsed = sim.time() - time_offset;
    let counters = sim.current_counters();
    let mut currents = [0.0_f64; 4];
    for (current, (now, then)) in currents
        .iter_mut()
        .zip(counters.iter().zip(count_offset.iter()))
    {
        *current = (now - then) as f64 / elapsed;
    }

    if args.chi {
        let mut chi_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(format!("{}.chi", args.file_id))?;
        chi_file.write_all(chi_rows.as_bytes())?;
    }

    append_summary(&args.file_id, &args.sim_id, avg_chi, currents)
}
