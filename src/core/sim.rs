use crate::core::geometry::{Geometry, Side};
use crate::core::particle::Particle;
use crate::core::raycast::{self, EPS};
use crate::core::scheduler::EventQueue;
use crate::error::{Error, Result};
use log::{debug, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::{FRAC_PI_2, PI};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Bound on reset-and-replan attempts for a single particle before the
/// simulator gives up and reports a broken invariant.
const MAX_REPLAN_ATTEMPTS: usize = 100;

/// Simulation parameters. Mirrors the constructor surface of the core:
/// required counts and geometry up front, tunable fields left public for
/// the batch drivers to adjust before [`Simulation::new`].
#[derive(Debug, Clone)]
pub struct Config {
    pub num_particles: usize,
    pub bridge_height: f64,
    pub circle_radius: f64,
    /// Nominal gap between the circle edges along the x-axis.
    pub circle_distance: f64,
    pub left_gate_capacity: usize,
    pub right_gate_capacity: usize,
    /// Sample the post-explosion heading instead of reversing it.
    pub explosion_direction_is_random: bool,
    /// Gate aperture is the vertical slab edge `x = ±L/2` instead of the
    /// reservoir arc caps.
    pub gate_is_flat: bool,
    /// Interpret `circle_distance` as the channel length and pull the
    /// circles inward instead. Requires `gate_is_flat`.
    pub distance_as_channel_length: bool,
    /// Pre-reserves the measurement series when > 0.
    pub expected_collisions: usize,
    /// Reserved for the two-channel variant; accepted and ignored.
    pub second_length: f64,
    /// Reserved for the two-channel variant; accepted and ignored.
    pub second_width: f64,
}

impl Config {
    /// A configuration with the standard defaults: unit reservoirs half a
    /// radius apart, arc gates of capacity 3, deterministic retraction.
    pub fn new(num_particles: usize, bridge_height: f64) -> Self {
        Self {
            num_particles,
            bridge_height,
            circle_radius: 1.0,
            circle_distance: 0.5,
            left_gate_capacity: 3,
            right_gate_capacity: 3,
            explosion_direction_is_random: false,
            gate_is_flat: false,
            distance_as_channel_length: false,
            expected_collisions: 0,
            second_length: 0.0,
            second_width: 0.0,
        }
    }
}

/// Event-driven simulator of a two-reservoir gas with capacity-limited
/// gates.
///
/// Lifecycle: [`Simulation::new`] → [`start`](Simulation::start) →
/// repeated [`update`](Simulation::update) → [`finish`](Simulation::finish).
/// Each `update` advances to the earliest planned impact, applies it to one
/// particle, runs the gate protocol, replans that particle and appends one
/// measurement; state is consistent between any two calls.
#[derive(Debug)]
pub struct Simulation {
    geo: Geometry,
    num_particles: usize,
    gate_capacities: [usize; 2],
    explosion_direction_is_random: bool,
    distance_as_channel_length: bool,
    expected_collisions: usize,

    /// Per-particle state; public so drivers and tests can stage scenarios.
    /// After direct mutation call [`resync_queue`](Simulation::resync_queue).
    pub particles: Vec<Particle>,
    queue: EventQueue,
    rng: StdRng,

    time: f64,
    last_written_time: f64,
    in_left: i64,
    gate_contents: [Vec<usize>; 2],

    /// Event times of the measurement series, one entry per event.
    pub measuring_times: Vec<f64>,
    /// Left-side particle counts, parallel to `measuring_times`.
    pub total_left: Vec<i64>,
    num_collisions: u64,
    current_counters: [i64; 4],
    reset_counter: u64,

    output_dir: PathBuf,
}

impl Simulation {
    /// Build a simulator from `config`, coupling the bridge geometry and
    /// seeding the RNG (`seed = None` seeds from entropy). Construction
    /// succeeds for any finite configuration; the geometric preconditions
    /// are checked by [`start`](Simulation::start), and the simulator holds
    /// no particles until then.
    pub fn new(config: Config, seed: Option<u64>) -> Result<Self> {
        if config.num_particles == 0 {
            return Err(Error::InvalidParam("num_particles must be > 0".into()));
        }
        let geo = Geometry::new(
            config.circle_radius,
            config.circle_distance,
            config.bridge_height,
            config.gate_is_flat,
            config.distance_as_channel_length,
        );
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::seed_from_u64(rand::rng().random()),
        };
        Ok(Self {
            geo,
            num_particles: config.num_particles,
            gate_capacities: [config.left_gate_capacity, config.right_gate_capacity],
            explosion_direction_is_random: config.explosion_direction_is_random,
            distance_as_channel_length: config.distance_as_channel_length,
            expected_collisions: config.expected_collisions,
            particles: Vec::new(),
            queue: EventQueue::new(),
            rng,
            time: 0.0,
            last_written_time: 0.0,
            in_left: 0,
            gate_contents: [Vec::new(), Vec::new()],
            measuring_times: Vec::new(),
            total_left: Vec::new(),
            num_collisions: 0,
            current_counters: [0; 4],
            reset_counter: 0,
            output_dir: PathBuf::from("."),
        })
    }

    /// Place all particles and record the initial measurement.
    ///
    /// `left_ratio` of the population is rejection-sampled into the left
    /// reservoir, the rest into the right, all outside the gate and bridge
    /// regions, with headings uniform on `[-π, π)`.
    ///
    /// Every configuration precondition is checked here: an infeasible
    /// geometry fails before any particle is placed, and the caller must
    /// construct a new simulator.
    pub fn start(&mut self, left_ratio: f64) -> Result<()> {
        if !self.geo.circle_radius.is_finite() || self.geo.circle_radius <= 0.0 {
            return Err(Error::InvalidParam(
                "circle_radius must be finite and > 0".into(),
            ));
        }
        if !self.geo.bridge_height.is_finite() || self.geo.bridge_height <= 0.0 {
            return Err(Error::InvalidParam(
                "bridge_height must be finite and > 0".into(),
            ));
        }
        if self.geo.bridge_height / 2.0 >= self.geo.circle_radius {
            return Err(Error::InvalidParam(
                "bridge_height must be < 2 * circle_radius; no initialization possible".into(),
            ));
        }
        if !(0.0..=1.0).contains(&left_ratio) {
            return Err(Error::InvalidParam(format!(
                "left_ratio must be in [0, 1], got {left_ratio}"
            )));
        }
        if self.distance_as_channel_length && !self.geo.gate_is_flat {
            return Err(Error::InvalidParam(
                "distance_as_channel_length requires a flat gate".into(),
            ));
        }
        self.time = 0.0;
        self.last_written_time = 0.0;
        self.in_left = 0;
        self.num_collisions = 0;
        self.current_counters = [0; 4];
        self.reset_counter = 0;
        self.gate_contents = [Vec::new(), Vec::new()];
        self.measuring_times.clear();
        self.total_left.clear();
        if self.expected_collisions > 0 {
            self.measuring_times.reserve(self.expected_collisions);
            self.total_left.reserve(self.expected_collisions);
        }

        self.particles = vec![Particle::default(); self.num_particles];
        let num_left = (left_ratio * self.num_particles as f64) as usize;
        for particle in 0..self.num_particles {
            let side = if particle < num_left {
                Side::Left
            } else {
                Side::Right
            };
            self.reset_particle(particle, side);
            self.compute_next_impact(particle)?;
            if side == Side::Left {
                self.in_left += 1;
            }
        }
        self.resync_queue()?;
        self.measure();
        Ok(())
    }

    /// Advance the simulation by one event.
    ///
    /// With `write_dt > 0`, interpolated position snapshots are appended to
    /// `results.dat` at that cadence before the event is applied.
    pub fn update(&mut self, write_dt: f64) -> Result<()> {
        let (_, particle) = self
            .queue
            .peek_min()
            .ok_or_else(|| Error::InvalidParam("update called before start".into()))?;
        let next_impact = self.particles[particle].next_impact_time;

        if write_dt > 0.0 {
            while next_impact > self.last_written_time + write_dt {
                let at = self.last_written_time + write_dt;
                self.write_snapshot(at)?;
                self.last_written_time = at;
            }
        }

        // Residual floating drift: a planned position marginally outside the
        // domain is snapped to the reservoir center on its side.
        let (nx, ny) = {
            let p = &self.particles[particle];
            (p.next_x, p.next_y)
        };
        if !self.geo.in_domain(nx, ny) {
            warn!("particle {particle} about to leave the domain at ({nx:.5}, {ny:.5}); re-entered");
            let p = &mut self.particles[particle];
            p.next_x = sgn(nx) * (self.geo.circle_distance / 2.0 + self.geo.circle_radius);
            p.next_y = 0.0;
        }

        // Mid-line bookkeeping, against the committed (old) position.
        let old_x = self.particles[particle].x;
        let new_x = self.particles[particle].next_x;
        if old_x > 0.0 && new_x < 0.0 {
            self.in_left += 1;
            self.current_counters[1] += 1;
        } else if old_x < 0.0 && new_x > 0.0 {
            self.in_left -= 1;
            self.current_counters[0] += 1;
        } else if old_x == 0.0 {
            warn!("particle {particle} committed exactly on the mid-line; left-side count may be off by one");
        }

        {
            let p = &mut self.particles[particle];
            p.x = p.next_x;
            p.y = p.next_y;
            p.dir = p.next_dir;
            p.impact_time = next_impact;
        }
        self.time = next_impact;

        for side in Side::BOTH {
            let p = &self.particles[particle];
            if self.geo.in_gate(p.x, p.y, side) && p.is_heading_inward() {
                self.check_gate_admission(particle, side)?;
            } else {
                self.check_gate_departure(particle, side);
            }
        }

        self.compute_next_impact(particle)?;
        let new_time = self.particles[particle].next_impact_time;
        self.queue.reinsert(particle, next_impact, new_time, true)?;

        self.num_collisions += 1;
        self.measure();
        Ok(())
    }

    /// Write `totals.dat`: measuring times, left totals, right totals.
    pub fn finish(&self) -> Result<()> {
        let path = self.output_dir.join("totals.dat");
        let mut w = BufWriter::new(File::create(path)?);
        for t in &self.measuring_times {
            write!(w, "{t}\t")?;
        }
        writeln!(w)?;
        for left in &self.total_left {
            write!(w, "{left}\t")?;
        }
        writeln!(w)?;
        for left in &self.total_left {
            write!(w, "{}\t", self.num_particles as i64 - left)?;
        }
        writeln!(w)?;
        w.flush()?;
        Ok(())
    }

    /// Plan the next impact for `particle`: the minimum positive time among
    /// the rail, arc, gate and mid-line candidates, with the matching
    /// post-collision heading.
    ///
    /// When no candidate lies within `max_path` the particle has numerically
    /// escaped; it is rejection-resampled on its current side and replanned.
    pub fn compute_next_impact(&mut self, particle: usize) -> Result<()> {
        for _ in 0..MAX_REPLAN_ATTEMPTS {
            let (x, y, dir) = {
                let p = &self.particles[particle];
                (p.x, p.y, p.dir)
            };
            let mut best = self.geo.max_path;
            let mut out_dir = dir;
            let mut planned = false;

            if let Some(hit) = raycast::predict_bridge_hit(&self.geo, x, y, dir) {
                if hit.distance < best {
                    best = hit.distance;
                    out_dir = raycast::reflection_angle(dir, hit.normal_angle);
                    planned = true;
                }
            }
            for side in Side::BOTH {
                if let Some(hit) = raycast::predict_circle_hit(&self.geo, x, y, dir, side) {
                    if hit.distance < best {
                        best = hit.distance;
                        out_dir = raycast::reflection_angle(dir, hit.normal_angle);
                        planned = true;
                    }
                }
            }
            // Gate and mid-line crossings keep the heading; the +ε lands the
            // particle strictly past the boundary.
            if let Some(d) = raycast::predict_gate_crossing(&self.geo, x, y, dir) {
                if d < best {
                    best = d + EPS;
                    out_dir = dir;
                    planned = true;
                }
            }
            if let Some(d) = raycast::predict_middle_crossing(&self.geo, x, y, dir) {
                if d < best {
                    best = d + EPS;
                    out_dir = dir;
                    planned = true;
                }
            }

            if !planned {
                self.reset_counter += 1;
                warn!(
                    "no event within max_path for particle {particle} at ({x:.4}, {y:.4}); reset #{}",
                    self.reset_counter
                );
                if self.num_collisions > 10_000
                    && self.reset_counter as f64 > 1e-3 * self.num_collisions as f64
                {
                    warn!("reset rate exceeds 1e-3 per event; geometry may be badly conditioned");
                }
                let side = if x > 0.0 { Side::Right } else { Side::Left };
                self.reset_particle(particle, side);
                continue;
            }

            let time = self.time;
            let p = &mut self.particles[particle];
            p.next_x = p.x + best * p.dir.cos();
            p.next_y = p.y + best * p.dir.sin();
            p.next_impact_time = time + best;
            p.next_dir = out_dir;
            return Ok(());
        }
        Err(Error::BrokenInvariant(format!(
            "particle {particle} could not be replanned after {MAX_REPLAN_ATTEMPTS} resets"
        )))
    }

    /// Rebuild the event queue from the particles' current plans. Call after
    /// mutating particle state directly.
    pub fn resync_queue(&mut self) -> Result<()> {
        self.queue.clear();
        for (particle, p) in self.particles.iter().enumerate() {
            self.queue.insert(p.next_impact_time, particle)?;
        }
        Ok(())
    }

    /// Post-explosion heading for `particle`.
    ///
    /// Random mode samples uniformly from the half-circle opening into the
    /// particle's own reservoir (`[-π/2, π/2]` on the right, `[π/2, 3π/2]`
    /// on the left). Deterministic mode reverses the heading only when the
    /// particle moves toward the opposite side.
    pub fn retraction_angle(&mut self, particle: usize) -> f64 {
        let (x, dir) = {
            let p = &self.particles[particle];
            (p.x, p.dir)
        };
        if self.explosion_direction_is_random {
            (self.rng.random::<f64>() - 0.5) * PI + FRAC_PI_2 * (1.0 - sgn(x))
        } else if dir.cos() * x < 0.0 {
            dir + PI
        } else {
            dir
        }
    }

    fn check_gate_admission(&mut self, particle: usize, side: Side) -> Result<()> {
        if self.particles[particle].in_gate[side.index()] {
            return Ok(());
        }
        if self.gate_contents[side.index()].len() >= self.gate_capacities[side.index()] {
            self.explode_gate(particle, side)
        } else {
            self.gate_contents[side.index()].push(particle);
            self.particles[particle].in_gate[side.index()] = true;
            Ok(())
        }
    }

    fn check_gate_departure(&mut self, particle: usize, side: Side) {
        if self.particles[particle].in_gate[side.index()] {
            self.gate_contents[side.index()].retain(|&p| p != particle);
            self.particles[particle].in_gate[side.index()] = false;
        }
    }

    /// Over-capacity response: retract the trigger (without admitting it)
    /// and every current occupant of `side`'s gate.
    ///
    /// Occupants are repinned to their interpolated position at the current
    /// time; one that interpolates outside the domain is left untouched, and
    /// one that has already drifted out of the gate region is evicted
    /// instead of retracted.
    fn explode_gate(&mut self, trigger: usize, side: Side) -> Result<()> {
        let mut attempts = 0;
        loop {
            if attempts >= MAX_REPLAN_ATTEMPTS {
                return Err(Error::BrokenInvariant(format!(
                    "trigger {trigger} could not be retracted into the domain"
                )));
            }
            attempts += 1;
            let dir = self.retraction_angle(trigger);
            self.particles[trigger].dir = dir;
            self.compute_next_impact(trigger)?;
            let p = &self.particles[trigger];
            if self.geo.in_domain(p.next_x, p.next_y) {
                break;
            }
        }

        let occupants = self.gate_contents[side.index()].clone();
        for occupant in occupants {
            let (x, y) = self.particles[occupant].position_at(self.time);
            if !self.geo.in_domain(x, y) {
                warn!(
                    "gate occupant {occupant} interpolates outside the domain at ({x:.4}, {y:.4}); skipped"
                );
                continue;
            }
            if !self.geo.in_gate(x, y, side) {
                self.gate_contents[side.index()].retain(|&p| p != occupant);
                self.particles[occupant].in_gate[side.index()] = false;
                continue;
            }
            let old_time = self.particles[occupant].next_impact_time;
            let time = self.time;
            let dir = self.retraction_angle(occupant);
            {
                let p = &mut self.particles[occupant];
                p.x = x;
                p.y = y;
                p.dir = dir;
                p.impact_time = time;
            }
            self.compute_next_impact(occupant)?;
            let new_time = self.particles[occupant].next_impact_time;
            self.queue.reinsert(occupant, old_time, new_time, false)?;
        }
        Ok(())
    }

    /// Rejection-sample `particle` into the reservoir on `side`, outside the
    /// gate and bridge regions, with a fresh heading uniform on `[-π, π)`.
    fn reset_particle(&mut self, particle: usize, side: Side) {
        let box_x_radius = self.geo.circle_distance / 2.0 + self.geo.circle_radius * 2.0;
        let box_y_radius = self.geo.circle_radius;
        let (mut x, mut y) = (0.0, 0.0);
        while !self.geo.in_circle(x, y, side)
            || self.geo.in_gate(x, y, side)
            || self.geo.in_bridge(x, y)
        {
            x = (self.rng.random::<f64>() - 0.5) * box_x_radius * 2.0;
            y = (self.rng.random::<f64>() - 0.5) * box_y_radius * 2.0;
        }
        let p = &mut self.particles[particle];
        p.x = x;
        p.y = y;
        p.dir = (self.rng.random::<f64>() - 0.5) * 2.0 * PI;
    }

    fn measure(&mut self) {
        self.measuring_times.push(self.time);
        self.total_left.push(self.in_left);
    }

    /// Append an interpolated position snapshot at time `at` to
    /// `results.dat`; `at == 0` truncates the file and writes the geometry
    /// header first.
    pub fn write_snapshot(&self, at: f64) -> Result<()> {
        let path = self.output_dir.join("results.dat");
        if at == 0.0 {
            let mut header = BufWriter::new(File::create(&path)?);
            writeln!(
                header,
                "num_particles\tcircle_radius\tcircle_distance\tbridge_height\tbridge_length"
            )?;
            writeln!(
                header,
                "{} {} {} {} {}",
                self.num_particles,
                self.geo.circle_radius,
                self.geo.circle_distance,
                self.geo.bridge_height,
                self.geo.bridge_length
            )?;
            header.flush()?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut w = BufWriter::new(file);
        writeln!(w, "{at}")?;
        for p in &self.particles {
            write!(w, "{} ", p.position_at(at).0)?;
        }
        writeln!(w)?;
        for p in &self.particles {
            write!(w, "{} ", p.position_at(at).1)?;
        }
        writeln!(w)?;
        for p in &self.particles {
            write!(w, "{} ", p.dir)?;
        }
        writeln!(w)?;
        w.flush()?;
        debug!("wrote snapshot at t={at:.2}");
        Ok(())
    }

    /// Normalised polarisation `|2·in_left − N| / N`.
    pub fn mass_spread(&self) -> f64 {
        (2.0 * self.in_left as f64 - self.num_particles as f64).abs() / self.num_particles as f64
    }

    /// Directory the data files are written into (default: current dir).
    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) {
        self.output_dir = dir.into();
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn num_particles(&self) -> usize {
        self.num_particles
    }

    /// Count of particles on the left of the mid-line.
    pub fn in_left(&self) -> i64 {
        self.in_left
    }

    /// Number of events processed since `start`.
    pub fn num_collisions(&self) -> u64 {
        self.num_collisions
    }

    /// Signed mid-line crossing counts: `[left→right, right→left, 0, 0]`
    /// (the last two slots belong to the reserved back channel).
    pub fn current_counters(&self) -> [i64; 4] {
        self.current_counters
    }

    /// Number of numerical-escape resets since `start`.
    pub fn reset_count(&self) -> u64 {
        self.reset_counter
    }

    /// Current number of particles occupying `side`'s gate.
    pub fn gate_occupancy(&self, side: Side) -> usize {
        self.gate_contents[side.index()].len()
    }

    /// Indices of the particles occupying `side`'s gate, in admission order.
    pub fn gate_contents(&self, side: Side) -> &[usize] {
        &self.gate_contents[side.index()]
    }

    /// The domain model, for predicate checks by drivers and tests.
    pub fn geometry(&self) -> &Geometry {
        &self.geo
    }
}

#[inline]
fn sgn(v: f64) -> f64 {
    ((v > 0.0) as i32 - (v < 0.0) as i32) as f64
}
