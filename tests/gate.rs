use std::f64::consts::PI;
use urnsim::{Config, Side, Simulation};

const TOL: f64 = 1e-9;

fn flat_config(num_particles: usize) -> Config {
    let mut cfg = Config::new(num_particles, 0.1);
    cfg.left_gate_capacity = 1;
    cfg.right_gate_capacity = 1;
    cfg.gate_is_flat = true;
    cfg
}

/// One particle crossing the channel left to right: admitted at the left
/// aperture, released at the mid-line, never counted by the right gate
/// (it is leaving, not entering), reflected at the far arc.
#[test]
fn flat_gate_traversal_bookkeeping() -> urnsim::Result<()> {
    let mut sim = Simulation::new(flat_config(1), Some(5))?;
    sim.start(1.0)?;
    let half_gate = sim.geometry().bridge_length / 2.0;

    sim.particles[0].x = -0.9;
    sim.particles[0].y = 0.0;
    sim.particles[0].dir = 0.0;
    sim.compute_next_impact(0)?;
    sim.resync_queue()?;

    // Left aperture: admitted.
    sim.update(0.0)?;
    assert!((sim.particles[0].x + half_gate).abs() < TOL);
    assert!(sim.particles[0].in_gate[Side::Left.index()]);
    assert_eq!(sim.gate_occupancy(Side::Left), 1);
    assert_eq!(sim.in_left(), 1);

    // Mid-line: left membership dropped, right never acquired (leaving).
    sim.update(0.0)?;
    assert!(sim.particles[0].x > 0.0);
    assert_eq!(sim.gate_occupancy(Side::Left), 0);
    assert_eq!(sim.gate_occupancy(Side::Right), 0);
    assert_eq!(sim.in_left(), 0);
    assert_eq!(sim.current_counters(), [1, 0, 0, 0]);

    // Right aperture: still leaving, still no membership.
    sim.update(0.0)?;
    assert!((sim.particles[0].x - half_gate).abs() < TOL);
    assert_eq!(sim.gate_occupancy(Side::Right), 0);

    // Far arc of the right reservoir: specular reflection.
    sim.update(0.0)?;
    assert!((sim.particles[0].x - 2.25).abs() < 1e-6);
    assert!((sim.particles[0].dir.cos() + 1.0).abs() < TOL);
    Ok(())
}

/// A second arrival at a full gate triggers an explosion: the trigger is
/// retracted without being admitted and the resident is retracted in place.
#[test]
fn explosion_retracts_trigger_and_resident() -> urnsim::Result<()> {
    let mut sim = Simulation::new(flat_config(2), Some(6))?;
    sim.start(1.0)?;

    sim.particles[0].x = -0.9;
    sim.particles[0].y = 0.01;
    sim.particles[0].dir = 0.0;
    sim.particles[1].x = -0.95;
    sim.particles[1].y = -0.01;
    sim.particles[1].dir = 0.0;
    sim.compute_next_impact(0)?;
    sim.compute_next_impact(1)?;
    sim.resync_queue()?;

    // Particle 0 reaches the aperture first and takes the only slot.
    sim.update(0.0)?;
    assert_eq!(sim.gate_occupancy(Side::Left), 1);
    assert!(sim.particles[0].in_gate[Side::Left.index()]);

    // Particle 1 arrives, the gate explodes: both now head back left.
    sim.update(0.0)?;
    assert_eq!(sim.gate_occupancy(Side::Left), 1, "resident keeps its slot");
    assert!(!sim.particles[1].in_gate[Side::Left.index()], "trigger not admitted");
    assert!((sim.particles[0].dir - PI).abs() < TOL);
    assert!((sim.particles[1].dir - PI).abs() < TOL);
    assert!((sim.particles[0].impact_time - sim.time()).abs() < 1e-12);
    assert_eq!(sim.in_left(), 2);

    // The retreat empties the gate without ever exceeding capacity.
    for _ in 0..30 {
        sim.update(0.0)?;
        assert!(sim.gate_occupancy(Side::Left) <= 1);
        assert!(sim.gate_occupancy(Side::Right) <= 1);
    }
    Ok(())
}

/// Arc-gate membership over a full left-to-right passage: acquired when the
/// particle leaves its circle into the bridge cap, dropped at the mid-line,
/// and never granted on the way out of the channel.
#[test]
fn arc_gate_membership_over_a_passage() -> urnsim::Result<()> {
    let mut cfg = Config::new(1, 0.3);
    cfg.left_gate_capacity = 1;
    cfg.right_gate_capacity = 1;
    let mut sim = Simulation::new(cfg, Some(8))?;
    sim.start(1.0)?;
    let geo = sim.geometry().clone();
    let left_arc_x = geo.left_center_x + geo.circle_radius;

    sim.particles[0].x = left_arc_x - 0.02;
    sim.particles[0].y = 0.0;
    sim.particles[0].dir = 0.0;
    sim.compute_next_impact(0)?;
    sim.resync_queue()?;

    // Out of the left circle into the cap: admitted.
    sim.update(0.0)?;
    let p = &sim.particles[0];
    assert!((p.x - left_arc_x).abs() < TOL);
    assert!(geo.in_gate(p.x, p.y, Side::Left));
    assert!(!geo.in_gate(p.x, p.y, Side::Right));
    assert_eq!(sim.gate_occupancy(Side::Left), 1);
    assert_eq!(sim.gate_occupancy(Side::Right), 0);

    // Mid-line: released from the left gate; the right gate ignores a
    // particle that is moving away from the mid-line.
    sim.update(0.0)?;
    let p = &sim.particles[0];
    assert!(p.x > 0.0 && p.x < 1e-6);
    assert!(geo.in_gate(p.x, p.y, Side::Right));
    assert_eq!(sim.gate_occupancy(Side::Left), 0);
    assert_eq!(sim.gate_occupancy(Side::Right), 0);

    // Into the right circle: cap region left behind, still no membership.
    sim.update(0.0)?;
    let p = &sim.particles[0];
    assert!(!geo.in_gate(p.x, p.y, Side::Right));
    assert_eq!(sim.gate_occupancy(Side::Right), 0);
    Ok(())
}

/// Capacity bounds and the flag/membership correspondence hold through a
/// long explosion-heavy run.
#[test]
fn capacity_and_flags_hold_under_load() -> urnsim::Result<()> {
    let mut cfg = Config::new(60, 0.1);
    cfg.left_gate_capacity = 2;
    cfg.right_gate_capacity = 1;
    cfg.explosion_direction_is_random = true;
    let mut sim = Simulation::new(cfg, Some(99))?;
    sim.start(0.5)?;

    for step in 0..30_000 {
        sim.update(0.0)?;
        assert!(sim.gate_occupancy(Side::Left) <= 2);
        assert!(sim.gate_occupancy(Side::Right) <= 1);
        if step % 500 == 0 {
            for side in Side::BOTH {
                let members = sim.gate_contents(side);
                for (i, p) in sim.particles.iter().enumerate() {
                    assert_eq!(
                        p.in_gate[side.index()],
                        members.contains(&i),
                        "flag/membership mismatch for particle {i}"
                    );
                }
            }
        }
    }
    Ok(())
}
