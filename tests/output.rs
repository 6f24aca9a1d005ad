use std::fs;
use std::path::PathBuf;
use urnsim::{Config, Simulation};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("urnsim-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// `totals.dat` carries three parallel tab-separated rows: event times,
/// left totals, right totals.
#[test]
fn totals_file_format() -> urnsim::Result<()> {
    let dir = scratch_dir("totals");
    let mut sim = Simulation::new(Config::new(10, 0.1), Some(3))?;
    sim.set_output_dir(&dir);
    sim.start(1.0)?;
    for _ in 0..50 {
        sim.update(0.0)?;
    }
    sim.finish()?;

    let contents = fs::read_to_string(dir.join("totals.dat"))?;
    let rows: Vec<Vec<&str>> = contents
        .lines()
        .map(|line| line.split_whitespace().collect())
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].len(), 51, "one measurement per event plus the start");
    assert_eq!(rows[1].len(), 51);
    assert_eq!(rows[2].len(), 51);
    assert_eq!(rows[0][0].parse::<f64>().unwrap(), 0.0);
    assert_eq!(rows[1][0], "10");
    assert_eq!(rows[2][0], "0");
    for (left, right) in rows[1].iter().zip(rows[2].iter()) {
        let left: i64 = left.parse().unwrap();
        let right: i64 = right.parse().unwrap();
        assert_eq!(left + right, 10);
    }
    fs::remove_dir_all(&dir).ok();
    Ok(())
}

/// `results.dat` starts with the geometry header and accumulates snapshot
/// blocks: a time line followed by the x, y and direction rows.
#[test]
fn results_file_format() -> urnsim::Result<()> {
    let dir = scratch_dir("results");
    let mut sim = Simulation::new(Config::new(5, 0.1), Some(4))?;
    sim.set_output_dir(&dir);
    sim.start(1.0)?;
    sim.write_snapshot(0.0)?;
    while sim.time() < 0.3 {
        sim.update(0.05)?;
    }

    let contents = fs::read_to_string(dir.join("results.dat"))?;
    let lines: Vec<&str> = contents.lines().collect();
    assert!(lines[0].starts_with("num_particles"));
    let header: Vec<f64> = lines[1]
        .split_whitespace()
        .map(|v| v.parse().unwrap())
        .collect();
    assert_eq!(header.len(), 5);
    assert_eq!(header[0], 5.0);
    assert_eq!(header[1], 1.0);
    let bridge_length = header[4];
    assert!(bridge_length > header[2], "coupled bridge exceeds the gap");

    assert!(lines.len() > 6, "at least one snapshot block after the header");
    assert_eq!((lines.len() - 2) % 4, 0, "blocks of time + x + y + dir lines");
    for block in lines[2..].chunks(4) {
        let time: f64 = block[0].parse().unwrap();
        assert!(time >= 0.0);
        for row in &block[1..] {
            let values: Vec<f64> = row
                .split_whitespace()
                .map(|v| v.parse().unwrap())
                .collect();
            assert_eq!(values.len(), 5);
            assert!(values.iter().all(|v| v.is_finite()));
        }
    }
    fs::remove_dir_all(&dir).ok();
    Ok(())
}

/// Snapshot positions are interpolated along each particle's current flight
/// segment, so every sampled position stays inside the domain.
#[test]
fn snapshots_interpolate_inside_the_domain() -> urnsim::Result<()> {
    let dir = scratch_dir("interp");
    let mut sim = Simulation::new(Config::new(20, 0.1), Some(5))?;
    sim.set_output_dir(&dir);
    sim.start(0.5)?;
    sim.write_snapshot(0.0)?;
    while sim.time() < 2.0 {
        sim.update(0.1)?;
    }

    let contents = fs::read_to_string(dir.join("results.dat"))?;
    let lines: Vec<&str> = contents.lines().collect();
    let geo = sim.geometry();
    for block in lines[2..].chunks(4) {
        let xs: Vec<f64> = block[1]
            .split_whitespace()
            .map(|v| v.parse().unwrap())
            .collect();
        let ys: Vec<f64> = block[2]
            .split_whitespace()
            .map(|v| v.parse().unwrap())
            .collect();
        for (x, y) in xs.iter().zip(ys.iter()) {
            // Loose tolerance: interpolation may graze a boundary.
            assert!(
                geo.in_domain(*x, *y)
                    || geo.in_domain(x - 1e-9, *y)
                    || geo.in_domain(x + 1e-9, *y)
                    || geo.in_domain(*x, y - 1e-9)
                    || geo.in_domain(*x, y + 1e-9),
                "snapshot position ({x}, {y}) far outside the domain"
            );
        }
    }
    fs::remove_dir_all(&dir).ok();
    Ok(())
}
