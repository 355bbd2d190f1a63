//! Job runner: builds the bench, runs the requested tasks and writes the
//! results.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use gaussbench_core::{Beam, Optics, OpticsBench, OpticsKind, Orientation};

use crate::config::{JobConfig, Optimize};
use crate::units::Unit;

/// Build the bench described by `job` and run its tasks.
///
/// `seed` overrides the optimizer seed of the document.
pub fn run_job(job: &JobConfig, seed: Option<u64>) -> Result<OpticsBench> {
    let mut bench = OpticsBench::from_document(&job.bench).context("Invalid bench document")?;
    if let Some(seed) = seed {
        let mut config = bench.optimizer_config().clone();
        config.seed = Some(seed);
        bench.set_optimizer_config(config);
    }
    println!(
        "Bench: {} elements at {}",
        bench.len(),
        Unit::Wavelength.format(bench.wavelength(), 1)
    );

    if let Some(mode) = job.tasks.optimize {
        let found = match mode {
            Optimize::MagicWaist => bench.magic_waist(),
            Optimize::LocalOptimum => bench.local_optimum(),
        };
        if found {
            println!("Optimization ({:?}): target reached", mode);
        } else {
            println!("Optimization ({:?}): no solution, bench unchanged", mode);
        }
    }

    print_elements(&bench);
    print_target(&bench);
    if job.tasks.cavity && !bench.cavity().members().is_empty() {
        print_cavity(&bench);
    }
    if job.tasks.fits && !bench.fits().is_empty() {
        print_fits(&bench);
    }
    Ok(bench)
}

fn print_elements(bench: &OpticsBench) {
    println!();
    println!(
        "{:<8} {:<18} {:>12} {:>10} {:>14} {:>14} {:>14} {:>12}",
        "name", "type", "position", "focal", "waist", "waist pos.", "rayleigh", "divergence"
    );
    for (optics, beam) in bench.elements().iter().zip(bench.beams()) {
        println!(
            "{:<8} {:<18} {:>12} {:>10} {:>14} {:>14} {:>14} {:>12}",
            optics.name(),
            optics.optics_type().label(),
            Unit::Position.format(optics.position(), 2),
            focal(optics),
            Unit::Waist.format(beam.waist(Orientation::Horizontal), 2),
            Unit::Position.format(beam.waist_position(Orientation::Horizontal), 2),
            Unit::Rayleigh.format(beam.rayleigh(Orientation::Horizontal), 1),
            Unit::Divergence.format(beam.divergence(Orientation::Horizontal), 3),
        );
        if !beam.is_spherical() {
            println!(
                "{:<8} {:<18} {:>12} {:>10} {:>14} {:>14} {:>14} {:>12}",
                "",
                "  (vertical)",
                "",
                "",
                Unit::Waist.format(beam.waist(Orientation::Vertical), 2),
                Unit::Position.format(beam.waist_position(Orientation::Vertical), 2),
                Unit::Rayleigh.format(beam.rayleigh(Orientation::Vertical), 1),
                Unit::Divergence.format(beam.divergence(Orientation::Vertical), 3),
            );
        }
    }
}

/// Focal length of focusing elements, blank otherwise.
fn focal(optics: &Optics) -> String {
    match optics.kind() {
        OpticsKind::Lens(lens) => Unit::Focal.format(lens.focal(), 1),
        OpticsKind::CurvedMirror(mirror) => Unit::Focal.format(mirror.curvature_radius() / 2.0, 1),
        _ => String::new(),
    }
}

fn print_target(bench: &OpticsBench) {
    let target = bench.target();
    let output = bench.beam(bench.len() - 1);
    println!();
    println!(
        "Target: {} at {}, overlap {:.4} ({})",
        Unit::Waist.format(target.beam.waist(Orientation::Horizontal), 2),
        Unit::Position.format(target.beam.waist_position(Orientation::Horizontal), 2),
        Beam::overlap(output, &target.beam, 0.0),
        if target.is_reached(output) {
            "reached"
        } else {
            "not reached"
        }
    );
    println!("Sensitivity: {:.4e}", bench.sensitivity());
}

fn print_cavity(bench: &OpticsBench) {
    let cavity = bench.cavity();
    println!();
    println!(
        "Cavity ({}, {} elements): {}",
        if cavity.is_ring() { "ring" } else { "linear" },
        cavity.members().len(),
        if bench.is_cavity_stable() {
            "stable"
        } else {
            "unstable"
        }
    );
    for &id in cavity.members() {
        let Some(index) = bench.optics_index(id) else {
            continue;
        };
        if let Some(beam) = bench.cavity_eigen_beam(index) {
            println!(
                "  after {:<8} waist {} at {}",
                bench.optics(index).name(),
                Unit::Waist.format(beam.waist(Orientation::Horizontal), 2),
                Unit::Position.format(beam.waist_position(Orientation::Horizontal), 2),
            );
        }
    }
}

fn print_fits(bench: &OpticsBench) {
    println!();
    for (index, fit) in bench.fits().iter().enumerate() {
        let Some(result) = fit.result(bench.wavelength()) else {
            println!("Fit {}: not enough data", fit.name());
            continue;
        };
        println!(
            "Fit {}: waist {} at {}, rho² {:.5}, residue {}",
            fit.name(),
            Unit::Waist.format(result.beam.waist(Orientation::Spherical), 2),
            Unit::Position.format(result.beam.waist_position(Orientation::Spherical), 2),
            result.rho2,
            Unit::Waist.format(result.residue, 3),
        );
        info!("Fit {} used {} samples", index, fit.len());
    }
}

/// Sample the beam radius along the bench, between its boundaries.
///
/// Each row is `(z, w_h, w_v)` in SI units. The beam at `z` is the one
/// leaving the last element placed before `z`.
pub fn beam_profile(bench: &OpticsBench, samples: usize) -> Vec<(f64, f64, f64)> {
    let (left, right) = (bench.left_boundary(), bench.right_boundary());
    let count = samples.max(2);
    (0..count)
        .map(|i| {
            let z = left + (right - left) * i as f64 / (count - 1) as f64;
            let index = bench
                .elements()
                .iter()
                .rposition(|o| o.end_position() <= z)
                .unwrap_or(0);
            let beam = bench.beam(index);
            (
                z,
                beam.radius(z, Orientation::Horizontal),
                beam.radius(z, Orientation::Vertical),
            )
        })
        .collect()
}

/// Write the beam radius profile to a CSV file with a metadata header.
pub fn write_profile_csv(bench: &OpticsBench, samples: usize, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Cannot create {}", path.display()))?;

    writeln!(file, "# GaussBench beam profile")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(
        file,
        "# wavelength_nm: {}",
        Unit::Wavelength.to_display(bench.wavelength())
    )?;
    for optics in bench.elements() {
        writeln!(
            file,
            "# element '{}': {} at {:.3} mm",
            optics.name(),
            optics.optics_type().label(),
            Unit::Position.to_display(optics.position())
        )?;
    }
    writeln!(file, "#")?;
    writeln!(file, "z_mm,radius_h_um,radius_v_um")?;
    for (z, horizontal, vertical) in beam_profile(bench, samples) {
        writeln!(
            file,
            "{:.4},{:.4},{:.4}",
            Unit::Position.to_display(z),
            Unit::Waist.to_display(horizontal),
            Unit::Waist.to_display(vertical)
        )?;
    }

    println!("Profile written to: {}", path.display());
    Ok(())
}

/// Write the bench as a JSON document.
pub fn write_document_json(bench: &OpticsBench, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&bench.to_document())
        .context("JSON serialisation error")?;
    std::fs::write(path, json).with_context(|| format!("Cannot write {}", path.display()))?;

    println!("Bench document written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use approx::assert_relative_eq;

    const TELESCOPE: &str = include_str!("../../../demos/telescope.toml");

    #[test]
    fn test_demo_reaches_target() {
        let job = parse_config(TELESCOPE, false).unwrap();
        let bench = run_job(&job, None).unwrap();
        let output = bench.beam(bench.len() - 1);
        assert!(bench.target().is_reached(output));
        // The locked pair moved together.
        assert_relative_eq!(
            bench.optics(2).position() - bench.optics(1).position(),
            0.15,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_profile_follows_segments() {
        let job = parse_config(TELESCOPE, false).unwrap();
        let bench = OpticsBench::from_document(&job.bench).unwrap();
        let profile = beam_profile(&bench, 26);
        assert_eq!(profile.len(), 26);
        assert_relative_eq!(profile[0].0, bench.left_boundary());
        assert_relative_eq!(profile[25].0, bench.right_boundary(), epsilon = 1e-12);
        // Before the first lens the source beam applies.
        let source = bench.beam(0);
        assert_relative_eq!(
            profile[0].1,
            source.radius(profile[0].0, Orientation::Horizontal)
        );
    }
}
