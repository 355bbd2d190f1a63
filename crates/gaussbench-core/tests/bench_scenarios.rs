//! End-to-end scenarios on a full bench.

use approx::assert_relative_eq;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;

use gaussbench_core::{Beam, Optics, OpticsBench, Orientation, TargetBeam};

/// Every beam must be the image of the previous one through its element.
fn assert_propagation_invariant(bench: &OpticsBench) {
    assert_eq!(bench.beams().len(), bench.len());
    for i in 1..bench.len() {
        let expected = bench.optics(i).image(bench.beam(i - 1));
        let actual = bench.beam(i);
        for direction in Orientation::DIRECTIONS {
            assert_relative_eq!(
                actual.waist(direction),
                expected.waist(direction),
                max_relative = 1e-12
            );
            assert_relative_eq!(
                actual.waist_position(direction),
                expected.waist_position(direction),
                epsilon = 1e-12
            );
        }
        assert_eq!(actual.index(), expected.index());
        assert_eq!(actual.wavelength(), bench.wavelength());
    }
}

fn mixed_bench() -> OpticsBench {
    let mut bench = OpticsBench::new();
    bench.add_optics(Optics::lens(0.1, 0.15)).unwrap();
    bench.add_optics(Optics::flat_interface(1.5, 0.25)).unwrap();
    bench.add_optics(Optics::dielectric_slab(1.2, 0.02, 0.3)).unwrap();
    bench.add_optics(Optics::flat_interface(1.0 / 1.5, 0.35)).unwrap();
    bench.add_optics(Optics::curved_interface(0.05, 1.3, 0.45)).unwrap();
    bench
}

#[test]
fn test_propagation_invariant_through_mixed_elements() {
    let mut bench = mixed_bench();
    assert_propagation_invariant(&bench);
    assert_relative_eq!(bench.beam(2).index(), 1.5, max_relative = 1e-12);
    assert_relative_eq!(bench.beam(4).index(), 1.0, max_relative = 1e-12);

    bench.set_wavelength(1064e-9);
    bench.set_optics_position(1, 0.2, true);
    assert_propagation_invariant(&bench);
}

#[test]
fn test_thin_lens_scenario() {
    // 180 µm waist at 10 mm (default source), f = 21 mm lens at 120 mm.
    let mut bench = OpticsBench::new();
    let index = bench.add_optics(Optics::lens(0.021, 0.12)).unwrap();

    let source = bench.beam(0);
    let q_in = source.q(0.12, Orientation::Spherical);
    let expected = q_in / (Complex64::new(1.0, 0.0) - q_in / 0.021);

    let q_out = bench.beam(index).q(0.12, Orientation::Spherical);
    assert_relative_eq!(q_out.re, expected.re, max_relative = 1e-9);
    assert_relative_eq!(q_out.im, expected.im, max_relative = 1e-9);

    let waist = (expected.im * bench.wavelength() / std::f64::consts::PI).sqrt();
    assert_relative_eq!(
        bench.beam(index).waist(Orientation::Spherical),
        waist,
        max_relative = 1e-9
    );
}

#[test]
fn test_cylindrical_lens_splits_directions() {
    let mut bench = OpticsBench::new();
    let lens = Optics::lens(0.05, 0.2).with_orientation(Orientation::Horizontal);
    let index = bench.add_optics(lens).unwrap();

    let beam = bench.beam(index);
    assert!(!beam.is_spherical());
    assert_relative_eq!(beam.waist(Orientation::Vertical), 180e-6, max_relative = 1e-9);
    assert_relative_eq!(
        beam.waist_position(Orientation::Vertical),
        10e-3,
        epsilon = 1e-9
    );
    assert!(beam.waist(Orientation::Horizontal) < 180e-6);

    // A second, vertical cylindrical lens continues both directions apart.
    let vertical = Optics::lens(0.05, 0.3).with_orientation(Orientation::Vertical);
    bench.add_optics(vertical).unwrap();
    assert_propagation_invariant(&bench);
}

#[test]
fn test_backward_edit_rederives_source() {
    let mut bench = OpticsBench::new();
    let index = bench.add_optics(Optics::lens(0.1, 0.2)).unwrap();
    bench.add_optics(Optics::lens(0.05, 0.4)).unwrap();

    let wanted = Beam::new(60e-6, 0.3, bench.wavelength(), 1.0, 1.0);
    bench.set_beam(&wanted, index);

    let beam = bench.beam(index);
    assert_relative_eq!(beam.waist(Orientation::Spherical), 60e-6, max_relative = 1e-9);
    assert_relative_eq!(
        beam.waist_position(Orientation::Spherical),
        0.3,
        epsilon = 1e-9
    );
    // The source now sits at the waist of the beam it emits.
    assert_relative_eq!(
        bench.optics(0).position(),
        bench.beam(0).waist_position(Orientation::Horizontal),
        epsilon = 1e-12
    );
    assert_propagation_invariant(&bench);
}

#[test]
fn test_removal_scenario() {
    let mut bench = OpticsBench::new();
    bench.add_optics(Optics::curved_mirror(0.1, 0.1)).unwrap();
    bench.add_optics(Optics::curved_mirror(0.1, 0.15)).unwrap();
    bench.add_optics(Optics::curved_mirror(0.1, 0.2)).unwrap();
    bench.add_optics(Optics::lens(0.1, 0.3)).unwrap();
    for index in 1..=3 {
        assert!(bench.add_cavity_optics(index));
    }
    assert!(bench.lock_to(4, "R2"));
    assert!(bench.is_cavity_stable());

    let removed_id = bench.optics(2).id();
    assert_eq!(bench.remove_optics(2, 1), 1);

    assert_eq!(bench.len(), 4);
    assert!(bench.optics_index(removed_id).is_none());
    assert!(!bench.cavity().contains(removed_id));
    assert_eq!(bench.cavity().members().len(), 2);
    // The lens lost its lock parent and is free again.
    let lens = bench.find_optics("L1").unwrap();
    assert!(bench.optics(lens).lock_parent().is_none());
    assert_propagation_invariant(&bench);

    // The source is never removed.
    assert_eq!(bench.remove_optics(0, 2), 0);
    assert_eq!(bench.len(), 4);
}

#[test]
fn test_magic_waist_moves_locked_pair() {
    let mut bench = OpticsBench::new();
    bench.set_wavelength(1064e-9);
    let first = bench.add_optics(Optics::lens(0.1, 0.2)).unwrap();
    let second = bench.add_optics(Optics::lens(0.05, 0.35)).unwrap();
    assert!(bench.lock_to(second, "L1"));
    let target = bench.beam(second).clone();
    bench.set_target_beam(TargetBeam::new(target));

    bench.set_optics_position(first, 0.1, true);
    let output = bench.beam(bench.len() - 1).clone();
    assert!(!bench.target().is_reached(&output));

    let mut rng = StdRng::seed_from_u64(2024);
    assert!(bench.magic_waist_with_rng(&mut rng));
    let output = bench.beam(bench.len() - 1);
    assert!(bench.target().is_reached(output));
    assert_relative_eq!(
        bench.optics(2).position() - bench.optics(1).position(),
        0.15,
        epsilon = 1e-9
    );
}

#[test]
fn test_cavity_after_interface_uses_medium_index() {
    let mut bench = OpticsBench::new();
    bench.set_wavelength(1064e-9);
    bench.add_optics(Optics::flat_interface(1.5, 0.05)).unwrap();
    for z in [0.1, 0.15, 0.2] {
        bench.add_optics(Optics::curved_mirror(0.1, z)).unwrap();
    }
    for index in 2..=4 {
        assert!(bench.add_cavity_optics(index));
    }
    assert!(bench.is_cavity_stable());

    let beam = bench.cavity_eigen_beam(2).unwrap();
    let rayleigh = (0.05f64 * (0.2 - 0.05)).sqrt() / 2.0;
    assert_relative_eq!(beam.index(), 1.5, max_relative = 1e-12);
    assert_relative_eq!(
        beam.waist_position(Orientation::Spherical),
        0.125,
        epsilon = 1e-9
    );
    assert_relative_eq!(
        beam.rayleigh(Orientation::Spherical),
        rayleigh,
        max_relative = 1e-9
    );
    assert_relative_eq!(
        beam.waist(Orientation::Spherical),
        (rayleigh * 1064e-9 / (1.5 * std::f64::consts::PI)).sqrt(),
        max_relative = 1e-9
    );
}
