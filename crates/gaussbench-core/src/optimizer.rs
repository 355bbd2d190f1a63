//! Placement search for the free elements of a bench.
//!
//! Two strategies work on an [`OpticsFunction`] snapshot and only touch the
//! bench once they succeed:
//!
//! - [`OpticsBench::magic_waist`]: random search over the boundaries until
//!   the target is reached, followed by a local refinement.
//! - [`OpticsBench::local_optimum`]: gradient ascent of the target score
//!   from the current positions.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::bench::OpticsBench;
use crate::function::OpticsFunction;

/// Search settings, stored with the bench.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Random moves tried by `magic_waist` before giving up.
    #[serde(default = "default_max_tries")]
    pub max_tries: usize,
    /// First gradient step, as a fraction of the boundary span.
    #[serde(default = "default_initial_step")]
    pub initial_step: f64,
    /// Step (m) below which the gradient ascent has converged.
    #[serde(default = "default_min_step")]
    pub min_step: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Finite difference half width for the gradient (m).
    #[serde(default = "default_gradient_epsilon")]
    pub gradient_epsilon: f64,
    /// Random seed. `None` seeds from the operating system.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_tries() -> usize {
    500_000
}

fn default_initial_step() -> f64 {
    0.01
}

fn default_min_step() -> f64 {
    1e-9
}

fn default_max_iterations() -> usize {
    5000
}

fn default_gradient_epsilon() -> f64 {
    1e-7
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_tries: default_max_tries(),
            initial_step: default_initial_step(),
            min_step: default_min_step(),
            max_iterations: default_max_iterations(),
            gradient_epsilon: default_gradient_epsilon(),
            seed: None,
        }
    }
}

/// Move one random coordinate at a time to a uniform position in
/// `[left, right)` until the target is reached.
pub fn random_search<R: Rng + ?Sized>(
    function: &mut OpticsFunction,
    left: f64,
    right: f64,
    config: &OptimizerConfig,
    rng: &mut R,
) -> Option<Vec<f64>> {
    let dimension = function.dimension();
    if dimension == 0 || !(right > left) {
        return None;
    }
    let mut x = function.positions();
    for attempt in 0..config.max_tries {
        let k = rng.gen_range(0..dimension);
        x[k] = rng.gen_range(left..right);
        if function.is_reached(&x) {
            debug!("Target reached after {} tries", attempt + 1);
            return Some(x);
        }
    }
    None
}

/// Normalised gradient ascent of the score from `start`, kept inside
/// `[left, right]`. The step grows after an improvement and shrinks after a
/// failure. Returns `None` when it does not converge within the iteration
/// cap.
pub fn local_maximum(
    function: &mut OpticsFunction,
    start: &[f64],
    left: f64,
    right: f64,
    config: &OptimizerConfig,
) -> Option<Vec<f64>> {
    let mut x = start.to_vec();
    let mut score = function.score(&x);
    let mut step = config.initial_step * (right - left);
    if !score.is_finite() || !(step > 0.0) {
        return None;
    }

    for iteration in 0..config.max_iterations {
        let gradient = function.gradient(&x, config.gradient_epsilon);
        let norm = gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Some(x);
        }
        if !norm.is_finite() {
            return None;
        }

        let candidate: Vec<f64> = x
            .iter()
            .zip(&gradient)
            .map(|(xi, gi)| (xi + step * gi / norm).clamp(left, right))
            .collect();
        let candidate_score = function.score(&candidate);
        if candidate_score > score {
            x = candidate;
            score = candidate_score;
            step *= 1.5;
        } else {
            step *= 0.5;
        }

        if step < config.min_step {
            debug!("Local maximum {:.6} after {} iterations", score, iteration + 1);
            return Some(x);
        }
    }
    None
}

impl OpticsBench {
    /// Search element positions that produce the target beam.
    ///
    /// Uses the configured seed, or entropy when there is none. Returns
    /// false, leaving the bench untouched, when nothing can move or the
    /// target was not reached.
    pub fn magic_waist(&mut self) -> bool {
        let mut rng = match self.optimizer_config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.magic_waist_with_rng(&mut rng)
    }

    /// [`magic_waist`](Self::magic_waist) driven by `rng`.
    pub fn magic_waist_with_rng<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let config = self.optimizer_config.clone();
        let (left, right) = (self.left_boundary, self.right_boundary);
        let mut function = OpticsFunction::from_bench(self);
        if function.dimension() == 0 || !(right > left) {
            return false;
        }

        let found = random_search(&mut function, left, right, &config, rng);
        let start = found.clone().unwrap_or_else(|| function.positions());
        let refined = local_maximum(&mut function, &start, left, right, &config);

        let Some(candidate) = found else {
            info!("Target not reached after {} tries", config.max_tries);
            return false;
        };
        let positions = match refined {
            Some(refined) if function.is_reached(&refined) => refined,
            _ => candidate,
        };
        let free = function.free().to_vec();
        self.apply_positions(&free, &positions);
        true
    }

    /// Climb to the nearest maximum of the target score from the current
    /// positions. Returns false, leaving the bench untouched, when nothing
    /// can move or the ascent does not converge.
    pub fn local_optimum(&mut self) -> bool {
        let config = self.optimizer_config.clone();
        let (left, right) = (self.left_boundary, self.right_boundary);
        let mut function = OpticsFunction::from_bench(self);
        if function.dimension() == 0 || !(right > left) {
            return false;
        }
        let start = function.positions();
        let Some(positions) = local_maximum(&mut function, &start, left, right, &config) else {
            return false;
        };
        let free = function.free().to_vec();
        self.apply_positions(&free, &positions);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam::{Beam, TargetBeam};
    use crate::optics::Optics;
    use approx::assert_abs_diff_eq;

    /// A bench with one lens whose output at `position` becomes the target.
    fn bench_with_target(position: f64) -> OpticsBench {
        let mut bench = OpticsBench::new();
        let index = bench.add_optics(Optics::lens(0.1, position)).unwrap();
        let target = bench.beam(index).clone();
        bench.set_target_beam(TargetBeam::new(target));
        bench
    }

    fn overlap(bench: &OpticsBench) -> f64 {
        Beam::overlap(bench.beam(bench.len() - 1), &bench.target().beam, 0.0)
    }

    #[test]
    fn test_config_defaults_from_empty_document() {
        let config: OptimizerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, OptimizerConfig::default());
        assert_eq!(config.max_tries, 500_000);
    }

    #[test]
    fn test_magic_waist_finds_reachable_target() {
        let mut bench = bench_with_target(0.3);
        bench.set_optics_position(1, 0.1, true);
        assert!(overlap(&bench) < 0.98);

        let mut rng = StdRng::seed_from_u64(7);
        assert!(bench.magic_waist_with_rng(&mut rng));
        assert!(overlap(&bench) > 0.98);
    }

    #[test]
    fn test_magic_waist_without_free_elements() {
        let mut bench = bench_with_target(0.3);
        bench.set_absolute_lock(1, true);
        bench.set_optics_position(1, 0.1, false);
        let before = bench.optics(1).position();
        assert!(!bench.magic_waist());
        assert_eq!(bench.optics(1).position(), before);
    }

    #[test]
    fn test_magic_waist_exhausted_leaves_bench() {
        let mut bench = bench_with_target(0.3);
        bench.set_optics_position(1, 0.1, true);
        bench.set_optimizer_config(OptimizerConfig {
            max_tries: 3,
            seed: Some(1),
            ..OptimizerConfig::default()
        });
        // Narrow window far from the solution.
        bench.set_left_boundary(0.0);
        bench.set_right_boundary(0.05);
        assert!(!bench.magic_waist());
        assert_eq!(bench.optics(1).position(), 0.1);
    }

    #[test]
    fn test_local_optimum_climbs_to_target() {
        let mut bench = bench_with_target(0.3);
        bench.set_optics_position(1, 0.29, true);
        let before = overlap(&bench);
        assert!(bench.local_optimum());
        assert!(overlap(&bench) >= before);
        assert_abs_diff_eq!(bench.optics(1).position(), 0.3, epsilon = 1e-4);
    }
}
