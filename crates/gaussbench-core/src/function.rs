//! The output beam as a function of the free element positions.
//!
//! [`OpticsFunction`] works on a private copy of the bench elements, so it
//! can be evaluated many times without touching the bench. Its coordinates
//! are the positions of the lock-tree roots that may move: trees that are
//! neither absolutely locked nor rooted at the source. Moving a coordinate
//! carries the whole tree along.

use crate::beam::{Beam, TargetBeam};
use crate::bench::OpticsBench;
use crate::lock::{self, find};
use crate::optics::{sort_by_position, Optics, OpticsId};

/// Propagate a fresh beam through `optics` and return the last image.
pub(crate) fn propagate(optics: &[Optics], wavelength: f64) -> Beam {
    optics
        .iter()
        .fold(Beam::wavelength_only(wavelength), |beam, o| o.image(&beam))
}

#[derive(Debug, Clone)]
pub struct OpticsFunction {
    optics: Vec<Optics>,
    wavelength: f64,
    free: Vec<OpticsId>,
    target: TargetBeam,
}

impl OpticsFunction {
    pub fn new(optics: &[Optics], wavelength: f64, target: TargetBeam) -> Self {
        let free = optics
            .iter()
            .skip(1)
            .filter(|o| o.lock_parent().is_none() && !o.absolute_lock())
            .map(|o| o.id())
            .collect();
        Self {
            optics: optics.to_vec(),
            wavelength,
            free,
            target,
        }
    }

    pub fn from_bench(bench: &OpticsBench) -> Self {
        Self::new(bench.elements(), bench.wavelength(), bench.target().clone())
    }

    /// Ids of the elements behind each coordinate.
    pub fn free(&self) -> &[OpticsId] {
        &self.free
    }

    pub fn dimension(&self) -> usize {
        self.free.len()
    }

    pub fn target(&self) -> &TargetBeam {
        &self.target
    }

    /// Current coordinates.
    pub fn positions(&self) -> Vec<f64> {
        self.free
            .iter()
            .filter_map(|&id| find(&self.optics, id))
            .map(|i| self.optics[i].position())
            .collect()
    }

    /// Move the free trees to the coordinates `x`.
    pub fn arrange(&mut self, x: &[f64]) {
        for (&id, &position) in self.free.iter().zip(x) {
            lock::move_tree(&mut self.optics, id, position, false);
        }
        sort_by_position(&mut self.optics);
    }

    /// Elements as last arranged.
    pub fn optics(&self) -> &[Optics] {
        &self.optics
    }

    /// Output beam for the coordinates `x`.
    pub fn beam(&mut self, x: &[f64]) -> Beam {
        self.arrange(x);
        propagate(&self.optics, self.wavelength)
    }

    /// Figure of merit of the output beam, larger is better.
    pub fn score(&mut self, x: &[f64]) -> f64 {
        let beam = self.beam(x);
        self.target.score(&beam)
    }

    pub fn is_reached(&mut self, x: &[f64]) -> bool {
        let beam = self.beam(x);
        self.target.is_reached(&beam)
    }

    /// Central difference gradient of [`score`](Self::score).
    pub fn gradient(&mut self, x: &[f64], epsilon: f64) -> Vec<f64> {
        let mut probe = x.to_vec();
        (0..x.len())
            .map(|k| {
                probe[k] = x[k] + epsilon;
                let forward = self.score(&probe);
                probe[k] = x[k] - epsilon;
                let backward = self.score(&probe);
                probe[k] = x[k];
                (forward - backward) / (2.0 * epsilon)
            })
            .collect()
    }
}
