//! Optical resonators built from a subset of bench elements.
//!
//! A cavity is described unfolded along the bench axis: its members are
//! taken in axial order and the last member closes the loop back onto the
//! first one. The round-trip matrix is referenced to the plane just after
//! the first member, so that for members `e_1 … e_n` separated by gaps
//! `g_1 … g_{n−1}`:
//!
//! $$M = e_n \cdot F(g_{n-1}) \cdots e_2 \cdot F(g_1)$$
//!
//! The cavity is stable when the eigen beam of `M` exists.

use log::{debug, warn};

use crate::beam::Beam;
use crate::lock::find;
use crate::optics::{AbcdMatrix, Optics, OpticsId};

#[derive(Debug, Clone, PartialEq)]
pub struct Cavity {
    members: Vec<OpticsId>,
    ring: bool,
    /// Members in bench order, as of the last `compute_matrix`.
    ordered: Vec<OpticsId>,
    matrix: AbcdMatrix,
}

impl Default for Cavity {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            ring: true,
            ordered: Vec::new(),
            matrix: AbcdMatrix::identity(),
        }
    }
}

impl Cavity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self) -> &[OpticsId] {
        &self.members
    }

    pub fn contains(&self, id: OpticsId) -> bool {
        self.members.contains(&id)
    }

    pub fn is_ring(&self) -> bool {
        self.ring
    }

    pub fn set_ring(&mut self, ring: bool) {
        self.ring = ring;
    }

    /// Add an element. Sources and elements already present are rejected.
    pub fn add_optics(&mut self, optics: &Optics) -> bool {
        if !optics.is_abcd() || self.contains(optics.id()) {
            return false;
        }
        self.members.push(optics.id());
        true
    }

    pub fn remove_optics(&mut self, id: OpticsId) -> bool {
        let before = self.members.len();
        self.members.retain(|&m| m != id);
        self.members.len() != before
    }

    /// Round-trip matrix as of the last `compute_matrix`.
    pub fn matrix(&self) -> AbcdMatrix {
        self.matrix
    }

    /// Rebuild the round-trip matrix from the current element layout.
    ///
    /// Members that no longer exist on the bench are dropped.
    pub fn compute_matrix(&mut self, optics: &[Optics]) {
        self.members.retain(|&id| find(optics, id).is_some());
        let mut indices: Vec<usize> = self
            .members
            .iter()
            .filter_map(|&id| find(optics, id))
            .collect();
        indices.sort_unstable();
        self.ordered = indices.iter().map(|&i| optics[i].id()).collect();

        let mut matrix = AbcdMatrix::identity();
        for pair in indices.windows(2) {
            let (previous, next) = (&optics[pair[0]], &optics[pair[1]]);
            let gap = next.position() - previous.end_position();
            matrix = next.kind().matrix(next.width()) * AbcdMatrix::free_space(gap) * matrix;
        }
        self.matrix = matrix;
        debug!(
            "Cavity matrix over {} elements: A={:.4} B={:.4} C={:.4} D={:.4}",
            self.ordered.len(),
            matrix.a(),
            matrix.b(),
            matrix.c(),
            matrix.d()
        );
    }

    pub fn is_stable(&self) -> bool {
        let criterion_1 = self.matrix.stability_criterion_1();
        let criterion_2 = self.matrix.stability_criterion_2();
        if criterion_1 != criterion_2 {
            warn!(
                "Cavity stability criteria disagree ({} vs {})",
                criterion_1, criterion_2
            );
        }
        criterion_1 && criterion_2
    }

    /// First member in bench order.
    pub fn first_member(&self) -> Option<OpticsId> {
        self.ordered.first().copied()
    }

    /// Self-consistent beam just after the first member, if any, in a
    /// medium of refractive index `medium_index`.
    pub fn eigen_mode(
        &self,
        optics: &[Optics],
        wavelength: f64,
        medium_index: f64,
    ) -> Option<Beam> {
        let first = find(optics, *self.ordered.first()?)?;
        let q = self.matrix.eigen_q()?;
        let z = optics[first].end_position();
        let mut beam = Beam::from_q(q, z, wavelength, medium_index, 1.0);
        beam.set_start(z);
        Some(beam)
    }

    /// Eigen beam as seen right after bench element `index`.
    ///
    /// Returns `None` when the cavity is unstable or `index` lies outside the
    /// cavity. The linear cavity range includes its last member.
    pub fn eigen_beam(
        &self,
        optics: &[Optics],
        wavelength: f64,
        medium_index: f64,
        index: usize,
    ) -> Option<Beam> {
        if !self.is_stable() {
            return None;
        }
        let first = find(optics, *self.ordered.first()?)?;
        let last = find(optics, *self.ordered.last()?)?;
        let inside = if self.ring {
            index < last
        } else {
            index <= last
        };
        if index < first || !inside {
            return None;
        }

        let mut beam = self.eigen_mode(optics, wavelength, medium_index)?;
        for &id in &self.ordered {
            let i = find(optics, id)?;
            if i > first && i <= index {
                beam = optics[i].image(&beam);
            }
        }
        Some(beam)
    }
}
