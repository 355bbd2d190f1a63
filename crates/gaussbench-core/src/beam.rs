//! Gaussian beam value type.
//!
//! A [`Beam`] describes a (possibly elliptical) Gaussian beam on one segment
//! of the bench. It stores the waist radius and waist position for each
//! transverse direction, the wavelength, the refractive index of the medium
//! and the beam quality factor $M^2$. Everything else is derived:
//!
//! - Rayleigh range $z_R = n \pi w_0^2 / (\lambda M^2)$
//! - Divergence $\theta = \arctan(\lambda M^2 / (n \pi w_0))$
//! - Complex beam parameter $q(z) = (z - z_w) + i z_R$
//!
//! Degenerate beams (zero waist or zero wavelength) are valid values: their
//! divergence and Rayleigh range are zero.

use std::f64::consts::{FRAC_PI_2, PI};

use num_complex::Complex64;

use crate::types::{sqr, Orientation, Point};

/// State of a Gaussian beam on one segment of the bench.
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    /// 1/e² waist radius per direction (m), `[horizontal, vertical]`.
    waist: [f64; 2],
    /// Axial waist position per direction (m).
    waist_position: [f64; 2],
    wavelength: f64,
    index: f64,
    m2: f64,
    /// Either `Spherical` or `Ellipsoidal`.
    orientation: Orientation,
    /// Point of the bench plane corresponding to the axial coordinate `start`.
    origin: Point,
    /// Propagation direction in the bench plane (rad).
    angle: f64,
    start: f64,
    stop: f64,
}

impl Default for Beam {
    fn default() -> Self {
        Self {
            waist: [0.0; 2],
            waist_position: [0.0; 2],
            wavelength: 0.0,
            index: 1.0,
            m2: 1.0,
            orientation: Orientation::Spherical,
            origin: Point::default(),
            angle: 0.0,
            start: f64::NEG_INFINITY,
            stop: f64::INFINITY,
        }
    }
}

impl Beam {
    /// Create a spherical beam.
    ///
    /// # Arguments
    /// * `waist` - 1/e² waist radius (m).
    /// * `waist_position` - Axial position of the waist (m).
    /// * `wavelength` - Vacuum wavelength (m).
    /// * `index` - Refractive index of the propagation medium.
    /// * `m2` - Beam quality factor (≥ 1).
    pub fn new(waist: f64, waist_position: f64, wavelength: f64, index: f64, m2: f64) -> Self {
        Self {
            waist: [waist.max(0.0); 2],
            waist_position: [waist_position; 2],
            wavelength,
            index,
            m2,
            ..Default::default()
        }
    }

    /// Create a beam with independent horizontal and vertical parameters.
    pub fn ellipsoidal(
        waist: [f64; 2],
        waist_position: [f64; 2],
        wavelength: f64,
        index: f64,
        m2: f64,
    ) -> Self {
        let mut beam = Self {
            waist: [waist[0].max(0.0), waist[1].max(0.0)],
            waist_position,
            wavelength,
            index,
            m2,
            ..Default::default()
        };
        beam.update_orientation();
        beam
    }

    /// Create a spherical beam whose complex parameter at `z` is `q`.
    pub fn from_q(q: Complex64, z: f64, wavelength: f64, index: f64, m2: f64) -> Self {
        let mut beam = Self::new(0.0, 0.0, wavelength, index, m2);
        beam.set_q(q, z, Orientation::Spherical);
        beam
    }

    /// A beam carrying only a wavelength, used to seed propagation.
    pub fn wavelength_only(wavelength: f64) -> Self {
        Self {
            wavelength,
            ..Default::default()
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn is_spherical(&self) -> bool {
        self.orientation == Orientation::Spherical
    }

    pub fn waist(&self, orientation: Orientation) -> f64 {
        self.waist[orientation.slot()]
    }

    /// Set the waist radius. Negative values are ignored.
    pub fn set_waist(&mut self, waist: f64, orientation: Orientation) {
        if waist < 0.0 {
            return;
        }
        for &slot in orientation.slots() {
            self.waist[slot] = waist;
        }
        self.update_orientation();
    }

    pub fn waist_position(&self, orientation: Orientation) -> f64 {
        self.waist_position[orientation.slot()]
    }

    pub fn set_waist_position(&mut self, waist_position: f64, orientation: Orientation) {
        for &slot in orientation.slots() {
            self.waist_position[slot] = waist_position;
        }
        self.update_orientation();
    }

    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    pub fn set_wavelength(&mut self, wavelength: f64) {
        self.wavelength = wavelength;
    }

    pub fn index(&self) -> f64 {
        self.index
    }

    pub fn set_index(&mut self, index: f64) {
        if index > 0.0 {
            self.index = index;
        }
    }

    pub fn m2(&self) -> f64 {
        self.m2
    }

    pub fn set_m2(&mut self, m2: f64) {
        if m2 >= 1.0 {
            self.m2 = m2;
        }
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Point) {
        self.origin = origin;
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f64) {
        self.angle = angle;
    }

    /// Axial coordinate where this beam segment begins.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Axial coordinate where this beam segment ends.
    pub fn stop(&self) -> f64 {
        self.stop
    }

    pub fn set_start(&mut self, start: f64) {
        self.start = start;
    }

    pub fn set_stop(&mut self, stop: f64) {
        self.stop = stop;
    }

    /// Rayleigh range $z_R = n \pi w_0^2 / (\lambda M^2)$ (m).
    pub fn rayleigh(&self, orientation: Orientation) -> f64 {
        if self.wavelength == 0.0 {
            return 0.0;
        }
        self.index * PI * sqr(self.waist(orientation)) / (self.wavelength * self.m2)
    }

    /// Set the waist from a Rayleigh range. Non-positive values are ignored.
    pub fn set_rayleigh(&mut self, rayleigh: f64, orientation: Orientation) {
        if rayleigh > 0.0 {
            let waist = (rayleigh * self.wavelength * self.m2 / (self.index * PI)).sqrt();
            self.set_waist(waist, orientation);
        }
    }

    /// Far-field half-angle divergence (rad).
    pub fn divergence(&self, orientation: Orientation) -> f64 {
        let waist = self.waist(orientation);
        if waist == 0.0 {
            return 0.0;
        }
        (self.wavelength * self.m2 / (self.index * PI * waist)).atan()
    }

    /// Set the waist from a divergence. Values outside (0, π/2) are ignored.
    pub fn set_divergence(&mut self, divergence: f64, orientation: Orientation) {
        if divergence > 0.0 && divergence < FRAC_PI_2 {
            let waist = self.wavelength * self.m2 / (self.index * PI * divergence.tan());
            self.set_waist(waist, orientation);
        }
    }

    /// Beam radius at 1/e² intensity at position `z`.
    pub fn radius(&self, z: f64, orientation: Orientation) -> f64 {
        let waist = self.waist(orientation);
        if waist == 0.0 {
            return 0.0;
        }
        waist * (1.0 + sqr(self.zred(z, orientation))).sqrt()
    }

    /// First derivative of the radius with respect to `z`.
    pub fn radius_derivative(&self, z: f64, orientation: Orientation) -> f64 {
        let rayleigh = self.rayleigh(orientation);
        if rayleigh == 0.0 {
            return 0.0;
        }
        let u = self.zred(z, orientation);
        self.waist(orientation) * u / (rayleigh * (1.0 + u * u).sqrt())
    }

    /// Second derivative of the radius with respect to `z`.
    pub fn radius_second_derivative(&self, z: f64, orientation: Orientation) -> f64 {
        let rayleigh = self.rayleigh(orientation);
        if rayleigh == 0.0 {
            return 0.0;
        }
        let u = self.zred(z, orientation);
        self.waist(orientation) / sqr(rayleigh) / (1.0 + u * u).powf(1.5)
    }

    /// Wavefront radius of curvature at `z` (infinite at the waist).
    pub fn curvature(&self, z: f64, orientation: Orientation) -> f64 {
        let dz = z - self.waist_position(orientation);
        if dz == 0.0 {
            return f64::INFINITY;
        }
        dz + sqr(self.rayleigh(orientation)) / dz
    }

    /// Gouy phase at `z` (rad).
    pub fn gouy_phase(&self, z: f64, orientation: Orientation) -> f64 {
        self.zred(z, orientation).atan()
    }

    /// Complex beam parameter $q(z) = (z - z_w) + i z_R$.
    pub fn q(&self, z: f64, orientation: Orientation) -> Complex64 {
        Complex64::new(z - self.waist_position(orientation), self.rayleigh(orientation))
    }

    /// Set waist and waist position so that `self.q(z) == q`.
    pub fn set_q(&mut self, q: Complex64, z: f64, orientation: Orientation) {
        let rayleigh = q.im.max(0.0);
        let waist = (rayleigh * self.wavelength * self.m2 / (self.index * PI)).sqrt();
        for &slot in orientation.slots() {
            self.waist[slot] = waist;
            self.waist_position[slot] = z - q.re;
        }
        self.update_orientation();
    }

    /// Point of the bench plane at axial coordinate `z` along this beam.
    pub fn point_at(&self, z: f64) -> Point {
        let distance = if self.start.is_finite() { z - self.start } else { 0.0 };
        Point::new(
            self.origin.x + distance * self.angle.cos(),
            self.origin.y + distance * self.angle.sin(),
        )
    }

    /// Intensity overlap between two coaxial beams, evaluated at `z`.
    ///
    /// $\eta = 4\rho / ((1+\rho)^2 + (z_1 - z_2 \rho)^2)$ with
    /// $\rho = (w_1(z)/w_2(z))^2$ and $z_i$ the reduced distance to each waist.
    /// The result does not depend on `z` when both beams share a wavelength.
    /// Elliptical beams combine both directions with a geometric mean.
    pub fn overlap(beam1: &Beam, beam2: &Beam, z: f64) -> f64 {
        if beam1.is_spherical() && beam2.is_spherical() {
            return Self::directional_overlap(beam1, beam2, z, Orientation::Spherical);
        }
        let horizontal = Self::directional_overlap(beam1, beam2, z, Orientation::Horizontal);
        let vertical = Self::directional_overlap(beam1, beam2, z, Orientation::Vertical);
        (horizontal * vertical).sqrt()
    }

    fn directional_overlap(beam1: &Beam, beam2: &Beam, z: f64, orientation: Orientation) -> f64 {
        let rho = sqr(beam1.radius(z, orientation) / beam2.radius(z, orientation));
        let zred1 = beam1.zred(z, orientation);
        let zred2 = beam2.zred(z, orientation);
        4.0 * rho / (sqr(1.0 + rho) + sqr(zred1 - zred2 * rho))
    }

    /// Reduced distance $(z - z_w)/z_R$ to the waist.
    fn zred(&self, z: f64, orientation: Orientation) -> f64 {
        let dz = z - self.waist_position(orientation);
        if dz == 0.0 {
            return 0.0;
        }
        dz / self.rayleigh(orientation)
    }

    fn update_orientation(&mut self) {
        self.orientation = if self.waist[0] == self.waist[1]
            && self.waist_position[0] == self.waist_position[1]
        {
            Orientation::Spherical
        } else {
            Orientation::Ellipsoidal
        };
    }
}

/// A beam to aim for, with the criterion that decides when it is reached.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetBeam {
    pub beam: Beam,
    /// True to judge on overlap, false to judge on waist and position.
    pub overlap_criterion: bool,
    /// Minimum overlap when `overlap_criterion` is set.
    pub min_overlap: f64,
    /// Relative waist tolerance.
    pub waist_tolerance: f64,
    /// Waist position tolerance, in units of the target Rayleigh range.
    pub position_tolerance: f64,
}

impl TargetBeam {
    pub fn new(beam: Beam) -> Self {
        Self {
            beam,
            overlap_criterion: true,
            min_overlap: 0.98,
            waist_tolerance: 0.05,
            position_tolerance: 0.1,
        }
    }

    /// Whether `beam` satisfies the target criterion.
    pub fn is_reached(&self, beam: &Beam) -> bool {
        if self.overlap_criterion {
            return Beam::overlap(beam, &self.beam, 0.0) > self.min_overlap;
        }
        Orientation::DIRECTIONS.iter().all(|&direction| {
            let waist = self.beam.waist(direction);
            let rayleigh = self.beam.rayleigh(direction);
            (beam.waist(direction) - waist).abs() < self.waist_tolerance * waist
                && (beam.waist_position(direction) - self.beam.waist_position(direction)).abs()
                    < self.position_tolerance * rayleigh
        })
    }

    /// Scalar figure of merit, larger is better.
    ///
    /// With the overlap criterion this is the overlap itself; otherwise it is
    /// minus the squared waist and position errors, each scaled by its
    /// tolerance.
    pub fn score(&self, beam: &Beam) -> f64 {
        if self.overlap_criterion {
            return Beam::overlap(beam, &self.beam, 0.0);
        }
        -Orientation::DIRECTIONS
            .iter()
            .map(|&direction| {
                let waist = self.beam.waist(direction);
                let rayleigh = self.beam.rayleigh(direction);
                sqr((beam.waist(direction) - waist) / (self.waist_tolerance * waist))
                    + sqr(
                        (beam.waist_position(direction) - self.beam.waist_position(direction))
                            / (self.position_tolerance * rayleigh),
                    )
            })
            .sum::<f64>()
    }
}
