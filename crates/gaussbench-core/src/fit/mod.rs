//! Gaussian beam fit on measured beam sizes.
//!
//! A [`Fit`] holds a series of `(position, value)` samples. Values are
//! converted to 1/e² radii according to the [`FitDataType`], then fitted in
//! two stages:
//!
//! 1. A straight line through the radii, read as the far-field asymptote of
//!    a Gaussian beam. This gives a first waist and waist position.
//! 2. A Levenberg-Marquardt refinement of `(w0, z_w)` minimising
//!    `Σ (w(z_i) - r_i)²`, seeded by stage 1 and, when the smallest sample
//!    is narrower than the stage 1 waist, by that sample too.
//!
//! Results are cached until the data changes or another wavelength is asked
//! for.

mod levenberg;
mod statistics;

pub use levenberg::{LevenbergMarquardt, LmResult};
pub use statistics::LinearRegression;

use std::cell::RefCell;
use std::f64::consts::PI;

use log::debug;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::beam::Beam;
use crate::types::{sqr, Orientation};

/// How a measured value relates to the 1/e² radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitDataType {
    /// 1/e² radius.
    Radius,
    /// 1/e² diameter.
    #[default]
    Diameter,
    /// Standard deviation of the intensity profile.
    StandardDeviation,
    /// Full width at half maximum of the intensity.
    Fwhm,
    /// Half width at half maximum of the intensity.
    Hwhm,
}

impl FitDataType {
    /// Convert a measured `value` to a 1/e² radius.
    pub fn to_radius(self, value: f64) -> f64 {
        match self {
            FitDataType::Radius => value,
            FitDataType::Diameter => value / 2.0,
            FitDataType::StandardDeviation => 2.0 * value,
            FitDataType::Fwhm => value / (2.0 * 2f64.ln()).sqrt(),
            FitDataType::Hwhm => value * (2.0 / 2f64.ln()).sqrt(),
        }
    }
}

/// Outcome of a fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub beam: Beam,
    /// Squared correlation of the linear stage.
    pub rho2: f64,
    /// Euclidean norm of the radius residuals of the returned beam (m).
    pub residue: f64,
}

/// A named series of beam size measurements.
#[derive(Debug, Clone)]
pub struct Fit {
    name: String,
    data_type: FitDataType,
    /// Display colour as `0xRRGGBB`.
    color: u32,
    orientation: Orientation,
    positions: Vec<f64>,
    values: Vec<f64>,
    /// Wavelength of the last computation and its result.
    cache: RefCell<Option<(f64, Option<FitResult>)>>,
}

impl Fit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: FitDataType::default(),
            color: 0,
            orientation: Orientation::Spherical,
            positions: Vec::new(),
            values: Vec::new(),
            cache: RefCell::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn data_type(&self) -> FitDataType {
        self.data_type
    }

    pub fn set_data_type(&mut self, data_type: FitDataType) {
        self.data_type = data_type;
        self.invalidate();
    }

    pub fn color(&self) -> u32 {
        self.color
    }

    pub fn set_color(&mut self, color: u32) {
        self.color = color;
    }

    /// Transverse direction the samples were measured in.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, index: usize) -> f64 {
        self.positions[index]
    }

    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    /// Sample `index` converted to a 1/e² radius.
    pub fn radius(&self, index: usize) -> f64 {
        self.data_type.to_radius(self.values[index])
    }

    /// All samples as `(position, value)` pairs.
    pub fn data(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.positions.iter().copied().zip(self.values.iter().copied())
    }

    pub fn add_data(&mut self, position: f64, value: f64) {
        self.positions.push(position);
        self.values.push(value);
        self.invalidate();
    }

    /// Overwrite sample `index`, growing the series with zero samples if
    /// needed.
    pub fn set_data(&mut self, index: usize, position: f64, value: f64) {
        if index >= self.positions.len() {
            self.positions.resize(index + 1, 0.0);
            self.values.resize(index + 1, 0.0);
        }
        self.positions[index] = position;
        self.values[index] = value;
        self.invalidate();
    }

    pub fn remove_data(&mut self, index: usize) {
        if index < self.positions.len() {
            self.positions.remove(index);
            self.values.remove(index);
            self.invalidate();
        }
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.values.clear();
        self.invalidate();
    }

    fn invalidate(&mut self) {
        *self.cache.get_mut() = None;
    }

    /// Fit result at `wavelength`, or `None` with fewer than two usable
    /// samples.
    pub fn result(&self, wavelength: f64) -> Option<FitResult> {
        if let Some((cached, result)) = self.cache.borrow().as_ref() {
            if *cached == wavelength {
                return result.clone();
            }
        }
        let result = self.compute(wavelength);
        *self.cache.borrow_mut() = Some((wavelength, result.clone()));
        result
    }

    pub fn beam(&self, wavelength: f64) -> Option<Beam> {
        self.result(wavelength).map(|r| r.beam)
    }

    pub fn rho2(&self, wavelength: f64) -> Option<f64> {
        self.result(wavelength).map(|r| r.rho2)
    }

    pub fn residue(&self, wavelength: f64) -> Option<f64> {
        self.result(wavelength).map(|r| r.residue)
    }

    fn compute(&self, wavelength: f64) -> Option<FitResult> {
        if wavelength <= 0.0 {
            return None;
        }
        let (positions, radii): (Vec<f64>, Vec<f64>) = (0..self.len())
            .map(|i| (self.positions[i], self.radius(i)))
            .filter(|&(_, r)| r > 0.0)
            .unzip();
        let line = LinearRegression::fit(&positions, &radii)?;
        debug!("Fitting {} on {} samples", self.name, positions.len());

        // Read the line as the beam asymptote around the mean position.
        let z = line.mean_x;
        let fz = line.m * z + line.p;
        let fpz = line.m;
        let alpha = PI * fz * fpz / wavelength;
        let waist = fz / (1.0 + sqr(alpha)).sqrt();
        let rayleigh = PI * sqr(waist) / wavelength;
        let linear = Vector2::new(waist, z - rayleigh * alpha);

        let mut seeds = vec![linear];
        let narrowest = positions
            .iter()
            .zip(&radii)
            .min_by(|a, b| a.1.total_cmp(b.1));
        if let Some((&z, &r)) = narrowest {
            if r < waist {
                seeds.push(Vector2::new(r, z));
            }
        }

        let solver = LevenbergMarquardt::default();
        let model = |p: &Vector2<f64>| radius_model(p, &positions, &radii, wavelength);
        let best = seeds
            .iter()
            .filter_map(|&seed| solver.minimize(seed, &model))
            .filter(|r| r.params.iter().all(|v| v.is_finite()) && r.residual_norm.is_finite())
            .min_by(|a, b| a.residual_norm.total_cmp(&b.residual_norm));

        let (params, residue) = match best {
            Some(result) => (result.params, result.residual_norm),
            None => {
                let residue = radius_model(&linear, &positions, &radii, wavelength)
                    .map(|(r, _)| r.iter().map(|v| v * v).sum::<f64>().sqrt())
                    .unwrap_or(f64::NAN);
                (linear, residue)
            }
        };

        Some(FitResult {
            beam: Beam::new(params[0], params[1], wavelength, 1.0, 1.0),
            rho2: line.rho2,
            residue,
        })
    }
}

/// Residuals `w(z_i) - r_i` of a beam with waist `p[0]` at `p[1]`, with
/// their gradients.
fn radius_model(
    p: &Vector2<f64>,
    positions: &[f64],
    radii: &[f64],
    wavelength: f64,
) -> Option<levenberg::Evaluation> {
    let (waist, waist_position) = (p[0], p[1]);
    if !(waist > 0.0) {
        return None;
    }
    let rayleigh = PI * sqr(waist) / wavelength;
    let mut residuals = Vec::with_capacity(positions.len());
    let mut jacobian = Vec::with_capacity(positions.len());
    for (&z, &r) in positions.iter().zip(radii) {
        let u = (z - waist_position) / rayleigh;
        let root = (1.0 + sqr(u)).sqrt();
        residuals.push(waist * root - r);
        jacobian.push(Vector2::new(
            (1.0 - sqr(u)) / root,
            -waist * u / (rayleigh * root),
        ));
    }
    Some((residuals, jacobian))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const LAMBDA: f64 = 1064e-9;

    fn sampled(from: f64, to: f64, count: usize) -> Fit {
        let beam = Beam::new(100e-6, 0.2, LAMBDA, 1.0, 1.0);
        let mut fit = Fit::new("scan");
        fit.set_data_type(FitDataType::Radius);
        for i in 0..count {
            let z = from + (to - from) * i as f64 / (count - 1) as f64;
            fit.add_data(z, beam.radius(z, Orientation::Spherical));
        }
        fit
    }

    #[test]
    fn test_far_field_samples_recover_beam() {
        let fit = sampled(0.25, 0.40, 8);
        let beam = fit.beam(LAMBDA).unwrap();
        assert_relative_eq!(beam.waist(Orientation::Spherical), 100e-6, max_relative = 1e-5);
        assert_relative_eq!(
            beam.waist_position(Orientation::Spherical),
            0.2,
            max_relative = 1e-5
        );
        assert!(fit.residue(LAMBDA).unwrap() < 1e-9);
        assert!(fit.rho2(LAMBDA).unwrap() > 0.99);
    }

    #[test]
    fn test_samples_around_waist_recover_beam() {
        let fit = sampled(0.1, 0.3, 11);
        let beam = fit.beam(LAMBDA).unwrap();
        assert_relative_eq!(beam.waist(Orientation::Spherical), 100e-6, max_relative = 1e-5);
        assert_relative_eq!(
            beam.waist_position(Orientation::Spherical),
            0.2,
            max_relative = 1e-5
        );
    }

    #[test]
    fn test_refit_of_fitted_beam_is_stable() {
        let fit = sampled(0.25, 0.40, 6);
        let first = fit.beam(LAMBDA).unwrap();
        let mut again = Fit::new("again");
        again.set_data_type(FitDataType::Radius);
        for (z, _) in fit.data() {
            again.add_data(z, first.radius(z, Orientation::Spherical));
        }
        let second = again.beam(LAMBDA).unwrap();
        assert_relative_eq!(
            second.waist(Orientation::Spherical),
            first.waist(Orientation::Spherical),
            max_relative = 1e-5
        );
    }

    #[test]
    fn test_data_type_conversions() {
        assert_eq!(FitDataType::Radius.to_radius(2.0), 2.0);
        assert_eq!(FitDataType::Diameter.to_radius(2.0), 1.0);
        assert_eq!(FitDataType::StandardDeviation.to_radius(2.0), 4.0);
        // FWHM of the intensity is sqrt(2 ln 2) times the 1/e² radius.
        let w = 1.0;
        assert_relative_eq!(FitDataType::Fwhm.to_radius(w * (2.0 * 2f64.ln()).sqrt()), w);
        assert_relative_eq!(FitDataType::Hwhm.to_radius(w * (2f64.ln() / 2.0).sqrt()), w);
        assert_eq!(Fit::new("f").data_type(), FitDataType::Diameter);
    }

    #[test]
    fn test_mutation_invalidates_cache() {
        // Diameters of a known beam, first read as radii.
        let beam = Beam::new(100e-6, 0.2, LAMBDA, 1.0, 1.0);
        let mut fit = Fit::new("diameters");
        fit.set_data_type(FitDataType::Radius);
        for i in 0..6 {
            let z = 0.25 + 0.03 * i as f64;
            fit.add_data(z, 2.0 * beam.radius(z, Orientation::Spherical));
        }
        let before = fit.beam(LAMBDA).unwrap();
        assert!(before.waist(Orientation::Spherical) < 90e-6);

        fit.set_data_type(FitDataType::Diameter);
        let after = fit.beam(LAMBDA).unwrap();
        assert_relative_eq!(after.waist(Orientation::Spherical), 100e-6, max_relative = 1e-5);
        assert_relative_eq!(
            after.waist_position(Orientation::Spherical),
            0.2,
            max_relative = 1e-5
        );

        fit.set_data(10, 0.5, 0.0);
        assert_eq!(fit.len(), 11);
        fit.remove_data(10);
        assert_eq!(fit.len(), 6);
    }

    #[test]
    fn test_not_enough_samples() {
        let mut fit = Fit::new("few");
        assert!(fit.beam(LAMBDA).is_none());
        fit.add_data(0.1, 1e-3);
        fit.add_data(0.2, 0.0);
        fit.add_data(0.3, -1e-3);
        assert!(fit.beam(LAMBDA).is_none());
        fit.add_data(0.4, 2e-3);
        assert!(fit.beam(LAMBDA).is_some());
    }
}
