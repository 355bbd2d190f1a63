//! 2×2 ray-transfer matrices.

use std::ops::Mul;

use nalgebra::Matrix2;
use num_complex::Complex64;

/// A paraxial ray-transfer (ABCD) matrix.
///
/// Matrices compose right to left: `second * first` is the matrix of a beam
/// travelling through `first` and then through `second`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbcdMatrix(pub Matrix2<f64>);

impl AbcdMatrix {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self(Matrix2::new(a, b, c, d))
    }

    pub fn identity() -> Self {
        Self(Matrix2::identity())
    }

    /// Propagation over `distance` in a homogeneous medium.
    pub fn free_space(distance: f64) -> Self {
        Self::new(1.0, distance, 0.0, 1.0)
    }

    pub fn a(&self) -> f64 {
        self.0[(0, 0)]
    }

    pub fn b(&self) -> f64 {
        self.0[(0, 1)]
    }

    pub fn c(&self) -> f64 {
        self.0[(1, 0)]
    }

    pub fn d(&self) -> f64 {
        self.0[(1, 1)]
    }

    pub fn determinant(&self) -> f64 {
        self.0.determinant()
    }

    /// Image of a complex beam parameter, `(A q + B) / (C q + D)`.
    pub fn transform(&self, q: Complex64) -> Complex64 {
        (q * self.a() + self.b()) / (q * self.c() + self.d())
    }

    /// Antecedent of a complex beam parameter, `(B − D q') / (C q' − A)`.
    pub fn inverse_transform(&self, q: Complex64) -> Complex64 {
        (-q * self.d() + self.b()) / (q * self.c() - self.a())
    }

    /// First stability criterion: `|(A + D) / 2| < 1`.
    pub fn stability_criterion_1(&self) -> bool {
        ((self.a() + self.d()) / 2.0).abs() < 1.0
    }

    /// Second stability criterion: `(D − A)² + 4 C B < 0`.
    pub fn stability_criterion_2(&self) -> bool {
        self.discriminant() < 0.0
    }

    /// Fixed point of [`transform`](Self::transform) with positive imaginary
    /// part, or `None` when no such beam exists.
    pub fn eigen_q(&self) -> Option<Complex64> {
        let discriminant = self.discriminant();
        if discriminant >= 0.0 || self.c() == 0.0 {
            return None;
        }
        let re = -(self.d() - self.a()) / (2.0 * self.c());
        let im = (-discriminant).sqrt() / (2.0 * self.c());
        Some(Complex64::new(re, im.abs()))
    }

    fn discriminant(&self) -> f64 {
        (self.d() - self.a()).powi(2) + 4.0 * self.c() * self.b()
    }
}

impl Default for AbcdMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for AbcdMatrix {
    type Output = AbcdMatrix;

    fn mul(self, rhs: AbcdMatrix) -> AbcdMatrix {
        AbcdMatrix(self.0 * rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_inverse() {
        let m = AbcdMatrix::new(0.8, 0.03, -4.0, 1.1);
        let q = Complex64::new(-0.02, 0.03);
        let back = m.inverse_transform(m.transform(q));
        assert_relative_eq!(back.re, q.re, epsilon = 1e-14);
        assert_relative_eq!(back.im, q.im, epsilon = 1e-14);
    }

    #[test]
    fn test_composition_order() {
        let lens = AbcdMatrix::new(1.0, 0.0, -10.0, 1.0);
        let space = AbcdMatrix::free_space(0.1);
        let m = space * lens;
        assert_relative_eq!(m.a(), 0.0, epsilon = 1e-15);
        assert_relative_eq!(m.b(), 0.1);
        assert_relative_eq!(m.c(), -10.0);
        assert_relative_eq!(m.determinant(), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_eigen_q_is_fixed_point() {
        // Half of a symmetric two-mirror resonator, R = 0.1, L = 0.05.
        let mirror = AbcdMatrix::new(1.0, 0.0, -20.0, 1.0);
        let space = AbcdMatrix::free_space(0.05);
        let m = mirror * space * mirror * space;
        assert!(m.stability_criterion_1());
        assert!(m.stability_criterion_2());

        let q = m.eigen_q().unwrap();
        assert!(q.im > 0.0);
        let image = m.transform(q);
        assert_relative_eq!(image.re, q.re, epsilon = 1e-12);
        assert_relative_eq!(image.im, q.im, epsilon = 1e-12);
    }

    #[test]
    fn test_unstable_has_no_eigen_q() {
        let m = AbcdMatrix::free_space(0.2);
        assert!(!m.stability_criterion_2());
        assert!(m.eigen_q().is_none());
    }
}
