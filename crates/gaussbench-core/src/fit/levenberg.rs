//! Two-parameter Levenberg-Marquardt least squares.
//!
//! Minimises `Σ r_i(p)²` over `p ∈ ℝ²` given a model returning the residuals
//! and their gradients. The damping follows Marquardt's scaling: the normal
//! matrix diagonal is inflated by `(1 + λ)`, λ shrinking after accepted steps
//! and growing after rejected ones.

use nalgebra::{Matrix2, Vector2};

/// Solver settings.
#[derive(Debug, Clone, Copy)]
pub struct LevenbergMarquardt {
    pub max_iterations: usize,
    /// Relative parameter change below which the solve has converged.
    pub tolerance: f64,
    pub initial_lambda: f64,
    pub lambda_factor: f64,
    /// Damping above which the solve gives up improving.
    pub max_lambda: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-12,
            initial_lambda: 1e-3,
            lambda_factor: 10.0,
            max_lambda: 1e16,
        }
    }
}

/// Outcome of a solve.
#[derive(Debug, Clone, Copy)]
pub struct LmResult {
    pub params: Vector2<f64>,
    /// Euclidean norm of the final residual vector.
    pub residual_norm: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Residuals and their gradients with respect to the parameters.
pub type Evaluation = (Vec<f64>, Vec<Vector2<f64>>);

impl LevenbergMarquardt {
    /// Minimise from `initial`.
    ///
    /// `model` returns `None` for parameters outside its domain; such steps
    /// are rejected like steps that increase the cost.
    pub fn minimize<F>(&self, initial: Vector2<f64>, model: F) -> Option<LmResult>
    where
        F: Fn(&Vector2<f64>) -> Option<Evaluation>,
    {
        let mut params = initial;
        let (mut residuals, mut jacobian) = model(&params)?;
        let mut cost = sum_of_squares(&residuals);
        let mut lambda = self.initial_lambda;
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;

            let mut normal = Matrix2::zeros();
            let mut gradient = Vector2::zeros();
            for (r, j) in residuals.iter().zip(&jacobian) {
                normal += j * j.transpose();
                gradient += j * *r;
            }

            let mut damped = normal;
            for k in 0..2 {
                damped[(k, k)] += lambda * normal[(k, k)].max(f64::MIN_POSITIVE);
            }
            let Some(inverse) = damped.try_inverse() else {
                lambda *= self.lambda_factor;
                if lambda > self.max_lambda {
                    break;
                }
                continue;
            };
            let step = -(inverse * gradient);
            let candidate = params + step;

            match model(&candidate) {
                Some((r, j)) if sum_of_squares(&r) < cost => {
                    cost = sum_of_squares(&r);
                    params = candidate;
                    residuals = r;
                    jacobian = j;
                    lambda /= self.lambda_factor;
                    let small = (0..2).all(|k| {
                        step[k].abs() <= self.tolerance * (params[k].abs() + self.tolerance)
                    });
                    if small || cost == 0.0 {
                        converged = true;
                        break;
                    }
                }
                _ => {
                    lambda *= self.lambda_factor;
                    if lambda > self.max_lambda {
                        // No step improves the cost any more.
                        converged = true;
                        break;
                    }
                }
            }
        }

        Some(LmResult {
            params,
            residual_norm: cost.sqrt(),
            iterations,
            converged,
        })
    }
}

fn sum_of_squares(residuals: &[f64]) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exponential_decay() {
        // y = a exp(-b t) with a = 2, b = 0.5.
        let t: Vec<f64> = (0..10).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = t.iter().map(|&t| 2.0 * (-0.5 * t).exp()).collect();
        let result = LevenbergMarquardt::default()
            .minimize(Vector2::new(1.0, 1.0), |p| {
                let residuals = t
                    .iter()
                    .zip(&y)
                    .map(|(&t, &y)| p[0] * (-p[1] * t).exp() - y)
                    .collect();
                let jacobian = t
                    .iter()
                    .map(|&t| {
                        let e = (-p[1] * t).exp();
                        Vector2::new(e, -p[0] * t * e)
                    })
                    .collect();
                Some((residuals, jacobian))
            })
            .unwrap();
        assert!(result.converged);
        assert_relative_eq!(result.params[0], 2.0, max_relative = 1e-8);
        assert_relative_eq!(result.params[1], 0.5, max_relative = 1e-8);
        assert!(result.residual_norm < 1e-8);
    }

    #[test]
    fn test_domain_rejection() {
        let result = LevenbergMarquardt::default()
            .minimize(Vector2::new(1.0, 0.0), |p| {
                (p[0] > 0.0).then(|| (vec![p[0] - 0.5, p[1]], vec![Vector2::x(), Vector2::y()]))
            })
            .unwrap();
        assert!(result.params[0] > 0.0);
        assert_relative_eq!(result.params[0], 0.5, max_relative = 1e-6);
    }

    #[test]
    fn test_invalid_start() {
        let result = LevenbergMarquardt::default().minimize(Vector2::new(-1.0, 0.0), |p| {
            (p[0] > 0.0).then(|| (vec![p[0]], vec![Vector2::x()]))
        });
        assert!(result.is_none());
    }
}
