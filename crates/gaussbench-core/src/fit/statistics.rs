//! Ordinary least squares on paired samples.

/// Straight line `y = m x + p` fitted by ordinary least squares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRegression {
    pub m: f64,
    pub p: f64,
    pub mean_x: f64,
    pub mean_y: f64,
    /// Squared correlation coefficient.
    pub rho2: f64,
}

impl LinearRegression {
    /// Fit `y` against `x`. Needs two samples with distinct abscissae.
    pub fn fit(x: &[f64], y: &[f64]) -> Option<Self> {
        let n = x.len().min(y.len());
        if n < 2 {
            return None;
        }
        let count = n as f64;
        let mean_x = x[..n].iter().sum::<f64>() / count;
        let mean_y = y[..n].iter().sum::<f64>() / count;

        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for (&xi, &yi) in x.iter().zip(y) {
            let (dx, dy) = (xi - mean_x, yi - mean_y);
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }
        if sxx == 0.0 {
            return None;
        }

        let m = sxy / sxx;
        let rho2 = if syy == 0.0 { 1.0 } else { sxy * sxy / (sxx * syy) };
        Some(Self {
            m,
            p: mean_y - m * mean_x,
            mean_x,
            mean_y,
            rho2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let fit = LinearRegression::fit(&x, &y).unwrap();
        assert_relative_eq!(fit.m, 2.0);
        assert_relative_eq!(fit.p, 1.0);
        assert_relative_eq!(fit.rho2, 1.0);
        assert_relative_eq!(fit.mean_x, 1.5);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(LinearRegression::fit(&[1.0], &[2.0]).is_none());
        assert!(LinearRegression::fit(&[1.0, 1.0], &[2.0, 3.0]).is_none());
    }

    #[test]
    fn test_noisy_correlation_below_one() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [0.0, 1.2, 1.8, 3.1];
        let fit = LinearRegression::fit(&x, &y).unwrap();
        assert!(fit.rho2 > 0.9 && fit.rho2 < 1.0);
    }
}
