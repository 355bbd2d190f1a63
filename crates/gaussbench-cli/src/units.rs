//! Display units. The core works in SI; a displayed value relates to it by
//! `value_si = value_displayed * 10^power`.

/// Physical quantity being displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Position,
    Focal,
    Waist,
    Rayleigh,
    Wavelength,
    Divergence,
}

impl Unit {
    /// Decimal exponent of the display unit.
    pub fn power(self) -> i32 {
        match self {
            Unit::Position | Unit::Focal | Unit::Divergence => -3,
            Unit::Waist | Unit::Rayleigh => -6,
            Unit::Wavelength => -9,
        }
    }

    fn base(self) -> &'static str {
        match self {
            Unit::Divergence => "rad",
            _ => "m",
        }
    }

    /// Unit symbol, e.g. `µm`.
    pub fn symbol(self) -> String {
        format!("{}{}", prefix(self.power()), self.base())
    }

    pub fn to_display(self, value: f64) -> f64 {
        value / 10f64.powi(self.power())
    }

    /// `value` in display units with its symbol and `decimals` digits.
    pub fn format(self, value: f64, decimals: usize) -> String {
        format!("{:.*} {}", decimals, self.to_display(value), self.symbol())
    }
}

fn prefix(power: i32) -> &'static str {
    match power {
        12 => "T",
        9 => "G",
        6 => "M",
        3 => "k",
        0 => "",
        -2 => "c",
        -3 => "m",
        -6 => "µ",
        -9 => "n",
        -12 => "p",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_display_scaling() {
        assert_relative_eq!(Unit::Waist.to_display(180e-6), 180.0, max_relative = 1e-12);
        assert_relative_eq!(Unit::Position.to_display(0.12), 120.0, max_relative = 1e-12);
        assert_relative_eq!(Unit::Wavelength.to_display(1064e-9), 1064.0, max_relative = 1e-12);
        assert_eq!(Unit::Waist.symbol(), "µm");
        assert_eq!(Unit::Divergence.symbol(), "mrad");
        assert_eq!(Unit::Focal.format(0.021, 1), "21.0 mm");
    }
}
