//! Butcher tableaux of the explicit Runge-Kutta schemes.
//!
//! The coefficients are stored as `f64` constants and converted once to the
//! working scalar type when a [`ButcherTableau`] is built. Explicit methods
//! have a strictly lower-triangular `a`, so row `i` of `a` holds the `i + 1`
//! weights used to form the trial state of stage `i + 1`. The first node
//! `c_0` is always zero and is not stored.

use crate::rk_shared::{cast, ConfigError, FloatNumber};

/// Static coefficient table of one scheme.
#[derive(Debug, Clone, Copy)]
pub struct Coefficients {
    pub a: &'static [&'static [f64]],
    pub b: &'static [f64],
    pub c: &'static [f64],
    /// Embedded error weights, `b - b_hat`.
    pub berr: Option<&'static [f64]>,
    pub order: u32,
}

/// Classic Runge-Kutta method of order 4.
pub const RK4: Coefficients = Coefficients {
    a: &[&[0.5], &[0.0, 0.5], &[0.0, 0.0, 1.0]],
    b: &[1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
    c: &[0.5, 0.5, 1.0],
    berr: None,
    order: 4,
};

/// Kutta's 3/8 rule, the alternate 4-stage method of order 4.
pub const RK4_MOD: Coefficients = Coefficients {
    a: &[&[1.0 / 3.0], &[-1.0 / 3.0, 1.0], &[1.0, -1.0, 1.0]],
    b: &[1.0 / 8.0, 3.0 / 8.0, 3.0 / 8.0, 1.0 / 8.0],
    c: &[1.0 / 3.0, 2.0 / 3.0, 1.0],
    berr: None,
    order: 4,
};

/// Explicit midpoint method.
pub const MIDPOINT: Coefficients = Coefficients {
    a: &[&[0.5]],
    b: &[0.0, 1.0],
    c: &[0.5],
    berr: None,
    order: 2,
};

/// Heun's method (explicit trapezoidal rule).
pub const HEUN: Coefficients = Coefficients {
    a: &[&[1.0]],
    b: &[0.5, 0.5],
    c: &[1.0],
    berr: None,
    order: 2,
};

/// Ralston's second order method.
pub const RALSTON: Coefficients = Coefficients {
    a: &[&[2.0 / 3.0]],
    b: &[0.25, 0.75],
    c: &[2.0 / 3.0],
    berr: None,
    order: 2,
};

/// Weights of the fourth order formula embedded in Fehlberg 4(5).
pub const FEHLBERG45_B_HAT: [f64; 6] = [
    25.0 / 216.0,
    0.0,
    1408.0 / 2565.0,
    2197.0 / 4104.0,
    -1.0 / 5.0,
    0.0,
];

/// Runge-Kutta-Fehlberg 4(5). Steps are taken with the fifth order weights
/// and the step size is controlled assuming fourth order accuracy.
///
/// # References
///
/// 1. E. Fehlberg, "Low-order classical Runge-Kutta formulas with stepsize
///    control and their application to some heat transfer problems",
///    NASA Technical Report TR R-315, 1969.
#[rustfmt::skip]
pub const FEHLBERG45: Coefficients = Coefficients {
    a: &[
        &[1.0 / 4.0],
        &[3.0 / 32.0, 9.0 / 32.0],
        &[1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0],
        &[439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0],
        &[-8.0 / 27.0, 2.0, -3544.0 / 2565.0, 1859.0 / 4104.0, -11.0 / 40.0],
    ],
    b: &[16.0 / 135.0, 0.0, 6656.0 / 12825.0, 28561.0 / 56430.0, -9.0 / 50.0, 2.0 / 55.0],
    c: &[1.0 / 4.0, 3.0 / 8.0, 12.0 / 13.0, 1.0, 1.0 / 2.0],
    berr: Some(&[
        16.0 / 135.0 - FEHLBERG45_B_HAT[0],
        0.0 - FEHLBERG45_B_HAT[1],
        6656.0 / 12825.0 - FEHLBERG45_B_HAT[2],
        28561.0 / 56430.0 - FEHLBERG45_B_HAT[3],
        -9.0 / 50.0 - FEHLBERG45_B_HAT[4],
        2.0 / 55.0 - FEHLBERG45_B_HAT[5],
    ]),
    order: 4,
};

/// Heun-Euler 1(2) pair: Heun's method with an explicit Euler step for the
/// error estimate.
pub const HEUN_EULER: Coefficients = Coefficients {
    a: &[&[1.0]],
    b: &[0.5, 0.5],
    c: &[1.0],
    berr: Some(&[-0.5, 0.5]),
    order: 1,
};

/// Immutable coefficient set of an explicit Runge-Kutta scheme.
#[derive(Debug, Clone, PartialEq)]
pub struct ButcherTableau<T> {
    a: Vec<Vec<T>>,
    b: Vec<T>,
    c: Vec<T>,
    berr: Option<Vec<T>>,
    order: u32,
}

impl<T: FloatNumber> ButcherTableau<T> {
    /// Builds a tableau from caller-provided coefficients.
    ///
    /// Only the shapes are checked: `a` must have `b.len() - 1` rows with row
    /// `i` holding `i + 1` entries, `c` must have one entry per row of `a` and
    /// `berr`, if any, must match `b`. Order conditions are not verified.
    pub fn new(
        a: Vec<Vec<T>>,
        b: Vec<T>,
        c: Vec<T>,
        berr: Option<Vec<T>>,
        order: u32,
    ) -> Result<Self, ConfigError> {
        let malformed = |reason: String| Err(ConfigError::MalformedTableau { reason });

        if b.is_empty() {
            return malformed("b is empty".to_string());
        }
        if a.len() + 1 != b.len() {
            return malformed(format!(
                "a has {} rows but b has {} weights",
                a.len(),
                b.len()
            ));
        }
        if c.len() != a.len() {
            return malformed(format!("c has {} nodes, expected {}", c.len(), a.len()));
        }
        if let Some(row) = a.iter().enumerate().find(|(i, row)| row.len() != i + 1) {
            return malformed(format!(
                "row {} of a has {} entries, expected {}",
                row.0,
                row.1.len(),
                row.0 + 1
            ));
        }
        if let Some(berr) = &berr {
            if berr.len() != b.len() {
                return malformed(format!(
                    "berr has {} weights but b has {}",
                    berr.len(),
                    b.len()
                ));
            }
        }
        if order == 0 {
            return malformed("order must be at least 1".to_string());
        }

        Ok(Self {
            a,
            b,
            c,
            berr,
            order,
        })
    }

    /// Converts a static coefficient table to the working scalar type.
    pub fn from_coefficients(coefficients: &Coefficients) -> Self {
        let convert = |values: &[f64]| values.iter().map(|&v| cast::<T>(v)).collect::<Vec<_>>();
        Self {
            a: coefficients.a.iter().map(|&row| convert(row)).collect(),
            b: convert(coefficients.b),
            c: convert(coefficients.c),
            berr: coefficients.berr.map(convert),
            order: coefficients.order,
        }
    }

    pub fn rk4() -> Self {
        Self::from_coefficients(&RK4)
    }

    pub fn rk4_mod() -> Self {
        Self::from_coefficients(&RK4_MOD)
    }

    pub fn midpoint() -> Self {
        Self::from_coefficients(&MIDPOINT)
    }

    pub fn heun() -> Self {
        Self::from_coefficients(&HEUN)
    }

    pub fn ralston() -> Self {
        Self::from_coefficients(&RALSTON)
    }

    pub fn fehlberg45() -> Self {
        Self::from_coefficients(&FEHLBERG45)
    }

    pub fn heun_euler() -> Self {
        Self::from_coefficients(&HEUN_EULER)
    }

    /// Coupling coefficients, one row per stage after the first.
    pub fn a(&self) -> &[Vec<T>] {
        &self.a
    }

    /// Weights of the propagated solution.
    pub fn b(&self) -> &[T] {
        &self.b
    }

    /// Nodes of the stages after the first.
    pub fn c(&self) -> &[T] {
        &self.c
    }

    /// Weights of the embedded error estimate, if the scheme has one.
    pub fn berr(&self) -> Option<&[T]> {
        self.berr.as_deref()
    }

    pub fn has_error_estimate(&self) -> bool {
        self.berr.is_some()
    }

    pub fn num_stages(&self) -> usize {
        self.b.len()
    }

    /// Order `q` used by the step size controller.
    pub fn order(&self) -> u32 {
        self.order
    }
}
