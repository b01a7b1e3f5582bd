//! Activation function types.

use crate::matrix::Mat;

use serde_derive::{Deserialize, Serialize};

/// [Activation function](https://en.wikipedia.org/wiki/Activation_function)
/// types.
///
/// The squashing functions are rational approximations, so no exponentials
/// are evaluated on the hot path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activator {
    /// Passes values through unchanged.
    Identity,
    /// Rational logistic curve, `0.5 - 0.5 * x / (1 + |x|)`.
    ///
    /// Note that this curve is decreasing: large inputs map towards 0 and
    /// large negative inputs towards 1.
    Sigmoid,
    /// Rational hyperbolic tan, `x / (1 + |x|)`.
    TanH,
}

impl Activator {
    /// Evaluates `f(x)` for the selected the activation function.
    pub fn f(&self, x: f64) -> f64 {
        match *self {
            Activator::Identity => x,
            Activator::Sigmoid => 0.5 - 0.5 * (x / (1.0 + x.abs())),
            Activator::TanH => x / (1.0 + x.abs()),
        }
    }

    /// Evaluates the derivative `f'(x)`.
    ///
    /// Unlike `f`, this takes the *unactivated* value, which is why gates keep
    /// their pre-activation outputs around for training.
    pub fn fprime(&self, x: f64) -> f64 {
        match *self {
            Activator::Identity => 1.0,
            Activator::Sigmoid => -0.5 / square(1.0 + x.abs()),
            Activator::TanH => 1.0 / square(1.0 + x.abs()),
        }
    }

    /// Applies `f` to every element of `x`.
    pub fn activate(&self, x: &Mat) -> Mat {
        x.mapv(|v| self.f(v))
    }

    /// Applies `fprime` to every element of `x`.
    pub fn derivative(&self, x: &Mat) -> Mat {
        x.mapv(|v| self.fprime(v))
    }
}

fn square(x: f64) -> f64 {
    x * x
}
