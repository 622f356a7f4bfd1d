//! Activation functions shared by all layers of a network.
use crate::matrix::Matrix;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Activation function kinds, selectable by name at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Sigmoid,
    Tanh,
}

impl Activation {
    /// Look up an activation by its registry name.
    ///
    /// Unknown names are a configuration error and must be rejected before a
    /// network is constructed.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            _ => Err(anyhow!("invalid activator: {}", name)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
        }
    }

    /// Pointwise activation of a weighted sum.
    pub fn activate(&self, sum: f64) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-sum).exp()),
            Activation::Tanh => sum.tanh(),
        }
    }

    /// Derivative as a matrix transform.
    ///
    /// Sigmoid expects already-activated values and computes `a * (1 - a)`
    /// elementwise; Tanh computes `1 - tanh(v)^2` on whatever is supplied.
    pub fn deactivate(&self, m: &Matrix) -> Matrix {
        match self {
            Activation::Sigmoid => {
                let ones = Matrix::filled(m.rows(), m.cols(), 1.0);
                m.multiply(&ones.subtract(m))
            }
            Activation::Tanh => m.apply(|_, _, v| 1.0 - v.tanh() * v.tanh()),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_registry() {
        assert_eq!(Activation::from_name("sigmoid").unwrap(), Activation::Sigmoid);
        assert_eq!(Activation::from_name("tanh").unwrap(), Activation::Tanh);
        assert!(Activation::from_name("relu").is_err());
        assert!(Activation::from_name("Sigmoid").is_err());
    }

    #[test]
    fn test_sigmoid_activate() {
        let s = Activation::Sigmoid;
        assert!((s.activate(0.0) - 0.5).abs() < 1e-12);
        assert!(s.activate(10.0) > 0.999);
        assert!(s.activate(-10.0) < 0.001);
    }

    #[test]
    fn test_sigmoid_deactivate_uses_activated_values() {
        // For activated value a, derivative is a * (1 - a).
        let a = Matrix::column(&[0.5, 0.9]);
        let d = Activation::Sigmoid.deactivate(&a);
        assert!((d.at(0, 0) - 0.25).abs() < 1e-12);
        assert!((d.at(1, 0) - 0.09).abs() < 1e-12);
    }

    #[test]
    fn test_tanh_deactivate() {
        let v = Matrix::column(&[0.0, 1.0]);
        let d = Activation::Tanh.deactivate(&v);
        assert!((d.at(0, 0) - 1.0).abs() < 1e-12);
        assert!((d.at(1, 0) - (1.0 - 1f64.tanh().powi(2))).abs() < 1e-12);
    }

    #[test]
    fn test_display_matches_registry_name() {
        assert_eq!(Activation::Tanh.to_string(), "tanh");
        assert_eq!(Activation::Sigmoid.to_string(), "sigmoid");
    }
}
