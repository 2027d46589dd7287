//! Joint position limits of the manipulator

use nalgebra::{DMatrix, DVector};
use crate::control_error::{check_shape, ControlError};

#[derive(Debug, Clone, PartialEq)]
pub struct JointLimits {
    /// Lower limit of each joint, strictly less than the upper one
    pub lower: DVector<f64>,

    /// Upper limit of each joint
    pub upper: DVector<f64>,
}

impl JointLimits {
    pub fn new(lower: &[f64], upper: &[f64]) -> Result<Self, ControlError> {
        check_shape("upper joint limits", (upper.len(), 1), (lower.len(), 1))?;
        for (joint, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                return Err(ControlError::InvalidJointLimits { joint, lower: lo, upper: hi });
            }
        }
        Ok(JointLimits {
            lower: DVector::from_column_slice(lower),
            upper: DVector::from_column_slice(upper),
        })
    }

    /// Limits from the Nx2 matrix, first column lower and second column upper limits.
    pub fn from_matrix(limits: &DMatrix<f64>) -> Result<Self, ControlError> {
        check_shape("joint limits", limits.shape(), (limits.nrows(), 2))?;
        let lower: Vec<f64> = limits.column(0).iter().cloned().collect();
        let upper: Vec<f64> = limits.column(1).iter().cloned().collect();
        Self::new(&lower, &upper)
    }

    /// Nx2 matrix, first column lower and second column upper limits.
    pub fn as_matrix(&self) -> DMatrix<f64> {
        let mut limits = DMatrix::zeros(self.nr_joints(), 2);
        limits.set_column(0, &self.lower);
        limits.set_column(1, &self.upper);
        limits
    }

    pub fn nr_joints(&self) -> usize {
        self.lower.len()
    }

    /// Middle of the range of each joint.
    pub fn centers(&self) -> DVector<f64> {
        (&self.lower + &self.upper) * 0.5
    }

    /// Indices of the joints outside their limits.
    pub fn violations(&self, q: &DVector<f64>) -> Vec<usize> {
        q.iter().enumerate()
            .filter(|&(i, &qi)| qi < self.lower[i] || qi > self.upper[i])
            .map(|(i, _)| i)
            .collect()
    }

    /// True if all joints are within their limits (limits included).
    pub fn compliant(&self, q: &DVector<f64>) -> bool {
        q.len() == self.nr_joints() && self.violations(q).is_empty()
    }
}
