extern crate nalgebra as na;
use na::{Matrix3, Vector3, Vector6};
use crate::control_error::{check_shape, ControlError};
use crate::control_traits::{Jacobian, JointVector, TASK_DIM};
use crate::euler::{euler_rate_map, euler_rate_map_dot, euler_rate_map_inverse, EulerAngles};
use crate::utils::pseudo_inverse;

/// Analytical Jacobian of the end effector together with its time derivative.
///
/// The geometric Jacobian maps joint velocities to linear and angular velocity. The
/// analytical Jacobian maps them to linear velocity and ZYZ Euler angle rates instead,
/// which is what is needed once the orientation error is expressed in Euler angles:
/// ```text
/// J_A = | I  0 |⁻¹ J
///       | 0  T |
/// ```
pub struct AnalyticalJacobian {
    /// 6xN analytical Jacobian
    matrix: Jacobian,

    /// 6xN time derivative of the analytical Jacobian
    dot: Jacobian,

    /// Singular values not above this value are dropped when inverting
    tolerance: f64,
}

impl AnalyticalJacobian {
    /// Builds the analytical Jacobian and its derivative from the geometric Jacobian
    /// `jacobian`, its time derivative `jacobian_dot`, the current Euler angles of the end
    /// effector and its angular velocity `omega`.
    pub fn new(
        jacobian: &Jacobian,
        jacobian_dot: &Jacobian,
        euler: &EulerAngles,
        omega: &Vector3<f64>,
        tolerance: f64,
    ) -> Result<Self, ControlError> {
        let matrix = analytical_jacobian(jacobian, euler, tolerance)?;
        let dot = analytical_jacobian_dot(jacobian, jacobian_dot, euler, omega, tolerance)?;
        Ok(Self { matrix, dot, tolerance })
    }

    pub fn matrix(&self) -> &Jacobian {
        &self.matrix
    }

    pub fn dot(&self) -> &Jacobian {
        &self.dot
    }

    /// Damped pseudo inverse of the analytical Jacobian, Nx6.
    pub fn pseudo_inverse(&self) -> Result<Jacobian, ControlError> {
        pseudo_inverse(&self.matrix, self.tolerance)
    }

    /// The J̇_A q̇ term of the task acceleration ẍ = J_A q̈ + J̇_A q̇.
    pub fn bias_acceleration(&self, q_dot: &JointVector) -> Result<Vector6<f64>, ControlError> {
        check_shape("joint velocities", q_dot.shape(), (self.matrix.ncols(), 1))?;
        let bias = &self.dot * q_dot;
        Ok(Vector6::from_iterator(bias.iter().cloned()))
    }

    /// Joint velocities that produce the desired task velocity (linear velocity and
    /// Euler angle rates). Uses the damped pseudo inverse, so near singularities the
    /// unreachable part of the velocity is dropped.
    pub fn velocities(&self, task_velocity: &Vector6<f64>) -> Result<JointVector, ControlError> {
        Ok(self.pseudo_inverse()? * task_velocity)
    }

    /// Joint torques balancing the generalized task force (force and Euler-angle torque),
    /// τ = J_Aᵗ F.
    pub fn torques(&self, task_force: &Vector6<f64>) -> JointVector {
        self.matrix.transpose() * task_force
    }
}

/// Converts the angular rows of the geometric Jacobian into Euler angle rate rows,
/// J_A = blockDiag(I, T(φ, θ))⁻¹ J.
pub fn analytical_jacobian(
    jacobian: &Jacobian,
    euler: &EulerAngles,
    tolerance: f64,
) -> Result<Jacobian, ControlError> {
    check_shape("jacobian", jacobian.shape(), (TASK_DIM, jacobian.ncols()))?;
    let t_inverse = euler_rate_map_inverse(euler, tolerance)?;
    Ok(remap_angular_rows(jacobian, &t_inverse))
}

/// Time derivative of the analytical Jacobian,
/// J̇_A = blockDiag(I, T)⁻¹ (J̇ - blockDiag(0, Ṫ) J_A).
pub fn analytical_jacobian_dot(
    jacobian: &Jacobian,
    jacobian_dot: &Jacobian,
    euler: &EulerAngles,
    omega: &Vector3<f64>,
    tolerance: f64,
) -> Result<Jacobian, ControlError> {
    check_shape("jacobian", jacobian.shape(), (TASK_DIM, jacobian.ncols()))?;
    check_shape("jacobian derivative", jacobian_dot.shape(), jacobian.shape())?;

    let t_inverse = euler_rate_map_inverse(euler, tolerance)?;
    let t_dot = euler_rate_map_dot(euler, omega, tolerance)?;
    let analytical = remap_angular_rows(jacobian, &t_inverse);

    let mut dot = jacobian_dot.clone();
    let angular = t_inverse * (jacobian_dot.fixed_rows::<3>(3) - t_dot * analytical.fixed_rows::<3>(3));
    dot.fixed_rows_mut::<3>(3).copy_from(&angular);
    Ok(dot)
}

/// Maps the geometric Jacobian back from the analytical one, J = blockDiag(I, T) J_A.
pub fn geometric_jacobian(analytical: &Jacobian, euler: &EulerAngles) -> Result<Jacobian, ControlError> {
    check_shape("analytical jacobian", analytical.shape(), (TASK_DIM, analytical.ncols()))?;
    Ok(remap_angular_rows(analytical, &euler_rate_map(euler)))
}

/// Multiplies the angular (lower three) rows by `map`, leaving the linear rows intact.
fn remap_angular_rows(jacobian: &Jacobian, map: &Matrix3<f64>) -> Jacobian {
    let mut remapped = jacobian.clone();
    let angular = map * jacobian.fixed_rows::<3>(3);
    remapped.fixed_rows_mut::<3>(3).copy_from(&angular);
    remapped
}
