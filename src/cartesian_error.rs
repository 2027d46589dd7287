//! Position and orientation errors between the desired and the current end effector
//! pose, and their rates.

use nalgebra::{Matrix3, Vector3, Vector6};

use crate::control_error::ControlError;
use crate::control_traits::{Pose, Twist};
use crate::euler::{euler_angles, euler_rate_map_inverse};
use crate::utils::{orthonormalize, pseudo_inverse3, skew};

/// How the orientation error and its rate are measured. Error and rate always use the
/// same metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrientationMetric {
    /// Difference of ZYZ Euler angles, rate as difference of Euler angle rates.
    /// Pairs with the analytical Jacobian. Singular at θ = 0 and θ = π.
    #[default]
    EulerZyz,

    /// Angle-axis error ½ Σ n_e × n_d, rate as the difference of angular velocities.
    /// Pairs with the geometric Jacobian and has no representation singularity.
    AngleAxis,
}

pub fn linear_error(p_d: &Vector3<f64>, p_e: &Vector3<f64>) -> Vector3<f64> {
    p_d - p_e
}

/// Difference of ZYZ Euler angles, desired minus current.
pub fn orientation_error_euler(r_d: &Matrix3<f64>, r_e: &Matrix3<f64>) -> Vector3<f64> {
    euler_angles(r_d).as_vector() - euler_angles(r_e).as_vector()
}

/// Angle-axis orientation error ½ Σᵢ n_e,i × n_d,i over the columns of both rotations.
/// Equals sin(α) times the unit axis for a rotation by α from `r_e` to `r_d`.
pub fn orientation_error_angle_axis(r_d: &Matrix3<f64>, r_e: &Matrix3<f64>) -> Vector3<f64> {
    let mut e_o = Vector3::zeros();
    for i in 0..3 {
        e_o += skew(&r_e.column(i).into_owned()) * r_d.column(i);
    }
    e_o * 0.5
}

/// Difference of Euler angle rates, T(e_d)⁻¹ ω_d - T(e_e)⁻¹ ω_e.
pub fn orientation_rate_error_euler(
    omega_d: &Vector3<f64>,
    omega_e: &Vector3<f64>,
    r_d: &Matrix3<f64>,
    r_e: &Matrix3<f64>,
    tolerance: f64,
) -> Result<Vector3<f64>, ControlError> {
    let rate_d = euler_rate_map_inverse(&euler_angles(r_d), tolerance)? * omega_d;
    let rate_e = euler_rate_map_inverse(&euler_angles(r_e), tolerance)? * omega_e;
    Ok(rate_d - rate_e)
}

/// Rate of the angle-axis error, expressed back as an angular velocity:
/// L⁻¹ (Lᵗ ω_d - L ω_e) with L = -½ Σᵢ skew(n_d,i) skew(n_e,i).
/// L is the identity when both rotations coincide.
pub fn orientation_rate_error_angle_axis(
    omega_d: &Vector3<f64>,
    omega_e: &Vector3<f64>,
    r_d: &Matrix3<f64>,
    r_e: &Matrix3<f64>,
    tolerance: f64,
) -> Result<Vector3<f64>, ControlError> {
    let mut l = Matrix3::zeros();
    for i in 0..3 {
        l += skew(&r_d.column(i).into_owned()) * skew(&r_e.column(i).into_owned());
    }
    l *= -0.5;
    let l_inverse = match l.try_inverse() {
        Some(inverse) => inverse,
        None => pseudo_inverse3(&l, tolerance)?,
    };
    Ok(l_inverse * (l.transpose() * omega_d - l * omega_e))
}

/// Error [e_p; e_o] and its rate between the desired and the current pose and twist.
/// Both rotations are orthonormalized first.
pub fn compute_errors(
    pose_d: &Pose,
    pose_e: &Pose,
    twist_d: &Twist,
    twist_e: &Twist,
    metric: OrientationMetric,
    tolerance: f64,
) -> Result<(Vector6<f64>, Vector6<f64>), ControlError> {
    let r_d = orthonormalize(&pose_d.rotation);
    let r_e = orthonormalize(&pose_e.rotation);

    let e_p = linear_error(&pose_d.position, &pose_e.position);
    let e_p_dot = linear_error(&twist_d.linear, &twist_e.linear);

    let (e_o, e_o_dot) = match metric {
        OrientationMetric::EulerZyz => (
            orientation_error_euler(&r_d, &r_e),
            orientation_rate_error_euler(&twist_d.angular, &twist_e.angular, &r_d, &r_e, tolerance)?,
        ),
        OrientationMetric::AngleAxis => (
            orientation_error_angle_axis(&r_d, &r_e),
            twist_d.angular - twist_e.angular,
        ),
    };

    Ok((stack(&e_p, &e_o), stack(&e_p_dot, &e_o_dot)))
}

/// [top; bottom]
pub(crate) fn stack(top: &Vector3<f64>, bottom: &Vector3<f64>) -> Vector6<f64> {
    Vector6::new(top.x, top.y, top.z, bottom.x, bottom.y, bottom.z)
}
