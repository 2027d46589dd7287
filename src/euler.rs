//! ZYZ Euler angles and the mapping between Euler angle rates and angular velocity.
//!
//! The orientation part of the task error is expressed in ZYZ Euler angles
//! (φ, θ, ψ), R = Rz(φ) Ry(θ) Rz(ψ). Angular velocity and Euler rates are related by
//! ω = T(φ, θ) [φ̇, θ̇, ψ̇]ᵗ. The mapping is singular at θ = 0 and θ = π where φ and ψ
//! rotate about the same axis; near these orientations the inverse is replaced by the
//! damped pseudo inverse.

use nalgebra::{Matrix3, Rotation3, Vector3};
use tracing::warn;

use crate::control_error::ControlError;
use crate::utils::pseudo_inverse3;

/// ZYZ Euler angles. θ is in [0, π], φ and ψ are in (-π, π].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    pub phi: f64,
    pub theta: f64,
    pub psi: f64,
}

impl EulerAngles {
    pub fn new(phi: f64, theta: f64, psi: f64) -> Self {
        EulerAngles { phi, theta, psi }
    }

    /// [φ, θ, ψ]
    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.phi, self.theta, self.psi)
    }
}

/// Below this value of sin θ the φ and ψ axes are considered aligned.
const ALIGNED_AXES: f64 = 1e-12;

/// Extracts ZYZ Euler angles from the rotation matrix:
/// φ = atan2(r23, r13), θ = atan2(√(r13² + r23²), r33), ψ = atan2(r32, -r31).
///
/// When the z axes are aligned (θ = 0 or π) only φ ± ψ is defined. φ is then set to 0
/// and the whole rotation about z is assigned to ψ.
pub fn euler_angles(r: &Matrix3<f64>) -> EulerAngles {
    let r13 = r[(0, 2)];
    let r23 = r[(1, 2)];
    let r31 = r[(2, 0)];
    let r32 = r[(2, 1)];
    let r33 = r[(2, 2)];

    let s_theta = (r13 * r13 + r23 * r23).sqrt();
    let theta = s_theta.atan2(r33);
    if s_theta <= ALIGNED_AXES {
        let psi = if r33 > 0.0 {
            r[(1, 0)].atan2(r[(0, 0)])
        } else {
            r[(1, 0)].atan2(r[(1, 1)])
        };
        return EulerAngles { phi: 0.0, theta, psi };
    }

    EulerAngles {
        phi: r23.atan2(r13),
        theta,
        psi: r32.atan2(-r31),
    }
}

/// Rotation matrix Rz(φ) Ry(θ) Rz(ψ).
pub fn rotation_from_euler(euler: &EulerAngles) -> Matrix3<f64> {
    let z = Vector3::z_axis();
    let y = Vector3::y_axis();
    (Rotation3::from_axis_angle(&z, euler.phi)
        * Rotation3::from_axis_angle(&y, euler.theta)
        * Rotation3::from_axis_angle(&z, euler.psi)).into_inner()
}

/// T(φ, θ), mapping Euler angle rates to angular velocity. Does not depend on ψ.
pub fn euler_rate_map(euler: &EulerAngles) -> Matrix3<f64> {
    let (s_phi, c_phi) = euler.phi.sin_cos();
    let (s_theta, c_theta) = euler.theta.sin_cos();
    Matrix3::new(
        0.0, -s_phi, c_phi * s_theta,
        0.0, c_phi, s_phi * s_theta,
        1.0, 0.0, c_theta,
    )
}

/// Inverse of T(φ, θ), mapping angular velocity to Euler angle rates.
///
/// det T = -sin θ. While |sin θ| stays above `tolerance` this is the exact inverse, below
/// it the damped pseudo inverse is returned so that the result stays finite.
pub fn euler_rate_map_inverse(euler: &EulerAngles, tolerance: f64) -> Result<Matrix3<f64>, ControlError> {
    let t = euler_rate_map(euler);
    if euler.theta.sin().abs() > tolerance {
        if let Some(inverse) = t.try_inverse() {
            return Ok(inverse);
        }
    }
    warn!("Euler angle representation singularity, theta = {:.6}", euler.theta);
    pseudo_inverse3(&t, tolerance)
}

/// Time derivative of T(φ, θ) while the frame rotates with angular velocity `omega`.
/// The rates φ̇, θ̇ are recovered as T⁻¹ω.
pub fn euler_rate_map_dot(
    euler: &EulerAngles,
    omega: &Vector3<f64>,
    tolerance: f64,
) -> Result<Matrix3<f64>, ControlError> {
    let rates = euler_rate_map_inverse(euler, tolerance)? * omega;
    let phi_dot = rates[0];
    let theta_dot = rates[1];

    let (s_phi, c_phi) = euler.phi.sin_cos();
    let (s_theta, c_theta) = euler.theta.sin_cos();
    Ok(Matrix3::new(
        0.0, -c_phi * phi_dot, -s_phi * s_theta * phi_dot + c_phi * c_theta * theta_dot,
        0.0, -s_phi * phi_dot, c_phi * s_theta * phi_dot + s_phi * c_theta * theta_dot,
        0.0, 0.0, -s_theta * theta_dot,
    ))
}
