//! Redundancy resolution: inverse of the task Jacobian, its null space projector and the
//! secondary objectives that act in the null space.
//!
//! A manipulator with more joints than task dimensions can track the end effector task
//! and still move its joints inside the kernel of the task Jacobian. Joint space vectors
//! projected with `N = I - J⁺J` do not disturb the task to first order.

use bitflags::bitflags;
use nalgebra::DMatrix;
use tracing::warn;

use crate::control_error::{check_shape, ControlError};
use crate::control_traits::{Jacobian, JointVector, TASK_DIM};
use crate::joint_limits::JointLimits;
use crate::utils::{is_valid, pseudo_inverse};

bitflags! {
    /// Secondary objectives combined into the null space joint vector.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SecondaryTasks: u32 {
        const NONE = 0b0000_0000;

        /// Damp joint velocities, -k q̇.
        const JOINT_DAMPING = 0b0000_0001;

        /// Descend the joint limit cost, -k ∇H(q).
        const JOINT_LIMITS = 0b0000_0010;
    }
}

/// Which secondary objectives are active and how strongly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NullSpaceConfig {
    pub tasks: SecondaryTasks,

    /// Gain of the joint velocity damping
    pub damping_gain: f64,

    /// Gain of the joint limit cost gradient
    pub joint_limit_gain: f64,

    /// Scaling γ of the joint limit cost, the cost is divided by it
    pub gamma: f64,
}

impl NullSpaceConfig {
    /// Gains must be finite and γ positive, the joint limit cost is divided by it.
    pub fn validate(&self) -> Result<(), ControlError> {
        if !is_valid(&[self.damping_gain, self.joint_limit_gain, self.gamma]) {
            return Err(ControlError::NotFinite("null space gains"));
        }
        if !(self.gamma > 0.0) {
            return Err(ControlError::InvalidParameter { what: "joint limit cost gamma", value: self.gamma });
        }
        Ok(())
    }
}

impl Default for NullSpaceConfig {
    fn default() -> Self {
        NullSpaceConfig {
            tasks: SecondaryTasks::JOINT_DAMPING,
            damping_gain: 1.0,
            joint_limit_gain: 10.0,
            gamma: 1.0,
        }
    }
}

/// Value and gradient of the joint limit barrier cost.
#[derive(Debug, Clone, PartialEq)]
pub struct JointLimitCost {
    pub gradient: JointVector,
    pub cost: f64,
}

/// Damped pseudo inverse of the 6xN task Jacobian, Nx6.
pub fn damped_pseudo_inverse(jacobian: &Jacobian, tolerance: f64) -> Result<Jacobian, ControlError> {
    check_shape("task jacobian", jacobian.shape(), (TASK_DIM, jacobian.ncols()))?;
    pseudo_inverse(jacobian, tolerance)
}

/// Null space projector `I - J⁺J`, NxN.
pub fn null_space_projector(
    jacobian: &Jacobian,
    jacobian_inverse: &Jacobian,
) -> Result<DMatrix<f64>, ControlError> {
    let n = jacobian.ncols();
    check_shape("task jacobian", jacobian.shape(), (TASK_DIM, n))?;
    check_shape("task jacobian inverse", jacobian_inverse.shape(), (n, TASK_DIM))?;
    Ok(DMatrix::identity(n, n) - jacobian_inverse * jacobian)
}

/// Joint limit barrier cost
/// ```text
/// H(q) = Σ 1/γ (q_max - q_min)² / ((q_max - q)(q - q_min))
/// ```
/// and its gradient. H is smallest at the middle of the ranges (zero gradient there) and
/// grows without bound towards either limit. Joints outside their limits are reported
/// but not rejected.
pub fn joint_limit_gradient(
    q: &JointVector,
    limits: &JointLimits,
    gamma: f64,
) -> Result<JointLimitCost, ControlError> {
    check_shape("joint positions", q.shape(), (limits.nr_joints(), 1))?;
    if !(gamma > 0.0) {
        return Err(ControlError::InvalidParameter { what: "joint limit cost gamma", value: gamma });
    }

    for i in limits.violations(q) {
        warn!("Joint {} limits violated. Value = {:.3} deg", i, q[i].to_degrees());
    }

    let mut gradient = JointVector::zeros(q.len());
    let mut cost = 0.0;
    for i in 0..q.len() {
        let (lo, hi, qi) = (limits.lower[i], limits.upper[i], q[i]);
        let range_sq = (hi - lo).powi(2);
        gradient[i] = range_sq * (2.0 * qi - hi - lo) / ((hi - qi).powi(2) * (qi - lo).powi(2)) / gamma;
        cost += range_sq / ((hi - qi) * (qi - lo)) / gamma;
    }
    Ok(JointLimitCost { gradient, cost })
}

/// Joint space vector of the enabled secondary objectives, to be projected into the
/// null space: `-k_d q̇` for damping and `-k_l ∇H` for joint limit avoidance.
/// Non-finite gradient entries (a joint exactly at its limit) are skipped.
pub fn secondary_task_vector(
    q_dot: &JointVector,
    joint_limit_gradient: &JointVector,
    config: &NullSpaceConfig,
) -> Result<JointVector, ControlError> {
    check_shape("joint limit gradient", joint_limit_gradient.shape(), q_dot.shape())?;
    let mut secondary = JointVector::zeros(q_dot.len());
    if config.tasks.contains(SecondaryTasks::JOINT_DAMPING) {
        secondary -= q_dot * config.damping_gain;
    }
    if config.tasks.contains(SecondaryTasks::JOINT_LIMITS) {
        for (i, g) in joint_limit_gradient.iter().enumerate() {
            if g.is_finite() {
                secondary[i] -= config.joint_limit_gain * g;
            } else {
                warn!("Joint {} is at its limit, limit avoidance skipped", i);
            }
        }
    }
    Ok(secondary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const EPSILON: f64 = 1e-9;

    fn limits7() -> JointLimits {
        JointLimits::new(&[-2.9, -2.0, -2.9, -2.0, -2.9, -2.0, -3.0],
                         &[2.9, 2.0, 2.9, 2.0, 2.9, 2.0, 3.0]).unwrap()
    }

    #[test]
    fn test_projector_is_idempotent() {
        let j = Jacobian::from_fn(6, 7, |i, k| ((i + 2 * k) as f64 * 0.71).cos());
        let j_inv = damped_pseudo_inverse(&j, 1e-4).unwrap();
        assert_eq!(j_inv.shape(), (7, 6));
        let n = null_space_projector(&j, &j_inv).unwrap();
        assert!((&n * &n - &n).norm() < EPSILON);
        // The projected motion does not move the task
        assert!((&j * &n).norm() < EPSILON);
    }

    #[test]
    fn test_projector_of_low_rank_jacobians() {
        // J = A B with A 6xr and B rx7 has rank r
        let mut rng = StdRng::seed_from_u64(2024);
        for rank in 1..=6 {
            for _ in 0..100 {
                let a = DMatrix::from_fn(6, rank, |_, _| rng.gen_range(-1.0..1.0));
                let b = DMatrix::from_fn(rank, 7, |_, _| rng.gen_range(-1.0..1.0));
                let j = a * b;
                let j_inv = damped_pseudo_inverse(&j, 1e-4).unwrap();
                let n = null_space_projector(&j, &j_inv).unwrap();
                // Singular values below the tolerance are dropped, so J J⁺ J misses them
                let residual = (&j * &j_inv * &j - &j).amax();
                assert!(residual < 1e-3, "rank {}: |J J⁺ J - J| = {:e}", rank, residual);
                let residual = (&n * &n - &n).amax();
                assert!(residual < 1e-6, "rank {}: |N N - N| = {:e}", rank, residual);
                let residual = (&j * &n).amax();
                assert!(residual < 1e-3, "rank {}: |J N| = {:e}", rank, residual);
            }
        }
    }

    #[test]
    fn test_projector_shapes() {
        let j = Jacobian::zeros(6, 7);
        assert!(null_space_projector(&j, &Jacobian::zeros(6, 7)).is_err());
        assert!(damped_pseudo_inverse(&Jacobian::zeros(5, 7), 1e-4).is_err());
        // Fully singular Jacobian: nothing is removed from the joint space
        let n = null_space_projector(&j, &damped_pseudo_inverse(&j, 1e-4).unwrap()).unwrap();
        assert_eq!(n, DMatrix::identity(7, 7));
    }

    #[test]
    fn test_joint_limit_gradient_zero_at_center() {
        let limits = JointLimits::new(&[-1.0, 0.0, 1.0], &[1.0, 2.0, 4.0]).unwrap();
        let result = joint_limit_gradient(&limits.centers(), &limits, 1.0).unwrap();
        assert!(result.gradient.norm() < EPSILON);
        // (range²) / (range/2)² = 4 per joint
        assert!((result.cost - 12.0).abs() < EPSILON);
    }

    #[test]
    fn test_joint_limit_cost_grows_towards_limits() {
        let limits = JointLimits::new(&[-1.0], &[1.0]).unwrap();
        let mut previous_up = joint_limit_gradient(&JointVector::from_element(1, 0.0), &limits, 1.0).unwrap();
        let mut previous_down = previous_up.clone();
        for step in 1..10 {
            let x = step as f64 * 0.1;
            let up = joint_limit_gradient(&JointVector::from_element(1, x), &limits, 1.0).unwrap();
            let down = joint_limit_gradient(&JointVector::from_element(1, -x), &limits, 1.0).unwrap();
            assert!(up.cost > previous_up.cost);
            assert!(down.cost > previous_down.cost);
            assert!(up.gradient[0] > 0.0);
            assert!(down.gradient[0] < 0.0);
            previous_up = up;
            previous_down = down;
        }
    }

    #[test]
    fn test_joint_limit_gradient_matches_finite_differences() {
        let limits = limits7();
        let q = JointVector::from_vec(vec![0.3, -1.2, 2.0, 0.1, -2.5, 1.5, 0.0]);
        let gamma = 2.0;
        let result = joint_limit_gradient(&q, &limits, gamma).unwrap();
        let h = 1e-6;
        for i in 0..7 {
            let mut q_plus = q.clone();
            q_plus[i] += h;
            let mut q_minus = q.clone();
            q_minus[i] -= h;
            let numeric = (joint_limit_gradient(&q_plus, &limits, gamma).unwrap().cost
                - joint_limit_gradient(&q_minus, &limits, gamma).unwrap().cost) / (2.0 * h);
            assert!((numeric - result.gradient[i]).abs() < 1e-4 * (1.0 + numeric.abs()),
                    "joint {}: {} != {}", i, numeric, result.gradient[i]);
        }
    }

    #[test]
    fn test_violation_is_advisory() {
        let limits = JointLimits::new(&[-1.0, -1.0], &[1.0, 1.0]).unwrap();
        let q = JointVector::from_vec(vec![1.5, 0.0]);
        let result = joint_limit_gradient(&q, &limits, 1.0).unwrap();
        assert!(result.gradient[0].is_finite());
        assert!(result.cost.is_finite());
        assert!(joint_limit_gradient(&JointVector::zeros(3), &limits, 1.0).is_err());
        assert!(joint_limit_gradient(&q, &limits, 0.0).is_err());
    }

    #[test]
    fn test_null_space_config_validation() {
        assert!(NullSpaceConfig::default().validate().is_ok());
        let flat = NullSpaceConfig { gamma: 0.0, ..NullSpaceConfig::default() };
        assert_eq!(flat.validate().unwrap_err(),
                   ControlError::InvalidParameter { what: "joint limit cost gamma", value: 0.0 });
        let wild = NullSpaceConfig { damping_gain: f64::INFINITY, ..NullSpaceConfig::default() };
        assert_eq!(wild.validate().unwrap_err(), ControlError::NotFinite("null space gains"));
    }

    #[test]
    fn test_secondary_task_vector() {
        let q_dot = JointVector::from_vec(vec![0.5, -1.0]);
        let gradient = JointVector::from_vec(vec![2.0, f64::INFINITY]);

        let damping = NullSpaceConfig::default();
        assert_eq!(secondary_task_vector(&q_dot, &gradient, &damping).unwrap(),
                   JointVector::from_vec(vec![-0.5, 1.0]));

        let both = NullSpaceConfig {
            tasks: SecondaryTasks::JOINT_DAMPING | SecondaryTasks::JOINT_LIMITS,
            ..NullSpaceConfig::default()
        };
        assert_eq!(secondary_task_vector(&q_dot, &gradient, &both).unwrap(),
                   JointVector::from_vec(vec![-20.5, 1.0]));

        let none = NullSpaceConfig { tasks: SecondaryTasks::NONE, ..NullSpaceConfig::default() };
        assert_eq!(secondary_task_vector(&q_dot, &gradient, &none).unwrap(), JointVector::zeros(2));

        assert!(secondary_task_vector(&q_dot, &JointVector::zeros(3), &damping).is_err());
    }
}
