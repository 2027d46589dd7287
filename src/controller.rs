//! Inverse dynamics control laws in joint space and in task (operational) space.
//!
//! Both laws linearize the manipulator dynamics M(q) q̈ + C(q, q̇) + g(q) = τ by feeding
//! back the model, and impose a second order error dynamics through the gains:
//! ```text
//! joint space:  τ = M (q̈_d + Kd (q̇_d - q̇) + Kp (q_d - q)) + C + g
//! task space:   y = ẍ_d - J̇_A q̇ + Kd ẋ̃ + Kp x̃
//!               τ = M (J_A⁺ y + (I - J_A⁺ J_A) σ) + C + g
//! ```
//! where σ is the joint space vector of the secondary objectives.

use nalgebra::{DVector, Vector6};
use tracing::debug;

use crate::cartesian_error::{compute_errors, OrientationMetric};
use crate::config::{ControllerConfig, JointSpaceGains, TaskSpaceGains};
use crate::control_error::{check_shape, ControlError};
use crate::control_traits::{DynamicModel, JointVector, Pose, Twist};
use crate::euler::euler_angles;
use crate::jacobian::AnalyticalJacobian;
use crate::redundancy::{
    damped_pseudo_inverse, joint_limit_gradient, null_space_projector, secondary_task_vector,
    JointLimitCost,
};
use crate::snapshot::ModelSnapshot;
use crate::utils::{is_valid, orthonormalize};

/// Torque of one task space control cycle together with the quantities a driver
/// usually publishes for monitoring.
#[derive(Debug, Clone)]
pub struct TaskSpaceCommand {
    /// Joint torques to apply
    pub torque: JointVector,

    /// Task error x̃ = [e_p; e_o]
    pub error: Vector6<f64>,

    /// Task error rate ẋ̃
    pub error_rate: Vector6<f64>,

    /// Joint limit cost and its gradient at the current configuration
    pub joint_limit_cost: JointLimitCost,
}

/// Inverse dynamics controller reading the model it is built on.
///
/// The controller keeps no state between cycles: every call reads the current model
/// values and computes the torque from scratch.
pub struct Controller<'a, M: DynamicModel> {
    model: &'a M,
    config: ControllerConfig,
}

impl<'a, M: DynamicModel> Controller<'a, M> {
    /// Controller with the default configuration.
    pub fn new(model: &'a M) -> Self {
        Controller { model, config: ControllerConfig::default() }
    }

    pub fn with_config(model: &'a M, config: ControllerConfig) -> Self {
        Controller { model, config }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        self.model
    }

    /// Joint space inverse dynamics with scalar gains,
    /// τ = M (q̈_d + kd (q̇_d - q̇) + kp (q_d - q)) + C + g.
    pub fn compute_joint_space_torque(
        &self,
        q_d: &JointVector,
        q_dot_d: &JointVector,
        q_ddot_d: &JointVector,
        kp: f64,
        kd: f64,
    ) -> Result<JointVector, ControlError> {
        JointSpaceGains::new(kp, kd).validate()?;
        let state = ModelSnapshot::capture(self.model)?;
        let n = state.q.len();
        check_shape("desired joint positions", q_d.shape(), (n, 1))?;
        check_shape("desired joint velocities", q_dot_d.shape(), (n, 1))?;
        check_shape("desired joint accelerations", q_ddot_d.shape(), (n, 1))?;
        for (what, values) in [
            ("desired joint positions", q_d.as_slice()),
            ("desired joint velocities", q_dot_d.as_slice()),
            ("desired joint accelerations", q_ddot_d.as_slice()),
        ] {
            if !is_valid(values) {
                return Err(ControlError::NotFinite(what));
            }
        }

        let e = q_d - &state.q;
        let e_dot = q_dot_d - &state.q_dot;
        debug!("joint error = {:?}", e.as_slice());

        let acceleration = q_ddot_d + e_dot * kd + e * kp;
        Ok(&state.mass * acceleration + &state.coriolis + &state.gravity)
    }

    /// Joint space inverse dynamics with the configured gains.
    pub fn joint_space_torque(
        &self,
        q_d: &JointVector,
        q_dot_d: &JointVector,
        q_ddot_d: &JointVector,
    ) -> Result<JointVector, ControlError> {
        let JointSpaceGains { kp, kd } = self.config.joint_space_gains;
        self.compute_joint_space_torque(q_d, q_dot_d, q_ddot_d, kp, kd)
    }

    /// Task space inverse dynamics with scalar gains for position (`kpp`, `kdp`) and
    /// orientation (`kpo`, `kdo`). The redundancy is used by the secondary objectives
    /// of the configured [crate::redundancy::NullSpaceConfig].
    ///
    /// `accel_d` is the desired task acceleration ẍ_d. Its angular part is taken in the
    /// coordinates of the configured orientation metric: Euler angle accelerations for
    /// [OrientationMetric::EulerZyz], angular acceleration for [OrientationMetric::AngleAxis].
    #[allow(clippy::too_many_arguments)]
    pub fn compute_task_space_torque(
        &self,
        pose_d: &Pose,
        twist_d: &Twist,
        accel_d: &Twist,
        kpp: f64,
        kpo: f64,
        kdp: f64,
        kdo: f64,
    ) -> Result<JointVector, ControlError> {
        let gains = TaskSpaceGains::new(kpp, kpo, kdp, kdo);
        Ok(self.step(pose_d, twist_d, accel_d, &gains, None)?.torque)
    }

    /// Task space inverse dynamics where the caller supplies the joint space vector σ
    /// projected into the null space of the task.
    pub fn compute_task_space_torque_with(
        &self,
        pose_d: &Pose,
        twist_d: &Twist,
        accel_d: &Twist,
        gains: &TaskSpaceGains,
        secondary: &JointVector,
    ) -> Result<JointVector, ControlError> {
        Ok(self.step(pose_d, twist_d, accel_d, gains, Some(secondary))?.torque)
    }

    /// Task space inverse dynamics with the configured gains.
    pub fn task_space_torque(
        &self,
        pose_d: &Pose,
        twist_d: &Twist,
        accel_d: &Twist,
    ) -> Result<JointVector, ControlError> {
        Ok(self.step(pose_d, twist_d, accel_d, &self.config.task_space_gains, None)?.torque)
    }

    /// Task space inverse dynamics returning the torque together with the task error,
    /// its rate and the joint limit cost.
    pub fn task_space_step(
        &self,
        pose_d: &Pose,
        twist_d: &Twist,
        accel_d: &Twist,
        gains: &TaskSpaceGains,
    ) -> Result<TaskSpaceCommand, ControlError> {
        self.step(pose_d, twist_d, accel_d, gains, None)
    }

    fn step(
        &self,
        pose_d: &Pose,
        twist_d: &Twist,
        accel_d: &Twist,
        gains: &TaskSpaceGains,
        secondary: Option<&JointVector>,
    ) -> Result<TaskSpaceCommand, ControlError> {
        gains.validate()?;
        self.config.null_space.validate()?;
        let state = ModelSnapshot::capture(self.model)?;
        let n = state.q.len();
        let tolerance = self.config.pinv_tolerance;

        let limits = self.config.joint_limits.as_ref().unwrap_or(&state.limits);
        check_shape("configured joint limits", (limits.nr_joints(), 2), (n, 2))?;
        if let Some(secondary) = secondary {
            check_shape("secondary task vector", secondary.shape(), (n, 1))?;
        }
        for (what, values) in [
            ("desired position", pose_d.position.as_slice()),
            ("desired rotation", pose_d.rotation.as_slice()),
            ("desired twist", twist_d.to_vector().as_slice()),
            ("desired acceleration", accel_d.to_vector().as_slice()),
        ] {
            if !is_valid(values) {
                return Err(ControlError::NotFinite(what));
            }
        }

        // Task Jacobian and the J̇ q̇ term in the coordinates of the orientation metric
        let metric = self.config.orientation_metric;
        let (task_jacobian, bias) = match metric {
            OrientationMetric::EulerZyz => {
                let euler = euler_angles(&orthonormalize(&state.ee_pose.rotation));
                let analytical = AnalyticalJacobian::new(
                    &state.jacobian, &state.jacobian_dot, &euler, &state.ee_twist.angular, tolerance)?;
                let bias = analytical.bias_acceleration(&state.q_dot)?;
                (analytical.matrix().clone(), bias)
            }
            OrientationMetric::AngleAxis => {
                let bias = &state.jacobian_dot * &state.q_dot;
                (state.jacobian.clone(), Vector6::from_iterator(bias.iter().cloned()))
            }
        };

        let (error, error_rate) = compute_errors(
            pose_d, &state.ee_pose, twist_d, &state.ee_twist, metric, tolerance)?;
        debug!("task error = {:?}, rate = {:?}", error.as_slice(), error_rate.as_slice());

        let y = accel_d.to_vector() - bias + gains.damping() * error_rate + gains.stiffness() * error;

        let jacobian_inverse = damped_pseudo_inverse(&task_jacobian, tolerance)?;
        let projector = null_space_projector(&task_jacobian, &jacobian_inverse)?;

        let joint_limit_cost = joint_limit_gradient(&state.q, limits, self.config.null_space.gamma)?;
        let sigma = match secondary {
            Some(secondary) => secondary.clone(),
            None => secondary_task_vector(&state.q_dot, &joint_limit_cost.gradient, &self.config.null_space)?,
        };
        debug!("joint limit cost = {}", joint_limit_cost.cost);

        let y = DVector::from_column_slice(y.as_slice());
        let acceleration = &jacobian_inverse * y + projector * sigma;
        let torque = &state.mass * acceleration + &state.coriolis + &state.gravity;

        Ok(TaskSpaceCommand { torque, error, error_rate, joint_limit_cost })
    }
}
