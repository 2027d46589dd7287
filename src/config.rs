//! Defines the controller configuration: gains, tolerances and null space objectives.

use nalgebra::{Matrix3, Matrix6};

use crate::cartesian_error::OrientationMetric;
use crate::control_error::ControlError;
use crate::joint_limits::JointLimits;
use crate::redundancy::{NullSpaceConfig, SecondaryTasks};
use crate::utils::{deg, is_valid, PINV_TOLERANCE};

/// Scalar gains of the task space law. Position and orientation have separate gains,
/// assembled into 6x6 block diagonal matrices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskSpaceGains {
    /// Proportional gain on the position error
    pub kpp: f64,

    /// Proportional gain on the orientation error
    pub kpo: f64,

    /// Derivative gain on the linear velocity error
    pub kdp: f64,

    /// Derivative gain on the orientation rate error
    pub kdo: f64,
}

impl TaskSpaceGains {
    pub fn new(kpp: f64, kpo: f64, kdp: f64, kdo: f64) -> Self {
        TaskSpaceGains { kpp, kpo, kdp, kdo }
    }

    /// Gains with the orientation damping chosen for critical damping, 2√kpo.
    pub fn critically_damped(kpp: f64, kpo: f64, kdp: f64) -> Self {
        TaskSpaceGains { kpp, kpo, kdp, kdo: 2.0 * kpo.sqrt() }
    }

    /// All four gains must be finite.
    pub fn validate(&self) -> Result<(), ControlError> {
        if !is_valid(&[self.kpp, self.kpo, self.kdp, self.kdo]) {
            return Err(ControlError::NotFinite("task space gains"));
        }
        Ok(())
    }

    /// Kp = blockDiag(kpp I, kpo I)
    pub fn stiffness(&self) -> Matrix6<f64> {
        block_diagonal(self.kpp, self.kpo)
    }

    /// Kd = blockDiag(kdp I, kdo I)
    pub fn damping(&self) -> Matrix6<f64> {
        block_diagonal(self.kdp, self.kdo)
    }
}

impl Default for TaskSpaceGains {
    fn default() -> Self {
        TaskSpaceGains::critically_damped(80.0, 50.0, 40.0)
    }
}

fn block_diagonal(linear: f64, angular: f64) -> Matrix6<f64> {
    let mut m = Matrix6::zeros();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&(Matrix3::identity() * linear));
    m.fixed_view_mut::<3, 3>(3, 3).copy_from(&(Matrix3::identity() * angular));
    m
}

/// Scalar gains of the joint space law, the same for every joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSpaceGains {
    pub kp: f64,
    pub kd: f64,
}

impl JointSpaceGains {
    pub fn new(kp: f64, kd: f64) -> Self {
        JointSpaceGains { kp, kd }
    }

    pub fn validate(&self) -> Result<(), ControlError> {
        if !is_valid(&[self.kp, self.kd]) {
            return Err(ControlError::NotFinite("joint space gains"));
        }
        Ok(())
    }
}

impl Default for JointSpaceGains {
    fn default() -> Self {
        JointSpaceGains { kp: 150.0, kd: 72.0 }
    }
}

/// Everything the control laws need apart from the model and the desired trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub task_space_gains: TaskSpaceGains,
    pub joint_space_gains: JointSpaceGains,

    /// Singular values not above this value are discarded by the pseudo inverses. Also
    /// the |sin θ| threshold below which the Euler rate map is treated as singular.
    pub pinv_tolerance: f64,

    /// How the orientation error is measured in the task space law.
    pub orientation_metric: OrientationMetric,

    /// Secondary objectives projected into the null space of the task.
    pub null_space: NullSpaceConfig,

    /// Joint limits used for the joint limit cost. If not set, the limits of the model
    /// are used.
    pub joint_limits: Option<JointLimits>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            task_space_gains: TaskSpaceGains::default(),
            joint_space_gains: JointSpaceGains::default(),
            pinv_tolerance: PINV_TOLERANCE,
            orientation_metric: OrientationMetric::default(),
            null_space: NullSpaceConfig::default(),
            joint_limits: None,
        }
    }
}

impl ControllerConfig {
    /// Checks the gains, the tolerance and the null space settings.
    pub fn validate(&self) -> Result<(), ControlError> {
        self.task_space_gains.validate()?;
        self.joint_space_gains.validate()?;
        if !(self.pinv_tolerance >= 0.0) || !self.pinv_tolerance.is_finite() {
            return Err(ControlError::InvalidParameter {
                what: "pseudo inverse tolerance", value: self.pinv_tolerance });
        }
        self.null_space.validate()
    }

    /// Convert to string yaml representation (quick viewing, etc).
    /// The output can be read back with `from_yaml_file`.
    pub fn to_yaml(&self) -> String {
        let g = &self.task_space_gains;
        let mut yaml = format!(
            "task_space_gains:\n  \
              kpp: {}\n  \
              kpo: {}\n  \
              kdp: {}\n  \
              kdo: {}\n\
            joint_space_gains:\n  \
              kp: {}\n  \
              kd: {}\n\
            pinv_tolerance: {:e}\n\
            orientation_metric: {}\n\
            null_space:\n  \
              tasks: [{}]\n  \
              damping_gain: {}\n  \
              joint_limit_gain: {}\n  \
              gamma: {}\n",
            g.kpp,
            g.kpo,
            g.kdp,
            g.kdo,
            self.joint_space_gains.kp,
            self.joint_space_gains.kd,
            self.pinv_tolerance,
            metric_name(self.orientation_metric),
            task_names(self.null_space.tasks).join(", "),
            self.null_space.damping_gain,
            self.null_space.joint_limit_gain,
            self.null_space.gamma,
        );
        if let Some(limits) = &self.joint_limits {
            yaml.push_str(&format!(
                "joint_limits:\n  \
                  lower: [{}]\n  \
                  upper: [{}]\n",
                limits.lower.iter().map(|x| deg(x)).collect::<Vec<_>>().join(", "),
                limits.upper.iter().map(|x| deg(x)).collect::<Vec<_>>().join(", "),
            ));
        }
        yaml
    }
}

pub(crate) fn metric_name(metric: OrientationMetric) -> &'static str {
    match metric {
        OrientationMetric::EulerZyz => "euler_zyz",
        OrientationMetric::AngleAxis => "angle_axis",
    }
}

pub(crate) fn metric_from_name(name: &str) -> Option<OrientationMetric> {
    match name {
        "euler_zyz" => Some(OrientationMetric::EulerZyz),
        "angle_axis" => Some(OrientationMetric::AngleAxis),
        _ => None,
    }
}

pub(crate) const TASK_NAMES: [(&str, SecondaryTasks); 2] = [
    ("joint_damping", SecondaryTasks::JOINT_DAMPING),
    ("joint_limits", SecondaryTasks::JOINT_LIMITS),
];

fn task_names(tasks: SecondaryTasks) -> Vec<&'static str> {
    TASK_NAMES.iter()
        .filter(|(_, flag)| tasks.contains(*flag))
        .map(|(name, _)| *name)
        .collect()
}
