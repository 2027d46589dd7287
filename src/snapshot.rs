//! Model values captured once per control cycle.

use nalgebra::DMatrix;

use crate::control_error::{check_shape, ControlError};
use crate::control_traits::{DynamicModel, Jacobian, JointVector, Pose, Twist, TASK_DIM};
use crate::joint_limits::JointLimits;
use crate::utils::is_valid;

/// Plain value implementation of [DynamicModel]. The driver fills it from whatever
/// computes the dynamics (a KDL-like solver, a simulator, the robot controller) and
/// hands it to the control law. All shapes are checked by [ModelSnapshot::new].
#[derive(Debug, Clone)]
pub struct ModelSnapshot {
    pub q: JointVector,
    pub q_dot: JointVector,
    pub mass: DMatrix<f64>,
    pub coriolis: JointVector,
    pub gravity: JointVector,
    pub ee_pose: Pose,
    pub ee_twist: Twist,
    pub jacobian: Jacobian,
    pub jacobian_dot: Jacobian,
    pub limits: JointLimits,
}

impl ModelSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        q: JointVector,
        q_dot: JointVector,
        mass: DMatrix<f64>,
        coriolis: JointVector,
        gravity: JointVector,
        ee_pose: Pose,
        ee_twist: Twist,
        jacobian: Jacobian,
        jacobian_dot: Jacobian,
        limits: JointLimits,
    ) -> Result<Self, ControlError> {
        let n = q.len();
        check_shape("joint velocities", q_dot.shape(), (n, 1))?;
        check_shape("mass matrix", mass.shape(), (n, n))?;
        check_shape("coriolis vector", coriolis.shape(), (n, 1))?;
        check_shape("gravity vector", gravity.shape(), (n, 1))?;
        check_shape("jacobian", jacobian.shape(), (TASK_DIM, n))?;
        check_shape("jacobian derivative", jacobian_dot.shape(), (TASK_DIM, n))?;
        check_shape("joint limits", (limits.nr_joints(), 2), (n, 2))?;

        for (what, values) in [
            ("joint positions", q.as_slice()),
            ("joint velocities", q_dot.as_slice()),
            ("mass matrix", mass.as_slice()),
            ("coriolis vector", coriolis.as_slice()),
            ("gravity vector", gravity.as_slice()),
            ("jacobian", jacobian.as_slice()),
            ("jacobian derivative", jacobian_dot.as_slice()),
            ("end effector position", ee_pose.position.as_slice()),
            ("end effector rotation", ee_pose.rotation.as_slice()),
            ("end effector twist", ee_twist.to_vector().as_slice()),
        ] {
            if !is_valid(values) {
                return Err(ControlError::NotFinite(what));
            }
        }

        Ok(ModelSnapshot {
            q, q_dot, mass, coriolis, gravity, ee_pose, ee_twist, jacobian, jacobian_dot, limits,
        })
    }

    /// Captures the current values of another model.
    pub fn capture(model: &impl DynamicModel) -> Result<Self, ControlError> {
        Self::new(
            model.joint_positions(),
            model.joint_velocities(),
            model.mass_matrix(),
            model.coriolis(),
            model.gravity(),
            model.ee_pose(),
            model.ee_twist(),
            model.ee_jacobian(),
            model.ee_jacobian_dot(),
            model.joint_limits(),
        )
    }
}

impl DynamicModel for ModelSnapshot {
    fn nr_joints(&self) -> usize {
        self.q.len()
    }

    fn joint_positions(&self) -> JointVector {
        self.q.clone()
    }

    fn joint_velocities(&self) -> JointVector {
        self.q_dot.clone()
    }

    fn mass_matrix(&self) -> DMatrix<f64> {
        self.mass.clone()
    }

    fn coriolis(&self) -> JointVector {
        self.coriolis.clone()
    }

    fn gravity(&self) -> JointVector {
        self.gravity.clone()
    }

    fn ee_pose(&self) -> Pose {
        self.ee_pose
    }

    fn ee_twist(&self) -> Twist {
        self.ee_twist
    }

    fn ee_jacobian(&self) -> Jacobian {
        self.jacobian.clone()
    }

    fn ee_jacobian_dot(&self) -> Jacobian {
        self.jacobian_dot.clone()
    }

    fn joint_limits(&self) -> JointLimits {
        self.limits.clone()
    }
}
