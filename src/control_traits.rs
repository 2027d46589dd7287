//! Value types shared by the control laws and the model the laws read from.

extern crate nalgebra as na;

use na::{DMatrix, DVector, Isometry3, Matrix3, Rotation3, Translation3, UnitQuaternion, Vector3, Vector6};
use crate::joint_limits::JointLimits;

/// Joint positions, velocities, accelerations or torques. The length is the joint count N.
pub type JointVector = DVector<f64>;

/// 6xN matrix, rows are linear (0..3) and angular (3..6) components, columns are joints.
pub type Jacobian = DMatrix<f64>;

/// Dimension of the Cartesian task (3 linear + 3 orientation).
pub const TASK_DIM: usize = 6;

/// Pose of the end effector: position and orientation.
///
/// Unlike `Isometry3`, the rotation is kept as a raw matrix. Poses produced by
/// integrating models drift away from orthonormality; the drift stays visible here and
/// is removed by [`crate::utils::orthonormalize`] before any error computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub rotation: Matrix3<f64>,
}

impl Pose {
    pub fn new(position: Vector3<f64>, rotation: Matrix3<f64>) -> Self {
        Pose { position, rotation }
    }

    pub fn identity() -> Self {
        Pose { position: Vector3::zeros(), rotation: Matrix3::identity() }
    }

    /// Converts into nalgebra isometry. The rotation is re-projected onto SO(3).
    pub fn to_isometry(&self) -> Isometry3<f64> {
        let rotation = Rotation3::from_matrix(&self.rotation);
        Isometry3::from_parts(
            Translation3::from(self.position),
            UnitQuaternion::from_rotation_matrix(&rotation),
        )
    }
}

impl From<Isometry3<f64>> for Pose {
    fn from(isometry: Isometry3<f64>) -> Self {
        Pose {
            position: isometry.translation.vector,
            rotation: isometry.rotation.to_rotation_matrix().into_inner(),
        }
    }
}

/// Linear and angular velocity of a frame, both expressed in the fixed base frame.
/// The same structure carries Cartesian accelerations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Twist {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

impl Twist {
    pub fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Twist { linear, angular }
    }

    pub fn zero() -> Self {
        Twist { linear: Vector3::zeros(), angular: Vector3::zeros() }
    }

    /// Stacks into [linear; angular].
    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::new(
            self.linear.x, self.linear.y, self.linear.z,
            self.angular.x, self.angular.y, self.angular.z,
        )
    }

    pub fn from_vector(v: &Vector6<f64>) -> Self {
        Twist {
            linear: v.fixed_rows::<3>(0).into_owned(),
            angular: v.fixed_rows::<3>(3).into_owned(),
        }
    }
}

/// The dynamic model of the manipulator, as seen by the controller.
///
/// All values describe one and the same instant (the current control cycle). The
/// controller only reads them; computing the rigid body dynamics, kinematics and
/// Jacobians is the job of the implementation. See [`crate::snapshot::ModelSnapshot`]
/// for a plain value implementation.
pub trait DynamicModel {
    /// Number of joints N
    fn nr_joints(&self) -> usize;

    /// Current joint positions q
    fn joint_positions(&self) -> JointVector;

    /// Current joint velocities q̇
    fn joint_velocities(&self) -> JointVector;

    /// Joint space inertia matrix M(q), NxN, symmetric positive definite
    fn mass_matrix(&self) -> DMatrix<f64>;

    /// Coriolis and centrifugal torques C(q, q̇)
    fn coriolis(&self) -> JointVector;

    /// Gravity torques g(q)
    fn gravity(&self) -> JointVector;

    /// End effector pose in the base frame
    fn ee_pose(&self) -> Pose;

    /// End effector twist in the base frame
    fn ee_twist(&self) -> Twist;

    /// Geometric Jacobian of the end effector, 6xN
    fn ee_jacobian(&self) -> Jacobian;

    /// Time derivative of the geometric Jacobian, 6xN
    fn ee_jacobian_dot(&self) -> Jacobian;

    fn joint_limits(&self) -> JointLimits;
}
