//! Rust implementation of inverse dynamics control for redundant serial manipulators,
//! in joint space and in operational (task) space.
//!
//! The task space law follows the classic operational space formulation found in
//! _Robotics: Modelling, Planning and Control_ by Siciliano, Sciavicco, Villani and
//! Oriolo: the orientation error is expressed with ZYZ Euler angles, the geometric
//! Jacobian is converted into the analytical one, and the spare degrees of freedom of
//! the redundant arm are used by secondary objectives projected into the null space of
//! the task.
//!
//! # Features
//!
//! - Joint space computed torque, τ = M (q̈_d + Kd ė + Kp e) + C + g.
//! - Task space inverse dynamics with analytical Jacobian and its time derivative.
//! - Damped pseudo inverse: near kinematic singularities the unreachable directions are
//!   dropped instead of producing unbounded torques.
//! - Euler representation singularity (θ = 0, θ = π) is handled with a damped fallback.
//!   The angle-axis orientation error, which has no such singularity, can be selected
//!   instead.
//! - Null space objectives: joint velocity damping and joint limit avoidance, or any
//!   joint space vector supplied by the caller.
//! - Controller configuration can be read from YAML (feature `allow_filesystem`).
//!
//! # Model
//!
//! The crate does not compute rigid body dynamics. The mass matrix, Coriolis and gravity
//! torques, end effector pose, twist, Jacobian and its derivative are read every cycle
//! through the `control_traits::DynamicModel` trait. `snapshot::ModelSnapshot` is a plain
//! value implementation of it that can be filled from any dynamics library or simulator.

pub mod control_traits;
pub mod control_error;

#[path = "utils/utils.rs"]
pub mod utils;

pub mod euler;
pub mod cartesian_error;
pub mod jacobian;

pub mod joint_limits;
pub mod redundancy;

pub mod snapshot;
pub mod config;
pub mod controller;

#[cfg(feature = "allow_filesystem")]
pub mod config_from_file;
#[cfg(feature = "allow_filesystem")]
pub mod parameter_error;
