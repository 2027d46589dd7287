use std::f64::consts::PI;
use nalgebra::{DMatrix, Vector3};
use rs_task_space_control::cartesian_error::OrientationMetric;
use rs_task_space_control::config::ControllerConfig;
use rs_task_space_control::control_traits::{Jacobian, JointVector, Twist};
use rs_task_space_control::controller::Controller;
use rs_task_space_control::joint_limits::JointLimits;
use rs_task_space_control::snapshot::ModelSnapshot;
use rs_task_space_control::utils::{as_radians, dump_joints, dump_torques, pose_from_xyz_rpy};

#[cfg(feature = "allow_filesystem")]
use clap::Parser;

/// Runs the joint space and the task space control laws on a synthetic 7 joint arm.
#[cfg(feature = "allow_filesystem")]
#[derive(Parser)]
#[command(name = "rs-task-space-control")]
#[command(about = "Inverse dynamics control demo", long_about = None)]
struct Cli {
    /// Controller configuration (YAML). Defaults are used if not given.
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

/// Values of one control cycle of a 7 joint arm, as a dynamics library would report them.
fn synthetic_snapshot() -> anyhow::Result<ModelSnapshot> {
    let q = as_radians(&[0.0, 30.0, 0.0, -60.0, 0.0, 45.0, 0.0]);
    let mass = DMatrix::from_diagonal(&JointVector::from_vec(vec![2.5, 2.2, 1.6, 1.2, 0.6, 0.4, 0.1]));
    let gravity = JointVector::from_vec(vec![0.0, -21.4, 0.3, 8.7, 0.0, -0.9, 0.0]);
    let jacobian = Jacobian::from_fn(6, 7, |i, j| {
        0.5 * ((i * 7 + j) as f64 * 0.37).sin() + if i == j { 0.5 } else { 0.0 }
    });
    let limits = JointLimits::new(
        as_radians(&[-170.0, -120.0, -170.0, -120.0, -170.0, -120.0, -175.0]).as_slice(),
        as_radians(&[170.0, 120.0, 170.0, 120.0, 170.0, 120.0, 175.0]).as_slice(),
    )?;

    Ok(ModelSnapshot::new(
        q,
        JointVector::zeros(7),
        mass,
        JointVector::zeros(7),
        gravity,
        pose_from_xyz_rpy(&[0.45, 0.0, 0.6, PI, 0.3, 0.0]),
        Twist::zero(),
        jacobian,
        Jacobian::zeros(6, 7),
        limits,
    )?)
}

/// Usage example.
fn main() -> anyhow::Result<()> {
    #[allow(unused_mut)]
    let mut config = ControllerConfig::default();
    #[cfg(feature = "allow_filesystem")] {
        // This requires YAML library
        let cli = Cli::parse();
        if let Some(path) = cli.config {
            config = ControllerConfig::from_yaml_file(&path)?;
        }
        println!("Configuration:\n{}", config.to_yaml());
    }

    let model = synthetic_snapshot()?;
    println!("Joint positions:");
    dump_joints(&model.q);

    let controller = Controller::with_config(&model, config.clone());
    println!("Holding the current joint positions, torque equals gravity:");
    let torque = controller.joint_space_torque(&model.q, &JointVector::zeros(7), &JointVector::zeros(7))?;
    dump_torques(&torque);

    println!("Joint 2 two degrees behind the target:");
    let mut q_d = model.q.clone();
    q_d[1] += 2.0_f64.to_radians();
    let torque = controller.joint_space_torque(&q_d, &JointVector::zeros(7), &JointVector::zeros(7))?;
    dump_torques(&torque);

    let mut pose_d = model.ee_pose;
    pose_d.position += Vector3::new(0.01, 0.0, -0.005);
    for metric in [OrientationMetric::EulerZyz, OrientationMetric::AngleAxis] {
        let controller = Controller::with_config(
            &model, ControllerConfig { orientation_metric: metric, ..config.clone() });
        let command = controller.task_space_step(
            &pose_d, &Twist::zero(), &Twist::zero(), &config.task_space_gains)?;
        println!("End effector 1 cm behind in x and 5 mm above the target, {:?}:", metric);
        dump_torques(&command.torque);
        println!("Task error {:?}, joint limit cost {:.3}",
                 command.error.as_slice(), command.joint_limit_cost.cost);
    }
    Ok(())
}
